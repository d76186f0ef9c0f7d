use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use amlink_dispatch::Dispatcher;
use amlink_frame::Packet;

use crate::error::Result;

/// One endpoint of a frame stream.
///
/// Implementations own their read path: every inbound frame is routed
/// synchronously through the installed dispatchers, so a dispatcher blocked on
/// a slow consumer pauses reading on this connection.
pub trait Connection: Send + Sync {
    /// Encode `packet` and write it to the connected peer(s).
    fn send(&self, packet: &dyn Packet) -> Result<()>;

    /// Route frames carrying `dispatcher.dispatch()` to `dispatcher`.
    fn add_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>);

    /// Route frames with no dedicated dispatcher to `dispatcher`.
    fn set_default_dispatcher(&self, dispatcher: Arc<dyn Dispatcher>);

    /// Accept incoming peers in the background.
    fn listen(&self) -> Result<()>;

    /// Dial the endpoint in the background, redialling `period` after every
    /// failure or disconnect.
    fn autoconnect(&self, period: Duration);

    /// Close all streams and stop background work.
    fn disconnect(&self);

    /// Human-readable endpoint, e.g. `sf@127.0.0.1:9002`.
    fn name(&self) -> &str;
}

/// How a connection is brought up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMode {
    /// Wait for peers to connect.
    Listen,
    /// Dial out and keep redialling with this period.
    Autoconnect(Duration),
}

impl LinkMode {
    /// Start `connection` in this mode.
    pub fn start(self, connection: &dyn Connection) -> Result<()> {
        match self {
            LinkMode::Listen => connection.listen(),
            LinkMode::Autoconnect(period) => {
                connection.autoconnect(period);
                Ok(())
            }
        }
    }
}

impl fmt::Display for LinkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkMode::Listen => write!(f, "listen"),
            LinkMode::Autoconnect(period) => write!(f, "autoconnect every {period:?}"),
        }
    }
}
