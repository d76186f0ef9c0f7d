use amlink_frame::Packet;

use crate::error::Result;

/// Consumes raw frames for one dispatch byte.
///
/// `receive` is called synchronously from a connection's read path, one frame
/// at a time, so a dispatcher that blocks on delivery holds up every later
/// frame on that connection.
pub trait Dispatcher: Send + Sync {
    /// Decode `frame` and deliver it to the registered consumers.
    fn receive(&self, frame: &[u8]) -> Result<()>;

    /// The dispatch byte this dispatcher owns.
    fn dispatch(&self) -> u8;

    /// A fresh packet of the kind this dispatcher decodes.
    fn new_packet(&self) -> Box<dyn Packet>;
}
