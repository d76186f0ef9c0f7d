use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Result, TransportError};
use crate::sf::{SfConfig, SfConnection};
use crate::traits::Connection;

/// Port used by `sf@HOST` strings without an explicit port.
pub const DEFAULT_SF_PORT: u16 = 9002;

/// Baud rate used by `serial@PORT` strings without an explicit rate.
pub const DEFAULT_BAUD: u32 = 115_200;

/// A parsed connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionSpec {
    /// `sf@HOST:PORT`: serial forwarder over TCP.
    Sf { host: String, port: u16 },
    /// `serial@PORT:BAUD`: a local serial device.
    Serial { port: String, baud: u32 },
}

impl FromStr for ConnectionSpec {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || TransportError::InvalidSpec(s.to_string());
        let (scheme, target) = s.split_once('@').ok_or_else(invalid)?;
        if target.is_empty() {
            return Err(invalid());
        }

        match scheme {
            "sf" => {
                let (host, port) = match target.rsplit_once(':') {
                    Some((host, port)) => (host, port.parse().map_err(|_| invalid())?),
                    None => (target, DEFAULT_SF_PORT),
                };
                if host.is_empty() {
                    return Err(invalid());
                }
                Ok(ConnectionSpec::Sf {
                    host: host.to_string(),
                    port,
                })
            }
            "serial" => {
                let (port, baud) = match target.rsplit_once(':') {
                    Some((port, baud)) => (port, baud.parse().map_err(|_| invalid())?),
                    None => (target, DEFAULT_BAUD),
                };
                Ok(ConnectionSpec::Serial {
                    port: port.to_string(),
                    baud,
                })
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for ConnectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionSpec::Sf { host, port } => write!(f, "sf@{host}:{port}"),
            ConnectionSpec::Serial { port, baud } => write!(f, "serial@{port}:{baud}"),
        }
    }
}

/// Create an idle connection for `spec`. Nothing is opened until it is
/// started with `listen` or `autoconnect`.
pub fn open(spec: &ConnectionSpec, config: SfConfig) -> Result<Arc<dyn Connection>> {
    match spec {
        ConnectionSpec::Sf { host, port } => {
            Ok(Arc::new(SfConnection::with_config(host, *port, config)))
        }
        ConnectionSpec::Serial { .. } => Err(TransportError::Unsupported(spec.to_string())),
    }
}
