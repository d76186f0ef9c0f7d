//! Active Message framing, dispatch, and relaying.
//!
//! # Crate Structure
//!
//! - [`frame`]: AM packet model and byte-exact codec
//! - [`dispatch`]: Dispatch-byte and AM-type routing to consumer channels
//! - [`transport`]: Connection contract and serial-forwarder TCP transport
//! - [`relay`]: Bidirectional relay between a server connection and its sources

pub mod config;
pub mod error;
pub mod relay;

pub use config::{EndpointConfig, RelayConfig};
pub use error::{RelayError, Result};
pub use relay::{Link, Relay, RelayStats};

/// Re-export frame types.
pub mod frame {
    pub use amlink_frame::*;
}

/// Re-export dispatch types.
pub mod dispatch {
    pub use amlink_dispatch::*;
}

/// Re-export transport types.
pub mod transport {
    pub use amlink_transport::*;
}
