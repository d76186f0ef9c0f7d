use amlink_transport::TransportError;

/// Errors that can occur while setting up or running a relay.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// A connection could not be opened or started.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The relay configuration is contradictory.
    #[error("invalid relay configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
