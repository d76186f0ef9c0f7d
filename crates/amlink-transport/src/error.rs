use amlink_frame::FrameError;

/// Errors that can occur in connection operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind the listening socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to reach the remote endpoint.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on an established stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer did not answer with the expected protocol banner.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The packet could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] FrameError),

    /// The encoded packet does not fit behind a single length byte.
    #[error("frame too long ({len} bytes, max {max})")]
    FrameTooLong { len: usize, max: usize },

    /// No peer is currently connected.
    #[error("not connected: {0}")]
    NotConnected(String),

    /// The connection string could not be parsed.
    #[error("invalid connection string {0:?}")]
    InvalidSpec(String),

    /// The connection string names a transport this build cannot open.
    #[error("unsupported transport: {0}")]
    Unsupported(String),

    /// The connection has been shut down.
    #[error("connection shut down")]
    Shutdown,

    /// The stream ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
