/// Errors that can occur during packet encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The buffer ended before a fixed-width header field was complete.
    #[error("frame truncated ({available} bytes, header needs {needed})")]
    Truncated { needed: usize, available: usize },

    /// The declared payload length exceeds the bytes following the header.
    #[error("payload too short - header={declared}, actual={actual}")]
    PayloadTooShort { declared: usize, actual: usize },

    /// The payload does not fit in a single frame.
    #[error("message payload too long ({len} bytes, max {max})")]
    PayloadTooLong { len: usize, max: usize },

    /// A frame with no bytes at all, not even a dispatch tag.
    #[error("empty frame")]
    EmptyFrame,

    /// An identifier string was not valid hexadecimal for its width.
    #[error("invalid hex identifier {0:?}")]
    InvalidHex(String),
}

pub type Result<T> = std::result::Result<T, FrameError>;
