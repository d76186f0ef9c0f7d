use amlink_frame::FrameError;

/// Errors that can occur while routing a frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The frame could not be decoded by the dispatcher that owns it.
    #[error("deserialize error on dispatch {dispatch:02X}: {source}")]
    Decode { dispatch: u8, source: FrameError },

    /// No dispatcher is installed for the frame's dispatch byte.
    #[error("no dispatcher for {0:02X}")]
    NoDispatcher(u8),

    /// The frame had no dispatch byte.
    #[error("empty frame")]
    EmptyFrame,
}

pub type Result<T> = std::result::Result<T, DispatchError>;
