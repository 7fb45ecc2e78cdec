/// Errors raised while encoding, decoding or splitting messages.
///
/// `FrameTooLarge` and `Exhausted` indicate a caller or configuration bug
/// rather than a transient condition; the message should be discarded.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] pushwire_frame::FrameError),

    /// I/O error outside of framing (e.g. cloning a stream).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The message names a type this protocol does not know.
    #[error("unknown message type {0:?}")]
    UnknownType(String),

    /// A serialized message does not fit in one frame.
    #[error("message frame too large ({size} bytes, max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// `split` was called again after the last round was emitted.
    #[error("message already fully split; reset it before reuse")]
    Exhausted,

    /// The frame size policy is inconsistent.
    #[error("invalid frame policy: {0}")]
    InvalidPolicy(&'static str),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;
