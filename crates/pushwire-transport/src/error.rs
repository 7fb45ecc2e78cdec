/// Errors that can occur while listening for device connections.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Accepting failed with a non-temporary error; the listener is done.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the listening socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The OS refused to start a session thread.
    #[error("failed to spawn session for {peer}: {source}")]
    Spawn {
        peer: String,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, TransportError>;
