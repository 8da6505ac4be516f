use std::path::PathBuf;

/// Errors that can occur on the sample socket.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// Failed to connect to the daemon's sample endpoint.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The session handshake did not complete.
    #[error("handshake for session {session_id} failed: {reason}")]
    Handshake { session_id: i32, reason: String },

    /// An I/O error occurred on the socket.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The daemon closed the connection.
    #[error("connection closed by daemon")]
    ConnectionClosed,

    /// No connection has been established, or it was already dropped.
    #[error("socket not connected")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, SocketError>;
