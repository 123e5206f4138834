use std::time::Duration;

/// Errors that can occur in archiver transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// No data (or no write space) became available within the bound.
    #[error("receive timeout after {0:?}")]
    Timeout(Duration),

    /// The server closed the connection.
    #[error("connection closed by server")]
    Eof,

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// True for failures that leave the connection usable (only `Timeout`).
    pub fn is_transient(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
