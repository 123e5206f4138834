use fastream_frame::FrameError;
use fastream_transport::TransportError;

/// Failure categories, distinguishable without looking at message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The socket could not be established or failed underneath us.
    Connection,
    /// Nothing arrived within the receive bound.
    Timeout,
    /// The archiver closed the connection.
    Eof,
    /// The archiver rejected a command or sent an unparseable reply.
    Protocol,
    /// A block did not match the expected sample shape.
    Decode,
    /// A channel mask was malformed or named an id outside `[0, 256)`.
    InvalidMask,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Eof => "eof",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Decode => "decode",
            ErrorKind::InvalidMask => "invalid-mask",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in subscription and query operations.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Framing or decoding error.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// The archiver reported an error; carries its message verbatim.
    #[error("archiver error: {0}")]
    Protocol(String),

    /// The subscription already failed and must be replaced.
    #[error("subscription already failed ({0})")]
    Failed(ErrorKind),
}

impl StreamError {
    /// The failure category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            StreamError::Transport(err) => transport_kind(err),
            StreamError::Frame(FrameError::Transport(err)) => transport_kind(err),
            StreamError::Frame(FrameError::Decode { .. }) => ErrorKind::Decode,
            StreamError::Frame(FrameError::LineTooLong { .. }) => ErrorKind::Protocol,
            StreamError::Frame(
                FrameError::ChannelOutOfRange(_) | FrameError::InvalidMaskSpec { .. },
            ) => ErrorKind::InvalidMask,
            StreamError::Protocol(_) => ErrorKind::Protocol,
            StreamError::Failed(kind) => *kind,
        }
    }

    /// True when retrying on the same connection can succeed (timeouts only).
    pub fn is_retryable(&self) -> bool {
        matches!(self, StreamError::Transport(TransportError::Timeout(_)))
            || matches!(
                self,
                StreamError::Frame(FrameError::Transport(TransportError::Timeout(_)))
            )
    }
}

impl From<FrameError> for StreamError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => StreamError::Transport(err),
            other => StreamError::Frame(other),
        }
    }
}

fn transport_kind(err: &TransportError) -> ErrorKind {
    match err {
        TransportError::Connect { .. } | TransportError::Io(_) => ErrorKind::Connection,
        TransportError::Timeout(_) => ErrorKind::Timeout,
        TransportError::Eof => ErrorKind::Eof,
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;
