use std::fmt;

use fastream_frame::FrameError;
use fastream_stream::{ErrorKind, StreamError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PROTOCOL_ERROR: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn code_for(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Connection => TRANSPORT_ERROR,
        ErrorKind::Timeout => TIMEOUT,
        ErrorKind::Eof => FAILURE,
        ErrorKind::Protocol | ErrorKind::Decode => PROTOCOL_ERROR,
        ErrorKind::InvalidMask => USAGE,
    }
}

pub fn stream_error(context: &str, err: StreamError) -> CliError {
    CliError::new(code_for(err.kind()), format!("{context}: {err}"))
}

pub fn mask_error(input: &str, err: FrameError) -> CliError {
    CliError::usage(format!("invalid mask {input:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use fastream_transport::TransportError;

    use super::*;

    #[test]
    fn stream_errors_map_to_exit_codes() {
        let timeout = StreamError::from(TransportError::Timeout(Duration::from_secs(1)));
        assert_eq!(stream_error("read", timeout).code, TIMEOUT);

        let refused = StreamError::from(TransportError::Connect {
            addr: "127.0.0.1:1".into(),
            source: std::io::ErrorKind::ConnectionRefused.into(),
        });
        let err = stream_error("connect failed", refused);
        assert_eq!(err.code, TRANSPORT_ERROR);
        assert!(err.message.starts_with("connect failed: "));

        let rejected = StreamError::Protocol("Ebad".into());
        assert_eq!(stream_error("subscribe", rejected).code, PROTOCOL_ERROR);
        assert_eq!(code_for(ErrorKind::Eof), FAILURE);
    }
}
