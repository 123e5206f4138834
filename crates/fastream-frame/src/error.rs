/// Errors that can occur while assembling or decoding blocks.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The underlying transport failed while a block was being assembled.
    #[error(transparent)]
    Transport(#[from] fastream_transport::TransportError),

    /// A byte block does not match the requested sample shape.
    #[error("block size mismatch ({actual} bytes, expected {expected})")]
    Decode { expected: usize, actual: usize },

    /// A channel id lies outside the 256-channel mask.
    #[error("channel id {0} out of range (must be below 256)")]
    ChannelOutOfRange(usize),

    /// A textual mask could not be parsed.
    #[error("invalid mask \"{input}\" at offset {offset}: {reason}")]
    InvalidMaskSpec {
        input: String,
        offset: usize,
        reason: String,
    },

    /// A delimited read exceeded its byte limit without finding the delimiter.
    #[error("delimiter not found within {limit} bytes")]
    LineTooLong { limit: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
