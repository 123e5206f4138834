//! Client for live archiver sample streams.
//!
//! fastream subscribes to a fixed set of the archiver's 256 channels and
//! delivers `[samples, channels, 2]` blocks of signed X/Y values, regardless
//! of how TCP chunks the stream.
//!
//! # Crate Structure
//!
//! - [`transport`]: non-blocking TCP connection with bounded receives
//! - [`frame`]: channel masks, block reassembly and sample decoding
//! - [`stream`]: subscriptions, parameter queries and the server proxy

/// Re-export transport types.
pub mod transport {
    pub use fastream_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fastream_frame::*;
}

/// Re-export subscription and query types.
pub mod stream {
    pub use fastream_stream::*;
}

pub use fastream_frame::{Axis, ChannelMask, SampleBlock};
pub use fastream_stream::{
    ErrorKind, Server, ServerConfig, StreamError, SubscribeOptions, Subscription,
};
