//! Channel masks, block reassembly and sample decoding.
//!
//! This layer turns the transport's irregular byte deliveries into the
//! archiver's logical units:
//! - [`ChannelMask`] selects up to 256 channels and renders the 64-digit hex
//!   wire form
//! - [`BlockReader`] assembles exactly-sized blocks, carrying leftovers forward
//! - [`SampleBlock`] views a block as `[samples, channels, 2]` signed values

#[cfg(feature = "async")]
pub mod async_reader;
pub mod error;
pub mod mask;
pub mod queue;
pub mod reader;
pub mod sample;

#[cfg(feature = "async")]
pub use async_reader::AsyncBlockReader;
pub use error::{FrameError, Result};
pub use mask::{ChannelMask, MASK_BYTES, MASK_CHANNELS, WIRE_MASK_LEN};
pub use queue::PendingQueue;
pub use reader::BlockReader;
pub use sample::{block_len, Axis, SampleBlock, AXES, CHANNEL_RECORD_SIZE, VALUE_SIZE};
