//! Archiver command protocol: subscriptions and parameter queries.
//!
//! A [`Subscription`] sends `SR<mask><flags>`, checks the archiver's status
//! byte and then yields [`SampleBlock`](fastream_frame::SampleBlock)s of the
//! requested size. The [`query`] functions send the short `CF`/`CC`/`CFC`
//! commands on one-shot connections. [`Server`] caches the archiver's
//! parameters and hands out subscriptions.
//!
//! ```no_run
//! use fastream_frame::ChannelMask;
//! use fastream_stream::{ServerConfig, SubscribeOptions, Subscription};
//!
//! let config = ServerConfig::default();
//! let mask: ChannelMask = "1-4".parse()?;
//! let mut sub = Subscription::subscribe(&config, mask, SubscribeOptions::default())?;
//! let block = sub.read(1000)?;
//! assert_eq!(block.shape(), [1000, 4, 2]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(feature = "async")]
pub mod async_subscription;
pub mod config;
pub mod error;
pub mod query;
pub mod server;
pub mod subscription;

#[cfg(test)]
mod mock;

#[cfg(feature = "async")]
pub use async_subscription::AsyncSubscription;
pub use config::{ServerConfig, DEFAULT_PORT, DEFAULT_SERVER};
pub use error::{ErrorKind, Result, StreamError};
pub use query::{decimation, sample_frequency, server_command, server_info, ServerInfo};
pub use server::Server;
pub use subscription::{
    subscribe_command, SubscribeOptions, Subscription, SubscriptionState, STATUS_OK,
};
