//! Non-blocking TCP transport for archiver streams.
//!
//! This is the lowest layer of fastream. A [`Connection`] owns one socket,
//! waits for readability with a bounded poll, and hands back whatever bytes a
//! single read produced. It knows nothing about blocks, masks or commands.
//!
//! Failures are reported as [`TransportError`]: `Connect` when the socket
//! cannot be established, `Timeout` when nothing arrives within the per-call
//! bound (transient), and `Eof` when the archiver closes the stream.

#[cfg(feature = "async")]
pub mod async_connection;
pub mod connection;
pub mod error;
pub mod traits;

#[cfg(feature = "async")]
pub use async_connection::AsyncConnection;
pub use connection::{
    Connection, ConnectionConfig, ShutdownHandle, DEFAULT_MAX_CHUNK, DEFAULT_RECEIVE_TIMEOUT,
    DEFAULT_WRITE_TIMEOUT,
};
pub use error::{Result, TransportError};
pub use traits::Receive;
