use std::net::SocketAddr;

use fastream_frame::{block_len, BlockReader, ChannelMask, FrameError, SampleBlock};
use fastream_transport::{Connection, ShutdownHandle, TransportError};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{ErrorKind, Result, StreamError};

/// Prefix of the stream-setup command.
pub const SUBSCRIBE_COMMAND: &str = "SR";

/// Status byte the archiver sends when it accepts a command.
pub const STATUS_OK: u8 = 0x00;

/// Upper bound on an error message following a non-zero status byte.
pub const MAX_ERROR_MESSAGE: usize = 4096;

/// Stream flags sent after the mask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Request the server-side decimated stream (`D`).
    pub decimated: bool,
    /// Ask the server not to buffer the stream (`U`).
    pub uncork: bool,
}

impl SubscribeOptions {
    pub fn decimated() -> Self {
        Self {
            decimated: true,
            ..Self::default()
        }
    }

    /// Flag letters in wire order.
    pub fn flags(&self) -> &'static str {
        match (self.uncork, self.decimated) {
            (false, false) => "",
            (true, false) => "U",
            (false, true) => "D",
            (true, true) => "UD",
        }
    }
}

/// The complete newline-terminated subscribe command.
pub fn subscribe_command(mask: &ChannelMask, options: SubscribeOptions) -> String {
    format!("{SUBSCRIBE_COMMAND}{mask}{}\n", options.flags())
}

/// Lifecycle of a subscription.
///
/// `Connecting` and `Negotiating` only exist inside [`Subscription::subscribe`];
/// a caller holds either a `Streaming` subscription or a `Failed` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Connecting,
    Negotiating,
    Streaming,
    Failed(ErrorKind),
}

/// A live sample stream for a fixed set of channels.
///
/// Any transport failure while streaming is fatal: the subscription moves to
/// `Failed` and every later read reports [`StreamError::Failed`] without
/// touching the socket. Replace it with a fresh subscription, which always
/// starts from the archiver's current sample.
pub struct Subscription {
    reader: BlockReader<Connection>,
    mask: ChannelMask,
    channels: usize,
    options: SubscribeOptions,
    state: SubscriptionState,
}

impl Subscription {
    /// Connect to the archiver and subscribe to `mask`.
    pub fn subscribe(
        config: &ServerConfig,
        mask: ChannelMask,
        options: SubscribeOptions,
    ) -> Result<Self> {
        debug!(endpoint = %config.endpoint(), state = ?SubscriptionState::Connecting, "subscribing");
        let conn = config.connect()?;
        Self::negotiate(conn, mask, options)
    }

    /// Subscribe over an already established connection.
    pub fn negotiate(
        mut conn: Connection,
        mask: ChannelMask,
        options: SubscribeOptions,
    ) -> Result<Self> {
        debug!(mask = %mask, flags = options.flags(), state = ?SubscriptionState::Negotiating, "sending subscribe command");
        conn.send(subscribe_command(&mask, options).as_bytes())?;

        let mut reader = BlockReader::new(conn);
        let status = reader.read_block(1)?[0];
        if status != STATUS_OK {
            let message = read_error_message(&mut reader, status);
            warn!(%message, "archiver rejected subscription");
            reader.into_inner().close();
            return Err(StreamError::Protocol(message));
        }

        let channels = mask.count();
        info!(
            channels,
            decimated = options.decimated,
            peer = %reader.get_ref().peer_addr(),
            "subscription streaming"
        );

        Ok(Self {
            reader,
            mask,
            channels,
            options,
            state: SubscriptionState::Streaming,
        })
    }

    /// Read the next `samples` samples as a `[samples, channels, 2]` block.
    pub fn read(&mut self, samples: usize) -> Result<SampleBlock> {
        if let SubscriptionState::Failed(kind) = self.state {
            return Err(StreamError::Failed(kind));
        }

        let len = block_len(samples, self.channels).ok_or(FrameError::Decode {
            expected: usize::MAX,
            actual: 0,
        })?;

        match self.reader.read_block(len) {
            Ok(raw) => Ok(SampleBlock::decode(raw, samples, self.channels)?),
            Err(err) => {
                let err = StreamError::from(err);
                self.state = SubscriptionState::Failed(err.kind());
                debug!(error = %err, "subscription failed");
                Err(err)
            }
        }
    }

    /// Selected channels.
    pub fn mask(&self) -> &ChannelMask {
        &self.mask
    }

    /// Channel ids in decoded column order (ascending).
    pub fn channel_ids(&self) -> Vec<usize> {
        self.mask.iter().collect()
    }

    /// Channels per sample.
    pub fn channel_count(&self) -> usize {
        self.channels
    }

    /// Per-sample record shape, `[channels, 2]`.
    pub fn record_shape(&self) -> [usize; 2] {
        [self.channels, fastream_frame::AXES]
    }

    pub fn is_decimated(&self) -> bool {
        self.options.decimated
    }

    pub fn options(&self) -> SubscribeOptions {
        self.options
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.reader.get_ref().peer_addr()
    }

    /// A handle that aborts a blocked [`read`](Self::read) from another thread.
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        Ok(self.reader.get_ref().shutdown_handle()?)
    }

    /// Close the stream.
    pub fn close(self) {
        self.reader.into_inner().close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("mask", &self.mask)
            .field("options", &self.options)
            .field("state", &self.state)
            .field("reader", &self.reader)
            .finish()
    }
}

/// Status byte plus the text up to (excluding) the trailing newline.
fn read_error_message(reader: &mut BlockReader<Connection>, status: u8) -> String {
    let line = reader.read_until(b'\n', MAX_ERROR_MESSAGE);
    let pending = reader.take_pending();
    rejection_message(status, line.as_deref(), &pending)
}

/// Build the rejection text from the status byte and the attempt to read the
/// rest of the line.
///
/// If the archiver hangs up, goes quiet or overruns the limit before the
/// newline, whatever text did arrive (`pending`) is used.
pub(crate) fn rejection_message(
    status: u8,
    line: std::result::Result<&[u8], &FrameError>,
    pending: &[u8],
) -> String {
    let mut raw = vec![status];
    match line {
        Ok(text) => raw.extend_from_slice(text),
        Err(FrameError::Transport(TransportError::Eof | TransportError::Timeout(_)))
        | Err(FrameError::LineTooLong { .. }) => raw.extend_from_slice(pending),
        Err(err) => debug!(error = %err, "failed reading archiver error text"),
    }
    String::from_utf8_lossy(&raw).into_owned()
}
