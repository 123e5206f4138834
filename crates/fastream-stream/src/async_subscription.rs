use std::net::SocketAddr;

use fastream_frame::{block_len, AsyncBlockReader, ChannelMask, FrameError, SampleBlock};
use fastream_transport::AsyncConnection;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::{Result, StreamError};
use crate::subscription::{
    rejection_message, subscribe_command, SubscribeOptions, SubscriptionState,
    MAX_ERROR_MESSAGE, STATUS_OK,
};

/// Tokio counterpart of [`Subscription`](crate::Subscription).
///
/// Same negotiation, decoding and sticky failure. Dropping an in-flight
/// [`read`](Self::read) is cancellation: the subscription should then be
/// closed, since the stream position is no longer known.
#[derive(Debug)]
pub struct AsyncSubscription {
    reader: AsyncBlockReader,
    mask: ChannelMask,
    channels: usize,
    options: SubscribeOptions,
    state: SubscriptionState,
}

impl AsyncSubscription {
    pub async fn subscribe(
        config: &ServerConfig,
        mask: ChannelMask,
        options: SubscribeOptions,
    ) -> Result<Self> {
        debug!(endpoint = %config.endpoint(), "subscribing");
        let conn = config.connect_async().await?;
        Self::negotiate(conn, mask, options).await
    }

    pub async fn negotiate(
        mut conn: AsyncConnection,
        mask: ChannelMask,
        options: SubscribeOptions,
    ) -> Result<Self> {
        conn.send(subscribe_command(&mask, options).as_bytes()).await?;

        let mut reader = AsyncBlockReader::new(conn);
        let status = reader.read_block(1).await?[0];
        if status != STATUS_OK {
            let line = reader.read_until(b'\n', MAX_ERROR_MESSAGE).await;
            let pending = reader.take_pending();
            let message = rejection_message(status, line.as_deref(), &pending);
            warn!(%message, "archiver rejected subscription");
            reader.into_inner().close().await;
            return Err(StreamError::Protocol(message));
        }

        let channels = mask.count();
        info!(channels, decimated = options.decimated, "subscription streaming");
        Ok(Self {
            reader,
            mask,
            channels,
            options,
            state: SubscriptionState::Streaming,
        })
    }

    /// Read the next `samples` samples as a `[samples, channels, 2]` block.
    pub async fn read(&mut self, samples: usize) -> Result<SampleBlock> {
        if let SubscriptionState::Failed(kind) = self.state {
            return Err(StreamError::Failed(kind));
        }

        let len = block_len(samples, self.channels).ok_or(FrameError::Decode {
            expected: usize::MAX,
            actual: 0,
        })?;

        match self.reader.read_block(len).await {
            Ok(raw) => Ok(SampleBlock::decode(raw, samples, self.channels)?),
            Err(err) => {
                let err = StreamError::from(err);
                self.state = SubscriptionState::Failed(err.kind());
                debug!(error = %err, "subscription failed");
                Err(err)
            }
        }
    }

    pub fn mask(&self) -> &ChannelMask {
        &self.mask
    }

    pub fn channel_ids(&self) -> Vec<usize> {
        self.mask.iter().collect()
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn is_decimated(&self) -> bool {
        self.options.decimated
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.reader.get_ref().peer_addr()
    }

    pub async fn close(self) {
        self.reader.into_inner().close().await;
    }
}
