use bytes::{Bytes, BytesMut};
use fastream_transport::AsyncConnection;
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::queue::PendingQueue;
use crate::reader::reserve_for;

/// Tokio counterpart of [`BlockReader`](crate::BlockReader) over an
/// [`AsyncConnection`].
///
/// Dropping a pending `read_block` future abandons the block; bytes already
/// moved out of the queue by that call are lost, so a cancelled reader
/// should be discarded along with its subscription.
#[derive(Debug)]
pub struct AsyncBlockReader {
    inner: AsyncConnection,
    queue: PendingQueue,
}

impl AsyncBlockReader {
    pub fn new(inner: AsyncConnection) -> Self {
        Self {
            inner,
            queue: PendingQueue::new(),
        }
    }

    /// Read exactly `len` bytes.
    pub async fn read_block(&mut self, len: usize) -> Result<Bytes> {
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut out = BytesMut::new();
        loop {
            if out.is_empty() {
                if let Some(block) = self.queue.take_contiguous(len) {
                    return Ok(block);
                }
                out.reserve(reserve_for(len, self.queue.len()));
            }
            if self.queue.fill(&mut out, len) {
                return Ok(out.freeze());
            }
            self.refill(&mut out).await?;
        }
    }

    /// Read up to `delimiter`, returning the bytes before it.
    pub async fn read_until(&mut self, delimiter: u8, limit: usize) -> Result<Bytes> {
        let mut out = BytesMut::new();
        loop {
            if self.queue.fill_until(&mut out, delimiter) {
                return Ok(out.freeze());
            }
            if out.len() > limit {
                self.queue.push_front(out.freeze());
                return Err(FrameError::LineTooLong { limit });
            }
            self.refill(&mut out).await?;
        }
    }

    async fn refill(&mut self, partial: &mut BytesMut) -> Result<()> {
        match self.inner.receive().await {
            Ok(chunk) => {
                trace!(bytes = chunk.len(), pending = self.queue.len(), "queue refill");
                self.queue.push_back(chunk);
                Ok(())
            }
            Err(err) => {
                self.queue.push_front(partial.split().freeze());
                Err(FrameError::Transport(err))
            }
        }
    }

    /// Bytes received but not yet handed out.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Remove and return every byte received but not yet handed out.
    pub fn take_pending(&mut self) -> Bytes {
        self.queue.take_all()
    }

    pub fn get_ref(&self) -> &AsyncConnection {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut AsyncConnection {
        &mut self.inner
    }

    pub fn into_inner(self) -> AsyncConnection {
        self.inner
    }
}
