use bytes::{Bytes, BytesMut};
use fastream_transport::Receive;
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::queue::PendingQueue;

/// Up-front allocation for a block beyond what is already queued; larger
/// blocks grow as data arrives.
const RESERVE_AHEAD: usize = fastream_transport::DEFAULT_MAX_CHUNK;

pub(crate) fn reserve_for(len: usize, pending: usize) -> usize {
    len.min(pending.saturating_add(RESERVE_AHEAD))
}

/// Assembles irregular byte deliveries into exactly-sized blocks.
///
/// Bytes left over after a block stay queued for the next call, so nothing
/// is lost or duplicated no matter how the transport chunks the stream. The
/// only suspension point is the source's `receive`, bounded by its timeout.
///
/// If the source fails while a block is in progress the block is abandoned
/// and the bytes gathered so far go back to the front of the queue: after a
/// `Timeout` the next call resumes at the same stream offset.
pub struct BlockReader<R> {
    inner: R,
    queue: PendingQueue,
}

impl<R: Receive> BlockReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            queue: PendingQueue::new(),
        }
    }

    /// Read exactly `len` bytes.
    pub fn read_block(&mut self, len: usize) -> Result<Bytes> {
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
            self.refill(&mut out)?;
        }
    }

    /// Read up to `delimiter`, returning the bytes before it.
    ///
    /// The delimiter itself is consumed. Fails with
    /// [`FrameError::LineTooLong`] once more than `limit` bytes have been
    /// gathered without seeing it; those bytes stay pending.
    pub fn read_until(&mut self, delimiter: u8, limit: usize) -> Result<Bytes> {
        let mut out = BytesMut::new();
        loop {
            if self.queue.fill_until(&mut out, delimiter) {
                return Ok(out.freeze());
            }
            if out.len() > limit {
                self.queue.push_front(out.freeze());
                return Err(FrameError::LineTooLong { limit });
            }
            self.refill(&mut out)?;
        }
    }

    fn refill(&mut self, partial: &mut BytesMut) -> Result<()> {
        match self.inner.receive() {
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

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Consume the reader and return the source. Pending bytes are dropped.
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R> std::fmt::Debug for BlockReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockReader")
            .field("pending", &self.queue.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use fastream_transport::TransportError;

    use super::*;
    use crate::sample::SampleBlock;

    /// Delivers a fixed script of chunks, then fails with `tail`.
    struct Scripted {
        chunks: VecDeque<Bytes>,
        tail: fn() -> TransportError,
        calls: usize,
    }

    impl Scripted {
        fn new(chunks: Vec<Vec<u8>>, tail: fn() -> TransportError) -> Self {
            Self {
                chunks: chunks.into_iter().map(Bytes::from).collect(),
                tail,
                calls: 0,
            }
        }
    }

    impl Receive for Scripted {
        fn receive(&mut self) -> fastream_transport::Result<Bytes> {
            self.calls += 1;
            self.chunks.pop_front().ok_or_else(self.tail)
        }
    }

    fn eof() -> TransportError {
        TransportError::Eof
    }

    fn timeout() -> TransportError {
        TransportError::Timeout(Duration::from_millis(10))
    }

    fn stream_bytes(values: usize) -> Vec<u8> {
        (0..values as i32)
            .flat_map(|v| (v * 7919 - 40_000).to_le_bytes())
            .collect()
    }

    fn chunked(data: &[u8], sizes: &[usize]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut pos = 0;
        let mut i = 0;
        while pos < data.len() {
            let n = sizes[i % sizes.len()].min(data.len() - pos);
            out.push(data[pos..pos + n].to_vec());
            pos += n;
            i += 1;
        }
        out
    }

    #[test]
    fn any_chunking_decodes_like_single_delivery() {
        let (samples, channels) = (5usize, 3usize);
        let data = stream_bytes(samples * channels * 2);
        assert_eq!(data.len(), 8 * samples * channels);

        let mut single = BlockReader::new(Scripted::new(vec![data.clone()], eof));
        let reference = SampleBlock::decode(
            single.read_block(data.len()).unwrap(),
            samples,
            channels,
        )
        .unwrap();

        for sizes in [&[1][..], &[2], &[3], &[7], &[13, 1, 5], &[64, 1], &[119]] {
            let mut reader = BlockReader::new(Scripted::new(chunked(&data, sizes), eof));
            let raw = reader.read_block(data.len()).unwrap();
            let block = SampleBlock::decode(raw, samples, channels).unwrap();

            assert_eq!(block.to_vec().len(), samples * channels * 2);
            assert_eq!(block.to_vec(), reference.to_vec(), "chunk sizes {sizes:?}");
            assert_eq!(reader.pending(), 0);
        }
    }

    #[test]
    fn leftover_bytes_carry_into_next_block() {
        let data: Vec<u8> = (0u8..20).collect();
        let mut reader = BlockReader::new(Scripted::new(chunked(&data, &[6, 9]), eof));

        assert_eq!(reader.read_block(4).unwrap().as_ref(), &data[..4]);
        assert_eq!(reader.read_block(8).unwrap().as_ref(), &data[4..12]);
        assert_eq!(reader.read_block(8).unwrap().as_ref(), &data[12..20]);
        assert!(matches!(
            reader.read_block(1),
            Err(FrameError::Transport(TransportError::Eof))
        ));
    }

    #[test]
    fn short_stream_is_eof_never_partial() {
        let mut reader = BlockReader::new(Scripted::new(vec![vec![1; 10], vec![2; 5]], eof));
        let err = reader.read_block(16).unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Eof)));
    }

    #[test]
    fn silent_source_times_out() {
        let mut reader = BlockReader::new(Scripted::new(vec![], timeout));
        let err = reader.read_block(8).unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Timeout(_))));
        assert_eq!(reader.get_ref().calls, 1);
    }

    #[test]
    fn timeout_mid_block_keeps_stream_offset() {
        let data: Vec<u8> = (0u8..12).collect();
        let mut reader = BlockReader::new(Scripted::new(vec![data[..5].to_vec()], timeout));

        assert!(reader.read_block(8).is_err());
        assert_eq!(reader.pending(), 5);

        reader.get_mut().chunks.push_back(Bytes::from(data[5..].to_vec()));
        assert_eq!(reader.read_block(8).unwrap().as_ref(), &data[..8]);
        assert_eq!(reader.read_block(4).unwrap().as_ref(), &data[8..]);
    }

    #[test]
    fn zero_length_block_needs_no_io() {
        let mut reader = BlockReader::new(Scripted::new(vec![], eof));
        assert!(reader.read_block(0).unwrap().is_empty());
        assert_eq!(reader.get_ref().calls, 0);
    }

    #[test]
    fn read_until_across_chunks() {
        let mut reader = BlockReader::new(Scripted::new(
            vec![b"Ebad".to_vec(), b" mask\n".to_vec(), b"xy".to_vec()],
            eof,
        ));
        assert_eq!(reader.read_until(b'\n', 256).unwrap().as_ref(), b"Ebad mask");
        assert_eq!(reader.read_block(2).unwrap().as_ref(), b"xy");
    }

    #[test]
    fn read_until_enforces_limit() {
        let mut reader = BlockReader::new(Scripted::new(vec![vec![b'a'; 32]], eof));
        assert!(matches!(
            reader.read_until(b'\n', 16),
            Err(FrameError::LineTooLong { limit: 16 })
        ));
        assert_eq!(reader.pending(), 32);
        assert_eq!(reader.take_pending().as_ref(), &[b'a'; 32][..]);
    }

    #[test]
    fn huge_block_fails_without_allocating_it() {
        let mut reader = BlockReader::new(Scripted::new(vec![vec![7; 100]], eof));
        let err = reader.read_block(usize::MAX / 2).unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Eof)));
        assert_eq!(reader.pending(), 100);
    }

    #[test]
    fn reservation_is_bounded() {
        assert_eq!(reserve_for(16, 0), 16);
        assert_eq!(reserve_for(usize::MAX, 10), 10 + RESERVE_AHEAD);
        assert_eq!(reserve_for(usize::MAX, usize::MAX), usize::MAX);
    }

    #[test]
    fn reads_over_real_socket() {
        use std::io::Write;
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let data = stream_bytes(4 * 2 * 2);
        let payload = data.clone();
        let server = std::thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            for piece in payload.chunks(5) {
                sock.write_all(piece).unwrap();
                sock.flush().unwrap();
                std::thread::sleep(Duration::from_millis(2));
            }
        });

        let conn = fastream_transport::Connection::connect("127.0.0.1", port).unwrap();
        let mut reader = BlockReader::new(conn);
        let raw = reader.read_block(data.len()).unwrap();
        assert_eq!(raw.as_ref(), data.as_slice());

        server.join().unwrap();
        let err = reader.read_block(1).unwrap_err();
        assert!(matches!(err, FrameError::Transport(TransportError::Eof)));
    }
}
