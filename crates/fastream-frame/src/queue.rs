use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};

/// Ordered, not-yet-consumed byte chunks.
///
/// Chunks are reference-counted [`Bytes`], so splitting one to carry a
/// remainder forward never copies. Appending and consuming are amortized
/// O(1) per chunk.
#[derive(Debug, Default)]
pub struct PendingQueue {
    chunks: VecDeque<Bytes>,
    len: usize,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total pending bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a chunk at the back. Empty chunks are dropped.
    pub fn push_back(&mut self, chunk: Bytes) {
        if !chunk.is_empty() {
            self.len += chunk.len();
            self.chunks.push_back(chunk);
        }
    }

    /// Return a chunk to the front, ahead of everything still queued.
    pub fn push_front(&mut self, chunk: Bytes) {
        if !chunk.is_empty() {
            self.len += chunk.len();
            self.chunks.push_front(chunk);
        }
    }

    fn pop_front(&mut self) -> Option<Bytes> {
        let chunk = self.chunks.pop_front()?;
        self.len -= chunk.len();
        Some(chunk)
    }

    /// Move bytes from the front into `out` until it holds `target` bytes.
    ///
    /// A chunk that would overshoot is split and its tail stays queued.
    /// Returns true once `out` is complete.
    pub fn fill(&mut self, out: &mut BytesMut, target: usize) -> bool {
        while out.len() < target {
            let Some(mut chunk) = self.pop_front() else {
                return false;
            };
            let need = target - out.len();
            if chunk.len() > need {
                self.push_front(chunk.split_off(need));
            }
            out.extend_from_slice(&chunk);
        }
        true
    }

    /// Take exactly `len` bytes without copying if the front chunk covers them.
    pub fn take_contiguous(&mut self, len: usize) -> Option<Bytes> {
        let front = self.chunks.front_mut()?;
        if front.len() < len {
            return None;
        }
        let taken = front.split_to(len);
        if front.is_empty() {
            self.chunks.pop_front();
        }
        self.len -= len;
        Some(taken)
    }

    /// Consume bytes up to and including `delimiter`, moving everything
    /// before it into `out`. Returns true once the delimiter was consumed;
    /// otherwise all pending bytes have been moved into `out`.
    pub fn fill_until(&mut self, out: &mut BytesMut, delimiter: u8) -> bool {
        while let Some(mut chunk) = self.pop_front() {
            if let Some(at) = chunk.iter().position(|&b| b == delimiter) {
                let rest = chunk.split_off(at + 1);
                self.push_front(rest);
                out.extend_from_slice(&chunk[..at]);
                return true;
            }
            out.extend_from_slice(&chunk);
        }
        false
    }

    /// Remove and return everything pending as one buffer.
    pub fn take_all(&mut self) -> Bytes {
        match self.chunks.len() {
            0 => Bytes::new(),
            1 => self.pop_front().unwrap_or_default(),
            _ => {
                let mut out = BytesMut::with_capacity(self.len);
                while let Some(chunk) = self.pop_front() {
                    out.extend_from_slice(&chunk);
                }
                out.freeze()
            }
        }
    }

    /// Drop everything pending.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.len = 0;
    }
}
