use bytes::Bytes;

use crate::error::Result;

/// A source of raw byte chunks with no framing knowledge.
///
/// Each call returns whatever one underlying read produced: partial
/// deliveries are expected and never an error. Implementations fail with
/// [`TransportError::Timeout`](crate::TransportError::Timeout) when nothing
/// arrives within their bound and with
/// [`TransportError::Eof`](crate::TransportError::Eof) once the peer has
/// closed the stream. A successful call never returns an empty chunk.
pub trait Receive {
    /// Wait for and return the next chunk of bytes.
    fn receive(&mut self) -> Result<Bytes>;
}

impl<R: Receive + ?Sized> Receive for &mut R {
    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }
}

impl<R: Receive + ?Sized> Receive for Box<R> {
    fn receive(&mut self) -> Result<Bytes> {
        (**self).receive()
    }
}
