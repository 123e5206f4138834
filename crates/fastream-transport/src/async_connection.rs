use std::net::SocketAddr;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use crate::connection::ConnectionConfig;
use crate::error::{Result, TransportError};

/// Tokio counterpart of [`Connection`](crate::Connection).
///
/// Same failure model: a receive that sees no data within its bound fails
/// with `Timeout`, an orderly close with `Eof`. Cancellation is dropping the
/// pending future (or aborting the task that owns it).
pub struct AsyncConnection {
    stream: TcpStream,
    peer: SocketAddr,
    buf: BytesMut,
    config: ConnectionConfig,
}

impl AsyncConnection {
    /// Connect with default I/O parameters.
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(host, port, ConnectionConfig::default()).await
    }

    /// Connect with explicit I/O parameters.
    pub async fn connect_with_config(
        host: &str,
        port: u16,
        config: ConnectionConfig,
    ) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let connect = TcpStream::connect((host, port));
        let stream = match config.connect_timeout {
            None => connect.await,
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .unwrap_or_else(|_| Err(std::io::ErrorKind::TimedOut.into())),
        }
        .map_err(|source| TransportError::Connect {
            addr: addr.clone(),
            source,
        })?;

        let peer = stream
            .peer_addr()
            .map_err(|source| TransportError::Connect { addr, source })?;
        debug!(%peer, "connected to archiver");

        Ok(Self {
            stream,
            peer,
            buf: BytesMut::new(),
            config,
        })
    }

    /// Receive one chunk using the configured chunk size and timeout.
    pub async fn receive(&mut self) -> Result<Bytes> {
        self.receive_with(self.config.max_chunk, self.config.receive_timeout)
            .await
    }

    /// Receive one chunk of at most `max_chunk` bytes, waiting up to `timeout`.
    pub async fn receive_with(&mut self, max_chunk: usize, timeout: Duration) -> Result<Bytes> {
        self.buf.resize(max_chunk.max(1), 0);
        let read = tokio::time::timeout(timeout, self.stream.read(&mut self.buf[..])).await;

        match read {
            Err(_) => {
                self.buf.clear();
                Err(TransportError::Timeout(timeout))
            }
            Ok(Ok(0)) => {
                self.buf.clear();
                debug!(peer = %self.peer, "archiver closed connection");
                Err(TransportError::Eof)
            }
            Ok(Ok(n)) => {
                self.buf.truncate(n);
                trace!(bytes = n, "received chunk");
                Ok(self.buf.split().freeze())
            }
            Ok(Err(err)) => {
                self.buf.clear();
                Err(TransportError::Io(err))
            }
        }
    }

    /// Write all of `data` within the write timeout.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.config.write_timeout;
        tokio::time::timeout(timeout, self.stream.write_all(data))
            .await
            .map_err(|_| TransportError::Timeout(timeout))??;
        trace!(bytes = data.len(), "sent command");
        Ok(())
    }

    /// Address of the connected archiver.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Current I/O parameters.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Shut down the write side and release the socket.
    pub async fn close(mut self) {
        debug!(peer = %self.peer, "closing connection");
        let _ = self.stream.shutdown().await;
    }
}

impl std::fmt::Debug for AsyncConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncConnection")
            .field("peer", &self.peer)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn receive_then_eof() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"abc").await.unwrap();
        });

        let mut conn = AsyncConnection::connect("127.0.0.1", port).await.unwrap();
        server.await.unwrap();

        let mut got = Vec::new();
        loop {
            match conn.receive_with(1024, Duration::from_secs(2)).await {
                Ok(chunk) => got.extend_from_slice(&chunk),
                Err(TransportError::Eof) => break,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert_eq!(got, b"abc");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = tokio::spawn(async move {
            let (sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(300)).await;
            drop(sock);
        });

        let mut conn = AsyncConnection::connect("127.0.0.1", port).await.unwrap();
        let err = conn
            .receive_with(1024, Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));

        server.await.unwrap();
    }
}
