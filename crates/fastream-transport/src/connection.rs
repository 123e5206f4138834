use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::traits::Receive;

/// Default upper bound on the bytes returned by a single receive.
pub const DEFAULT_MAX_CHUNK: usize = 64 * 1024;

/// Default bound on the wait for readability inside a receive.
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_secs(1);

/// Default bound on the wait for write space while sending a command.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// I/O parameters for a [`Connection`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum bytes taken from the socket per receive. Default: 64 KiB.
    pub max_chunk: usize,
    /// Per-call readability bound for [`Connection::receive`]. Default: 1s.
    pub receive_timeout: Duration,
    /// Per-call write-space bound for [`Connection::send`]. Default: 1s.
    pub write_timeout: Duration,
    /// Bound on establishing the TCP connection. `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_chunk: DEFAULT_MAX_CHUNK,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            connect_timeout: None,
        }
    }
}

/// A non-blocking TCP connection to an archiver.
///
/// Owns exactly one socket. Reads wait for readability with a bounded poll
/// and then perform a single read, so a caller never blocks longer than the
/// configured timeout. Bytes are returned as they arrive; framing is the
/// business of the layer above.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buf: BytesMut,
    config: ConnectionConfig,
}

impl Connection {
    /// Connect with default I/O parameters.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        Self::connect_with_config(host, port, ConnectionConfig::default())
    }

    /// Connect with explicit I/O parameters.
    pub fn connect_with_config(host: &str, port: u16, config: ConnectionConfig) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let connect_err = |source: std::io::Error| TransportError::Connect {
            addr: addr.clone(),
            source,
        };

        let stream = match config.connect_timeout {
            None => TcpStream::connect((host, port)).map_err(connect_err)?,
            Some(timeout) => {
                let candidates: Vec<SocketAddr> = (host, port)
                    .to_socket_addrs()
                    .map_err(connect_err)?
                    .collect();
                connect_first(&candidates, timeout).map_err(connect_err)?
            }
        };

        stream.set_nonblocking(true).map_err(connect_err)?;
        let peer = stream.peer_addr().map_err(connect_err)?;
        debug!(%peer, "connected to archiver");

        Ok(Self {
            stream,
            peer,
            buf: BytesMut::new(),
            config,
        })
    }

    /// Receive one chunk using the configured chunk size and timeout.
    pub fn receive(&mut self) -> Result<Bytes> {
        self.receive_with(self.config.max_chunk, self.config.receive_timeout)
    }

    /// Receive one chunk of at most `max_chunk` bytes, waiting up to `timeout`.
    ///
    /// Returns [`TransportError::Timeout`] if the socket does not become
    /// readable in time and [`TransportError::Eof`] on an orderly close.
    pub fn receive_with(&mut self, max_chunk: usize, timeout: Duration) -> Result<Bytes> {
        let max_chunk = max_chunk.max(1);
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if !wait_readable(&self.stream, remaining)? {
                return Err(TransportError::Timeout(timeout));
            }

            self.buf.resize(max_chunk, 0);
            match self.stream.read(&mut self.buf[..]) {
                Ok(0) => {
                    self.buf.clear();
                    debug!(peer = %self.peer, "archiver closed connection");
                    return Err(TransportError::Eof);
                }
                Ok(n) => {
                    self.buf.truncate(n);
                    trace!(bytes = n, "received chunk");
                    return Ok(self.buf.split().freeze());
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {
                    self.buf.clear();
                }
                // Readiness can be spurious; go back to waiting on what is left.
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    self.buf.clear();
                    if Instant::now() >= deadline {
                        return Err(TransportError::Timeout(timeout));
                    }
                }
                Err(err) => {
                    self.buf.clear();
                    return Err(TransportError::Io(err));
                }
            }
        }
    }

    /// Write all of `data`, waiting for write space within the write timeout.
    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        let timeout = self.config.write_timeout;
        let deadline = Instant::now() + timeout;
        let mut offset = 0usize;

        while offset < data.len() {
            match self.stream.write(&data[offset..]) {
                Ok(0) => return Err(TransportError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if !wait_writable(&self.stream, remaining)? {
                        return Err(TransportError::Timeout(timeout));
                    }
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        trace!(bytes = data.len(), "sent command");
        Ok(())
    }

    /// A handle that can shut this connection down from another thread.
    pub fn shutdown_handle(&self) -> Result<ShutdownHandle> {
        let stream = self.stream.try_clone()?;
        Ok(ShutdownHandle {
            stream: Arc::new(stream),
        })
    }

    /// Address of the connected archiver.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Current I/O parameters.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Update the per-call receive timeout.
    pub fn set_receive_timeout(&mut self, timeout: Duration) {
        self.config.receive_timeout = timeout;
    }

    /// Release the socket.
    pub fn close(self) {
        debug!(peer = %self.peer, "closing connection");
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}

impl Receive for Connection {
    fn receive(&mut self) -> Result<Bytes> {
        Connection::receive(self)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("config", &self.config)
            .finish()
    }
}

/// Cancels an outstanding receive on a [`Connection`] from another thread.
///
/// After [`shutdown`](ShutdownHandle::shutdown) the owning connection's
/// receive wakes up and fails with `Eof` (or an I/O error) instead of waiting
/// out its timeout.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stream: Arc<TcpStream>,
}

impl ShutdownHandle {
    /// Shut down both directions of the socket.
    pub fn shutdown(&self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }
}

fn connect_first(candidates: &[SocketAddr], timeout: Duration) -> std::io::Result<TcpStream> {
    let mut last_err = None;
    for addr in candidates {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        std::io::Error::new(ErrorKind::AddrNotAvailable, "host resolved to no addresses")
    }))
}

#[cfg(unix)]
fn wait_readable(stream: &TcpStream, timeout: Duration) -> Result<bool> {
    poll_fd(stream, libc::POLLIN, timeout)
}

#[cfg(unix)]
fn wait_writable(stream: &TcpStream, timeout: Duration) -> Result<bool> {
    poll_fd(stream, libc::POLLOUT, timeout)
}

/// Wait until `events` are signalled on the socket or `timeout` elapses.
///
/// Error and hang-up conditions count as ready so that the following read
/// reports them.
#[cfg(unix)]
fn poll_fd(stream: &TcpStream, events: libc::c_short, timeout: Duration) -> Result<bool> {
    use std::os::fd::AsRawFd;

    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let millis = remaining.as_micros().div_ceil(1000).min(libc::c_int::MAX as u128);
        let mut pfd = libc::pollfd {
            fd: stream.as_raw_fd(),
            events,
            revents: 0,
        };

        // SAFETY: `pfd` is a single valid pollfd for an open socket owned by
        // `stream`, which outlives the call.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis as libc::c_int) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(TransportError::Io(err));
        }
        return Ok(rc > 0);
    }
}

#[cfg(not(unix))]
fn wait_readable(stream: &TcpStream, timeout: Duration) -> Result<bool> {
    if timeout.is_zero() {
        return Ok(false);
    }
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(timeout))?;
    let mut probe = [0u8; 1];
    let ready = match stream.peek(&mut probe) {
        Ok(_) => Ok(true),
        Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => Ok(false),
        Err(err) => Err(TransportError::Io(err)),
    };
    stream.set_nonblocking(true)?;
    ready
}

#[cfg(not(unix))]
fn wait_writable(_stream: &TcpStream, timeout: Duration) -> Result<bool> {
    std::thread::sleep(timeout.min(Duration::from_millis(1)));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    fn quick_config() -> ConnectionConfig {
        ConnectionConfig {
            receive_timeout: Duration::from_millis(100),
            ..ConnectionConfig::default()
        }
    }

    #[test]
    fn connect_refused_is_connect_error() {
        let (listener, port) = listener();
        drop(listener);

        let err = Connection::connect("127.0.0.1", port).unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn receive_returns_bytes_sent_by_server() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            sock.write_all(b"hello").unwrap();
            thread::sleep(Duration::from_millis(200));
        });

        let mut conn = Connection::connect_with_config("127.0.0.1", port, quick_config()).unwrap();
        let mut got = Vec::new();
        while got.len() < 5 {
            got.extend_from_slice(&conn.receive().unwrap());
        }
        assert_eq!(got, b"hello");

        server.join().unwrap();
    }

    #[test]
    fn receive_respects_max_chunk() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            sock.write_all(&[7u8; 64]).unwrap();
            thread::sleep(Duration::from_millis(200));
        });

        let mut conn = Connection::connect("127.0.0.1", port).unwrap();
        let chunk = conn.receive_with(10, Duration::from_secs(2)).unwrap();
        assert!(!chunk.is_empty() && chunk.len() <= 10);

        server.join().unwrap();
    }

    #[test]
    fn silent_server_times_out_within_bound() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (_sock, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
        });

        let mut conn = Connection::connect("127.0.0.1", port).unwrap();
        let start = Instant::now();
        let err = conn
            .receive_with(DEFAULT_MAX_CHUNK, Duration::from_millis(50))
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(err.is_transient());
        assert!(start.elapsed() < Duration::from_millis(400));

        server.join().unwrap();
    }

    #[test]
    fn orderly_close_is_eof() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            drop(sock);
        });

        let mut conn = Connection::connect_with_config("127.0.0.1", port, quick_config()).unwrap();
        server.join().unwrap();

        let err = conn.receive_with(DEFAULT_MAX_CHUNK, Duration::from_secs(2)).unwrap_err();
        assert!(matches!(err, TransportError::Eof));
    }

    #[test]
    fn send_reaches_server() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            let mut buf = [0u8; 3];
            sock.read_exact(&mut buf).unwrap();
            buf
        });

        let mut conn = Connection::connect("127.0.0.1", port).unwrap();
        conn.send(b"CF\n").unwrap();

        assert_eq!(&server.join().unwrap(), b"CF\n");
    }

    #[test]
    fn shutdown_handle_interrupts_blocked_receive() {
        let (listener, port) = listener();
        let server = thread::spawn(move || {
            let (_sock, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_secs(2));
        });

        let mut conn = Connection::connect("127.0.0.1", port).unwrap();
        let handle = conn.shutdown_handle().unwrap();
        let canceller = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.shutdown().unwrap();
        });

        let start = Instant::now();
        let err = conn
            .receive_with(DEFAULT_MAX_CHUNK, Duration::from_secs(10))
            .unwrap_err();
        assert!(matches!(err, TransportError::Eof | TransportError::Io(_)));
        assert!(start.elapsed() < Duration::from_secs(2));

        canceller.join().unwrap();
        server.join().unwrap();
    }
}
