use std::time::Duration;

use fastream_transport::{
    Connection, ConnectionConfig, DEFAULT_MAX_CHUNK, DEFAULT_RECEIVE_TIMEOUT,
    DEFAULT_WRITE_TIMEOUT,
};

use crate::error::Result;

/// Archiver host used when none is configured.
pub const DEFAULT_SERVER: &str = "fa-archiver.diamond.ac.uk";

/// Archiver port used when none is configured.
pub const DEFAULT_PORT: u16 = 8888;

/// Where the archiver lives and how to talk to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Archiver host name or address.
    pub host: String,
    /// Archiver TCP port.
    pub port: u16,
    /// Per-receive readability bound. Default: 1s.
    pub receive_timeout: Duration,
    /// Per-send write-space bound. Default: 1s.
    pub write_timeout: Duration,
    /// Largest chunk taken from the socket per receive. Default: 64 KiB.
    pub max_chunk: usize,
    /// Bound on establishing each connection. Default: none.
    pub connect_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SERVER.to_string(),
            port: DEFAULT_PORT,
            receive_timeout: DEFAULT_RECEIVE_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_chunk: DEFAULT_MAX_CHUNK,
            connect_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Default I/O parameters against an explicit endpoint.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_max_chunk(mut self, max_chunk: usize) -> Self {
        self.max_chunk = max_chunk;
        self
    }

    /// `host:port`, for logs and messages.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Transport parameters derived from this configuration.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            max_chunk: self.max_chunk,
            receive_timeout: self.receive_timeout,
            write_timeout: self.write_timeout,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Open a new connection to the configured archiver.
    pub fn connect(&self) -> Result<Connection> {
        Ok(Connection::connect_with_config(
            &self.host,
            self.port,
            self.connection_config(),
        )?)
    }

    /// Open a new tokio connection to the configured archiver.
    #[cfg(feature = "async")]
    pub async fn connect_async(&self) -> Result<fastream_transport::AsyncConnection> {
        Ok(fastream_transport::AsyncConnection::connect_with_config(
            &self.host,
            self.port,
            self.connection_config(),
        )
        .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_archiver_constants() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "fa-archiver.diamond.ac.uk");
        assert_eq!(config.port, 8888);
        assert_eq!(config.max_chunk, 65536);
        assert_eq!(config.receive_timeout, Duration::from_secs(1));
        assert_eq!(config.endpoint(), "fa-archiver.diamond.ac.uk:8888");
    }

    #[test]
    fn builders_flow_into_connection_config() {
        let config = ServerConfig::new("localhost", 9000)
            .with_receive_timeout(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_secs(3))
            .with_max_chunk(4096);
        let conn = config.connection_config();
        assert_eq!(conn.receive_timeout, Duration::from_millis(250));
        assert_eq!(conn.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(conn.max_chunk, 4096);
        assert_eq!(conn.write_timeout, DEFAULT_WRITE_TIMEOUT);
    }
}
