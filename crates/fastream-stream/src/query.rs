use fastream_frame::{BlockReader, FrameError};
use fastream_transport::TransportError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ServerConfig;
use crate::error::{Result, StreamError};

/// Query the sample frequency.
pub const SAMPLE_FREQUENCY_COMMAND: &str = "CF";

/// Query the decimation factor.
pub const DECIMATION_COMMAND: &str = "CC";

/// Query frequency and decimation together (two reply lines, in that order).
pub const SERVER_INFO_COMMAND: &str = "CFC";

const MAX_REPLY_LINE: usize = 4096;

/// Parameters reported by the combined query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Raw sample frequency in Hz.
    pub sample_frequency: f64,
    /// Server-side decimation factor.
    pub decimation: u32,
}

impl ServerInfo {
    /// Sample frequency of the decimated stream.
    pub fn decimated_frequency(&self) -> f64 {
        if self.decimation == 0 {
            return self.sample_frequency;
        }
        self.sample_frequency / self.decimation as f64
    }
}

/// Send one command on a fresh connection and return the first reply chunk
/// as text.
///
/// `command` is sent with a trailing newline appended. The connection is
/// closed before returning.
pub fn server_command(config: &ServerConfig, command: &str) -> Result<String> {
    let mut conn = config.connect()?;
    conn.send(format!("{command}\n").as_bytes())?;
    let reply = conn.receive();
    conn.close();

    let reply = reply?;
    debug!(command, bytes = reply.len(), "archiver replied");
    Ok(String::from_utf8_lossy(&reply).into_owned())
}

/// Send one command and read exactly `lines` newline-terminated reply lines.
///
/// Replies split across several deliveries are reassembled. If the archiver
/// closes early, the lines received so far are returned.
pub fn query_lines(config: &ServerConfig, command: &str, lines: usize) -> Result<Vec<String>> {
    let mut conn = config.connect()?;
    conn.send(format!("{command}\n").as_bytes())?;

    let mut reader = BlockReader::new(conn);
    let mut out = Vec::with_capacity(lines);
    while out.len() < lines {
        match reader.read_until(b'\n', MAX_REPLY_LINE) {
            Ok(line) => out.push(String::from_utf8_lossy(&line).into_owned()),
            Err(FrameError::Transport(TransportError::Eof)) => {
                let tail = reader.take_pending();
                if !tail.is_empty() {
                    out.push(String::from_utf8_lossy(&tail).into_owned());
                }
                break;
            }
            Err(err) => {
                reader.into_inner().close();
                return Err(err.into());
            }
        }
    }
    reader.into_inner().close();

    debug!(command, lines = out.len(), "archiver replied");
    Ok(out)
}

/// The archiver's sample frequency.
pub fn sample_frequency(config: &ServerConfig) -> Result<f64> {
    let reply = query_lines(config, SAMPLE_FREQUENCY_COMMAND, 1)?;
    parse_frequency(first_line(&reply)?)
}

/// The archiver's decimation factor.
pub fn decimation(config: &ServerConfig) -> Result<u32> {
    let reply = query_lines(config, DECIMATION_COMMAND, 1)?;
    parse_decimation(first_line(&reply)?)
}

/// Frequency and decimation in one round trip.
pub fn server_info(config: &ServerConfig) -> Result<ServerInfo> {
    let reply = query_lines(config, SERVER_INFO_COMMAND, 2)?;
    parse_server_info(&reply)
}

/// Parse a frequency reply line.
pub fn parse_frequency(line: &str) -> Result<f64> {
    line.trim()
        .parse::<f64>()
        .map_err(|_| StreamError::Protocol(line.trim_end().to_string()))
}

/// Parse a decimation reply line.
pub fn parse_decimation(line: &str) -> Result<u32> {
    line.trim()
        .parse::<u32>()
        .map_err(|_| StreamError::Protocol(line.trim_end().to_string()))
}

/// Parse the two combined-query lines: frequency first, decimation second.
pub fn parse_server_info<S: AsRef<str>>(lines: &[S]) -> Result<ServerInfo> {
    match lines {
        [frequency, decimation, ..] => Ok(ServerInfo {
            sample_frequency: parse_frequency(frequency.as_ref())?,
            decimation: parse_decimation(decimation.as_ref())?,
        }),
        [only] => Err(StreamError::Protocol(only.as_ref().trim_end().to_string())),
        [] => Err(StreamError::Protocol("empty reply".to_string())),
    }
}

fn first_line(lines: &[String]) -> Result<&str> {
    lines
        .first()
        .map(String::as_str)
        .ok_or_else(|| StreamError::Protocol("empty reply".to_string()))
}

/// Tokio counterpart of [`server_command`].
#[cfg(feature = "async")]
pub async fn server_command_async(config: &ServerConfig, command: &str) -> Result<String> {
    let mut conn = config.connect_async().await?;
    conn.send(format!("{command}\n").as_bytes()).await?;
    let reply = conn.receive().await;
    conn.close().await;
    Ok(String::from_utf8_lossy(&reply?).into_owned())
}

/// Tokio counterpart of [`query_lines`].
#[cfg(feature = "async")]
pub async fn query_lines_async(
    config: &ServerConfig,
    command: &str,
    lines: usize,
) -> Result<Vec<String>> {
    let mut conn = config.connect_async().await?;
    conn.send(format!("{command}\n").as_bytes()).await?;

    let mut reader = fastream_frame::AsyncBlockReader::new(conn);
    let mut out = Vec::with_capacity(lines);
    while out.len() < lines {
        match reader.read_until(b'\n', MAX_REPLY_LINE).await {
            Ok(line) => out.push(String::from_utf8_lossy(&line).into_owned()),
            Err(FrameError::Transport(TransportError::Eof)) => {
                let tail = reader.take_pending();
                if !tail.is_empty() {
                    out.push(String::from_utf8_lossy(&tail).into_owned());
                }
                break;
            }
            Err(err) => return Err(err.into()),
        }
    }
    reader.into_inner().close().await;
    Ok(out)
}

/// Tokio counterpart of [`server_info`].
#[cfg(feature = "async")]
pub async fn server_info_async(config: &ServerConfig) -> Result<ServerInfo> {
    let reply = query_lines_async(config, SERVER_INFO_COMMAND, 2).await?;
    parse_server_info(&reply)
}
