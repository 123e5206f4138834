use std::time::Duration;

use clap::{Args, Subcommand};
use fastream_stream::{ServerConfig, DEFAULT_PORT, DEFAULT_SERVER};

use crate::exit::{CliError, CliResult};
use crate::output::OutputFormat;

pub mod capture;
pub mod info;
pub mod mask;
pub mod query;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the archiver's sample frequency and decimation.
    Info(InfoArgs),
    /// Send a raw command and print the reply.
    Query(QueryArgs),
    /// Parse a channel list and print its wire mask.
    Mask(MaskArgs),
    /// Subscribe to channels and print sample blocks.
    Capture(CaptureArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, format),
        Command::Query(args) => query::run(args, format),
        Command::Mask(args) => mask::run(args, format),
        Command::Capture(args) => capture::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ServerArgs {
    /// Archiver host.
    #[arg(long, short = 's', env = "FASTREAM_SERVER", default_value = DEFAULT_SERVER)]
    pub server: String,
    /// Archiver port.
    #[arg(long, short = 'p', env = "FASTREAM_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    /// Receive timeout per socket read (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Connection establishment timeout (e.g. 5s).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

impl ServerArgs {
    pub fn config(&self) -> CliResult<ServerConfig> {
        Ok(ServerConfig::new(self.server.clone(), self.port)
            .with_receive_timeout(parse_duration(&self.timeout)?)
            .with_connect_timeout(parse_duration(&self.connect_timeout)?))
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Command text, sent with a trailing newline (e.g. CF, CC).
    pub command: String,
    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Args, Debug)]
pub struct MaskArgs {
    /// Channel list, e.g. "0-3,17" or "0x10-0x1f".
    pub spec: String,
}

#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Channel list, e.g. "0-3,17".
    pub mask: String,
    /// Samples per block.
    #[arg(long, short = 'n')]
    pub samples: usize,
    /// Stop after this many blocks. Default: run until interrupted.
    #[arg(long)]
    pub blocks: Option<u64>,
    /// Subscribe to the decimated stream.
    #[arg(long)]
    pub decimated: bool,
    /// Ask the archiver not to buffer the stream.
    #[arg(long)]
    pub uncork: bool,
    /// Resubscribe after stream failures instead of exiting.
    #[arg(long)]
    pub follow: bool,
    /// Pause before resubscribing when --follow is set (e.g. 1s, 200ms).
    #[arg(long, default_value = "1s")]
    pub retry_delay: String,
    #[command(flatten)]
    pub server: ServerArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `5s`, `150ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::usage("duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}
