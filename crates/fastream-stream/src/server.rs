use fastream_frame::ChannelMask;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::Result;
use crate::query::{self, ServerInfo};
use crate::subscription::{SubscribeOptions, Subscription};

/// An archiver endpoint with its parameters fetched once up front.
///
/// Every operation opens its own connection; the proxy holds none.
#[derive(Debug, Clone)]
pub struct Server {
    config: ServerConfig,
    info: ServerInfo,
}

impl Server {
    /// Query the archiver's parameters and keep them for later use.
    pub fn connect(config: ServerConfig) -> Result<Self> {
        let info = query::server_info(&config)?;
        info!(
            endpoint = %config.endpoint(),
            sample_frequency = info.sample_frequency,
            decimation = info.decimation,
            "archiver parameters"
        );
        Ok(Self { config, info })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn info(&self) -> ServerInfo {
        self.info
    }

    pub fn sample_frequency(&self) -> f64 {
        self.info.sample_frequency
    }

    pub fn decimation(&self) -> u32 {
        self.info.decimation
    }

    /// Sample rate a subscription with `options` will deliver.
    pub fn stream_frequency(&self, options: SubscribeOptions) -> f64 {
        if options.decimated {
            self.info.decimated_frequency()
        } else {
            self.info.sample_frequency
        }
    }

    /// Send an arbitrary command; see [`query::server_command`].
    pub fn command(&self, command: &str) -> Result<String> {
        query::server_command(&self.config, command)
    }

    /// Open a new subscription on this archiver.
    pub fn subscribe(&self, mask: ChannelMask, options: SubscribeOptions) -> Result<Subscription> {
        Subscription::subscribe(&self.config, mask, options)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::mock::{encode_samples, MockArchiver};
    use crate::subscription::STATUS_OK;

    #[test]
    fn caches_parameters_and_subscribes() {
        let archiver = MockArchiver::spawn(2, |sock, command| {
            if command == "CFC" {
                sock.write_all(b"10000\n100\n").unwrap();
            } else {
                let mut reply = vec![STATUS_OK];
                reply.extend(encode_samples(&[7, 8]));
                sock.write_all(&reply).unwrap();
            }
        });

        let server = Server::connect(archiver.config()).unwrap();
        assert_eq!(server.sample_frequency(), 10000.0);
        assert_eq!(server.decimation(), 100);
        assert_eq!(server.stream_frequency(SubscribeOptions::decimated()), 100.0);
        assert_eq!(server.stream_frequency(SubscribeOptions::default()), 10000.0);

        let mask = ChannelMask::from_ids([42]).unwrap();
        let mut sub = server.subscribe(mask, SubscribeOptions::decimated()).unwrap();
        assert!(sub.is_decimated());
        assert_eq!(sub.read(1).unwrap().xy(0, 0), Some((7, 8)));

        let commands = archiver.join();
        assert_eq!(commands[0], "CFC");
        assert_eq!(commands[1], format!("SR{mask}D"));
    }

    #[test]
    fn connect_fails_on_garbage_parameters() {
        let archiver = MockArchiver::spawn(1, |sock, _| {
            sock.write_all(b"fast\nslow\n").unwrap();
        });

        assert!(Server::connect(archiver.config()).is_err());
        archiver.join();
    }
}
