//! In-process archiver stand-in for protocol tests.

use std::io::Read;
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::config::ServerConfig;

pub(crate) type Script = dyn Fn(&mut TcpStream, &str) + Send + Sync + 'static;

/// Accepts `connections` clients in turn; for each one reads a single
/// newline-terminated command and hands it to the script.
pub(crate) struct MockArchiver {
    port: u16,
    handle: JoinHandle<Vec<String>>,
}

impl MockArchiver {
    pub(crate) fn spawn<F>(connections: usize, script: F) -> Self
    where
        F: Fn(&mut TcpStream, &str) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let script: Box<Script> = Box::new(script);

        let handle = thread::spawn(move || {
            let mut commands = Vec::new();
            for _ in 0..connections {
                let (mut sock, _) = listener.accept().unwrap();
                let command = read_command(&mut sock);
                script(&mut sock, &command);
                commands.push(command);
            }
            commands
        });

        Self { port, handle }
    }

    pub(crate) fn config(&self) -> ServerConfig {
        ServerConfig::new("127.0.0.1", self.port).with_receive_timeout(Duration::from_millis(500))
    }

    /// Commands received, one per accepted connection.
    pub(crate) fn join(self) -> Vec<String> {
        self.handle.join().unwrap()
    }
}

fn read_command(sock: &mut TcpStream) -> String {
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    while sock.read(&mut byte).unwrap() == 1 {
        if byte[0] == b'\n' {
            break;
        }
        line.push(byte[0]);
    }
    String::from_utf8(line).unwrap()
}

/// Little-endian encoding of sample values as the archiver sends them.
pub(crate) fn encode_samples(values: &[i32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}
