//! Startup configuration handed to every component

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 4444;
pub const DEFAULT_TICK_DELAY_MS: u16 = 200;
pub const DEFAULT_LOG_FILE: &str = "snake-arena.log";

const DEFAULT_LISTEN_HOST: &str = "0.0.0.0";
const DEFAULT_CONNECT_HOST: &str = "127.0.0.1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Server,
    Client,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub role: Role,
    /// Bind host for the server, target host for the client
    pub host: Option<String>,
    pub port: u16,
    /// Only meaningful for the server; clients take the server's delay
    pub tick_delay_ms: u16,
    pub log_file: PathBuf,
}

impl Config {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            host: None,
            port: DEFAULT_PORT,
            tick_delay_ms: DEFAULT_TICK_DELAY_MS,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }

    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms as u64)
    }

    pub fn listen_address(&self) -> String {
        let host = self.host.as_deref().unwrap_or(DEFAULT_LISTEN_HOST);
        format!("{}:{}", host, self.port)
    }

    pub fn connect_address(&self) -> String {
        let host = self.host.as_deref().unwrap_or(DEFAULT_CONNECT_HOST);
        format!("{}:{}", host, self.port)
    }
}
