use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::time::Duration;

pub const DEFAULT_PORT: u16 = 3128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Text
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub format: Option<LogFormat>,
}

/// Relay pump tuning.
///
/// A relay ends after `*_idle_cycles` consecutive polls of `poll_interval_ms`
/// in which neither side sent anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Idle limit for CONNECT tunnels, which are expected to live long
    #[serde(default = "default_tunnel_idle_cycles")]
    pub tunnel_idle_cycles: u32,
    /// Idle limit for plain requests, which should complete quickly
    #[serde(default = "default_request_idle_cycles")]
    pub request_idle_cycles: u32,
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_chunk_size() -> usize {
    8192
}

fn default_tunnel_idle_cycles() -> u32 {
    300
}

fn default_request_idle_cycles() -> u32 {
    20
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            chunk_size: default_chunk_size(),
            tunnel_idle_cycles: default_tunnel_idle_cycles(),
            request_idle_cycles: default_request_idle_cycles(),
        }
    }
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Sent as `Proxy-agent` on CONNECT and as `Server` on error responses
    #[serde(default = "default_server_version")]
    pub server_version: String,
    /// Version token of the responses the proxy writes itself
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    // Unset means the platform connect timeout applies
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    #[serde(default = "default_max_header_size")]
    pub max_header_size: usize,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

fn default_server_version() -> String {
    "testsproxy/1.0".to_string()
}

fn default_protocol_version() -> String {
    "HTTP/1.0".to_string()
}

fn default_max_header_size() -> usize {
    64 * 1024
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            server_version: default_server_version(),
            protocol_version: default_protocol_version(),
            connect_timeout_secs: None,
            max_header_size: default_max_header_size(),
            relay: RelayConfig::default(),
            logging: None,
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_fixture() {
        let config = Config::default();
        assert_eq!(config.listen_addr.port(), 3128);
        assert_eq!(config.server_version, "testsproxy/1.0");
        assert_eq!(config.protocol_version, "HTTP/1.0");
        assert_eq!(config.relay.poll_interval(), Duration::from_secs(3));
        assert_eq!(config.relay.chunk_size, 8192);
        assert_eq!(config.relay.tunnel_idle_cycles, 300);
        assert_eq!(config.relay.request_idle_cycles, 20);
        assert!(config.connect_timeout().is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(
            r#"{ "listen_addr": "127.0.0.1:8888", "relay": { "tunnel_idle_cycles": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8888".parse().unwrap());
        assert_eq!(config.relay.tunnel_idle_cycles, 5);
        assert_eq!(config.relay.request_idle_cycles, 20);
        assert_eq!(config.max_header_size, 64 * 1024);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proxy.json");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.connect_timeout_secs = Some(7);
        config.logging = Some(LoggingConfig {
            level: Some(LogLevel::Debug),
            format: Some(LogFormat::Json),
        });
        config.to_file(path).unwrap();

        let loaded = Config::from_file(path).unwrap();
        assert_eq!(loaded.connect_timeout(), Some(Duration::from_secs(7)));
        let logging = loaded.logging.unwrap();
        assert_eq!(logging.level, Some(LogLevel::Debug));
        assert_eq!(logging.format, Some(LogFormat::Json));
    }
}
