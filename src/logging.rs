use crate::config::{LogFormat, LogLevel, LoggingConfig};
use chrono::{DateTime, Utc};
use http::StatusCode;
use log::info;
use serde_json::json;
use std::io::Write;
use std::net::SocketAddr;

/// Log target of the per-request access lines.
pub const ACCESS_TARGET: &str = "access";

/// Initialises `env_logger` from the logging config. `RUST_LOG` still wins
/// over the configured level when it is set.
pub fn init(config: Option<&LoggingConfig>) -> Result<(), Box<dyn std::error::Error>> {
    let level = config.and_then(|c| c.level.clone()).unwrap_or_default();
    let format = config.and_then(|c| c.format.clone()).unwrap_or_default();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level.to_string()));

    if format == LogFormat::Json {
        builder.format(|buf, record| {
            let timestamp: DateTime<Utc> = Utc::now();
            let timestamp_str = timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
            let log_entry = json!({
                "timestamp": timestamp_str,
                "level": record.level().to_string().to_lowercase(),
                "target": record.target(),
                "message": record.args().to_string(),
            });
            writeln!(buf, "{}", log_entry)
        });
    }

    builder.try_init()?;
    Ok(())
}

// Parse string to LogLevel
pub fn parse_log_level(s: &str) -> Result<LogLevel, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "trace" => Ok(LogLevel::Trace),
        "debug" => Ok(LogLevel::Debug),
        "info" => Ok(LogLevel::Info),
        "warn" => Ok(LogLevel::Warn),
        "error" => Ok(LogLevel::Error),
        _ => Err(format!("Invalid log level: {}. Must be one of: trace, debug, info, warn, error", s).into()),
    }
}

// Parse string to LogFormat
pub fn parse_log_format(s: &str) -> Result<LogFormat, Box<dyn std::error::Error>> {
    match s.to_lowercase().as_str() {
        "text" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        _ => Err(format!("Invalid log format: {}. Must be one of: text, json", s).into()),
    }
}

/// Formats one access-log line in common log style:
/// `<peer> - - "<request line>" <status> -`.
///
/// A missing status is printed as `-`: plain requests are relayed without
/// the proxy ever seeing the destination's status line.
pub fn access_line(peer: SocketAddr, request_line: &str, status: Option<StatusCode>) -> String {
    let status = status
        .map(|s| s.as_u16().to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{} - - \"{}\" {} -", peer.ip(), request_line, status)
}

/// Logs a completed request and flushes right away so lines from concurrent
/// connections come out in the order their requests completed.
pub fn log_access(peer: SocketAddr, request_line: &str, status: Option<StatusCode>) {
    info!(target: ACCESS_TARGET, "{}", access_line(peer, request_line, status));
    log::logger().flush();
}
