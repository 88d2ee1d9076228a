//! Startup validation of the proxy configuration.
//!
//! Errors stop the proxy from starting; warnings and suggestions are only
//! logged, since a test fixture is often run with deliberately odd settings.

use crate::config::Config;

/// Validation result
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl ValidationResult {
    pub fn success() -> Self {
        Self {
            is_valid: true,
            errors: vec![],
            warnings: vec![],
            suggestions: vec![],
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_suggestion(&mut self, suggestion: String) {
        self.suggestions.push(suggestion);
    }
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &Config) -> ValidationResult {
        let mut result = ValidationResult::success();

        Self::validate_relay(config, &mut result);
        Self::validate_identity(config, &mut result);
        Self::validate_limits(config, &mut result);

        result
    }

    fn validate_relay(config: &Config, result: &mut ValidationResult) {
        let relay = &config.relay;

        if relay.poll_interval_ms == 0 {
            result.add_error("relay.poll_interval_ms must be greater than 0".to_string());
        }
        if relay.chunk_size == 0 {
            result.add_error("relay.chunk_size must be greater than 0".to_string());
        } else if relay.chunk_size > 1024 * 1024 {
            result.add_warning(format!(
                "relay.chunk_size of {} bytes allocates that much per direction for every relay",
                relay.chunk_size
            ));
        }
        if relay.tunnel_idle_cycles == 0 {
            result.add_error("relay.tunnel_idle_cycles must be at least 1".to_string());
        }
        if relay.request_idle_cycles == 0 {
            result.add_error("relay.request_idle_cycles must be at least 1".to_string());
        }

        if relay.tunnel_idle_cycles > 0 && relay.tunnel_idle_cycles < relay.request_idle_cycles {
            result.add_warning(format!(
                "CONNECT tunnels ({} cycles) go idle sooner than plain requests ({} cycles)",
                relay.tunnel_idle_cycles, relay.request_idle_cycles
            ));
            result.add_suggestion(
                "Give tunnels the longer idle limit; they carry long-lived TLS sessions".to_string(),
            );
        }
    }

    fn validate_identity(config: &Config, result: &mut ValidationResult) {
        if config.server_version.trim().is_empty() {
            result.add_error("server_version cannot be empty".to_string());
        }
        if config.server_version.contains(['\r', '\n']) {
            result.add_error("server_version cannot contain line breaks".to_string());
        }
        if !config.protocol_version.starts_with("HTTP/") || config.protocol_version.contains(char::is_whitespace) {
            result.add_error(format!(
                "protocol_version '{}' is not an HTTP version token",
                config.protocol_version
            ));
        }
    }

    fn validate_limits(config: &Config, result: &mut ValidationResult) {
        if config.max_header_size < 1024 {
            result.add_error(format!(
                "max_header_size of {} bytes is too small for ordinary requests (minimum 1024)",
                config.max_header_size
            ));
        }
        if config.connect_timeout_secs == Some(0) {
            result.add_error("connect_timeout_secs must be greater than 0 when set".to_string());
        }
        if config.listen_addr.port() == 0 {
            result.add_suggestion(
                "listen_addr uses port 0; the proxy will pick a random port".to_string(),
            );
        }
    }
}
