use http::StatusCode;
use std::time::SystemTime;

/// Preamble written to the client once a CONNECT destination is reachable.
/// Tunneled bytes follow it directly; there is no body.
pub fn connection_established(protocol_version: &str, proxy_agent: &str) -> Vec<u8> {
    format!(
        "{} 200 Connection established\r\nProxy-agent: {}\r\n\r\n",
        protocol_version, proxy_agent
    )
    .into_bytes()
}

/// Error response the proxy generates itself, always followed by a close.
#[derive(Debug, Clone)]
pub struct ErrorResponse {
    pub status: StatusCode,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Encodes status line, headers and, unless `include_body` is false
    /// (answers to HEAD), the plain-text message body.
    pub fn encode(&self, protocol_version: &str, server: &str, include_body: bool) -> Vec<u8> {
        let body = format!("{}\n", self.message);
        let mut out = format!(
            "{} {} {}\r\n",
            protocol_version,
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or("Error")
        );
        out.push_str(&format!("Server: {}\r\n", server));
        out.push_str(&format!("Date: {}\r\n", httpdate::fmt_http_date(SystemTime::now())));
        out.push_str("Connection: close\r\n");
        out.push_str("Content-Type: text/plain; charset=utf-8\r\n");
        out.push_str(&format!("Content-Length: {}\r\n", body.len()));
        out.push_str("\r\n");
        if include_body {
            out.push_str(&body);
        }
        out.into_bytes()
    }
}
