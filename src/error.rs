use crate::authority::Authority;
use http::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Request header section exceeds {0} bytes")]
    HeaderTooLarge(usize),

    #[error("Unsupported method ({0})")]
    UnsupportedMethod(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}

impl ProxyError {
    /// Status code of the response the client receives for this error.
    ///
    /// `None` means no response is written: the failure happened on a socket
    /// that can no longer carry one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ProxyError::BadRequest(_) => Some(StatusCode::BAD_REQUEST),
            ProxyError::HeaderTooLarge(_) => Some(StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE),
            ProxyError::UnsupportedMethod(_) => Some(StatusCode::NOT_IMPLEMENTED),
            ProxyError::Connect(_) => Some(StatusCode::NOT_FOUND),
            ProxyError::Io(_) | ProxyError::Config(_) => None,
        }
    }
}

/// Failure to open the outbound connection to a destination.
#[derive(Error, Debug)]
#[error("{source}")]
pub struct ConnectError {
    pub authority: Authority,
    #[source]
    pub source: std::io::Error,
}

impl ConnectError {
    pub fn new(authority: Authority, source: std::io::Error) -> Self {
        Self { authority, source }
    }

    /// Human readable reason, sent back to the client as the response body.
    pub fn reason(&self) -> String {
        self.source.to_string()
    }
}
