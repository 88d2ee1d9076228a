use crate::error::ProxyError;
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Upper bound on header lines accepted in one request.
pub const MAX_HEADERS: usize = 100;

/// A single header line as received, in wire order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: Vec<u8>,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Request line and header section of a client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    /// Request target exactly as sent: authority-form for CONNECT,
    /// absolute-form for everything else.
    pub target: String,
    /// Protocol version token, e.g. `HTTP/1.1`.
    pub version: String,
    pub headers: Vec<Header>,
}

impl RequestHead {
    /// Parses a head from the start of `buf`.
    ///
    /// Returns `None` while the head is incomplete, otherwise the head and
    /// the number of bytes it occupied.
    pub fn parse(buf: &[u8]) -> Result<Option<(usize, Self)>, ProxyError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut req = httparse::Request::new(&mut headers);

        let len = match req.parse(buf) {
            Ok(httparse::Status::Partial) => return Ok(None),
            Ok(httparse::Status::Complete(len)) => len,
            Err(httparse::Error::TooManyHeaders) => {
                return Err(ProxyError::HeaderTooLarge(buf.len()));
            }
            Err(e) => {
                return Err(ProxyError::BadRequest(format!("Bad request syntax ({})", e)));
            }
        };

        let method = req
            .method
            .ok_or_else(|| ProxyError::BadRequest("Bad request syntax (missing method)".to_string()))?;
        let target = req
            .path
            .ok_or_else(|| ProxyError::BadRequest("Bad request syntax (missing target)".to_string()))?;
        let version = match req.version {
            Some(0) => "HTTP/1.0",
            _ => "HTTP/1.1",
        };

        let headers = req
            .headers
            .iter()
            .map(|h| Header::new(h.name, h.value))
            .collect();

        Ok(Some((
            len,
            Self {
                method: method.to_string(),
                target: target.to_string(),
                version: version.to_string(),
                headers,
            },
        )))
    }

    /// The request line without its line terminator, as it appears in logs.
    pub fn request_line(&self) -> String {
        format!("{} {} {}", self.method, self.target, self.version)
    }
}

/// Reads a request head from `reader`.
///
/// Returns `Ok(None)` when the client closes the connection without sending
/// anything. On success, also returns the bytes that arrived after the head
/// (start of a body or of tunneled data); they must be forwarded before any
/// further reads from `reader`.
pub async fn read_request_head<R>(
    reader: &mut R,
    max_size: usize,
) -> Result<Option<(RequestHead, BytesMut)>, ProxyError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(4096.min(max_size.max(1)));

    loop {
        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(ProxyError::BadRequest(
                "Bad request syntax (connection closed inside request head)".to_string(),
            ));
        }

        if let Some((len, head)) = RequestHead::parse(&buf)? {
            let leftover = buf.split_off(len);
            return Ok(Some((head, leftover)));
        }

        if buf.len() >= max_size {
            return Err(ProxyError::HeaderTooLarge(max_size));
        }
    }
}
