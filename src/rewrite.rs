use crate::request::Header;
use http::header::CONNECTION;

const PROXY_CONNECTION: &str = "proxy-connection";

/// Produces the header set forwarded to the destination of a plain request.
///
/// `Proxy-Connection` is dropped and `Connection` is forced to `close`: every
/// accepted client maps to exactly one relay, so the destination must not
/// expect to reuse the connection. The first `Connection` header keeps its
/// position, any further ones are dropped, and one is appended if there was
/// none. All other headers pass through in their original order.
pub fn rewrite_headers(headers: &[Header]) -> Vec<Header> {
    let mut rewritten = Vec::with_capacity(headers.len() + 1);
    let mut connection_set = false;

    for header in headers {
        if header.is(PROXY_CONNECTION) {
            continue;
        }
        if header.is(CONNECTION.as_str()) {
            if !connection_set {
                rewritten.push(Header::new(header.name.clone(), "close"));
                connection_set = true;
            }
            continue;
        }
        rewritten.push(header.clone());
    }

    if !connection_set {
        rewritten.push(Header::new("Connection", "close"));
    }

    rewritten
}

/// Serialises the request head sent to the destination: the origin-form
/// request line, the headers and the terminating blank line.
pub fn encode_request_head(
    method: &str,
    path_and_query: &str,
    version: &str,
    headers: &[Header],
) -> Vec<u8> {
    let mut out = Vec::with_capacity(256);
    out.extend_from_slice(format!("{} {} {}\r\n", method, path_and_query, version).as_bytes());
    for header in headers {
        out.extend_from_slice(header.name.as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(&header.value);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_and_values(headers: &[Header]) -> Vec<(String, String)> {
        headers
            .iter()
            .map(|h| (h.name.clone(), String::from_utf8_lossy(&h.value).into_owned()))
            .collect()
    }

    #[test]
    fn test_keep_alive_headers_are_rewritten() {
        let headers = vec![
            Header::new("Host", "example.com"),
            Header::new("Proxy-Connection", "keep-alive"),
            Header::new("Connection", "keep-alive"),
            Header::new("Accept", "*/*"),
        ];

        let rewritten = rewrite_headers(&headers);
        assert_eq!(
            names_and_values(&rewritten),
            vec![
                ("Host".to_string(), "example.com".to_string()),
                ("Connection".to_string(), "close".to_string()),
                ("Accept".to_string(), "*/*".to_string()),
            ]
        );
    }

    #[test]
    fn test_connection_appended_when_missing() {
        let headers = vec![
            Header::new("Host", "example.com"),
            Header::new("proxy-connection", "keep-alive"),
        ];
        let rewritten = rewrite_headers(&headers);
        assert_eq!(
            names_and_values(&rewritten),
            vec![
                ("Host".to_string(), "example.com".to_string()),
                ("Connection".to_string(), "close".to_string()),
            ]
        );
    }

    #[test]
    fn test_duplicate_connection_headers_collapse() {
        let headers = vec![
            Header::new("connection", "Upgrade"),
            Header::new("X-Trace", "1"),
            Header::new("Connection", "keep-alive"),
        ];
        let rewritten = rewrite_headers(&headers);
        assert_eq!(
            names_and_values(&rewritten),
            vec![
                ("connection".to_string(), "close".to_string()),
                ("X-Trace".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_encode_request_head() {
        let headers = vec![Header::new("Host", "example.com"), Header::new("Connection", "close")];
        let encoded = encode_request_head("GET", "/index.html?q=1", "HTTP/1.1", &headers);
        assert_eq!(
            encoded,
            b"GET /index.html?q=1 HTTP/1.1\r\nHost: example.com\r\nConnection: close\r\n\r\n".to_vec()
        );
    }
}
