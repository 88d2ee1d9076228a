use crate::error::ProxyError;
use http::Uri;
use log::warn;
use std::fmt;

/// Port assumed when a request target names no port.
pub const DEFAULT_PORT: u16 = 80;

/// Host and port of a destination, taken from a request target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authority {
    /// Hostname or IP literal, IPv6 literals without brackets.
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl Authority {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parses the authority-form target of a CONNECT request.
    ///
    /// A target without a port separator is accepted as a bare host on
    /// port 80. CONNECT clients practically always send a port, so this is
    /// logged when it happens.
    pub fn from_connect_target(target: &str) -> Result<Self, ProxyError> {
        let bad = || ProxyError::BadRequest(format!("bad authority {}", target));

        let (host, port) = if let Some(rest) = target.strip_prefix('[') {
            // [v6-literal] or [v6-literal]:port
            let (host, after) = rest.split_once(']').ok_or_else(bad)?;
            match after {
                "" => (host, None),
                _ => (host, Some(after.strip_prefix(':').ok_or_else(bad)?)),
            }
        } else {
            match target.rsplit_once(':') {
                Some((host, port)) => (host, Some(port)),
                None => (target, None),
            }
        };

        if host.is_empty() {
            return Err(bad());
        }

        let port = match port {
            Some(port) => port.parse::<u16>().map_err(|_| bad())?,
            None => {
                warn!("CONNECT target {} has no port, assuming {}", target, DEFAULT_PORT);
                DEFAULT_PORT
            }
        };

        Ok(Self::new(host, port))
    }
}

/// Destination of a plain (non-CONNECT) proxied request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardTarget {
    pub authority: Authority,
    /// Origin-form target sent to the destination, never empty.
    pub path_and_query: String,
}

impl ForwardTarget {
    /// Parses an absolute-form request target.
    ///
    /// Only `http` URLs with a host and without a fragment are accepted.
    pub fn parse(target: &str) -> Result<Self, ProxyError> {
        let bad = || ProxyError::BadRequest(format!("bad url {}", target));

        if target.contains('#') {
            return Err(bad());
        }

        let uri: Uri = target.parse().map_err(|_| bad())?;
        if !uri
            .scheme_str()
            .is_some_and(|scheme| scheme.eq_ignore_ascii_case("http"))
        {
            return Err(bad());
        }

        let authority = uri.authority().ok_or_else(bad)?;
        let host = authority.host().trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(bad());
        }
        let port = authority.port_u16().unwrap_or(DEFAULT_PORT);

        let path_and_query = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .filter(|pq| !pq.is_empty())
            .unwrap_or("/");
        let path_and_query = if path_and_query.starts_with('/') {
            path_and_query.to_string()
        } else {
            // "http://host?q" has a query but an empty path
            format!("/{}", path_and_query)
        };

        Ok(Self {
            authority: Authority::new(host, port),
            path_and_query,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_target_with_port() {
        let authority = Authority::from_connect_target("example.com:443").unwrap();
        assert_eq!(authority, Authority::new("example.com", 443));
        assert_eq!(authority.to_string(), "example.com:443");
    }

    #[test]
    fn test_connect_target_without_port_defaults_to_80() {
        let authority = Authority::from_connect_target("example.com").unwrap();
        assert_eq!(authority, Authority::new("example.com", 80));
    }

    #[test]
    fn test_connect_target_ipv6() {
        let authority = Authority::from_connect_target("[::1]:8443").unwrap();
        assert_eq!(authority, Authority::new("::1", 8443));
        assert_eq!(authority.to_string(), "[::1]:8443");

        let authority = Authority::from_connect_target("[::1]").unwrap();
        assert_eq!(authority.port, 80);
    }

    #[test]
    fn test_connect_target_invalid() {
        for target in ["example.com:https", "example.com:70000", ":443", "[::1", "[::1]443"] {
            let err = Authority::from_connect_target(target).unwrap_err();
            assert!(matches!(err, ProxyError::BadRequest(_)), "{target} should be rejected");
        }
    }

    #[test]
    fn test_forward_target_plain_http() {
        let target = ForwardTarget::parse("http://example.com/index.html?x=1&y=2").unwrap();
        assert_eq!(target.authority, Authority::new("example.com", 80));
        assert_eq!(target.path_and_query, "/index.html?x=1&y=2");
    }

    #[test]
    fn test_forward_target_explicit_port_and_empty_path() {
        let target = ForwardTarget::parse("http://127.0.0.1:8080").unwrap();
        assert_eq!(target.authority, Authority::new("127.0.0.1", 8080));
        assert_eq!(target.path_and_query, "/");
    }

    #[test]
    fn test_forward_target_preserves_raw_path() {
        let target = ForwardTarget::parse("http://example.com/a/../b%20c").unwrap();
        assert_eq!(target.path_and_query, "/a/../b%20c");
    }

    #[test]
    fn test_forward_target_rejects_other_schemes() {
        let err = ForwardTarget::parse("https://example.com/").unwrap_err();
        assert_eq!(err.to_string(), "bad url https://example.com/");

        assert!(ForwardTarget::parse("ftp://example.com/file").is_err());
    }

    #[test]
    fn test_forward_target_rejects_fragment_and_missing_host() {
        assert!(ForwardTarget::parse("http://example.com/page#top").is_err());
        assert!(ForwardTarget::parse("/relative/path").is_err());
        assert!(ForwardTarget::parse("http://").is_err());
    }
}
