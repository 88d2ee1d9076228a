use crate::authority::{Authority, ForwardTarget};
use crate::config::Config;
use crate::connector::{Connector, TcpConnector};
use crate::error::ProxyError;
use crate::logging::log_access;
use crate::pump::RelayPump;
use crate::request::{RequestHead, read_request_head};
use crate::response::{ErrorResponse, connection_established};
use crate::rewrite::{encode_request_head, rewrite_headers};
use http::{Method, StatusCode};
use log::{debug, warn};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Methods relayed as plain requests; they all share one code path.
const RELAYED_METHODS: [Method; 5] = [
    Method::GET,
    Method::HEAD,
    Method::POST,
    Method::PUT,
    Method::DELETE,
];

/// Handles one client connection from request head to final close.
///
/// Holds no per-connection state, so a single instance is shared by every
/// connection task.
pub struct ForwardProxy<C = TcpConnector> {
    connector: C,
    tunnel_pump: RelayPump,
    request_pump: RelayPump,
    server_version: String,
    protocol_version: String,
    max_header_size: usize,
}

impl ForwardProxy<TcpConnector> {
    pub fn new(config: &Config) -> Self {
        Self::with_connector(config, TcpConnector::new(config.connect_timeout()))
    }
}

impl<C: Connector> ForwardProxy<C> {
    pub fn with_connector(config: &Config, connector: C) -> Self {
        let relay = &config.relay;
        Self {
            connector,
            tunnel_pump: RelayPump::new(relay.poll_interval(), relay.chunk_size, relay.tunnel_idle_cycles),
            request_pump: RelayPump::new(relay.poll_interval(), relay.chunk_size, relay.request_idle_cycles),
            server_version: config.server_version.clone(),
            protocol_version: config.protocol_version.clone(),
            max_header_size: config.max_header_size,
        }
    }

    /// Serves `client` and closes it, whatever the outcome.
    pub async fn handle<S>(&self, mut client: S, peer: SocketAddr)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        if let Err(e) = self.dispatch(&mut client, peer).await {
            debug!("Connection from {} ended early: {}", peer, e);
        }
        let _ = client.shutdown().await;
    }

    async fn dispatch<S>(&self, client: &mut S, peer: SocketAddr) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let (head, leftover) = match read_request_head(client, self.max_header_size).await {
            Ok(Some(request)) => request,
            Ok(None) => {
                debug!("Client {} closed without sending a request", peer);
                return Ok(());
            }
            Err(e) => {
                self.reject(client, peer, None, &e).await;
                return Err(e);
            }
        };

        debug!("{} -> {}", peer, head.request_line());

        let result = if head.method == Method::CONNECT.as_str() {
            self.tunnel(client, peer, &head, &leftover).await
        } else if RELAYED_METHODS.iter().any(|m| m.as_str() == head.method) {
            self.forward(client, peer, &head, &leftover).await
        } else {
            Err(ProxyError::UnsupportedMethod(head.method.clone()))
        };

        if let Err(e) = &result {
            self.reject(client, peer, Some(&head), e).await;
        }
        result
    }

    /// CONNECT: answer with the established preamble, then relay opaquely.
    async fn tunnel<S>(
        &self,
        client: &mut S,
        peer: SocketAddr,
        head: &RequestHead,
        leftover: &[u8],
    ) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let authority = Authority::from_connect_target(&head.target)?;
        let mut upstream = self.connector.connect(&authority).await?;

        log_access(peer, &head.request_line(), Some(StatusCode::OK));
        client
            .write_all(&connection_established(&self.protocol_version, &self.server_version))
            .await?;
        client.flush().await?;

        // Early tunnel bytes (e.g. a TLS ClientHello sent without waiting)
        if !leftover.is_empty() {
            upstream.write_all(leftover).await?;
        }

        let stats = self.tunnel_pump.pump(client, &mut upstream).await;
        debug!("Tunnel {} <-> {} closed: {:?}", peer, authority, stats.termination);

        let _ = upstream.shutdown().await;
        Ok(())
    }

    /// Plain request: rewrite the head to origin form, then relay.
    async fn forward<S>(
        &self,
        client: &mut S,
        peer: SocketAddr,
        head: &RequestHead,
        leftover: &[u8],
    ) -> Result<(), ProxyError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let target = ForwardTarget::parse(&head.target)?;
        let mut upstream = self.connector.connect(&target.authority).await?;

        log_access(peer, &head.request_line(), None);

        let headers = rewrite_headers(&head.headers);
        let request = encode_request_head(&head.method, &target.path_and_query, &head.version, &headers);
        upstream.write_all(&request).await?;
        if !leftover.is_empty() {
            upstream.write_all(leftover).await?;
        }
        upstream.flush().await?;

        let stats = self.request_pump.pump(client, &mut upstream).await;
        debug!(
            "Request {} {} from {} done: {:?}",
            head.method, target.path_and_query, peer, stats.termination
        );

        let _ = upstream.shutdown().await;
        Ok(())
    }

    /// Writes the error response for `error`, if it has one.
    async fn reject<S>(&self, client: &mut S, peer: SocketAddr, head: Option<&RequestHead>, error: &ProxyError)
    where
        S: AsyncWrite + Unpin + Send,
    {
        let Some(status) = error.status() else {
            return;
        };

        let request_line = head.map(|h| h.request_line()).unwrap_or_else(|| "-".to_string());
        if let ProxyError::Connect(e) = error {
            warn!("Cannot reach {} for {}: {}", e.authority, peer, e.reason());
        } else {
            debug!("Rejecting \"{}\" from {}: {}", request_line, peer, error);
        }
        log_access(peer, &request_line, Some(status));

        let include_body = head.is_none_or(|h| h.method != Method::HEAD.as_str());
        let response = ErrorResponse::new(status, error.to_string());
        let bytes = response.encode(&self.protocol_version, &self.server_version, include_body);
        if let Err(e) = client.write_all(&bytes).await {
            debug!("Could not send {} to {}: {}", status, peer, e);
            return;
        }
        let _ = client.flush().await;
    }
}
