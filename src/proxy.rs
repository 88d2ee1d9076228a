use crate::config::Config;
use crate::connector::{Connector, TcpConnector};
use crate::error::ProxyError;
use crate::forward_proxy::ForwardProxy;
use log::{debug, info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Accept loop: one tokio task per client connection, no connection cap.
pub struct ProxyServer<C = TcpConnector> {
    listener: TcpListener,
    proxy: Arc<ForwardProxy<C>>,
}

impl ProxyServer<TcpConnector> {
    pub async fn bind(config: &Config) -> Result<Self, ProxyError> {
        info!("Binding forward proxy listener to: {}", config.listen_addr);
        let listener = TcpListener::bind(config.listen_addr).await?;
        Ok(Self::from_listener(listener, ForwardProxy::new(config)))
    }
}

impl<C> ProxyServer<C>
where
    C: Connector + 'static,
    C::Stream: 'static,
{
    pub fn from_listener(listener: TcpListener, proxy: ForwardProxy<C>) -> Self {
        Self {
            listener,
            proxy: Arc::new(proxy),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ProxyError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until the task is dropped.
    ///
    /// A failed accept (e.g. the process ran out of descriptors) is logged
    /// and the loop carries on; no single connection can stop it.
    pub async fn run(self) -> Result<(), ProxyError> {
        info!("Forward proxy listening on: {}", self.local_addr()?);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                    continue;
                }
            };
            debug!("New client: {}", peer);
            if let Err(e) = stream.set_nodelay(true) {
                debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
            }

            let proxy = self.proxy.clone();
            tokio::spawn(async move {
                proxy.handle(stream, peer).await;
            });
        }
    }
}
