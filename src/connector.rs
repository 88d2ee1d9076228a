use crate::authority::Authority;
use crate::error::ConnectError;
use async_trait::async_trait;
use log::debug;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::{Duration, timeout};

/// Opens outbound connections to destinations named by client requests.
#[async_trait]
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    async fn connect(&self, authority: &Authority) -> Result<Self::Stream, ConnectError>;
}

/// Plain TCP connector, one fresh connection per call and no retries.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    connect_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(connect_timeout: Option<Duration>) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, authority: &Authority) -> Result<TcpStream, ConnectError> {
        debug!("Connecting to {}", authority);

        let connect = TcpStream::connect((authority.host.as_str(), authority.port));
        let result = match self.connect_timeout {
            Some(limit) => match timeout(limit, connect).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connection to {} timed out after {:?}", authority, limit),
                )),
            },
            None => connect.await,
        };

        let stream = result.map_err(|e| ConnectError::new(authority.clone(), e))?;
        // Latency matters more than throughput for a test fixture
        stream
            .set_nodelay(true)
            .map_err(|e| ConnectError::new(authority.clone(), e))?;
        Ok(stream)
    }
}
