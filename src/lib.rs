pub mod authority;
pub mod config;
pub mod config_validation;
pub mod connector;
pub mod error;
pub mod forward_proxy;
pub mod logging;
pub mod notify;
pub mod proxy;
pub mod pump;
pub mod request;
pub mod response;
pub mod rewrite;

pub use authority::{Authority, ForwardTarget};
pub use config::Config;
pub use connector::{Connector, TcpConnector};
pub use error::{ConnectError, ProxyError};
pub use forward_proxy::ForwardProxy;
pub use notify::Notifier;
pub use proxy::ProxyServer;
pub use pump::{RelayPump, RelayStats, Termination};
