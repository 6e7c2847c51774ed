//! Client-side transports.
//!
//! The client needs exactly two things from a transport: a way to open a
//! connection ([`Connector`]) and a way to invoke a named operation on a
//! dispatcher endpoint over it ([`Connection`]). Three implementations ship:
//!
//! - [`TcpConnector`]: framed JSON-RPC over TCP (`tcp://host:port`)
//! - [`HttpConnector`]: JSON-RPC over HTTP POST (`http://host:port/rpc`)
//! - [`LocalConnector`]: in-process, straight into an
//!   [`OperationDispatch`](crate::dispatch::OperationDispatch)

mod http;
mod local;
mod tcp;

pub use http::{HttpConnection, HttpConnector};
pub use local::LocalConnector;
pub use tcp::{TcpConnection, TcpConnector};

use crate::config::ClientConfig;
use crate::signature::Signature;
use crate::{FarcallError, Result};
use serde_json::Value;
use std::sync::Arc;
use url::Url;

/// An open connection to a server hosting dispatcher endpoints.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Invoke `operation` on the dispatcher at `endpoint`.
    ///
    /// `signature` lists the portable types of `args`; it may be empty.
    async fn invoke(
        &self,
        endpoint: &str,
        operation: &str,
        args: Vec<Value>,
        signature: Signature,
    ) -> Result<Value>;

    /// Release the connection.
    async fn close(&self) -> Result<()>;
}

/// Opens connections to one server.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    /// Establish a connection. Unreachable servers are [`FarcallError::Transport`].
    async fn connect(&self) -> Result<Arc<dyn Connection>>;

    /// Human-readable target, used in logs and errors.
    fn describe(&self) -> String;
}

/// Pick a connector for a service URL.
///
/// `tcp://host[:port]` uses the framed TCP transport, `http(s)://host[:port][/path]`
/// the HTTP transport (path defaults to [`ClientConfig::HTTP_RPC_PATH`]). A
/// missing TCP port is [`ClientConfig::DEFAULT_PORT`].
pub fn connector_for_url(service_url: &str) -> Result<Arc<dyn Connector>> {
    let mut url = Url::parse(service_url).map_err(|e| FarcallError::Config {
        message: format!("Invalid service URL '{}': {}", service_url, e),
    })?;

    match url.scheme() {
        "tcp" => {
            let host = url.host_str().ok_or_else(|| FarcallError::Config {
                message: format!("Service URL '{}' has no host", service_url),
            })?;
            let port = url.port().unwrap_or(ClientConfig::DEFAULT_PORT);
            Ok(Arc::new(TcpConnector::new(format!("{}:{}", host, port))))
        }
        "http" | "https" => {
            if url.path().is_empty() || url.path() == "/" {
                url.set_path(ClientConfig::HTTP_RPC_PATH);
            }
            Ok(Arc::new(HttpConnector::new(url)?))
        }
        other => Err(FarcallError::Config {
            message: format!("Unsupported service URL scheme '{}'", other),
        }),
    }
}
