//! Framed TCP transport.

use super::{Connection, Connector};
use crate::dispatch::OperationCall;
use crate::ipc::IpcClient;
use crate::signature::Signature;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Connects to an [`IpcServer`](crate::ipc::IpcServer).
#[derive(Debug, Clone)]
pub struct TcpConnector {
    address: String,
}

impl TcpConnector {
    /// `address` is `host:port`.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait::async_trait]
impl Connector for TcpConnector {
    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        let client = IpcClient::connect(&self.address).await?;
        Ok(Arc::new(TcpConnection { client }))
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.address)
    }
}

/// One framed TCP connection.
#[derive(Debug)]
pub struct TcpConnection {
    client: IpcClient,
}

#[async_trait::async_trait]
impl Connection for TcpConnection {
    async fn invoke(
        &self,
        endpoint: &str,
        operation: &str,
        args: Vec<Value>,
        signature: Signature,
    ) -> Result<Value> {
        let params = serde_json::to_value(OperationCall {
            endpoint: endpoint.to_string(),
            args,
            signature,
        })?;
        self.client.call(operation, params).await
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing connection to {}", self.client.addr());
        self.client.close().await
    }
}
