//! JSON-RPC over HTTP.

use super::{Connection, Connector};
use crate::config::ClientConfig;
use crate::dispatch::OperationCall;
use crate::ipc::{RpcRequest, RpcResponse};
use crate::signature::Signature;
use crate::{FarcallError, Result};
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Connects to an HTTP JSON-RPC server.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    rpc_url: Url,
    health_url: Url,
    client: Client,
}

impl HttpConnector {
    /// `rpc_url` is the full URL requests are POSTed to. The health probe
    /// goes to [`ClientConfig::HTTP_HEALTH_PATH`] on the same origin.
    pub fn new(rpc_url: Url) -> Result<Self> {
        let mut health_url = rpc_url.clone();
        health_url.set_path(ClientConfig::HTTP_HEALTH_PATH);

        let client = Client::builder()
            .timeout(ClientConfig::HTTP_REQUEST_TIMEOUT)
            .connect_timeout(ClientConfig::HTTP_CONNECT_TIMEOUT)
            .build()
            .map_err(|e| FarcallError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            rpc_url,
            health_url,
            client,
        })
    }
}

#[async_trait::async_trait]
impl Connector for HttpConnector {
    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        let response = self
            .client
            .get(self.health_url.clone())
            .send()
            .await
            .map_err(|e| FarcallError::transport(self.rpc_url.as_str(), e))?;
        if !response.status().is_success() {
            return Err(FarcallError::transport(
                self.rpc_url.as_str(),
                format!("health check returned {}", response.status()),
            ));
        }

        debug!("HTTP transport ready at {}", self.rpc_url);

        Ok(Arc::new(HttpConnection {
            client: self.client.clone(),
            rpc_url: self.rpc_url.clone(),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }))
    }

    fn describe(&self) -> String {
        self.rpc_url.to_string()
    }
}

/// Logical connection over a pooled HTTP client.
#[derive(Debug)]
pub struct HttpConnection {
    client: Client,
    rpc_url: Url,
    next_id: AtomicU64,
    closed: AtomicBool,
}

#[async_trait::async_trait]
impl Connection for HttpConnection {
    async fn invoke(
        &self,
        endpoint: &str,
        operation: &str,
        args: Vec<Value>,
        signature: Signature,
    ) -> Result<Value> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FarcallError::transport(
                self.rpc_url.as_str(),
                "connection closed",
            ));
        }

        let params = serde_json::to_value(OperationCall {
            endpoint: endpoint.to_string(),
            args,
            signature,
        })?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(operation, params, id);

        let response = self
            .client
            .post(self.rpc_url.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| FarcallError::transport(self.rpc_url.as_str(), e))?;
        if !response.status().is_success() {
            return Err(FarcallError::transport(
                self.rpc_url.as_str(),
                format!("server returned {}", response.status()),
            ));
        }

        let response: RpcResponse = response.json().await.map_err(|e| {
            FarcallError::transport(self.rpc_url.as_str(), format!("unreadable response: {}", e))
        })?;
        response.into_result()
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
