//! Client session handle.

use super::proxy::{Proxy, RemoteInterface};
use crate::dispatch::operations;
use crate::registry::TargetHandle;
use crate::signature::{Params, Signature};
use crate::transport::{connector_for_url, Connection, Connector};
use crate::{FarcallError, Result};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

struct ClientInner {
    endpoint: String,
    connector: Arc<dyn Connector>,
    connection: Mutex<Option<Arc<dyn Connection>>>,
}

/// Handle on one remote dispatcher endpoint.
///
/// Cheap to clone; clones share the same lazily opened connection. A call
/// that fails at the transport level drops the connection so the next call
/// reconnects. The failed call itself is not retried.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Client {
    pub fn new(endpoint: impl Into<String>, connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                endpoint: endpoint.into(),
                connector,
                connection: Mutex::new(None),
            }),
        }
    }

    /// Client for `endpoint` on the server at `service_url`.
    pub fn for_url(endpoint: impl Into<String>, service_url: &str) -> Result<Self> {
        Ok(Self::new(endpoint, connector_for_url(service_url)?))
    }

    /// Name of the remote dispatcher endpoint.
    pub fn endpoint(&self) -> &str {
        &self.inner.endpoint
    }

    /// Look up `name` and wrap it in the typed stub `I`.
    ///
    /// The server checks that the bound instance implements `I::NAME`.
    pub async fn lookup<I: RemoteInterface>(&self, name: &str) -> Result<I> {
        let proxy = self.lookup_as(Some(I::NAME), name).await?;
        Ok(I::from_proxy(proxy))
    }

    /// Look up `name` without a type check.
    pub async fn lookup_raw(&self, name: &str) -> Result<Proxy> {
        self.lookup_as(None, name).await
    }

    async fn lookup_as(&self, declaring_type: Option<&str>, name: &str) -> Result<Proxy> {
        let args = (declaring_type.map(str::to_string), name.to_string());
        let value = self.call_operation(operations::LOOKUP, args).await?;
        let handle: TargetHandle = serde_json::from_value(value)?;
        debug!("Looked up '{}' on {}: {:?}", name, self.inner.endpoint, handle);
        Ok(Proxy::new(
            self.clone(),
            handle,
            declaring_type.unwrap_or_default(),
        ))
    }

    /// Register stateless names on the remote dispatcher.
    pub async fn register_stateless_names(&self, csv: &str) -> Result<()> {
        self.call_operation(operations::REGISTER_STATELESS_NAMES, (csv.to_string(),))
            .await?;
        Ok(())
    }

    /// Register stateful names on the remote dispatcher.
    pub async fn register_stateful_names(&self, csv: &str) -> Result<()> {
        self.call_operation(operations::REGISTER_STATEFUL_NAMES, (csv.to_string(),))
            .await?;
        Ok(())
    }

    /// Invoke a dispatcher operation with positional arguments.
    pub async fn call_operation<P: Params>(&self, operation: &str, args: P) -> Result<Value> {
        let signature = Signature::encode(&P::param_types());
        let args = args.into_values()?;
        let connection = self.connection().await?;

        let result = connection
            .invoke(&self.inner.endpoint, operation, args, signature)
            .await;
        if let Err(e @ FarcallError::Transport { .. }) = &result {
            warn!("Dropping connection to {}: {}", self.inner.connector.describe(), e);
            self.forget(&connection).await;
        }
        result
    }

    /// Release the connection. Safe to call repeatedly.
    pub async fn close(&self) {
        let connection = self.inner.connection.lock().await.take();
        if let Some(connection) = connection {
            if let Err(e) = connection.close().await {
                debug!("Ignoring error closing {}: {}", self.inner.connector.describe(), e);
            }
            info!("Closed client for {}", self.inner.endpoint);
        }
    }

    /// True while a connection is open.
    pub async fn is_connected(&self) -> bool {
        self.inner.connection.lock().await.is_some()
    }

    async fn connection(&self) -> Result<Arc<dyn Connection>> {
        let mut slot = self.inner.connection.lock().await;
        if let Some(connection) = slot.as_ref() {
            return Ok(connection.clone());
        }

        let connection = self.inner.connector.connect().await?;
        info!(
            "Connected to {} for endpoint {}",
            self.inner.connector.describe(),
            self.inner.endpoint
        );
        *slot = Some(connection.clone());
        Ok(connection)
    }

    async fn forget(&self, failed: &Arc<dyn Connection>) {
        let mut slot = self.inner.connection.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, failed)) {
            *slot = None;
        }
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.endpoint)
            .field("server", &self.inner.connector.describe())
            .finish()
    }
}
