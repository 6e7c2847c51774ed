//! Per-endpoint client cache.

use super::session::Client;
use crate::config;
use crate::transport::{connector_for_url, Connector};
use crate::{FarcallError, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

/// Hands out one shared [`Client`] per endpoint name.
#[derive(Default)]
pub struct ClientFactory {
    clients: Mutex<HashMap<String, Client>>,
}

impl ClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_clients(&self) -> Result<MutexGuard<'_, HashMap<String, Client>>> {
        self.clients
            .lock()
            .map_err(|_| FarcallError::Other("Failed to acquire client factory lock".to_string()))
    }

    /// The cached client for `endpoint`, if one was created.
    pub fn get_client(&self, endpoint: &str) -> Result<Option<Client>> {
        Ok(self.lock_clients()?.get(endpoint).cloned())
    }

    /// The cached client for `endpoint`, or a new one for the server at
    /// `host:port`.
    ///
    /// The service URL comes from [`config::service_url`], so
    /// `FARCALL_SERVICE_URL` overrides `host` and `port`. Creating a client
    /// does not connect.
    pub fn get_or_create_client(
        &self,
        endpoint: &str,
        host: Option<&str>,
        port: Option<u16>,
    ) -> Result<Client> {
        if let Some(client) = self.get_client(endpoint)? {
            return Ok(client);
        }
        let url = config::service_url(host, port);
        self.get_or_create_with(endpoint, connector_for_url(&url)?)
    }

    /// The cached client for `endpoint`, or a new one using `connector`.
    pub fn get_or_create_with(&self, endpoint: &str, connector: Arc<dyn Connector>) -> Result<Client> {
        let mut clients = self.lock_clients()?;
        let client = clients.entry(endpoint.to_string()).or_insert_with(|| {
            info!("Creating client for {} via {}", endpoint, connector.describe());
            Client::new(endpoint, connector)
        });
        Ok(client.clone())
    }

    /// Close and forget the client for `endpoint`. Returns false if there was none.
    pub async fn close_client(&self, endpoint: &str) -> Result<bool> {
        let removed = self.lock_clients()?.remove(endpoint);
        match removed {
            Some(client) => {
                client.close().await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close and forget every client.
    pub async fn close_all(&self) -> Result<()> {
        let clients: Vec<Client> = self.lock_clients()?.drain().map(|(_, c)| c).collect();
        for client in clients {
            client.close().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, SERVICE_URL_ENV_LOCK};
    use crate::transport::TcpConnector;

    #[test]
    fn test_one_client_per_endpoint() {
        let factory = ClientFactory::new();
        assert!(factory.get_client("a").unwrap().is_none());

        let first = factory
            .get_or_create_with("a", Arc::new(TcpConnector::new("localhost:1")))
            .unwrap();
        let again = factory
            .get_or_create_with("a", Arc::new(TcpConnector::new("localhost:2")))
            .unwrap();
        assert_eq!(format!("{:?}", first), format!("{:?}", again));
        assert!(format!("{:?}", again).contains("localhost:1"));

        let other = factory
            .get_or_create_with("b", Arc::new(TcpConnector::new("localhost:2")))
            .unwrap();
        assert_eq!(other.endpoint(), "b");
    }

    #[tokio::test]
    async fn test_close_client_forgets_it() {
        let factory = ClientFactory::new();
        factory
            .get_or_create_with("a", Arc::new(TcpConnector::new("localhost:1")))
            .unwrap();

        assert!(factory.close_client("a").await.unwrap());
        assert!(!factory.close_client("a").await.unwrap());
        assert!(factory.get_client("a").unwrap().is_none());
    }

    #[test]
    fn test_get_or_create_client_uses_host_and_port() {
        let _guard = SERVICE_URL_ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::env::remove_var(ClientConfig::SERVICE_URL_ENV);

        let factory = ClientFactory::new();
        let explicit = factory
            .get_or_create_client("app", Some("10.0.0.2"), Some(4447))
            .unwrap();
        assert!(format!("{:?}", explicit).contains("tcp://10.0.0.2:4447"));

        // Cached: later host and port are ignored.
        let cached = factory.get_or_create_client("app", None, Some(1)).unwrap();
        assert!(format!("{:?}", cached).contains("tcp://10.0.0.2:4447"));

        let defaulted = factory.get_or_create_client("other", None, None).unwrap();
        assert!(format!("{:?}", defaulted).contains("tcp://localhost:1090"));
    }

    #[test]
    fn test_get_or_create_client_honours_env_override() {
        let _guard = SERVICE_URL_ENV_LOCK
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        std::env::set_var(ClientConfig::SERVICE_URL_ENV, "tcp://override-host:7000");

        let factory = ClientFactory::new();
        let client = factory
            .get_or_create_client("app", Some("ignored"), Some(4447))
            .unwrap();
        std::env::remove_var(ClientConfig::SERVICE_URL_ENV);

        assert!(format!("{:?}", client).contains("tcp://override-host:7000"));
    }

    #[tokio::test]
    async fn test_close_all_empties_the_cache() {
        let factory = ClientFactory::new();
        for endpoint in ["a", "b", "c"] {
            factory
                .get_or_create_with(endpoint, Arc::new(TcpConnector::new("localhost:1")))
                .unwrap();
        }

        factory.close_all().await.unwrap();

        for endpoint in ["a", "b", "c"] {
            assert!(factory.get_client(endpoint).unwrap().is_none());
        }
        assert!(!factory.close_client("a").await.unwrap());
    }
}
