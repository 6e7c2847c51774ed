//! Named dispatcher endpoints.

use super::{Dispatcher, OperationDispatch};
use crate::signature::Signature;
use crate::{FarcallError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

/// Params of every operation call on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationCall {
    /// Name of the dispatcher endpoint.
    pub endpoint: String,
    /// Positional operation arguments.
    #[serde(default)]
    pub args: Vec<Value>,
    /// Portable types of `args`. Empty skips the check.
    #[serde(default)]
    pub signature: Signature,
}

/// Dispatchers keyed by endpoint name.
#[derive(Clone, Default)]
pub struct EndpointTable {
    endpoints: HashMap<String, Arc<Dispatcher>>,
}

impl EndpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_endpoint(mut self, name: impl Into<String>, dispatcher: Dispatcher) -> Self {
        self.insert(name, Arc::new(dispatcher));
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, dispatcher: Arc<Dispatcher>) {
        self.endpoints.insert(name.into(), dispatcher);
    }

    pub fn dispatcher(&self, endpoint: &str) -> Result<Arc<Dispatcher>> {
        self.endpoints
            .get(endpoint)
            .cloned()
            .ok_or_else(|| FarcallError::UnknownEndpoint(endpoint.to_string()))
    }

    /// Endpoint names, sorted.
    pub fn endpoints(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.keys().cloned().collect();
        names.sort();
        names
    }

    /// Tear down every dispatcher's registry.
    pub fn shutdown(&self) {
        for (name, dispatcher) in &self.endpoints {
            if let Err(e) = dispatcher.teardown() {
                error!("Failed to tear down endpoint {}: {}", name, e);
            }
        }
    }
}

#[async_trait::async_trait]
impl OperationDispatch for EndpointTable {
    async fn dispatch(&self, operation: &str, params: Value) -> Result<Value> {
        let call: OperationCall = serde_json::from_value(params)?;
        let dispatcher = self.dispatcher(&call.endpoint)?;
        debug!("Dispatching {} on {}", operation, call.endpoint);

        let operation = operation.to_string();
        // Target methods may block; keep them off the IO tasks.
        tokio::task::spawn_blocking(move || {
            dispatcher.call_operation(&operation, call.args, &call.signature)
        })
        .await
        .map_err(|e| FarcallError::Other(format!("Dispatch task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::operations;
    use crate::reflection::{MethodTable, Remote};
    use crate::registry::BindingTable;
    use serde_json::json;

    struct Echo;

    impl Remote for Echo {
        const TYPE_NAME: &'static str = "test::Echo";

        fn describe(methods: &mut MethodTable<Self>) {
            methods.method("echo", |_: &Echo, (value,): (Value,)| Ok(value));
        }
    }

    fn table() -> EndpointTable {
        let mut bindings = BindingTable::new();
        bindings.bind_shared("echo", Echo);
        let dispatcher = Dispatcher::new(Arc::new(bindings));
        dispatcher.register_stateless_names("echo").unwrap();
        EndpointTable::new().with_endpoint("farcall:name=test", dispatcher)
    }

    #[tokio::test]
    async fn test_dispatch_routes_to_endpoint() {
        let table = table();
        let params = json!({
            "endpoint": "farcall:name=test",
            "args": [null, "echo"],
        });
        let handle = table.dispatch(operations::LOOKUP, params).await.unwrap();
        assert_eq!(handle["kind"], "stateless");
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let table = table();
        let params = json!({ "endpoint": "farcall:name=other", "args": [null, "echo"] });
        let result = table.dispatch(operations::LOOKUP, params).await;
        assert!(matches!(result, Err(FarcallError::UnknownEndpoint(_))));
    }

    #[tokio::test]
    async fn test_malformed_params() {
        let table = table();
        let result = table.dispatch(operations::LOOKUP, json!({ "args": [] })).await;
        assert!(matches!(result, Err(FarcallError::Json { .. })));
    }

    #[test]
    fn test_endpoint_names_and_shutdown() {
        let table = table();
        assert_eq!(table.endpoints(), vec!["farcall:name=test"]);

        let dispatcher = table.dispatcher("farcall:name=test").unwrap();
        dispatcher.lookup(None, "echo").unwrap();
        table.shutdown();
        assert!(!dispatcher.registry().is_bound("echo").unwrap());
    }
}
