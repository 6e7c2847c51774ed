//! In-process transport.

use super::{Connection, Connector};
use crate::dispatch::{OperationCall, OperationDispatch};
use crate::signature::Signature;
use crate::{FarcallError, Result};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Connects straight to a dispatch target in the same process.
///
/// Arguments still go through the JSON form, so a call behaves exactly as it
/// would over a network transport.
#[derive(Clone)]
pub struct LocalConnector {
    dispatch: Arc<dyn OperationDispatch>,
}

impl LocalConnector {
    pub fn new(dispatch: Arc<dyn OperationDispatch>) -> Self {
        Self { dispatch }
    }
}

#[async_trait::async_trait]
impl Connector for LocalConnector {
    async fn connect(&self) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(LocalConnection {
            dispatch: self.dispatch.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    fn describe(&self) -> String {
        "local".to_string()
    }
}

struct LocalConnection {
    dispatch: Arc<dyn OperationDispatch>,
    closed: AtomicBool,
}

#[async_trait::async_trait]
impl Connection for LocalConnection {
    async fn invoke(
        &self,
        endpoint: &str,
        operation: &str,
        args: Vec<Value>,
        signature: Signature,
    ) -> Result<Value> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FarcallError::transport("local", "connection closed"));
        }
        let params = serde_json::to_value(OperationCall {
            endpoint: endpoint.to_string(),
            args,
            signature,
        })?;
        self.dispatch.dispatch(operation, params).await
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
