//! Server-side dispatch.
//!
//! A [`Dispatcher`] owns one instance registry and one method index cache and
//! exposes the named operations clients call over a transport. An
//! [`EndpointTable`] hosts several dispatchers under endpoint names and is
//! what the transports serve.

mod dispatcher;
mod endpoints;

pub use dispatcher::{Dispatcher, Invocation, MethodCall};
pub use endpoints::{EndpointTable, OperationCall};

use crate::Result;

/// Names of the operations a [`Dispatcher`] answers.
pub mod operations {
    /// `(declaring type or null, name) -> TargetHandle`
    pub const LOOKUP: &str = "lookup";
    /// `(name, declaring type, return type, method, signature, args) -> value`
    pub const INVOKE_STATELESS: &str = "invokeStateless";
    /// `(session id, declaring type, return type, method, signature, args) -> value`
    pub const INVOKE_STATEFUL: &str = "invokeStateful";
    /// `(csv) -> null`
    pub const REGISTER_STATELESS_NAMES: &str = "registerStatelessNames";
    /// `(csv) -> null`
    pub const REGISTER_STATEFUL_NAMES: &str = "registerStatefulNames";

    pub const ALL: [&str; 5] = [
        LOOKUP,
        INVOKE_STATELESS,
        INVOKE_STATEFUL,
        REGISTER_STATELESS_NAMES,
        REGISTER_STATEFUL_NAMES,
    ];
}

/// Routes a named operation with JSON params to its handler.
///
/// Implemented by [`EndpointTable`]; the TCP server, the HTTP handler and the
/// in-process connector all serve through this trait.
#[async_trait::async_trait]
pub trait OperationDispatch: Send + Sync + 'static {
    /// Dispatch an operation call and return the result.
    async fn dispatch(&self, operation: &str, params: serde_json::Value) -> Result<serde_json::Value>;
}
