//! Error types for farcall.
//!
//! A single error enum covers naming, method resolution, dispatch, transport
//! and application failures. Errors cross the wire inside the JSON-RPC
//! `error.data` field as a tagged [`WireFailure`], which lets the client side
//! rebuild the same variant the server produced.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A failure raised by the body of an invoked method.
///
/// Faults are never wrapped by the dispatcher: the caller receives the same
/// kind, message and data the target produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Fault {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            data: None,
        }
    }

    /// Attach structured data to the fault.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Check the fault kind.
    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Main error type for farcall.
#[derive(Debug, Error)]
pub enum FarcallError {
    // Naming errors
    #[error("No registered stateful or stateless target called '{name}'")]
    UnknownName { name: String },

    #[error("Expected {expected} for {name}, found {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Nothing bound under {name}: {message}")]
    NotBound { name: String, message: String },

    #[error("No instance found for {target}")]
    NoSuchInstance { target: String },

    // Method resolution errors
    #[error("No method {method}{signature} on {type_name}")]
    MethodNotFound {
        type_name: String,
        method: String,
        signature: String,
    },

    #[error("Invalid signature entry '{entry}': {reason}")]
    InvalidSignature { entry: String, reason: String },

    #[error("Invalid arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Could not find method called {method} with signature {signature}: {reason}")]
    DispatchFailure {
        method: String,
        signature: String,
        reason: String,
    },

    // Raised by the invoked method itself
    #[error(transparent)]
    Application(#[from] Fault),

    // Routing errors
    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    // Transport errors
    #[error("Transport failure for {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Remote failure ({code}): {message}")]
    Remote { code: i32, message: String },

    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for farcall operations.
pub type Result<T> = std::result::Result<T, FarcallError>;

impl From<std::io::Error> for FarcallError {
    fn from(err: std::io::Error) -> Self {
        FarcallError::Io {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FarcallError {
    fn from(err: serde_json::Error) -> Self {
        FarcallError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl FarcallError {
    /// Build a transport error for an endpoint.
    pub fn transport(endpoint: impl Into<String>, message: impl std::fmt::Display) -> Self {
        FarcallError::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard JSON-RPC error codes:
    /// - -32601: Method not found (unknown operation)
    /// - -32602: Invalid params
    /// - -32603: Internal error
    ///
    /// Application-defined codes:
    /// - -32000: Transport error
    /// - -32010: Unknown name
    /// - -32011: Type mismatch / nothing bound
    /// - -32012: No such instance
    /// - -32013: Method resolution or dispatch failure
    /// - -32014: Unknown endpoint
    /// - -32020: Fault raised by the invoked method
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            FarcallError::UnknownOperation(_) => -32601,

            FarcallError::Json { .. } | FarcallError::Validation { .. } => -32602,

            FarcallError::Transport { .. } => -32000,

            FarcallError::UnknownName { .. } => -32010,

            FarcallError::TypeMismatch { .. } | FarcallError::NotBound { .. } => -32011,

            FarcallError::NoSuchInstance { .. } => -32012,

            FarcallError::MethodNotFound { .. }
            | FarcallError::InvalidSignature { .. }
            | FarcallError::InvalidArguments { .. }
            | FarcallError::DispatchFailure { .. } => -32013,

            FarcallError::UnknownEndpoint(_) => -32014,

            FarcallError::Application(_) => -32020,

            FarcallError::Remote { code, .. } => *code,

            _ => -32603,
        }
    }

    /// True if the error was raised by the invoked method body.
    pub fn is_application(&self) -> bool {
        matches!(self, FarcallError::Application(_))
    }

    /// The structured wire form of this error, if it has one.
    pub fn to_wire(&self) -> Option<WireFailure> {
        let wire = match self {
            FarcallError::UnknownName { name } => WireFailure::UnknownName { name: name.clone() },
            FarcallError::TypeMismatch {
                name,
                expected,
                actual,
            } => WireFailure::TypeMismatch {
                name: name.clone(),
                expected: expected.clone(),
                actual: actual.clone(),
            },
            FarcallError::NotBound { name, message } => WireFailure::NotBound {
                name: name.clone(),
                message: message.clone(),
            },
            FarcallError::NoSuchInstance { target } => WireFailure::NoSuchInstance {
                target: target.clone(),
            },
            FarcallError::MethodNotFound {
                type_name,
                method,
                signature,
            } => WireFailure::MethodNotFound {
                type_name: type_name.clone(),
                method: method.clone(),
                signature: signature.clone(),
            },
            FarcallError::DispatchFailure {
                method,
                signature,
                reason,
            } => WireFailure::DispatchFailure {
                method: method.clone(),
                signature: signature.clone(),
                reason: reason.clone(),
            },
            FarcallError::Application(fault) => WireFailure::Application {
                fault: fault.clone(),
            },
            FarcallError::UnknownEndpoint(endpoint) => WireFailure::UnknownEndpoint {
                endpoint: endpoint.clone(),
            },
            FarcallError::UnknownOperation(operation) => WireFailure::UnknownOperation {
                operation: operation.clone(),
            },
            FarcallError::InvalidArguments { message } => WireFailure::InvalidArguments {
                message: message.clone(),
            },
            _ => return None,
        };
        Some(wire)
    }

    /// Rebuild an error from a JSON-RPC error object.
    ///
    /// Falls back to [`FarcallError::Remote`] when `data` carries no
    /// recognised failure.
    pub fn from_rpc_error(code: i32, message: String, data: Option<serde_json::Value>) -> Self {
        match data.map(serde_json::from_value::<WireFailure>) {
            Some(Ok(wire)) => wire.into(),
            _ => FarcallError::Remote { code, message },
        }
    }
}

/// Tagged failure carried in the JSON-RPC `error.data` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireFailure {
    UnknownName {
        name: String,
    },
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    NotBound {
        name: String,
        message: String,
    },
    NoSuchInstance {
        target: String,
    },
    MethodNotFound {
        type_name: String,
        method: String,
        signature: String,
    },
    DispatchFailure {
        method: String,
        signature: String,
        reason: String,
    },
    Application {
        fault: Fault,
    },
    UnknownEndpoint {
        endpoint: String,
    },
    UnknownOperation {
        operation: String,
    },
    InvalidArguments {
        message: String,
    },
}

impl From<WireFailure> for FarcallError {
    fn from(wire: WireFailure) -> Self {
        match wire {
            WireFailure::UnknownName { name } => FarcallError::UnknownName { name },
            WireFailure::TypeMismatch {
                name,
                expected,
                actual,
            } => FarcallError::TypeMismatch {
                name,
                expected,
                actual,
            },
            WireFailure::NotBound { name, message } => FarcallError::NotBound { name, message },
            WireFailure::NoSuchInstance { target } => FarcallError::NoSuchInstance { target },
            WireFailure::MethodNotFound {
                type_name,
                method,
                signature,
            } => FarcallError::MethodNotFound {
                type_name,
                method,
                signature,
            },
            WireFailure::DispatchFailure {
                method,
                signature,
                reason,
            } => FarcallError::DispatchFailure {
                method,
                signature,
                reason,
            },
            WireFailure::Application { fault } => FarcallError::Application(fault),
            WireFailure::UnknownEndpoint { endpoint } => FarcallError::UnknownEndpoint(endpoint),
            WireFailure::UnknownOperation { operation } => {
                FarcallError::UnknownOperation(operation)
            }
            WireFailure::InvalidArguments { message } => FarcallError::InvalidArguments { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FarcallError::UnknownName {
            name: "nonexistent".into(),
        };
        assert_eq!(
            err.to_string(),
            "No registered stateful or stateless target called 'nonexistent'"
        );
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            FarcallError::NoSuchInstance {
                target: "session 7".into()
            }
            .to_rpc_error_code(),
            -32012
        );
        assert_eq!(
            FarcallError::Application(Fault::new("demo::Overdrawn", "no funds")).to_rpc_error_code(),
            -32020
        );
        assert_eq!(
            FarcallError::UnknownOperation("frobnicate".into()).to_rpc_error_code(),
            -32601
        );
    }

    #[test]
    fn test_fault_survives_wire_encoding() {
        let fault = Fault::new("demo::Overdrawn", "balance too low")
            .with_data(serde_json::json!({"balance": 3}));
        let err = FarcallError::Application(fault.clone());

        let data = serde_json::to_value(err.to_wire().unwrap()).unwrap();
        assert_eq!(data["kind"], "application");

        let rebuilt = FarcallError::from_rpc_error(err.to_rpc_error_code(), err.to_string(), Some(data));
        match rebuilt {
            FarcallError::Application(back) => assert_eq!(back, fault),
            other => panic!("Expected Application, got: {:?}", other),
        }
    }

    #[test]
    fn test_unrecognised_error_data_becomes_remote() {
        let rebuilt = FarcallError::from_rpc_error(
            -32603,
            "boom".to_string(),
            Some(serde_json::json!({"kind": "something_else"})),
        );
        assert!(matches!(rebuilt, FarcallError::Remote { code: -32603, .. }));

        let rebuilt = FarcallError::from_rpc_error(-32603, "boom".to_string(), None);
        assert!(matches!(rebuilt, FarcallError::Remote { .. }));
    }

    #[test]
    fn test_internal_errors_have_no_wire_form() {
        assert!(FarcallError::Other("x".into()).to_wire().is_none());
        assert!(FarcallError::transport("tcp://localhost:1", "refused")
            .to_wire()
            .is_none());
    }
}
