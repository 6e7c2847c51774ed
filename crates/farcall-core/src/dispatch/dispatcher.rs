//! The dispatcher: resolves targets and methods, then invokes.

use super::operations;
use crate::reflection::{Instance, MethodHandle, ReflectionIndex};
use crate::registry::{Binder, InstanceRegistry, SessionId, TargetHandle, TargetKind};
use crate::signature::{self, Params, Signature};
use crate::{FarcallError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One method call, minus its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    /// Interface the caller invokes through. Empty skips the check.
    pub declaring_type: String,
    /// Portable name of the expected return type.
    pub return_type: String,
    pub method: String,
    pub signature: Signature,
    pub args: Vec<Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, signature: Signature, args: Vec<Value>) -> Self {
        Self {
            declaring_type: String::new(),
            return_type: String::new(),
            method: method.into(),
            signature,
            args,
        }
    }

    pub fn declared_by(mut self, declaring_type: impl Into<String>) -> Self {
        self.declaring_type = declaring_type.into();
        self
    }

    pub fn returning(mut self, return_type: impl Into<String>) -> Self {
        self.return_type = return_type.into();
        self
    }

    fn failure(&self, reason: impl std::fmt::Display) -> FarcallError {
        FarcallError::DispatchFailure {
            method: self.method.clone(),
            signature: self.signature.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// A method call together with its target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    pub target: TargetHandle,
    pub call: MethodCall,
}

/// Server-side entry point for remote invocations.
pub struct Dispatcher {
    registry: InstanceRegistry,
    index: ReflectionIndex,
}

impl Dispatcher {
    pub fn new(binder: Arc<dyn Binder>) -> Self {
        Self::with_registry(InstanceRegistry::new(binder))
    }

    pub fn with_registry(registry: InstanceRegistry) -> Self {
        Self {
            registry,
            index: ReflectionIndex::new(),
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn register_stateless_names(&self, csv: &str) -> Result<()> {
        self.registry.register_csv(TargetKind::Stateless, csv)
    }

    pub fn register_stateful_names(&self, csv: &str) -> Result<()> {
        self.registry.register_csv(TargetKind::Stateful, csv)
    }

    /// Look up a registered name, optionally checking it against a declaring type.
    pub fn lookup(&self, declaring_type: Option<&str>, name: &str) -> Result<TargetHandle> {
        let handle = self.registry.lookup(declaring_type, name)?;
        debug!("Lookup of '{}' gave {:?}", name, handle);
        Ok(handle)
    }

    /// Invoke a method on the shared instance of a stateless name.
    pub fn invoke_stateless(&self, name: &str, call: MethodCall) -> Result<Value> {
        let instance = self.registry.resolve_stateless(name)?;
        let method = self.resolve_method(&instance, &call)?;
        run(&method, &instance, call)
    }

    /// Invoke a method on the instance behind a session.
    ///
    /// If the method is a remove method, the session is dropped once the body
    /// has run, whether it returned a value or raised a fault.
    pub fn invoke_stateful(&self, session_id: SessionId, call: MethodCall) -> Result<Value> {
        let instance = self.registry.resolve_stateful(session_id)?;
        let method = self.resolve_method(&instance, &call)?;
        let result = run(&method, &instance, call);

        let body_ran = matches!(result, Ok(_) | Err(FarcallError::Application(_)));
        if method.removes_instance() && body_ran {
            self.registry.remove_stateful(session_id)?;
            info!("Session {} ended by {}", session_id, method.name());
        }
        result
    }

    /// Invoke on whichever target the invocation names.
    pub fn invoke(&self, invocation: Invocation) -> Result<Value> {
        match invocation.target {
            TargetHandle::Stateless { name } => self.invoke_stateless(&name, invocation.call),
            TargetHandle::Stateful { session_id, .. } => {
                self.invoke_stateful(session_id, invocation.call)
            }
        }
    }

    /// Run a named operation with positional arguments.
    ///
    /// A non-empty `signature` must equal the operation's own parameter
    /// signature.
    pub fn call_operation(
        &self,
        operation: &str,
        args: Vec<Value>,
        signature: &Signature,
    ) -> Result<Value> {
        match operation {
            operations::LOOKUP => {
                let (declaring_type, name): (Option<String>, String) =
                    decode_args(operation, args, signature)?;
                let handle = self.lookup(declaring_type.as_deref(), &name)?;
                Ok(serde_json::to_value(handle)?)
            }
            operations::INVOKE_STATELESS => {
                let (name, declaring_type, return_type, method, method_signature, method_args): (
                    String,
                    String,
                    String,
                    String,
                    Signature,
                    Vec<Value>,
                ) = decode_args(operation, args, signature)?;
                let call = MethodCall::new(method, method_signature, method_args)
                    .declared_by(declaring_type)
                    .returning(return_type);
                self.invoke_stateless(&name, call)
            }
            operations::INVOKE_STATEFUL => {
                let (session_id, declaring_type, return_type, method, method_signature, method_args): (
                    SessionId,
                    String,
                    String,
                    String,
                    Signature,
                    Vec<Value>,
                ) = decode_args(operation, args, signature)?;
                let call = MethodCall::new(method, method_signature, method_args)
                    .declared_by(declaring_type)
                    .returning(return_type);
                self.invoke_stateful(session_id, call)
            }
            operations::REGISTER_STATELESS_NAMES => {
                let (csv,): (String,) = decode_args(operation, args, signature)?;
                self.register_stateless_names(&csv)?;
                Ok(Value::Null)
            }
            operations::REGISTER_STATEFUL_NAMES => {
                let (csv,): (String,) = decode_args(operation, args, signature)?;
                self.register_stateful_names(&csv)?;
                Ok(Value::Null)
            }
            other => Err(FarcallError::UnknownOperation(other.to_string())),
        }
    }

    /// Drop every cached instance and session.
    pub fn teardown(&self) -> Result<()> {
        self.registry.teardown()
    }

    fn resolve_method(&self, instance: &Instance, call: &MethodCall) -> Result<MethodHandle> {
        if !call.declaring_type.is_empty() && !instance.is_assignable_to(&call.declaring_type) {
            return Err(call.failure(format!(
                "{} does not implement {}",
                instance.type_name(),
                call.declaring_type
            )));
        }
        signature::resolve(
            &self.index,
            instance,
            &call.return_type,
            &call.method,
            &call.signature,
        )
        .map_err(|e| {
            warn!("Failed to resolve {}{}: {}", call.method, call.signature, e);
            call.failure(e)
        })
    }
}

fn run(method: &MethodHandle, instance: &Instance, call: MethodCall) -> Result<Value> {
    let MethodCall {
        method: name,
        signature,
        args,
        ..
    } = call;
    method.invoke(instance, args).map_err(|e| match e {
        FarcallError::Application(_) => e,
        other => FarcallError::DispatchFailure {
            method: name,
            signature: signature.to_string(),
            reason: other.to_string(),
        },
    })
}

fn decode_args<P: Params>(operation: &str, args: Vec<Value>, signature: &Signature) -> Result<P> {
    if !signature.is_empty() {
        let expected = Signature::encode(&P::param_types());
        if *signature != expected {
            return Err(FarcallError::InvalidArguments {
                message: format!("{} takes {}, got {}", operation, expected, signature),
            });
        }
    }
    P::from_values(args)
}
