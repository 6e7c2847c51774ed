//! Method registration for target types.

use super::{Instance, Remote};
use crate::error::Fault;
use crate::signature::{MethodDescriptor, Params, Portable};
use crate::{FarcallError, Result};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

type Invoker = dyn Fn(&dyn Any, Vec<Value>) -> Result<Value> + Send + Sync;

pub(crate) struct MethodEntry {
    descriptor: MethodDescriptor,
    invoker: Box<Invoker>,
    removes_instance: bool,
}

/// A resolved, directly invocable method.
#[derive(Clone)]
pub struct MethodHandle(Arc<MethodEntry>);

impl MethodHandle {
    pub(crate) fn new(entry: MethodEntry) -> Self {
        MethodHandle(Arc::new(entry))
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.0.descriptor
    }

    pub fn name(&self) -> &str {
        &self.0.descriptor.name
    }

    /// True if invoking this method ends the target's session.
    pub fn removes_instance(&self) -> bool {
        self.0.removes_instance
    }

    /// Invoke on `target` with positional JSON arguments.
    ///
    /// A [`Fault`] raised by the method body comes back as
    /// [`FarcallError::Application`]; argument decoding problems as
    /// [`FarcallError::InvalidArguments`].
    pub fn invoke(&self, target: &Instance, args: Vec<Value>) -> Result<Value> {
        (self.0.invoker)(target.target().as_any(), args)
    }
}

impl PartialEq for MethodHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.descriptor == other.0.descriptor
    }
}

impl fmt::Debug for MethodHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodHandle")
            .field("method", &self.0.descriptor.to_string())
            .field("removes_instance", &self.0.removes_instance)
            .finish()
    }
}

/// Builder that [`Remote::describe`] fills with a type's methods.
pub struct MethodTable<T> {
    entries: Vec<MethodEntry>,
    _target: PhantomData<fn(&T)>,
}

impl<T: Remote> MethodTable<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Vec::new(),
            _target: PhantomData,
        }
    }

    /// Register a method. Parameter and return types come from `P` and `R`.
    pub fn method<P, R, F>(&mut self, name: &str, body: F) -> &mut Self
    where
        P: Params + 'static,
        R: Portable + 'static,
        F: Fn(&T, P) -> std::result::Result<R, Fault> + Send + Sync + 'static,
    {
        self.push(name, body, false)
    }

    /// Register a method that ends the session of the instance it runs on.
    ///
    /// After the body runs on a stateful instance, the session is removed and
    /// later calls through it fail with `NoSuchInstance`.
    pub fn remover<P, R, F>(&mut self, name: &str, body: F) -> &mut Self
    where
        P: Params + 'static,
        R: Portable + 'static,
        F: Fn(&T, P) -> std::result::Result<R, Fault> + Send + Sync + 'static,
    {
        self.push(name, body, true)
    }

    fn push<P, R, F>(&mut self, name: &str, body: F, removes_instance: bool) -> &mut Self
    where
        P: Params + 'static,
        R: Portable + 'static,
        F: Fn(&T, P) -> std::result::Result<R, Fault> + Send + Sync + 'static,
    {
        let invoker = move |target: &dyn Any, args: Vec<Value>| -> Result<Value> {
            let this = target.downcast_ref::<T>().ok_or_else(|| {
                FarcallError::Other(format!("receiver is not a {}", T::TYPE_NAME))
            })?;
            let params = P::from_values(args)?;
            let result = body(this, params)?;
            Ok(result.to_portable()?)
        };

        self.entries.push(MethodEntry {
            descriptor: MethodDescriptor::of::<P, R>(name),
            invoker: Box::new(invoker),
            removes_instance,
        });
        self
    }

    pub(crate) fn into_entries(self) -> Vec<MethodEntry> {
        self.entries
    }
}
