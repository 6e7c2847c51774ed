//! Target instance registry.
//!
//! Names are declared up front as either stateless or stateful:
//!
//! - **Stateless**: the first lookup binds one instance which every later
//!   lookup and invocation shares until teardown.
//! - **Stateful**: every lookup binds a fresh instance and files it under a
//!   new [`SessionId`]. The session lives until a remove method runs on it,
//!   it is removed explicitly, or the registry is torn down.
//!
//! Binding is delegated to a [`Binder`]; [`BindingTable`] is the in-process
//! implementation.

mod instance_registry;
mod session;

pub use instance_registry::{Binder, BindingTable, InstanceRegistry, TargetHandle, TargetKind};
pub use session::{SessionId, SessionIdStrategy};
