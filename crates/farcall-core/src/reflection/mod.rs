//! Per-type method indexes for remotely invocable targets.
//!
//! A target type implements [`Remote`] and lists its invocable methods in
//! [`Remote::describe`]. The resulting [`TypeIndex`] is what a signature
//! resolves against. Building it walks every registered method, so the
//! [`ReflectionIndex`] cache builds each type's index once and hands out the
//! shared copy afterwards.
//!
//! # Example
//!
//! ```rust
//! use farcall::reflection::{Instance, MethodTable, Remote};
//! use std::sync::atomic::{AtomicI32, Ordering};
//!
//! #[derive(Default)]
//! struct Counter {
//!     value: AtomicI32,
//! }
//!
//! impl Remote for Counter {
//!     const TYPE_NAME: &'static str = "demo::Counter";
//!     const INTERFACES: &'static [&'static str] = &["demo.CounterApi"];
//!
//!     fn describe(methods: &mut MethodTable<Self>) {
//!         methods
//!             .method("add", |this: &Counter, (delta,): (i32,)| {
//!                 Ok(this.value.fetch_add(delta, Ordering::SeqCst) + delta)
//!             })
//!             .method("get", |this: &Counter, (): ()| Ok(this.value.load(Ordering::SeqCst)));
//!     }
//! }
//!
//! let counter = Instance::new(Counter::default());
//! assert!(counter.is_assignable_to("demo.CounterApi"));
//! ```

mod index;
mod table;

pub use index::{ReflectionIndex, TypeIndex};
pub use table::{MethodHandle, MethodTable};

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

/// A type whose methods can be invoked remotely.
///
/// Methods take `&self`; targets keep mutable state behind their own
/// synchronization since the dispatcher does not serialize invocations.
pub trait Remote: Send + Sync + Sized + 'static {
    /// Qualified name of the concrete type.
    const TYPE_NAME: &'static str;

    /// Interface names this type can be looked up as.
    const INTERFACES: &'static [&'static str] = &[];

    /// Register the invocable methods.
    fn describe(methods: &mut MethodTable<Self>);
}

/// Object-safe view of a [`Remote`] value.
pub trait AnyTarget: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn interfaces(&self) -> &'static [&'static str];

    fn build_index(&self) -> TypeIndex;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Remote> AnyTarget for T {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn interfaces(&self) -> &'static [&'static str] {
        T::INTERFACES
    }

    fn build_index(&self) -> TypeIndex {
        TypeIndex::of::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A shared, type-erased target instance.
#[derive(Clone)]
pub struct Instance(Arc<dyn AnyTarget>);

impl Instance {
    pub fn new<T: Remote>(target: T) -> Self {
        Instance(Arc::new(target))
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub(crate) fn type_id(&self) -> TypeId {
        self.0.as_any().type_id()
    }

    pub(crate) fn target(&self) -> &dyn AnyTarget {
        &*self.0
    }

    /// True if the instance's type is `expected` or declares it as an interface.
    pub fn is_assignable_to(&self, expected: &str) -> bool {
        self.0.type_name() == expected || self.0.interfaces().iter().any(|i| *i == expected)
    }

    /// True if both handles point at the same target.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Instance").field(&self.type_name()).finish()
    }
}
