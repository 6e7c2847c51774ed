//! Cached per-type method indexes.

use super::table::{MethodHandle, MethodTable};
use super::{Instance, Remote};
use crate::signature::TypeDesc;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// All invocable methods of one concrete type, grouped by name.
pub struct TypeIndex {
    type_name: &'static str,
    methods: Vec<MethodHandle>,
    by_name: HashMap<String, Vec<usize>>,
}

impl TypeIndex {
    /// Build the index for `T` from its [`Remote::describe`] table.
    pub fn of<T: Remote>() -> Self {
        let mut table = MethodTable::<T>::new();
        T::describe(&mut table);

        let mut index = TypeIndex {
            type_name: T::TYPE_NAME,
            methods: Vec::new(),
            by_name: HashMap::new(),
        };

        for entry in table.into_entries() {
            let handle = MethodHandle::new(entry);
            if index.methods.iter().any(|m| m.descriptor() == handle.descriptor()) {
                warn!(
                    "Ignoring duplicate registration of {} on {}",
                    handle.descriptor(),
                    T::TYPE_NAME
                );
                continue;
            }
            index
                .by_name
                .entry(handle.name().to_string())
                .or_default()
                .push(index.methods.len());
            index.methods.push(handle);
        }

        index
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Every registered method, in registration order.
    pub fn methods(&self) -> &[MethodHandle] {
        &self.methods
    }

    /// Find the method with this name and exact parameter list.
    ///
    /// When several methods share name and parameters, the one whose return
    /// type's portable name equals `return_hint` is chosen.
    pub fn get_method(
        &self,
        return_hint: &str,
        name: &str,
        params: &[TypeDesc],
    ) -> Option<MethodHandle> {
        let candidates: Vec<&MethodHandle> = self
            .by_name
            .get(name)?
            .iter()
            .map(|&i| &self.methods[i])
            .filter(|m| m.descriptor().params == params)
            .collect();

        match candidates.as_slice() {
            [] => None,
            [only] => Some((*only).clone()),
            several => several
                .iter()
                .find(|m| m.descriptor().returns.portable_name() == return_hint)
                .map(|m| (*m).clone()),
        }
    }
}

/// Process-lifetime cache of [`TypeIndex`] values keyed by concrete type.
///
/// Racing first builds for the same type are harmless: the index is derived
/// only from the type's static method table, and the first insert wins.
#[derive(Default)]
pub struct ReflectionIndex {
    types: RwLock<HashMap<TypeId, Arc<TypeIndex>>>,
}

impl ReflectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the index for the target's concrete type, building it on first use.
    pub fn type_index(&self, target: &Instance) -> Arc<TypeIndex> {
        let id = target.type_id();

        // A poisoned lock still holds complete entries; inserts are single calls.
        if let Some(found) = self
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
        {
            return found.clone();
        }

        let built = Arc::new(target.target().build_index());
        debug!(
            "Built method index for {} ({} methods)",
            built.type_name(),
            built.methods().len()
        );

        self.types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_insert(built)
            .clone()
    }

    /// Number of types indexed so far.
    pub fn len(&self) -> usize {
        self.types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
