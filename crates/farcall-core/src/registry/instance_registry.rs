//! In-memory registry of stateless and stateful target instances.

use super::session::{SessionId, SessionIdAllocator, SessionIdStrategy};
use crate::config::parse_names;
use crate::reflection::{Instance, Remote};
use crate::{FarcallError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

/// Resolves a logical name to a target instance.
///
/// Called once per stateless name (the result is cached by the registry) and
/// on every lookup of a stateful name (each call must produce a fresh
/// instance).
pub trait Binder: Send + Sync {
    fn bind(&self, name: &str) -> Result<Instance>;
}

type Factory = Arc<dyn Fn() -> Instance + Send + Sync>;

/// A [`Binder`] backed by per-name factories.
#[derive(Default)]
pub struct BindingTable {
    factories: HashMap<String, Factory>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to a factory producing a new target per call.
    pub fn bind_with<T, F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        T: Remote,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.factories
            .insert(name.into(), Arc::new(move || Instance::new(factory())));
        self
    }

    /// Bind `name` to one shared target.
    pub fn bind_shared<T: Remote>(&mut self, name: impl Into<String>, target: T) -> &mut Self {
        let shared = Instance::new(target);
        self.factories
            .insert(name.into(), Arc::new(move || shared.clone()));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl Binder for BindingTable {
    fn bind(&self, name: &str) -> Result<Instance> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| FarcallError::NotBound {
                name: name.to_string(),
                message: "no binding registered".to_string(),
            })?;
        Ok(factory())
    }
}

/// Lifecycle of a registered name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// One shared instance per name.
    Stateless,
    /// A new instance and session per lookup.
    Stateful,
}

/// What a lookup hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetHandle {
    Stateless { name: String },
    Stateful { name: String, session_id: SessionId },
}

impl TargetHandle {
    pub fn name(&self) -> &str {
        match self {
            TargetHandle::Stateless { name } | TargetHandle::Stateful { name, .. } => name,
        }
    }

    pub fn session_id(&self) -> Option<SessionId> {
        match self {
            TargetHandle::Stateless { .. } => None,
            TargetHandle::Stateful { session_id, .. } => Some(*session_id),
        }
    }
}

struct StatefulEntry {
    name: String,
    instance: Instance,
}

struct RegistryState {
    stateless_names: HashSet<String>,
    stateful_names: HashSet<String>,
    stateless: HashMap<String, Instance>,
    stateful: HashMap<SessionId, StatefulEntry>,
    ids: SessionIdAllocator,
}

impl RegistryState {
    fn kind_of(&self, name: &str) -> Option<TargetKind> {
        if self.stateless_names.contains(name) {
            Some(TargetKind::Stateless)
        } else if self.stateful_names.contains(name) {
            Some(TargetKind::Stateful)
        } else {
            None
        }
    }
}

/// Registry mapping logical names to stateless instances and session ids to
/// stateful instances.
///
/// All maps live behind one mutex. Binding runs outside the lock, so a slow
/// binder never blocks resolution of other targets.
pub struct InstanceRegistry {
    binder: Arc<dyn Binder>,
    state: Mutex<RegistryState>,
}

impl InstanceRegistry {
    pub fn new(binder: Arc<dyn Binder>) -> Self {
        Self::with_strategy(binder, SessionIdStrategy::default())
    }

    pub fn with_strategy(binder: Arc<dyn Binder>, strategy: SessionIdStrategy) -> Self {
        Self {
            binder,
            state: Mutex::new(RegistryState {
                stateless_names: HashSet::new(),
                stateful_names: HashSet::new(),
                stateless: HashMap::new(),
                stateful: HashMap::new(),
                ids: SessionIdAllocator::new(strategy),
            }),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, RegistryState>> {
        self.state
            .lock()
            .map_err(|_| FarcallError::Other("Failed to acquire instance registry lock".to_string()))
    }

    /// Declare names that resolve to one shared instance each.
    pub fn register_stateless_names<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_names(TargetKind::Stateless, names)
    }

    /// Declare names that resolve to a new instance per lookup.
    pub fn register_stateful_names<I, S>(&self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register_names(TargetKind::Stateful, names)
    }

    /// Register a comma-separated list of names.
    pub fn register_csv(&self, kind: TargetKind, csv: &str) -> Result<()> {
        self.register_names(kind, parse_names(csv))
    }

    fn register_names<I, S>(&self, kind: TargetKind, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let mut state = self.lock_state()?;

        // Validate the whole batch before touching either set.
        for name in &names {
            if let Some(existing) = state.kind_of(name) {
                if existing != kind {
                    return Err(FarcallError::Config {
                        message: format!(
                            "'{}' is already registered as {:?}, cannot register as {:?}",
                            name, existing, kind
                        ),
                    });
                }
            }
        }

        let set = match kind {
            TargetKind::Stateless => &mut state.stateless_names,
            TargetKind::Stateful => &mut state.stateful_names,
        };
        for name in names {
            if set.insert(name.clone()) {
                info!("Registered {:?} name '{}'", kind, name);
            }
        }
        Ok(())
    }

    /// The registered kind of `name`, if any.
    pub fn kind_of(&self, name: &str) -> Result<Option<TargetKind>> {
        Ok(self.lock_state()?.kind_of(name))
    }

    /// Look up a registered name.
    ///
    /// Stateless names bind once and share the cached instance. Stateful
    /// names bind a new instance and allocate a fresh session id every time.
    /// When `expected_type` is given, the bound instance must be assignable
    /// to it; a mismatch caches nothing.
    pub fn lookup(&self, expected_type: Option<&str>, name: &str) -> Result<TargetHandle> {
        let kind = self
            .lock_state()?
            .kind_of(name)
            .ok_or_else(|| FarcallError::UnknownName {
                name: name.to_string(),
            })?;

        match kind {
            TargetKind::Stateless => self.lookup_stateless(expected_type, name),
            TargetKind::Stateful => self.lookup_stateful(expected_type, name),
        }
    }

    fn lookup_stateless(&self, expected_type: Option<&str>, name: &str) -> Result<TargetHandle> {
        let cached = self.lock_state()?.stateless.get(name).cloned();
        let instance = match cached {
            Some(instance) => instance,
            None => self.binder.bind(name)?,
        };
        check_assignable(name, expected_type, &instance)?;

        let mut state = self.lock_state()?;
        if !state.stateless.contains_key(name) {
            debug!("Bound stateless '{}' to {}", name, instance.type_name());
            state.stateless.insert(name.to_string(), instance);
        }

        Ok(TargetHandle::Stateless {
            name: name.to_string(),
        })
    }

    fn lookup_stateful(&self, expected_type: Option<&str>, name: &str) -> Result<TargetHandle> {
        let instance = self.binder.bind(name)?;
        check_assignable(name, expected_type, &instance)?;

        let mut state = self.lock_state()?;
        let RegistryState { ids, stateful, .. } = &mut *state;
        let session_id = ids.allocate(|id| stateful.contains_key(&id));
        stateful.insert(
            session_id,
            StatefulEntry {
                name: name.to_string(),
                instance,
            },
        );
        debug!("Created session {} for stateful '{}'", session_id, name);

        Ok(TargetHandle::Stateful {
            name: name.to_string(),
            session_id,
        })
    }

    /// The shared instance of a stateless name that has been looked up.
    pub fn resolve_stateless(&self, name: &str) -> Result<Instance> {
        self.lock_state()?
            .stateless
            .get(name)
            .cloned()
            .ok_or_else(|| FarcallError::NoSuchInstance {
                target: format!("stateless '{}'", name),
            })
    }

    /// The instance behind a live session.
    pub fn resolve_stateful(&self, session_id: SessionId) -> Result<Instance> {
        self.lock_state()?
            .stateful
            .get(&session_id)
            .map(|entry| entry.instance.clone())
            .ok_or_else(|| FarcallError::NoSuchInstance {
                target: format!("session {}", session_id),
            })
    }

    /// Drop a session. Returns false if it was not live.
    pub fn remove_stateful(&self, session_id: SessionId) -> Result<bool> {
        let removed = self.lock_state()?.stateful.remove(&session_id);
        if let Some(entry) = &removed {
            debug!("Removed session {} of '{}'", session_id, entry.name);
        }
        Ok(removed.is_some())
    }

    /// Clear every cached instance and session. Registered names stay.
    pub fn teardown(&self) -> Result<()> {
        let mut state = self.lock_state()?;
        info!(
            "Tearing down registry ({} stateless, {} sessions)",
            state.stateless.len(),
            state.stateful.len()
        );
        state.stateless.clear();
        state.stateful.clear();
        Ok(())
    }

    /// True if the stateless name has a cached instance.
    pub fn is_bound(&self, name: &str) -> Result<bool> {
        Ok(self.lock_state()?.stateless.contains_key(name))
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> Result<usize> {
        Ok(self.lock_state()?.stateful.len())
    }
}

fn check_assignable(name: &str, expected_type: Option<&str>, instance: &Instance) -> Result<()> {
    match expected_type {
        Some(expected) if !instance.is_assignable_to(expected) => Err(FarcallError::TypeMismatch {
            name: name.to_string(),
            expected: expected.to_string(),
            actual: instance.type_name().to_string(),
        }),
        _ => Ok(()),
    }
}
