//! Session identifiers for stateful targets.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::signature::{Portable, Primitive, TypeDesc};

/// Opaque key of one stateful target instance. Always in `0..=i64::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct SessionId(u64);

impl SessionId {
    pub const MAX: u64 = i64::MAX as u64;

    pub fn new(raw: u64) -> Option<Self> {
        (raw <= Self::MAX).then_some(SessionId(raw))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for SessionId {
    type Error = String;

    fn try_from(raw: u64) -> std::result::Result<Self, Self::Error> {
        SessionId::new(raw).ok_or_else(|| format!("session id {} exceeds 63 bits", raw))
    }
}

impl From<SessionId> for u64 {
    fn from(id: SessionId) -> u64 {
        id.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Portable for SessionId {
    fn type_desc() -> TypeDesc {
        TypeDesc::Primitive(Primitive::Long)
    }
}

/// How new session ids are drawn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionIdStrategy {
    /// Uniform random 63-bit values, redrawn on collision.
    #[default]
    Random,
    /// Increasing counter, skipping ids still in use after wrap-around.
    Sequential,
}

/// Draws ids that are unused at allocation time.
///
/// Callers hold the lock guarding the session map while allocating, which
/// makes generate-and-check atomic with respect to other allocations.
#[derive(Debug)]
pub(crate) struct SessionIdAllocator {
    strategy: SessionIdStrategy,
    next: u64,
}

impl SessionIdAllocator {
    pub(crate) fn new(strategy: SessionIdStrategy) -> Self {
        Self { strategy, next: 1 }
    }

    pub(crate) fn allocate(&mut self, in_use: impl Fn(SessionId) -> bool) -> SessionId {
        loop {
            let candidate = match self.strategy {
                SessionIdStrategy::Random => SessionId(rand::rng().random_range(0..=SessionId::MAX)),
                SessionIdStrategy::Sequential => {
                    let id = SessionId(self.next);
                    self.next = if self.next >= SessionId::MAX {
                        0
                    } else {
                        self.next + 1
                    };
                    id
                }
            };
            if !in_use(candidate) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_session_id_range() {
        assert!(SessionId::new(SessionId::MAX).is_some());
        assert!(SessionId::new(SessionId::MAX + 1).is_none());
    }

    #[test]
    fn test_session_id_serde_rejects_64_bit_values() {
        let id: SessionId = serde_json::from_value(serde_json::json!(42)).unwrap();
        assert_eq!(id.get(), 42);
        assert_eq!(serde_json::to_value(id).unwrap(), serde_json::json!(42));

        let too_big = serde_json::from_value::<SessionId>(serde_json::json!(u64::MAX));
        assert!(too_big.is_err());
    }

    #[test]
    fn test_random_ids_are_63_bit_and_unique() {
        let mut allocator = SessionIdAllocator::new(SessionIdStrategy::Random);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            let id = allocator.allocate(|id| seen.contains(&id));
            assert!(id.get() <= SessionId::MAX);
            seen.insert(id);
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_sequential_skips_ids_in_use() {
        let mut allocator = SessionIdAllocator::new(SessionIdStrategy::Sequential);
        let taken: HashSet<SessionId> = [SessionId(2), SessionId(3)].into_iter().collect();

        assert_eq!(allocator.allocate(|id| taken.contains(&id)).get(), 1);
        assert_eq!(allocator.allocate(|id| taken.contains(&id)).get(), 4);
    }

    #[test]
    fn test_sequential_wraps_to_zero() {
        let mut allocator = SessionIdAllocator::new(SessionIdStrategy::Sequential);
        allocator.next = SessionId::MAX;

        assert_eq!(allocator.allocate(|_| false).get(), SessionId::MAX);
        assert_eq!(allocator.allocate(|_| false).get(), 0);
    }
}
