//! Actor and target identifiers.
//!
//! Both are lightweight `u64` handles with no data of their own. Actor IDs
//! come from the hosting server (player IDs); target IDs are allocated by the
//! world that owns the targets.

use serde::{Deserialize, Serialize};

/// Identifies a connected actor (a player).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(pub u64);

impl ActorId {
    /// Create an actor ID from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ActorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Actor({})", self.0)
    }
}

/// Identifies an object that can be probed and committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl TargetId {
    /// Create a target ID from a raw `u64`.
    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Target({})", self.0)
    }
}

/// Allocates monotonically increasing target IDs, starting at 1.
#[derive(Debug)]
pub struct TargetAllocator {
    next_id: u64,
}

impl TargetAllocator {
    /// Creates a new allocator. IDs start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh target ID.
    pub fn allocate(&mut self) -> TargetId {
        let id = self.next_id;
        self.next_id += 1;
        TargetId(id)
    }

    /// Make sure IDs handed out later never collide with `id`.
    pub fn reserve(&mut self, id: TargetId) {
        self.next_id = self.next_id.max(id.0 + 1);
    }
}

impl Default for TargetAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = TargetAllocator::new();
        assert_eq!(alloc.allocate(), TargetId(1));
        assert_eq!(alloc.allocate(), TargetId(2));
    }

    #[test]
    fn test_reserve_skips_past_explicit_ids() {
        let mut alloc = TargetAllocator::new();
        alloc.reserve(TargetId(10));
        assert_eq!(alloc.allocate(), TargetId(11));
        alloc.reserve(TargetId(3));
        assert_eq!(alloc.allocate(), TargetId(12));
    }

    #[test]
    fn test_actor_display() {
        assert_eq!(ActorId::from_raw(76561198000000000).to_string(), "Actor(76561198000000000)");
    }
}
