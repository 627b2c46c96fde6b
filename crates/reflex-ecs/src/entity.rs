//! Entity identifiers and the entity store.
//!
//! An [`EntityId`] is a monotonically increasing 64-bit handle. Ids are never
//! recycled: destruction is two-phase (logical destroy, then end-of-tick
//! physical free) and a destroyed entity holding system-state components must
//! stay resolvable under its id, so the id space stays sparse.
//!
//! The [`EntityStore`] is pure storage: it allocates ids and owns one
//! [`EntityRecord`] per resolvable entity. Cross-module maintenance (query
//! membership, pooling) is orchestrated by the [`World`](crate::world::World).

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::component::{BoxedComponent, ComponentTypeId};
use crate::query::QueryId;

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A unique entity identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Raw `u64` representation.
    #[inline]
    pub fn to_raw(self) -> u64 {
        self.0
    }

    /// Reconstruct from a raw `u64`.
    #[inline]
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({})", self.0)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// EntityRecord
// ---------------------------------------------------------------------------

/// Per-entity storage: alive flag, owned component instances keyed by type,
/// the set of queries the entity currently matches, and the count of attached
/// system-state components.
pub(crate) struct EntityRecord {
    /// `false` once the entity has been logically destroyed. The record may
    /// outlive the flag while system-state components remain attached.
    pub alive: bool,
    /// Owned component instances, keyed by registered type id.
    pub components: HashMap<ComponentTypeId, BoxedComponent>,
    /// Queries this entity is currently a member of.
    pub queries: HashSet<QueryId>,
    /// Number of attached components registered as `ComponentKind::State`.
    pub state_component_count: u32,
}

impl EntityRecord {
    fn new() -> Self {
        Self {
            alive: true,
            components: HashMap::new(),
            queries: HashSet::new(),
            state_component_count: 0,
        }
    }

    /// Whether the entity currently holds a component of the given type.
    #[inline]
    pub fn has(&self, type_id: ComponentTypeId) -> bool {
        self.components.contains_key(&type_id)
    }
}

impl fmt::Debug for EntityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRecord")
            .field("alive", &self.alive)
            .field("components", &self.components.len())
            .field("queries", &self.queries.len())
            .field("state_component_count", &self.state_component_count)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EntityStore
// ---------------------------------------------------------------------------

/// Allocates [`EntityId`]s and owns the records of all resolvable entities.
#[derive(Debug, Default)]
pub struct EntityStore {
    records: HashMap<EntityId, EntityRecord>,
    next_id: u64,
}

impl EntityStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id and register a fresh, alive record for it.
    pub(crate) fn allocate(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.records.insert(id, EntityRecord::new());
        id
    }

    /// The record for an entity, if it is still resolvable (alive or
    /// destroyed-pending with state components).
    pub(crate) fn record(&self, id: EntityId) -> Option<&EntityRecord> {
        self.records.get(&id)
    }

    /// Mutable access to an entity's record.
    pub(crate) fn record_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        self.records.get_mut(&id)
    }

    /// Physically free an entity, returning its record.
    pub(crate) fn free(&mut self, id: EntityId) -> Option<EntityRecord> {
        self.records.remove(&id)
    }

    /// Whether `id` refers to an alive (not logically destroyed) entity.
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.records.get(&id).is_some_and(|r| r.alive)
    }

    /// Whether `id` is still resolvable at all.
    pub fn contains(&self, id: EntityId) -> bool {
        self.records.contains_key(&id)
    }

    /// Ids of all currently alive entities.
    pub(crate) fn live_ids(&self) -> Vec<EntityId> {
        self.records
            .iter()
            .filter(|(_, r)| r.alive)
            .map(|(&id, _)| id)
            .collect()
    }

    /// Number of alive entities.
    pub fn alive_count(&self) -> usize {
        self.records.values().filter(|r| r.alive).count()
    }

    /// Number of resolvable entities, including destroyed-pending ones.
    pub fn resolvable_count(&self) -> usize {
        self.records.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
