//! Query construction, matching, and incremental index maintenance.
//!
//! A query is an immutable specification over registered component types:
//! `all` (the entity must have every type), `none` (it must have no type from
//! the set), and `any` groups (for every group, at least one member must be
//! present). Queries are canonicalized and cached, so two systems requesting
//! the same shape share one live index.
//!
//! Indices are maintained incrementally: a reverse map from component type to
//! the queries referencing it means a component mutation re-evaluates only
//! the queries that could be affected, never the whole set. Queries opened in
//! reactive mode additionally record `added`/`removed` membership transitions
//! and, for an explicit set of listened types, `changed` events raised by the
//! mutable component accessor.

use std::any::TypeId;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::component::{ComponentKind, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityId, EntityRecord, EntityStore};
use crate::EcsError;

// ---------------------------------------------------------------------------
// QueryId
// ---------------------------------------------------------------------------

/// Handle to a cached query owned by the [`World`](crate::world::World).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) u32);

impl fmt::Debug for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QueryId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// QuerySpec
// ---------------------------------------------------------------------------

/// An unresolved reference to a component type, carried by name for error
/// reporting until the spec is resolved against the registry.
#[derive(Clone, Copy, Debug)]
struct TypeRef {
    type_id: TypeId,
    name: &'static str,
}

impl TypeRef {
    fn of<T: 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }
}

/// One "any-of" group: the entity must hold at least one of the listed types.
#[derive(Clone, Debug, Default)]
pub struct AnyGroup {
    types: Vec<TypeRef>,
}

impl AnyGroup {
    /// Create an empty group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component type to the group.
    pub fn with<T: 'static>(mut self) -> Self {
        self.types.push(TypeRef::of::<T>());
        self
    }
}

/// Builder for a query specification.
///
/// Component types are referenced by Rust type and resolved against the
/// registry when the query is built via [`World::query`](crate::world::World::query).
#[derive(Clone, Debug, Default)]
pub struct QuerySpec {
    all: Vec<TypeRef>,
    none: Vec<TypeRef>,
    any: Vec<AnyGroup>,
    reactive: bool,
    listen: Vec<TypeRef>,
}

impl QuerySpec {
    /// Create an empty specification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require the entity to hold a component of type `T`.
    pub fn with<T: 'static>(mut self) -> Self {
        self.all.push(TypeRef::of::<T>());
        self
    }

    /// Exclude entities holding a component of type `T`.
    pub fn without<T: 'static>(mut self) -> Self {
        self.none.push(TypeRef::of::<T>());
        self
    }

    /// Require the entity to hold at least one type from `group`.
    pub fn any_of(mut self, group: AnyGroup) -> Self {
        self.any.push(group);
        self
    }

    /// Open the query in reactive mode: `added` and `removed` membership
    /// transitions are recorded per tick.
    pub fn reactive(mut self) -> Self {
        self.reactive = true;
        self
    }

    /// Additionally record `changed` events for mutations of `T` made through
    /// the mutable accessor. Implies reactive mode. `T` must appear in the
    /// query's `all` or any-of sets.
    pub fn listen<T: 'static>(mut self) -> Self {
        self.reactive = true;
        self.listen.push(TypeRef::of::<T>());
        self
    }
}

// ---------------------------------------------------------------------------
// QueryKey
// ---------------------------------------------------------------------------

/// Canonical cache key: sorted, deduplicated type ids per operator.
///
/// Reactive mode and listened types are deliberately not part of the key --
/// a cached query becomes reactive if any requester asks for it, and listen
/// sets are unioned.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
struct QueryKey {
    all: Vec<ComponentTypeId>,
    none: Vec<ComponentTypeId>,
    any: Vec<Vec<ComponentTypeId>>,
}

// ---------------------------------------------------------------------------
// QueryIndex
// ---------------------------------------------------------------------------

/// The live, incrementally-maintained state of one cached query.
pub(crate) struct QueryIndex {
    pub all: Vec<ComponentTypeId>,
    pub none: Vec<ComponentTypeId>,
    pub any: Vec<Vec<ComponentTypeId>>,
    /// Whether `all` references at least one system-state component type.
    /// Entities logically destroyed stay visible to such queries until their
    /// state components are removed.
    pub has_state_all: bool,
    /// Current members. Iteration order is insertion order, not guaranteed
    /// stable across removals.
    pub entities: Vec<EntityId>,
    positions: HashMap<EntityId, usize>,
    pub reactive: bool,
    pub listen: HashSet<ComponentTypeId>,
    pub added: Vec<EntityId>,
    pub removed: Vec<EntityId>,
    pub changed: Vec<EntityId>,
}

impl QueryIndex {
    fn new(key: &QueryKey, has_state_all: bool) -> Self {
        Self {
            all: key.all.clone(),
            none: key.none.clone(),
            any: key.any.clone(),
            has_state_all,
            entities: Vec::new(),
            positions: HashMap::new(),
            reactive: false,
            listen: HashSet::new(),
            added: Vec::new(),
            removed: Vec::new(),
            changed: Vec::new(),
        }
    }

    /// Evaluate the matching rule against an entity's current components.
    fn matches(&self, record: &EntityRecord) -> bool {
        self.all.iter().all(|t| record.has(*t))
            && !self.none.iter().any(|t| record.has(*t))
            && self.any.iter().all(|g| g.iter().any(|t| record.has(*t)))
    }

    /// Whether `entity` is currently a member.
    pub fn contains(&self, entity: EntityId) -> bool {
        self.positions.contains_key(&entity)
    }

    fn insert(&mut self, entity: EntityId) {
        debug_assert!(!self.contains(entity));
        self.positions.insert(entity, self.entities.len());
        self.entities.push(entity);
        if self.reactive && !self.added.contains(&entity) {
            self.added.push(entity);
        }
    }

    fn evict(&mut self, entity: EntityId) {
        let Some(pos) = self.positions.remove(&entity) else {
            return;
        };
        self.entities.swap_remove(pos);
        if let Some(&moved) = self.entities.get(pos) {
            self.positions.insert(moved, pos);
        }
        if self.reactive && !self.removed.contains(&entity) {
            self.removed.push(entity);
        }
    }

    fn note_changed(&mut self, entity: EntityId) {
        if !self.changed.contains(&entity) {
            self.changed.push(entity);
        }
    }

    fn clear_events(&mut self) {
        self.added.clear();
        self.removed.clear();
        self.changed.clear();
    }

    /// Number of current members.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl fmt::Debug for QueryIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryIndex")
            .field("all", &self.all)
            .field("none", &self.none)
            .field("any", &self.any)
            .field("entities", &self.entities.len())
            .field("reactive", &self.reactive)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// QueryEngine
// ---------------------------------------------------------------------------

/// Owns all cached query indices and keeps them consistent with the entity
/// store as components are added, removed, and mutated.
#[derive(Debug, Default)]
pub struct QueryEngine {
    queries: Vec<QueryIndex>,
    by_key: HashMap<QueryKey, QueryId>,
    /// Reverse index: which queries reference a component type in any
    /// operator position. Only these are re-evaluated on a mutation of that
    /// type.
    by_type: HashMap<ComponentTypeId, Vec<QueryId>>,
}

impl QueryEngine {
    /// Create an empty engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a spec against the registry, returning the cached query for
    /// its canonical key or building a new index over all alive entities.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredType`] if the spec references a component
    ///   type that was never registered.
    /// - [`EcsError::InvalidQuery`] if a type appears in both `all` and
    ///   `none`, if an any-of group is empty, if the spec has no positive
    ///   (`all`/`any`) requirement at all, or if a listened type is not part
    ///   of those positive sets.
    pub(crate) fn get_or_create(
        &mut self,
        spec: &QuerySpec,
        registry: &ComponentRegistry,
        store: &mut EntityStore,
    ) -> Result<QueryId, EcsError> {
        let all = resolve_sorted(&spec.all, registry)?;
        let none = resolve_sorted(&spec.none, registry)?;
        let mut any: Vec<Vec<ComponentTypeId>> = Vec::with_capacity(spec.any.len());
        for group in &spec.any {
            let resolved = resolve_sorted(&group.types, registry)?;
            if resolved.is_empty() {
                return Err(EcsError::InvalidQuery {
                    reason: "any-of group is empty".to_owned(),
                });
            }
            any.push(resolved);
        }
        any.sort();
        any.dedup();

        if let Some(&overlap) = all.iter().find(|t| none.contains(t)) {
            let name = registry
                .info(overlap)
                .map(|i| i.name.clone())
                .unwrap_or_default();
            return Err(EcsError::InvalidQuery {
                reason: format!("component '{name}' appears in both `all` and `none`"),
            });
        }
        if all.is_empty() && any.is_empty() {
            return Err(EcsError::InvalidQuery {
                reason: "query must require at least one component type".to_owned(),
            });
        }

        let listen = resolve_sorted(&spec.listen, registry)?;
        let key = QueryKey { all, none, any };

        // Changed events are only raised for types the query actually
        // indexes; a listen outside the shape would silently never fire.
        for type_id in &listen {
            let in_shape = key.all.contains(type_id)
                || key.any.iter().any(|g| g.contains(type_id));
            if !in_shape {
                let name = registry
                    .info(*type_id)
                    .map(|i| i.name.clone())
                    .unwrap_or_default();
                return Err(EcsError::InvalidQuery {
                    reason: format!(
                        "listened component '{name}' is not part of the query's `all` or any-of sets"
                    ),
                });
            }
        }

        if let Some(&id) = self.by_key.get(&key) {
            let index = &mut self.queries[id.0 as usize];
            index.reactive |= spec.reactive;
            index.listen.extend(listen);
            return Ok(id);
        }

        let has_state_all = key
            .all
            .iter()
            .any(|t| registry.kind(*t) == ComponentKind::State);
        let mut index = QueryIndex::new(&key, has_state_all);
        index.reactive = spec.reactive;
        index.listen.extend(listen);

        let id = QueryId(self.queries.len() as u32);

        // One-time O(alive entities) scan; all later maintenance is driven
        // by per-type mutation events.
        for entity in store.live_ids() {
            if let Some(record) = store.record_mut(entity) {
                if index.matches(record) {
                    index.insert(entity);
                    record.queries.insert(id);
                }
            }
        }

        let mut referenced: Vec<ComponentTypeId> = key.all.clone();
        referenced.extend(&key.none);
        for group in &key.any {
            referenced.extend(group);
        }
        referenced.sort();
        referenced.dedup();
        for type_id in referenced {
            self.by_type.entry(type_id).or_default().push(id);
        }

        self.by_key.insert(key, id);
        self.queries.push(index);
        Ok(id)
    }

    /// Re-evaluate membership for every query referencing `type_id`, after a
    /// component of that type was attached to or detached from `entity`.
    ///
    /// Logically destroyed entities are never newly inserted into a query
    /// (removing one of their `none`-listed types must not resurrect them),
    /// but existing memberships are still evicted when they stop matching.
    pub(crate) fn component_touched(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        store: &mut EntityStore,
    ) {
        let Some(ids) = self.by_type.get(&type_id).cloned() else {
            return;
        };
        let Some(record) = store.record_mut(entity) else {
            return;
        };
        for id in ids {
            let index = &mut self.queries[id.0 as usize];
            let matched = index.matches(record);
            let member = record.queries.contains(&id);
            if matched && !member && record.alive {
                index.insert(entity);
                record.queries.insert(id);
            } else if !matched && member {
                index.evict(entity);
                record.queries.remove(&id);
            }
        }
    }

    /// Record a `changed` event for every reactive query that contains
    /// `entity` and listens to `type_id`.
    pub(crate) fn component_changed(
        &mut self,
        entity: EntityId,
        type_id: ComponentTypeId,
        store: &EntityStore,
    ) {
        let Some(record) = store.record(entity) else {
            return;
        };
        let Some(ids) = self.by_type.get(&type_id).cloned() else {
            return;
        };
        for id in ids {
            if !record.queries.contains(&id) {
                continue;
            }
            let index = &mut self.queries[id.0 as usize];
            if index.reactive && index.listen.contains(&type_id) {
                index.note_changed(entity);
            }
        }
    }

    /// Evict `entity` from every query whose `all` set references no
    /// system-state type. Called on logical destroy so iterating systems stop
    /// seeing the entity this tick, while state-cleanup systems still can.
    pub(crate) fn evict_non_state(&mut self, entity: EntityId, store: &mut EntityStore) {
        let Some(record) = store.record_mut(entity) else {
            return;
        };
        let ids: Vec<QueryId> = record.queries.iter().copied().collect();
        for id in ids {
            let index = &mut self.queries[id.0 as usize];
            if !index.has_state_all {
                index.evict(entity);
                record.queries.remove(&id);
            }
        }
    }

    /// Evict `entity` from every remaining query. Called on physical free.
    pub(crate) fn evict_all(&mut self, entity: EntityId, store: &mut EntityStore) {
        let Some(record) = store.record_mut(entity) else {
            return;
        };
        for id in record.queries.drain() {
            self.queries[id.0 as usize].evict(entity);
        }
    }

    /// Clear all reactive event lists. Called once per tick, after the
    /// systems have run and before the removal flush, so flush-raised events
    /// carry over to the next tick.
    pub(crate) fn clear_events(&mut self) {
        for index in &mut self.queries {
            index.clear_events();
        }
    }

    /// The index behind a query handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this engine.
    pub(crate) fn index(&self, id: QueryId) -> &QueryIndex {
        &self.queries[id.0 as usize]
    }

    /// Number of cached queries.
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    /// Whether no queries have been built.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

fn resolve_sorted(
    refs: &[TypeRef],
    registry: &ComponentRegistry,
) -> Result<Vec<ComponentTypeId>, EcsError> {
    let mut ids = Vec::with_capacity(refs.len());
    for r in refs {
        let id = registry
            .lookup_raw(r.type_id)
            .ok_or_else(|| EcsError::UnregisteredType {
                name: r.name.to_owned(),
            })?;
        ids.push(id);
    }
    ids.sort();
    ids.dedup();
    Ok(ids)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
