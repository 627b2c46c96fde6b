//! The world: entity lifecycle, component attachment, query access, and the
//! per-tick execution loop.
//!
//! All cross-module invariants live here. The stores themselves are dumb;
//! the world sequences every mutation so that query indices, pools, the
//! removal queue, and the state-component counts stay consistent:
//!
//! - Entity destruction is two-phase: `destroy_entity` flips the alive flag
//!   and evicts the entity from plain queries immediately, but the record is
//!   only physically freed at the end-of-tick flush, and even then only once
//!   its last system-state component has been removed.
//! - Component adds and removes re-evaluate exactly the queries that
//!   reference the touched type.
//! - The mutable component accessor raises `changed` events for reactive
//!   queries listening to that type.

use std::any::TypeId;
use std::ops::ControlFlow;

use crate::component::{ComponentKind, ComponentRegistry, ComponentTypeId};
use crate::entity::{EntityId, EntityStore};
use crate::query::{QueryEngine, QueryId, QuerySpec};
use crate::removal::RemovalQueue;
use crate::system::{PendingSystem, Scheduler, Stage, System, SystemEntry, TickContext};
use crate::EcsError;

/// Central ECS container and façade.
#[derive(Debug)]
pub struct World {
    registry: ComponentRegistry,
    store: EntityStore,
    queries: QueryEngine,
    removals: RemovalQueue,
    scheduler: Scheduler,
    /// Always-alive entity for world-global components (settings, clocks).
    singleton: EntityId,
    renderer_ready: bool,
    frame: u64,
    clock: f64,
}

impl World {
    /// Create an empty world. The singleton entity is allocated eagerly and
    /// exists for the world's whole lifetime.
    pub fn new() -> Self {
        let mut store = EntityStore::new();
        let singleton = store.allocate();
        Self {
            registry: ComponentRegistry::new(),
            store,
            queries: QueryEngine::new(),
            removals: RemovalQueue::new(),
            scheduler: Scheduler::new(),
            singleton,
            renderer_ready: false,
            frame: 0,
            clock: 0.0,
        }
    }

    // -----------------------------------------------------------------------
    // Component registration
    // -----------------------------------------------------------------------

    /// Register an ordinary pooled data component.
    pub fn register_component<T>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError>
    where
        T: Send + Sync + 'static,
    {
        self.registry.register::<T>(name, ComponentKind::Standard, true)
    }

    /// Register a zero-field tag component.
    pub fn register_tag<T>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError>
    where
        T: Send + Sync + 'static,
    {
        self.registry.register::<T>(name, ComponentKind::Tag, true)
    }

    /// Register a system-state component. State components track external
    /// resources, so recycled instances would be a hazard; pooling is off.
    pub fn register_state_component<T>(&mut self, name: &str) -> Result<ComponentTypeId, EcsError>
    where
        T: Send + Sync + 'static,
    {
        self.registry.register::<T>(name, ComponentKind::State, false)
    }

    /// Register with explicit kind and pooling flags.
    pub fn register_component_with<T>(
        &mut self,
        name: &str,
        kind: ComponentKind,
        pooled: bool,
    ) -> Result<ComponentTypeId, EcsError>
    where
        T: Send + Sync + 'static,
    {
        self.registry.register::<T>(name, kind, pooled)
    }

    // -----------------------------------------------------------------------
    // Entity lifecycle
    // -----------------------------------------------------------------------

    /// Create a new, empty entity.
    pub fn create_entity(&mut self) -> EntityId {
        self.store.allocate()
    }

    /// Logically destroy an entity and queue its physical removal for the
    /// end of the tick.
    ///
    /// The entity disappears from plain queries immediately; queries whose
    /// `all` set includes a system-state type keep seeing it until those
    /// components are removed. Destroying an already-destroyed (but still
    /// resolvable) entity is a no-op; the singleton is never destroyed.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DestroyedEntity`] if the entity has already been
    /// physically freed.
    pub fn destroy_entity(&mut self, entity: EntityId) -> Result<(), EcsError> {
        if entity == self.singleton {
            tracing::warn!("attempted to destroy the singleton entity, ignoring");
            return Ok(());
        }
        let Some(record) = self.store.record_mut(entity) else {
            return Err(EcsError::DestroyedEntity { entity });
        };
        if !record.alive {
            tracing::debug!(%entity, "entity already destroyed");
            return Ok(());
        }
        record.alive = false;
        self.queries.evict_non_state(entity, &mut self.store);
        self.removals.enqueue_entity(entity);
        Ok(())
    }

    /// Destroy an entity and run its flush right away instead of waiting for
    /// the end of the tick. State components still defer the physical free.
    pub fn destroy_entity_immediate(&mut self, entity: EntityId) -> Result<(), EcsError> {
        self.destroy_entity(entity)?;
        if entity != self.singleton {
            self.flush_entity(entity);
        }
        Ok(())
    }

    /// Whether `entity` is alive (not logically destroyed).
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.store.is_alive(entity)
    }

    /// The world's singleton entity.
    pub fn singleton(&self) -> EntityId {
        self.singleton
    }

    // -----------------------------------------------------------------------
    // Component attachment
    // -----------------------------------------------------------------------

    /// Attach a component to an entity.
    ///
    /// If the entity already holds a component of this type the value is
    /// overwritten in place with a warning; query membership is unaffected.
    /// For pooled types a recycled instance is reused when available.
    ///
    /// # Errors
    ///
    /// - [`EcsError::UnregisteredType`] if `T` was never registered.
    /// - [`EcsError::DestroyedEntity`] if the entity is not alive.
    pub fn add_component<T>(&mut self, entity: EntityId, value: T) -> Result<(), EcsError>
    where
        T: Send + Sync + 'static,
    {
        let type_id = self.lookup_id::<T>()?;
        let Some(record) = self.store.record_mut(entity) else {
            return Err(EcsError::DestroyedEntity { entity });
        };
        if !record.alive {
            return Err(EcsError::DestroyedEntity { entity });
        }

        if let Some(existing) = record.components.get_mut(&type_id) {
            tracing::warn!(%entity, ?type_id, "component already present, overwriting value");
            match existing.downcast_mut::<T>() {
                Some(slot) => *slot = value,
                None => *existing = Box::new(value),
            }
            return Ok(());
        }

        let boxed = match self.registry.pool_mut(type_id).and_then(|p| p.take()) {
            Some(mut recycled) => match recycled.downcast_mut::<T>() {
                Some(slot) => {
                    *slot = value;
                    recycled
                }
                None => Box::new(value),
            },
            None => Box::new(value),
        };
        record.components.insert(type_id, boxed);
        if self.registry.kind(type_id) == ComponentKind::State {
            record.state_component_count += 1;
        }
        self.queries.component_touched(entity, type_id, &mut self.store);
        Ok(())
    }

    /// Detach a component immediately. Returns whether the entity held one.
    ///
    /// Removing the last system-state component from a destroyed entity
    /// completes its destruction.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DestroyedEntity`] if the entity has been
    /// physically freed, [`EcsError::UnregisteredType`] if `T` was never
    /// registered.
    pub fn remove_component<T>(&mut self, entity: EntityId) -> Result<bool, EcsError>
    where
        T: Send + Sync + 'static,
    {
        let type_id = self.lookup_id::<T>()?;
        if !self.store.contains(entity) {
            return Err(EcsError::DestroyedEntity { entity });
        }
        Ok(self.detach_component(entity, type_id))
    }

    /// Detach a component and hand its value back to the caller instead of
    /// the pool.
    pub fn take_component<T>(&mut self, entity: EntityId) -> Result<Option<T>, EcsError>
    where
        T: Send + Sync + 'static,
    {
        let type_id = self.lookup_id::<T>()?;
        let Some(record) = self.store.record_mut(entity) else {
            return Err(EcsError::DestroyedEntity { entity });
        };
        let Some(instance) = record.components.remove(&type_id) else {
            return Ok(None);
        };
        if self.registry.kind(type_id) == ComponentKind::State {
            record.state_component_count = record.state_component_count.saturating_sub(1);
        }
        self.queries.component_touched(entity, type_id, &mut self.store);
        let value = instance.downcast::<T>().map(|b| *b).ok();
        self.maybe_free(entity);
        Ok(value)
    }

    /// Queue a component for detachment at the end of the tick.
    pub fn remove_component_deferred<T>(&mut self, entity: EntityId) -> Result<(), EcsError>
    where
        T: Send + Sync + 'static,
    {
        let type_id = self.lookup_id::<T>()?;
        if !self.store.contains(entity) {
            return Err(EcsError::DestroyedEntity { entity });
        }
        self.removals.enqueue_component(entity, type_id);
        Ok(())
    }

    /// Whether the entity currently holds a component of type `T`.
    pub fn has_component<T: 'static>(&self, entity: EntityId) -> bool {
        let Some(type_id) = self.registry.lookup::<T>() else {
            return false;
        };
        self.store.record(entity).is_some_and(|r| r.has(type_id))
    }

    /// Read access to an entity's component.
    pub fn get_component<T>(&self, entity: EntityId) -> Option<&T>
    where
        T: Send + Sync + 'static,
    {
        let type_id = self.registry.lookup::<T>()?;
        self.store
            .record(entity)?
            .components
            .get(&type_id)?
            .downcast_ref()
    }

    /// Mutable access to an entity's component.
    ///
    /// Obtaining the reference counts as a mutation: reactive queries that
    /// contain this entity and listen to `T` record a `changed` event.
    pub fn get_component_mut<T>(&mut self, entity: EntityId) -> Option<&mut T>
    where
        T: Send + Sync + 'static,
    {
        let type_id = self.registry.lookup::<T>()?;
        if !self.store.record(entity)?.has(type_id) {
            return None;
        }
        self.queries.component_changed(entity, type_id, &self.store);
        self.store
            .record_mut(entity)?
            .components
            .get_mut(&type_id)?
            .downcast_mut()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Build (or fetch from cache) the query described by `spec`.
    pub fn query(&mut self, spec: &QuerySpec) -> Result<QueryId, EcsError> {
        self.queries.get_or_create(spec, &self.registry, &mut self.store)
    }

    /// Snapshot of the query's current members.
    pub fn entities(&self, query: QueryId) -> Vec<EntityId> {
        self.queries.index(query).entities.clone()
    }

    /// Number of current members of a query.
    pub fn query_len(&self, query: QueryId) -> usize {
        self.queries.index(query).len()
    }

    /// Entities that entered the query since the start of the current tick.
    /// Always empty for non-reactive queries.
    pub fn added(&self, query: QueryId) -> &[EntityId] {
        &self.queries.index(query).added
    }

    /// Entities that left the query since the start of the current tick.
    pub fn removed(&self, query: QueryId) -> &[EntityId] {
        &self.queries.index(query).removed
    }

    /// Member entities whose listened components were mutably accessed since
    /// the start of the current tick.
    pub fn changed(&self, query: QueryId) -> &[EntityId] {
        &self.queries.index(query).changed
    }

    /// Visit the query's members over a snapshot, so the closure may freely
    /// mutate the world. Entities evicted mid-iteration are skipped; return
    /// [`ControlFlow::Break`] to stop early.
    pub fn for_each<F>(&mut self, query: QueryId, mut f: F)
    where
        F: FnMut(&mut World, EntityId) -> ControlFlow<()>,
    {
        let snapshot = self.queries.index(query).entities.clone();
        for entity in snapshot {
            if !self.queries.index(query).contains(entity) {
                continue;
            }
            if f(self, entity).is_break() {
                break;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Systems
    // -----------------------------------------------------------------------

    /// Register a system into the [`Stage::Default`] bucket.
    pub fn register_system<S: System>(&mut self, system: S) -> Result<(), EcsError> {
        self.register_system_in(Stage::Default, system)
    }

    /// Register a system into an explicit stage. `init` runs immediately; a
    /// system registered mid-tick first executes on the following tick.
    /// Re-registering an already-registered system type is a no-op warning.
    pub fn register_system_in<S: System>(
        &mut self,
        stage: Stage,
        system: S,
    ) -> Result<(), EcsError> {
        if self.scheduler.contains(TypeId::of::<S>()) {
            tracing::warn!(
                system = std::any::type_name::<S>(),
                "system already registered, ignoring"
            );
            return Ok(());
        }
        let mut entry = SystemEntry::new(system);
        entry.system.init(self)?;
        self.scheduler.push(stage, entry);
        Ok(())
    }

    /// Register a system that depends on the renderer. Until
    /// [`World::renderer_ready`] is called the system is held back entirely
    /// (no `init`, no scheduling); afterwards render systems register
    /// directly into [`Stage::Last`].
    pub fn register_render_system<S: System>(&mut self, system: S) -> Result<(), EcsError> {
        if self.renderer_ready {
            return self.register_system_in(Stage::Last, system);
        }
        if self.scheduler.contains(TypeId::of::<S>()) {
            tracing::warn!(
                system = std::any::type_name::<S>(),
                "render system already registered or pending, ignoring"
            );
            return Ok(());
        }
        self.scheduler.pending.push(PendingSystem {
            type_id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
            register: Box::new(move |world| world.register_system_in(Stage::Last, system)),
        });
        Ok(())
    }

    /// Mark the renderer as initialized and register all held-back render
    /// systems, in the order they were requested.
    pub fn renderer_ready(&mut self) -> Result<(), EcsError> {
        if self.renderer_ready {
            return Ok(());
        }
        self.renderer_ready = true;
        let pending = std::mem::take(&mut self.scheduler.pending);
        for held in pending {
            tracing::debug!(system = held.name, "registering held-back render system");
            (held.register)(self)?;
        }
        Ok(())
    }

    /// Whether the renderer has been marked ready.
    pub fn is_renderer_ready(&self) -> bool {
        self.renderer_ready
    }

    /// Borrow a registered system by its concrete type.
    pub fn get_system<S: System>(&self) -> Option<&S> {
        self.scheduler
            .find(TypeId::of::<S>())
            .and_then(|entry| entry.system.as_any().downcast_ref())
    }

    /// Unregister a system. Returns whether one was registered or pending.
    /// Mid-tick the removal takes effect when the tick finishes.
    pub fn remove_system<S: System>(&mut self) -> bool {
        self.scheduler.remove(TypeId::of::<S>())
    }

    // -----------------------------------------------------------------------
    // Tick execution
    // -----------------------------------------------------------------------

    /// Run one tick: execute every system in stage order then registration
    /// order, clear the reactive event lists, then flush the removal queue.
    ///
    /// Clearing sits between the systems and the flush, so `added`/`removed`
    /// events raised by the flush (and any raised by external code between
    /// ticks) are visible to the next tick's systems.
    ///
    /// `delta` is the time step in seconds and `time` the caller's absolute
    /// clock; both are passed through to systems untouched.
    pub fn execute(&mut self, delta: f64, time: f64) {
        self.clock = time;
        let ctx = TickContext {
            delta,
            time,
            frame: self.frame,
        };

        // The stage lists are taken out so systems can borrow the world
        // mutably; mid-tick (un)registrations are merged back afterwards.
        let mut stages = self.scheduler.take_stages();
        for stage in &mut stages {
            for entry in stage.iter_mut() {
                entry.system.execute(self, &ctx);
            }
        }
        self.scheduler.restore_stages(stages);

        self.queries.clear_events();
        self.flush_removals();
        self.frame += 1;
    }

    /// Run `ticks` consecutive ticks with a fixed time step, advancing the
    /// clock from where the last tick left it.
    pub fn run_ticks(&mut self, ticks: u32, delta: f64) {
        for _ in 0..ticks {
            let time = self.clock + delta;
            self.execute(delta, time);
        }
    }

    /// Number of completed ticks.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// The component registry (names, kinds, pool states).
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Number of alive entities, singleton included.
    pub fn entity_count(&self) -> usize {
        self.store.alive_count()
    }

    /// Number of cached queries.
    pub fn query_count(&self) -> usize {
        self.queries.len()
    }

    /// Number of registered systems, pending render systems excluded.
    pub fn system_count(&self) -> usize {
        self.scheduler.len()
    }

    /// Registered system names in execution order.
    pub fn system_names(&self) -> Vec<&'static str> {
        self.scheduler.names()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lookup_id<T: 'static>(&self) -> Result<ComponentTypeId, EcsError> {
        self.registry
            .lookup::<T>()
            .ok_or_else(|| EcsError::UnregisteredType {
                name: std::any::type_name::<T>().to_owned(),
            })
    }

    /// Detach one component: update the state count, recycle through the
    /// pool, re-evaluate affected queries, and complete a pending destroy if
    /// this was the last thing keeping the record around.
    fn detach_component(&mut self, entity: EntityId, type_id: ComponentTypeId) -> bool {
        let Some(record) = self.store.record_mut(entity) else {
            return false;
        };
        let Some(instance) = record.components.remove(&type_id) else {
            return false;
        };
        if self.registry.kind(type_id) == ComponentKind::State {
            record.state_component_count = record.state_component_count.saturating_sub(1);
        }
        if let Some(pool) = self.registry.pool_mut(type_id) {
            pool.release(instance);
        }
        self.queries.component_touched(entity, type_id, &mut self.store);
        self.maybe_free(entity);
        true
    }

    /// End-of-tick processing for one queued entity: detach everything except
    /// state components, then free the record if nothing holds it back.
    fn flush_entity(&mut self, entity: EntityId) {
        let Some(record) = self.store.record(entity) else {
            return;
        };
        let detach: Vec<ComponentTypeId> = record
            .components
            .keys()
            .copied()
            .filter(|t| self.registry.kind(*t) != ComponentKind::State)
            .collect();
        for type_id in detach {
            self.detach_component(entity, type_id);
        }
        self.maybe_free(entity);
    }

    /// Physically free a destroyed entity once its record is fully drained.
    fn maybe_free(&mut self, entity: EntityId) {
        let ready = self.store.record(entity).is_some_and(|r| {
            !r.alive && r.state_component_count == 0 && r.components.is_empty()
        });
        if ready {
            self.queries.evict_all(entity, &mut self.store);
            self.store.free(entity);
        }
    }

    fn flush_removals(&mut self) {
        let (components, entities) = self.removals.drain();
        for (entity, type_id) in components {
            self.detach_component(entity, type_id);
        }
        for entity in entities {
            self.flush_entity(entity);
        }
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Pos {
        x: f32,
        y: f32,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Vel {
        dx: f32,
        dy: f32,
    }

    struct Frozen;

    #[derive(Debug, PartialEq)]
    struct GpuHandle(u32);

    fn world_with_types() -> World {
        let mut world = World::new();
        world.register_component::<Pos>("position").unwrap();
        world.register_component::<Vel>("velocity").unwrap();
        world.register_tag::<Frozen>("frozen").unwrap();
        world.register_state_component::<GpuHandle>("gpu_handle").unwrap();
        world
    }

    #[test]
    fn add_get_and_mutate() {
        let mut world = world_with_types();
        let e = world.create_entity();
        world.add_component(e, Pos { x: 1.0, y: 2.0 }).unwrap();

        assert!(world.has_component::<Pos>(e));
        assert_eq!(world.get_component::<Pos>(e), Some(&Pos { x: 1.0, y: 2.0 }));

        world.get_component_mut::<Pos>(e).unwrap().x = 5.0;
        assert_eq!(world.get_component::<Pos>(e).unwrap().x, 5.0);
    }

    #[test]
    fn add_to_unregistered_or_dead_entity_errors() {
        let mut world = world_with_types();
        let e = world.create_entity();

        struct Unknown;
        assert!(matches!(
            world.add_component(e, Unknown).unwrap_err(),
            EcsError::UnregisteredType { .. }
        ));

        world.destroy_entity(e).unwrap();
        assert!(matches!(
            world.add_component(e, Pos { x: 0.0, y: 0.0 }).unwrap_err(),
            EcsError::DestroyedEntity { .. }
        ));
    }

    #[test]
    fn overwrite_keeps_single_instance() {
        let mut world = world_with_types();
        let e = world.create_entity();
        world.add_component(e, Pos { x: 1.0, y: 1.0 }).unwrap();
        world.add_component(e, Pos { x: 9.0, y: 9.0 }).unwrap();
        assert_eq!(world.get_component::<Pos>(e), Some(&Pos { x: 9.0, y: 9.0 }));
    }

    #[test]
    fn singleton_survives_destroy_attempts() {
        let mut world = world_with_types();
        let s = world.singleton();
        world.destroy_entity(s).unwrap();
        world.destroy_entity_immediate(s).unwrap();
        assert!(world.is_alive(s));
    }

    #[test]
    fn deferred_destroy_is_two_phase() {
        let mut world = world_with_types();
        let q = world.query(&QuerySpec::new().with::<Pos>()).unwrap();
        let e = world.create_entity();
        world.add_component(e, Pos { x: 0.0, y: 0.0 }).unwrap();
        assert_eq!(world.entities(q), vec![e]);

        world.destroy_entity(e).unwrap();
        // Gone from queries at once, record still resolvable until the flush.
        assert!(world.entities(q).is_empty());
        assert!(!world.is_alive(e));
        assert!(world.get_component::<Pos>(e).is_some());

        world.execute(0.016, 0.016);
        assert!(world.get_component::<Pos>(e).is_none());
        assert!(matches!(
            world.destroy_entity(e).unwrap_err(),
            EcsError::DestroyedEntity { .. }
        ));
    }

    #[test]
    fn double_destroy_before_flush_is_noop() {
        let mut world = world_with_types();
        let e = world.create_entity();
        world.destroy_entity(e).unwrap();
        world.destroy_entity(e).unwrap();
        world.execute(0.016, 0.016);
    }

    #[test]
    fn immediate_destroy_frees_now() {
        let mut world = world_with_types();
        let e = world.create_entity();
        world.add_component(e, Pos { x: 0.0, y: 0.0 }).unwrap();
        world.destroy_entity_immediate(e).unwrap();
        assert!(!world.is_alive(e));
        assert!(world.get_component::<Pos>(e).is_none());
    }

    #[test]
    fn state_component_defers_physical_free() {
        let mut world = world_with_types();
        let state_q = world.query(&QuerySpec::new().with::<GpuHandle>()).unwrap();
        let plain_q = world.query(&QuerySpec::new().with::<Pos>()).unwrap();

        let e = world.create_entity();
        world.add_component(e, Pos { x: 0.0, y: 0.0 }).unwrap();
        world.add_component(e, GpuHandle(7)).unwrap();

        world.destroy_entity(e).unwrap();
        world.execute(0.016, 0.016);

        // Plain data is gone, but the state component holds the record open
        // and state queries still see the entity.
        assert!(world.get_component::<Pos>(e).is_none());
        assert_eq!(world.get_component::<GpuHandle>(e), Some(&GpuHandle(7)));
        assert!(world.entities(plain_q).is_empty());
        assert_eq!(world.entities(state_q), vec![e]);

        // A cleanup system reclaims the handle; removal completes the destroy.
        let handle = world.take_component::<GpuHandle>(e).unwrap();
        assert_eq!(handle, Some(GpuHandle(7)));
        assert!(world.entities(state_q).is_empty());
        assert!(matches!(
            world.remove_component::<GpuHandle>(e).unwrap_err(),
            EcsError::DestroyedEntity { .. }
        ));
    }

    #[test]
    fn deferred_component_removal_applies_at_flush() {
        let mut world = world_with_types();
        let e = world.create_entity();
        world.add_component(e, Vel { dx: 1.0, dy: 0.0 }).unwrap();
        world.remove_component_deferred::<Vel>(e).unwrap();

        assert!(world.has_component::<Vel>(e));
        world.execute(0.016, 0.016);
        assert!(!world.has_component::<Vel>(e));
        assert!(world.is_alive(e), "component removal must not destroy");
    }

    #[test]
    fn pooled_instances_are_recycled() {
        let mut world = world_with_types();
        let pos_id = world.registry().lookup::<Pos>().unwrap();

        let e = world.create_entity();
        world.add_component(e, Pos { x: 1.0, y: 1.0 }).unwrap();
        world.remove_component::<Pos>(e).unwrap();
        assert_eq!(world.registry().pool(pos_id).unwrap().len(), 1);

        world.add_component(e, Pos { x: 2.0, y: 2.0 }).unwrap();
        assert!(world.registry().pool(pos_id).unwrap().is_empty());
        assert_eq!(world.get_component::<Pos>(e), Some(&Pos { x: 2.0, y: 2.0 }));
    }

    #[test]
    fn for_each_skips_mid_iteration_evictions() {
        let mut world = world_with_types();
        let q = world.query(&QuerySpec::new().with::<Pos>()).unwrap();
        for i in 0..4 {
            let e = world.create_entity();
            world.add_component(e, Pos { x: i as f32, y: 0.0 }).unwrap();
        }

        let mut visited = 0;
        let members = world.entities(q);
        let doomed = members[2];
        world.for_each(q, |world, entity| {
            if visited == 0 {
                world.destroy_entity_immediate(doomed).unwrap();
            }
            assert_ne!(entity, doomed);
            visited += 1;
            ControlFlow::Continue(())
        });
        assert_eq!(visited, 3);
    }

    #[test]
    fn frame_and_clock_advance() {
        let mut world = world_with_types();
        assert_eq!(world.frame(), 0);
        world.run_ticks(3, 0.5);
        assert_eq!(world.frame(), 3);
        assert_eq!(world.clock, 1.5);
    }
}
