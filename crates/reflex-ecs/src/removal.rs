//! Deferred removal queue.
//!
//! Systems request entity and component removals during a tick; the queue
//! batches them and the [`World`](crate::world::World) drains it exactly once
//! after all systems have executed. Requests are kept in FIFO order and are
//! idempotent -- enqueueing the same entity or component twice is harmless.

use crate::component::ComponentTypeId;
use crate::entity::EntityId;

/// Batches removal requests for the end-of-tick flush.
#[derive(Debug, Default)]
pub struct RemovalQueue {
    entities: Vec<EntityId>,
    components: Vec<(EntityId, ComponentTypeId)>,
}

impl RemovalQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an entity for physical destruction at the end of the tick.
    pub(crate) fn enqueue_entity(&mut self, entity: EntityId) {
        if self.entities.contains(&entity) {
            tracing::debug!(%entity, "entity already queued for removal");
            return;
        }
        self.entities.push(entity);
    }

    /// Queue a single component for detachment at the end of the tick.
    pub(crate) fn enqueue_component(&mut self, entity: EntityId, type_id: ComponentTypeId) {
        if self.components.contains(&(entity, type_id)) {
            tracing::debug!(%entity, ?type_id, "component already queued for removal");
            return;
        }
        self.components.push((entity, type_id));
    }

    /// Take all queued requests, leaving the queue empty.
    ///
    /// Returns `(component removals, entity removals)` in enqueue order.
    pub(crate) fn drain(&mut self) -> (Vec<(EntityId, ComponentTypeId)>, Vec<EntityId>) {
        (
            std::mem::take(&mut self.components),
            std::mem::take(&mut self.entities),
        )
    }

    /// Number of queued entity removals.
    pub fn queued_entities(&self) -> usize {
        self.entities.len()
    }

    /// Number of queued component removals.
    pub fn queued_components(&self) -> usize {
        self.components.len()
    }

    /// Whether nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.components.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
