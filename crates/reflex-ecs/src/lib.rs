//! A reactive entity-component-system runtime.
//!
//! Entities are plain ids, components are runtime-registered Rust types, and
//! systems run in a staged per-tick schedule. Queries are cached and
//! maintained incrementally; opened in reactive mode they expose per-tick
//! `added`/`removed`/`changed` lists so systems can respond to membership
//! transitions and mutations instead of polling.
//!
//! # Quick start
//!
//! ```
//! use std::ops::ControlFlow;
//! use reflex_ecs::prelude::*;
//!
//! #[derive(Debug)]
//! struct Position { x: f64, y: f64 }
//! #[derive(Debug)]
//! struct Velocity { dx: f64, dy: f64 }
//!
//! struct Movement { moving: QueryId }
//!
//! impl System for Movement {
//!     fn execute(&mut self, world: &mut World, ctx: &TickContext) {
//!         let delta = ctx.delta;
//!         let moving = self.moving;
//!         world.for_each(moving, |world, entity| {
//!             let (dx, dy) = {
//!                 let v = world.get_component::<Velocity>(entity).unwrap();
//!                 (v.dx, v.dy)
//!             };
//!             let p = world.get_component_mut::<Position>(entity).unwrap();
//!             p.x += dx * delta;
//!             p.y += dy * delta;
//!             ControlFlow::Continue(())
//!         });
//!     }
//! }
//!
//! # fn main() -> Result<(), EcsError> {
//! let mut world = World::new();
//! world.register_component::<Position>("position")?;
//! world.register_component::<Velocity>("velocity")?;
//!
//! let moving = world.query(&QuerySpec::new().with::<Position>().with::<Velocity>())?;
//! world.register_system(Movement { moving })?;
//!
//! let e = world.create_entity();
//! world.add_component(e, Position { x: 0.0, y: 0.0 })?;
//! world.add_component(e, Velocity { dx: 1.0, dy: 0.0 })?;
//!
//! world.execute(0.5, 0.5);
//! assert_eq!(world.get_component::<Position>(e).unwrap().x, 0.5);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]

pub mod component;
pub mod entity;
pub mod query;
pub mod removal;
pub mod system;
pub mod world;

use thiserror::Error;

use crate::entity::EntityId;

/// Errors surfaced by the ECS runtime.
#[derive(Debug, Error)]
pub enum EcsError {
    /// A component type could not be registered under the requested name.
    #[error("invalid component schema for '{name}': {reason}")]
    Schema { name: String, reason: String },

    /// A component type was used before being registered.
    #[error("component type '{name}' is not registered")]
    UnregisteredType { name: String },

    /// A query specification is structurally invalid.
    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    /// An operation referenced an entity that no longer resolves.
    #[error("entity {entity} has been destroyed")]
    DestroyedEntity { entity: EntityId },
}

/// Common imports for ECS users.
pub mod prelude {
    pub use crate::component::{ComponentKind, ComponentTypeId};
    pub use crate::entity::EntityId;
    pub use crate::query::{AnyGroup, QueryId, QuerySpec};
    pub use crate::system::{Stage, System, TickContext};
    pub use crate::world::World;
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration tests
// ---------------------------------------------------------------------------
