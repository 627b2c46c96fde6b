//! Component type registration and metadata.
//!
//! Every component type used in the ECS must be registered at runtime in a
//! [`ComponentRegistry`]. Registration produces a [`ComponentTypeId`] that is
//! used as the key for entity storage and query matching everywhere -- the
//! runtime never switches on Rust type names.
//!
//! A type is registered with a [`ComponentKind`] capability flag instead of a
//! subtype hierarchy: `Tag` marks a zero-field, identity-only component, and
//! `State` marks a system-state component whose removal must be explicit and
//! which keeps its entity resolvable after a logical destroy.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::EcsError;

// ---------------------------------------------------------------------------
// ComponentTypeId
// ---------------------------------------------------------------------------

/// Opaque, lightweight identifier for a registered component type.
///
/// Ids are assigned sequentially at registration time and are immutable for
/// the lifetime of the registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// ComponentKind
// ---------------------------------------------------------------------------

/// Capability flags for a registered component type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    /// An ordinary data component.
    Standard,
    /// A zero-field marker used purely for query matching.
    Tag,
    /// A system-state component. Its removal must be explicit, and an entity
    /// that still holds one survives a logical destroy until the component is
    /// removed (used to sequence external-resource teardown).
    State,
}

// ---------------------------------------------------------------------------
// ComponentInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered component type.
#[derive(Debug, Clone)]
pub struct ComponentInfo {
    /// Unique ID assigned at registration time.
    pub id: ComponentTypeId,
    /// Human-readable name (supplied by the caller).
    pub name: String,
    /// Capability flags.
    pub kind: ComponentKind,
    /// Whether removed instances are recycled through the type's pool.
    pub pooled: bool,
    /// Rust `TypeId` for runtime type checking.
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// ComponentPool
// ---------------------------------------------------------------------------

/// Type-erased boxed component instance.
pub(crate) type BoxedComponent = Box<dyn Any + Send + Sync>;

/// Recycle list for component instances of a single type.
///
/// Pooling is an optimization, not a correctness requirement: a type
/// registered with pooling disabled behaves identically, every `add` just
/// allocates a fresh box.
#[derive(Default)]
pub struct ComponentPool {
    free: Vec<BoxedComponent>,
}

impl ComponentPool {
    /// Return an instance to the pool for later reuse.
    pub(crate) fn release(&mut self, instance: BoxedComponent) {
        self.free.push(instance);
    }

    /// Take a recycled instance, if one is available.
    pub(crate) fn take(&mut self) -> Option<BoxedComponent> {
        self.free.pop()
    }

    /// Number of instances currently sitting in the pool.
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Whether the pool holds no recycled instances.
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }
}

impl fmt::Debug for ComponentPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentPool")
            .field("free", &self.free.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ComponentRegistry
// ---------------------------------------------------------------------------

/// Registry mapping Rust types to [`ComponentTypeId`]s and their metadata.
///
/// Re-registering the same Rust type is a no-op warning that returns the
/// existing id. Registering a *different* type under an already-used name is
/// a hard [`EcsError::Schema`].
#[derive(Debug)]
pub struct ComponentRegistry {
    /// TypeId -> ComponentTypeId for dedup.
    by_type: HashMap<TypeId, ComponentTypeId>,
    /// Name -> ComponentTypeId for lookup by string name.
    by_name: HashMap<String, ComponentTypeId>,
    /// Indexed by ComponentTypeId.0.
    infos: Vec<ComponentInfo>,
    /// Indexed by ComponentTypeId.0; `None` when pooling is disabled.
    pools: Vec<Option<ComponentPool>>,
}

impl ComponentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            infos: Vec::new(),
            pools: Vec::new(),
        }
    }

    /// Register a component type under the given `name`.
    ///
    /// Field validity is the type system's job; the one violation left to
    /// catch at runtime is a name collision.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::Schema`] if `name` is already registered for a
    /// different type.
    pub fn register<T>(
        &mut self,
        name: &str,
        kind: ComponentKind,
        pooled: bool,
    ) -> Result<ComponentTypeId, EcsError>
    where
        T: Send + Sync + 'static,
    {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            tracing::warn!(
                name,
                existing = %self.infos[existing.0 as usize].name,
                "component type already registered, ignoring re-registration"
            );
            return Ok(existing);
        }

        if self.by_name.contains_key(name) {
            return Err(EcsError::Schema {
                name: name.to_owned(),
                reason: "name is already registered for a different component type".to_owned(),
            });
        }

        let id = ComponentTypeId(self.infos.len() as u32);
        self.infos.push(ComponentInfo {
            id,
            name: name.to_owned(),
            kind,
            pooled,
            type_id: rust_type_id,
        });
        self.pools.push(pooled.then(ComponentPool::default));
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name.to_owned(), id);
        Ok(id)
    }

    /// Look up a component type by its Rust `TypeId`.
    pub fn lookup<T: 'static>(&self) -> Option<ComponentTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a component type by its raw Rust `TypeId`.
    pub(crate) fn lookup_raw(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        self.by_type.get(&type_id).copied()
    }

    /// Look up a component type by its registered string name.
    pub fn lookup_by_name(&self, name: &str) -> Option<ComponentTypeId> {
        self.by_name.get(name).copied()
    }

    /// Get the [`ComponentInfo`] for a registered component type ID.
    pub fn info(&self, id: ComponentTypeId) -> Option<&ComponentInfo> {
        self.infos.get(id.0 as usize)
    }

    /// The [`ComponentKind`] of a registered type.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this registry.
    pub fn kind(&self, id: ComponentTypeId) -> ComponentKind {
        self.infos[id.0 as usize].kind
    }

    /// The pool for a registered type, or `None` if pooling is disabled.
    pub fn pool(&self, id: ComponentTypeId) -> Option<&ComponentPool> {
        self.pools.get(id.0 as usize).and_then(|p| p.as_ref())
    }

    /// Mutable access to the pool for a registered type.
    pub(crate) fn pool_mut(&mut self, id: ComponentTypeId) -> Option<&mut ComponentPool> {
        self.pools.get_mut(id.0 as usize).and_then(|p| p.as_mut())
    }

    /// Total number of registered component types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether any component types have been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    /// Returns the names of all registered component types, sorted.
    pub fn registered_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
