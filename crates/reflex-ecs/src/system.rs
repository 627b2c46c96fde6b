//! System trait, execution stages, and the scheduler.
//!
//! Systems are registered once per Rust type, grouped into coarse [`Stage`]s,
//! and executed every tick in stage order then registration order. `init`
//! runs exactly once at registration time (systems typically build their
//! queries there); `execute` receives the [`World`](crate::world::World) and
//! the per-tick [`TickContext`].
//!
//! A panic inside a system propagates and aborts the remainder of the tick.
//! There is no per-system isolation -- in a game loop a broken system should
//! fail loudly rather than silently corrupt state.

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;

use crate::world::World;
use crate::EcsError;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Coarse ordering bucket controlling when a system runs within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Runs before everything else (input sampling, time bookkeeping).
    First,
    /// The default bucket for simulation systems.
    Default,
    /// Runs after the default bucket (reactions to this frame's simulation).
    PostFrameLogic,
    /// Runs last (rendering, cleanup).
    Last,
}

impl Stage {
    /// All stages in declared execution order.
    pub const ORDER: [Stage; 4] = [
        Stage::First,
        Stage::Default,
        Stage::PostFrameLogic,
        Stage::Last,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Stage::First => 0,
            Stage::Default => 1,
            Stage::PostFrameLogic => 2,
            Stage::Last => 3,
        }
    }
}

// ---------------------------------------------------------------------------
// TickContext
// ---------------------------------------------------------------------------

/// Per-tick timing passed to every system's `execute`.
#[derive(Debug, Clone, Copy)]
pub struct TickContext {
    /// Seconds since the previous tick.
    pub delta: f64,
    /// Absolute time in seconds, as supplied by the external clock.
    pub time: f64,
    /// Number of completed ticks before this one.
    pub frame: u64,
}

// ---------------------------------------------------------------------------
// System trait
// ---------------------------------------------------------------------------

/// A unit of per-tick behavior.
///
/// Implementors usually build their queries in `init` and keep the returned
/// [`QueryId`](crate::query::QueryId)s as fields.
pub trait System: 'static {
    /// Called exactly once, at registration time.
    fn init(&mut self, _world: &mut World) -> Result<(), EcsError> {
        Ok(())
    }

    /// Called every tick, in stage order then registration order.
    fn execute(&mut self, world: &mut World, ctx: &TickContext);
}

/// Object-safe wrapper adding downcast support to boxed systems, so the
/// world can hand back concrete `&S` from `get_system::<S>()`.
pub(crate) trait AnySystem: System {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: System> AnySystem for S {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// One registered system in a stage list.
pub(crate) struct SystemEntry {
    pub type_id: TypeId,
    pub name: &'static str,
    pub system: Box<dyn AnySystem>,
}

impl SystemEntry {
    pub(crate) fn new<S: System>(system: S) -> Self {
        Self {
            type_id: TypeId::of::<S>(),
            name: std::any::type_name::<S>(),
            system: Box::new(system),
        }
    }
}

impl fmt::Debug for SystemEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemEntry").field("name", &self.name).finish()
    }
}

/// A system held back until the async renderer dependency resolves.
/// The closure performs the real (type-aware) registration.
pub(crate) struct PendingSystem {
    pub type_id: TypeId,
    pub name: &'static str,
    pub register: Box<dyn FnOnce(&mut World) -> Result<(), EcsError>>,
}

impl fmt::Debug for PendingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingSystem").field("name", &self.name).finish()
    }
}

/// Owns the per-stage system lists and the pending render systems.
///
/// During `World::execute` the stage lists are temporarily taken out of the
/// scheduler so systems can borrow the world mutably; registrations and
/// unregistrations made by running systems are merged back in afterwards.
#[derive(Debug, Default)]
pub(crate) struct Scheduler {
    pub stages: [Vec<SystemEntry>; 4],
    pub pending: Vec<PendingSystem>,
    /// Type ids of all registered systems. Stays accurate while the stage
    /// lists are taken out for a running tick, so the duplicate guard and
    /// `remove` answer correctly mid-tick.
    registered: HashSet<TypeId>,
    retired: Vec<TypeId>,
    running: bool,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a system of this type is registered or pending.
    pub fn contains(&self, type_id: TypeId) -> bool {
        self.registered.contains(&type_id)
            || self.pending.iter().any(|p| p.type_id == type_id)
    }

    pub fn push(&mut self, stage: Stage, entry: SystemEntry) {
        self.registered.insert(entry.type_id);
        self.stages[stage.index()].push(entry);
    }

    /// Remove a system from scheduling. Returns whether it was registered
    /// or pending.
    ///
    /// While a tick is running the entry may be out with the taken stage
    /// lists; the removal is recorded and applied when they are merged back.
    pub fn remove(&mut self, type_id: TypeId) -> bool {
        if self.registered.remove(&type_id) {
            for stage in &mut self.stages {
                stage.retain(|e| e.type_id != type_id);
            }
            if self.running {
                self.retired.push(type_id);
            }
            return true;
        }
        let before = self.pending.len();
        self.pending.retain(|p| p.type_id != type_id);
        self.pending.len() != before
    }

    pub fn find(&self, type_id: TypeId) -> Option<&SystemEntry> {
        self.stages
            .iter()
            .flat_map(|stage| stage.iter())
            .find(|e| e.type_id == type_id)
    }

    /// Take the stage lists for a tick run.
    pub fn take_stages(&mut self) -> [Vec<SystemEntry>; 4] {
        self.running = true;
        std::mem::take(&mut self.stages)
    }

    /// Merge the stage lists back after a tick, appending any systems
    /// registered mid-tick and dropping any retired mid-tick.
    pub fn restore_stages(&mut self, mut stages: [Vec<SystemEntry>; 4]) {
        for (slot, stage) in self.stages.iter_mut().zip(stages.iter_mut()) {
            let registered_mid_tick = std::mem::take(slot);
            stage.extend(registered_mid_tick);
        }
        self.stages = stages;
        if !self.retired.is_empty() {
            let retired = std::mem::take(&mut self.retired);
            for stage in &mut self.stages {
                stage.retain(|e| !retired.contains(&e.type_id));
            }
        }
        self.running = false;
    }

    /// Names of all registered systems in execution order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages
            .iter()
            .flat_map(|stage| stage.iter().map(|e| e.name))
            .collect()
    }

    /// Number of registered systems (pending render systems excluded).
    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    struct Alpha;
    struct Beta;

    impl System for Alpha {
        fn execute(&mut self, _world: &mut World, _ctx: &TickContext) {}
    }

    impl System for Beta {
        fn execute(&mut self, _world: &mut World, _ctx: &TickContext) {}
    }

    #[test]
    fn stage_order_is_fixed() {
        assert_eq!(
            Stage::ORDER,
            [Stage::First, Stage::Default, Stage::PostFrameLogic, Stage::Last]
        );
        for (i, stage) in Stage::ORDER.iter().enumerate() {
            assert_eq!(stage.index(), i);
        }
    }

    #[test]
    fn push_find_remove() {
        let mut sched = Scheduler::new();
        sched.push(Stage::Default, SystemEntry::new(Alpha));
        assert!(sched.contains(TypeId::of::<Alpha>()));
        assert!(sched.find(TypeId::of::<Alpha>()).is_some());
        assert_eq!(sched.len(), 1);

        assert!(sched.remove(TypeId::of::<Alpha>()));
        assert!(!sched.contains(TypeId::of::<Alpha>()));
        assert!(!sched.remove(TypeId::of::<Alpha>()));
    }

    #[test]
    fn names_follow_stage_then_registration_order() {
        let mut sched = Scheduler::new();
        sched.push(Stage::Last, SystemEntry::new(Alpha));
        sched.push(Stage::First, SystemEntry::new(Beta));
        let names = sched.names();
        assert_eq!(names.len(), 2);
        assert!(names[0].ends_with("Beta"));
        assert!(names[1].ends_with("Alpha"));
    }

    #[test]
    fn mid_tick_registration_merges_after_restore() {
        let mut sched = Scheduler::new();
        sched.push(Stage::Default, SystemEntry::new(Alpha));

        let stages = sched.take_stages();
        // A running system registers Beta.
        sched.push(Stage::Default, SystemEntry::new(Beta));
        sched.restore_stages(stages);

        let names = sched.names();
        assert!(names[0].ends_with("Alpha"));
        assert!(names[1].ends_with("Beta"));
    }

    #[test]
    fn contains_tracks_entries_taken_for_a_running_tick() {
        let mut sched = Scheduler::new();
        sched.push(Stage::Default, SystemEntry::new(Alpha));

        let stages = sched.take_stages();
        // Alpha's entry is out with the taken stages but still counts as
        // registered, so mid-tick duplicates get caught.
        assert!(sched.contains(TypeId::of::<Alpha>()));
        // Removing a never-registered type reports false, even mid-tick.
        assert!(!sched.remove(TypeId::of::<Beta>()));
        sched.restore_stages(stages);

        assert!(sched.contains(TypeId::of::<Alpha>()));
        assert_eq!(sched.len(), 1);
    }

    #[test]
    fn mid_tick_unregister_applies_after_restore() {
        let mut sched = Scheduler::new();
        sched.push(Stage::Default, SystemEntry::new(Alpha));

        let stages = sched.take_stages();
        // Alpha's entry is out with the taken stages; removal is deferred.
        assert!(sched.remove(TypeId::of::<Alpha>()));
        sched.restore_stages(stages);

        assert!(!sched.contains(TypeId::of::<Alpha>()));
        assert_eq!(sched.len(), 0);
    }
}
