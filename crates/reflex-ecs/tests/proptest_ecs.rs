//! Property tests: random component/lifecycle op sequences against a naive
//! model, checking that cached query membership and entity resolvability
//! never drift from first-principles recomputation.

use proptest::prelude::*;
use reflex_ecs::prelude::*;

#[derive(Debug, Clone, PartialEq)]
struct Marker(u8);

#[derive(Debug, Clone, PartialEq)]
struct Blocker(u8);

#[derive(Debug, Clone, Copy)]
enum Op {
    AddMarker(usize),
    RemoveMarker(usize),
    AddBlocker(usize),
    RemoveBlocker(usize),
    Destroy(usize),
    Tick,
}

/// What the model believes about one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Slot {
    Alive { marker: bool, blocker: bool },
    /// Logically destroyed, physical free pending the next tick.
    Destroyed { marker: bool, blocker: bool },
    Freed,
}

const ENTITIES: usize = 4;

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ENTITIES).prop_map(Op::AddMarker),
        (0..ENTITIES).prop_map(Op::RemoveMarker),
        (0..ENTITIES).prop_map(Op::AddBlocker),
        (0..ENTITIES).prop_map(Op::RemoveBlocker),
        (0..ENTITIES).prop_map(Op::Destroy),
        Just(Op::Tick),
    ]
}

proptest! {
    /// The cached `Marker AND NOT Blocker` query always equals the set the
    /// model computes from scratch, and per-entity `has_component` agrees.
    #[test]
    fn query_membership_matches_naive_model(
        ops in prop::collection::vec(op_strategy(), 1..96)
    ) {
        let mut world = World::new();
        world.register_component::<Marker>("marker").unwrap();
        world.register_component::<Blocker>("blocker").unwrap();
        let query = world
            .query(&QuerySpec::new().with::<Marker>().without::<Blocker>())
            .unwrap();

        let ids: Vec<EntityId> = (0..ENTITIES).map(|_| world.create_entity()).collect();
        let mut model = [Slot::Alive { marker: false, blocker: false }; ENTITIES];

        for op in ops {
            match op {
                Op::AddMarker(i) => match &mut model[i] {
                    Slot::Alive { marker, .. } => {
                        world.add_component(ids[i], Marker(0)).unwrap();
                        *marker = true;
                    }
                    _ => {
                        prop_assert!(world.add_component(ids[i], Marker(0)).is_err());
                    }
                },
                Op::AddBlocker(i) => match &mut model[i] {
                    Slot::Alive { blocker, .. } => {
                        world.add_component(ids[i], Blocker(0)).unwrap();
                        *blocker = true;
                    }
                    _ => {
                        prop_assert!(world.add_component(ids[i], Blocker(0)).is_err());
                    }
                },
                Op::RemoveMarker(i) => match model[i] {
                    Slot::Alive { marker, blocker } => {
                        prop_assert_eq!(world.remove_component::<Marker>(ids[i]).unwrap(), marker);
                        model[i] = Slot::Alive { marker: false, blocker };
                    }
                    Slot::Destroyed { marker, blocker } => {
                        prop_assert_eq!(world.remove_component::<Marker>(ids[i]).unwrap(), marker);
                        // Detaching the last component of a destroyed-pending
                        // entity completes its destruction on the spot.
                        model[i] = if marker && !blocker {
                            Slot::Freed
                        } else {
                            Slot::Destroyed { marker: false, blocker }
                        };
                    }
                    Slot::Freed => {
                        prop_assert!(world.remove_component::<Marker>(ids[i]).is_err());
                    }
                },
                Op::RemoveBlocker(i) => match model[i] {
                    Slot::Alive { marker, blocker } => {
                        prop_assert_eq!(world.remove_component::<Blocker>(ids[i]).unwrap(), blocker);
                        model[i] = Slot::Alive { marker, blocker: false };
                    }
                    Slot::Destroyed { marker, blocker } => {
                        prop_assert_eq!(world.remove_component::<Blocker>(ids[i]).unwrap(), blocker);
                        model[i] = if blocker && !marker {
                            Slot::Freed
                        } else {
                            Slot::Destroyed { marker, blocker: false }
                        };
                    }
                    Slot::Freed => {
                        prop_assert!(world.remove_component::<Blocker>(ids[i]).is_err());
                    }
                },
                Op::Destroy(i) => match model[i] {
                    Slot::Alive { marker, blocker } => {
                        world.destroy_entity(ids[i]).unwrap();
                        // Even a component-less entity stays resolvable until
                        // the end-of-tick flush.
                        model[i] = Slot::Destroyed { marker, blocker };
                    }
                    Slot::Destroyed { .. } => {
                        world.destroy_entity(ids[i]).unwrap();
                    }
                    Slot::Freed => {
                        prop_assert!(world.destroy_entity(ids[i]).is_err());
                    }
                },
                Op::Tick => {
                    world.execute(0.016, 0.016);
                    for slot in &mut model {
                        if matches!(slot, Slot::Destroyed { .. }) {
                            *slot = Slot::Freed;
                        }
                    }
                }
            }

            let mut expected: Vec<EntityId> = model
                .iter()
                .zip(&ids)
                .filter_map(|(slot, &id)| match slot {
                    Slot::Alive { marker: true, blocker: false } => Some(id),
                    _ => None,
                })
                .collect();
            expected.sort();
            let mut actual = world.entities(query);
            actual.sort();
            prop_assert_eq!(actual, expected);

            for (slot, &id) in model.iter().zip(&ids) {
                let (marker, blocker, alive) = match *slot {
                    Slot::Alive { marker, blocker } => (marker, blocker, true),
                    Slot::Destroyed { marker, blocker } => (marker, blocker, false),
                    Slot::Freed => (false, false, false),
                };
                prop_assert_eq!(world.has_component::<Marker>(id), marker);
                prop_assert_eq!(world.has_component::<Blocker>(id), blocker);
                prop_assert_eq!(world.is_alive(id), alive);
            }
        }
    }

    /// Repeatedly adding and removing a state component never underflows the
    /// state count or frees an entity early.
    #[test]
    fn state_component_count_never_underflows(
        ops in prop::collection::vec(prop_oneof![Just(true), Just(false)], 1..64)
    ) {
        #[derive(Debug)]
        struct Handle;

        let mut world = World::new();
        world.register_state_component::<Handle>("handle").unwrap();
        let e = world.create_entity();

        let mut held = false;
        for add in ops {
            if add {
                if !held {
                    world.add_component(e, Handle).unwrap();
                    held = true;
                }
            } else {
                prop_assert_eq!(world.remove_component::<Handle>(e).unwrap(), held);
                held = false;
            }
            prop_assert!(world.is_alive(e));
        }

        // Destruction completes only once the state component is gone.
        world.destroy_entity(e).unwrap();
        world.execute(0.016, 0.016);
        if held {
            prop_assert!(world.has_component::<Handle>(e));
            prop_assert_eq!(world.remove_component::<Handle>(e).unwrap(), true);
        }
        prop_assert!(world.remove_component::<Handle>(e).is_err());
    }
}
