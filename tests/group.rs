use pecs::{Entity, EntityId, Error, Registry};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::collections::HashSet;

/// Every component stores the bits of the entity it belongs to,
/// so misaligned storages show up as mismatched values.
#[derive(Debug, Clone, Copy, PartialEq)]
struct A(u32);
#[derive(Debug, Clone, Copy, PartialEq)]
struct B(u32);
#[derive(Debug, Clone, Copy, PartialEq)]
struct C(u32);
#[derive(Debug, Clone, Copy, PartialEq)]
struct D(u32);

#[test]
fn appears_once_fully_matching() {
    let mut registry = Registry::<Entity>::new();
    assert!(registry.group::<(&A, &B), ()>().unwrap().is_empty());

    let x = registry.create();
    registry.emplace(x, A(0)).unwrap();
    {
        let group = registry.group::<(&A, &B), ()>().unwrap();
        assert_eq!(group.len(), 0);
        assert!(!group.contains(x));
    }

    registry.emplace(x, B(0)).unwrap();
    let group = registry.group::<(&A, &B), ()>().unwrap();
    assert_eq!(group.len(), 1);
    assert_eq!(group.entities(), &[x]);
}

#[test]
fn declaration_arranges_existing_entities() {
    let mut registry = Registry::<Entity>::new();
    let entities: Vec<_> = (0..10).map(|_| registry.create()).collect();
    for (i, &e) in entities.iter().enumerate() {
        registry.emplace(e, A(e.to_bits())).unwrap();
        if i % 3 != 0 {
            registry.emplace(e, B(e.to_bits())).unwrap();
        }
    }

    let mut group = registry.group::<(&A, &mut B), ()>().unwrap();
    assert_eq!(group.len(), 6);
    let members: HashSet<_> = group.entities().iter().copied().collect();
    let expected: HashSet<_> = entities
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(_, &e)| e)
        .collect();
    assert_eq!(members, expected);

    for (e, (a, b), ()) in &mut group {
        assert_eq!(a.0, e.to_bits());
        assert_eq!(b.0, e.to_bits());
        b.0 = 0;
    }
    drop(group);

    assert!(entities
        .iter()
        .filter(|&&e| registry.contains::<B>(e))
        .all(|&e| registry.get::<B>(e).unwrap().0 == 0));
}

#[test]
fn observed_components() {
    let mut registry = Registry::<Entity>::new();
    for i in 0..20u32 {
        let e = registry.create();
        registry.emplace(e, D(e.to_bits())).unwrap();
        if i % 2 == 0 {
            registry.emplace(e, A(e.to_bits())).unwrap();
        }
    }

    let mut group = registry.group::<(&mut D,), (&A,)>().unwrap();
    assert_eq!(group.len(), 10);

    let mut count = 0;
    group.each(|e, (d,), (a,)| {
        assert_eq!(d.0, a.0);
        assert_eq!(a.0, e.to_bits());
        d.0 += 1;
        count += 1;
    });
    assert_eq!(count, 10);

    let first = group.entities()[0];
    let (d, a) = group.get(first).unwrap();
    assert_eq!(d.0 .0, a.0 .0 + 1);
}

#[test]
fn redeclaring_reuses_the_group() {
    let mut registry = Registry::<Entity>::new();
    let first = registry.group::<(&A, &B), ()>().unwrap().id();
    let again = registry.group::<(&B, &A), ()>().unwrap().id();
    assert_eq!(first, again);
}

#[test]
fn nested_groups_are_accepted() {
    let mut registry = Registry::<Entity>::new();
    registry.group::<(&A, &B), ()>().unwrap();
    registry.group::<(&A, &B, &C), ()>().unwrap();
    registry.group::<(&A,), (&B,)>().unwrap();
    registry.group::<(&A, &B, &C), (&D,)>().unwrap();
}

#[test]
fn overlapping_groups_conflict() {
    let mut registry = Registry::<Entity>::new();
    registry.group::<(&A, &B), ()>().unwrap();

    match registry.group::<(&A, &C), ()>() {
        Err(Error::GroupConflict { component }) => assert!(component.ends_with("A")),
        Err(other) => panic!("unexpected error {}", other),
        Ok(_) => panic!("overlapping groups were accepted"),
    }
    assert!(matches!(
        registry.group::<(&A,), (&C,)>(),
        Err(Error::GroupConflict { .. })
    ));
    registry.group::<(&C, &D), ()>().unwrap();
}

#[test]
fn malformed_groups() {
    let mut registry = Registry::<Entity>::new();
    assert!(matches!(
        registry.group::<(), (&A,)>(),
        Err(Error::MalformedGroup { .. })
    ));
    assert!(matches!(
        registry.group::<(&A, &A), ()>(),
        Err(Error::MalformedGroup { .. })
    ));
    assert!(matches!(
        registry.group::<(&A,), (&A,)>(),
        Err(Error::MalformedGroup { .. })
    ));
}

#[test]
fn clearing_empties_groups() {
    let mut registry = Registry::<Entity>::new();
    for _ in 0..5 {
        let e = registry.create();
        registry.emplace(e, A(e.to_bits())).unwrap();
        registry.emplace(e, B(e.to_bits())).unwrap();
    }
    assert_eq!(registry.group::<(&A, &B), ()>().unwrap().len(), 5);

    registry.clear_component::<B>();
    assert_eq!(registry.group::<(&A, &B), ()>().unwrap().len(), 0);

    let e = registry.entities().next().unwrap();
    registry.emplace(e, B(e.to_bits())).unwrap();
    assert_eq!(registry.group::<(&A, &B), ()>().unwrap().len(), 1);

    registry.clear();
    assert_eq!(registry.group::<(&A, &B), ()>().unwrap().len(), 0);
}

fn check_ab(registry: &mut Registry) {
    let mut group = registry.group::<(&A, &B), ()>().unwrap();
    let members = group.entities().to_vec();
    for (e, (a, b), ()) in &mut group {
        assert_eq!((a.0, b.0), (e.to_bits(), e.to_bits()));
    }
    drop(group);

    check_prefix::<A>(registry, &members);
    check_prefix::<B>(registry, &members);
    let expected: HashSet<_> = registry
        .view::<(&A, &B)>()
        .unwrap()
        .iter()
        .map(|(e, _)| e)
        .collect();
    assert_eq!(members.iter().copied().collect::<HashSet<_>>(), expected);
    assert_eq!(members.len(), expected.len());
}

fn check_abc(registry: &mut Registry) {
    let group = registry.group::<(&A, &B, &C), ()>().unwrap();
    let members = group.entities().to_vec();
    drop(group);

    check_prefix::<A>(registry, &members);
    check_prefix::<B>(registry, &members);
    check_prefix::<C>(registry, &members);
    let expected: HashSet<_> = registry
        .view::<(&A, &B, &C)>()
        .unwrap()
        .iter()
        .map(|(e, _)| e)
        .collect();
    assert_eq!(members.iter().copied().collect::<HashSet<_>>(), expected);
}

fn check_d(registry: &mut Registry) {
    let mut group = registry.group::<(&D,), (&A,)>().unwrap();
    let members = group.entities().to_vec();
    assert_eq!(group.iter().count(), members.len());
    drop(group);

    check_prefix::<D>(registry, &members);
    let expected: HashSet<_> = registry
        .view::<(&D, &A)>()
        .unwrap()
        .iter()
        .map(|(e, _)| e)
        .collect();
    assert_eq!(members.iter().copied().collect::<HashSet<_>>(), expected);
}

fn check_prefix<T: pecs::Component>(registry: &Registry, members: &[Entity]) {
    let storage = registry.storage::<T>().unwrap();
    assert_eq!(&storage.entities()[..members.len()], members);
}

#[test]
fn random_interleavings_keep_groups_exact() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(0x5eed);
    let mut registry = Registry::<Entity>::new();
    let mut entities: Vec<Entity> = (0..64).map(|_| registry.create()).collect();

    registry.group::<(&A, &B), ()>().unwrap();
    registry.group::<(&D,), (&A,)>().unwrap();

    for step in 0..4000 {
        let slot = rng.gen_range(0..entities.len());
        let e = entities[slot];
        let bits = e.to_bits();
        match rng.gen_range(0..9) {
            0 => {
                let _ = registry.emplace(e, A(bits));
            }
            1 => {
                let _ = registry.emplace(e, B(bits));
            }
            2 => {
                let _ = registry.emplace(e, C(bits));
            }
            3 => {
                let _ = registry.emplace(e, D(bits));
            }
            4 => {
                let _ = registry.remove::<A>(e);
            }
            5 => {
                let _ = registry.remove::<B>(e);
            }
            6 => {
                let _ = registry.remove::<C>(e);
            }
            7 => {
                let _ = registry.remove::<D>(e);
            }
            _ => {
                registry.destroy(e).unwrap();
                entities[slot] = registry.create();
            }
        }

        // Declared midway so it has to arrange a populated registry.
        if step == 1000 {
            registry.group::<(&A, &B, &C), ()>().unwrap();
        }
        if step % 50 == 0 {
            check_ab(&mut registry);
            check_d(&mut registry);
            if step >= 1000 {
                check_abc(&mut registry);
            }
        }
    }

    check_ab(&mut registry);
    check_abc(&mut registry);
    check_d(&mut registry);
}

#[test]
fn group_and_view_agree_on_many_entities() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
    let mut registry = Registry::<Entity>::new();
    for _ in 0..10_000 {
        let e = registry.create();
        let bits = e.to_bits();
        if rng.gen_bool(0.7) {
            registry.emplace(e, A(bits)).unwrap();
        }
        if rng.gen_bool(0.5) {
            registry.emplace(e, B(bits)).unwrap();
        }
    }

    let view_count = registry.view::<(&A, &B)>().unwrap().iter().count();
    assert_eq!(registry.group::<(&A, &B), ()>().unwrap().len(), view_count);
    check_ab(&mut registry);
}
