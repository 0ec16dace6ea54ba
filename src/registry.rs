use crate::borrow::{AtomicRef, AtomicRefCell, AtomicRefMut};
use crate::bundle::Bundle;
use crate::component::{Component, ComponentId};
use crate::entity::{Entity, EntityAllocator, EntityId};
use crate::error::{Error, Result};
use crate::group::{Group, GroupId, Groups};
use crate::query::Query;
use crate::storage::{ErasedStorage, SparseSet};
use crate::util::HashMap;
use crate::view::View;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::any::{type_name, TypeId};

/// One component type's storage together with the groups
/// that must be told when it changes.
pub(crate) struct Pool<E: EntityId> {
    pub(crate) storage: AtomicRefCell<Box<dyn ErasedStorage<E>>>,
    pub(crate) name: &'static str,
    /// Groups whose signature includes this component,
    /// least restrictive first.
    pub(crate) groups: Vec<GroupId>,
}

impl<E: EntityId> Pool<E> {
    fn new<T: Component>() -> Self {
        let storage: Box<dyn ErasedStorage<E>> = Box::new(SparseSet::<E, T>::new());
        Self {
            storage: AtomicRefCell::new(storage),
            name: type_name::<T>(),
            groups: Vec::new(),
        }
    }

    fn typed_mut<T: Component>(&mut self) -> &mut SparseSet<E, T> {
        self.storage
            .get_mut()
            .as_any_mut()
            .downcast_mut::<SparseSet<E, T>>()
            .expect("component storage registered under the wrong type")
    }

    fn borrow<T: Component>(&self) -> Result<AtomicRef<'_, SparseSet<E, T>>> {
        let storage = self
            .storage
            .try_borrow()
            .map_err(|_| Error::borrow_conflict::<T>())?;
        Ok(AtomicRef::map(storage, |storage| {
            storage
                .as_any()
                .downcast_ref::<SparseSet<E, T>>()
                .expect("component storage registered under the wrong type")
        }))
    }

    fn read<T: Component>(&self) -> AtomicRef<'_, SparseSet<E, T>> {
        self.borrow::<T>()
            .unwrap_or_else(|err| panic!("failed to read `{}`: {}", self.name, err))
    }

    fn borrow_mut<T: Component>(&self) -> Result<AtomicRefMut<'_, SparseSet<E, T>>> {
        let storage = self
            .storage
            .try_borrow_mut()
            .map_err(|_| Error::borrow_conflict::<T>())?;
        Ok(AtomicRefMut::map(storage, |storage| {
            storage
                .as_any_mut()
                .downcast_mut::<SparseSet<E, T>>()
                .expect("component storage registered under the wrong type")
        }))
    }
}

/// Contains entities and, per component type, a sparse set
/// of the components attached to them.
///
/// `E` picks the handle width; see `Entity` and `Entity64`.
pub struct Registry<E: EntityId = Entity> {
    entities: EntityAllocator<E>,
    /// Maps a component type to its index in `pools`.
    components: HashMap<TypeId, ComponentId>,
    pools: Vec<Pool<E>>,
    pub(crate) groups: Groups,
}

impl<E: EntityId> Default for Registry<E> {
    fn default() -> Self {
        Self {
            entities: EntityAllocator::new(),
            components: HashMap::default(),
            pools: Vec::new(),
            groups: Groups::default(),
        }
    }
}

impl<E: EntityId> Registry<E> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new entity with no components.
    ///
    /// Panics if the index space of `E` is exhausted.
    pub fn create(&mut self) -> E {
        self.try_create()
            .unwrap_or_else(|err| panic!("failed to create entity: {}", err))
    }

    /// Creates a new entity with no components.
    pub fn try_create(&mut self) -> Result<E> {
        self.entities.create()
    }

    /// Destroys an entity along with all of its components.
    pub fn destroy(&mut self, entity: E) -> Result<()> {
        self.ensure_alive(entity)?;

        for index in 0..self.pools.len() {
            if self.pools[index].storage.get_mut().contains(entity) {
                self.groups
                    .on_destroy(&mut self.pools, ComponentId(index), entity);
                self.pools[index].storage.get_mut().remove_entity(entity);
            }
        }

        log::trace!("destroyed {:?}", entity);
        self.entities.destroy(entity)
    }

    /// Determines if the given entity is alive within this registry.
    #[inline]
    pub fn is_alive(&self, entity: E) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over the live entities in index order.
    pub fn entities(&self) -> impl Iterator<Item = E> + '_ {
        self.entities.iter()
    }

    /// Destroys every entity and component.
    ///
    /// Storages and declared groups stay registered. Every handle
    /// issued before the call becomes stale.
    pub fn clear(&mut self) {
        for pool in &mut self.pools {
            pool.storage.get_mut().clear();
        }
        self.groups.reset();
        self.entities.clear();
        log::debug!("cleared registry of {} storages", self.pools.len());
    }

    /// Returns the id of `T`'s storage, creating the storage if needed.
    pub fn register<T: Component>(&mut self) -> ComponentId {
        if let Some(&id) = self.components.get(&TypeId::of::<T>()) {
            return id;
        }

        let id = ComponentId(self.pools.len());
        self.pools.push(Pool::new::<T>());
        self.components.insert(TypeId::of::<T>(), id);
        log::debug!("registered storage {} for {}", id.0, type_name::<T>());
        id
    }

    /// Returns the id of `T`'s storage if it exists.
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        self.components.get(&TypeId::of::<T>()).copied()
    }

    /// Attaches a component to an entity.
    ///
    /// Fails if the entity is not alive or already has a `T`.
    pub fn emplace<T: Component>(&mut self, entity: E, component: T) -> Result<()> {
        self.ensure_alive(entity)?;
        let id = self.register::<T>();
        self.pools[id.0]
            .typed_mut::<T>()
            .emplace(entity, component)?;
        self.groups.on_construct(&mut self.pools, id, entity);
        Ok(())
    }

    /// Attaches every component of `bundle` to an entity.
    ///
    /// Either all components are attached or, on error, none are.
    pub fn insert<B: Bundle>(&mut self, entity: E, bundle: B) -> Result<()> {
        bundle.insert_into(self, entity)
    }

    /// Creates an entity carrying every component of `bundle`.
    pub fn spawn<B: Bundle>(&mut self, bundle: B) -> Result<E> {
        let entity = self.try_create()?;
        if let Err(err) = bundle.insert_into(self, entity) {
            self.destroy(entity)?;
            return Err(err);
        }
        Ok(entity)
    }

    /// Detaches and returns an entity's `T`.
    pub fn remove<T: Component>(&mut self, entity: E) -> Result<T> {
        self.ensure_alive(entity)?;
        let id = self
            .component_id::<T>()
            .ok_or_else(|| Error::missing::<T, E>(entity))?;
        if !self.pools[id.0].typed_mut::<T>().contains(entity) {
            return Err(Error::missing::<T, E>(entity));
        }

        self.groups.on_destroy(&mut self.pools, id, entity);
        self.pools[id.0].typed_mut::<T>().remove(entity)
    }

    /// Overwrites an entity's `T`, returning the previous value.
    ///
    /// Group membership does not change.
    pub fn replace<T: Component>(&mut self, entity: E, component: T) -> Result<T> {
        self.ensure_alive(entity)?;
        match self.component_id::<T>() {
            Some(id) => self.pools[id.0].typed_mut::<T>().replace(entity, component),
            None => Err(Error::missing::<T, E>(entity)),
        }
    }

    /// Checks if the given entity has a `T`.
    ///
    /// # Panics
    /// Panics if `T`'s storage is mutably borrowed.
    pub fn contains<T: Component>(&self, entity: E) -> bool {
        match self.component_id::<T>() {
            Some(id) => self.pools[id.0].read::<T>().contains(entity),
            None => false,
        }
    }

    /// Borrows an entity's `T`.
    ///
    /// The whole storage stays immutably borrowed while the
    /// returned guard lives.
    pub fn get<T: Component>(&self, entity: E) -> Result<AtomicRef<'_, T>> {
        self.ensure_alive(entity)?;
        let id = self
            .component_id::<T>()
            .ok_or_else(|| Error::missing::<T, E>(entity))?;
        let storage = self.pools[id.0].borrow::<T>()?;
        let slot = storage
            .index_of(entity)
            .ok_or_else(|| Error::missing::<T, E>(entity))?;
        Ok(AtomicRef::map(storage, |storage| &storage.components()[slot]))
    }

    /// Mutably borrows an entity's `T`.
    pub fn get_mut<T: Component>(&mut self, entity: E) -> Result<&mut T> {
        self.ensure_alive(entity)?;
        let id = self
            .component_id::<T>()
            .ok_or_else(|| Error::missing::<T, E>(entity))?;
        self.pools[id.0]
            .typed_mut::<T>()
            .get_mut(entity)
            .ok_or_else(|| Error::missing::<T, E>(entity))
    }

    /// Returns the number of entities having a `T`.
    ///
    /// # Panics
    /// Panics if `T`'s storage is mutably borrowed.
    pub fn count<T: Component>(&self) -> usize {
        match self.component_id::<T>() {
            Some(id) => self.pools[id.0].read::<T>().len(),
            None => 0,
        }
    }

    /// Detaches every `T` from every entity.
    pub fn clear_component<T: Component>(&mut self) {
        if let Some(id) = self.component_id::<T>() {
            let pool = &mut self.pools[id.0];
            pool.storage.get_mut().clear();
            self.groups.on_clear(&pool.groups);
        }
    }

    /// Borrows `T`'s storage.
    pub fn storage<T: Component>(&self) -> Result<AtomicRef<'_, SparseSet<E, T>>> {
        let id = self
            .component_id::<T>()
            .ok_or_else(Error::unregistered::<T>)?;
        self.pools[id.0].borrow::<T>()
    }

    /// Mutably borrows `T`'s storage.
    ///
    /// The guard allows editing components in place. Attaching and
    /// detaching goes through the registry so that groups stay sorted:
    ///
    /// ```compile_fail
    /// # use pecs::{Entity, Registry};
    /// # struct A(u32);
    /// let mut registry = Registry::<Entity>::new();
    /// let e = registry.create();
    /// registry.emplace(e, A(0)).unwrap();
    /// registry.storage_mut::<A>().unwrap().remove(e).unwrap();
    /// ```
    pub fn storage_mut<T: Component>(&self) -> Result<AtomicRefMut<'_, SparseSet<E, T>>> {
        let id = self
            .component_id::<T>()
            .ok_or_else(Error::unregistered::<T>)?;
        self.pools[id.0].borrow_mut::<T>()
    }

    /// Creates a view iterating every entity that has all
    /// components named by `Q`.
    pub fn view<Q: Query<E>>(&self) -> Result<View<'_, E, Q>> {
        View::new(self)
    }

    /// Declares (or reuses) the group owning `O` and observing `G`,
    /// then borrows it.
    ///
    /// Declaration sorts the owned storages so that every matching
    /// entity sits in their leading slots; from then on every
    /// registry operation keeps them that way.
    pub fn group<O: Query<E>, G: Query<E>>(&mut self) -> Result<Group<'_, E, O, G>> {
        let mut owned = Vec::new();
        O::register(self, &mut owned);
        let mut get = Vec::new();
        G::register(self, &mut get);

        let id = self.groups.declare(&mut self.pools, owned, get)?;
        Group::new(self, id)
    }

    fn ensure_alive(&self, entity: E) -> Result<()> {
        if self.is_alive(entity) {
            Ok(())
        } else {
            Err(Error::invalid_entity(entity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Position(i32);

    #[derive(Debug, PartialEq)]
    struct Velocity(i32);

    #[test]
    fn storages_are_registered_once() {
        let mut registry = Registry::<Entity>::new();
        let a = registry.register::<Position>();
        let b = registry.register::<Velocity>();
        assert_ne!(a, b);
        assert_eq!(registry.register::<Position>(), a);
        assert_eq!(registry.component_id::<Velocity>(), Some(b));
        assert_eq!(registry.component_id::<u8>(), None);
    }

    #[test]
    fn guards_block_conflicting_storage_access() {
        let mut registry = Registry::<Entity>::new();
        let e = registry.create();
        registry.emplace(e, Position(1)).unwrap();

        let position = registry.get::<Position>(e).unwrap();
        assert_eq!(*position, Position(1));
        assert!(matches!(
            registry.storage_mut::<Position>(),
            Err(Error::BorrowConflict { .. })
        ));
        assert!(registry.storage::<Position>().is_ok());
        drop(position);

        drop(registry.storage_mut::<Position>().unwrap());
        assert!(registry.contains::<Position>(e));
        assert_eq!(registry.count::<Position>(), 1);
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn contains_panics_while_storage_is_written() {
        let mut registry = Registry::<Entity>::new();
        let e = registry.create();
        registry.emplace(e, Position(1)).unwrap();

        let _view = registry.view::<&mut Position>().unwrap();
        registry.contains::<Position>(e);
    }

    #[test]
    #[should_panic(expected = "already borrowed")]
    fn count_panics_while_storage_is_written() {
        let mut registry = Registry::<Entity>::new();
        let e = registry.create();
        registry.emplace(e, Position(1)).unwrap();

        let _storage = registry.storage_mut::<Position>().unwrap();
        registry.count::<Position>();
    }

    #[test]
    fn in_place_edits_keep_groups_intact() {
        let mut registry = Registry::<Entity>::new();
        let entities: Vec<_> = (0..4).map(|_| registry.create()).collect();
        for (i, &e) in entities.iter().enumerate() {
            registry.emplace(e, Position(i as i32)).unwrap();
            registry.emplace(e, Velocity(i as i32)).unwrap();
        }
        registry.group::<(&Position, &Velocity), ()>().unwrap();

        {
            let mut velocities = registry.storage_mut::<Velocity>().unwrap();
            for (_, velocity) in velocities.iter_mut() {
                velocity.0 *= 2;
            }
            velocities.get_mut(entities[1]).unwrap().0 = -1;
            velocities.reserve(16);
        }

        let mut group = registry.group::<(&Position, &Velocity), ()>().unwrap();
        assert_eq!(group.len(), 4);
        for (e, (position, velocity), ()) in &mut group {
            if e == entities[1] {
                assert_eq!(velocity.0, -1);
            } else {
                assert_eq!(velocity.0, position.0 * 2);
            }
        }
    }

    #[test]
    fn removal_keeps_group_prefix() {
        let mut registry = Registry::<Entity>::new();
        let entities: Vec<_> = (0..4).map(|_| registry.create()).collect();
        for (i, &e) in entities.iter().enumerate() {
            registry.emplace(e, Position(i as i32)).unwrap();
            registry.emplace(e, Velocity(i as i32)).unwrap();
        }
        assert_eq!(registry.group::<(&Position, &Velocity), ()>().unwrap().len(), 4);

        registry.remove::<Velocity>(entities[1]).unwrap();
        let group = registry.group::<(&Position, &Velocity), ()>().unwrap();
        assert_eq!(group.len(), 3);
        assert!(!group.entities().contains(&entities[1]));
        drop(group);

        registry.storage::<Position>().unwrap().assert_consistent();
        registry.storage::<Velocity>().unwrap().assert_consistent();
    }

    #[test]
    fn random_churn_keeps_storages_packed() {
        use rand::{Rng, SeedableRng};
        use rand_xoshiro::Xoshiro256PlusPlus;

        #[derive(Debug)]
        struct Tag;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut registry = Registry::<Entity>::new();
        let mut entities: Vec<_> = (0..48).map(|_| registry.create()).collect();
        registry.group::<(&Position, &Velocity), ()>().unwrap();
        registry.group::<(&Tag,), (&Position,)>().unwrap();

        for _ in 0..3000 {
            let slot = rng.gen_range(0..entities.len());
            let e = entities[slot];
            match rng.gen_range(0..7) {
                0 => {
                    let _ = registry.emplace(e, Position(0));
                }
                1 => {
                    let _ = registry.emplace(e, Velocity(0));
                }
                2 => {
                    let _ = registry.emplace(e, Tag);
                }
                3 => {
                    let _ = registry.remove::<Position>(e);
                }
                4 => {
                    let _ = registry.remove::<Velocity>(e);
                }
                5 => {
                    let _ = registry.remove::<Tag>(e);
                }
                _ => {
                    registry.destroy(e).unwrap();
                    entities[slot] = registry.create();
                }
            }

            let positions = registry.storage::<Position>().unwrap();
            let velocities = registry.storage::<Velocity>().unwrap();
            let tags = registry.storage::<Tag>().unwrap();
            positions.assert_consistent();
            velocities.assert_consistent();
            tags.assert_consistent();
            for &e in &entities {
                assert_eq!(positions.contains(e), positions.get(e).is_some());
            }
            assert!(positions
                .entities()
                .iter()
                .chain(velocities.entities())
                .all(|&e| registry.is_alive(e)));
        }
    }
}
