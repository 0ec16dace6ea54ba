//! Typed access to one or more component storages at once.
//!
//! A query is `&T`, `&mut T`, `()` or a tuple of those. Fetching a
//! query borrows the storages it names from a registry; the resulting
//! `Fetch` hands out items for single entities.

use crate::borrow::{AtomicRef, AtomicRefMut};
use crate::component::{Component, ComponentId};
use crate::entity::EntityId;
use crate::error::Result;
use crate::registry::Registry;
use crate::storage::SparseSet;
use alloc::vec::Vec;

/// A set of component types to iterate over.
pub trait Query<E: EntityId> {
    type Fetch<'a>: Fetch<E>;

    /// Borrows the storages named by the query.
    ///
    /// Fails with `UnregisteredComponent` if a storage does not exist
    /// and with `BorrowConflict` if it is already borrowed incompatibly.
    fn fetch(registry: &Registry<E>) -> Result<Self::Fetch<'_>>;

    /// Registers the named component types, appending their ids in order.
    fn register(registry: &mut Registry<E>, ids: &mut Vec<ComponentId>);
}

/// Borrowed storages of a query.
pub trait Fetch<E: EntityId> {
    type Item<'v>
    where
        Self: 'v;

    /// Entities of the smallest storage involved; iteration walks these.
    fn driver(&self) -> &[E];

    /// Whether `entity` has every component of the query.
    fn contains(&self, entity: E) -> bool;

    /// # Safety
    /// No other item for `entity` obtained from this fetch may be alive.
    unsafe fn get<'v>(&'v self, entity: E) -> Option<Self::Item<'v>>;

    /// Fetches the item at a dense slot, which must be the same
    /// entity's slot in every storage involved.
    ///
    /// # Safety
    /// `slot` must be in bounds for every storage and no other item
    /// for that slot obtained from this fetch may be alive.
    unsafe fn get_at<'v>(&'v self, slot: usize) -> Self::Item<'v>;
}

/// Shared access to a storage.
pub struct Read<'a, E, T> {
    storage: AtomicRef<'a, SparseSet<E, T>>,
}

/// Exclusive access to a storage.
pub struct Write<'a, E, T> {
    storage: AtomicRefMut<'a, SparseSet<E, T>>,
    data: *mut T,
}

impl<E: EntityId, T: Component> Fetch<E> for Read<'_, E, T> {
    type Item<'v> = &'v T where Self: 'v;

    #[inline]
    fn driver(&self) -> &[E] {
        self.storage.entities()
    }

    #[inline]
    fn contains(&self, entity: E) -> bool {
        self.storage.contains(entity)
    }

    #[inline]
    unsafe fn get<'v>(&'v self, entity: E) -> Option<&'v T> {
        self.storage.get(entity)
    }

    #[inline]
    unsafe fn get_at<'v>(&'v self, slot: usize) -> &'v T {
        self.storage.components().get_unchecked(slot)
    }
}

impl<E: EntityId, T: Component> Fetch<E> for Write<'_, E, T> {
    type Item<'v> = &'v mut T where Self: 'v;

    #[inline]
    fn driver(&self) -> &[E] {
        self.storage.entities()
    }

    #[inline]
    fn contains(&self, entity: E) -> bool {
        self.storage.contains(entity)
    }

    #[inline]
    unsafe fn get<'v>(&'v self, entity: E) -> Option<&'v mut T> {
        let slot = self.storage.index_of(entity)?;
        Some(&mut *self.data.add(slot))
    }

    #[inline]
    unsafe fn get_at<'v>(&'v self, slot: usize) -> &'v mut T {
        &mut *self.data.add(slot)
    }
}

impl<'q, E: EntityId, T: Component> Query<E> for &'q T {
    type Fetch<'a> = Read<'a, E, T>;

    fn fetch(registry: &Registry<E>) -> Result<Read<'_, E, T>> {
        Ok(Read {
            storage: registry.storage::<T>()?,
        })
    }

    fn register(registry: &mut Registry<E>, ids: &mut Vec<ComponentId>) {
        ids.push(registry.register::<T>());
    }
}

impl<'q, E: EntityId, T: Component> Query<E> for &'q mut T {
    type Fetch<'a> = Write<'a, E, T>;

    fn fetch(registry: &Registry<E>) -> Result<Write<'_, E, T>> {
        let mut storage = registry.storage_mut::<T>()?;
        let data = storage.data_ptr();
        Ok(Write { storage, data })
    }

    fn register(registry: &mut Registry<E>, ids: &mut Vec<ComponentId>) {
        ids.push(registry.register::<T>());
    }
}

/// The empty query. Used as the default observed set of a group.
impl<E: EntityId> Query<E> for () {
    type Fetch<'a> = ();

    fn fetch(_registry: &Registry<E>) -> Result<()> {
        Ok(())
    }

    fn register(_registry: &mut Registry<E>, _ids: &mut Vec<ComponentId>) {}
}

impl<E: EntityId> Fetch<E> for () {
    type Item<'v> = () where Self: 'v;

    fn driver(&self) -> &[E] {
        &[]
    }

    fn contains(&self, _entity: E) -> bool {
        true
    }

    unsafe fn get<'v>(&'v self, _entity: E) -> Option<()> {
        Some(())
    }

    unsafe fn get_at<'v>(&'v self, _slot: usize) {}
}

macro_rules! impl_query {
    ($($ty:ident),+) => {
        impl<E: EntityId, $($ty: Query<E>),+> Query<E> for ($($ty,)+) {
            type Fetch<'a> = ($(<$ty as Query<E>>::Fetch<'a>,)+);

            fn fetch(registry: &Registry<E>) -> Result<Self::Fetch<'_>> {
                Ok(($($ty::fetch(registry)?,)+))
            }

            fn register(registry: &mut Registry<E>, ids: &mut Vec<ComponentId>) {
                $($ty::register(registry, ids);)+
            }
        }

        #[allow(non_snake_case)]
        impl<E: EntityId, $($ty: Fetch<E>),+> Fetch<E> for ($($ty,)+) {
            type Item<'v> = ($(<$ty as Fetch<E>>::Item<'v>,)+) where Self: 'v;

            #[inline]
            fn driver(&self) -> &[E] {
                let ($($ty,)+) = self;
                [$($ty.driver()),+]
                    .into_iter()
                    .min_by_key(|entities| entities.len())
                    .unwrap_or(&[])
            }

            #[inline]
            fn contains(&self, entity: E) -> bool {
                let ($($ty,)+) = self;
                $($ty.contains(entity))&&+
            }

            #[inline]
            unsafe fn get<'v>(&'v self, entity: E) -> Option<Self::Item<'v>> {
                let ($($ty,)+) = self;
                Some(($($ty.get(entity)?,)+))
            }

            #[inline]
            unsafe fn get_at<'v>(&'v self, slot: usize) -> Self::Item<'v> {
                let ($($ty,)+) = self;
                ($($ty.get_at(slot),)+)
            }
        }
    }
}

recursive_macro_call_on_tuple!(impl_query, Q0, Q1, Q2, Q3, Q4, Q5, Q6, Q7);
