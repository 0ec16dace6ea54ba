use crate::component::Component;
use crate::entity::EntityId;
use crate::error::{Error, Result};
use alloc::vec::Vec;
use core::any::Any;

/// Marks an index with no component in the sparse array.
const EMPTY: u32 = u32::MAX;

/// A component storage based on a sparse set.
///
/// Stores all components of one type within a `Registry`.
/// `sparse` maps an entity index to a slot in the dense arrays;
/// `dense` and `data` are packed, parallel arrays of handles and
/// values. Removal swaps the last slot into the hole, so the
/// dense order is insertion order only until the first removal.
///
/// Components are attached and detached through the `Registry`,
/// which keeps groups in step; a borrowed storage only allows
/// reading and editing values in place.
pub struct SparseSet<E, T> {
    sparse: Vec<u32>,
    dense: Vec<E>,
    data: Vec<T>,
}

impl<E, T> Default for SparseSet<E, T> {
    fn default() -> Self {
        Self {
            sparse: Vec::new(),
            dense: Vec::new(),
            data: Vec::new(),
        }
    }
}

impl<E: EntityId, T> SparseSet<E, T> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Returns the dense slot of `entity`'s component.
    ///
    /// The full handle is compared, so a stale handle whose
    /// index was reused is not found.
    #[inline]
    pub fn index_of(&self, entity: E) -> Option<usize> {
        let slot = *self.sparse.get(entity.index())?;
        if slot == EMPTY {
            return None;
        }
        let slot = slot as usize;
        if self.dense[slot] == entity {
            Some(slot)
        } else {
            None
        }
    }

    #[inline]
    pub fn contains(&self, entity: E) -> bool {
        self.index_of(entity).is_some()
    }

    #[inline]
    pub fn get(&self, entity: E) -> Option<&T> {
        let slot = self.index_of(entity)?;
        Some(&self.data[slot])
    }

    #[inline]
    pub fn get_mut(&mut self, entity: E) -> Option<&mut T> {
        let slot = self.index_of(entity)?;
        Some(&mut self.data[slot])
    }

    /// Adds a component for `entity`.
    ///
    /// Fails with `DuplicateComponent` if `entity` already has one.
    /// A component left behind by an older version of the same index
    /// is dropped and its slot reused.
    pub(crate) fn emplace(&mut self, entity: E, value: T) -> Result<()> {
        let index = entity.index();
        if index >= self.sparse.len() {
            self.sparse.resize(index + 1, EMPTY);
        } else if self.sparse[index] != EMPTY {
            let slot = self.sparse[index] as usize;
            if self.dense[slot] == entity {
                return Err(Error::duplicate::<T, E>(entity));
            }
            self.dense[slot] = entity;
            self.data[slot] = value;
            return Ok(());
        }

        debug_assert!(self.dense.len() < EMPTY as usize);
        self.sparse[index] = self.dense.len() as u32;
        self.dense.push(entity);
        self.data.push(value);
        Ok(())
    }

    /// Removes and returns `entity`'s component.
    ///
    /// The last component is moved into the freed slot.
    pub(crate) fn remove(&mut self, entity: E) -> Result<T> {
        let slot = self
            .index_of(entity)
            .ok_or_else(|| Error::missing::<T, E>(entity))?;

        self.sparse[entity.index()] = EMPTY;
        self.dense.swap_remove(slot);
        let value = self.data.swap_remove(slot);
        if let Some(moved) = self.dense.get(slot) {
            self.sparse[moved.index()] = slot as u32;
        }

        debug_assert_eq!(self.dense.len(), self.data.len());
        Ok(value)
    }

    /// Replaces `entity`'s component, returning the old value.
    pub fn replace(&mut self, entity: E, value: T) -> Result<T> {
        let slot = self
            .index_of(entity)
            .ok_or_else(|| Error::missing::<T, E>(entity))?;
        Ok(core::mem::replace(&mut self.data[slot], value))
    }

    /// Exchanges two dense slots, keeping the sparse array in sync.
    pub(crate) fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.dense.swap(a, b);
        self.data.swap(a, b);
        self.sparse[self.dense[a].index()] = a as u32;
        self.sparse[self.dense[b].index()] = b as u32;
    }

    /// Removes every component.
    pub(crate) fn clear(&mut self) {
        self.sparse.clear();
        self.dense.clear();
        self.data.clear();
    }

    /// Reserves room for `additional` more components.
    ///
    /// Only the dense arrays grow; the sparse array follows the
    /// largest entity index as components arrive.
    pub fn reserve(&mut self, additional: usize) {
        self.dense.reserve(additional);
        self.data.reserve(additional);
    }

    /// The packed entity handles, in dense order.
    #[inline]
    pub fn entities(&self) -> &[E] {
        &self.dense
    }

    /// The packed component values, in dense order.
    #[inline]
    pub fn components(&self) -> &[T] {
        &self.data
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (E, &T)> {
        self.dense.iter().copied().zip(self.data.iter())
    }

    pub fn iter_mut(&mut self) -> impl ExactSizeIterator<Item = (E, &mut T)> {
        self.dense.iter().copied().zip(self.data.iter_mut())
    }

    /// Raw pointer to the first component, for fetches that
    /// hand out disjoint `&mut T` while the storage is borrowed.
    #[inline]
    pub(crate) fn data_ptr(&mut self) -> *mut T {
        self.data.as_mut_ptr()
    }

    /// Checks the sparse/dense invariant. Test helper.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.dense.len(), self.data.len());
        for (slot, entity) in self.dense.iter().enumerate() {
            assert_eq!(self.sparse[entity.index()] as usize, slot);
        }
        let mapped: Vec<_> = self.sparse.iter().filter(|&&slot| slot != EMPTY).collect();
        assert_eq!(mapped.len(), self.dense.len());
        assert!(mapped.iter().all(|&&slot| (slot as usize) < self.dense.len()));
    }
}

/// Type-erased access to a `SparseSet`, used by the registry
/// for operations that do not need to know the component type.
pub(crate) trait ErasedStorage<E: EntityId>: Send + Sync {
    fn len(&self) -> usize;

    fn contains(&self, entity: E) -> bool;

    fn index_of(&self, entity: E) -> Option<usize>;

    fn entities(&self) -> &[E];

    fn swap(&mut self, a: usize, b: usize);

    /// Drops `entity`'s component if it has one.
    fn remove_entity(&mut self, entity: E) -> bool;

    fn clear(&mut self);

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<E: EntityId, T: Component> ErasedStorage<E> for SparseSet<E, T> {
    fn len(&self) -> usize {
        SparseSet::len(self)
    }

    fn contains(&self, entity: E) -> bool {
        SparseSet::contains(self, entity)
    }

    fn index_of(&self, entity: E) -> Option<usize> {
        SparseSet::index_of(self, entity)
    }

    fn entities(&self) -> &[E] {
        SparseSet::entities(self)
    }

    fn swap(&mut self, a: usize, b: usize) {
        SparseSet::swap(self, a, b)
    }

    fn remove_entity(&mut self, entity: E) -> bool {
        self.remove(entity).is_ok()
    }

    fn clear(&mut self) {
        SparseSet::clear(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
