use crate::entity::EntityId;
use crate::error::{Error, Result};
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::marker::PhantomData;

#[derive(Debug, Clone, Copy)]
struct Slot {
    /// Version of the live entity in this slot, or the
    /// version the next entity using it will receive.
    version: u32,
    alive: bool,
}

/// Handles allocation of entity handles for a registry.
///
/// Indices are handed out sequentially and recycled in FIFO order;
/// releasing an index bumps its version so every handle issued
/// before the release stops matching.
#[derive(Debug, Clone)]
pub struct EntityAllocator<E> {
    /// One slot per index ever issued.
    slots: Vec<Slot>,
    /// The set of free indices. Once an entity is destroyed
    /// its index is queued here and reused by a later `create`.
    free: VecDeque<usize>,
    marker: PhantomData<E>,
}

impl<E> Default for EntityAllocator<E> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: VecDeque::new(),
            marker: PhantomData,
        }
    }
}

impl<E: EntityId> EntityAllocator<E> {
    /// Creates a new, empty `EntityAllocator`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a new entity handle.
    ///
    /// Returns `IndexSpaceExhausted` once every index of `E` is in use.
    pub fn create(&mut self) -> Result<E> {
        if let Some(index) = self.free.pop_front() {
            let slot = &mut self.slots[index];
            debug_assert!(!slot.alive);
            slot.alive = true;
            return Ok(E::new(index, slot.version));
        }

        let index = self.slots.len();
        if index > E::MAX_INDEX {
            return Err(Error::IndexSpaceExhausted { max: E::MAX_INDEX });
        }
        self.slots.push(Slot {
            version: 0,
            alive: true,
        });
        Ok(E::new(index, 0))
    }

    /// Releases an entity handle, making it and every copy of it stale.
    pub fn destroy(&mut self, entity: E) -> Result<()> {
        if !self.is_alive(entity) {
            return Err(Error::invalid_entity(entity));
        }

        let index = entity.index();
        let slot = &mut self.slots[index];
        slot.version = E::next_version(slot.version);
        slot.alive = false;
        self.free.push_back(index);
        Ok(())
    }

    /// Determines whether `entity` refers to a live entity.
    #[inline]
    pub fn is_alive(&self, entity: E) -> bool {
        match self.slots.get(entity.index()) {
            Some(slot) => slot.alive && slot.version == entity.version(),
            None => false,
        }
    }

    /// Releases every live entity. Indices are reused from 0 upwards
    /// afterwards, each with a bumped version.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.alive {
                slot.version = E::next_version(slot.version);
                slot.alive = false;
            }
            self.free.push_back(index);
        }
    }

    /// Returns the number of live entities.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over the live entities in index order.
    pub fn iter(&self) -> impl Iterator<Item = E> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, slot)| E::new(index, slot.version))
    }
}
