//! Owning groups.
//!
//! A group keeps every entity matching its signature packed at the
//! front of each storage it owns, at the same slot in each of them.
//! Iterating a group is then a walk over `[0, len)` without any
//! membership test for owned components.
//!
//! The registry keeps one `Groups` table. Each storage lists the
//! groups whose signature mentions it, ordered from least to most
//! restrictive; additions notify in that order and removals in
//! reverse, which keeps nested prefixes nested.

use crate::component::ComponentId;
use crate::entity::EntityId;
use crate::error::{Error, Result};
use crate::query::{Fetch, Query};
use crate::registry::{Pool, Registry};
use alloc::vec::Vec;

/// Identifies a declared group inside its registry.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

struct GroupData {
    /// Sorted.
    owned: Vec<ComponentId>,
    /// Sorted.
    get: Vec<ComponentId>,
    /// Number of matching entities, i.e. the length of the
    /// packed prefix in every owned storage.
    len: usize,
}

impl GroupData {
    fn signature(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.owned.iter().chain(&self.get).copied()
    }

    fn mentions(&self, component: ComponentId) -> bool {
        self.owned.binary_search(&component).is_ok() || self.get.binary_search(&component).is_ok()
    }

    /// Groups sharing a storage are ordered by this key.
    fn restrictiveness(&self) -> (usize, usize) {
        (self.owned.len() + self.get.len(), self.owned.len())
    }

    /// Whether every entity matching `self` also matches `other`
    /// and `other` reorders every storage `self` reorders.
    fn is_nested_in(&self, other: &GroupData) -> bool {
        self.owned
            .iter()
            .all(|c| other.owned.binary_search(c).is_ok())
            && self.get.iter().all(|&c| other.mentions(c))
    }

    fn matches<E: EntityId>(&self, pools: &mut [Pool<E>], entity: E) -> bool {
        self.signature()
            .all(|c| pools[c.0].storage.get_mut().contains(entity))
    }

    /// Moves `entity` into the prefix if it now matches.
    fn enter<E: EntityId>(&mut self, pools: &mut [Pool<E>], entity: E) {
        if !self.matches(pools, entity) {
            return;
        }
        match pools[self.owned[0].0].storage.get_mut().index_of(entity) {
            Some(slot) if slot >= self.len => {}
            _ => return,
        }

        for &c in &self.owned {
            let storage = pools[c.0].storage.get_mut();
            if let Some(slot) = storage.index_of(entity) {
                storage.swap(slot, self.len);
            }
        }
        self.len += 1;
    }

    /// Moves `entity` just past the prefix if it is inside it.
    fn leave<E: EntityId>(&mut self, pools: &mut [Pool<E>], entity: E) {
        match pools[self.owned[0].0].storage.get_mut().index_of(entity) {
            Some(slot) if slot < self.len => {}
            _ => return,
        }

        self.len -= 1;
        for &c in &self.owned {
            let storage = pools[c.0].storage.get_mut();
            if let Some(slot) = storage.index_of(entity) {
                storage.swap(slot, self.len);
            }
        }
    }

    /// Partitions the owned storages from scratch.
    ///
    /// Walking the lead storage in ascending slot order leaves the
    /// prefixes of more restrictive nested groups in place: their
    /// members are met first and swap onto themselves.
    fn arrange<E: EntityId>(&mut self, pools: &mut [Pool<E>]) {
        let lead = self.owned[0].0;
        let count = pools[lead].storage.get_mut().len();
        for slot in 0..count {
            let entity = pools[lead].storage.get_mut().entities()[slot];
            self.enter(pools, entity);
        }
    }
}

/// Ownership table of every group declared on a registry.
#[derive(Default)]
pub(crate) struct Groups {
    data: Vec<GroupData>,
}

impl Groups {
    pub(crate) fn len_of(&self, id: GroupId) -> usize {
        self.data[id.0].len
    }

    /// Declares the group owning `owned` and observing `get`, or
    /// returns the existing group with exactly that signature.
    pub(crate) fn declare<E: EntityId>(
        &mut self,
        pools: &mut [Pool<E>],
        mut owned: Vec<ComponentId>,
        mut get: Vec<ComponentId>,
    ) -> Result<GroupId> {
        if owned.is_empty() {
            return Err(Error::MalformedGroup { component: "()" });
        }
        owned.sort_unstable();
        get.sort_unstable();
        if let Some(c) = first_duplicate(&owned)
            .or_else(|| first_duplicate(&get))
            .or_else(|| get.iter().copied().find(|c| owned.binary_search(c).is_ok()))
        {
            return Err(Error::MalformedGroup {
                component: pools[c.0].name,
            });
        }

        let candidate = GroupData { owned, get, len: 0 };

        if let Some(existing) = self
            .data
            .iter()
            .position(|g| g.owned == candidate.owned && g.get == candidate.get)
        {
            log::trace!("reusing group {}", existing);
            return Ok(GroupId(existing));
        }

        for group in &self.data {
            let shared = group
                .owned
                .iter()
                .find(|c| candidate.owned.binary_search(c).is_ok());
            if let Some(shared) = shared {
                if !(group.is_nested_in(&candidate) || candidate.is_nested_in(group)) {
                    return Err(Error::GroupConflict {
                        component: pools[shared.0].name,
                    });
                }
            }
        }

        let id = GroupId(self.data.len());
        let key = candidate.restrictiveness();
        for c in candidate.signature() {
            let listed = &mut pools[c.0].groups;
            let at = listed.partition_point(|g| self.data[g.0].restrictiveness() <= key);
            listed.insert(at, id);
        }

        self.data.push(candidate);
        let group = &mut self.data[id.0];
        group.arrange(pools);

        log::debug!(
            "declared group {} owning {:?}, getting {:?}, with {} entities",
            id.0,
            names(pools, &group.owned),
            names(pools, &group.get),
            group.len
        );
        Ok(id)
    }

    /// Called after `entity` received component `component`.
    pub(crate) fn on_construct<E: EntityId>(
        &mut self,
        pools: &mut [Pool<E>],
        component: ComponentId,
        entity: E,
    ) {
        for i in 0..pools[component.0].groups.len() {
            let id = pools[component.0].groups[i];
            self.data[id.0].enter(pools, entity);
        }
    }

    /// Called before `entity` loses component `component`.
    pub(crate) fn on_destroy<E: EntityId>(
        &mut self,
        pools: &mut [Pool<E>],
        component: ComponentId,
        entity: E,
    ) {
        for i in (0..pools[component.0].groups.len()).rev() {
            let id = pools[component.0].groups[i];
            self.data[id.0].leave(pools, entity);
        }
    }

    /// Called when a storage referenced by `affected` is emptied.
    pub(crate) fn on_clear(&mut self, affected: &[GroupId]) {
        for id in affected {
            self.data[id.0].len = 0;
        }
    }

    /// Empties every group.
    pub(crate) fn reset(&mut self) {
        for group in &mut self.data {
            group.len = 0;
        }
    }
}

fn first_duplicate(sorted: &[ComponentId]) -> Option<ComponentId> {
    sorted.windows(2).find(|w| w[0] == w[1]).map(|w| w[0])
}

fn names<E: EntityId>(pools: &[Pool<E>], ids: &[ComponentId]) -> Vec<&'static str> {
    ids.iter().map(|c| pools[c.0].name).collect()
}

/// A borrowed, declared group.
///
/// `O` lists the owned components and `G` the observed ones, each as
/// `&T` or `&mut T`. The storages stay borrowed while the group lives.
pub struct Group<'a, E: EntityId, O: Query<E>, G: Query<E> = ()> {
    owned: O::Fetch<'a>,
    get: G::Fetch<'a>,
    id: GroupId,
    len: usize,
}

impl<'a, E: EntityId, O: Query<E>, G: Query<E>> Group<'a, E, O, G> {
    pub(crate) fn new(registry: &'a Registry<E>, id: GroupId) -> Result<Self> {
        Ok(Self {
            owned: O::fetch(registry)?,
            get: G::fetch(registry)?,
            id,
            len: registry.groups.len_of(id),
        })
    }

    /// The group's id. Declaring the same signature again yields the same id.
    pub fn id(&self) -> GroupId {
        self.id
    }

    /// Number of entities in the group.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The group's entities, in iteration order.
    pub fn entities(&self) -> &[E] {
        &self.owned.driver()[..self.len]
    }

    pub fn contains(&self, entity: E) -> bool {
        self.owned.contains(entity) && self.get.contains(entity)
    }

    /// Fetches the components of a single member.
    #[allow(clippy::type_complexity)]
    pub fn get(
        &mut self,
        entity: E,
    ) -> Option<(
        <O::Fetch<'a> as Fetch<E>>::Item<'_>,
        <G::Fetch<'a> as Fetch<E>>::Item<'_>,
    )> {
        // Safety: `&mut self` rules out any other item borrowed from this group.
        unsafe { Some((self.owned.get(entity)?, self.get.get(entity)?)) }
    }

    pub fn iter(&mut self) -> GroupIter<'_, E, O::Fetch<'a>, G::Fetch<'a>> {
        GroupIter {
            owned: &self.owned,
            get: &self.get,
            entities: &self.owned.driver()[..self.len],
            slot: 0,
        }
    }

    /// Calls `f` with every member and its components.
    pub fn each<'v>(
        &'v mut self,
        mut f: impl FnMut(
            E,
            <O::Fetch<'a> as Fetch<E>>::Item<'v>,
            <G::Fetch<'a> as Fetch<E>>::Item<'v>,
        ),
    ) {
        for (entity, owned, get) in self.iter() {
            f(entity, owned, get);
        }
    }
}

impl<'v, 'a, E: EntityId, O: Query<E>, G: Query<E>> IntoIterator for &'v mut Group<'a, E, O, G> {
    type Item = (
        E,
        <O::Fetch<'a> as Fetch<E>>::Item<'v>,
        <G::Fetch<'a> as Fetch<E>>::Item<'v>,
    );
    type IntoIter = GroupIter<'v, E, O::Fetch<'a>, G::Fetch<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a group's members.
pub struct GroupIter<'v, E, O, G> {
    owned: &'v O,
    get: &'v G,
    entities: &'v [E],
    slot: usize,
}

impl<'v, E: EntityId, O: Fetch<E> + 'v, G: Fetch<E> + 'v> Iterator for GroupIter<'v, E, O, G> {
    type Item = (E, O::Item<'v>, G::Item<'v>);

    fn next(&mut self) -> Option<Self::Item> {
        let (owned, get) = (self.owned, self.get);
        while let Some(&entity) = self.entities.get(self.slot) {
            let slot = self.slot;
            self.slot += 1;
            // Safety: each slot of the prefix holds a distinct entity
            // and is visited once, so no two items alias.
            unsafe {
                if let Some(observed) = get.get(entity) {
                    return Some((entity, owned.get_at(slot), observed));
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entities.len() - self.slot))
    }
}
