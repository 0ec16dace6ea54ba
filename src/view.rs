use crate::entity::EntityId;
use crate::error::Result;
use crate::query::{Fetch, Query};
use crate::registry::Registry;
use core::slice;

/// Iterates every entity having all components named by `Q`.
///
/// Iteration walks the smallest storage involved and probes the
/// others, so no storage is reordered. The storages stay borrowed
/// while the view lives.
pub struct View<'a, E: EntityId, Q: Query<E>> {
    fetch: Q::Fetch<'a>,
}

impl<'a, E: EntityId, Q: Query<E>> View<'a, E, Q> {
    pub(crate) fn new(registry: &'a Registry<E>) -> Result<Self> {
        Ok(Self {
            fetch: Q::fetch(registry)?,
        })
    }

    /// Upper bound on the number of entities the view yields.
    pub fn size_hint(&self) -> usize {
        self.fetch.driver().len()
    }

    pub fn contains(&self, entity: E) -> bool {
        self.fetch.contains(entity)
    }

    /// Fetches the components of a single entity.
    pub fn get(&mut self, entity: E) -> Option<<Q::Fetch<'a> as Fetch<E>>::Item<'_>> {
        // Safety: `&mut self` rules out any other item borrowed from this view.
        unsafe { self.fetch.get(entity) }
    }

    pub fn iter(&mut self) -> ViewIter<'_, E, Q::Fetch<'a>> {
        ViewIter {
            fetch: &self.fetch,
            entities: self.fetch.driver().iter(),
        }
    }

    /// Calls `f` with every matching entity and its components.
    pub fn each<'v>(&'v mut self, mut f: impl FnMut(E, <Q::Fetch<'a> as Fetch<E>>::Item<'v>)) {
        for (entity, item) in self.iter() {
            f(entity, item);
        }
    }
}

impl<'v, 'a, E: EntityId, Q: Query<E>> IntoIterator for &'v mut View<'a, E, Q> {
    type Item = (E, <Q::Fetch<'a> as Fetch<E>>::Item<'v>);
    type IntoIter = ViewIter<'v, E, Q::Fetch<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a view.
pub struct ViewIter<'v, E, F> {
    fetch: &'v F,
    entities: slice::Iter<'v, E>,
}

impl<'v, E: EntityId, F: Fetch<E> + 'v> Iterator for ViewIter<'v, E, F> {
    type Item = (E, F::Item<'v>);

    fn next(&mut self) -> Option<Self::Item> {
        let fetch = self.fetch;
        for &entity in &mut self.entities {
            // Safety: the driver holds each entity once, so no two
            // items handed out by this iterator alias.
            if let Some(item) = unsafe { fetch.get(entity) } {
                return Some((entity, item));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.entities.len()))
    }
}
