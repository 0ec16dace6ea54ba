//! A sparse-set entity component system.
//!
//! Entities are versioned handles; each component type lives in its
//! own `SparseSet`. Views iterate the intersection of several storages,
//! and owning groups keep their matching entities packed at the front
//! of the storages they own so iteration needs no lookups.

#![cfg_attr(all(feature = "no-std", not(test)), no_std)]

extern crate alloc;

#[macro_use]
mod util;

pub mod borrow;
mod bundle;
mod component;
mod entity;
mod error;
mod group;
pub mod query;
mod registry;
#[cfg(not(feature = "no-std"))]
pub mod stats;
mod storage;
mod view;

pub use borrow::{AtomicRef, AtomicRefCell, AtomicRefMut};
pub use bundle::Bundle;
pub use component::{Component, ComponentId};
pub use entity::{Entity, Entity64, EntityAllocator, EntityId};
pub use error::{Error, Result};
pub use group::{Group, GroupId, GroupIter};
pub use query::Query;
pub use registry::Registry;
pub use storage::SparseSet;
pub use view::{View, ViewIter};
