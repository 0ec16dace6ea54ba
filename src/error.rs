use crate::entity::EntityId;
use core::any::type_name;

/// Result type used throughout the crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Precondition violations reported by the registry and its storages.
///
/// Operations check their preconditions before modifying any
/// storage, so a failed call leaves every component where it was.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("entity {index}v{version} is not alive")]
    InvalidEntity { index: usize, version: u32 },
    #[error("entity {index}v{version} already has a `{component}` component")]
    DuplicateComponent {
        component: &'static str,
        index: usize,
        version: u32,
    },
    #[error("entity {index}v{version} has no `{component}` component")]
    MissingComponent {
        component: &'static str,
        index: usize,
        version: u32,
    },
    #[error("`{component}` is already owned by a group that neither nests nor is nested in this one")]
    GroupConflict { component: &'static str },
    #[error("group signature is malformed around `{component}`")]
    MalformedGroup { component: &'static str },
    #[error("entity index space exhausted (maximum index is {max})")]
    IndexSpaceExhausted { max: usize },
    #[error("component `{component}` was never registered")]
    UnregisteredComponent { component: &'static str },
    #[error("storage of `{component}` is already borrowed")]
    BorrowConflict { component: &'static str },
}

impl Error {
    pub(crate) fn invalid_entity<E: EntityId>(entity: E) -> Self {
        Error::InvalidEntity {
            index: entity.index(),
            version: entity.version(),
        }
    }

    pub(crate) fn duplicate<T, E: EntityId>(entity: E) -> Self {
        Error::DuplicateComponent {
            component: type_name::<T>(),
            index: entity.index(),
            version: entity.version(),
        }
    }

    pub(crate) fn missing<T, E: EntityId>(entity: E) -> Self {
        Error::MissingComponent {
            component: type_name::<T>(),
            index: entity.index(),
            version: entity.version(),
        }
    }

    pub(crate) fn unregistered<T>() -> Self {
        Error::UnregisteredComponent {
            component: type_name::<T>(),
        }
    }

    pub(crate) fn borrow_conflict<T>() -> Self {
        Error::BorrowConflict {
            component: type_name::<T>(),
        }
    }
}
