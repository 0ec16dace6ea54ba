use crate::component::Component;
use crate::entity::EntityId;
use crate::error::{Error, Result};
use crate::registry::Registry;
use core::any::{type_name, TypeId};

/// A set of components attached to an entity in one call.
///
/// Implemented for tuples of up to eight distinct component types.
pub trait Bundle: Sized {
    /// Attaches every component to `entity`, or none of them if
    /// the entity is not alive, already has one of the types, or
    /// the tuple names a type twice.
    fn insert_into<E: EntityId>(self, registry: &mut Registry<E>, entity: E) -> Result<()>;
}

macro_rules! impl_bundle {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> Bundle for ($($ty,)+) {
            #[allow(non_snake_case)]
            fn insert_into<E: EntityId>(self, registry: &mut Registry<E>, entity: E) -> Result<()> {
                if !registry.is_alive(entity) {
                    return Err(Error::invalid_entity(entity));
                }

                let types = [$(TypeId::of::<$ty>()),+];
                let names = [$(type_name::<$ty>()),+];
                for (i, ty) in types.iter().enumerate() {
                    if types[..i].contains(ty) {
                        return Err(Error::DuplicateComponent {
                            component: names[i],
                            index: entity.index(),
                            version: entity.version(),
                        });
                    }
                }
                $(
                    if registry.contains::<$ty>(entity) {
                        return Err(Error::duplicate::<$ty, E>(entity));
                    }
                )+

                let ($($ty,)+) = self;
                $(registry.emplace(entity, $ty)?;)+
                Ok(())
            }
        }
    }
}

recursive_macro_call_on_tuple!(impl_bundle, B0, B1, B2, B3, B4, B5, B6, B7);
