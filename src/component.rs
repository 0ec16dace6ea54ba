/// A type which can be used as a component.
///
/// Components can be any `Send + Sync + 'static` type;
/// the trait is implemented automatically.
pub trait Component: Send + Sync + 'static {}

impl<T> Component for T where T: Send + Sync + 'static {}

/// Dense index of a component type's storage inside one registry.
///
/// Ids are handed out in registration order and are only
/// meaningful for the registry that issued them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}
