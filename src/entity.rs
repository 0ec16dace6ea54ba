use core::fmt::{self, Debug, Formatter};
use core::hash::Hash;

pub(crate) mod allocator;

pub use allocator::EntityAllocator;

/// An entity handle: an index packed together with a version.
///
/// The index identifies a slot in every sparse array; the version
/// distinguishes successive uses of the same slot, which avoids
/// the ABA problem. The packing width is chosen by picking the
/// implementing type, so storages are specialized per width.
pub trait EntityId: Copy + Eq + Ord + Hash + Debug + Send + Sync + 'static {
    /// The integer the handle is packed into.
    type Bits: Copy + Eq + Debug;

    /// Largest index this handle type can represent.
    const MAX_INDEX: usize;
    /// Largest version before it wraps back to 0.
    const MAX_VERSION: u32;

    /// Packs `index` and `version` into a handle.
    ///
    /// Bits above the width of either part are discarded.
    fn new(index: usize, version: u32) -> Self;

    fn index(self) -> usize;

    fn version(self) -> u32;

    fn to_bits(self) -> Self::Bits;

    fn from_bits(bits: Self::Bits) -> Self;

    /// The version a slot gets after being released with `version`.
    #[inline]
    fn next_version(version: u32) -> u32 {
        if version >= Self::MAX_VERSION {
            0
        } else {
            version + 1
        }
    }
}

macro_rules! entity_id {
    ($(#[$attr:meta])* $name:ident($bits:ty), index: $index_bits:expr, version: $version_bits:expr) => {
        $(#[$attr])*
        #[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name($bits);

        const _: () = assert!($index_bits + $version_bits == <$bits>::BITS);

        impl $name {
            const INDEX_MASK: $bits = ((1 as $bits) << $index_bits) - 1;
            const VERSION_MASK: $bits = <$bits>::MAX >> $index_bits;
        }

        impl EntityId for $name {
            type Bits = $bits;

            const MAX_INDEX: usize = Self::INDEX_MASK as usize;
            const MAX_VERSION: u32 = Self::VERSION_MASK as u32;

            #[inline]
            fn new(index: usize, version: u32) -> Self {
                Self(
                    ((version as $bits & Self::VERSION_MASK) << $index_bits)
                        | (index as $bits & Self::INDEX_MASK),
                )
            }

            #[inline]
            fn index(self) -> usize {
                (self.0 & Self::INDEX_MASK) as usize
            }

            #[inline]
            fn version(self) -> u32 {
                (self.0 >> $index_bits) as u32
            }

            #[inline]
            fn to_bits(self) -> $bits {
                self.0
            }

            #[inline]
            fn from_bits(bits: $bits) -> Self {
                Self(bits)
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                write!(f, "{}({}v{})", stringify!($name), self.index(), self.version())
            }
        }
    };
}

entity_id! {
    /// A 32-bit entity handle: 20 bits of index, 12 bits of version.
    Entity(u32), index: 20, version: 12
}

entity_id! {
    /// A 64-bit entity handle: 32 bits of index, 32 bits of version.
    Entity64(u64), index: 32, version: 32
}
