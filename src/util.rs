//! Re-exports types depending on crate enabled features.

#[cfg(feature = "no-std")]
type BaseHashMap<K, V, S> = hashbrown::HashMap<K, V, S>;
#[cfg(not(feature = "no-std"))]
type BaseHashMap<K, V, S> = std::collections::HashMap<K, V, S>;

#[cfg(feature = "fast-hasher")]
pub type HashMap<K, V> =
    BaseHashMap<K, V, core::hash::BuildHasherDefault<rustc_hash::FxHasher>>;
#[cfg(not(feature = "fast-hasher"))]
pub type HashMap<K, V> = BaseHashMap<K, V, std::collections::hash_map::RandomState>;

#[cfg(not(loom))]
pub use core::sync::atomic::AtomicU32;

#[cfg(loom)]
pub use loom::sync::atomic::AtomicU32;

/// Invokes `$m` on every suffix of the given identifier list,
/// e.g. to implement a trait for tuples of every arity up to eight.
macro_rules! recursive_macro_call_on_tuple {
    ($m: ident, $ty: ident) => {
        $m!{$ty}
    };
    ($m: ident, $ty: ident, $($tt: ident),*) => {
        $m!{$ty, $($tt),*}
        recursive_macro_call_on_tuple!{$m, $($tt),*}
    };
}
