//! Implements an `AtomicRefCell`

use crate::util::AtomicU32;
use core::cell::UnsafeCell;
use core::fmt::{self, Debug, Display, Formatter};
use core::ops::{Deref, DerefMut};
use core::sync::atomic::Ordering;

/// Error returned when an `AtomicRefCell`
/// is already mutably borrowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutablyBorrowed;

impl Display for MutablyBorrowed {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "value already mutably borrowed")
    }
}

#[cfg(not(feature = "no-std"))]
impl std::error::Error for MutablyBorrowed {}

/// Error returned when an `AtomicRefCell` has
/// existing borrows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImmutablyBorrowed;

impl Display for ImmutablyBorrowed {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "value already borrowed")
    }
}

#[cfg(not(feature = "no-std"))]
impl std::error::Error for ImmutablyBorrowed {}

/// Like `RefCell`, but atomic. Akin to a `RwLock`
/// which never blocks.
///
/// The registry wraps every component storage in one of these.
/// This means that you cannot have a mutable borrow of two
/// components of the same type at once, even if they belong
/// to different entities. Borrows of different component types
/// never interfere.
pub struct AtomicRefCell<T> {
    /// Set to `MUTABLE` if currently mutably borrowed;
    /// otherwise the number of current immutable borrows.
    flag: AtomicU32,
    value: UnsafeCell<T>,
}

// Safety: the flag hands out either one `&mut T` or any number
// of `&T`, never both, which is exactly what `RwLock` guarantees.
unsafe impl<T: Send + Sync> Sync for AtomicRefCell<T> {}

const NO_BORROWS: u32 = 0;
const MUTABLE: u32 = u32::MAX;

impl<T> AtomicRefCell<T> {
    /// Creates a new `AtomicRefCell` initialized with the given value.
    pub fn new(value: T) -> Self {
        Self {
            flag: AtomicU32::new(NO_BORROWS),
            value: UnsafeCell::new(value),
        }
    }

    /// Immutably borrows the value.
    ///
    /// # Panics
    /// Panics if the value is already borrowed mutably.
    /// If you wish to handle this gracefully, use `try_borrow()`.
    pub fn borrow(&self) -> AtomicRef<T> {
        self.try_borrow().unwrap_or_else(|e| {
            panic!(
                "failed to immutably borrow `AtomicRefCell` of type {}: {}",
                core::any::type_name::<T>(),
                e
            )
        })
    }

    /// Mutably borrows the value.
    ///
    /// # Panics
    /// Panics if the value has existing borrows.
    /// If you wish to handle this gracefully, use `try_borrow_mut()`.
    pub fn borrow_mut(&self) -> AtomicRefMut<T> {
        self.try_borrow_mut().unwrap_or_else(|e| {
            panic!(
                "failed to mutably borrow `AtomicRefCell` of type {}: {}",
                core::any::type_name::<T>(),
                e
            )
        })
    }

    /// Attempts to immutably borrow the value.
    ///
    /// Returns an error if the value is already borrowed
    /// mutably.
    pub fn try_borrow(&self) -> Result<AtomicRef<T>, MutablyBorrowed> {
        let mut current = self.flag.load(Ordering::Acquire);
        loop {
            // `MUTABLE - 1` readers would make the next one look like a writer.
            if current >= MUTABLE - 1 {
                return Err(MutablyBorrowed);
            }

            match self.flag.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        Ok(AtomicRef {
            // Safety: the flag now counts this borrow, so no
            // `AtomicRefMut` can exist until it is released.
            value: unsafe { &*self.value.get() },
            borrow: BorrowRef { flag: &self.flag },
        })
    }

    /// Attempts to mutably borrow the value.
    ///
    /// Returns an error if the value has one or more
    /// existing borrows.
    pub fn try_borrow_mut(&self) -> Result<AtomicRefMut<T>, ImmutablyBorrowed> {
        // If the old value is NO_BORROWS, then we have
        // unique access to the value.
        match self.flag.compare_exchange(
            NO_BORROWS,
            MUTABLE,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(AtomicRefMut {
                // Safety: the flag is `MUTABLE`, so this is the only
                // reference until the guard is dropped.
                value: unsafe { &mut *self.value.get() },
                borrow: BorrowRefMut { flag: &self.flag },
            }),
            Err(_) => Err(ImmutablyBorrowed),
        }
    }

    /// Returns a mutable reference to the value without
    /// touching the flag. Statically exclusive, so it cannot fail.
    pub fn get_mut(&mut self) -> &mut T {
        self.value.get_mut()
    }

    /// Consumes the cell, returning the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Default> Default for AtomicRefCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Debug> Debug for AtomicRefCell<T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self.try_borrow() {
            Ok(value) => f.debug_struct("AtomicRefCell").field("value", &*value).finish(),
            Err(_) => f
                .debug_struct("AtomicRefCell")
                .field("value", &"<borrowed>")
                .finish(),
        }
    }
}

struct BorrowRef<'a> {
    flag: &'a AtomicU32,
}

impl<'a> Drop for BorrowRef<'a> {
    fn drop(&mut self) {
        debug_assert_ne!(self.flag.load(Ordering::Acquire), MUTABLE);
        self.flag.fetch_sub(1, Ordering::Release);
    }
}

struct BorrowRefMut<'a> {
    flag: &'a AtomicU32,
}

impl<'a> Drop for BorrowRefMut<'a> {
    fn drop(&mut self) {
        // A mutable borrow is exclusive, so releasing
        // it leaves no borrows behind.
        debug_assert_eq!(self.flag.load(Ordering::Acquire), MUTABLE);
        self.flag.store(NO_BORROWS, Ordering::Release);
    }
}

/// RAII guard for an immutably borrowed value
/// from an `AtomicRefCell`.
pub struct AtomicRef<'a, T: ?Sized> {
    value: &'a T,
    borrow: BorrowRef<'a>,
}

impl<'a, T: ?Sized> AtomicRef<'a, T> {
    /// Projects the guard onto a part of the borrowed value,
    /// keeping the borrow alive.
    pub fn map<U: ?Sized>(orig: Self, f: impl FnOnce(&T) -> &U) -> AtomicRef<'a, U> {
        AtomicRef {
            value: f(orig.value),
            borrow: orig.borrow,
        }
    }
}

impl<'a, T: ?Sized> Deref for AtomicRef<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl<'a, T: ?Sized + Debug> Debug for AtomicRef<'a, T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Debug::fmt(self.value, f)
    }
}

/// RAII guard for a mutably borrowed value
/// from an `AtomicRefCell`.
pub struct AtomicRefMut<'a, T: ?Sized> {
    value: &'a mut T,
    borrow: BorrowRefMut<'a>,
}

impl<'a, T: ?Sized> AtomicRefMut<'a, T> {
    /// Projects the guard onto a part of the borrowed value,
    /// keeping the borrow alive.
    pub fn map<U: ?Sized>(orig: Self, f: impl FnOnce(&mut T) -> &mut U) -> AtomicRefMut<'a, U> {
        let AtomicRefMut { value, borrow } = orig;
        AtomicRefMut {
            value: f(value),
            borrow,
        }
    }
}

impl<'a, T: ?Sized> Deref for AtomicRefMut<'a, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value
    }
}

impl<'a, T: ?Sized> DerefMut for AtomicRefMut<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value
    }
}

impl<'a, T: ?Sized + Debug> Debug for AtomicRefMut<'a, T> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Debug::fmt(&*self.value, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_borrows_block_mutable() {
        let cell = AtomicRefCell::new(5u32);

        let a = cell.borrow();
        let b = cell.borrow();
        assert_eq!(*a + *b, 10);
        assert_eq!(cell.try_borrow_mut().err(), Some(ImmutablyBorrowed));

        drop(a);
        assert!(cell.try_borrow_mut().is_err());
        drop(b);

        *cell.borrow_mut() += 1;
        assert_eq!(*cell.borrow(), 6);
    }

    #[test]
    fn mutable_borrow_blocks_everything() {
        let cell = AtomicRefCell::new(vec![1, 2, 3]);

        let guard = cell.borrow_mut();
        assert_eq!(cell.try_borrow().err(), Some(MutablyBorrowed));
        assert!(cell.try_borrow_mut().is_err());
        drop(guard);

        assert_eq!(cell.borrow().len(), 3);
    }

    #[test]
    fn mapped_guards_keep_the_borrow() {
        let cell = AtomicRefCell::new((1u8, String::from("pos")));

        let name = AtomicRef::map(cell.borrow(), |(_, name)| name.as_str());
        assert_eq!(&*name, "pos");
        assert!(cell.try_borrow_mut().is_err());
        drop(name);

        let mut first = AtomicRefMut::map(cell.borrow_mut(), |(first, _)| first);
        *first = 7;
        assert!(cell.try_borrow().is_err());
        drop(first);

        assert_eq!(cell.borrow().0, 7);
    }

    #[test]
    #[should_panic]
    fn borrow_mutable_twice() {
        let cell = AtomicRefCell::new(0i32);

        let _guard = cell.borrow_mut();
        cell.borrow_mut();
    }
}
