//! User pointers: native payloads owned by the host.
//!
//! A user pointer pairs a boxed native payload with a [`Finalizer`]. The host
//! reclaims the pointer by dropping its last reference; at that point the
//! finalizer receives the payload. The payload is taken out of the cell before
//! the finalizer runs, so a pointer can never release its payload twice.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

/// A release function with a stable identity.
///
/// Finalizers are declared as `static` items and compared by address, which
/// makes the finalizer a type tag for the payload it releases.
pub struct Finalizer {
    /// Name used when printing the pointer and in logs
    pub name: &'static str,
    /// Receives the payload exactly once
    pub release: fn(Box<dyn Any>),
}

impl Finalizer {
    /// Identity comparison
    pub fn is(&'static self, other: &'static Finalizer) -> bool {
        std::ptr::eq(self, other)
    }
}

struct Cell {
    payload: RefCell<Option<Box<dyn Any>>>,
    finalizer: &'static Finalizer,
}

impl Drop for Cell {
    fn drop(&mut self) {
        if let Some(payload) = self.payload.get_mut().take() {
            (self.finalizer.release)(payload);
        }
    }
}

/// A reference-counted host handle to a native payload.
#[derive(Clone)]
pub struct UserPtr(Rc<Cell>);

impl std::fmt::Debug for UserPtr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#<user-ptr {}>", self.0.finalizer.name)
    }
}

/// Why a payload could not be borrowed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowError {
    /// The payload was already released
    Released,
    /// The payload is not of the requested type
    Mismatch,
    /// The payload is borrowed incompatibly by an operation in progress
    Busy,
}

impl UserPtr {
    pub(super) fn new(finalizer: &'static Finalizer, payload: Box<dyn Any>) -> Self {
        Self(Rc::new(Cell {
            payload: RefCell::new(Some(payload)),
            finalizer,
        }))
    }

    /// The finalizer registered for this pointer
    pub fn finalizer(&self) -> &'static Finalizer {
        self.0.finalizer
    }

    /// Whether both handles refer to the same pointer
    pub fn same(&self, other: &UserPtr) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Whether the payload has already been handed to the finalizer
    pub fn is_released(&self) -> bool {
        self.0.payload.try_borrow().map(|p| p.is_none()).unwrap_or(false)
    }

    /// Run the finalizer now instead of waiting for reclamation.
    ///
    /// Returns `false` when the payload was already released or is borrowed by
    /// an operation in progress; in both cases nothing is freed.
    pub fn release(&self) -> bool {
        let payload = match self.0.payload.try_borrow_mut() {
            Ok(mut slot) => slot.take(),
            Err(_) => return false,
        };
        match payload {
            Some(payload) => {
                (self.0.finalizer.release)(payload);
                true
            }
            None => false,
        }
    }

    /// Borrow the payload as `T`
    pub fn borrow<T: Any>(&self) -> Result<Ref<'_, T>, BorrowError> {
        let slot = self.0.payload.try_borrow().map_err(|_| BorrowError::Busy)?;
        match slot.as_ref() {
            None => return Err(BorrowError::Released),
            Some(payload) if !payload.is::<T>() => return Err(BorrowError::Mismatch),
            Some(_) => {}
        }
        Ref::filter_map(slot, |p| p.as_ref().and_then(|p| p.downcast_ref::<T>()))
            .map_err(|_| BorrowError::Mismatch)
    }

    /// Mutably borrow the payload as `T`
    pub fn borrow_mut<T: Any>(&self) -> Result<RefMut<'_, T>, BorrowError> {
        let slot = self.0.payload.try_borrow_mut().map_err(|_| BorrowError::Busy)?;
        match slot.as_ref() {
            None => return Err(BorrowError::Released),
            Some(payload) if !payload.is::<T>() => return Err(BorrowError::Mismatch),
            Some(_) => {}
        }
        RefMut::filter_map(slot, |p| p.as_mut().and_then(|p| p.downcast_mut::<T>()))
            .map_err(|_| BorrowError::Mismatch)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Finalizer;
    use std::any::Any;
    use std::cell::Cell;

    thread_local! {
        static RELEASED: Cell<usize> = const { Cell::new(0) };
    }

    fn count_release(payload: Box<dyn Any>) {
        drop(payload);
        RELEASED.with(|n| n.set(n.get() + 1));
    }

    /// Finalizer that counts how often it ran on the current thread
    pub(crate) static COUNTING: Finalizer = Finalizer {
        name: "counting",
        release: count_release,
    };

    pub(crate) fn released() -> usize {
        RELEASED.with(Cell::get)
    }
}
