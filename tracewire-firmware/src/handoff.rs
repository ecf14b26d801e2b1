//! Exclusive loans from core0 to a core1 task
//!
//! Core0 owns every resource. Before launching a task it lends the pieces
//! the task needs by publishing a pointer; core1 picks the pointer up once
//! at task entry. Core0 revokes the loan after it has reset core1, at which
//! point no reference derived from it can still be alive.

use core::ptr;

use portable_atomic::{AtomicPtr, Ordering};

/// One lendable slot
pub struct Lent<T> {
    ptr: AtomicPtr<T>,
}

impl<T> Lent<T> {
    pub const fn new() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Publish `value` for the next task
    ///
    /// The caller must not touch `value` again until [`Lent::revoke`] has
    /// run with core1 stopped.
    pub fn lend(&self, value: &mut T) {
        self.ptr.store(value, Ordering::Release);
    }

    pub fn revoke(&self) {
        self.ptr.store(ptr::null_mut(), Ordering::Release);
    }

    /// Worker side: the lent value
    ///
    /// # Safety
    ///
    /// At most one caller may hold the returned reference, and only between
    /// a `lend` and the matching `revoke`.
    pub unsafe fn get_mut(&self) -> Option<&'static mut T> {
        // SAFETY: the pointer came from a live `&mut T` whose owner has
        // promised not to use it until revoke.
        unsafe { self.ptr.load(Ordering::Acquire).as_mut() }
    }

    /// Supervisor side: read the lent value while the worker is parked in a
    /// persist handoff
    ///
    /// # Safety
    ///
    /// The worker must not be writing through its reference for as long as
    /// the returned reference lives.
    pub unsafe fn get(&self) -> Option<&T> {
        // SAFETY: see above.
        unsafe { self.ptr.load(Ordering::Acquire).as_ref() }
    }
}
