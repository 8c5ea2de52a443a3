//! # Write-once publication
//!
//! Discovery results are produced on the boot processor and then read by
//! every processor. [`BootOnce`] holds such a value: it is written once and
//! only handed out as a shared reference after the write has completed.

use core::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{AtomicU8, Ordering},
};

const EMPTY: u8 = 0;
const WRITING: u8 = 1;
const PUBLISHED: u8 = 2;

pub struct BootOnce<T> {
    state: AtomicU8,
    value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Default for BootOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> BootOnce<T> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(EMPTY),
            value: UnsafeCell::new(MaybeUninit::uninit()),
        }
    }

    /// The published value, if any.
    #[inline]
    #[must_use]
    pub fn get(&self) -> Option<&T> {
        if self.is_published() {
            // SAFETY: PUBLISHED is only stored after the write.
            Some(unsafe { (*self.value.get()).assume_init_ref() })
        } else {
            None
        }
    }

    #[inline]
    #[must_use]
    pub fn is_published(&self) -> bool {
        self.state.load(Ordering::Acquire) == PUBLISHED
    }

    /// Store `value` unless something was published (or is being
    /// published) already, in which case `value` is handed back.
    ///
    /// # Errors
    /// The rejected value on a second publication.
    pub fn publish(&self, value: T) -> Result<&T, T> {
        if self
            .state
            .compare_exchange(EMPTY, WRITING, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return Err(value);
        }

        // SAFETY: WRITING excludes every other writer and all readers.
        let stored = unsafe { (*self.value.get()).write(value) as *const T };
        self.state.store(PUBLISHED, Ordering::Release);
        // SAFETY: just written, and never written again.
        Ok(unsafe { &*stored })
    }
}

impl<T> Drop for BootOnce<T> {
    fn drop(&mut self) {
        if *self.state.get_mut() == PUBLISHED {
            // SAFETY: initialized, and `&mut self` rules out readers.
            unsafe { self.value.get_mut().assume_init_drop() };
        }
    }
}

// Safety: the value is moved in by one writer and then only shared.
unsafe impl<T: Send + Sync> Sync for BootOnce<T> {}
unsafe impl<T: Send> Send for BootOnce<T> {}
