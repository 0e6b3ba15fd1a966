//! The per-entry lock handed to the owning container.
//!
//! An [`EntryLock`] protects nothing inside the entry. It exists so that a
//! container can serialize its own structural changes on one key, e.g.
//! "remove if still expired" or "swap in a fresh entry", without taking a
//! lock over the whole map. Timestamps inside the entry are atomics and are
//! read and written without it.

use std::fmt;
use std::time::Duration;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

/// A reentrant lock owned by exactly one cache entry.
///
/// The type is neither `Clone` nor `Copy`, so two entries cannot end up
/// sharing one.
#[derive(Default)]
pub struct EntryLock {
    inner: ReentrantMutex<()>,
}

/// Held access to an [`EntryLock`]. Dropping it releases the lock.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct EntryLockGuard<'a> {
    _guard: ReentrantMutexGuard<'a, ()>,
}

impl EntryLock {
    /// Creates an unlocked lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blocks until the lock is held by the current thread.
    ///
    /// A thread that already holds the lock gets it again immediately.
    pub fn acquire(&self) -> EntryLockGuard<'_> {
        EntryLockGuard {
            _guard: self.inner.lock(),
        }
    }

    /// Takes the lock if it is free or already held by this thread.
    pub fn try_acquire(&self) -> Option<EntryLockGuard<'_>> {
        self.inner
            .try_lock()
            .map(|guard| EntryLockGuard { _guard: guard })
    }

    /// Waits at most `timeout` for the lock.
    pub fn try_acquire_for(&self, timeout: Duration) -> Option<EntryLockGuard<'_>> {
        self.inner
            .try_lock_for(timeout)
            .map(|guard| EntryLockGuard { _guard: guard })
    }

    /// Runs `f` while holding the lock.
    pub fn with<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.acquire();
        f()
    }

    /// Whether any thread currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Whether the current thread holds the lock.
    pub fn is_owned_by_current_thread(&self) -> bool {
        self.inner.is_owned_by_current_thread()
    }

    /// Whether `a` and `b` are the same lock instance.
    pub fn same_lock(a: &EntryLock, b: &EntryLock) -> bool {
        std::ptr::eq(a, b)
    }
}

impl fmt::Debug for EntryLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;

    #[test]
    fn test_reentrant_on_same_thread() {
        let lock = EntryLock::new();
        let outer = lock.acquire();
        let inner = lock.try_acquire();

        assert!(inner.is_some());
        assert!(lock.is_owned_by_current_thread());

        drop(inner);
        assert!(lock.is_locked());
        drop(outer);
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_excludes_other_threads() {
        let lock = Arc::new(EntryLock::new());
        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                let _guard = lock.acquire();
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };

        held_rx.recv().unwrap();
        assert!(lock.try_acquire().is_none());
        assert!(lock.try_acquire_for(Duration::from_millis(20)).is_none());
        assert!(!lock.is_owned_by_current_thread());

        release_tx.send(()).unwrap();
        holder.join().unwrap();
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_with_releases_on_panic() {
        let lock = EntryLock::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            lock.with(|| panic!("boom"));
        }));

        assert!(result.is_err());
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_with_returns_closure_value() {
        let lock = EntryLock::new();
        let value = lock.with(|| {
            assert!(lock.is_owned_by_current_thread());
            7
        });
        assert_eq!(value, 7);
    }
}
