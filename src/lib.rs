//! A cache entry with lazy time-based expiration
//!
//! This crate provides a `CacheEntry` that pairs a key and value with an
//! absolute time-to-live, a sliding idle timeout, or both. Expiration is
//! computed on demand from the entry's timestamps; nothing runs in the
//! background. Each entry also owns a reentrant lock that the surrounding
//! cache map can take to coordinate changes to that one key.

pub mod clock;
pub mod entry;
pub mod error;
pub mod lock;
pub mod policy;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use entry::{CacheEntry, CachedValue};
pub use error::EntryError;
pub use lock::{EntryLock, EntryLockGuard};
pub use policy::ExpirationPolicy;
