use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::trace;

use crate::clock::{Clock, SystemClock};
use crate::error::EntryError;
use crate::lock::EntryLock;
use crate::policy::ExpirationPolicy;

/// What an owning container needs from a cached value.
///
/// Expiration is never evaluated in the background: implementors answer
/// queries from their stored state and the current time, and the caller
/// decides what to do with an expired value.
pub trait CachedValue<K, V> {
    /// Whether a configured boundary has passed. Does not count as an access.
    fn is_expired(&self) -> bool;

    /// Earliest instant, in epoch milliseconds, at which the value could be
    /// expired if it is not read again. `None` means never.
    fn expire_time(&self) -> Option<u64>;

    /// Returns the key the value is stored under.
    fn key(&self) -> &K;

    /// Returns the value and counts as an access for the idle timeout.
    fn value(&self) -> &V;

    /// The lock for the container's per-key coordination.
    fn lock(&self) -> &EntryLock;
}

/// Timestamps kept only for entries that can expire.
#[derive(Debug)]
struct Tracking {
    created_at: u64,
    last_access: AtomicU64,
}

/// A key/value pair with a TTL, an idle timeout and its own lock.
///
/// The TTL counts from creation and is never extended. The idle timeout
/// counts from the last call to [`value`](CacheEntry::value). Entries with
/// neither never read the clock.
///
/// The last-access time is an atomic written without locking, so readers on
/// many threads can share one entry. Under contention a refresh may land a
/// little early or late, which only shifts the idle boundary accordingly.
/// The clock is assumed to move forward. If it steps backwards, an entry can
/// look fresh for longer than configured and [`expire_time`](CacheEntry::expire_time)
/// can lie in the past.
pub struct CacheEntry<K, V, C = SystemClock> {
    key: K,
    value: V,
    policy: ExpirationPolicy,
    tracking: Option<Tracking>,
    lock: EntryLock,
    clock: C,
}

impl<K, V> CacheEntry<K, V, SystemClock> {
    /// Creates an entry on the system clock.
    ///
    /// Zero disables the matching boundary. Fails if a duration does not
    /// fit the millisecond range of [`ExpirationPolicy`].
    pub fn new(key: K, value: V, ttl: Duration, max_idle: Duration) -> Result<Self, EntryError> {
        let policy = ExpirationPolicy::new(ttl, max_idle)?;
        Ok(Self::with_policy(key, value, policy))
    }

    /// Creates an entry on the system clock from an already validated policy.
    pub fn with_policy(key: K, value: V, policy: ExpirationPolicy) -> Self {
        Self::with_clock(key, value, policy, SystemClock)
    }

    /// Creates an entry that never expires.
    pub fn permanent(key: K, value: V) -> Self {
        Self::with_policy(key, value, ExpirationPolicy::permanent())
    }
}

impl<K, V, C: Clock> CacheEntry<K, V, C> {
    /// Creates an entry that reads time from `clock`.
    pub fn with_clock(key: K, value: V, policy: ExpirationPolicy, clock: C) -> Self {
        let tracking = if policy.is_permanent() {
            None
        } else {
            let now = clock.now_millis();
            trace!(
                ttl_ms = policy.ttl_millis(),
                max_idle_ms = policy.max_idle_millis(),
                created_at = now,
                "tracking expiration for new cache entry"
            );
            Some(Tracking {
                created_at: now,
                last_access: AtomicU64::new(now),
            })
        };

        Self {
            key,
            value,
            policy,
            tracking,
            lock: EntryLock::new(),
            clock,
        }
    }

    /// Whether the TTL or idle boundary lies strictly before now.
    ///
    /// An entry is still valid at the exact millisecond of its boundary.
    /// Checking does not refresh the idle timeout.
    pub fn is_expired(&self) -> bool {
        match &self.tracking {
            None => false,
            Some(tracking) => self.tracking_expired(tracking, self.clock.now_millis()),
        }
    }

    /// [`is_expired`](Self::is_expired) against a caller-supplied time, for
    /// sweeps that read the clock once for many entries.
    pub fn is_expired_at(&self, now: u64) -> bool {
        match &self.tracking {
            None => false,
            Some(tracking) => self.tracking_expired(tracking, now),
        }
    }

    fn tracking_expired(&self, tracking: &Tracking, now: u64) -> bool {
        let ttl = self.policy.ttl_millis();
        if ttl != 0 && tracking.created_at.saturating_add(ttl) < now {
            trace!(
                created_at = tracking.created_at,
                ttl_ms = ttl,
                now,
                "cache entry expired by ttl"
            );
            return true;
        }

        let max_idle = self.policy.max_idle_millis();
        if max_idle != 0 {
            let last_access = tracking.last_access.load(Ordering::Relaxed);
            if last_access.saturating_add(max_idle) < now {
                trace!(
                    last_access,
                    max_idle_ms = max_idle,
                    now,
                    "cache entry expired by idle timeout"
                );
                return true;
            }
        }

        false
    }

    /// The earliest configured boundary in epoch milliseconds, or `None`
    /// for a permanent entry.
    ///
    /// Advisory: a read before that instant pushes the idle boundary out.
    pub fn expire_time(&self) -> Option<u64> {
        let tracking = self.tracking.as_ref()?;
        let ttl = self.policy.ttl_millis();
        let max_idle = self.policy.max_idle_millis();

        let ttl_boundary = (ttl != 0).then(|| tracking.created_at.saturating_add(ttl));
        let idle_boundary = (max_idle != 0).then(|| {
            tracking
                .last_access
                .load(Ordering::Relaxed)
                .saturating_add(max_idle)
        });

        match (ttl_boundary, idle_boundary) {
            (Some(ttl), Some(idle)) => Some(ttl.min(idle)),
            (ttl, idle) => ttl.or(idle),
        }
    }

    /// Returns the entry's key.
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Returns the value, first moving the last-access time to now.
    ///
    /// The refresh happens even when the entry has already expired; callers
    /// check [`is_expired`](Self::is_expired) themselves. It never moves the
    /// last-access time backwards.
    pub fn value(&self) -> &V {
        if let Some(tracking) = &self.tracking {
            tracking
                .last_access
                .fetch_max(self.clock.now_millis(), Ordering::Relaxed);
        }
        &self.value
    }

    /// Returns the value without counting as an access.
    pub fn peek_value(&self) -> &V {
        &self.value
    }

    /// The lock reserved for the owning container.
    ///
    /// The entry never takes it itself, and it does not guard the entry's
    /// timestamps.
    pub fn lock(&self) -> &EntryLock {
        &self.lock
    }

    /// Returns the expiration policy the entry was built with.
    pub fn policy(&self) -> ExpirationPolicy {
        self.policy
    }

    /// Returns the time-to-live; zero when disabled.
    pub fn ttl(&self) -> Duration {
        self.policy.ttl()
    }

    /// Returns the idle timeout; zero when disabled.
    pub fn max_idle(&self) -> Duration {
        self.policy.max_idle()
    }

    /// Whether the entry can never expire.
    pub fn is_permanent(&self) -> bool {
        self.tracking.is_none()
    }

    /// Creation time in epoch milliseconds; `None` for permanent entries.
    pub fn creation_time(&self) -> Option<u64> {
        self.tracking.as_ref().map(|t| t.created_at)
    }

    /// Last access in epoch milliseconds; `None` for permanent entries.
    pub fn last_access(&self) -> Option<u64> {
        self.tracking
            .as_ref()
            .map(|t| t.last_access.load(Ordering::Relaxed))
    }

    /// Returns the clock the entry reads time from.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Consumes the entry, handing back its key and value.
    pub fn into_parts(self) -> (K, V) {
        (self.key, self.value)
    }
}

impl<K, V, C: Clock> CachedValue<K, V> for CacheEntry<K, V, C> {
    fn is_expired(&self) -> bool {
        CacheEntry::is_expired(self)
    }

    fn expire_time(&self) -> Option<u64> {
        CacheEntry::expire_time(self)
    }

    fn key(&self) -> &K {
        CacheEntry::key(self)
    }

    fn value(&self) -> &V {
        CacheEntry::value(self)
    }

    fn lock(&self) -> &EntryLock {
        CacheEntry::lock(self)
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for CacheEntry<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl<K: fmt::Display, V: fmt::Display, C> fmt::Display for CacheEntry<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CachedValue [key={}, value={}]", self.key, self.value)
    }
}
