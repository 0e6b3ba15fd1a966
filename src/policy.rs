use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EntryError;

/// Time-to-live and idle timeout of a cache entry, in milliseconds.
///
/// A zero duration switches that boundary off. When both are zero the
/// entry is permanent.
///
/// In configuration files both fields are milliseconds and default to 0:
///
/// ```toml
/// ttl = 30000
/// max_idle = 5000
/// ```
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPolicy", into = "RawPolicy")]
pub struct ExpirationPolicy {
    ttl: u64,
    max_idle: u64,
}

impl ExpirationPolicy {
    /// Builds a policy from durations, truncated to whole milliseconds.
    ///
    /// A non-zero duration shorter than a millisecond counts as 1 ms.
    pub fn new(ttl: Duration, max_idle: Duration) -> Result<Self, EntryError> {
        Ok(Self {
            ttl: duration_millis("ttl", ttl)?,
            max_idle: duration_millis("max_idle", max_idle)?,
        })
    }

    /// Builds a policy from signed millisecond counts. Negative values are rejected.
    pub fn from_millis(ttl: i64, max_idle: i64) -> Result<Self, EntryError> {
        Ok(Self {
            ttl: signed_millis("ttl", ttl)?,
            max_idle: signed_millis("max_idle", max_idle)?,
        })
    }

    /// A policy under which entries never expire.
    pub const fn permanent() -> Self {
        Self {
            ttl: 0,
            max_idle: 0,
        }
    }

    /// Returns a copy with the time-to-live replaced.
    pub fn with_ttl(self, ttl: Duration) -> Result<Self, EntryError> {
        Ok(Self {
            ttl: duration_millis("ttl", ttl)?,
            ..self
        })
    }

    /// Returns a copy with the idle timeout replaced.
    pub fn with_max_idle(self, max_idle: Duration) -> Result<Self, EntryError> {
        Ok(Self {
            max_idle: duration_millis("max_idle", max_idle)?,
            ..self
        })
    }

    /// Returns the time-to-live; zero when disabled.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl)
    }

    /// Returns the idle timeout; zero when disabled.
    pub fn max_idle(&self) -> Duration {
        Duration::from_millis(self.max_idle)
    }

    /// Returns the time-to-live in milliseconds.
    pub fn ttl_millis(&self) -> u64 {
        self.ttl
    }

    /// Returns the idle timeout in milliseconds.
    pub fn max_idle_millis(&self) -> u64 {
        self.max_idle
    }

    /// Whether neither boundary is configured.
    pub fn is_permanent(&self) -> bool {
        self.ttl == 0 && self.max_idle == 0
    }
}

fn duration_millis(field: &'static str, duration: Duration) -> Result<u64, EntryError> {
    let millis = duration.as_millis();
    if millis > i64::MAX as u128 {
        return Err(EntryError::invalid(
            field,
            format!("{millis}ms exceeds the maximum of {}ms", i64::MAX),
        ));
    }
    if millis == 0 && !duration.is_zero() {
        return Ok(1);
    }
    Ok(millis as u64)
}

fn signed_millis(field: &'static str, millis: i64) -> Result<u64, EntryError> {
    u64::try_from(millis)
        .map_err(|_| EntryError::invalid(field, format!("must not be negative, got {millis}ms")))
}

/// Wire shape of [`ExpirationPolicy`]; validated on the way in.
#[derive(Serialize, Deserialize)]
struct RawPolicy {
    #[serde(default)]
    ttl: i64,
    #[serde(default)]
    max_idle: i64,
}

impl TryFrom<RawPolicy> for ExpirationPolicy {
    type Error = EntryError;

    fn try_from(raw: RawPolicy) -> Result<Self, Self::Error> {
        ExpirationPolicy::from_millis(raw.ttl, raw.max_idle)
    }
}

impl From<ExpirationPolicy> for RawPolicy {
    fn from(policy: ExpirationPolicy) -> Self {
        // both fields are capped at i64::MAX when the policy is built
        RawPolicy {
            ttl: policy.ttl as i64,
            max_idle: policy.max_idle as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_permanent() {
        let policy = ExpirationPolicy::new(Duration::ZERO, Duration::ZERO).unwrap();
        assert!(policy.is_permanent());
        assert_eq!(policy, ExpirationPolicy::permanent());
        assert_eq!(policy, ExpirationPolicy::default());
    }

    #[test]
    fn test_negative_millis_rejected() {
        let err = ExpirationPolicy::from_millis(-1, 0).unwrap_err();
        assert!(matches!(
            err,
            EntryError::InvalidConfiguration { field: "ttl", .. }
        ));

        let err = ExpirationPolicy::from_millis(0, -50).unwrap_err();
        assert!(matches!(
            err,
            EntryError::InvalidConfiguration {
                field: "max_idle",
                ..
            }
        ));
    }

    #[test]
    fn test_oversized_duration_rejected() {
        let result = ExpirationPolicy::new(Duration::MAX, Duration::ZERO);
        assert!(result.is_err());
    }

    #[test]
    fn test_sub_millisecond_rounds_up() {
        let policy = ExpirationPolicy::new(Duration::ZERO, Duration::from_micros(10)).unwrap();
        assert_eq!(policy.max_idle_millis(), 1);
        assert!(!policy.is_permanent());
    }

    #[test]
    fn test_builder_keeps_other_field() {
        let policy = ExpirationPolicy::permanent()
            .with_ttl(Duration::from_secs(2))
            .and_then(|p| p.with_max_idle(Duration::from_millis(300)))
            .unwrap();

        assert_eq!(policy.ttl(), Duration::from_secs(2));
        assert_eq!(policy.max_idle(), Duration::from_millis(300));
    }
}
