use thiserror::Error;

/// Errors produced while building an entry's expiration policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    /// A duration was negative or too large to express in milliseconds.
    #[error("invalid configuration for {field}: {reason}")]
    InvalidConfiguration {
        field: &'static str,
        reason: String,
    },
}

impl EntryError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        EntryError::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }
}
