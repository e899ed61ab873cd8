//! Error types for admission gates and their backing stores.
//!
//! Two outcomes that look like failures are deliberately *not* errors here:
//! capacity exhaustion and identity throttling are normal
//! [`Decision`](crate::gate::Decision) results. Errors are reserved for
//! misconfiguration (caught before any store is touched) and for backing
//! stores that cannot be reached at all.

use std::time::Duration;

/// Caller configuration errors, surfaced before any store call.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Category names and limits must pair up one-to-one.
    #[error("category/limit length mismatch: {categories} categories, {limits} limits")]
    CategoryLimitMismatch {
        /// Number of configured category names.
        categories: usize,
        /// Number of configured limits.
        limits: usize,
    },
    /// A weighted draw needs at least one category.
    #[error("no categories configured")]
    NoCategories,
    /// Lose probability must lie in [0, 1].
    #[error("lose probability {0} outside [0, 1]")]
    InvalidLoseProbability(f64),
    /// Pool keys participate in store key construction and may not be empty.
    #[error("pool key must not be empty")]
    EmptyPoolKey,
    /// The request carried no identity but throttling is enabled.
    #[error("request identity must not be empty")]
    MissingIdentity,
}

/// Failure of a backing-store call.
///
/// The variant is decided by the store implementation (the only place that
/// sees transport detail such as HTTP status codes); gate code branches on
/// the variant and never re-derives retryability itself.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// Transient failure; the caller may retry after the given delay.
    #[error("retryable store failure (retry after {after:?}): {reason}")]
    Retryable {
        /// Suggested minimum wait before retrying.
        after: Duration,
        /// Human-readable cause.
        reason: String,
    },
    /// Permanent failure; retrying will not help.
    #[error("fatal store failure: {reason}")]
    Fatal {
        /// Human-readable cause.
        reason: String,
    },
}

impl StoreError {
    /// Shorthand for a retryable failure.
    pub fn retryable(after: Duration, reason: impl Into<String>) -> Self {
        StoreError::Retryable { after, reason: reason.into() }
    }

    /// Shorthand for a fatal failure.
    pub fn fatal(reason: impl Into<String>) -> Self {
        StoreError::Fatal { reason: reason.into() }
    }

    /// Check whether the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Retryable { .. })
    }
}

/// Unified error returned by [`RequestGate`](crate::gate::RequestGate).
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GateError {
    /// Invalid configuration or request shape (400-equivalent).
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    /// A backing store failed (500-equivalent).
    #[error("backing store: {0}")]
    Store(#[from] StoreError),
}

impl GateError {
    /// Check if this error is a configuration problem.
    pub fn is_config(&self) -> bool {
        matches!(self, GateError::Config(_))
    }

    /// Check if this error came from a backing store.
    pub fn is_store(&self) -> bool {
        matches!(self, GateError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_display_names_both_lengths() {
        let err = ConfigError::CategoryLimitMismatch { categories: 3, limits: 2 };
        let msg = format!("{}", err);
        assert!(msg.contains("3 categories"));
        assert!(msg.contains("2 limits"));
    }

    #[test]
    fn store_error_constructors_and_predicates() {
        let retryable = StoreError::retryable(Duration::from_secs(1), "counter 503");
        assert!(retryable.is_retryable());
        assert!(format!("{}", retryable).contains("counter 503"));

        let fatal = StoreError::fatal("bad credentials");
        assert!(!fatal.is_retryable());
        assert!(format!("{}", fatal).contains("bad credentials"));
    }

    #[test]
    fn gate_error_wraps_both_sources() {
        let config: GateError = ConfigError::EmptyPoolKey.into();
        assert!(config.is_config());
        assert!(!config.is_store());

        let store: GateError = StoreError::fatal("down").into();
        assert!(store.is_store());
        assert!(format!("{}", store).contains("backing store"));
    }
}
