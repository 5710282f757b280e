//! Error types for memento.
//!
//! - [`ConfigError`]: returned when user supplied configuration (such as a TTL
//!   string) cannot be interpreted.
//! - [`KeyError`]: returned by key resolvers that cannot turn an argument list
//!   into a cache key. The memoized wrapper never surfaces it to callers; a
//!   call whose key cannot be derived simply bypasses the cache.

use thiserror::Error;

/// Error returned when memoization options are invalid.
///
/// # Examples
///
/// ```
/// use memento_core::{parse_ttl, ConfigError};
///
/// let err = parse_ttl("ten seconds").unwrap_err();
/// assert!(matches!(err, ConfigError::InvalidTtl { .. }));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The TTL string has no number or an unknown unit suffix.
    #[error("invalid ttl `{input}`: {reason}")]
    InvalidTtl { input: String, reason: String },
}

/// Error returned when a cache key cannot be derived from an argument list.
#[derive(Error, Debug)]
pub enum KeyError {
    /// An argument's `Serialize` implementation failed.
    #[error("argument could not be serialized for hashing: {0}")]
    Serialize(#[from] serde_json::Error),
}
