//! # Memento Core
//!
//! Core building blocks for the memento memoization library.
//!
//! ## Features
//!
//! - **Structural Keys**: argument lists are hashed by shape and content, so
//!   equal arguments map to the same key regardless of identity
//! - **Pluggable Resolvers**: replace the default key deriver with any
//!   closure or [`KeyResolver`]
//! - **Expiring Store**: per-entry TTLs with an `on_expire` callback fired
//!   exactly once per expired entry
//! - **Rejection-Aware Caching**: deferred values that fail evict their own
//!   entry, and `Err` results are never cached
//! - **Statistics**: hit/miss counters per wrapper, optionally registered by
//!   name (`stats` feature)
//!
//! ## Module Organization
//!
//! - [`hash`] - structural hashing of argument values
//! - [`keys`] - argument lists, key resolvers and the default key deriver
//! - [`cache_entry`] - entry wrapper with insertion time and TTL
//! - [`store`] - the concurrent cache store, plain or expiring
//! - [`memoized`] - the memoized function wrapper and its builder
//!
//! ## Example
//!
//! ```
//! use memento_core::{memoize, MemoizeOptions};
//! use std::time::Duration;
//!
//! let double = memoize(|n: u32| n * 2);
//! assert_eq!(double.call(21), 42);
//!
//! let lookup = MemoizeOptions::new()
//!     .ttl(Duration::from_secs(30))
//!     .build(|(table, id): (String, u64)| format!("{table}#{id}"));
//! assert_eq!(lookup.call(("users".into(), 7)), "users#7");
//! ```

pub mod cache_entry;
pub mod config;
pub mod error;
pub mod hash;
pub mod keys;
pub mod memoizable;
pub mod memoized;
pub mod store;

#[cfg(feature = "stats")]
mod stats;

#[cfg(feature = "stats")]
pub mod stats_registry;

pub use cache_entry::{next_entry_id, CacheEntry};
pub use config::{parse_ttl, ExpiringOptions, OnExpire};
pub use error::{ConfigError, KeyError};
pub use hash::{hash_str, mix, HashStrategy, StructuralHasher};
pub use keys::{fold_hashes, single_arg, Args, CacheKey, HashKeyResolver, KeyResolver};
pub use memoizable::{Cleanup, Memoizable};
pub use memoized::{memoize, MemoizeOptions, Memoized};
pub use store::CacheStore;

#[cfg(feature = "stats")]
pub use stats::CacheStats;
