//! # Memento
//!
//! Function-result memoization for Rust: wrap a function once, and calls
//! with structurally equal arguments return the cached result.
//!
//! ## Features
//!
//! - **Structural keys**: arguments are hashed by content, so two separately
//!   built but equal argument lists share a cache entry
//! - **Custom keys**: plug in any closure to derive keys yourself
//! - **Expiration**: per-wrapper TTL with an `on_expire` callback
//! - **Result-aware**: `Err` results are returned but never cached
//! - **Async**: [`Deferred`] results are cached while pending and evict
//!   themselves if they fail (`async` feature)
//! - **Statistics**: hit/miss counters, queryable by name (`stats` feature)
//!
//! ## Quick Start
//!
//! ```rust
//! use memento::memoize;
//!
//! let fib = memoize(|n: u64| (1..=n).fold((0u64, 1u64), |(a, b), _| (b, a + b)).0);
//!
//! // First call computes the result
//! let first = fib.call(50);
//! // Second call returns the cached result
//! let second = fib.call(50);
//! assert_eq!(first, second);
//! ```
//!
//! ## Recursive Functions
//!
//! While the wrapped function runs, only the key being computed is locked,
//! and that lock is re-entrant, so a wrapper stored in a static can call
//! itself on the same thread:
//!
//! ```rust
//! use memento::{memoize, Memoized};
//! use once_cell::sync::Lazy;
//!
//! static FACTORIAL: Lazy<Memoized<u64, u64>> = Lazy::new(|| {
//!     memoize(|n: u64| if n <= 1 { 1 } else { n * FACTORIAL.call(n - 1) })
//! });
//!
//! assert_eq!(FACTORIAL.call(10), 3_628_800);
//! assert_eq!(FACTORIAL.cache().len(), 10);
//! ```
//!
//! ## Custom Keys and Expiration
//!
//! ```rust
//! use memento::{ExpiringOptions, MemoizeOptions};
//! use std::time::Duration;
//!
//! struct Request {
//!     user_id: u64,
//!     trace_id: String,
//! }
//!
//! // Only the user id matters for caching
//! let profile = MemoizeOptions::with_key_resolver(|req: &Request| req.user_id)
//!     .expiring(
//!         ExpiringOptions::parse("5m")
//!             .unwrap()
//!             .on_expire(|user_id: &u64| println!("profile {user_id} expired")),
//!     )
//!     .build(|req: Request| format!("profile of {}", req.user_id));
//!
//! profile.call(Request { user_id: 1, trace_id: "a".into() });
//! profile.call(Request { user_id: 1, trace_id: "b".into() });
//! assert_eq!(profile.cache().len(), 1);
//! assert!(profile.cache().remaining_ttl(&1).unwrap() <= Duration::from_secs(300));
//! ```
//!
//! ## Cargo Features
//!
//! - `stats` (default): hit/miss statistics and the [`stats_registry`]
//! - `async` (default): [`Deferred`] and [`spawn_sweeper`]

pub use memento_core::*;

#[cfg(feature = "async")]
pub use memento_async::{spawn_sweeper, Deferred};

/// The most commonly used items.
pub mod prelude {
    pub use memento_core::{
        memoize, Args, ExpiringOptions, KeyResolver, Memoizable, MemoizeOptions, Memoized,
    };

    #[cfg(feature = "async")]
    pub use memento_async::Deferred;
}
