//! # Memento Async
//!
//! Async support for memento memoized functions.
//!
//! - [`Deferred`]: a cloneable, shared future to return from memoized
//!   functions. It is cached while still pending, so concurrent callers
//!   share one computation, and it evicts its own cache entry if it fails.
//! - [`spawn_sweeper`]: a tokio task that periodically purges expired
//!   entries from an expiring cache store.
//!
//! ## Example
//!
//! ```
//! use memento_async::Deferred;
//! use memento_core::MemoizeOptions;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let weather = MemoizeOptions::new()
//!     .ttl(Duration::from_secs(60))
//!     .build(|city: String| {
//!         Deferred::<String, String>::spawn(async move {
//!             if city.is_empty() {
//!                 Err("no city".to_string())
//!             } else {
//!                 Ok(format!("sunny in {city}"))
//!             }
//!         })
//!     });
//!
//! assert_eq!(weather.call("Lisbon".into()).await, Ok("sunny in Lisbon".into()));
//! assert!(weather.call(String::new()).await.is_err());
//!
//! // The failed lookup evicted itself.
//! assert_eq!(weather.cache().len(), 1);
//! # }
//! ```

mod deferred;
mod sweeper;

pub use deferred::Deferred;
pub use sweeper::spawn_sweeper;
