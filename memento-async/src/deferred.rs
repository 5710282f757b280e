use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::{self, BoxFuture, Shared};
use futures::FutureExt;
use memento_core::{Cleanup, Memoizable};
use tokio::runtime::Handle;

/// A cloneable handle to an asynchronous computation that settles once.
///
/// Every clone observes the same outcome, so a `Deferred` stored in a cache
/// can be awaited by any number of callers while the underlying work runs a
/// single time.
///
/// As a memoized return value a `Deferred` is cached as soon as it is
/// returned, before it settles. If it settles with `Err`, its cache entry is
/// removed, so the next call retries. A value that settles with `Ok` stays
/// cached.
///
/// There are two ways to create one:
///
/// * [`Deferred::new`] is lazy. Nothing runs until the first caller awaits,
///   and a rejection is only noticed at that point.
/// * [`Deferred::spawn`] drives the computation on the tokio runtime right
///   away. A rejection evicts the cache entry even if nobody awaits it.
///
/// # Examples
///
/// ```
/// use memento_async::Deferred;
/// use memento_core::memoize;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let fetch = memoize(|id: u64| {
///     Deferred::<String, String>::new(async move { Ok(format!("user-{id}")) })
/// });
///
/// let (a, b) = tokio::join!(fetch.call(7), fetch.call(7));
/// assert_eq!(a, Ok("user-7".to_string()));
/// assert_eq!(b, Ok("user-7".to_string()));
/// # }
/// ```
pub struct Deferred<T, E> {
    inner: Shared<BoxFuture<'static, Result<T, E>>>,
    eager: bool,
}

impl<T, E> Deferred<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Wraps `future` without starting it.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            inner: future.boxed().shared(),
            eager: false,
        }
    }

    /// Starts `future` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let inner = future.boxed().shared();
        tokio::spawn(inner.clone());
        Self { inner, eager: true }
    }

    /// An already fulfilled value.
    pub fn resolved(value: T) -> Self {
        Self::settled(Ok(value))
    }

    /// An already rejected value.
    pub fn rejected(error: E) -> Self {
        Self::settled(Err(error))
    }

    fn settled(outcome: Result<T, E>) -> Self {
        let inner = future::ready(outcome).boxed().shared();
        // Poll once so the outcome is visible through `peek`.
        let _ = inner.clone().now_or_never();
        Self {
            inner,
            eager: false,
        }
    }

    /// The outcome, if the computation has settled.
    pub fn peek(&self) -> Option<&Result<T, E>> {
        self.inner.peek()
    }

    pub fn is_settled(&self) -> bool {
        self.peek().is_some()
    }

    /// `true` if the computation was started with [`Deferred::spawn`].
    pub fn is_eager(&self) -> bool {
        self.eager
    }
}

impl<T, E> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            eager: self.eager,
        }
    }
}

impl<T, E> Future for Deferred<T, E>
where
    T: Clone,
    E: Clone,
{
    type Output = Result<T, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl<T, E> Memoizable for Deferred<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Values that are already known to have failed are not stored.
    fn should_cache(&self) -> bool {
        !matches!(self.peek(), Some(Err(_)))
    }

    fn on_reject(self, cleanup: Cleanup) -> Self {
        // A resolved value can never reject.
        if matches!(self.inner.peek(), Some(Ok(_))) {
            return self;
        }

        let source = self.inner;
        let settled = source.peek().is_some();
        let watched = async move {
            let outcome = source.await;
            if outcome.is_err() {
                cleanup.run();
            }
            outcome
        }
        .boxed()
        .shared();

        // Keep `peek` accurate for a source that has already failed.
        if settled {
            let _ = watched.clone().now_or_never();
        }

        if self.eager {
            if let Ok(handle) = Handle::try_current() {
                handle.spawn(watched.clone());
            }
        }

        Self {
            inner: watched,
            eager: self.eager,
        }
    }
}

impl<T, E> fmt::Debug for Deferred<T, E>
where
    T: Clone + fmt::Debug,
    E: Clone + fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("outcome", &self.inner.peek())
            .field("eager", &self.eager)
            .finish()
    }
}
