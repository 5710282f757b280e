use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Deferred bookkeeping that evicts one specific cache entry.
///
/// A [`Memoized`](crate::Memoized) wrapper hands a `Cleanup` to every value
/// it is about to store. Values that can fail later (futures, promises) keep
/// it and [`run`](Cleanup::run) it when they fail; every other value simply
/// drops it, which does nothing.
pub struct Cleanup {
    action: Box<dyn FnOnce() + Send + 'static>,
}

impl Cleanup {
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            action: Box::new(action),
        }
    }

    /// Runs the cleanup. Consumes it, so it can only run once.
    pub fn run(self) {
        (self.action)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// A value that a memoized function may return.
///
/// The two hooks let a return type take part in caching decisions:
///
/// * [`should_cache`](Memoizable::should_cache) is asked right after the
///   wrapped function returns. `Result` answers `false` for `Err`, so errors
///   are handed back to the caller without being stored.
/// * [`on_reject`](Memoizable::on_reject) is called once, before the value is
///   stored, with the [`Cleanup`] that evicts the new entry. Deferred values
///   attach it to their failure path, so a failed computation never stays
///   cached. The value returned here is what gets stored and what the caller
///   receives.
///
/// Plain values use both defaults:
///
/// ```
/// use memento_core::Memoizable;
///
/// #[derive(Clone)]
/// struct Report {
///     lines: Vec<String>,
/// }
///
/// impl Memoizable for Report {}
/// ```
pub trait Memoizable: Clone + Send + Sync + 'static {
    fn should_cache(&self) -> bool {
        true
    }

    fn on_reject(self, cleanup: Cleanup) -> Self {
        drop(cleanup);
        self
    }
}

macro_rules! impl_memoizable {
    ($($ty:ty),* $(,)?) => {
        $(impl Memoizable for $ty {})*
    };
}

impl_memoizable!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    (), String, &'static str, serde_json::Value,
);

impl<T: Clone + Send + Sync + 'static> Memoizable for Vec<T> {}

impl<T: Clone + Send + Sync + 'static> Memoizable for Box<T> {}

impl<T: ?Sized + Send + Sync + 'static> Memoizable for Arc<T> {}

impl<T: Clone + Send + Sync + 'static> Memoizable for Option<T> {}

impl<K, V, S> Memoizable for HashMap<K, V, S>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
}

impl<T, S> Memoizable for HashSet<T, S>
where
    T: Clone + Send + Sync + 'static,
    S: Clone + Send + Sync + 'static,
{
}

impl<K, V> Memoizable for BTreeMap<K, V>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
}

impl<T: Clone + Send + Sync + 'static> Memoizable for BTreeSet<T> {}

macro_rules! impl_memoizable_for_tuple {
    ($($name:ident),+) => {
        impl<$($name: Clone + Send + Sync + 'static),+> Memoizable for ($($name,)+) {}
    };
}

impl_memoizable_for_tuple!(T1);
impl_memoizable_for_tuple!(T1, T2);
impl_memoizable_for_tuple!(T1, T2, T3);
impl_memoizable_for_tuple!(T1, T2, T3, T4);
impl_memoizable_for_tuple!(T1, T2, T3, T4, T5);
impl_memoizable_for_tuple!(T1, T2, T3, T4, T5, T6);

/// `Ok` values are cached; `Err` values are returned but never stored.
impl<T, E> Memoizable for Result<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn should_cache(&self) -> bool {
        self.is_ok()
    }
}
