use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};

use serde::Serialize;
use serde_json::Value;

use crate::error::KeyError;
use crate::hash::{mix, HashStrategy, StructuralHasher};

/// Bounds every cache key must satisfy.
///
/// Blanket-implemented; never implement it by hand.
pub trait CacheKey: Eq + Hash + Clone + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + Send + Sync + 'static {}

/// An argument list the default key deriver can hash positionally.
///
/// Tuples (up to eight elements) are multi-argument lists; common value types
/// such as integers, strings, vectors and options are one-argument lists.
/// For any other single argument either pass a one-element tuple or
/// implement this trait with [`single_arg`]:
///
/// ```
/// use memento_core::{single_arg, Args, KeyError};
/// use serde::Serialize;
/// use serde_json::Value;
///
/// #[derive(Serialize)]
/// struct Query {
///     term: String,
///     page: u32,
/// }
///
/// impl Args for Query {
///     fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
///         single_arg(self)
///     }
/// }
/// ```
pub trait Args {
    /// Converts each argument, in order, into a hashable value.
    fn arg_values(&self) -> Result<Vec<Value>, KeyError>;
}

/// Treats `value` as a one-element argument list.
pub fn single_arg<T: Serialize + ?Sized>(value: &T) -> Result<Vec<Value>, KeyError> {
    Ok(vec![serde_json::to_value(value)?])
}

impl<T: Args + ?Sized> Args for &T {
    fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
        (**self).arg_values()
    }
}

macro_rules! impl_args_for_tuple {
    ($($name:ident),*) => {
        impl<$($name: Serialize),*> Args for ($($name,)*) {
            #[allow(non_snake_case)]
            fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
                let ($($name,)*) = self;
                Ok(vec![$(serde_json::to_value($name)?),*])
            }
        }
    };
}

impl_args_for_tuple!();
impl_args_for_tuple!(T1);
impl_args_for_tuple!(T1, T2);
impl_args_for_tuple!(T1, T2, T3);
impl_args_for_tuple!(T1, T2, T3, T4);
impl_args_for_tuple!(T1, T2, T3, T4, T5);
impl_args_for_tuple!(T1, T2, T3, T4, T5, T6);
impl_args_for_tuple!(T1, T2, T3, T4, T5, T6, T7);
impl_args_for_tuple!(T1, T2, T3, T4, T5, T6, T7, T8);

macro_rules! impl_args_for_single {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Args for $ty {
                fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
                    single_arg(self)
                }
            }
        )*
    };
}

impl_args_for_single!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    str, String, Value,
);

impl<T: Serialize> Args for Vec<T> {
    fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
        single_arg(self)
    }
}

impl<T: Serialize> Args for [T] {
    fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
        single_arg(self)
    }
}

impl<T: Serialize> Args for Option<T> {
    fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
        single_arg(self)
    }
}

impl<T: Serialize> Args for BTreeMap<String, T> {
    fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
        single_arg(self)
    }
}

impl<T: Serialize, S: BuildHasher> Args for HashMap<String, T, S> {
    fn arg_values(&self) -> Result<Vec<Value>, KeyError> {
        single_arg(self)
    }
}

/// Strategy that maps an argument list to a cache key.
///
/// Two implementations ship with the crate:
///
/// * [`HashKeyResolver`] - the default; folds a structural hash of every
///   argument into an `i32`.
/// * any closure `Fn(&A) -> K` - the key is whatever the closure returns.
///
/// # Examples
///
/// ```
/// use memento_core::{HashKeyResolver, KeyResolver};
///
/// let by_hash = HashKeyResolver::new();
/// assert_eq!(by_hash.resolve(&(1u32, 2u32)).unwrap(), 33);
///
/// let by_len = |s: &String| s.len();
/// assert_eq!(by_len.resolve(&"four".to_string()).unwrap(), 4);
/// ```
pub trait KeyResolver<A: ?Sized>: Send + Sync {
    type Key: CacheKey;

    /// Derives the cache key for `args`.
    fn resolve(&self, args: &A) -> Result<Self::Key, KeyError>;
}

impl<A, K, F> KeyResolver<A> for F
where
    A: ?Sized,
    K: CacheKey,
    F: Fn(&A) -> K + Send + Sync,
{
    type Key = K;

    fn resolve(&self, args: &A) -> Result<K, KeyError> {
        Ok(self(args))
    }
}

/// Default key deriver: positional 32-bit fold of per-argument structural
/// hashes.
///
/// The accumulator starts at `0`; for every argument `acc = 31 * acc +
/// hash(arg)` with wrapping arithmetic. The key space is therefore only 32
/// bits wide and distinct argument lists can collide. Callers that need
/// collision-free keys should supply their own resolver.
#[derive(Debug, Clone, Default)]
pub struct HashKeyResolver<H = StructuralHasher> {
    hasher: H,
}

impl HashKeyResolver {
    /// Creates a resolver backed by [`StructuralHasher`].
    pub fn new() -> Self {
        Self {
            hasher: StructuralHasher,
        }
    }
}

impl<H: HashStrategy> HashKeyResolver<H> {
    /// Creates a resolver backed by a custom hash strategy.
    pub fn with_hasher(hasher: H) -> Self {
        Self { hasher }
    }

    /// Returns the hash strategy in use.
    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    /// Derives the `i32` key for an argument list.
    pub fn derive<A: Args + ?Sized>(&self, args: &A) -> Result<i32, KeyError> {
        let values = args.arg_values()?;
        Ok(fold_hashes(values.iter().map(|v| self.hasher.hash_value(v))))
    }
}

impl<A, H> KeyResolver<A> for HashKeyResolver<H>
where
    A: Args + ?Sized,
    H: HashStrategy,
{
    type Key = i32;

    fn resolve(&self, args: &A) -> Result<i32, KeyError> {
        self.derive(args)
    }
}

/// Folds per-argument hashes into a single key, starting from `0`.
///
/// # Examples
///
/// ```
/// use memento_core::fold_hashes;
///
/// assert_eq!(fold_hashes([]), 0);
/// assert_eq!(fold_hashes([1, 2]), 33);
/// ```
pub fn fold_hashes<I: IntoIterator<Item = i32>>(hashes: I) -> i32 {
    hashes.into_iter().fold(0, mix)
}
