use serde_json::{Map, Number, Value};

/// Strategy that turns one argument value into a 32-bit structural hash.
///
/// Arguments reach a strategy as a [`serde_json::Value`], which is the closed
/// set of shapes the key deriver understands: null, booleans, numbers,
/// strings, ordered sequences and string-keyed mappings. Any argument type
/// that implements [`serde::Serialize`] can therefore be hashed; implementing
/// (or deriving) `Serialize` is the extension point for custom types.
///
/// Implementations must be deterministic: two structurally equal values must
/// always produce the same hash.
///
/// # Examples
///
/// ```
/// use memento_core::{HashStrategy, StructuralHasher};
/// use serde_json::json;
///
/// let hasher = StructuralHasher;
/// let a = hasher.hash_value(&json!({"id": 1, "name": "ada"}));
/// let b = hasher.hash_value(&json!({"name": "ada", "id": 1}));
/// assert_eq!(a, b);
/// ```
pub trait HashStrategy: Send + Sync {
    /// Hashes a single argument value.
    fn hash_value(&self, value: &Value) -> i32;
}

/// The default [`HashStrategy`].
///
/// | Shape    | Hash                                                          |
/// |----------|---------------------------------------------------------------|
/// | null     | `0`                                                           |
/// | bool     | `1231` for `true`, `1237` for `false`                         |
/// | integer  | `(v ^ (v >>> 32)) as i32`                                     |
/// | float    | integral floats hash like integers, others fold `to_bits()`  |
/// | string   | `h = 31 * h + unit` over UTF-16 code units, starting at `0`   |
/// | sequence | `h = 31 * h + hash(item)`, starting at `1`                    |
/// | mapping  | ascending key order, `h = 31 * h + (hash(k) ^ hash(v))`       |
///
/// All arithmetic wraps in two's-complement 32-bit space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StructuralHasher;

impl HashStrategy for StructuralHasher {
    fn hash_value(&self, value: &Value) -> i32 {
        match value {
            Value::Null => 0,
            Value::Bool(true) => 1231,
            Value::Bool(false) => 1237,
            Value::Number(n) => hash_number(n),
            Value::String(s) => hash_str(s),
            Value::Array(items) => items
                .iter()
                .fold(1i32, |h, item| mix(h, self.hash_value(item))),
            Value::Object(map) => self.hash_map(map),
        }
    }
}

impl StructuralHasher {
    fn hash_map(&self, map: &Map<String, Value>) -> i32 {
        // serde_json only sorts keys when `preserve_order` is off
        let mut entries: Vec<(&String, &Value)> = map.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));

        entries.into_iter().fold(0i32, |h, (k, v)| {
            mix(h, hash_str(k) ^ self.hash_value(v))
        })
    }
}

/// Order-sensitive mixing step shared by every fold: `31 * acc + value`,
/// wrapping on overflow.
#[inline]
pub fn mix(acc: i32, value: i32) -> i32 {
    acc.wrapping_mul(31).wrapping_add(value)
}

/// Hashes a string over its UTF-16 code units.
///
/// # Examples
///
/// ```
/// use memento_core::hash_str;
///
/// assert_eq!(hash_str(""), 0);
/// assert_eq!(hash_str("abc"), 96354);
/// ```
pub fn hash_str(s: &str) -> i32 {
    s.encode_utf16().fold(0i32, |h, unit| mix(h, i32::from(unit)))
}

fn hash_number(n: &Number) -> i32 {
    if let Some(v) = n.as_i64() {
        return fold_bits(v as u64);
    }
    if let Some(v) = n.as_u64() {
        return fold_bits(v);
    }

    let f = n.as_f64().unwrap_or_default();
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        fold_bits(f as i64 as u64)
    } else {
        fold_bits(f.to_bits())
    }
}

#[inline]
fn fold_bits(bits: u64) -> i32 {
    (bits ^ (bits >> 32)) as i32
}
