use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;

/// Callback fired with the key of every entry removed because its TTL elapsed.
pub type OnExpire<K> = Arc<dyn Fn(&K) + Send + Sync>;

/// Configuration that switches a cache store into expiring mode.
///
/// # Examples
///
/// ```
/// use memento_core::ExpiringOptions;
/// use std::time::Duration;
///
/// let options = ExpiringOptions::<i32>::from_millis(100)
///     .on_expire(|key| println!("expired: {key}"));
/// assert_eq!(options.default_ttl, Duration::from_millis(100));
///
/// let parsed = ExpiringOptions::<i32>::parse("2s").unwrap();
/// assert_eq!(parsed.default_ttl, Duration::from_secs(2));
/// ```
pub struct ExpiringOptions<K> {
    /// TTL applied to every entry stored without an explicit TTL.
    pub default_ttl: Duration,
    /// Optional expiry notification.
    pub on_expire: Option<OnExpire<K>>,
}

impl<K> ExpiringOptions<K> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            on_expire: None,
        }
    }

    /// Builds options from a millisecond TTL. Zero or negative values mean
    /// entries expire immediately.
    pub fn from_millis(ttl_ms: i64) -> Self {
        Self::new(Duration::from_millis(ttl_ms.max(0) as u64))
    }

    /// Builds options from a TTL string such as `"150ms"`, `"30s"` or `"5m"`.
    /// See [`parse_ttl`].
    pub fn parse(ttl: &str) -> Result<Self, ConfigError> {
        parse_ttl(ttl).map(Self::new)
    }

    /// Sets the expiry callback.
    pub fn on_expire<F>(mut self, callback: F) -> Self
    where
        F: Fn(&K) + Send + Sync + 'static,
    {
        self.on_expire = Some(Arc::new(callback));
        self
    }
}

impl<K> Clone for ExpiringOptions<K> {
    fn clone(&self) -> Self {
        Self {
            default_ttl: self.default_ttl,
            on_expire: self.on_expire.clone(),
        }
    }
}

impl<K> fmt::Debug for ExpiringOptions<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpiringOptions")
            .field("default_ttl", &self.default_ttl)
            .field("on_expire", &self.on_expire.is_some())
            .finish()
    }
}

/// Parses a TTL string.
///
/// The input is a non-negative integer followed by an optional unit:
///
/// - no unit or `ms` - milliseconds
/// - `s` - seconds
/// - `m` - minutes
/// - `h` - hours
///
/// Units are case-insensitive and surrounding whitespace is ignored.
///
/// # Examples
///
/// ```
/// use memento_core::parse_ttl;
/// use std::time::Duration;
///
/// assert_eq!(parse_ttl("250").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_ttl("250ms").unwrap(), Duration::from_millis(250));
/// assert_eq!(parse_ttl("3 S").unwrap(), Duration::from_secs(3));
/// assert_eq!(parse_ttl("1h").unwrap(), Duration::from_secs(3600));
/// assert!(parse_ttl("1d").is_err());
/// ```
pub fn parse_ttl(input: &str) -> Result<Duration, ConfigError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    let invalid = |reason: &str| ConfigError::InvalidTtl {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    if digits.is_empty() {
        return Err(invalid("expected a leading integer"));
    }
    let amount: u64 = digits
        .parse()
        .map_err(|_| invalid("number out of range"))?;

    let millis_per_unit: u64 = match unit.trim().to_lowercase().as_str() {
        "" | "ms" => 1,
        "s" => 1_000,
        "m" => 60_000,
        "h" => 3_600_000,
        _ => return Err(invalid("unknown unit, expected one of ms, s, m, h")),
    };

    amount
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| invalid("number out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_ttl("0").unwrap(), Duration::ZERO);
        assert_eq!(parse_ttl("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_ttl("  7s ").unwrap(), Duration::from_secs(7));
        assert_eq!(parse_ttl("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_ttl("2H").unwrap(), Duration::from_secs(7200));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_ttl(""),
            Err(ConfigError::InvalidTtl { .. })
        ));
        assert!(parse_ttl("ms").is_err());
        assert!(parse_ttl("-5s").is_err());
        assert!(parse_ttl("5 days").is_err());
        assert!(parse_ttl("1.5s").is_err());
    }

    #[test]
    fn test_parse_overflow() {
        let err = parse_ttl("99999999999999999999h").unwrap_err();
        assert!(err.to_string().contains("out of range"));

        assert!(parse_ttl(&format!("{}h", u64::MAX / 1_000)).is_err());
    }

    #[test]
    fn test_error_message_includes_input() {
        let err = parse_ttl("ten").unwrap_err();
        assert!(err.to_string().contains("`ten`"));
    }

    #[test]
    fn test_from_millis_clamps_negative() {
        let options = ExpiringOptions::<u8>::from_millis(-30);
        assert_eq!(options.default_ttl, Duration::ZERO);
    }

    #[test]
    fn test_on_expire_is_shared_by_clones() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let options = ExpiringOptions::<u8>::new(Duration::from_secs(1)).on_expire(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let cloned = options.clone();

        (options.on_expire.unwrap())(&1);
        (cloned.on_expire.unwrap())(&2);
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_debug_hides_callback() {
        let options = ExpiringOptions::<u8>::new(Duration::from_secs(1)).on_expire(|_| {});
        let rendered = format!("{:?}", options);
        assert!(rendered.contains("on_expire: true"));
    }
}
