//! Index key values.
//!
//! A [`KeyValue`] is what a key extractor pulls out of a record and what a
//! caller passes to `find_by_key`. The engine only needs two things from it:
//! equality (to deduplicate batched misses) and a stable string form (to build
//! the cache key `prefix + key`).

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The value of an index field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum KeyValue {
    /// Unset key (e.g. a nullable foreign key). Stringifies to `""`.
    Null,
    Str(String),
    Int(i64),
    Uint(u64),
    Uuid(Uuid),
}

impl KeyValue {
    /// True when the key stringifies to nothing, so `prefix + key == prefix`.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Str(s) => s.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Uint(u) => write!(f, "{}", u),
            Self::Uuid(u) => write!(f, "{}", u),
        }
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<&String> for KeyValue {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for KeyValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for KeyValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<u64> for KeyValue {
    fn from(value: u64) -> Self {
        Self::Uint(value)
    }
}

impl From<u32> for KeyValue {
    fn from(value: u32) -> Self {
        Self::Uint(value as u64)
    }
}

impl From<Uuid> for KeyValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Null)
    }
}

/// Convert a slice of anything key-like into owned key values.
pub fn keys<I, K>(ids: I) -> Vec<KeyValue>
where
    I: IntoIterator<Item = K>,
    K: Into<KeyValue>,
{
    ids.into_iter().map(Into::into).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_forms() {
        assert_eq!(KeyValue::Null.to_string(), "");
        assert_eq!(KeyValue::from("abc").to_string(), "abc");
        assert_eq!(KeyValue::from(-7i64).to_string(), "-7");
        assert_eq!(KeyValue::from(42u32).to_string(), "42");
        assert_eq!(
            KeyValue::from(Uuid::nil()).to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_blank_keys() {
        assert!(KeyValue::Null.is_blank());
        assert!(KeyValue::from("").is_blank());
        assert!(KeyValue::from(None::<Uuid>).is_blank());
        assert!(!KeyValue::from(0i64).is_blank());
        assert!(!KeyValue::from("x").is_blank());
    }

    #[test]
    fn test_keys_helper() {
        let ks = keys(["a", "b", "a"]);
        assert_eq!(ks.len(), 3);
        assert_eq!(ks[0], ks[2]);
    }

    proptest! {
        #[test]
        fn prop_string_keys_display_verbatim(s in ".*") {
            prop_assert_eq!(KeyValue::from(s.clone()).to_string(), s);
        }

        #[test]
        fn prop_int_keys_match_std_formatting(i in any::<i64>()) {
            prop_assert_eq!(KeyValue::from(i).to_string(), i.to_string());
        }
    }
}
