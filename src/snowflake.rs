//! Snowflake IDs
//!
//! Every cached entity is keyed by a 64-bit unsigned snowflake. The gateway
//! sends them as decimal strings; callers may hand them in either form.

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use std::fmt;

use crate::error::{CacheError, Result};

/// Bits below the timestamp portion of a snowflake
const TIMESTAMP_SHIFT: u32 = 22;

/// Parse a decimal snowflake string
pub fn parse_snowflake(value: &str) -> Result<u64> {
    value
        .parse::<u64>()
        .map_err(|source| CacheError::InvalidSnowflake {
            value: value.to_string(),
            source,
        })
}

/// Shard index an entity ID hashes to for a given shard count.
///
/// `shard_count` must be non-zero; `CacheOptions::validate` enforces this.
#[inline]
pub fn shard_for(id: u64, shard_count: u32) -> u32 {
    ((id >> TIMESTAMP_SHIFT) % u64::from(shard_count)) as u32
}

/// Anything that can name an entity at the query boundary.
pub trait IntoSnowflake {
    /// Convert into the native ID, failing on malformed strings
    fn into_snowflake(self) -> Result<u64>;
}

impl IntoSnowflake for u64 {
    fn into_snowflake(self) -> Result<u64> {
        Ok(self)
    }
}

impl IntoSnowflake for &str {
    fn into_snowflake(self) -> Result<u64> {
        parse_snowflake(self)
    }
}

impl IntoSnowflake for &String {
    fn into_snowflake(self) -> Result<u64> {
        parse_snowflake(self)
    }
}

impl IntoSnowflake for String {
    fn into_snowflake(self) -> Result<u64> {
        parse_snowflake(&self)
    }
}

// =============================================================================
// Serde Helpers
// =============================================================================

struct SnowflakeVisitor;

impl<'de> Visitor<'de> for SnowflakeVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a snowflake as a decimal string or an unsigned integer")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negative snowflake {}", v)))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<u64, E> {
        v.parse::<u64>()
            .map_err(|e| E::custom(format!("invalid snowflake '{}': {}", v, e)))
    }
}

/// `#[serde(deserialize_with = "deserialize")]` for a required snowflake
pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<u64, D::Error> {
    deserializer.deserialize_any(SnowflakeVisitor)
}

/// Optional snowflake; `null` and a missing field both map to `None`
pub fn deserialize_option<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<u64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize")] u64);

    Ok(Option::<Wrapper>::deserialize(deserializer)?.map(|w| w.0))
}

/// List of snowflakes; `null` maps to an empty list
pub fn deserialize_vec<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<u64>, D::Error> {
    #[derive(Deserialize)]
    struct Wrapper(#[serde(deserialize_with = "deserialize")] u64);

    Ok(Option::<Vec<Wrapper>>::deserialize(deserializer)?
        .unwrap_or_default()
        .into_iter()
        .map(|w| w.0)
        .collect())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_parse_snowflake() {
        assert_eq!(parse_snowflake("81384788765712384").unwrap(), 81384788765712384);
        assert_eq!(parse_snowflake(&u64::MAX.to_string()).unwrap(), u64::MAX);
    }

    #[test]
    fn test_parse_rejects_non_numeric() {
        assert_matches!(
            parse_snowflake("12ab"),
            Err(CacheError::InvalidSnowflake { value, .. }) if value == "12ab"
        );
        assert!(parse_snowflake("-1").is_err());
        assert!(parse_snowflake("").is_err());
    }

    #[test]
    fn test_shard_for() {
        let id = (5u64 << 22) | 12345;
        assert_eq!(shard_for(id, 4), 1);
        assert_eq!(shard_for(id, 1), 0);
        assert_eq!(shard_for(0, 16), 0);
    }

    #[test]
    fn test_into_snowflake_forms() {
        assert_eq!(42u64.into_snowflake().unwrap(), 42);
        assert_eq!("42".into_snowflake().unwrap(), 42);
        assert_eq!("42".to_string().into_snowflake().unwrap(), 42);
        assert!("forty-two".into_snowflake().is_err());
    }

    #[test]
    fn test_serde_string_or_number() {
        #[derive(Deserialize)]
        struct Probe {
            #[serde(deserialize_with = "deserialize")]
            id: u64,
            #[serde(default, deserialize_with = "deserialize_option")]
            parent: Option<u64>,
            #[serde(default, deserialize_with = "deserialize_vec")]
            roles: Vec<u64>,
        }

        let p: Probe =
            serde_json::from_value(serde_json::json!({"id": "10", "roles": ["1", 2]})).unwrap();
        assert_eq!(p.id, 10);
        assert_eq!(p.parent, None);
        assert_eq!(p.roles, vec![1, 2]);

        let p: Probe =
            serde_json::from_value(serde_json::json!({"id": 7, "parent": null, "roles": null}))
                .unwrap();
        assert_eq!(p.id, 7);
        assert_eq!(p.parent, None);
        assert!(p.roles.is_empty());

        let p: Probe = serde_json::from_value(serde_json::json!({"id": 7, "parent": "9"})).unwrap();
        assert_eq!(p.parent, Some(9));
    }
}
