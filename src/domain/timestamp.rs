//! Serde adapter storing timestamps as integer unix milliseconds.
//!
//! Documents carry timestamps as plain numbers so the store can order them
//! with the same comparison it uses for every other scalar.

use serde::{Deserialize, Deserializer, Serializer, de::Error as _};
use time::OffsetDateTime;

pub fn to_millis(value: OffsetDateTime) -> i64 {
    (value.unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn from_millis(millis: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).ok()
}

pub fn serialize<S>(value: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_i64(to_millis(*value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = i64::deserialize(deserializer)?;
    from_millis(millis)
        .ok_or_else(|| D::Error::custom(format!("timestamp `{millis}` is out of range")))
}
