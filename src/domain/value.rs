//! Serde helpers for optional JSON values.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Deserializes a field that is present as `Some`, including an explicit
/// `null`. Combined with `#[serde(default)]`, a missing field stays `None`.
pub(crate) fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}
