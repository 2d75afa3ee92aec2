//! Field extraction tolerant of historical backend schema drift.
//!
//! The stories and coin-ledger endpoints have shipped three generations of
//! payloads: fields were renamed, numeric ids became strings, and epoch
//! timestamps became RFC 3339. Models that survived that churn decode by
//! hand through these extractors instead of scattering serde aliases that
//! cannot express type changes. Each extractor takes the accepted field
//! names in priority order and returns the first usable value; a present
//! but `null` field falls through to the next name.

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

/// A raw JSON object, as handed to a hand-written decoder.
pub type Object = Map<String, Value>;

/// Epoch timestamps at or above this value are treated as milliseconds.
/// The v1 backend sent seconds, v2 sent milliseconds; the cutover value is
/// ~2001-09-09 in milliseconds and ~33658 AD in seconds, so no real
/// timestamp is ambiguous.
const EPOCH_MILLIS_CUTOVER: i64 = 1_000_000_000_000;

/// Deserialize the raw object for a tolerant decoder.
pub fn object<'de, D>(deserializer: D) -> Result<Object, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Object(map) => Ok(map),
        other => Err(serde::de::Error::custom(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// First non-null value present under any of `names`, in priority order.
pub fn value_at<'a>(obj: &'a Object, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|value| !value.is_null())
}

/// String field. Bare numbers are accepted and rendered, because ids
/// drifted from numeric to string between backend generations.
pub fn string_at(obj: &Object, names: &[&str]) -> Option<String> {
    match value_at(obj, names)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer field. Numeric strings are accepted.
pub fn i64_at(obj: &Object, names: &[&str]) -> Option<i64> {
    match value_at(obj, names)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean field. Accepts "true"/"false" strings and 0/1 numbers.
pub fn bool_at(obj: &Object, names: &[&str]) -> Option<bool> {
    match value_at(obj, names)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// Timestamp field. Accepts RFC 3339 strings, epoch seconds, and epoch
/// milliseconds.
pub fn datetime_at(obj: &Object, names: &[&str]) -> Option<DateTime<Utc>> {
    match value_at(obj, names)? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => epoch_to_datetime(n.as_i64()?),
        _ => None,
    }
}

/// String-array field. A bare string is accepted as a one-element list;
/// numeric elements are rendered as strings.
pub fn strings_at(obj: &Object, names: &[&str]) -> Vec<String> {
    match value_at(obj, names) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        Some(Value::String(s)) => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn epoch_to_datetime(raw: i64) -> Option<DateTime<Utc>> {
    if raw >= EPOCH_MILLIS_CUTOVER {
        Utc.timestamp_millis_opt(raw).single()
    } else {
        Utc.timestamp_opt(raw, 0).single()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Object {
        match value {
            Value::Object(map) => map,
            _ => panic!("test fixture must be an object"),
        }
    }

    #[test]
    fn test_first_name_wins() {
        let o = obj(json!({ "title": "new", "storyTitle": "old" }));
        assert_eq!(string_at(&o, &["title", "storyTitle"]), Some("new".into()));
    }

    #[test]
    fn test_null_falls_through_to_next_name() {
        let o = obj(json!({ "title": null, "storyTitle": "old" }));
        assert_eq!(string_at(&o, &["title", "storyTitle"]), Some("old".into()));
    }

    #[test]
    fn test_numeric_id_renders_as_string() {
        let o = obj(json!({ "id": 4217 }));
        assert_eq!(string_at(&o, &["id"]), Some("4217".into()));
    }

    #[test]
    fn test_i64_accepts_numeric_string() {
        let o = obj(json!({ "amount": "25" }));
        assert_eq!(i64_at(&o, &["amount"]), Some(25));
    }

    #[test]
    fn test_bool_drift_forms() {
        let o = obj(json!({ "a": true, "b": "false", "c": 1 }));
        assert_eq!(bool_at(&o, &["a"]), Some(true));
        assert_eq!(bool_at(&o, &["b"]), Some(false));
        assert_eq!(bool_at(&o, &["c"]), Some(true));
    }

    #[test]
    fn test_datetime_rfc3339() {
        let o = obj(json!({ "createdAt": "2024-06-01T12:00:00Z" }));
        let dt = datetime_at(&o, &["createdAt"]).unwrap();
        assert_eq!(dt.timestamp(), 1_717_243_200);
    }

    #[test]
    fn test_datetime_epoch_seconds_and_millis() {
        let secs = obj(json!({ "ts": 1_717_243_200i64 }));
        let millis = obj(json!({ "ts": 1_717_243_200_000i64 }));
        assert_eq!(
            datetime_at(&secs, &["ts"]).unwrap(),
            datetime_at(&millis, &["ts"]).unwrap()
        );
    }

    #[test]
    fn test_strings_accepts_bare_string() {
        let o = obj(json!({ "characters": "solo-hero" }));
        assert_eq!(strings_at(&o, &["characters"]), vec!["solo-hero"]);
    }

    #[test]
    fn test_strings_renders_numeric_elements() {
        let o = obj(json!({ "heroIds": [17, "abc"] }));
        assert_eq!(strings_at(&o, &["heroIds"]), vec!["17", "abc"]);
    }

    #[test]
    fn test_missing_everywhere_is_none() {
        let o = obj(json!({}));
        assert_eq!(string_at(&o, &["title", "name"]), None);
        assert_eq!(datetime_at(&o, &["createdAt"]), None);
    }
}
