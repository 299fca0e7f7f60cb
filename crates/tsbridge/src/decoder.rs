// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bus payload decoding.
//!
//! Maps the untyped `data` object of an [`Envelope`] to a
//! [`TimeSeriesRecord`]. Producers are not under our control, so decoding is
//! permissive: unknown keys, non-string tags, non-scalar fields and bad
//! timestamps are logged and skipped instead of failing the message.
//!
//! ```text
//! {"measurement": "cpu",
//!  "tags": {"host": "server1"},
//!  "fields": {"usage": 0.75},
//!  "timestamp": "2024-06-01T12:00:00Z"}
//! ```

use crate::record::{FieldValue, TimeSeriesRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// Decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("message data is missing")]
    MissingData,

    #[error("message data is not an object (got {0})")]
    InvalidShape(&'static str),

    #[error("'tags' is not an object (got {0})")]
    InvalidTags(&'static str),

    #[error("'fields' is not an object (got {0})")]
    InvalidFields(&'static str),
}

/// Raw inbound message as delivered by the bus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Delivery topic. Overwritten with the actual bus topic on receipt.
    #[serde(default)]
    pub topic: String,

    /// Untyped payload. JSON `null` and an absent key both decode to `None`.
    #[serde(default)]
    pub data: Option<Value>,
}

impl Envelope {
    /// Create an envelope for a topic.
    pub fn new(topic: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            topic: topic.into(),
            data,
        }
    }

    /// Parse a bus payload, replacing the embedded topic with `topic`.
    pub fn from_payload(topic: &str, payload: &[u8]) -> Result<Self, serde_json::Error> {
        let mut envelope: Envelope = serde_json::from_slice(payload)?;
        envelope.topic = topic.to_string();
        Ok(envelope)
    }
}

/// Decode the `data` part of an envelope into a time-series record.
///
/// `topic` is only used for log context.
pub fn decode(topic: &str, data: Option<&Value>) -> Result<TimeSeriesRecord, DecodeError> {
    let object = match data {
        None | Some(Value::Null) => return Err(DecodeError::MissingData),
        Some(Value::Object(map)) => map,
        Some(other) => return Err(DecodeError::InvalidShape(kind_of(other))),
    };

    let mut record = TimeSeriesRecord::default();
    let mut timestamp = None;

    for (key, value) in object {
        match key.as_str() {
            "measurement" => match value {
                Value::String(s) => record.measurement = s.clone(),
                // Kept permissive: a mistyped measurement leaves the name empty.
                other => tracing::warn!(
                    "{}: measurement is not a string ({}), ignoring",
                    topic,
                    kind_of(other)
                ),
            },
            "tags" => record.tags = decode_tags(topic, value)?,
            "fields" => record.fields = decode_fields(topic, value)?,
            "timestamp" => timestamp = Some(time_or_now(topic, value)),
            unknown => tracing::warn!("{}: unknown key '{}' in message data", topic, unknown),
        }
    }

    record.timestamp = Some(timestamp.unwrap_or_else(Utc::now));
    Ok(record)
}

fn decode_tags(topic: &str, value: &Value) -> Result<BTreeMap<String, String>, DecodeError> {
    let map = as_object(value).ok_or(DecodeError::InvalidTags(kind_of(value)))?;

    let mut tags = BTreeMap::new();
    for (key, value) in map {
        match value {
            Value::String(s) => {
                tags.insert(key.clone(), s.clone());
            }
            other => tracing::warn!(
                "{}: tag '{}' is not a string ({}), dropping",
                topic,
                key,
                kind_of(other)
            ),
        }
    }
    Ok(tags)
}

fn decode_fields(
    topic: &str,
    value: &Value,
) -> Result<BTreeMap<String, FieldValue>, DecodeError> {
    let map = as_object(value).ok_or(DecodeError::InvalidFields(kind_of(value)))?;

    let mut fields = BTreeMap::new();
    for (key, value) in map {
        match FieldValue::from_json(value) {
            Some(fv) => {
                fields.insert(key.clone(), fv);
            }
            None => tracing::warn!(
                "{}: field '{}' is not a scalar ({}), dropping",
                topic,
                key,
                kind_of(value)
            ),
        }
    }
    Ok(fields)
}

/// Parse an RFC3339 timestamp, falling back to the current time.
fn time_or_now(topic: &str, value: &Value) -> DateTime<Utc> {
    match value {
        Value::String(s) => match DateTime::parse_from_rfc3339(s) {
            Ok(t) => t.with_timezone(&Utc),
            Err(e) => {
                tracing::warn!("{}: bad timestamp '{}': {} - using now()", topic, s, e);
                Utc::now()
            }
        },
        other => {
            tracing::warn!(
                "{}: timestamp is not a string ({}) - using now()",
                topic,
                kind_of(other)
            );
            Utc::now()
        }
    }
}

fn as_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    const TOPIC: &str = "timeseries/metrics";

    #[test]
    fn test_decode_full_message() {
        let data = json!({
            "measurement": "cpu",
            "tags": {"host": "server1", "region": "us-west"},
            "fields": {"usage": 0.75},
            "timestamp": "2024-06-01T12:00:00Z"
        });

        let record = decode(TOPIC, Some(&data)).expect("decode");

        assert_eq!(record.measurement, "cpu");
        assert_eq!(record.tags.len(), 2);
        assert_eq!(record.tags["host"], "server1");
        assert_eq!(record.tags["region"], "us-west");
        assert_eq!(record.fields["usage"], FieldValue::Float(0.75));
        assert_eq!(
            record.timestamp,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_decode_timestamp_with_offset_normalized() {
        let data = json!({"timestamp": "2024-06-01T14:00:00.5+02:00"});
        let record = decode(TOPIC, Some(&data)).expect("decode");

        let expected = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
            + chrono::Duration::milliseconds(500);
        assert_eq!(record.timestamp, Some(expected));
    }

    #[test]
    fn test_decode_missing_data() {
        assert_eq!(decode(TOPIC, None), Err(DecodeError::MissingData));
        assert_eq!(decode(TOPIC, Some(&Value::Null)), Err(DecodeError::MissingData));
    }

    #[test]
    fn test_decode_invalid_shape() {
        let data = json!("a string");
        assert_eq!(
            decode(TOPIC, Some(&data)),
            Err(DecodeError::InvalidShape("string"))
        );
        assert!(matches!(
            decode(TOPIC, Some(&json!([1, 2, 3]))),
            Err(DecodeError::InvalidShape(_))
        ));
    }

    #[test]
    fn test_decode_missing_timestamp_uses_now() {
        let before = Utc::now();
        let record = decode(TOPIC, Some(&json!({"measurement": "cpu"}))).expect("decode");
        let after = Utc::now();

        let ts = record.timestamp.expect("timestamp set");
        assert!(ts >= before && ts <= after);
    }

    #[test]
    fn test_decode_unparsable_timestamp_uses_now() {
        for bad in [json!("yesterday"), json!(1717243200), json!(null)] {
            let before = Utc::now();
            let record = decode(TOPIC, Some(&json!({"timestamp": bad}))).expect("decode");
            let after = Utc::now();

            let ts = record.timestamp.expect("timestamp set");
            assert!(ts >= before && ts <= after);
        }
    }

    #[test]
    fn test_decode_drops_only_non_string_tags() {
        let data = json!({
            "tags": {"host": "server1", "core": 3, "rack": "r7", "hot": true}
        });

        let record = decode(TOPIC, Some(&data)).expect("decode");

        assert_eq!(record.tags.len(), 2);
        assert_eq!(record.tags["host"], "server1");
        assert_eq!(record.tags["rack"], "r7");
        assert!(!record.tags.contains_key("core"));
        assert!(!record.tags.contains_key("hot"));
    }

    #[test]
    fn test_decode_tags_not_an_object() {
        let data = json!({"tags": ["host", "server1"]});
        assert_eq!(
            decode(TOPIC, Some(&data)),
            Err(DecodeError::InvalidTags("array"))
        );
    }

    #[test]
    fn test_decode_fields_not_an_object() {
        let data = json!({"fields": 1.0});
        assert_eq!(
            decode(TOPIC, Some(&data)),
            Err(DecodeError::InvalidFields("number"))
        );
    }

    #[test]
    fn test_decode_fields_mixed_types() {
        let data = json!({
            "fields": {"f": 1.5, "i": 42, "s": "ok", "b": false, "n": null, "arr": [1]}
        });

        let record = decode(TOPIC, Some(&data)).expect("decode");

        assert_eq!(record.fields.len(), 4);
        assert_eq!(record.fields["f"], FieldValue::Float(1.5));
        assert_eq!(record.fields["i"], FieldValue::Integer(42));
        assert_eq!(record.fields["s"], FieldValue::String("ok".into()));
        assert_eq!(record.fields["b"], FieldValue::Boolean(false));
    }

    #[test]
    fn test_decode_unknown_keys_ignored() {
        let data = json!({"measurement": "cpu", "unit": "percent", "version": 2});
        let record = decode(TOPIC, Some(&data)).expect("decode");
        assert_eq!(record.measurement, "cpu");
        assert!(record.tags.is_empty());
        assert!(record.fields.is_empty());
    }

    // A numeric measurement is tolerated rather than rejected; the record
    // keeps an empty name and the backend decides what to do with it.
    #[test]
    fn test_decode_non_string_measurement_is_permissive() {
        let data = json!({"measurement": 42, "fields": {"v": 1}});
        let record = decode(TOPIC, Some(&data)).expect("decode");
        assert_eq!(record.measurement, "");
        assert_eq!(record.fields["v"], FieldValue::Integer(1));
    }

    #[test]
    fn test_envelope_topic_overridden_by_delivery_topic() {
        let payload = br#"{"topic": "spoofed/topic", "data": {"measurement": "cpu"}}"#;
        let envelope = Envelope::from_payload("timeseries/metrics", payload).expect("parse");

        assert_eq!(envelope.topic, "timeseries/metrics");
        assert_eq!(envelope.data, Some(json!({"measurement": "cpu"})));
    }

    #[test]
    fn test_envelope_null_and_absent_data() {
        let absent = Envelope::from_payload("timeseries/a", br#"{"topic": "x"}"#).expect("parse");
        assert!(absent.data.is_none());

        let null = Envelope::from_payload("timeseries/a", br#"{"data": null}"#).expect("parse");
        assert!(null.data.is_none());
    }

    #[test]
    fn test_envelope_rejects_garbage() {
        assert!(Envelope::from_payload("timeseries/a", b"not json").is_err());
    }
}
