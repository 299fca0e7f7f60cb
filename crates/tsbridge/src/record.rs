// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Typed time-series records.
//!
//! A [`TimeSeriesRecord`] is what the decoder produces from an inbound
//! payload; a [`BucketRecord`] pairs it with the bucket it is stored in.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

/// A value that can be stored in a point field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// 64-bit floating point.
    Float(f64),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit unsigned integer (only for values above `i64::MAX`).
    UInteger(u64),
    /// UTF-8 string.
    String(String),
    /// Boolean value.
    Boolean(bool),
}

impl FieldValue {
    /// Convert a JSON scalar into a field value.
    ///
    /// Numbers that fit `i64` become [`FieldValue::Integer`], larger positive
    /// integers [`FieldValue::UInteger`], everything else [`FieldValue::Float`].
    /// Returns `None` for null, arrays and objects.
    pub fn from_json(val: &serde_json::Value) -> Option<Self> {
        match val {
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(FieldValue::Integer(i))
                } else if let Some(u) = n.as_u64() {
                    Some(FieldValue::UInteger(u))
                } else {
                    n.as_f64().map(FieldValue::Float)
                }
            }
            serde_json::Value::String(s) => Some(FieldValue::String(s.clone())),
            serde_json::Value::Bool(b) => Some(FieldValue::Boolean(*b)),
            serde_json::Value::Null => None,
            // Arrays and objects are not valid field values
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::UInteger(v) => write!(f, "{}", v),
            FieldValue::String(v) => write!(f, "{}", v),
            FieldValue::Boolean(v) => write!(f, "{}", v),
        }
    }
}

/// A single time-series point decoded from a bus message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeriesRecord {
    /// Measurement name. Empty if the payload carried none.
    pub measurement: String,
    /// Tag set (always string-valued).
    pub tags: BTreeMap<String, String>,
    /// Field set.
    pub fields: BTreeMap<String, FieldValue>,
    /// Point time. `None` lets the backend assign server-side time.
    pub timestamp: Option<DateTime<Utc>>,
}

/// A record bound to its destination bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketRecord {
    /// Destination bucket name.
    pub bucket: String,
    /// The point itself.
    pub record: TimeSeriesRecord,
}

impl BucketRecord {
    /// Bind a record to a bucket.
    pub fn new(bucket: impl Into<String>, record: TimeSeriesRecord) -> Self {
        Self {
            bucket: bucket.into(),
            record,
        }
    }
}
