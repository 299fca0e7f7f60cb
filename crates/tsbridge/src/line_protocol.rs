// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB v2 Line Protocol encoding.
//!
//! Line Protocol format:
//! ```text
//! measurement,tag1=val1,tag2=val2 field1=val1,field2=val2 [timestamp_ns]
//! ```
//!
//! The timestamp is omitted when the record carries none, in which case the
//! server assigns its own receive time.
//!
//! See: <https://docs.influxdata.com/influxdb/v2/reference/syntax/line-protocol/>

use crate::record::{FieldValue, TimeSeriesRecord};
use thiserror::Error;

/// Reasons a record cannot be expressed as a line.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("measurement name is empty")]
    EmptyMeasurement,

    #[error("measurement name starts with '#' and would be read as a comment")]
    CommentMeasurement,

    #[error("point has no fields (at least one is required)")]
    NoFields,

    #[error("timestamp is outside the nanosecond range")]
    TimestampOutOfRange,
}

impl FieldValue {
    /// Format this value for Line Protocol.
    ///
    /// - Float: written as-is (e.g., `3.14`)
    /// - Integer: suffixed with `i` (e.g., `42i`)
    /// - UInteger: suffixed with `u` (e.g., `42u`)
    /// - String: quoted with double quotes, inner quotes and line breaks
    ///   escaped (e.g., `"hello"`)
    /// - Boolean: `true` or `false`
    pub fn to_line_protocol(&self) -> String {
        match self {
            FieldValue::Float(v) => format!("{}", v),
            FieldValue::Integer(v) => format!("{}i", v),
            FieldValue::UInteger(v) => format!("{}u", v),
            FieldValue::String(v) => {
                let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
                let escaped = escape_line_breaks(&escaped);
                format!("\"{}\"", escaped)
            }
            FieldValue::Boolean(v) => v.to_string(),
        }
    }
}

/// Encode a record as a single Line Protocol line (no trailing newline).
///
/// Tags and fields come out sorted by key. Line breaks anywhere in the
/// record are escaped, so one record always yields exactly one line.
pub fn encode_point(record: &TimeSeriesRecord) -> Result<String, EncodeError> {
    if record.measurement.is_empty() {
        return Err(EncodeError::EmptyMeasurement);
    }
    if record.measurement.starts_with('#') {
        return Err(EncodeError::CommentMeasurement);
    }
    if record.fields.is_empty() {
        return Err(EncodeError::NoFields);
    }

    let mut line = escape_measurement(&record.measurement);

    for (key, value) in &record.tags {
        // Empty tag values are not representable
        if value.is_empty() {
            continue;
        }
        line.push(',');
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&escape_key(value));
    }

    line.push(' ');
    for (i, (key, value)) in record.fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        line.push_str(&escape_key(key));
        line.push('=');
        line.push_str(&value.to_line_protocol());
    }

    if let Some(ts) = record.timestamp {
        let ns = ts
            .timestamp_nanos_opt()
            .ok_or(EncodeError::TimestampOutOfRange)?;
        line.push(' ');
        line.push_str(&ns.to_string());
    }

    Ok(line)
}

/// Escape measurement name: commas, spaces and line breaks.
fn escape_measurement(s: &str) -> String {
    escape_line_breaks(
        &s.replace('\\', "\\\\")
            .replace(',', "\\,")
            .replace(' ', "\\ "),
    )
}

/// Escape tag keys, tag values and field keys: commas, equals signs, spaces
/// and line breaks.
fn escape_key(s: &str) -> String {
    escape_line_breaks(
        &s.replace('\\', "\\\\")
            .replace(',', "\\,")
            .replace('=', "\\=")
            .replace(' ', "\\ "),
    )
}

/// A raw `\n` or `\r` would end the point and start a new one.
fn escape_line_breaks(s: &str) -> String {
    s.replace('\n', "\\n").replace('\r', "\\r")
}
