// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Topic to bucket resolution.
//!
//! Topics follow `timeseries/<bucket>[/...]`; the second segment names the
//! bucket and any further segments are ignored.

use thiserror::Error;

/// Fixed namespace every ingest topic lives under.
pub const TOPIC_NAMESPACE: &str = "timeseries";

/// Topic validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopicError {
    #[error("topic '{0}' is not under 'timeseries/', expected 'timeseries/{{bucket}}'")]
    WrongNamespace(String),

    #[error("malformed topic '{0}', expected 'timeseries/{{bucket}}'")]
    MalformedTopic(String),
}

/// Resolve the bucket name for a topic.
///
/// The bucket is returned verbatim; character rules are left to the backend.
pub fn resolve_bucket(topic: &str) -> Result<&str, TopicError> {
    let mut parts = topic.split('/');
    let namespace = parts.next().unwrap_or_default();
    let bucket = parts
        .next()
        .ok_or_else(|| TopicError::MalformedTopic(topic.to_string()))?;

    if namespace != TOPIC_NAMESPACE {
        return Err(TopicError::WrongNamespace(topic.to_string()));
    }

    Ok(bucket)
}
