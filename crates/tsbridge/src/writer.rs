// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record persistence.

use crate::backend::{BackendError, PointWriter};
use crate::line_protocol::encode_point;
use crate::record::BucketRecord;
use thiserror::Error;

/// Write errors.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("backend rejected point for bucket '{bucket}': {source}")]
    BackendRejected {
        bucket: String,
        #[source]
        source: BackendError,
    },
}

/// Encode `record` and write it to its bucket.
///
/// Records that cannot be encoded are reported as rejected, since the
/// backend would refuse them anyway.
pub async fn write_record<W: PointWriter>(
    writer: &W,
    record: &BucketRecord,
) -> Result<(), WriteError> {
    let rejected = |source: BackendError| WriteError::BackendRejected {
        bucket: record.bucket.clone(),
        source,
    };

    let line = encode_point(&record.record).map_err(|e| rejected(e.into()))?;
    tracing::trace!("{} <- {}", record.bucket, line);

    writer
        .write_line(&record.bucket, &line)
        .await
        .map_err(rejected)
}
