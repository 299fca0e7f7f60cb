// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Ingest orchestration.
//!
//! ```text
//! Envelope --> decode --> resolve_bucket --> ensure_partition --> write_record
//! ```
//!
//! Each stage short-circuits on failure. Errors are logged and handed back
//! to the delivery layer; nothing is retried.

use crate::backend::{BucketAdmin, PointWriter};
use crate::bucket::{resolve_bucket, TopicError};
use crate::decoder::{decode, DecodeError, Envelope};
use crate::provision::{BucketCache, ProvisionError};
use crate::record::BucketRecord;
use crate::writer::{write_record, WriteError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use thiserror::Error;

/// Ingest errors, tagged by the stage that failed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("topic rejected: {0}")]
    Topic(#[from] TopicError),

    #[error("provisioning failed: {0}")]
    Provision(#[from] ProvisionError),

    #[error("write failed: {0}")]
    Write(#[from] WriteError),
}

impl IngestError {
    /// Short stage name for logs.
    pub fn stage(&self) -> &'static str {
        match self {
            IngestError::Decode(_) => "decode",
            IngestError::Topic(_) => "topic",
            IngestError::Provision(_) => "provision",
            IngestError::Write(_) => "write",
        }
    }
}

/// Bus-to-storage pipeline for single messages.
pub struct Ingestor<A: BucketAdmin, W: PointWriter> {
    cache: BucketCache<A>,
    writer: W,
    stats: IngestStats,
}

impl<A: BucketAdmin, W: PointWriter> Ingestor<A, W> {
    /// Create an ingestor from a loaded bucket cache and a point writer.
    pub fn new(cache: BucketCache<A>, writer: W) -> Self {
        Self {
            cache,
            writer,
            stats: IngestStats::new(),
        }
    }

    /// Process one message end to end.
    pub async fn handle(&self, envelope: &Envelope) -> Result<(), IngestError> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);

        match self.run_stages(envelope).await {
            Ok(()) => {
                self.stats.stored.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(err) => {
                self.stats.record_failure(&err);
                tracing::warn!(
                    "Dropping message on '{}' ({} stage): {}",
                    envelope.topic,
                    err.stage(),
                    err
                );
                Err(err)
            }
        }
    }

    async fn run_stages(&self, envelope: &Envelope) -> Result<(), IngestError> {
        let record = decode(&envelope.topic, envelope.data.as_ref())?;
        let bucket = resolve_bucket(&envelope.topic)?;

        if self.cache.ensure_partition(bucket).await? {
            self.stats.buckets_created.fetch_add(1, Ordering::Relaxed);
        }

        let record = BucketRecord::new(bucket, record);
        write_record(&self.writer, &record).await?;

        tracing::debug!(
            "Stored '{}' point in bucket '{}'",
            record.record.measurement,
            record.bucket
        );
        Ok(())
    }

    /// The bucket cache.
    pub fn cache(&self) -> &BucketCache<A> {
        &self.cache
    }

    /// Snapshot of the ingest counters.
    pub fn stats(&self) -> IngestStatsSnapshot {
        self.stats.snapshot()
    }
}

/// Ingest counters.
#[derive(Debug)]
pub struct IngestStats {
    /// Messages handed to the ingestor.
    pub received: AtomicU64,

    /// Points written successfully.
    pub stored: AtomicU64,

    /// Messages rejected by the decoder.
    pub decode_errors: AtomicU64,

    /// Messages on topics outside the namespace.
    pub topic_errors: AtomicU64,

    /// Messages whose bucket could not be provisioned.
    pub provision_errors: AtomicU64,

    /// Messages the backend refused.
    pub write_errors: AtomicU64,

    /// Buckets created on demand.
    pub buckets_created: AtomicU64,

    /// Creation time.
    pub created: Instant,
}

impl IngestStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self {
            received: AtomicU64::new(0),
            stored: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            topic_errors: AtomicU64::new(0),
            provision_errors: AtomicU64::new(0),
            write_errors: AtomicU64::new(0),
            buckets_created: AtomicU64::new(0),
            created: Instant::now(),
        }
    }

    fn record_failure(&self, err: &IngestError) {
        let counter = match err {
            IngestError::Decode(_) => &self.decode_errors,
            IngestError::Topic(_) => &self.topic_errors,
            IngestError::Provision(_) => &self.provision_errors,
            IngestError::Write(_) => &self.write_errors,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get snapshot of current stats.
    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            topic_errors: self.topic_errors.load(Ordering::Relaxed),
            provision_errors: self.provision_errors.load(Ordering::Relaxed),
            write_errors: self.write_errors.load(Ordering::Relaxed),
            buckets_created: self.buckets_created.load(Ordering::Relaxed),
            uptime_secs: self.created.elapsed().as_secs(),
        }
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of ingest statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStatsSnapshot {
    pub received: u64,
    pub stored: u64,
    pub decode_errors: u64,
    pub topic_errors: u64,
    pub provision_errors: u64,
    pub write_errors: u64,
    pub buckets_created: u64,
    pub uptime_secs: u64,
}

impl IngestStatsSnapshot {
    /// Total messages dropped at any stage.
    pub fn failed(&self) -> u64 {
        self.decode_errors + self.topic_errors + self.provision_errors + self.write_errors
    }

    /// Calculate stored points per second.
    pub fn points_per_second(&self) -> f64 {
        if self.uptime_secs > 0 {
            self.stored as f64 / self.uptime_secs as f64
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use serde_json::json;

    async fn ingestor(mock: &MockBackend) -> Ingestor<MockBackend, MockBackend> {
        Ingestor::new(BucketCache::load(mock.clone()).await, mock.clone())
    }

    fn cpu_envelope(topic: &str) -> Envelope {
        Envelope::new(
            topic,
            Some(json!({
                "measurement": "cpu",
                "tags": {"host": "server1"},
                "fields": {"usage": 0.75},
                "timestamp": "2024-06-01T12:00:00Z"
            })),
        )
    }

    #[tokio::test]
    async fn test_handle_stores_point() {
        let mock = MockBackend::default();
        let ingestor = ingestor(&mock).await;

        ingestor
            .handle(&cpu_envelope("timeseries/metrics"))
            .await
            .expect("handle");

        assert_eq!(mock.buckets(), vec!["metrics"]);
        assert_eq!(
            mock.lines(),
            vec![(
                "metrics".to_string(),
                "cpu,host=server1 usage=0.75 1717243200000000000".to_string()
            )]
        );

        let stats = ingestor.stats();
        assert_eq!(stats.received, 1);
        assert_eq!(stats.stored, 1);
        assert_eq!(stats.buckets_created, 1);
        assert_eq!(stats.failed(), 0);
    }

    #[tokio::test]
    async fn test_handle_wrong_namespace_never_writes() {
        let mock = MockBackend::default();
        let ingestor = ingestor(&mock).await;

        let err = ingestor
            .handle(&cpu_envelope("notimeseries/bucket"))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Topic(TopicError::WrongNamespace(_))));
        assert_eq!(err.stage(), "topic");
        assert!(mock.lines().is_empty());
        assert_eq!(mock.creates(), 0);
        assert_eq!(ingestor.stats().topic_errors, 1);
    }

    #[tokio::test]
    async fn test_handle_decode_failure_before_topic_check() {
        let mock = MockBackend::default();
        let ingestor = ingestor(&mock).await;

        let err = ingestor
            .handle(&Envelope::new("nowhere", None))
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Decode(DecodeError::MissingData)));
        assert_eq!(ingestor.stats().decode_errors, 1);
        assert_eq!(mock.creates(), 0);
    }

    #[tokio::test]
    async fn test_handle_write_failure_keeps_bucket_known() {
        let mock = MockBackend::default();
        let ingestor = ingestor(&mock).await;
        mock.fail_write(true);

        let err = ingestor
            .handle(&cpu_envelope("timeseries/metrics"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Write(WriteError::BackendRejected { .. })
        ));
        assert!(ingestor.cache().contains("metrics").await);
        assert_eq!(mock.creates(), 1);

        let stats = ingestor.stats();
        assert_eq!(stats.write_errors, 1);
        assert_eq!(stats.buckets_created, 1);
        assert_eq!(stats.stored, 0);
    }

    #[tokio::test]
    async fn test_handle_provision_failure_skips_write() {
        let mock = MockBackend::default();
        let ingestor = ingestor(&mock).await;
        mock.fail_create(true);

        let err = ingestor
            .handle(&cpu_envelope("timeseries/metrics"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            IngestError::Provision(ProvisionError::CreateFailed { .. })
        ));
        assert!(mock.lines().is_empty());
        assert_eq!(ingestor.stats().provision_errors, 1);
    }

    #[tokio::test]
    async fn test_handle_existing_bucket_not_recreated() {
        let mock = MockBackend::with_buckets(&["metrics"]);
        let ingestor = ingestor(&mock).await;

        for _ in 0..3 {
            ingestor
                .handle(&cpu_envelope("timeseries/metrics/host1"))
                .await
                .expect("handle");
        }

        assert_eq!(mock.creates(), 0);
        assert_eq!(mock.lines().len(), 3);
        assert_eq!(ingestor.stats().buckets_created, 0);
    }

    #[test]
    fn test_stats_snapshot_rates() {
        let snapshot = IngestStatsSnapshot {
            stored: 100,
            uptime_secs: 10,
            decode_errors: 1,
            write_errors: 2,
            ..Default::default()
        };
        assert_eq!(snapshot.failed(), 3);
        assert!((snapshot.points_per_second() - 10.0).abs() < f64::EPSILON);
    }
}
