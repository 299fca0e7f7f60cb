// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Storage backend abstraction
//!
//! Two ports keep the ingest path independent of any particular database:
//!
//! - [`PointWriter`] -- persists one encoded point into a bucket
//! - [`BucketAdmin`] -- lists, looks up and creates buckets
//!
//! # Implementations
//!
//! - `InfluxClient` -- InfluxDB v2 over HTTP
//! - `MockBackend` -- in-memory recorder for tests

use crate::line_protocol::EncodeError;
use std::future::Future;
use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("organization '{0}' not found")]
    OrgNotFound(String),

    #[error("cannot encode point: {0}")]
    Encode(#[from] EncodeError),
}

/// Writes encoded points.
pub trait PointWriter: Send + Sync {
    /// Write a single Line Protocol line into `bucket`.
    fn write_line(
        &self,
        bucket: &str,
        line: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

/// Bucket management operations.
pub trait BucketAdmin: Send + Sync {
    /// Names of all buckets that currently exist.
    fn list_buckets(&self) -> impl Future<Output = Result<Vec<String>, BackendError>> + Send;

    /// Resolve the identifier of the configured organization.
    fn find_org_id(&self) -> impl Future<Output = Result<String, BackendError>> + Send;

    /// Create `name` inside organization `org_id`.
    fn create_bucket(
        &self,
        org_id: &str,
        name: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;
}

// ============================================================================
// Mock Implementation for Testing
// ============================================================================

#[cfg(test)]
pub(crate) use mock::MockBackend;
