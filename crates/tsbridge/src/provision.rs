// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Bucket cache and on-demand provisioning.
//!
//! The cache holds every bucket known to exist on the backend. It is seeded
//! once from the backend listing and grows as buckets are created; nothing
//! is ever evicted.
//!
//! Cache hits only take the set lock briefly. Creation is serialized by a
//! second async mutex and re-checks the set, so two messages arriving
//! together for a never-seen bucket issue a single create while traffic for
//! known buckets keeps flowing.

use crate::backend::{BackendError, BucketAdmin};
use std::collections::HashSet;
use thiserror::Error;
use tokio::sync::Mutex;

/// Provisioning errors.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("organization lookup failed while provisioning '{bucket}': {source}")]
    OrgLookup {
        bucket: String,
        #[source]
        source: BackendError,
    },

    #[error("failed to create bucket '{bucket}': {source}")]
    CreateFailed {
        bucket: String,
        #[source]
        source: BackendError,
    },
}

/// Known-bucket cache backed by a [`BucketAdmin`].
pub struct BucketCache<A: BucketAdmin> {
    admin: A,
    known: Mutex<HashSet<String>>,
    creating: Mutex<()>,
}

impl<A: BucketAdmin> BucketCache<A> {
    /// Build the cache from the backend's current bucket listing.
    ///
    /// A listing failure is not fatal: the cache starts empty and buckets are
    /// provisioned (or found to exist) as messages arrive.
    pub async fn load(admin: A) -> Self {
        let known = match admin.list_buckets().await {
            Ok(names) => {
                tracing::info!("Known buckets: {:?}", names);
                names
            }
            Err(e) => {
                tracing::warn!("Failed to list buckets: {} (starting with empty cache)", e);
                Vec::new()
            }
        };
        Self::with_known(admin, known)
    }

    /// Build the cache from an explicit set of bucket names.
    pub fn with_known<I, S>(admin: A, known: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            admin,
            known: Mutex::new(known.into_iter().map(Into::into).collect()),
            creating: Mutex::new(()),
        }
    }

    /// Make sure `bucket` exists on the backend.
    ///
    /// Returns `true` if this call created it. On failure the cache is left
    /// untouched so the next message for the bucket tries again.
    pub async fn ensure_partition(&self, bucket: &str) -> Result<bool, ProvisionError> {
        if self.contains(bucket).await {
            return Ok(false);
        }

        let _creating = self.creating.lock().await;
        // Another task may have created it while we waited
        if self.contains(bucket).await {
            return Ok(false);
        }

        let org_id = self
            .admin
            .find_org_id()
            .await
            .map_err(|source| ProvisionError::OrgLookup {
                bucket: bucket.to_string(),
                source,
            })?;

        if let Err(source) = self.admin.create_bucket(&org_id, bucket).await {
            tracing::error!("Error creating bucket {}: {}", bucket, source);
            return Err(ProvisionError::CreateFailed {
                bucket: bucket.to_string(),
                source,
            });
        }

        tracing::info!("Created bucket '{}'", bucket);
        self.known.lock().await.insert(bucket.to_string());
        Ok(true)
    }

    /// Check whether `bucket` is cached as existing.
    pub async fn contains(&self, bucket: &str) -> bool {
        self.known.lock().await.contains(bucket)
    }

    /// Sorted snapshot of the cached bucket names.
    pub async fn known(&self) -> Vec<String> {
        let mut names: Vec<_> = self.known.lock().await.iter().cloned().collect();
        names.sort();
        names
    }
}
