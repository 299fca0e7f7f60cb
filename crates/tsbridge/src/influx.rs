// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! InfluxDB v2 HTTP backend
//!
//! Implements [`PointWriter`] and [`BucketAdmin`] on top of the InfluxDB v2
//! REST API:
//!
//! - `GET  /api/v2/buckets` -- paged bucket listing
//! - `GET  /api/v2/orgs?org=<name>` -- organization lookup
//! - `POST /api/v2/buckets` -- bucket creation (infinite retention)
//! - `POST /api/v2/write` -- Line Protocol write, nanosecond precision
//!
//! Every request carries `Authorization: Token <token>` and is bounded by
//! the configured timeout.

use crate::backend::{BackendError, BucketAdmin, PointWriter};
use crate::config::InfluxDbConfig;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

/// Page size for bucket listing.
const LIST_PAGE_SIZE: usize = 100;

// ============================================================================
// InfluxDB API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct BucketList {
    #[serde(default)]
    buckets: Vec<BucketEntry>,
}

#[derive(Debug, Deserialize)]
struct BucketEntry {
    name: String,
}

#[derive(Debug, Deserialize)]
struct OrgList {
    #[serde(default)]
    orgs: Vec<OrgEntry>,
}

#[derive(Debug, Deserialize)]
struct OrgEntry {
    id: String,
    name: String,
}

#[derive(Debug, Serialize)]
struct CreateBucketRequest<'a> {
    #[serde(rename = "orgID")]
    org_id: &'a str,
    name: &'a str,
    #[serde(rename = "retentionRules")]
    retention_rules: Vec<serde_json::Value>,
}

// ============================================================================
// Implementation
// ============================================================================

/// InfluxDB v2 client.
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    base_url: String,
    token: String,
    org: String,
    client: Client,
}

impl InfluxClient {
    /// Create a client from connection settings.
    pub fn new(config: &InfluxDbConfig) -> Result<Self, BackendError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            org: config.org.clone(),
            client,
        })
    }

    /// Organization name this client provisions into.
    pub fn org(&self) -> &str {
        &self.org
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/v2{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        if self.token.is_empty() {
            request
        } else {
            request.header("Authorization", format!("Token {}", self.token))
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        let response = self.authorized(request).send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status { status, body })
    }
}

impl PointWriter for InfluxClient {
    async fn write_line(&self, bucket: &str, line: &str) -> Result<(), BackendError> {
        let request = self
            .client
            .post(self.api_url("/write"))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", bucket),
                ("precision", "ns"),
            ])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(line.to_string());

        self.send(request).await?;
        Ok(())
    }
}

impl BucketAdmin for InfluxClient {
    async fn list_buckets(&self) -> Result<Vec<String>, BackendError> {
        let mut names = Vec::new();
        let mut offset = 0usize;

        loop {
            let request = self.client.get(self.api_url("/buckets")).query(&[
                ("limit", LIST_PAGE_SIZE.to_string()),
                ("offset", offset.to_string()),
            ]);
            let page: BucketList = self.send(request).await?.json().await?;

            let count = page.buckets.len();
            names.extend(page.buckets.into_iter().map(|b| b.name));

            if count < LIST_PAGE_SIZE {
                break;
            }
            offset += count;
        }

        Ok(names)
    }

    async fn find_org_id(&self) -> Result<String, BackendError> {
        let request = self
            .client
            .get(self.api_url("/orgs"))
            .query(&[("org", self.org.as_str())]);
        let orgs: OrgList = self.send(request).await?.json().await?;

        orgs.orgs
            .into_iter()
            .find(|o| o.name == self.org)
            .map(|o| o.id)
            .ok_or_else(|| BackendError::OrgNotFound(self.org.clone()))
    }

    async fn create_bucket(&self, org_id: &str, name: &str) -> Result<(), BackendError> {
        let body = CreateBucketRequest {
            org_id,
            name,
            retention_rules: Vec::new(),
        };
        let request = self.client.post(self.api_url("/buckets")).json(&body);

        self.send(request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str, token: &str) -> InfluxClient {
        InfluxClient::new(&InfluxDbConfig {
            url: url.to_string(),
            token: token.to_string(),
            ..Default::default()
        })
        .expect("client")
    }

    #[test]
    fn test_api_url_trims_trailing_slash() {
        let c = client("http://localhost:8086/", "");
        assert_eq!(c.api_url("/buckets"), "http://localhost:8086/api/v2/buckets");
        assert_eq!(c.org(), "my-org");
    }

    #[test]
    fn test_authorization_header() {
        let c = client("http://localhost:8086", "secret");
        let request = c
            .authorized(c.client.get(c.api_url("/orgs")))
            .build()
            .expect("build");
        assert_eq!(
            request.headers().get("Authorization").map(|v| v.to_str().unwrap()),
            Some("Token secret")
        );

        let anonymous = client("http://localhost:8086", "");
        let request = anonymous
            .authorized(anonymous.client.get(anonymous.api_url("/orgs")))
            .build()
            .expect("build");
        assert!(request.headers().get("Authorization").is_none());
    }

    #[test]
    fn test_create_bucket_body() {
        let body = CreateBucketRequest {
            org_id: "org-0001",
            name: "metrics",
            retention_rules: Vec::new(),
        };
        assert_eq!(
            serde_json::to_value(&body).expect("serialize"),
            serde_json::json!({"orgID": "org-0001", "name": "metrics", "retentionRules": []})
        );
    }

    #[test]
    fn test_parse_bucket_and_org_listings() {
        let buckets: BucketList = serde_json::from_str(
            r#"{"links": {}, "buckets": [{"id": "1", "name": "_monitoring"}, {"id": "2", "name": "metrics"}]}"#,
        )
        .expect("buckets");
        let names: Vec<_> = buckets.buckets.into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["_monitoring", "metrics"]);

        let orgs: OrgList =
            serde_json::from_str(r#"{"orgs": [{"id": "0a1b", "name": "my-org"}]}"#).expect("orgs");
        assert_eq!(orgs.orgs[0].id, "0a1b");

        let empty: OrgList = serde_json::from_str("{}").expect("empty");
        assert!(empty.orgs.is_empty());
    }

    // Nothing listens on port 9 locally; the request must fail fast as Http.
    #[tokio::test]
    async fn test_unreachable_server_is_http_error() {
        let c = InfluxClient::new(&InfluxDbConfig {
            url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        })
        .expect("client");

        let err = c.list_buckets().await.unwrap_err();
        assert!(matches!(err, BackendError::Http(_)));
    }
}
