// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT to InfluxDB time-series bridge
//!
//! Subscribes to `timeseries/#`, decodes each message into a point and
//! stores it in the bucket named by the second topic segment, creating the
//! bucket on first use.
//!
//! # Architecture
//!
//! ```text
//! MqttDelivery
//! +-- Ingestor
//!     +-- decode          (payload -> TimeSeriesRecord)
//!     +-- resolve_bucket  (topic   -> bucket name)
//!     +-- BucketCache     (create-if-missing, serialized)
//!     +-- write_record    (record  -> Line Protocol -> backend)
//! ```
//!
//! # Message Format
//!
//! Topic `timeseries/metrics`, payload:
//!
//! ```json
//! {
//!   "data": {
//!     "measurement": "cpu",
//!     "tags": {"host": "server1"},
//!     "fields": {"usage": 0.75},
//!     "timestamp": "2024-06-01T12:00:00Z"
//!   }
//! }
//! ```
//!
//! # Configuration File
//!
//! ```toml
//! log_level = "info"
//!
//! [mqtt]
//! address = "localhost:1883"
//! topic = "timeseries/#"
//!
//! [influxdb]
//! url = "http://localhost:8086"
//! token = "..."
//! org = "my-org"
//! ```

pub mod backend;
pub mod bucket;
pub mod config;
pub mod decoder;
pub mod influx;
pub mod ingest;
pub mod line_protocol;
pub mod mqtt;
pub mod provision;
pub mod record;
pub mod writer;

pub use backend::{BackendError, BucketAdmin, PointWriter};
pub use bucket::{resolve_bucket, TopicError};
pub use config::{BridgeConfig, ConfigError, InfluxDbConfig, MqttConfig};
pub use decoder::{decode, DecodeError, Envelope};
pub use influx::InfluxClient;
pub use ingest::{IngestError, IngestStatsSnapshot, Ingestor};
pub use mqtt::{DeliveryError, MqttDelivery};
pub use provision::{BucketCache, ProvisionError};
pub use record::{BucketRecord, FieldValue, TimeSeriesRecord};
pub use writer::{write_record, WriteError};
