// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! tsbridge CLI
//!
//! # Usage
//!
//! ```bash
//! # Run with ./tsbridge.toml (or built-in defaults)
//! tsbridge
//!
//! # Explicit configuration file
//! tsbridge --config /etc/tsbridge.toml
//!
//! # Write an example configuration
//! tsbridge gen-config -o tsbridge.toml
//!
//! # Check a configuration file
//! tsbridge validate -c tsbridge.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use tsbridge::config::DEFAULT_CONFIG_FILE;
use tsbridge::{
    BridgeConfig, BucketCache, InfluxClient, IngestStatsSnapshot, Ingestor, MqttDelivery,
};

/// MQTT to InfluxDB bridge
#[derive(Parser, Debug)]
#[command(name = "tsbridge")]
#[command(about = "MQTT to InfluxDB bridge - stores timeseries/<bucket> messages as points")]
#[command(version)]
struct Args {
    /// Configuration file path (default: ./tsbridge.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Statistics reporting interval (seconds, 0 to disable); overrides the config file
    #[arg(long)]
    stats_interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(cmd) = args.command {
        init_logging(args.log_level.as_deref().unwrap_or("info"));
        return match cmd {
            Commands::GenConfig { output } => cmd_gen_config(output),
            Commands::Validate { config } => cmd_validate(config),
        };
    }

    let config_path = BridgeConfig::resolve_path(args.config.as_deref());
    let mut config = match config_path {
        Some(ref path) => BridgeConfig::from_file(path)?,
        None => BridgeConfig::default(),
    };
    if let Some(interval) = args.stats_interval {
        config.stats_interval_secs = interval;
    }

    init_logging(args.log_level.as_deref().unwrap_or(&config.log_level));

    match config_path {
        Some(ref path) => tracing::info!("Loaded config file from {}", path.display()),
        None => tracing::info!("No {} found, using default values", DEFAULT_CONFIG_FILE),
    }

    let influx = InfluxClient::new(&config.influxdb)?;
    let cache = BucketCache::load(influx.clone()).await;
    let ingestor = Arc::new(Ingestor::new(cache, influx));
    let delivery = MqttDelivery::new(&config.mqtt)?;

    println!("tsbridge v{}", env!("CARGO_PKG_VERSION"));
    println!("=====================================");
    println!("MQTT:     {} ({})", config.mqtt.address, config.mqtt.topic);
    println!("InfluxDB: {} (org {})", config.influxdb.url, config.influxdb.org);
    println!();
    println!("Press Ctrl+C to stop...");
    println!();

    // Stats reporting task
    let stats_interval = config.stats_interval_secs;
    if stats_interval > 0 {
        let stats_ingestor = Arc::clone(&ingestor);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(stats_interval));
            interval.tick().await;
            loop {
                interval.tick().await;
                log_stats(&stats_ingestor.stats());
            }
        });
    }

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        println!("\nShutting down...");
    };

    delivery.run(Arc::clone(&ingestor), shutdown).await?;

    println!("\nFinal Statistics:");
    log_stats(&ingestor.stats());

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn cmd_gen_config(output: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = BridgeConfig::default();
    config.mqtt.username = "mqtt-user".into();
    config.mqtt.password = "mqtt-password".into();
    config.influxdb.token = "replace-with-an-influxdb-api-token".into();

    let toml_str = toml::to_string_pretty(&config)?;

    let content = format!(
        r#"# tsbridge configuration
# Generated by tsbridge gen-config
#
# Messages published on timeseries/<bucket>[/...] are stored in <bucket>,
# which is created in the configured organization on first use.

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    match BridgeConfig::from_file(&config_path) {
        Ok(config) => {
            println!("Configuration valid!");
            println!();
            println!(
                "MQTT:     {} as '{}' (topic '{}', QoS {})",
                config.mqtt.address, config.mqtt.client_id, config.mqtt.topic, config.mqtt.qos
            );
            println!(
                "InfluxDB: {} (org '{}', timeout {}s, token {})",
                config.influxdb.url,
                config.influxdb.org,
                config.influxdb.timeout_secs,
                if config.influxdb.token.is_empty() {
                    "not set"
                } else {
                    "set"
                }
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Configuration invalid: {}", e);
            std::process::exit(1);
        }
    }
}

fn log_stats(stats: &IngestStatsSnapshot) {
    tracing::info!(
        "{} received, {} stored ({:.1} pts/s), {} dropped [decode {}, topic {}, provision {}, write {}], {} buckets created",
        stats.received,
        stats.stored,
        stats.points_per_second(),
        stats.failed(),
        stats.decode_errors,
        stats.topic_errors,
        stats.provision_errors,
        stats.write_errors,
        stats.buckets_created
    );
}
