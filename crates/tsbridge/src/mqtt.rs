// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! MQTT delivery
//!
//! Subscribes to the configured topic filter and hands every publish to the
//! [`Ingestor`] as its own task.
//!
//! # Operation
//!
//! 1. Connect; a failure before the first CONNACK is fatal
//! 2. (Re)subscribe on every CONNACK (sessions are clean)
//! 3. Parse each payload as an [`Envelope`], overriding its topic with the
//!    delivery topic, and spawn `Ingestor::handle`
//! 4. On shutdown, disconnect and give in-flight tasks a grace period

use crate::backend::{BucketAdmin, PointWriter};
use crate::config::{ConfigError, MqttConfig};
use crate::decoder::Envelope;
use crate::ingest::Ingestor;
use rumqttc::{
    AsyncClient, ClientError, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet,
    Publish, QoS,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

/// Capacity of the client request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Pause between reconnect attempts after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long shutdown waits for the DISCONNECT packet and in-flight messages.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Delivery errors.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot connect to broker: {0}")]
    Connect(#[from] ConnectionError),

    #[error("MQTT client error: {0}")]
    Client(#[from] ClientError),
}

/// Map a numeric QoS level onto the MQTT enum (values above 2 clamp to 2).
pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// Build client options from configuration.
pub fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions, ConfigError> {
    let (host, port) = config.host_port()?;
    if config.client_id.is_empty() || config.client_id.starts_with(' ') {
        return Err(ConfigError::Invalid(format!(
            "invalid MQTT client id '{}'",
            config.client_id
        )));
    }
    let mut options = MqttOptions::new(config.client_id.clone(), host, port);
    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);
    if !config.username.is_empty() {
        options.set_credentials(config.username.clone(), config.password.clone());
    }
    Ok(options)
}

/// MQTT subscription feeding an [`Ingestor`].
pub struct MqttDelivery {
    client: AsyncClient,
    eventloop: EventLoop,
    topic: String,
    qos: QoS,
}

impl MqttDelivery {
    /// Create the client. No network traffic happens until [`run`](Self::run).
    pub fn new(config: &MqttConfig) -> Result<Self, DeliveryError> {
        let options = mqtt_options(config)?;
        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            eventloop,
            topic: config.topic.clone(),
            qos: qos_from_level(config.qos),
        })
    }

    /// Drive the connection until `shutdown` resolves.
    pub async fn run<A, W, F>(
        mut self,
        ingestor: Arc<Ingestor<A, W>>,
        shutdown: F,
    ) -> Result<(), DeliveryError>
    where
        A: BucketAdmin + 'static,
        W: PointWriter + 'static,
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut tasks = JoinSet::new();
        let mut connected_once = false;

        tracing::info!("Connecting to MQTT broker, topic filter '{}'", self.topic);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Ingest task panicked: {}", e);
                    }
                }

                event = self.eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        connected_once = true;
                        tracing::info!("Connected, subscribing to '{}'", self.topic);
                        self.client.try_subscribe(self.topic.clone(), self.qos)?;
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        dispatch(&publish, &ingestor, &mut tasks);
                    }
                    Ok(_) => {}
                    Err(e) if !connected_once => return Err(DeliveryError::Connect(e)),
                    Err(e) => {
                        tracing::warn!("MQTT connection error: {} (reconnecting)", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                },
            }
        }

        tracing::info!("Disconnecting from MQTT broker");
        self.disconnect().await;

        let drained = tokio::time::timeout(SHUTDOWN_GRACE, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::warn!("{} ingest task(s) still running at shutdown", tasks.len());
            tasks.abort_all();
        }

        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.client.try_disconnect().is_err() {
            return;
        }

        // Keep polling until the DISCONNECT packet has been written
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;
    }
}

fn dispatch<A, W>(publish: &Publish, ingestor: &Arc<Ingestor<A, W>>, tasks: &mut JoinSet<()>)
where
    A: BucketAdmin + 'static,
    W: PointWriter + 'static,
{
    let envelope = match Envelope::from_payload(&publish.topic, &publish.payload) {
        Ok(envelope) => envelope,
        Err(e) => {
            tracing::warn!("Failed to parse message on '{}': {}", publish.topic, e);
            return;
        }
    };

    tracing::debug!(
        "Received message on '{}' ({} bytes)",
        publish.topic,
        publish.payload.len()
    );

    let ingestor = Arc::clone(ingestor);
    tasks.spawn(async move {
        // Failures are already logged and counted by the ingestor
        let _ = ingestor.handle(&envelope).await;
    });
}
