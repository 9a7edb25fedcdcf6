/// Kafka event producer for identity service
use std::time::Duration;

use async_trait::async_trait;
use event_schema::{OtpGeneratedEvent, UserRegisteredEvent, SCHEMA_VERSION, SOURCE};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::KafkaSettings;
use crate::error::{IdentityError, Result};
use crate::services::events::EventPublisher;

/// Kafka event producer service
#[derive(Clone)]
pub struct KafkaEventProducer {
    producer: FutureProducer,
    user_registered_topic: String,
    otp_generated_topic: String,
    send_timeout: Duration,
}

impl KafkaEventProducer {
    /// Create a new Kafka event producer
    ///
    /// The producer is idempotent with `acks=all`, so a publish that returns
    /// `Ok` has been persisted by the in-sync replicas.
    pub fn new(settings: &KafkaSettings) -> Result<Self> {
        let producer = rdkafka::config::ClientConfig::new()
            .set("bootstrap.servers", settings.brokers.join(","))
            .set("client.id", &settings.client_id)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set(
                "message.timeout.ms",
                settings.producer_timeout().as_millis().to_string(),
            )
            .create::<FutureProducer>()?;

        Ok(Self {
            producer,
            user_registered_topic: settings.user_registered_topic.clone(),
            otp_generated_topic: settings.otp_generated_topic.clone(),
            send_timeout: settings.producer_timeout(),
        })
    }

    /// Generic event publishing method
    async fn publish_event<T: Serialize>(
        &self,
        topic: &str,
        partition_key: &str,
        event_type: &str,
        event: &T,
    ) -> Result<()> {
        let payload = serde_json::to_string(event)?;

        let event_id = Uuid::new_v4().to_string();
        let schema_version = SCHEMA_VERSION.to_string();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "event_id",
                value: Some(event_id.as_str()),
            })
            .insert(Header {
                key: "event_type",
                value: Some(event_type),
            })
            .insert(Header {
                key: "schema_version",
                value: Some(schema_version.as_str()),
            })
            .insert(Header {
                key: "source",
                value: Some(SOURCE),
            });

        let record = FutureRecord::to(topic)
            .key(partition_key)
            .payload(&payload)
            .headers(headers);

        self.producer
            .send(record, self.send_timeout)
            .await
            .map_err(|(error, _)| {
                IdentityError::from(error)
                    .with_operation(&format!("publish {event_type} to {topic}"))
            })?;

        debug!(topic, event_type, %event_id, "Event published");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for KafkaEventProducer {
    async fn publish_user_registered(&self, event: &UserRegisteredEvent) -> Result<()> {
        let key = event.user_id.to_string();
        self.publish_event(
            &self.user_registered_topic,
            &key,
            UserRegisteredEvent::EVENT_TYPE,
            event,
        )
        .await
    }

    async fn publish_otp_generated(&self, event: &OtpGeneratedEvent) -> Result<()> {
        // Keyed by email so every code for one address lands on one partition.
        self.publish_event(
            &self.otp_generated_topic,
            &event.email,
            OtpGeneratedEvent::EVENT_TYPE,
            event,
        )
        .await
    }
}
