/// Audit event publishing for authentication flows
///
/// Audit emission is fire-and-forget: a failed or slow sink must never delay
/// or fail the authentication operation that produced the event.
use crate::config::KafkaSettings;
use crate::error::{AuthError, Result};
use crate::models::audit::AuditEvent;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Destination for audit events. `record` takes a snapshot and returns
/// immediately; delivery happens in the background.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

pub type SharedAuditSink = Arc<dyn AuditSink>;

/// Sink that only logs events locally. Used when Kafka is disabled and as
/// the default in tests.
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: AuditEvent) {
        debug!(
            kind = event.kind.as_str(),
            user_id = ?event.user_id,
            success = event.success,
            "audit event"
        );
    }
}

/// Kafka-backed sink. Each event is serialized and handed to a spawned task
/// so the caller never waits on broker acknowledgement.
#[derive(Clone)]
pub struct KafkaAuditSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaAuditSink {
    pub fn new(settings: &KafkaSettings) -> Result<Self> {
        let producer = rdkafka::config::ClientConfig::new()
            .set("bootstrap.servers", &settings.brokers)
            .set("client.id", "auth-service")
            .create::<FutureProducer>()
            .map_err(|e| AuthError::Internal(format!("Failed to create Kafka producer: {}", e)))?;

        Ok(Self {
            producer,
            topic: settings.topic.clone(),
        })
    }
}

impl AuditSink for KafkaAuditSink {
    fn record(&self, event: AuditEvent) {
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize audit event: {}", e);
                return;
            }
        };

        // Partition by principal so a user's audit trail stays ordered.
        let key = event
            .user_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| event.kind.as_str().to_string());

        let producer = self.producer.clone();
        let topic = self.topic.clone();
        let kind = event.kind.as_str();

        tokio::spawn(async move {
            let record = FutureRecord::to(&topic).key(&key).payload(&payload);
            if let Err((error, _)) = producer.send(record, Duration::from_secs(30)).await {
                warn!(kind, "Failed to publish audit event: {:?}", error);
            }
        });
    }
}
