use std::time::Duration;

use anyhow::Result;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;

use ps_core::config::KafkaConfig;
use ps_core::{ServiceError, ServiceResult};
use ps_types::events::{DeletedEvent, PendingAuditEvent};

const SEND_TIMEOUT: Duration = Duration::from_secs(5);
const DETACHED_DEADLINE: Duration = Duration::from_secs(10);

/// Lifecycle event emission. One producer instance is shared by every
/// handler; rdkafka's `FutureProducer` is safe for concurrent publish.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    topic_pending_audit: String,
    topic_deleted: String,
}

impl EventProducer {
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "10000")
            .create()?;
        Ok(Self {
            producer,
            topic_pending_audit: config.topic_pending_audit.clone(),
            topic_deleted: config.topic_deleted.clone(),
        })
    }

    async fn send_json<T: Serialize>(&self, topic: &str, key: &str, event: &T) -> ServiceResult<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|err| ServiceError::Bus(format!("serialize event for {topic}: {err}")))?;
        self.producer
            .send(
                FutureRecord::to(topic).key(key).payload(&payload),
                Timeout::After(SEND_TIMEOUT),
            )
            .await
            .map_err(|(err, _)| ServiceError::Bus(format!("publish to {topic}: {err}")))?;
        Ok(())
    }

    pub async fn publish_pending_audit(&self, event: &PendingAuditEvent) -> ServiceResult<()> {
        self.send_json(
            &self.topic_pending_audit,
            &event.post_id.to_string(),
            event,
        )
        .await
    }

    pub async fn publish_deleted(&self, event: &DeletedEvent) -> ServiceResult<()> {
        self.send_json(&self.topic_deleted, &event.post_id.to_string(), event)
            .await
    }

    /// Fire-and-forget pending-audit emission: detaches from the caller's
    /// deadline, bounded by its own, and never fails the originating write.
    pub fn spawn_pending_audit(&self, event: PendingAuditEvent) {
        let producer = self.clone();
        tokio::spawn(async move {
            let result = tokio::time::timeout(
                DETACHED_DEADLINE,
                producer.publish_pending_audit(&event),
            )
            .await;
            log_detached("pending_audit", event.post_id, result);
        });
    }

    pub fn spawn_deleted(&self, event: DeletedEvent) {
        let producer = self.clone();
        tokio::spawn(async move {
            let result =
                tokio::time::timeout(DETACHED_DEADLINE, producer.publish_deleted(&event)).await;
            log_detached("deleted", event.post_id, result);
        });
    }
}

fn log_detached(
    kind: &str,
    post_id: i64,
    result: Result<ServiceResult<()>, tokio::time::error::Elapsed>,
) {
    match result {
        Ok(Ok(())) => tracing::debug!(kind, post_id, "lifecycle event published"),
        Ok(Err(err)) => {
            tracing::error!(kind, post_id, error = %err, "lifecycle event publish failed")
        }
        Err(_) => tracing::error!(kind, post_id, "lifecycle event publish timed out"),
    }
}
