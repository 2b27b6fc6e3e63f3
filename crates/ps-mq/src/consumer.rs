use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use tokio::sync::watch;

pub const HANDLER_DEADLINE: Duration = Duration::from_secs(5);

/// What to do with the bus offset after handling one message.
#[derive(Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Advance the offset. Also used for deliberately-discarded payloads
    /// (malformed JSON, rows deleted in the interim).
    Ack,
    /// Leave the offset alone; the bus redelivers at its own cadence.
    Retry(String),
}

pub trait EventHandler: Send + Sync {
    fn handle(&self, payload: &[u8]) -> impl Future<Output = HandlerOutcome> + Send;
}

pub fn stream_consumer(brokers: &str, group: &str, topic: &str) -> Result<StreamConsumer> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", brokers)
        .set("group.id", group)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()?;
    consumer.subscribe(&[topic])?;
    Ok(consumer)
}

/// Long-lived per-topic consumer loop. Each message is handled under a
/// bounded deadline; a deadline overrun counts as a retry. Read errors are
/// logged and retried after a short sleep rather than crashing the worker.
pub async fn run_consumer<H: EventHandler>(
    consumer: StreamConsumer,
    topic: &str,
    handler: H,
    mut shutdown: watch::Receiver<bool>,
) {
    tracing::info!(topic, "consumer started");
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!(topic, "consumer stopping");
                break;
            }
            received = consumer.recv() => {
                let message = match received {
                    Ok(message) => message,
                    Err(err) => {
                        tracing::error!(topic, error = %err, "consumer read failed");
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                let payload = message.payload().unwrap_or_default();
                let outcome = match tokio::time::timeout(HANDLER_DEADLINE, handler.handle(payload))
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => HandlerOutcome::Retry("handler deadline exceeded".into()),
                };

                match outcome {
                    HandlerOutcome::Ack => {
                        if let Err(err) = consumer.commit_message(&message, CommitMode::Async) {
                            tracing::warn!(topic, error = %err, "offset commit failed");
                        }
                    }
                    HandlerOutcome::Retry(reason) => {
                        tracing::warn!(
                            topic,
                            offset = message.offset(),
                            reason,
                            "message left for redelivery"
                        );
                    }
                }
            }
        }
    }
}
