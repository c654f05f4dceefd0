use anyhow::{Context, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::services::{IngestError, IngestOutcome, OrderIngestor};

/// Subscribes to the order topic and feeds every delivery through the
/// ingestor. Offsets are committed after handling, so delivery is
/// at-least-once; duplicates are absorbed by the store's duplicate
/// policy. The loop drains on shutdown: an in-flight message finishes
/// before the task returns.
pub async fn run_consumer(
    config: &Config,
    ingestor: OrderIngestor,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("group.id", &config.kafka_group_id)
        .set("bootstrap.servers", &config.kafka_brokers)
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "6000")
        .set("enable.auto.commit", "false")
        .create()
        .context("failed to create kafka consumer")?;

    consumer
        .subscribe(&[&config.kafka_topic])
        .context("failed to subscribe to order topic")?;

    info!(
        topic = %config.kafka_topic,
        group = %config.kafka_group_id,
        "consumer subscribed"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                info!("consumer shutting down");
                break;
            }
            received = consumer.recv() => {
                let message = match received {
                    Ok(message) => message,
                    Err(e) => {
                        error!(error = %e, "kafka receive error");
                        continue;
                    }
                };

                if let Some(payload) = message.payload() {
                    handle_payload(&ingestor, payload).await;
                } else {
                    warn!("skipping message with empty payload");
                }

                if let Err(e) = consumer.commit_message(&message, CommitMode::Async) {
                    error!(error = %e, "failed to commit offset");
                }
            }
        }
    }

    Ok(())
}

async fn handle_payload(ingestor: &OrderIngestor, payload: &[u8]) {
    match ingestor.ingest(payload).await {
        Ok(IngestOutcome::Ingested) | Ok(IngestOutcome::Duplicate) => {}
        Ok(IngestOutcome::DeadLettered(dlq_id)) => {
            warn!(%dlq_id, "message parked in dead letter queue");
        }
        Err(IngestError::Decode(e)) => {
            // Malformed input is dropped outright, per the ingest
            // contract. At-least-once redelivery of garbage would only
            // produce the same failure.
            warn!(error = %e, "dropping undecodable message");
        }
        Err(IngestError::Validation(e)) => {
            warn!(error = %e, "dropping invalid order");
        }
        Err(IngestError::Store(e)) => {
            error!(error = %e, "order lost: write and dead-letter both failed");
        }
    }
}
