//! Outbox dispatcher (C9): claim due `PENDING` rows, publish each to the
//! bus, and resolve the publish attempt.
//!
//! Grounded in the riptide `OutboxPublisher::poll_and_publish` poll/claim/
//! publish/backoff loop, shaped like the teacher's consumer tasks (a
//! `tokio::spawn`'d loop driven by `tokio::select!` against a cancellation
//! token rather than a plain `tokio::time::interval` spin).

use event_bus::EventBus;
use outbox::OutboxStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::metrics::Metrics;

pub struct DispatcherConfig {
    pub poll_interval: Duration,
    pub batch_size: i64,
}

/// Claim and publish batches until `cancel` fires. Multiple replicas are
/// safe to run concurrently — `claim_pending` row-locks with
/// `FOR UPDATE SKIP LOCKED`.
pub async fn run(
    outbox: Arc<OutboxStore>,
    bus: Arc<dyn EventBus>,
    metrics: Arc<Metrics>,
    config: DispatcherConfig,
    cancel: CancellationToken,
) {
    tracing::info!("starting outbox dispatcher");
    let mut ticker = tokio::time::interval(config.poll_interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!("outbox dispatcher shutting down, draining current batch");
                break;
            }
            _ = ticker.tick() => {
                if let Err(error) = publish_due_batch(&outbox, &bus, config.batch_size).await {
                    tracing::error!(error = %error, "failed to claim outbox batch");
                }
                if let Ok(pending) = outbox.pending_count().await {
                    metrics.set_outbox_queue_size(pending);
                }
            }
        }
    }
}

async fn publish_due_batch(
    outbox: &OutboxStore,
    bus: &Arc<dyn EventBus>,
    batch_size: i64,
) -> Result<(), outbox::OutboxError> {
    let entries = outbox.claim_pending(batch_size).await?;
    for entry in entries {
        let subject = &entry.routing_key;
        let payload = match serde_json::to_vec(&entry.envelope) {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(id = %entry.id, error = %error, "outbox row holds unencodable envelope");
                let _ = outbox.mark_failed(entry.id, &error.to_string()).await;
                continue;
            }
        };

        match bus.publish(subject, payload).await {
            Ok(()) => {
                if let Err(error) = outbox.mark_published(entry.id).await {
                    tracing::error!(id = %entry.id, error = %error, "failed to mark outbox row published");
                }
            }
            Err(error) => {
                tracing::warn!(id = %entry.id, error = %error, "publish failed, scheduling retry");
                if let Err(mark_error) = outbox.mark_failed(entry.id, &error.to_string()).await {
                    tracing::error!(id = %entry.id, error = %mark_error, "failed to record publish failure");
                }
            }
        }
    }
    Ok(())
}
