//! Event consumer (C10): the state machine driving one inbound message
//! from `RECEIVED` through `ACK` / `DEAD-LETTER`.
//!
//! Grounded directly in the teacher's
//! `gl::consumer::gl_posting_consumer::start_gl_posting_consumer`
//! subscribe/retry/DLQ loop, generalized so the dispatch step fans out to
//! the agent runtime (C8) instead of one hard-coded handler function, and
//! reusing the teacher's own `event_bus::consumer_retry::retry_with_backoff`
//! for the retry-before-DLQ window instead of a hand-rolled one.

use event_bus::consumer_retry::{retry_with_backoff, RetryConfig};
use event_bus::{dead_letter_subject, routing_key_for, DeadLetterReason, DeadLetteredMessage, EventBus, EventEnvelope};
use event_consumer::{AgentContext, AgentRuntime, RunOutcome};
use futures::StreamExt;
use outbox::OutboxStore;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;

pub struct ConsumerConfig {
    pub max_retries: u32,
}

/// Subscribe to the fan-in wildcard and run every inbound envelope
/// through the agent runtime until `bus.subscribe` ends the stream
/// (process shutdown).
pub async fn run(bus: Arc<dyn EventBus>, runtime: Arc<AgentRuntime>, outbox: Arc<OutboxStore>, config: ConsumerConfig) {
    tracing::info!("starting event consumer");

    let mut stream = match bus.subscribe(event_bus::EVENTS_SUBJECT_WILDCARD).await {
        Ok(stream) => stream,
        Err(error) => {
            tracing::error!(error = %error, "failed to subscribe to event stream");
            return;
        }
    };

    let retry_config = RetryConfig {
        max_attempts: config.max_retries.max(1),
        initial_backoff: Duration::from_secs(1),
        max_backoff: Duration::from_secs(30),
    };

    while let Some(message) = stream.next().await {
        // The dead-letter subject is terminal, not eligible for redispatch.
        if message.subject == dead_letter_subject() {
            continue;
        }

        let bus = Arc::clone(&bus);
        let runtime = Arc::clone(&runtime);
        let outbox = Arc::clone(&outbox);
        let retry_config = retry_config.clone();
        tokio::spawn(async move {
            process_message(&bus, &runtime, &outbox, message.payload, &retry_config).await;
        });
    }

    tracing::warn!("event consumer stream ended");
}

async fn process_message(
    bus: &Arc<dyn EventBus>,
    runtime: &Arc<AgentRuntime>,
    outbox: &Arc<OutboxStore>,
    payload: Vec<u8>,
    retry_config: &RetryConfig,
) {
    let envelope: EventEnvelope<Value> = match serde_json::from_slice(&payload) {
        Ok(envelope) => envelope,
        Err(error) => {
            tracing::error!(error = %error, "malformed envelope, dead-lettering without retry");
            dead_letter(bus, &payload, None, DeadLetterReason::MalformedEnvelope, 0, &error.to_string()).await;
            return;
        }
    };

    let span = tracing::info_span!(
        "process_event",
        event_id = %envelope.event_id,
        event_type = %envelope.event_type,
        tenant_id = %envelope.tenant_id,
        correlation_id = %envelope.correlation_id,
    );

    async move {
        let ctx = AgentContext {
            tenant_id: envelope.tenant_id,
            warehouse_id: envelope.warehouse_id,
            correlation_id: envelope.correlation_id,
        };

        let result: Result<RunOutcome, String> = retry_with_backoff(
            || async {
                let outcome = runtime.run(&envelope, ctx.clone()).await;
                if outcome.failures > 0 {
                    Err(describe_failure(&outcome))
                } else {
                    Ok(outcome)
                }
            },
            retry_config,
            "process_event",
        )
        .await;

        match result {
            Ok(outcome) => {
                for derived in &outcome.derived {
                    enqueue_derived(outbox, derived).await;
                }
                tracing::info!(
                    successes = outcome.successes,
                    derived = outcome.derived.len(),
                    wall_time_ms = outcome.wall_time.as_millis() as u64,
                    "event processed"
                );
            }
            Err(error) => {
                dead_letter(
                    bus,
                    &payload,
                    Some(envelope.event_id),
                    DeadLetterReason::RetriesExhausted,
                    retry_config.max_attempts,
                    &error,
                )
                .await;
            }
        }
    }
    .instrument(span)
    .await;
}

fn describe_failure(outcome: &RunOutcome) -> String {
    format!("{} of {} agents failed", outcome.failures, outcome.successes + outcome.failures)
}

/// Hand a derived envelope to the outbox instead of publishing it
/// directly — the consumer never touches the broker for anything the
/// transactional outbox already exists to make crash-safe.
async fn enqueue_derived(outbox: &Arc<OutboxStore>, derived: &EventEnvelope<Value>) {
    let subject = routing_key_for(&derived.event_type);
    match serde_json::to_value(derived) {
        Ok(value) => {
            if let Err(error) = outbox.append_and_enqueue(derived.event_id, derived.tenant_id, &subject, value).await {
                tracing::error!(event_id = %derived.event_id, error = %error, "failed to enqueue derived envelope");
            }
        }
        Err(error) => {
            tracing::error!(event_id = %derived.event_id, error = %error, "failed to encode derived envelope");
        }
    }
}

async fn dead_letter(
    bus: &Arc<dyn EventBus>,
    payload: &[u8],
    event_id: Option<uuid::Uuid>,
    reason: DeadLetterReason,
    retry_count: u32,
    error: &str,
) {
    let dead_lettered = DeadLetteredMessage::new(
        dead_letter_subject().to_string(),
        event_id,
        reason,
        retry_count,
        error.to_string(),
        payload.to_vec(),
    );

    match serde_json::to_vec(&dead_lettered) {
        Ok(bytes) => {
            if let Err(publish_error) = bus.publish(dead_letter_subject(), bytes).await {
                tracing::error!(error = %publish_error, "failed to publish to dead-letter subject, event may be lost");
            }
        }
        Err(encode_error) => {
            tracing::error!(error = %encode_error, "failed to encode dead-lettered message");
        }
    }
}
