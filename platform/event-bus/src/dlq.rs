//! Dead-letter record shape published to [`crate::routing::dead_letter_subject`].
//!
//! A message lands here once the consumer's retry state machine has
//! exhausted `max_retries_consumer` redeliveries (default 3) without a
//! successful ack, or when an envelope fails structural validation before
//! an agent ever runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why a message was dead-lettered instead of redelivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeadLetterReason {
    /// The envelope could not be parsed or failed structural validation.
    MalformedEnvelope,
    /// An agent (or the dispatch step) returned an error on every retry.
    RetriesExhausted,
}

/// The record published to the dead-letter subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetteredMessage {
    /// The subject the original message was received on.
    pub original_subject: String,
    /// The event_id of the inbound envelope, if it parsed far enough to
    /// have one.
    pub event_id: Option<Uuid>,
    pub reason: DeadLetterReason,
    /// Number of delivery attempts made before giving up.
    pub retry_count: u32,
    pub last_error: String,
    pub dead_lettered_at: DateTime<Utc>,
    /// The raw payload, preserved verbatim for operator replay.
    pub original_payload: Vec<u8>,
}

impl DeadLetteredMessage {
    pub fn new(
        original_subject: impl Into<String>,
        event_id: Option<Uuid>,
        reason: DeadLetterReason,
        retry_count: u32,
        last_error: impl Into<String>,
        original_payload: Vec<u8>,
    ) -> Self {
        Self {
            original_subject: original_subject.into(),
            event_id,
            reason,
            retry_count,
            last_error: last_error.into(),
            dead_lettered_at: Utc::now(),
            original_payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_reason_as_screaming_snake_case() {
        let msg = DeadLetteredMessage::new(
            "events.inventory.movementrecorded",
            Some(Uuid::new_v4()),
            DeadLetterReason::RetriesExhausted,
            3,
            "agent timed out",
            b"{}".to_vec(),
        );
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["reason"], "RETRIES_EXHAUSTED");
    }
}
