//! Routing-key conventions mapping the topology vocabulary onto NATS subjects.
//!
//! The source topology is a durable topic exchange `events` with a fan-in
//! queue bound on routing-key pattern `#`, a dead-letter exchange
//! `events.dlx`, and a dead-letter queue bound on routing key
//! `dead-letter`. NATS has no exchange/binding model, so this crate
//! represents the same topology as a subject hierarchy:
//!
//! - `events.>` is the durable topic exchange — every derived envelope is
//!   published under it, matching the fan-in queue's `#` binding.
//! - `events.dlq` is the dead-letter queue — the NATS analogue of
//!   `events.dlx` bound on `dead-letter`.
//! - `events.delay.<seconds>` carries messages held for redelivery backoff;
//!   a consumer of this subject is the durable substitute for the
//!   TTL'd delay exchange (see [`scheduled_subject`]).
//!
//! The routing key itself is still computed the way the topology dictates:
//! lowercase the event type and keep the `.` separator, e.g.
//! `Inventory.MovementRecorded` → `inventory.movementrecorded`.

/// Subject wildcard a consumer subscribes to for the fan-in queue.
pub const EVENTS_SUBJECT_WILDCARD: &str = "events.>";

/// Subject the dead-letter queue is bound to.
pub const EVENTS_DLX_SUBJECT: &str = "events.dlq";

/// Compute the routing key (and publish subject) for an event type,
/// matching the source convention of lower-casing the whole string while
/// preserving the `.` separator.
///
/// ```
/// use event_bus::routing_key_for;
/// assert_eq!(routing_key_for("Inventory.MovementRecorded"), "events.inventory.movementrecorded");
/// ```
pub fn routing_key_for(event_type: &str) -> String {
    format!("events.{}", event_type.to_lowercase())
}

/// Subject used to hold a message for `delay_seconds` before redelivery,
/// the durable substitute for an in-process `setTimeout`-based requeue.
pub fn scheduled_subject(delay_seconds: u64) -> String {
    format!("events.delay.{delay_seconds}")
}

/// The dead-letter subject a message is published to once retries are
/// exhausted.
pub fn dead_letter_subject() -> &'static str {
    EVENTS_DLX_SUBJECT
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_lowercases_and_prefixes() {
        assert_eq!(
            routing_key_for("Inventory.MovementRecorded"),
            "events.inventory.movementrecorded"
        );
        assert_eq!(
            routing_key_for("SalesOrder.OrderPlaced"),
            "events.salesorder.orderplaced"
        );
    }

    #[test]
    fn scheduled_subject_carries_delay() {
        assert_eq!(scheduled_subject(8), "events.delay.8");
    }
}
