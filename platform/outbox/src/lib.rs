//! # Transactional Outbox
//!
//! Guarantees a business transaction and the event it produces commit or
//! roll back together, and that the event eventually reaches the broker
//! even if the publish step crashes mid-flight.
//!
//! [`OutboxStore::enqueue`] writes a row inside the caller's transaction.
//! A separate dispatcher loop (`modules/warehouse-engine`) calls
//! [`OutboxStore::claim_pending`] on an interval, publishes each claimed
//! row through `event_bus::EventBus`, and reports the outcome back via
//! [`OutboxStore::mark_published`] / [`OutboxStore::mark_failed`].

mod model;
mod store;

pub use model::{OutboxEntry, OutboxStatus, DEFAULT_CLAIM_LEASE_SECS, DEFAULT_MAX_RETRIES};
pub use store::{OutboxError, OutboxResult, OutboxStore};
