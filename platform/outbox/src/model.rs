//! Outbox row shape and status transitions.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Default maximum retries before a row moves to `FAILED`.
pub const DEFAULT_MAX_RETRIES: i32 = 5;

/// How long a claimed row's lease lasts before another dispatcher replica
/// is allowed to reclaim it (the replica that claimed it is assumed dead).
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum OutboxStatus {
    Pending,
    Published,
    Failed,
}

/// A single envelope awaiting broker publication.
///
/// `envelope` holds the fully-serialized [`event_bus::EventEnvelope`] JSON;
/// this crate never deserializes the payload, only the routing metadata.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OutboxEntry {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Derived from `event_type` by `event_bus::routing_key_for`.
    pub routing_key: String,
    pub envelope: serde_json::Value,
    pub status: OutboxStatus,
    pub retry_count: i32,
    pub max_retries: i32,
    pub last_error: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}
