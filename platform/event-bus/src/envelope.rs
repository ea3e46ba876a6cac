//! # Event Envelope
//!
//! Canonical on-the-wire shape for every domain event crossing the bus.
//!
//! ## Design Principles
//!
//! 1. **Single Source of Truth**: one envelope struct for the whole system.
//! 2. **Validation**: centralized envelope validation logic.
//! 3. **Causation chain**: every derived envelope names the envelope that
//!    produced it, and preserves tenant/correlation across the chain.
//! 4. **Immutability**: envelopes are value types; derivation always
//!    produces a new envelope rather than mutating an existing one.
//!
//! ## Envelope Fields
//!
//! - `event_id`: unique identifier, the idempotency key.
//! - `event_type`: namespaced `Aggregate.Verb` grammar (e.g. `Inventory.StockAdjusted`).
//! - `occurred_at`: RFC-3339 timestamp, monotone per aggregate.
//! - `schema_version`: `major.minor` payload schema version.
//! - `correlation_id`: links every envelope in one business interaction.
//! - `causation_id`: the event_id of the envelope that produced this one, if any.
//! - `actor`: who/what produced the envelope.
//! - `tenant_id` / `warehouse_id`: multi-tenant, multi-site scoping.
//! - `payload`: event-specific data.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use uuid::Uuid;

fn event_type_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"^[A-Z][A-Za-z]+\.[A-Z][A-Za-z]+$").unwrap())
}

/// Who or what produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActorType {
    User,
    System,
    Agent,
    Integration,
}

impl fmt::Display for ActorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorType::User => write!(f, "USER"),
            ActorType::System => write!(f, "SYSTEM"),
            ActorType::Agent => write!(f, "AGENT"),
            ActorType::Integration => write!(f, "INTEGRATION"),
        }
    }
}

/// The identity attached to an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    #[serde(rename = "type")]
    pub actor_type: ActorType,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub roles: Option<Vec<String>>,
}

impl Actor {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::User,
            id: id.into(),
            roles: None,
        }
    }

    pub fn system(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::System,
            id: id.into(),
            roles: None,
        }
    }

    pub fn agent(name: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Agent,
            id: name.into(),
            roles: None,
        }
    }

    pub fn integration(id: impl Into<String>) -> Self {
        Self {
            actor_type: ActorType::Integration,
            id: id.into(),
            roles: None,
        }
    }
}

/// A `major.minor` payload schema version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

impl SchemaVersion {
    pub const CURRENT: SchemaVersion = SchemaVersion { major: 1, minor: 0 };
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl std::str::FromStr for SchemaVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .split_once('.')
            .ok_or_else(|| format!("invalid schema_version: {s}"))?;
        let major = major
            .parse()
            .map_err(|_| format!("invalid schema_version major: {s}"))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("invalid schema_version minor: {s}"))?;
        Ok(SchemaVersion { major, minor })
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Context supplied by the caller when minting a brand new envelope
/// (as opposed to deriving one from an inbound envelope — see
/// [`EventEnvelope::derive`]).
#[derive(Debug, Clone)]
pub struct EnvelopeContext {
    pub correlation_id: Uuid,
    pub causation_id: Option<Uuid>,
    pub actor: Actor,
    pub tenant_id: Uuid,
    pub warehouse_id: Option<Uuid>,
}

/// Canonical event envelope wrapping every event crossing the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    pub event_id: Uuid,
    pub event_type: String,
    pub occurred_at: DateTime<Utc>,
    pub schema_version: SchemaVersion,
    pub correlation_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub causation_id: Option<Uuid>,
    pub actor: Actor,
    pub tenant_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warehouse_id: Option<Uuid>,
    pub payload: T,
}

/// Errors minting or validating an envelope.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    #[error("event_type '{0}' does not match the Aggregate.Verb grammar")]
    InvalidEventType(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl<T> EventEnvelope<T> {
    /// Mint a brand new envelope for an event originating outside any
    /// existing chain (a command handler, a scheduler tick).
    pub fn new(
        event_type: impl Into<String>,
        payload: T,
        ctx: EnvelopeContext,
    ) -> Result<Self, EnvelopeError> {
        let event_type = event_type.into();
        validate_event_type(&event_type)?;
        Ok(Self {
            event_id: Uuid::new_v4(),
            event_type,
            occurred_at: Utc::now(),
            schema_version: SchemaVersion::CURRENT,
            correlation_id: ctx.correlation_id,
            causation_id: ctx.causation_id,
            actor: ctx.actor,
            tenant_id: ctx.tenant_id,
            warehouse_id: ctx.warehouse_id,
            payload,
        })
    }

    /// Derive a new envelope caused by `self`. Tenant and correlation are
    /// carried over unchanged; `causation_id` is forced to `self.event_id`.
    /// This is the only sanctioned way to produce a derived envelope —
    /// re-publishing `self` unchanged is never valid.
    pub fn derive<U>(
        &self,
        event_type: impl Into<String>,
        payload: U,
        actor: Actor,
    ) -> Result<EventEnvelope<U>, EnvelopeError> {
        let event_type = event_type.into();
        validate_event_type(&event_type)?;
        Ok(EventEnvelope {
            event_id: Uuid::new_v4(),
            event_type,
            occurred_at: Utc::now(),
            schema_version: SchemaVersion::CURRENT,
            correlation_id: self.correlation_id,
            causation_id: Some(self.event_id),
            actor,
            tenant_id: self.tenant_id,
            warehouse_id: self.warehouse_id,
            payload,
        })
    }
}

/// Validate that an event type matches the `AggregateName.VerbPhrase` grammar.
pub fn validate_event_type(event_type: &str) -> Result<(), EnvelopeError> {
    if event_type_pattern().is_match(event_type) {
        Ok(())
    } else {
        Err(EnvelopeError::InvalidEventType(event_type.to_string()))
    }
}

/// Validate the structural fields of a generic (already-deserialized)
/// envelope. Used at the boundary where an envelope arrives as raw JSON
/// before being decoded into a typed payload.
pub fn validate_envelope_fields(envelope: &serde_json::Value) -> Result<(), String> {
    envelope
        .get("event_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or("missing or invalid event_id")?;

    let event_type = envelope
        .get("event_type")
        .and_then(|v| v.as_str())
        .ok_or("missing event_type")?;
    validate_event_type(event_type).map_err(|e| e.to_string())?;

    envelope
        .get("occurred_at")
        .and_then(|v| v.as_str())
        .ok_or("missing or invalid occurred_at")?;

    envelope
        .get("tenant_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or("missing or invalid tenant_id")?;

    envelope
        .get("correlation_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or("missing or invalid correlation_id")?;

    if let Some(causation) = envelope.get("causation_id") {
        if !causation.is_null() {
            causation
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .ok_or("invalid causation_id")?;
        }
    }

    envelope.get("actor").and_then(|v| v.as_object()).ok_or("missing actor")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> EnvelopeContext {
        EnvelopeContext {
            correlation_id: Uuid::new_v4(),
            causation_id: None,
            actor: Actor::user("u1"),
            tenant_id: Uuid::new_v4(),
            warehouse_id: None,
        }
    }

    #[test]
    fn new_envelope_has_fresh_id_and_no_causation() {
        let envelope = EventEnvelope::new("Inventory.StockAdjusted", json!({}), ctx()).unwrap();
        assert!(envelope.causation_id.is_none());
        assert_eq!(envelope.schema_version.to_string(), "1.0");
    }

    #[test]
    fn derive_preserves_tenant_and_correlation_sets_causation() {
        let source = EventEnvelope::new("Inventory.StockAdjusted", json!({}), ctx()).unwrap();
        let derived = source
            .derive("Inventory.LowStockAlert", json!({"level": "WARNING"}), Actor::agent("threshold-agent"))
            .unwrap();

        assert_eq!(derived.tenant_id, source.tenant_id);
        assert_eq!(derived.correlation_id, source.correlation_id);
        assert_eq!(derived.causation_id, Some(source.event_id));
        assert_ne!(derived.event_id, source.event_id);
    }

    #[test]
    fn rejects_malformed_event_type() {
        assert!(validate_event_type("inventory.stockAdjusted").is_err());
        assert!(validate_event_type("Inventory").is_err());
        assert!(validate_event_type("Inventory.StockAdjusted").is_ok());
    }

    #[test]
    fn validate_envelope_fields_requires_actor_and_ids() {
        let good = json!({
            "event_id": Uuid::new_v4().to_string(),
            "event_type": "Inventory.StockAdjusted",
            "occurred_at": "2026-01-01T00:00:00Z",
            "tenant_id": Uuid::new_v4().to_string(),
            "correlation_id": Uuid::new_v4().to_string(),
            "actor": {"type": "SYSTEM", "id": "scheduler"},
            "payload": {}
        });
        assert!(validate_envelope_fields(&good).is_ok());

        let mut missing_actor = good.clone();
        missing_actor.as_object_mut().unwrap().remove("actor");
        assert!(validate_envelope_fields(&missing_actor).is_err());
    }
}
