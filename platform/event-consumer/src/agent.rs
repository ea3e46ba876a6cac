//! The one contract every reaction handler implements.

use async_trait::async_trait;
use event_bus::EventEnvelope;
use serde_json::Value;
use uuid::Uuid;

/// Execution context handed to an agent for one invocation. Carried over
/// unchanged from the inbound envelope; an agent never constructs its own.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub tenant_id: Uuid,
    pub warehouse_id: Option<Uuid>,
    pub correlation_id: Uuid,
}

/// What an agent returns for one invocation.
///
/// Agents never publish directly — `derived` envelopes are handed back to
/// the runtime, which hands them to the consumer for publication through
/// the outbox. An agent that reaches for broker I/O directly is a contract
/// violation the harness has no way to catch at compile time; it is the
/// one invariant enforced purely by convention.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub success: bool,
    pub message: String,
    pub data: Option<Value>,
    pub derived: Vec<EventEnvelope<Value>>,
    pub errors: Vec<String>,
}

impl AgentOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            derived: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn ok_with(message: impl Into<String>, derived: Vec<EventEnvelope<Value>>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
            derived,
            errors: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
            derived: Vec::new(),
            errors,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Subscribing to this means "every event type".
pub const CATCH_ALL: &str = "*";

/// A reaction handler: subscribes to one or more event types and reacts to
/// an inbound envelope by returning zero or more derived envelopes. Must be
/// idempotent — safe to run twice on the same inbound envelope (the
/// envelope may be redelivered after a crash before ack) — and must
/// complete within the runtime's per-agent timeout.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique across the registry. Registering a second agent under the
    /// same name replaces the first.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Event types this agent reacts to. `CATCH_ALL` subscribes to every
    /// event type.
    fn subscribes_to(&self) -> &[String];

    async fn handle(&self, envelope: &EventEnvelope<Value>, ctx: &AgentContext) -> AgentOutcome;
}
