//! Bounded-concurrency execution of every agent subscribed to one inbound
//! envelope.

use crate::agent::AgentContext;
use crate::registry::AgentRegistry;
use event_bus::EventEnvelope;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Agents for one inbound envelope are partitioned into batches of
    /// this size and run in parallel, one batch at a time.
    pub concurrency: usize,
    /// Per-agent invocation deadline. A timed-out agent counts as a
    /// failure; the runtime does not retry it within the same run.
    pub agent_timeout: Duration,
    /// `true` (default): a failing agent in a batch does not block the
    /// remaining agents in that batch or later batches. `false`:
    /// short-circuits as soon as any failure in the current batch is
    /// observed.
    pub continue_on_error: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            agent_timeout: Duration::from_secs(30),
            continue_on_error: true,
        }
    }
}

/// Result of running every agent subscribed to one inbound envelope.
#[derive(Debug)]
pub struct RunOutcome {
    pub wall_time: Duration,
    pub successes: usize,
    pub failures: usize,
    /// Envelopes agents returned, in agent-completion order, with
    /// tenant/correlation/causation rewritten defensively by the harness.
    pub derived: Vec<EventEnvelope<Value>>,
}

pub struct AgentRuntime {
    registry: Arc<AgentRegistry>,
    config: RuntimeConfig,
}

impl AgentRuntime {
    pub fn new(registry: Arc<AgentRegistry>, config: RuntimeConfig) -> Self {
        Self { registry, config }
    }

    /// Run every agent subscribed to `envelope.event_type` and collect
    /// their derived envelopes. Agents for the same inbound envelope may
    /// execute in parallel; isolation across different inbound envelopes
    /// is the consumer's responsibility (prefetch count), not this
    /// runtime's.
    pub async fn run(&self, envelope: &EventEnvelope<Value>, ctx: AgentContext) -> RunOutcome {
        let agents = self.registry.agents_for(&envelope.event_type);
        let start = Instant::now();

        let mut successes = 0;
        let mut failures = 0;
        let mut derived = Vec::new();

        for batch in agents.chunks(self.config.concurrency) {
            let invocations = batch.iter().map(|agent| {
                let agent = Arc::clone(agent);
                let envelope = envelope.clone();
                let ctx = ctx.clone();
                let timeout = self.config.agent_timeout;
                async move {
                    match tokio::time::timeout(timeout, agent.handle(&envelope, &ctx)).await {
                        Ok(outcome) => outcome,
                        Err(_) => {
                            tracing::warn!(
                                agent = %agent.name(),
                                event_id = %envelope.event_id,
                                "agent invocation timed out"
                            );
                            crate::agent::AgentOutcome::failed(
                                format!("agent '{}' timed out", agent.name()),
                                vec![format!(
                                    "timed out after {:?} processing {}",
                                    timeout, envelope.event_type
                                )],
                            )
                        }
                    }
                }
            });

            let outcomes = join_all(invocations).await;

            let mut batch_failed = false;
            for outcome in outcomes {
                if outcome.success {
                    successes += 1;
                } else {
                    failures += 1;
                    batch_failed = true;
                }
                for candidate in outcome.derived {
                    derived.push(rewrite_derived(envelope, candidate));
                }
            }

            if batch_failed && !self.config.continue_on_error {
                break;
            }
        }

        RunOutcome {
            wall_time: start.elapsed(),
            successes,
            failures,
            derived,
        }
    }
}

/// Force tenant id, correlation id, and causation id on an agent-returned
/// envelope to match the inbound one, regardless of what the agent set —
/// the one piece of the contract enforced defensively rather than by
/// trusting agent authors.
fn rewrite_derived(
    inbound: &EventEnvelope<Value>,
    mut derived: EventEnvelope<Value>,
) -> EventEnvelope<Value> {
    derived.tenant_id = inbound.tenant_id;
    derived.correlation_id = inbound.correlation_id;
    derived.causation_id = Some(inbound.event_id);
    derived
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentOutcome, CATCH_ALL};
    use async_trait::async_trait;
    use event_bus::{Actor, EnvelopeContext};
    use uuid::Uuid;

    fn inbound() -> EventEnvelope<Value> {
        EventEnvelope::new(
            "Inventory.StockAdjusted",
            serde_json::json!({}),
            EnvelopeContext {
                correlation_id: Uuid::new_v4(),
                causation_id: None,
                actor: Actor::system("test"),
                tenant_id: Uuid::new_v4(),
                warehouse_id: None,
            },
        )
        .unwrap()
    }

    struct Succeeds;
    #[async_trait]
    impl Agent for Succeeds {
        fn name(&self) -> &str {
            "succeeds"
        }
        fn description(&self) -> &str {
            ""
        }
        fn subscribes_to(&self) -> &[String] {
            static SUBS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
            SUBS.get_or_init(|| vec![CATCH_ALL.to_string()])
        }
        async fn handle(&self, inbound: &EventEnvelope<Value>, _: &AgentContext) -> AgentOutcome {
            let derived = inbound
                .derive(
                    "Inventory.LowStockAlert",
                    serde_json::json!({"alert_level": "WARNING"}),
                    Actor::agent("succeeds"),
                )
                .unwrap();
            AgentOutcome::ok_with("done", vec![derived])
        }
    }

    struct AlwaysFails;
    #[async_trait]
    impl Agent for AlwaysFails {
        fn name(&self) -> &str {
            "fails"
        }
        fn description(&self) -> &str {
            ""
        }
        fn subscribes_to(&self) -> &[String] {
            static SUBS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
            SUBS.get_or_init(|| vec![CATCH_ALL.to_string()])
        }
        async fn handle(&self, _: &EventEnvelope<Value>, _: &AgentContext) -> AgentOutcome {
            AgentOutcome::failed("boom", vec!["infra error".into()])
        }
    }

    fn ctx(inbound: &EventEnvelope<Value>) -> AgentContext {
        AgentContext {
            tenant_id: inbound.tenant_id,
            warehouse_id: inbound.warehouse_id,
            correlation_id: inbound.correlation_id,
        }
    }

    #[tokio::test]
    async fn rewrites_tenant_correlation_causation_on_derived_envelopes() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(Succeeds));
        let runtime = AgentRuntime::new(Arc::new(registry), RuntimeConfig::default());

        let inbound = inbound();
        let outcome = runtime.run(&inbound, ctx(&inbound)).await;

        assert_eq!(outcome.successes, 1);
        assert_eq!(outcome.derived.len(), 1);
        let derived = &outcome.derived[0];
        assert_eq!(derived.tenant_id, inbound.tenant_id);
        assert_eq!(derived.correlation_id, inbound.correlation_id);
        assert_eq!(derived.causation_id, Some(inbound.event_id));
    }

    #[tokio::test]
    async fn continue_on_error_runs_remaining_batches() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(AlwaysFails));
        registry.register(Arc::new(Succeeds));
        let runtime = AgentRuntime::new(
            Arc::new(registry),
            RuntimeConfig {
                concurrency: 1,
                continue_on_error: true,
                ..RuntimeConfig::default()
            },
        );

        let inbound = inbound();
        let outcome = runtime.run(&inbound, ctx(&inbound)).await;

        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.successes, 1);
    }

    #[tokio::test]
    async fn short_circuits_remaining_batches_when_continue_on_error_false() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(AlwaysFails));
        registry.register(Arc::new(Succeeds));
        let runtime = AgentRuntime::new(
            Arc::new(registry),
            RuntimeConfig {
                concurrency: 1,
                continue_on_error: false,
                ..RuntimeConfig::default()
            },
        );

        let inbound = inbound();
        let outcome = runtime.run(&inbound, ctx(&inbound)).await;

        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.successes, 0);
    }
}
