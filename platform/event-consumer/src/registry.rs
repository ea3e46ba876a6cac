//! Process-wide map from event type to subscribed agents.

use crate::agent::{Agent, CATCH_ALL};
use std::collections::HashMap;
use std::sync::Arc;

/// Initialized at process start; read-only during steady state (no
/// interior mutability — build it once, wrap in `Arc`, share).
#[derive(Default)]
pub struct AgentRegistry {
    by_name: HashMap<String, Arc<dyn Agent>>,
    by_event_type: HashMap<String, Vec<String>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the subscription index for each event type the agent
    /// declares, plus `CATCH_ALL` handling. Registering a name that's
    /// already present replaces the prior entry with a warning.
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        if self.by_name.contains_key(&name) {
            tracing::warn!(agent = %name, "replacing existing agent registration");
            self.unregister(&name);
        }

        for event_type in agent.subscribes_to() {
            self.by_event_type
                .entry(event_type.clone())
                .or_default()
                .push(name.clone());
        }

        self.by_name.insert(name, agent);
    }

    pub fn unregister(&mut self, name: &str) {
        if let Some(agent) = self.by_name.remove(name) {
            for event_type in agent.subscribes_to() {
                if let Some(names) = self.by_event_type.get_mut(event_type) {
                    names.retain(|n| n != name);
                }
            }
        }
    }

    /// Agents subscribed to `event_type` specifically, unioned with agents
    /// subscribed to `CATCH_ALL`, de-duplicated by name.
    pub fn agents_for(&self, event_type: &str) -> Vec<Arc<dyn Agent>> {
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();

        for name in self
            .by_event_type
            .get(event_type)
            .into_iter()
            .flatten()
            .chain(self.by_event_type.get(CATCH_ALL).into_iter().flatten())
        {
            if seen.insert(name.clone()) {
                if let Some(agent) = self.by_name.get(name) {
                    out.push(agent.clone());
                }
            }
        }

        out
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentContext, AgentOutcome};
    use async_trait::async_trait;
    use event_bus::EventEnvelope;
    use serde_json::Value;

    struct Stub {
        name: String,
        subscribes: Vec<String>,
    }

    #[async_trait]
    impl Agent for Stub {
        fn name(&self) -> &str {
            &self.name
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn subscribes_to(&self) -> &[String] {
            &self.subscribes
        }
        async fn handle(&self, _: &EventEnvelope<Value>, _: &AgentContext) -> AgentOutcome {
            AgentOutcome::ok("stub")
        }
    }

    #[test]
    fn agents_for_unions_specific_and_catch_all() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(Stub {
            name: "specific".into(),
            subscribes: vec!["Inventory.StockAdjusted".into()],
        }));
        registry.register(Arc::new(Stub {
            name: "catch-all".into(),
            subscribes: vec![CATCH_ALL.into()],
        }));

        let agents = registry.agents_for("Inventory.StockAdjusted");
        let names: Vec<_> = agents.iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"specific".to_string()));
        assert!(names.contains(&"catch-all".to_string()));

        let unrelated = registry.agents_for("SalesOrder.OrderPlaced");
        assert_eq!(unrelated.len(), 1);
        assert_eq!(unrelated[0].name(), "catch-all");
    }

    #[test]
    fn reregistering_same_name_replaces() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(Stub {
            name: "a".into(),
            subscribes: vec!["X.Y".into()],
        }));
        registry.register(Arc::new(Stub {
            name: "a".into(),
            subscribes: vec!["Z.W".into()],
        }));

        assert_eq!(registry.len(), 1);
        assert!(registry.agents_for("X.Y").is_empty());
        assert_eq!(registry.agents_for("Z.W").len(), 1);
    }

    #[test]
    fn unregister_removes_from_both_indexes() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(Stub {
            name: "a".into(),
            subscribes: vec!["X.Y".into()],
        }));
        registry.unregister("a");
        assert!(registry.is_empty());
        assert!(registry.agents_for("X.Y").is_empty());
    }
}
