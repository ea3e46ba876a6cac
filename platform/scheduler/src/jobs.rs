//! The static, compile-time list of cron jobs.

use serde_json::{json, Value};
use uuid::Uuid;

/// Which tenants a job fans out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TenantScope {
    All,
    Specific(Uuid),
}

#[derive(Debug, Clone)]
pub struct JobDefinition {
    pub name: &'static str,
    /// Standard five-field cron expression, evaluated in UTC.
    pub cron_expr: &'static str,
    /// The event type minted for each (tenant, warehouse) pair, or an
    /// `internal:`-prefixed job name handled in-process with no envelope.
    pub event_type: &'static str,
    pub payload_skeleton: fn() -> Value,
    pub tenant_scope: TenantScope,
}

impl JobDefinition {
    pub fn is_internal(&self) -> bool {
        self.event_type.starts_with("internal:")
    }
}

/// Job names are part of the contract — do not rename without updating
/// every operator runbook and alert that keys on them.
pub fn default_jobs() -> Vec<JobDefinition> {
    vec![
        JobDefinition {
            name: "lot-expiry-check",
            cron_expr: "0 0 0 * * *",
            event_type: "Scheduled.ExpiryCheck",
            payload_skeleton: || json!({}),
            tenant_scope: TenantScope::All,
        },
        JobDefinition {
            name: "abc-xyz-analysis",
            cron_expr: "0 0 2 1 * *",
            event_type: "Scheduled.AbcXyzAnalysis",
            payload_skeleton: || json!({}),
            tenant_scope: TenantScope::All,
        },
        JobDefinition {
            name: "safety-stock-recalc",
            cron_expr: "0 0 3 * * SUN",
            event_type: "Scheduled.SafetyStockRecalc",
            payload_skeleton: || json!({}),
            tenant_scope: TenantScope::All,
        },
        JobDefinition {
            name: "demand-forecast",
            cron_expr: "0 0 4 * * SUN",
            event_type: "Scheduled.DemandForecast",
            payload_skeleton: || json!({}),
            tenant_scope: TenantScope::All,
        },
        JobDefinition {
            name: "outbox-cleanup",
            cron_expr: "0 0 5 * * *",
            event_type: "internal:outbox-cleanup",
            payload_skeleton: || json!({}),
            tenant_scope: TenantScope::All,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_job_names_are_stable() {
        let names: Vec<_> = default_jobs().iter().map(|j| j.name).collect();
        assert_eq!(
            names,
            vec![
                "lot-expiry-check",
                "abc-xyz-analysis",
                "safety-stock-recalc",
                "demand-forecast",
                "outbox-cleanup",
            ]
        );
    }

    #[test]
    fn only_outbox_cleanup_is_internal() {
        for job in default_jobs() {
            assert_eq!(job.is_internal(), job.name == "outbox-cleanup");
        }
    }
}
