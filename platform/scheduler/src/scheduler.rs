//! The scheduler ticker: checks the static job list against the wall
//! clock and fans synthetic events out per tenant and warehouse.

use crate::directory::TenantDirectory;
use crate::internal::InternalJobHandler;
use crate::jobs::{default_jobs, JobDefinition, TenantScope};
use chrono::{DateTime, Utc};
use cron::Schedule;
use event_bus::{Actor, EnvelopeContext, EventEnvelope};
use outbox::OutboxStore;
use serde_json::json;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid cron expression for job '{job}': {source}")]
    InvalidCronExpression {
        job: &'static str,
        source: cron::error::Error,
    },
}

struct ScheduledJob {
    definition: JobDefinition,
    schedule: Schedule,
}

pub struct Scheduler {
    jobs: Vec<ScheduledJob>,
    tenant_directory: Arc<dyn TenantDirectory>,
    internal_handlers: HashMap<&'static str, Arc<dyn InternalJobHandler>>,
    outbox: Arc<OutboxStore>,
    last_checked: DateTime<Utc>,
    check_interval: Duration,
}

impl Scheduler {
    pub fn new(
        tenant_directory: Arc<dyn TenantDirectory>,
        outbox: Arc<OutboxStore>,
    ) -> Result<Self, SchedulerError> {
        Self::with_jobs(default_jobs(), tenant_directory, outbox)
    }

    pub fn with_jobs(
        definitions: Vec<JobDefinition>,
        tenant_directory: Arc<dyn TenantDirectory>,
        outbox: Arc<OutboxStore>,
    ) -> Result<Self, SchedulerError> {
        let jobs = definitions
            .into_iter()
            .map(|definition| {
                let schedule = Schedule::from_str(definition.cron_expr).map_err(|source| {
                    SchedulerError::InvalidCronExpression {
                        job: definition.name,
                        source,
                    }
                })?;
                Ok(ScheduledJob { definition, schedule })
            })
            .collect::<Result<Vec<_>, SchedulerError>>()?;

        Ok(Self {
            jobs,
            tenant_directory,
            internal_handlers: HashMap::new(),
            outbox,
            last_checked: Utc::now(),
            check_interval: Duration::from_secs(30),
        })
    }

    pub fn register_internal_handler(
        &mut self,
        job_name: &'static str,
        handler: Arc<dyn InternalJobHandler>,
    ) {
        self.internal_handlers.insert(job_name, handler);
    }

    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Run until `cancel_token` fires.
    pub async fn start(mut self, cancel_token: CancellationToken) {
        tracing::info!(jobs = self.jobs.len(), "starting scheduler");
        let mut interval = tokio::time::interval(self.check_interval);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::info!("scheduler shutdown requested");
                    break;
                }
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
            }
        }

        tracing::info!("scheduler stopped");
    }

    /// Check every job's schedule against `now`, firing any job whose
    /// next occurrence since the last check has arrived.
    pub async fn tick(&mut self, now: DateTime<Utc>) {
        for job in &self.jobs {
            let due = job.schedule.after(&self.last_checked).take_while(|t| *t <= now).count() > 0;
            if !due {
                continue;
            }

            if job.definition.is_internal() {
                self.run_internal(&job.definition).await;
            } else {
                self.fan_out(&job.definition).await;
            }
        }

        self.last_checked = now;
    }

    async fn run_internal(&self, job: &JobDefinition) {
        let bare_name = job.event_type.trim_start_matches("internal:");
        match self.internal_handlers.get(job.name) {
            Some(handler) => {
                if let Err(error) = handler.run(bare_name).await {
                    tracing::error!(job = job.name, %error, "internal job failed");
                }
            }
            None => {
                tracing::warn!(job = job.name, "no handler registered for internal job");
            }
        }
    }

    async fn fan_out(&self, job: &JobDefinition) {
        let tenants = match &job.tenant_scope {
            TenantScope::All => self.tenant_directory.active_tenants().await,
            TenantScope::Specific(id) => vec![*id],
        };

        for tenant_id in tenants {
            let warehouses = self.tenant_directory.active_warehouses(tenant_id).await;
            for warehouse_id in warehouses {
                if let Err(error) = self.emit_one(job, tenant_id, warehouse_id).await {
                    tracing::error!(job = job.name, %tenant_id, %warehouse_id, %error, "failed to enqueue scheduled event");
                }
            }
        }
    }

    async fn emit_one(
        &self,
        job: &JobDefinition,
        tenant_id: Uuid,
        warehouse_id: Uuid,
    ) -> Result<(), outbox::OutboxError> {
        let mut payload = (job.payload_skeleton)();
        if let Some(obj) = payload.as_object_mut() {
            obj.insert("warehouse_id".to_string(), json!(warehouse_id));
            obj.insert("triggered_by".to_string(), json!("scheduler"));
            obj.insert("job_name".to_string(), json!(job.name));
        }

        let envelope = EventEnvelope::new(
            job.event_type,
            payload,
            EnvelopeContext {
                correlation_id: Uuid::new_v4(),
                causation_id: None,
                actor: Actor::system("scheduler"),
                tenant_id,
                warehouse_id: Some(warehouse_id),
            },
        )
        .expect("default job event types are grammar-valid by construction");

        let routing_key = event_bus::routing_key_for(&envelope.event_type);
        let envelope_json = serde_json::to_value(&envelope).expect("envelope always serializes");

        self.outbox
            .append_and_enqueue(envelope.event_id, tenant_id, &routing_key, envelope_json)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDirectory {
        tenant: Uuid,
        warehouse: Uuid,
    }

    #[async_trait]
    impl TenantDirectory for FixedDirectory {
        async fn active_tenants(&self) -> Vec<Uuid> {
            vec![self.tenant]
        }
        async fn active_warehouses(&self, _tenant_id: Uuid) -> Vec<Uuid> {
            vec![self.warehouse]
        }
    }

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl InternalJobHandler for CountingHandler {
        async fn run(&self, _job_name: &str) -> Result<(), String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn every_default_job_parses_as_a_valid_cron_expression() {
        for job in default_jobs() {
            Schedule::from_str(job.cron_expr)
                .unwrap_or_else(|e| panic!("job '{}' has an invalid cron expression: {e}", job.name));
        }
    }

    #[test]
    fn internal_job_name_strips_prefix() {
        let job = default_jobs()
            .into_iter()
            .find(|j| j.name == "outbox-cleanup")
            .unwrap();
        assert_eq!(job.event_type.trim_start_matches("internal:"), "outbox-cleanup");
    }
}
