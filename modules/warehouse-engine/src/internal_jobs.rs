//! In-process scheduled jobs — the ones whose `event_type` is prefixed
//! `internal:` and therefore never produce an envelope (C11).

use async_trait::async_trait;
use outbox::OutboxStore;
use scheduler::InternalJobHandler;
use std::sync::Arc;

pub struct OutboxGcHandler {
    outbox: Arc<OutboxStore>,
    retention_days: i64,
}

impl OutboxGcHandler {
    pub fn new(outbox: Arc<OutboxStore>, retention_days: i64) -> Self {
        Self {
            outbox,
            retention_days,
        }
    }
}

#[async_trait]
impl InternalJobHandler for OutboxGcHandler {
    async fn run(&self, job_name: &str) -> Result<(), String> {
        let deleted = self
            .outbox
            .gc(self.retention_days)
            .await
            .map_err(|e| e.to_string())?;
        tracing::info!(job_name, deleted, "outbox GC removed published rows past retention");
        Ok(())
    }
}
