//! S4 — expiry sweep: react to the scheduler's `lot-expiry-check` tick by
//! quarantining every lot whose expiration date has passed.

use async_trait::async_trait;
use chrono::Utc;
use event_bus::{Actor, EventEnvelope};
use event_consumer::{Agent, AgentContext, AgentOutcome};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

pub struct ExpirySweepAgent {
    pool: PgPool,
}

impl ExpirySweepAgent {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ExpiredLotRow {
    lot_id: Uuid,
    product_id: Uuid,
    expiration_date: chrono::NaiveDate,
}

#[async_trait]
impl Agent for ExpirySweepAgent {
    fn name(&self) -> &str {
        "expiry-sweep"
    }

    fn description(&self) -> &str {
        "Quarantines lots past their expiration date on each scheduled expiry check"
    }

    fn subscribes_to(&self) -> &[String] {
        static EVENTS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        EVENTS.get_or_init(|| vec!["Scheduled.ExpiryCheck".to_string()])
    }

    async fn handle(&self, envelope: &EventEnvelope<Value>, _ctx: &AgentContext) -> AgentOutcome {
        let today = Utc::now().date_naive();

        let expired = match sqlx::query_as::<_, ExpiredLotRow>(
            r#"
            SELECT lot_id, product_id, expiration_date
            FROM lot_batches
            WHERE tenant_id = $1 AND status = 'AVAILABLE' AND expiration_date < $2
            "#,
        )
        .bind(envelope.tenant_id)
        .bind(today)
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows,
            Err(error) => return AgentOutcome::failed("failed to load expired lots", vec![error.to_string()]),
        };

        if expired.is_empty() {
            return AgentOutcome::ok("no lots past expiration");
        }

        let mut derived = Vec::with_capacity(expired.len());
        for lot in &expired {
            if let Err(error) = sqlx::query("UPDATE lot_batches SET status = 'EXPIRED' WHERE lot_id = $1")
                .bind(lot.lot_id)
                .execute(&self.pool)
                .await
            {
                return AgentOutcome::failed("failed to mark lot expired", vec![error.to_string()]);
            }

            let days_expired = (today - lot.expiration_date).num_days().max(0);

            match envelope.derive(
                "Inventory.LotExpired",
                json!({
                    "lot_id": lot.lot_id,
                    "product_id": lot.product_id,
                    "action_taken": "AUTO_QUARANTINE",
                    "days_expired": days_expired,
                }),
                Actor::agent(self.name()),
            ) {
                Ok(e) => derived.push(e),
                Err(error) => return AgentOutcome::failed("failed to derive envelope", vec![error.to_string()]),
            }
        }

        AgentOutcome::ok_with(format!("quarantined {} expired lots", expired.len()), derived)
    }
}
