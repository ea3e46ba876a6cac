//! S3 — low-stock cascade: after a movement, compare the product's total
//! available quantity in the warehouse against its reorder point and
//! safety stock, escalating WARNING → CRITICAL.

use async_trait::async_trait;
use event_bus::{Actor, EventEnvelope};
use event_consumer::{Agent, AgentContext, AgentOutcome};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

pub struct LowStockAlertAgent {
    pool: PgPool,
}

impl LowStockAlertAgent {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Deserialize)]
struct MovementRecordedPayload {
    product_id: Uuid,
}

#[async_trait]
impl Agent for LowStockAlertAgent {
    fn name(&self) -> &str {
        "low-stock-alert"
    }

    fn description(&self) -> &str {
        "Watches post-movement available quantity against reorder point and safety stock"
    }

    fn subscribes_to(&self) -> &[String] {
        static EVENTS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        EVENTS.get_or_init(|| vec!["Inventory.MovementRecorded".to_string()])
    }

    async fn handle(&self, envelope: &EventEnvelope<Value>, ctx: &AgentContext) -> AgentOutcome {
        let Some(warehouse_id) = ctx.warehouse_id else {
            return AgentOutcome::failed("MovementRecorded requires a warehouse_id", vec!["missing warehouse_id".to_string()]);
        };

        let payload: MovementRecordedPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(p) => p,
            Err(error) => return AgentOutcome::failed("malformed MovementRecorded payload", vec![error.to_string()]),
        };

        let thresholds: Option<(i64, i64)> = match sqlx::query_as(
            "SELECT reorder_point, safety_stock FROM products WHERE product_id = $1",
        )
        .bind(payload.product_id)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(row) => row,
            Err(error) => return AgentOutcome::failed("failed to load product thresholds", vec![error.to_string()]),
        };

        let Some((reorder_point, safety_stock)) = thresholds else {
            return AgentOutcome::ok("product carries no reorder thresholds, nothing to evaluate");
        };

        let available: Option<i64> = match sqlx::query_scalar(
            "SELECT COALESCE(SUM(available), 0) FROM stock_levels WHERE product_id = $1 AND warehouse_id = $2",
        )
        .bind(payload.product_id)
        .bind(warehouse_id)
        .fetch_one(&self.pool)
        .await
        {
            Ok(sum) => sum,
            Err(error) => return AgentOutcome::failed("failed to sum available stock", vec![error.to_string()]),
        };
        let available = available.unwrap_or(0);

        let alert_level = if available <= safety_stock {
            "CRITICAL"
        } else if available <= reorder_point {
            "WARNING"
        } else {
            return AgentOutcome::ok("available stock is above reorder point, no alert needed");
        };

        let derived = match envelope.derive(
            "Inventory.LowStockAlert",
            json!({
                "product_id": payload.product_id,
                "warehouse_id": warehouse_id,
                "available": available,
                "reorder_point": reorder_point,
                "safety_stock": safety_stock,
                "alert_level": alert_level,
            }),
            Actor::agent(self.name()),
        ) {
            Ok(e) => e,
            Err(error) => return AgentOutcome::failed("failed to derive envelope", vec![error.to_string()]),
        };

        AgentOutcome::ok_with(format!("raised {alert_level} low-stock alert"), vec![derived])
    }
}
