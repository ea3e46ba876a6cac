//! S2 — FEFO reservation: allocate a sales-order line against available
//! stock in first-expire-first-out order and reserve the quantity taken
//! from each source in the same transaction that records the reservation.

use async_trait::async_trait;
use chrono::Utc;
use event_bus::{Actor, EventEnvelope};
use event_consumer::{Agent, AgentContext, AgentOutcome};
use inventory_core::{
    allocate, AllocationRequest, AllocationSource, LotStatus, MutatorError, SourceLot, StockDeltas,
    StockMutator,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

pub struct FefoReservationAgent {
    pool: PgPool,
    mutator: StockMutator,
}

impl FefoReservationAgent {
    pub fn new(pool: PgPool) -> Self {
        let mutator = StockMutator::new(pool.clone());
        Self { pool, mutator }
    }
}

#[derive(Debug, Deserialize)]
struct OrderPlacedLine {
    product_id: Uuid,
    variant_id: Option<Uuid>,
    quantity: i64,
    order_id: Uuid,
    line_number: i32,
}

#[derive(sqlx::FromRow)]
struct SourceRow {
    stock_level_id: Uuid,
    variant_id: Option<Uuid>,
    location_id: Uuid,
    available: i64,
    row_version: i64,
    lot_id: Option<Uuid>,
    lot_status: Option<String>,
    expiration_date: Option<chrono::NaiveDate>,
    received_date: Option<chrono::NaiveDate>,
}

#[async_trait]
impl Agent for FefoReservationAgent {
    fn name(&self) -> &str {
        "fefo-reservation"
    }

    fn description(&self) -> &str {
        "Reserves stock for a placed sales order line in first-expire-first-out order"
    }

    fn subscribes_to(&self) -> &[String] {
        static EVENTS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        EVENTS.get_or_init(|| vec!["SalesOrder.OrderPlaced".to_string()])
    }

    async fn handle(&self, envelope: &EventEnvelope<Value>, ctx: &AgentContext) -> AgentOutcome {
        let Some(warehouse_id) = ctx.warehouse_id else {
            return AgentOutcome::failed("OrderPlaced requires a warehouse_id", vec!["missing warehouse_id".to_string()]);
        };

        let line: OrderPlacedLine = match serde_json::from_value(envelope.payload.clone()) {
            Ok(line) => line,
            Err(error) => return AgentOutcome::failed("malformed OrderPlaced payload", vec![error.to_string()]),
        };

        let rows = match sqlx::query_as::<_, SourceRow>(
            r#"
            SELECT sl.stock_level_id, sl.variant_id, sl.location_id, sl.available, sl.row_version,
                   lb.lot_id, lb.status::text AS lot_status, lb.expiration_date, lb.received_date
            FROM stock_levels sl
            LEFT JOIN lot_batches lb ON lb.lot_id = sl.lot_id
            WHERE sl.product_id = $1 AND sl.warehouse_id = $2 AND sl.available > 0
            "#,
        )
        .bind(line.product_id)
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows,
            Err(error) => return AgentOutcome::failed("failed to load stock sources", vec![error.to_string()]),
        };

        let version_by_stock_level: std::collections::HashMap<Uuid, i64> =
            rows.iter().map(|r| (r.stock_level_id, r.row_version)).collect();

        let sources: Vec<AllocationSource> = rows
            .into_iter()
            .map(|r| AllocationSource {
                stock_level_id: r.stock_level_id,
                product_id: line.product_id,
                variant_id: r.variant_id,
                warehouse_id,
                location_id: r.location_id,
                available: r.available,
                lot: r.lot_id.map(|lot_id| SourceLot {
                    lot_id,
                    status: parse_status(r.lot_status.as_deref()),
                    expiration_date: r.expiration_date,
                    received_date: r.received_date.unwrap_or_else(|| Utc::now().date_naive()),
                }),
                location_pick_sequence: 0,
            })
            .collect();

        let request = AllocationRequest {
            product_id: line.product_id,
            variant_id: line.variant_id,
            warehouse_id,
            quantity: line.quantity,
            preferred_locations: vec![],
            excluded_lots: vec![],
            min_days_to_expiration: 0,
            today: Utc::now().date_naive(),
        };

        let result = allocate(&request, &sources);

        let mut tx = match self.pool.begin().await {
            Ok(tx) => tx,
            Err(error) => return AgentOutcome::failed("failed to open transaction", vec![error.to_string()]),
        };

        for allocation_line in &result.lines {
            let expected_version = version_by_stock_level
                .get(&allocation_line.stock_level_id)
                .copied()
                .unwrap_or(0);

            let deltas = StockDeltas {
                reserved: allocation_line.quantity,
                ..Default::default()
            };

            if let Err(error) = self
                .mutator
                .adjust_tx(&mut tx, allocation_line.stock_level_id, deltas, expected_version)
                .await
            {
                return AgentOutcome::failed("failed to reserve stock", vec![describe_mutator_error(error)]);
            }

            let reservation_id = Uuid::new_v4();
            if let Err(error) = sqlx::query(
                r#"
                INSERT INTO reservations
                    (reservation_id, product_id, variant_id, stock_level_id, lot_id, quantity,
                     quantity_fulfilled, reference_type, reference_id, reference_line, status, expires_at)
                VALUES ($1, $2, $3, $4, $5, $6, 0, 'SALES_ORDER', $7, $8, 'ACTIVE', NULL)
                "#,
            )
            .bind(reservation_id)
            .bind(line.product_id)
            .bind(line.variant_id)
            .bind(allocation_line.stock_level_id)
            .bind(allocation_line.lot_id)
            .bind(allocation_line.quantity)
            .bind(line.order_id)
            .bind(line.line_number)
            .execute(&mut *tx)
            .await
            {
                return AgentOutcome::failed("failed to record reservation", vec![error.to_string()]);
            }
        }

        if let Err(error) = tx.commit().await {
            return AgentOutcome::failed("failed to commit reservation transaction", vec![error.to_string()]);
        }

        let event_type = if result.fully_allocated {
            "SalesOrder.OrderFullyAllocated"
        } else {
            "SalesOrder.OrderPartiallyAllocated"
        };

        let derived = match envelope.derive(
            event_type,
            json!({
                "order_id": line.order_id,
                "line_number": line.line_number,
                "product_id": line.product_id,
                "quantity_requested": line.quantity,
                "quantity_allocated": line.quantity - result.shortfall_quantity,
                "shortfall_quantity": result.shortfall_quantity,
                "lines": result.lines,
            }),
            Actor::agent(self.name()),
        ) {
            Ok(e) => e,
            Err(error) => return AgentOutcome::failed("failed to derive envelope", vec![error.to_string()]),
        };

        AgentOutcome::ok_with(
            format!("allocated {} of {} requested", line.quantity - result.shortfall_quantity, line.quantity),
            vec![derived],
        )
    }
}

fn parse_status(raw: Option<&str>) -> LotStatus {
    match raw.map(|s| s.to_uppercase()).as_deref() {
        Some("RELEASED") => LotStatus::Released,
        Some("QUARANTINE") => LotStatus::Quarantine,
        Some("HOLD") => LotStatus::Hold,
        Some("EXPIRED") => LotStatus::Expired,
        _ => LotStatus::Available,
    }
}

fn describe_mutator_error(error: MutatorError) -> String {
    error.to_string()
}
