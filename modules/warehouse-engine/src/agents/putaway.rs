//! S1 — receipt→putaway suggestion: score every active location in the
//! receiving warehouse and emit the ranked list.

use async_trait::async_trait;
use event_bus::{Actor, EventEnvelope};
use event_consumer::{Agent, AgentContext, AgentOutcome};
use inventory_core::{score_locations, AbcClass, LocationCandidate, LocationKind, ScoreWeights, SlottingContext, TemperatureZone};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

pub struct ReceiptPutawayAgent {
    pool: PgPool,
}

impl ReceiptPutawayAgent {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, Deserialize)]
struct GoodsReceivedPayload {
    product_id: Uuid,
    quantity: i64,
}

#[derive(sqlx::FromRow)]
struct LocationRow {
    location_id: Uuid,
    active: bool,
    zone: String,
    kind: String,
    hazmat_certified: bool,
    utilization_pct: f64,
    distance_from_dock: f64,
    pick_frequency: f64,
    pick_sequence: i32,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    abc_class: String,
    hazmat: bool,
    temperature_zone: Option<String>,
}

#[async_trait]
impl Agent for ReceiptPutawayAgent {
    fn name(&self) -> &str {
        "receipt-putaway"
    }

    fn description(&self) -> &str {
        "Scores candidate locations for a newly received quantity and suggests the best slot"
    }

    fn subscribes_to(&self) -> &[String] {
        static EVENTS: std::sync::OnceLock<Vec<String>> = std::sync::OnceLock::new();
        EVENTS.get_or_init(|| vec!["Inventory.GoodsReceived".to_string()])
    }

    async fn handle(&self, envelope: &EventEnvelope<Value>, ctx: &AgentContext) -> AgentOutcome {
        let Some(warehouse_id) = ctx.warehouse_id else {
            return AgentOutcome::failed("GoodsReceived requires a warehouse_id", vec!["missing warehouse_id".to_string()]);
        };

        let payload: GoodsReceivedPayload = match serde_json::from_value(envelope.payload.clone()) {
            Ok(p) => p,
            Err(error) => return AgentOutcome::failed("malformed GoodsReceived payload", vec![error.to_string()]),
        };

        let product = match sqlx::query_as::<_, ProductRow>(
            "SELECT abc_class, hazmat, temperature_zone FROM products WHERE product_id = $1",
        )
        .bind(payload.product_id)
        .fetch_optional(&self.pool)
        .await
        {
            Ok(Some(row)) => row,
            Ok(None) => return AgentOutcome::failed("product not found", vec![format!("no product {}", payload.product_id)]),
            Err(error) => return AgentOutcome::failed("failed to load product", vec![error.to_string()]),
        };

        let locations = match sqlx::query_as::<_, LocationRow>(
            r#"
            SELECT location_id, active, zone, kind, hazmat_certified,
                   utilization_pct, distance_from_dock, pick_frequency, pick_sequence
            FROM locations
            WHERE warehouse_id = $1
            "#,
        )
        .bind(warehouse_id)
        .fetch_all(&self.pool)
        .await
        {
            Ok(rows) => rows,
            Err(error) => return AgentOutcome::failed("failed to load locations", vec![error.to_string()]),
        };

        let candidates: Vec<LocationCandidate> = locations
            .iter()
            .filter_map(|row| {
                Some(LocationCandidate {
                    location_id: row.location_id,
                    active: row.active,
                    zone: parse_zone(&row.zone)?,
                    kind: parse_kind(&row.kind)?,
                    hazmat_certified: row.hazmat_certified,
                    utilization_pct: row.utilization_pct,
                    distance_from_dock: row.distance_from_dock,
                    pick_frequency: row.pick_frequency,
                    pick_sequence: row.pick_sequence,
                })
            })
            .collect();

        let max_distance = candidates.iter().map(|c| c.distance_from_dock).fold(0.0, f64::max);
        let max_pick_frequency = candidates.iter().map(|c| c.pick_frequency).fold(0.0, f64::max);

        let slotting_ctx = SlottingContext {
            abc_class: parse_abc_class(&product.abc_class),
            required_temperature_zone: product.temperature_zone.as_deref().and_then(parse_zone),
            hazmat: product.hazmat,
            preferred_zones: HashSet::new(),
            excluded_locations: HashSet::new(),
            max_distance,
            max_pick_frequency,
        };

        let scored = score_locations(&candidates, &slotting_ctx, ScoreWeights::default());
        if scored.is_empty() {
            return AgentOutcome::failed("no eligible location found for receipt", vec!["zero candidates survived filtering".to_string()]);
        }

        let suggestions: Vec<Value> = scored
            .iter()
            .map(|s| json!({"location_id": s.location_id, "score": s.score}))
            .collect();

        let derived = match envelope.derive(
            "Warehouse.SlottingSuggestionsGenerated",
            json!({
                "product_id": payload.product_id,
                "quantity": payload.quantity,
                "suggestions": suggestions,
            }),
            Actor::agent(self.name()),
        ) {
            Ok(e) => e,
            Err(error) => return AgentOutcome::failed("failed to derive envelope", vec![error.to_string()]),
        };

        AgentOutcome::ok_with(
            format!("ranked {} candidate locations", scored.len()),
            vec![derived],
        )
    }
}

fn parse_zone(raw: &str) -> Option<TemperatureZone> {
    match raw.to_uppercase().as_str() {
        "AMBIENT" => Some(TemperatureZone::Ambient),
        "CHILLED" => Some(TemperatureZone::Chilled),
        "FROZEN" => Some(TemperatureZone::Frozen),
        _ => None,
    }
}

fn parse_kind(raw: &str) -> Option<LocationKind> {
    match raw.to_uppercase().as_str() {
        "PICK" => Some(LocationKind::Pick),
        "STAGING" => Some(LocationKind::Staging),
        "BULK_RESERVE" => Some(LocationKind::BulkReserve),
        _ => None,
    }
}

fn parse_abc_class(raw: &str) -> AbcClass {
    match raw.to_uppercase().as_str() {
        "A" => AbcClass::A,
        "C" => AbcClass::C,
        _ => AbcClass::B,
    }
}
