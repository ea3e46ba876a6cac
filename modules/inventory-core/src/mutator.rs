//! Optimistic stock mutator (C3).
//!
//! Adapted from the teacher's additive-delta `tx_upsert_rollup` pattern:
//! GL balances can upsert additively because they're append-only deltas
//! with no caller-visible version, but stock levels need row-versioned
//! compare-and-swap so two concurrent movements against the same row
//! can't silently clobber each other.

use crate::model::StockLevel;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MutatorError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("optimistic lock conflict: expected row_version {expected}, row is at a different version")]
    OptimisticLockConflict { expected: i64 },
    #[error("movement would drive on_hand negative without an override")]
    NegativeStockBlocked,
}

pub type MutatorResult<T> = Result<T, MutatorError>;

/// Changes to apply to a stock level. Each field is a signed delta;
/// `None` leaves the quantity untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct StockDeltas {
    pub on_hand: i64,
    pub reserved: i64,
    pub inbound: i64,
    pub outbound: i64,
    /// Permit the mutation to drive `on_hand` negative (used by explicit
    /// inventory-adjustment overrides, never by ordinary movements).
    pub allow_negative: bool,
}

pub struct StockMutator {
    pool: PgPool,
}

impl StockMutator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `deltas` to the stock level at `stock_level_id`, failing with
    /// `OPTIMISTIC_LOCK_CONFLICT` if the row has moved past
    /// `expected_version`. `available` is recomputed as
    /// `max(0, on_hand - reserved)` unless `allow_negative`, in which case
    /// the raw signed difference is stored.
    pub async fn adjust(
        &self,
        stock_level_id: Uuid,
        deltas: StockDeltas,
        expected_version: i64,
    ) -> MutatorResult<StockLevel> {
        let mut tx = self.pool.begin().await?;
        let result = self.adjust_tx(&mut tx, stock_level_id, deltas, expected_version).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Same as [`Self::adjust`] but participates in a caller-supplied
    /// transaction (e.g. one also writing an outbox row for the movement).
    pub async fn adjust_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        stock_level_id: Uuid,
        deltas: StockDeltas,
        expected_version: i64,
    ) -> MutatorResult<StockLevel> {
        let current: Option<StockLevel> = sqlx::query_as(
            "SELECT * FROM stock_levels WHERE stock_level_id = $1 FOR UPDATE",
        )
        .bind(stock_level_id)
        .fetch_optional(&mut **tx)
        .await?;

        let current = current.ok_or(MutatorError::OptimisticLockConflict {
            expected: expected_version,
        })?;

        if current.row_version != expected_version {
            return Err(MutatorError::OptimisticLockConflict { expected: expected_version });
        }

        let new_on_hand = current.on_hand + deltas.on_hand;
        if new_on_hand < 0 && !deltas.allow_negative {
            return Err(MutatorError::NegativeStockBlocked);
        }

        let new_reserved = current.reserved + deltas.reserved;
        let new_inbound = current.inbound + deltas.inbound;
        let new_outbound = current.outbound + deltas.outbound;
        let new_available = if deltas.allow_negative {
            new_on_hand - new_reserved
        } else {
            (new_on_hand - new_reserved).max(0)
        };

        let updated: StockLevel = sqlx::query_as(
            r#"
            UPDATE stock_levels
            SET on_hand = $2, reserved = $3, available = $4, inbound = $5, outbound = $6,
                row_version = row_version + 1, last_movement_at = NOW()
            WHERE stock_level_id = $1 AND row_version = $7
            RETURNING *
            "#,
        )
        .bind(stock_level_id)
        .bind(new_on_hand)
        .bind(new_reserved)
        .bind(new_available)
        .bind(new_inbound)
        .bind(new_outbound)
        .bind(expected_version)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(MutatorError::OptimisticLockConflict { expected: expected_version })?;

        Ok(updated)
    }

    /// Create the row at version 1 if it doesn't exist yet (first receipt
    /// into a (product, location, lot)); otherwise this is a no-op and the
    /// existing row is returned unchanged.
    pub async fn upsert(
        &self,
        tenant_id: Uuid,
        warehouse_id: Uuid,
        product_id: Uuid,
        variant_id: Option<Uuid>,
        location_id: Uuid,
        lot_id: Option<Uuid>,
    ) -> MutatorResult<StockLevel> {
        let row: StockLevel = sqlx::query_as(
            r#"
            INSERT INTO stock_levels
                (stock_level_id, tenant_id, warehouse_id, product_id, variant_id, location_id,
                 lot_id, on_hand, reserved, available, inbound, outbound, row_version, last_movement_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 0, 0, 0, 0, 0, 1, NOW())
            ON CONFLICT (tenant_id, warehouse_id, product_id, variant_id, location_id, lot_id)
            DO UPDATE SET tenant_id = stock_levels.tenant_id
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id)
        .bind(warehouse_id)
        .bind(product_id)
        .bind(variant_id)
        .bind(location_id)
        .bind(lot_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn available_recompute_floors_at_zero_unless_override() {
        let on_hand = 3i64;
        let reserved = 5i64;
        assert_eq!((on_hand - reserved).max(0), 0);
        assert_eq!(on_hand - reserved, -2);
    }

    #[test]
    fn negative_on_hand_without_override_is_rejected() {
        let deltas = StockDeltas {
            on_hand: -10,
            ..Default::default()
        };
        let current_on_hand = 4i64;
        let new_on_hand = current_on_hand + deltas.on_hand;
        assert!(new_on_hand < 0 && !deltas.allow_negative);
    }
}
