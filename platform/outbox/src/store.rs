//! Transactional outbox store.
//!
//! Rows are written inside the same transaction as the business change that
//! produced them (see [`OutboxStore::enqueue`]), then claimed and published
//! by a separate dispatcher loop (`modules/warehouse-engine`).

use crate::model::{OutboxEntry, OutboxStatus, DEFAULT_CLAIM_LEASE_SECS, DEFAULT_MAX_RETRIES};
use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum OutboxError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type OutboxResult<T> = Result<T, OutboxError>;

#[derive(Clone)]
pub struct OutboxStore {
    pool: PgPool,
}

impl OutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a row inside the caller's transaction. Must be called from
    /// the same transaction that writes the business row the event
    /// describes, so the two either both commit or both roll back.
    pub async fn enqueue(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        tenant_id: Uuid,
        routing_key: &str,
        envelope: serde_json::Value,
    ) -> OutboxResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO event_outbox
                (id, tenant_id, routing_key, envelope, status, retry_count, max_retries, scheduled_at, created_at)
            VALUES ($1, $2, $3, $4, 'PENDING', 0, $5, NOW(), NOW())
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(routing_key)
        .bind(envelope)
        .bind(DEFAULT_MAX_RETRIES)
        .execute(&mut **tx)
        .await?;

        Ok(id)
    }

    /// Append the envelope to the event store and enqueue it in the
    /// outbox inside one transaction, for callers (the scheduler,
    /// internal job handlers) that have no other business row to write
    /// alongside it.
    pub async fn append_and_enqueue(
        &self,
        event_id: Uuid,
        tenant_id: Uuid,
        routing_key: &str,
        envelope: serde_json::Value,
    ) -> OutboxResult<Uuid> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO event_store (event_id, envelope, recorded_at) VALUES ($1, $2, NOW())
             ON CONFLICT (event_id) DO NOTHING",
        )
        .bind(event_id)
        .bind(&envelope)
        .execute(&mut *tx)
        .await?;

        let id = self.enqueue(&mut tx, tenant_id, routing_key, envelope).await?;
        tx.commit().await?;
        Ok(id)
    }

    /// Claim up to `batch_size` due `PENDING` rows, locking them with
    /// `FOR UPDATE SKIP LOCKED` so concurrent dispatcher replicas never
    /// claim the same row, then extend `scheduled_at` by the claim lease
    /// as an in-flight marker. If this replica crashes before calling
    /// [`Self::mark_published`] or [`Self::mark_failed`], the row becomes
    /// due again once the lease expires and another replica reclaims it.
    pub async fn claim_pending(&self, batch_size: i64) -> OutboxResult<Vec<OutboxEntry>> {
        let mut tx = self.pool.begin().await?;

        let rows: Vec<OutboxEntry> = sqlx::query_as(
            r#"
            SELECT id, tenant_id, routing_key, envelope, status, retry_count,
                   max_retries, last_error, scheduled_at, created_at, published_at
            FROM event_outbox
            WHERE status = 'PENDING' AND scheduled_at <= NOW()
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        if !rows.is_empty() {
            let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
            sqlx::query(
                r#"
                UPDATE event_outbox
                SET scheduled_at = NOW() + make_interval(secs => $2)
                WHERE id = ANY($1)
                "#,
            )
            .bind(&ids)
            .bind(DEFAULT_CLAIM_LEASE_SECS as f64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows)
    }

    pub async fn mark_published(&self, id: Uuid) -> OutboxResult<()> {
        sqlx::query(
            "UPDATE event_outbox SET status = 'PUBLISHED', published_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed publish attempt. Reschedules with exponential
    /// backoff (`2^retry_count` seconds) unless the row has now exhausted
    /// `max_retries`, in which case it moves to terminal `FAILED`.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> OutboxResult<()> {
        let row: (i32, i32) =
            sqlx::query_as("SELECT retry_count, max_retries FROM event_outbox WHERE id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        let (retry_count, max_retries) = row;
        let next_retry_count = retry_count + 1;

        if next_retry_count >= max_retries {
            sqlx::query(
                "UPDATE event_outbox SET status = 'FAILED', retry_count = $2, last_error = $3 WHERE id = $1",
            )
            .bind(id)
            .bind(next_retry_count)
            .bind(error)
            .execute(&self.pool)
            .await?;
        } else {
            let backoff_secs = 2f64.powi(next_retry_count);
            sqlx::query(
                r#"
                UPDATE event_outbox
                SET status = 'PENDING',
                    retry_count = $2,
                    last_error = $3,
                    scheduled_at = NOW() + make_interval(secs => $4)
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(next_retry_count)
            .bind(error)
            .bind(backoff_secs)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    /// Reset a terminal `FAILED` row back to `PENDING` for an
    /// operator-triggered redrive.
    pub async fn requeue(&self, id: Uuid) -> OutboxResult<()> {
        sqlx::query(
            r#"
            UPDATE event_outbox
            SET status = 'PENDING', retry_count = 0, last_error = NULL, scheduled_at = NOW()
            WHERE id = $1 AND status = 'FAILED'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete `PUBLISHED` rows older than `retention_days`. `FAILED` rows
    /// are retained indefinitely for operator inspection.
    pub async fn gc(&self, retention_days: i64) -> OutboxResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM event_outbox
            WHERE status = 'PUBLISHED'
              AND published_at < NOW() - make_interval(days => $1)
            "#,
        )
        .bind(retention_days as f64)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Current count of `PENDING` rows, the backpressure gauge the
    /// dispatcher's health surface exposes as `outbox_queue_size`.
    pub async fn pending_count(&self) -> OutboxResult<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM event_outbox WHERE status = 'PENDING'")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}

impl OutboxEntry {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, OutboxStatus::Published | OutboxStatus::Failed)
    }
}
