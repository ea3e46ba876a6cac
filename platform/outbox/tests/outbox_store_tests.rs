mod common;

use outbox::OutboxStore;
use serde_json::json;
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL pointing at a migrated Postgres instance"]
async fn enqueue_then_claim_then_publish_round_trip() {
    let pool = common::setup_pool().await;
    sqlx::query("DELETE FROM event_outbox")
        .execute(&pool)
        .await
        .ok();

    let store = OutboxStore::new(pool.clone());
    let tenant_id = Uuid::new_v4();

    let mut tx = pool.begin().await.unwrap();
    let id = store
        .enqueue(
            &mut tx,
            tenant_id,
            "events.inventory.stockadjusted",
            json!({"event_type": "Inventory.StockAdjusted"}),
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();

    let claimed = store.claim_pending(10).await.unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].id, id);

    // Re-claiming immediately must not return the same row: the claim
    // lease is still in effect.
    let reclaimed = store.claim_pending(10).await.unwrap();
    assert!(reclaimed.is_empty());

    store.mark_published(id).await.unwrap();
    assert_eq!(store.pending_count().await.unwrap(), 0);
}

#[tokio::test]
#[serial]
#[ignore = "requires DATABASE_URL pointing at a migrated Postgres instance"]
async fn mark_failed_schedules_backoff_then_terminates() {
    let pool = common::setup_pool().await;
    sqlx::query("DELETE FROM event_outbox")
        .execute(&pool)
        .await
        .ok();

    let store = OutboxStore::new(pool.clone());
    let mut tx = pool.begin().await.unwrap();
    let id = store
        .enqueue(&mut tx, Uuid::new_v4(), "events.inventory.stockadjusted", json!({}))
        .await
        .unwrap();
    tx.commit().await.unwrap();

    for _ in 0..outbox::DEFAULT_MAX_RETRIES {
        store.mark_failed(id, "publish failed").await.unwrap();
    }

    let row: (String,) = sqlx::query_as("SELECT status FROM event_outbox WHERE id = $1")
        .bind(id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(row.0, "FAILED");
}
