use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to the integration-test database named by `DATABASE_URL`.
/// Skipped (via `#[ignore]` on callers) when no database is available.
pub async fn setup_pool() -> PgPool {
    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for outbox store tests");

    PgPoolOptions::new()
        .max_connections(2)
        .connect(&database_url)
        .await
        .expect("failed to connect to test database")
}
