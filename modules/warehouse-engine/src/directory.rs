//! Table-backed [`scheduler::TenantDirectory`]: active tenants and
//! warehouses come from the `tenants` / `warehouses` tables rather than
//! a hard-coded list.

use async_trait::async_trait;
use scheduler::TenantDirectory;
use sqlx::PgPool;
use uuid::Uuid;

pub struct PgTenantDirectory {
    pool: PgPool,
}

impl PgTenantDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantDirectory for PgTenantDirectory {
    async fn active_tenants(&self) -> Vec<Uuid> {
        sqlx::query_scalar("SELECT tenant_id FROM tenants WHERE active")
            .fetch_all(&self.pool)
            .await
            .unwrap_or_else(|error| {
                tracing::error!(error = %error, "failed to list active tenants");
                Vec::new()
            })
    }

    async fn active_warehouses(&self, tenant_id: Uuid) -> Vec<Uuid> {
        sqlx::query_scalar(
            "SELECT warehouse_id FROM warehouses WHERE tenant_id = $1 AND active",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .unwrap_or_else(|error| {
            tracing::error!(error = %error, tenant_id = %tenant_id, "failed to list active warehouses");
            Vec::new()
        })
    }
}
