//! Abstraction over "which tenants/warehouses are active" — the scheduler
//! has no opinion on how that's persisted; `modules/warehouse-engine`
//! supplies the real, table-backed implementation.

use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn active_tenants(&self) -> Vec<Uuid>;
    async fn active_warehouses(&self, tenant_id: Uuid) -> Vec<Uuid>;
}
