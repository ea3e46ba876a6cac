//! Stock domain types. Quantities are `i64`; nothing here touches I/O.

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum LotStatus {
    Available,
    Released,
    Quarantine,
    Hold,
    Expired,
}

impl LotStatus {
    /// A lot is pickable iff its status is `AVAILABLE` or `RELEASED` —
    /// expiration is checked separately since it depends on the caller's
    /// `min_days_to_expiration`.
    pub fn is_pickable_status(self) -> bool {
        matches!(self, LotStatus::Available | LotStatus::Released)
    }
}

#[derive(Debug, Clone)]
pub struct LotBatch {
    pub lot_id: Uuid,
    pub tenant_id: Uuid,
    pub product_id: Uuid,
    pub lot_number: String,
    pub expiration_date: Option<NaiveDate>,
    pub manufacture_date: Option<NaiveDate>,
    pub received_date: NaiveDate,
    pub status: LotStatus,
}

/// Per (tenant, warehouse, product, optional variant, location, optional
/// lot). `available` is maintained by the mutator, never set directly by
/// a caller.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockLevel {
    pub stock_level_id: Uuid,
    pub tenant_id: Uuid,
    pub warehouse_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub location_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub on_hand: i64,
    pub reserved: i64,
    pub available: i64,
    pub inbound: i64,
    pub outbound: i64,
    pub row_version: i64,
    pub last_movement_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
pub enum ReservationStatus {
    Active,
    Fulfilled,
    Cancelled,
    Expired,
}

#[derive(Debug, Clone)]
pub struct ReservationReference {
    pub reference_type: String,
    pub reference_id: Uuid,
    pub reference_line: i32,
}

#[derive(Debug, Clone)]
pub struct Reservation {
    pub reservation_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub stock_level_id: Uuid,
    pub lot_id: Option<Uuid>,
    pub quantity: i64,
    pub quantity_fulfilled: i64,
    pub reference: ReservationReference,
    pub status: ReservationStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn remaining(&self) -> i64 {
        self.quantity - self.quantity_fulfilled
    }
}
