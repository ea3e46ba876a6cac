mod expiry_sweep;
mod fefo_reservation;
mod low_stock;
mod putaway;

pub use expiry_sweep::ExpirySweepAgent;
pub use fefo_reservation::FefoReservationAgent;
pub use low_stock::LowStockAlertAgent;
pub use putaway::ReceiptPutawayAgent;
