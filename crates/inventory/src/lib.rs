//! `velora-inventory` — stock ledger domain and inventory policies.

pub mod ledger;
pub mod status;

pub use ledger::{
    InventoryCommand, InventoryEvent, LedgerId, MovementReason, OpenLedger, RecordMovement,
    StockLedger,
};
pub use status::{replenishment_quantity, stock_status, StockStatus};
