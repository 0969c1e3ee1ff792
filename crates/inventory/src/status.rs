//! Stock status derivation and replenishment policy.

use serde::{Deserialize, Serialize};

use velora_catalog::StockThresholds;
use velora_core::{DomainError, DomainResult};

/// Tri-state indicator of inventory sufficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

/// Derive the stock status from the available quantity and the minimum
/// stock level.
///
/// Pure function: out of stock at zero or below, low stock at or below the
/// minimum level, in stock above it.
pub fn stock_status(quantity_available: i64, min_stock_level: i64) -> StockStatus {
    if quantity_available <= 0 {
        StockStatus::OutOfStock
    } else if quantity_available <= min_stock_level {
        StockStatus::LowStock
    } else {
        StockStatus::InStock
    }
}

/// Quantity to order to bring a product back to its maximum stock level.
///
/// Fails with a business-rule error when the current quantity is already
/// above the minimum level (replenishment not warranted).
pub fn replenishment_quantity(
    quantity_available: i64,
    thresholds: StockThresholds,
) -> DomainResult<i64> {
    if quantity_available > thresholds.min_stock_level {
        return Err(DomainError::invariant(format!(
            "stock is already sufficient ({} on hand, minimum {})",
            quantity_available, thresholds.min_stock_level
        )));
    }
    Ok(thresholds.max_stock_level - quantity_available)
}
