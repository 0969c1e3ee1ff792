use std::collections::HashMap;

use serde_json::Value as JsonValue;
use thiserror::Error;

use velora_catalog::{ProductId, TargetAudience};
use velora_core::ShopId;
use velora_events::EventEnvelope;
use velora_inventory::{replenishment_quantity, stock_status, InventoryEvent, StockStatus};

use crate::projections::catalog::ProductReadModel;
use crate::projections::cursor::{CursorCheck, SequenceCursors};
use crate::read_model::ShopStore;

/// Queryable stock read model: current quantity per product.
///
/// The ledger shares the product's aggregate id, so rows are keyed by
/// [`ProductId`] directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevelReadModel {
    pub product_id: ProductId,
    pub quantity: i64,
}

/// One row of the inventory report (the materialized low-stock view).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryReportRow {
    pub product_id: ProductId,
    pub name: String,
    pub brand: Option<String>,
    pub audience: Option<TargetAudience>,
    pub quantity_available: i64,
    pub min_stock_level: i64,
    pub max_stock_level: i64,
    pub stock_status: StockStatus,
    /// Units below the minimum level (zero when stock is sufficient).
    pub shortage: i64,
    /// Suggested order quantity to return to the maximum level; absent when
    /// replenishment is not warranted.
    pub reorder_quantity: Option<i64>,
}

#[derive(Debug, Error)]
pub enum StockProjectionError {
    #[error("failed to deserialize inventory event: {0}")]
    Deserialize(String),

    #[error("shop isolation violation: {0}")]
    ShopIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Stock levels projection.
///
/// Maintains one running quantity per product (a single upsert per movement),
/// which keeps report generation a single pass over the read model instead of
/// one ledger query per product.
#[derive(Debug)]
pub struct StockLevelsProjection<S>
where
    S: ShopStore<ProductId, StockLevelReadModel>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> StockLevelsProjection<S>
where
    S: ShopStore<ProductId, StockLevelReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    /// Current available quantity for a product (zero when no ledger exists).
    pub fn quantity(&self, shop_id: ShopId, product_id: &ProductId) -> i64 {
        self.store
            .get(shop_id, product_id)
            .map(|rm| rm.quantity)
            .unwrap_or(0)
    }

    pub fn levels(&self, shop_id: ShopId) -> Vec<StockLevelReadModel> {
        self.store.list(shop_id)
    }

    /// Join current quantities with catalog thresholds in one pass.
    ///
    /// Only fashion products (those with a target audience) are reported,
    /// mirroring the storefront's catalog scope. Rows are sorted by name.
    pub fn inventory_report(
        &self,
        shop_id: ShopId,
        products: &[ProductReadModel],
    ) -> Vec<InventoryReportRow> {
        let quantities: HashMap<ProductId, i64> = self
            .store
            .list(shop_id)
            .into_iter()
            .map(|rm| (rm.product_id, rm.quantity))
            .collect();

        let mut rows: Vec<_> = products
            .iter()
            .filter(|p| p.audience.is_some())
            .map(|p| {
                let quantity = quantities.get(&p.product_id).copied().unwrap_or(0);
                let status = stock_status(quantity, p.thresholds.min_stock_level);
                InventoryReportRow {
                    product_id: p.product_id,
                    name: p.name.clone(),
                    brand: p.brand.clone(),
                    audience: p.audience,
                    quantity_available: quantity,
                    min_stock_level: p.thresholds.min_stock_level,
                    max_stock_level: p.thresholds.max_stock_level,
                    stock_status: status,
                    shortage: (p.thresholds.min_stock_level - quantity).max(0),
                    reorder_quantity: replenishment_quantity(quantity, p.thresholds).ok(),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    /// Report rows that need attention (low or out of stock).
    pub fn low_stock_report(
        &self,
        shop_id: ShopId,
        products: &[ProductReadModel],
    ) -> Vec<InventoryReportRow> {
        self.inventory_report(shop_id, products)
            .into_iter()
            .filter(|row| row.stock_status != StockStatus::InStock)
            .collect()
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), StockProjectionError> {
        if envelope.aggregate_type() != "inventory.ledger" {
            return Ok(());
        }

        let shop_id = envelope.shop_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(shop_id, aggregate_id, seq) {
            Ok(CursorCheck::Duplicate) => return Ok(()),
            Ok(CursorCheck::Apply) => {}
            Err(last) => {
                return Err(StockProjectionError::NonMonotonicSequence { last, found: seq })
            }
        }

        let ev: InventoryEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| StockProjectionError::Deserialize(e.to_string()))?;

        let (event_shop, ledger_id) = match &ev {
            InventoryEvent::LedgerOpened(e) => (e.shop_id, e.ledger_id),
            InventoryEvent::StockMoved(e) => (e.shop_id, e.ledger_id),
        };

        if event_shop != shop_id {
            return Err(StockProjectionError::ShopIsolation(
                "event shop_id does not match envelope shop_id".to_string(),
            ));
        }
        if ledger_id.0 != aggregate_id {
            return Err(StockProjectionError::ShopIsolation(
                "event ledger_id does not match envelope aggregate_id".to_string(),
            ));
        }

        let product_id = ProductId::new(ledger_id.0);
        match ev {
            InventoryEvent::LedgerOpened(_) => {
                self.store.upsert(
                    shop_id,
                    product_id,
                    StockLevelReadModel {
                        product_id,
                        quantity: 0,
                    },
                );
            }
            InventoryEvent::StockMoved(e) => {
                let mut rm = self.store.get(shop_id, &product_id).unwrap_or(StockLevelReadModel {
                    product_id,
                    quantity: 0,
                });
                rm.quantity += e.delta;
                self.store.upsert(shop_id, product_id, rm);
            }
        }

        self.cursors.advance(shop_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), StockProjectionError> {
        let mut envs: Vec<_> = envelopes.into_iter().collect();

        {
            let mut shops = envs.iter().map(|e| e.shop_id()).collect::<Vec<_>>();
            shops.sort_by_key(|s| *s.as_uuid().as_bytes());
            shops.dedup();
            for s in shops {
                self.store.clear_shop(s);
                self.cursors.clear_shop(s);
            }
        }

        envs.sort_by_key(|e| {
            (
                *e.shop_id().as_uuid().as_bytes(),
                *e.aggregate_id().as_uuid().as_bytes(),
                e.sequence_number(),
            )
        });

        for env in &envs {
            self.apply_envelope(env)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Arc;
    use uuid::Uuid;

    use velora_catalog::{Pricing, ProductStatus, StockThresholds};
    use velora_core::AggregateId;
    use velora_inventory::ledger::{LedgerOpened, StockMoved};
    use velora_inventory::{LedgerId, MovementReason};

    use crate::read_model::InMemoryShopStore;

    type TestProjection =
        StockLevelsProjection<Arc<InMemoryShopStore<ProductId, StockLevelReadModel>>>;

    fn projection() -> TestProjection {
        StockLevelsProjection::new(Arc::new(InMemoryShopStore::new()))
    }

    fn envelope(shop_id: ShopId, ledger_id: LedgerId, seq: u64, ev: &InventoryEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            shop_id,
            ledger_id.0,
            "inventory.ledger",
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn seed_stock(projection: &TestProjection, shop_id: ShopId, ledger_id: LedgerId, deltas: &[i64]) {
        projection
            .apply_envelope(&envelope(
                shop_id,
                ledger_id,
                1,
                &InventoryEvent::LedgerOpened(LedgerOpened {
                    shop_id,
                    ledger_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        for (i, delta) in deltas.iter().enumerate() {
            projection
                .apply_envelope(&envelope(
                    shop_id,
                    ledger_id,
                    (i as u64) + 2,
                    &InventoryEvent::StockMoved(StockMoved {
                        shop_id,
                        ledger_id,
                        delta: *delta,
                        reason: MovementReason::Receipt,
                        occurred_at: Utc::now(),
                    }),
                ))
                .unwrap();
        }
    }

    fn product_row(
        product_id: ProductId,
        name: &str,
        audience: Option<TargetAudience>,
        min: i64,
        max: i64,
    ) -> ProductReadModel {
        ProductReadModel {
            product_id,
            sku: format!("SKU-{name}"),
            name: name.to_string(),
            description: String::new(),
            brand: Some("Northwind".to_string()),
            color: None,
            material: None,
            audience,
            size: None,
            season: None,
            pricing: Pricing {
                list_price: 1000,
                b2b_price: None,
            },
            thresholds: StockThresholds {
                min_stock_level: min,
                max_stock_level: max,
            },
            saleable: true,
            status: ProductStatus::Published,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn quantities_accumulate_per_product() {
        let projection = projection();
        let shop_id = ShopId::new();
        let ledger_id = LedgerId::new(AggregateId::new());

        seed_stock(&projection, shop_id, ledger_id, &[40, -15, 2]);
        assert_eq!(projection.quantity(shop_id, &ProductId::new(ledger_id.0)), 27);
    }

    #[test]
    fn unknown_product_has_zero_quantity() {
        let projection = projection();
        assert_eq!(
            projection.quantity(ShopId::new(), &ProductId::new(AggregateId::new())),
            0
        );
    }

    #[test]
    fn report_derives_status_per_thresholds() {
        let projection = projection();
        let shop_id = ShopId::new();

        let low = ProductId::new(AggregateId::new());
        let healthy = ProductId::new(AggregateId::new());
        let empty = ProductId::new(AggregateId::new());
        seed_stock(&projection, shop_id, LedgerId::new(low.0), &[5]);
        seed_stock(&projection, shop_id, LedgerId::new(healthy.0), &[50]);
        seed_stock(&projection, shop_id, LedgerId::new(empty.0), &[3, -3]);

        let products = vec![
            product_row(low, "Low Tee", Some(TargetAudience::Men), 10, 100),
            product_row(healthy, "Healthy Tee", Some(TargetAudience::Women), 10, 100),
            product_row(empty, "Empty Tee", Some(TargetAudience::Children), 10, 100),
        ];

        let report = projection.inventory_report(shop_id, &products);
        assert_eq!(report.len(), 3);

        let by_name: HashMap<_, _> = report.iter().map(|r| (r.name.as_str(), r)).collect();
        let low_row = by_name["Low Tee"];
        assert_eq!(low_row.quantity_available, 5);
        assert_eq!(low_row.stock_status, StockStatus::LowStock);
        assert_eq!(low_row.shortage, 5);
        assert_eq!(low_row.reorder_quantity, Some(95));

        assert_eq!(by_name["Healthy Tee"].stock_status, StockStatus::InStock);
        assert_eq!(by_name["Healthy Tee"].shortage, 0);
        assert_eq!(by_name["Healthy Tee"].reorder_quantity, None);
        assert_eq!(by_name["Empty Tee"].stock_status, StockStatus::OutOfStock);
        assert_eq!(by_name["Empty Tee"].shortage, 10);
    }

    #[test]
    fn low_stock_report_excludes_healthy_products() {
        let projection = projection();
        let shop_id = ShopId::new();

        let low = ProductId::new(AggregateId::new());
        let healthy = ProductId::new(AggregateId::new());
        seed_stock(&projection, shop_id, LedgerId::new(low.0), &[5]);
        seed_stock(&projection, shop_id, LedgerId::new(healthy.0), &[50]);

        let products = vec![
            product_row(low, "Low Tee", Some(TargetAudience::Men), 10, 100),
            product_row(healthy, "Healthy Tee", Some(TargetAudience::Men), 10, 100),
        ];

        let report = projection.low_stock_report(shop_id, &products);
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].name, "Low Tee");
    }

    #[test]
    fn report_covers_fashion_products_only() {
        let projection = projection();
        let shop_id = ShopId::new();
        let unclassified = ProductId::new(AggregateId::new());

        let products = vec![product_row(unclassified, "Gift Card", None, 10, 100)];
        assert!(projection.inventory_report(shop_id, &products).is_empty());
    }

    #[test]
    fn products_without_ledger_report_as_out_of_stock() {
        let projection = projection();
        let shop_id = ShopId::new();
        let product_id = ProductId::new(AggregateId::new());

        let products = vec![product_row(product_id, "No Ledger", Some(TargetAudience::Men), 10, 100)];
        let report = projection.inventory_report(shop_id, &products);
        assert_eq!(report[0].quantity_available, 0);
        assert_eq!(report[0].stock_status, StockStatus::OutOfStock);
    }

    #[test]
    fn duplicate_movements_are_not_applied_twice() {
        let projection = projection();
        let shop_id = ShopId::new();
        let ledger_id = LedgerId::new(AggregateId::new());
        seed_stock(&projection, shop_id, ledger_id, &[10]);

        // Replay of sequence 2.
        projection
            .apply_envelope(&envelope(
                shop_id,
                ledger_id,
                2,
                &InventoryEvent::StockMoved(StockMoved {
                    shop_id,
                    ledger_id,
                    delta: 10,
                    reason: MovementReason::Receipt,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        assert_eq!(projection.quantity(shop_id, &ProductId::new(ledger_id.0)), 10);
    }
}
