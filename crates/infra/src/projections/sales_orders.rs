use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use velora_catalog::ProductId;
use velora_core::{CustomerId, ShopId};
use velora_events::EventEnvelope;
use velora_sales::{
    CustomerType, DeliveryMethod, OrderLine, OrderSource, OrderStatus, PaymentTerms,
    SalesOrderEvent, SalesOrderId,
};

use crate::projections::cursor::{CursorCheck, SequenceCursors};
use crate::read_model::ShopStore;

/// Queryable sales order read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrderReadModel {
    pub order_id: SalesOrderId,
    pub customer_id: CustomerId,
    pub customer_type: CustomerType,
    pub source: OrderSource,
    pub status: OrderStatus,
    pub delivery_method: Option<DeliveryMethod>,
    pub tracking_number: Option<String>,
    pub payment_terms: PaymentTerms,
    pub lines: Vec<OrderLine>,
    pub opened_at: DateTime<Utc>,
}

impl SalesOrderReadModel {
    pub fn total(&self) -> u64 {
        self.lines
            .iter()
            .map(|l| l.quantity.max(0) as u64 * l.unit_price)
            .sum()
    }
}

#[derive(Debug, Error)]
pub enum SalesOrderProjectionError {
    #[error("failed to deserialize sales order event: {0}")]
    Deserialize(String),

    #[error("shop isolation violation: {0}")]
    ShopIsolation(String),

    #[error("order {0} not present in read model")]
    MissingOrder(SalesOrderId),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Sales orders projection.
#[derive(Debug)]
pub struct SalesOrdersProjection<S>
where
    S: ShopStore<SalesOrderId, SalesOrderReadModel>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> SalesOrdersProjection<S>
where
    S: ShopStore<SalesOrderId, SalesOrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    pub fn get(&self, shop_id: ShopId, order_id: &SalesOrderId) -> Option<SalesOrderReadModel> {
        self.store.get(shop_id, order_id)
    }

    pub fn list(&self, shop_id: ShopId) -> Vec<SalesOrderReadModel> {
        self.store.list(shop_id)
    }

    /// A customer's orders, newest first.
    pub fn list_for_customer(
        &self,
        shop_id: ShopId,
        customer_id: CustomerId,
    ) -> Vec<SalesOrderReadModel> {
        let mut orders: Vec<_> = self
            .store
            .list(shop_id)
            .into_iter()
            .filter(|o| o.customer_id == customer_id)
            .collect();
        orders.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        orders
    }

    /// A customer's B2B orders, newest first, capped at `limit`.
    pub fn b2b_orders(
        &self,
        shop_id: ShopId,
        customer_id: CustomerId,
        limit: usize,
    ) -> Vec<SalesOrderReadModel> {
        let mut orders: Vec<_> = self
            .list_for_customer(shop_id, customer_id)
            .into_iter()
            .filter(|o| o.customer_type == CustomerType::B2b)
            .collect();
        orders.truncate(limit);
        orders
    }

    /// Tracking lookup, restricted to storefront orders.
    ///
    /// Orders entered through the back office are not exposed through the
    /// public tracking page.
    pub fn find_by_tracking(
        &self,
        shop_id: ShopId,
        tracking_number: &str,
    ) -> Option<SalesOrderReadModel> {
        self.store.list(shop_id).into_iter().find(|o| {
            o.source == OrderSource::Storefront
                && o.tracking_number.as_deref() == Some(tracking_number)
        })
    }

    /// Whether the customer has a confirmed (or later) order containing the
    /// product. Feeds the verified-purchase flag on reviews.
    pub fn has_confirmed_purchase(
        &self,
        shop_id: ShopId,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> bool {
        self.store.list(shop_id).into_iter().any(|o| {
            o.customer_id == customer_id
                && matches!(o.status, OrderStatus::Confirmed | OrderStatus::Invoiced)
                && o.lines.iter().any(|l| l.product_id == product_id)
        })
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), SalesOrderProjectionError> {
        if envelope.aggregate_type() != "sales.order" {
            return Ok(());
        }

        let shop_id = envelope.shop_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(shop_id, aggregate_id, seq) {
            Ok(CursorCheck::Duplicate) => return Ok(()),
            Ok(CursorCheck::Apply) => {}
            Err(last) => {
                return Err(SalesOrderProjectionError::NonMonotonicSequence { last, found: seq })
            }
        }

        let ev: SalesOrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| SalesOrderProjectionError::Deserialize(e.to_string()))?;

        let (event_shop, order_id) = match &ev {
            SalesOrderEvent::OrderOpened(e) => (e.shop_id, e.order_id),
            SalesOrderEvent::LineUpdated(e) => (e.shop_id, e.order_id),
            SalesOrderEvent::LineRemoved(e) => (e.shop_id, e.order_id),
            SalesOrderEvent::CustomerTypeChanged(e) => (e.shop_id, e.order_id),
            SalesOrderEvent::LineRepriced(e) => (e.shop_id, e.order_id),
            SalesOrderEvent::DeliveryMethodSet(e) => (e.shop_id, e.order_id),
            SalesOrderEvent::OrderConfirmed(e) => (e.shop_id, e.order_id),
            SalesOrderEvent::TrackingAssigned(e) => (e.shop_id, e.order_id),
            SalesOrderEvent::OrderInvoiced(e) => (e.shop_id, e.order_id),
        };

        if event_shop != shop_id {
            return Err(SalesOrderProjectionError::ShopIsolation(
                "event shop_id does not match envelope shop_id".to_string(),
            ));
        }
        if order_id.0 != aggregate_id {
            return Err(SalesOrderProjectionError::ShopIsolation(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            SalesOrderEvent::OrderOpened(e) => {
                self.store.upsert(
                    shop_id,
                    e.order_id,
                    SalesOrderReadModel {
                        order_id: e.order_id,
                        customer_id: e.customer_id,
                        customer_type: e.customer_type,
                        source: e.source,
                        status: OrderStatus::Draft,
                        delivery_method: None,
                        tracking_number: None,
                        payment_terms: e.payment_terms,
                        lines: Vec::new(),
                        opened_at: e.occurred_at,
                    },
                );
            }
            SalesOrderEvent::LineUpdated(e) => {
                let mut rm = self.existing(shop_id, e.order_id)?;
                if let Some(line) = rm.lines.iter_mut().find(|l| l.product_id == e.product_id) {
                    line.quantity = e.quantity;
                    line.unit_price = e.unit_price;
                } else {
                    let line_no = (rm.lines.len() as u32) + 1;
                    rm.lines.push(OrderLine {
                        line_no,
                        product_id: e.product_id,
                        quantity: e.quantity,
                        unit_price: e.unit_price,
                    });
                }
                self.store.upsert(shop_id, e.order_id, rm);
            }
            SalesOrderEvent::LineRemoved(e) => {
                let mut rm = self.existing(shop_id, e.order_id)?;
                rm.lines.retain(|l| l.product_id != e.product_id);
                self.store.upsert(shop_id, e.order_id, rm);
            }
            SalesOrderEvent::CustomerTypeChanged(e) => {
                let mut rm = self.existing(shop_id, e.order_id)?;
                rm.customer_type = e.customer_type;
                rm.payment_terms = e.payment_terms;
                self.store.upsert(shop_id, e.order_id, rm);
            }
            SalesOrderEvent::LineRepriced(e) => {
                let mut rm = self.existing(shop_id, e.order_id)?;
                if let Some(line) = rm.lines.iter_mut().find(|l| l.line_no == e.line_no) {
                    line.unit_price = e.unit_price;
                }
                self.store.upsert(shop_id, e.order_id, rm);
            }
            SalesOrderEvent::DeliveryMethodSet(e) => {
                let mut rm = self.existing(shop_id, e.order_id)?;
                rm.delivery_method = Some(e.delivery_method);
                self.store.upsert(shop_id, e.order_id, rm);
            }
            SalesOrderEvent::OrderConfirmed(e) => {
                let mut rm = self.existing(shop_id, e.order_id)?;
                rm.status = OrderStatus::Confirmed;
                self.store.upsert(shop_id, e.order_id, rm);
            }
            SalesOrderEvent::TrackingAssigned(e) => {
                let mut rm = self.existing(shop_id, e.order_id)?;
                rm.tracking_number = Some(e.tracking_number);
                self.store.upsert(shop_id, e.order_id, rm);
            }
            SalesOrderEvent::OrderInvoiced(e) => {
                let mut rm = self.existing(shop_id, e.order_id)?;
                rm.status = OrderStatus::Invoiced;
                self.store.upsert(shop_id, e.order_id, rm);
            }
        }

        self.cursors.advance(shop_id, aggregate_id, seq);
        Ok(())
    }

    fn existing(
        &self,
        shop_id: ShopId,
        order_id: SalesOrderId,
    ) -> Result<SalesOrderReadModel, SalesOrderProjectionError> {
        self.store
            .get(shop_id, &order_id)
            .ok_or(SalesOrderProjectionError::MissingOrder(order_id))
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), SalesOrderProjectionError> {
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
