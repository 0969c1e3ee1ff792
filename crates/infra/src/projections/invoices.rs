use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use velora_core::{CustomerId, ShopId};
use velora_events::EventEnvelope;
use velora_invoicing::{InvoiceEvent, InvoiceId, InvoiceStatus};
use velora_sales::SalesOrderId;

use crate::projections::cursor::{CursorCheck, SequenceCursors};
use crate::read_model::ShopStore;

/// Queryable invoice read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceReadModel {
    pub invoice_id: InvoiceId,
    pub order_id: SalesOrderId,
    pub customer_id: CustomerId,
    pub total: u64,
    pub due_date: DateTime<Utc>,
    pub status: InvoiceStatus,
}

#[derive(Debug, Error)]
pub enum InvoiceProjectionError {
    #[error("failed to deserialize invoice event: {0}")]
    Deserialize(String),

    #[error("shop isolation violation: {0}")]
    ShopIsolation(String),

    #[error("invoice {0} not present in read model")]
    MissingInvoice(InvoiceId),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Invoices projection.
#[derive(Debug)]
pub struct InvoicesProjection<S>
where
    S: ShopStore<InvoiceId, InvoiceReadModel>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> InvoicesProjection<S>
where
    S: ShopStore<InvoiceId, InvoiceReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    pub fn get(&self, shop_id: ShopId, invoice_id: &InvoiceId) -> Option<InvoiceReadModel> {
        self.store.get(shop_id, invoice_id)
    }

    pub fn list(&self, shop_id: ShopId) -> Vec<InvoiceReadModel> {
        self.store.list(shop_id)
    }

    pub fn find_for_order(&self, shop_id: ShopId, order_id: &SalesOrderId) -> Option<InvoiceReadModel> {
        self.store
            .list(shop_id)
            .into_iter()
            .find(|i| i.order_id == *order_id)
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), InvoiceProjectionError> {
        if envelope.aggregate_type() != "invoicing.invoice" {
            return Ok(());
        }

        let shop_id = envelope.shop_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(shop_id, aggregate_id, seq) {
            Ok(CursorCheck::Duplicate) => return Ok(()),
            Ok(CursorCheck::Apply) => {}
            Err(last) => {
                return Err(InvoiceProjectionError::NonMonotonicSequence { last, found: seq })
            }
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| InvoiceProjectionError::Deserialize(e.to_string()))?;

        let (event_shop, invoice_id) = match &ev {
            InvoiceEvent::InvoiceIssued(e) => (e.shop_id, e.invoice_id),
            InvoiceEvent::InvoicePosted(e) => (e.shop_id, e.invoice_id),
        };

        if event_shop != shop_id {
            return Err(InvoiceProjectionError::ShopIsolation(
                "event shop_id does not match envelope shop_id".to_string(),
            ));
        }
        if invoice_id.0 != aggregate_id {
            return Err(InvoiceProjectionError::ShopIsolation(
                "event invoice_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            InvoiceEvent::InvoiceIssued(e) => {
                self.store.upsert(
                    shop_id,
                    e.invoice_id,
                    InvoiceReadModel {
                        invoice_id: e.invoice_id,
                        order_id: e.order_id,
                        customer_id: e.customer_id,
                        total: e.total,
                        due_date: e.due_date,
                        status: InvoiceStatus::Issued,
                    },
                );
            }
            InvoiceEvent::InvoicePosted(e) => {
                let mut rm = self
                    .store
                    .get(shop_id, &e.invoice_id)
                    .ok_or(InvoiceProjectionError::MissingInvoice(e.invoice_id))?;
                rm.status = InvoiceStatus::Posted;
                self.store.upsert(shop_id, e.invoice_id, rm);
            }
        }

        self.cursors.advance(shop_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), InvoiceProjectionError> {
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
