use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use velora_catalog::ProductId;
use velora_core::{CustomerId, ShopId};
use velora_events::EventEnvelope;
use velora_wishlist::WishlistEvent;

use crate::projections::cursor::{CursorCheck, SequenceCursors};
use crate::read_model::ShopStore;

/// One saved (customer, product) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WishlistEntryReadModel {
    pub customer_id: CustomerId,
    pub product_id: ProductId,
    pub added_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum WishlistProjectionError {
    #[error("failed to deserialize wishlist event: {0}")]
    Deserialize(String),

    #[error("shop isolation violation: {0}")]
    ShopIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Wishlist projection: membership rows keyed by (customer, product).
#[derive(Debug)]
pub struct WishlistProjection<S>
where
    S: ShopStore<(CustomerId, ProductId), WishlistEntryReadModel>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> WishlistProjection<S>
where
    S: ShopStore<(CustomerId, ProductId), WishlistEntryReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    pub fn contains(&self, shop_id: ShopId, customer_id: CustomerId, product_id: ProductId) -> bool {
        self.store.get(shop_id, &(customer_id, product_id)).is_some()
    }

    /// A customer's saved products, newest first.
    pub fn list_for_customer(
        &self,
        shop_id: ShopId,
        customer_id: CustomerId,
    ) -> Vec<WishlistEntryReadModel> {
        let mut entries: Vec<_> = self
            .store
            .list(shop_id)
            .into_iter()
            .filter(|e| e.customer_id == customer_id)
            .collect();
        entries.sort_by(|a, b| b.added_at.cmp(&a.added_at));
        entries
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), WishlistProjectionError> {
        if envelope.aggregate_type() != "wishlist.wishlist" {
            return Ok(());
        }

        let shop_id = envelope.shop_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(shop_id, aggregate_id, seq) {
            Ok(CursorCheck::Duplicate) => return Ok(()),
            Ok(CursorCheck::Apply) => {}
            Err(last) => {
                return Err(WishlistProjectionError::NonMonotonicSequence { last, found: seq })
            }
        }

        let ev: WishlistEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| WishlistProjectionError::Deserialize(e.to_string()))?;

        let (event_shop, wishlist_id) = match &ev {
            WishlistEvent::EntryAdded(e) => (e.shop_id, e.wishlist_id),
            WishlistEvent::EntryRemoved(e) => (e.shop_id, e.wishlist_id),
        };

        if event_shop != shop_id {
            return Err(WishlistProjectionError::ShopIsolation(
                "event shop_id does not match envelope shop_id".to_string(),
            ));
        }
        if wishlist_id.0 != aggregate_id {
            return Err(WishlistProjectionError::ShopIsolation(
                "event wishlist_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            WishlistEvent::EntryAdded(e) => {
                self.store.upsert(
                    shop_id,
                    (e.customer_id, e.product_id),
                    WishlistEntryReadModel {
                        customer_id: e.customer_id,
                        product_id: e.product_id,
                        added_at: e.occurred_at,
                    },
                );
            }
            WishlistEvent::EntryRemoved(e) => {
                self.store.remove(shop_id, &(e.customer_id, e.product_id));
            }
        }

        self.cursors.advance(shop_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), WishlistProjectionError> {
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
    use std::sync::Arc;
    use uuid::Uuid;

    use velora_core::{Aggregate, AggregateId};
    use velora_wishlist::{ToggleEntry, Wishlist, WishlistCommand, WishlistId};

    use crate::read_model::InMemoryShopStore;

    type TestProjection = WishlistProjection<
        Arc<InMemoryShopStore<(CustomerId, ProductId), WishlistEntryReadModel>>,
    >;

    fn projection() -> TestProjection {
        WishlistProjection::new(Arc::new(InMemoryShopStore::new()))
    }

    /// Drive the aggregate and feed every emitted event into the projection,
    /// the way the bus subscriber does in production.
    struct Harness {
        projection: TestProjection,
        wishlist: Wishlist,
        shop_id: ShopId,
        customer_id: CustomerId,
        seq: u64,
    }

    impl Harness {
        fn new() -> Self {
            let customer_id = CustomerId::new();
            Self {
                projection: projection(),
                wishlist: Wishlist::empty(WishlistId::for_customer(customer_id)),
                shop_id: ShopId::new(),
                customer_id,
                seq: 0,
            }
        }

        fn toggle(&mut self, product_id: ProductId) {
            let events = self
                .wishlist
                .handle(&WishlistCommand::ToggleEntry(ToggleEntry {
                    shop_id: self.shop_id,
                    wishlist_id: self.wishlist.id_typed(),
                    customer_id: self.customer_id,
                    product_id,
                    occurred_at: Utc::now(),
                }))
                .unwrap();
            for ev in &events {
                self.wishlist.apply(ev);
                self.seq += 1;
                self.projection
                    .apply_envelope(&EventEnvelope::new(
                        Uuid::now_v7(),
                        self.shop_id,
                        self.wishlist.id_typed().0,
                        "wishlist.wishlist",
                        self.seq,
                        serde_json::to_value(ev).unwrap(),
                    ))
                    .unwrap();
            }
        }
    }

    #[test]
    fn toggle_is_reflected_in_the_read_model() {
        let mut h = Harness::new();
        let product_id = ProductId::new(AggregateId::new());

        h.toggle(product_id);
        assert!(h.projection.contains(h.shop_id, h.customer_id, product_id));
        assert_eq!(h.projection.list_for_customer(h.shop_id, h.customer_id).len(), 1);

        h.toggle(product_id);
        assert!(!h.projection.contains(h.shop_id, h.customer_id, product_id));
        assert!(h.projection.list_for_customer(h.shop_id, h.customer_id).is_empty());
    }

    #[test]
    fn entries_never_duplicate_for_a_pair() {
        let mut h = Harness::new();
        let product_id = ProductId::new(AggregateId::new());

        // Odd number of toggles: present exactly once.
        for _ in 0..3 {
            h.toggle(product_id);
        }
        let entries = h.projection.list_for_customer(h.shop_id, h.customer_id);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].product_id, product_id);
    }

    #[test]
    fn customers_only_see_their_own_entries() {
        let mut h = Harness::new();
        let product_id = ProductId::new(AggregateId::new());
        h.toggle(product_id);

        let other = CustomerId::new();
        assert!(h.projection.list_for_customer(h.shop_id, other).is_empty());
    }
}
