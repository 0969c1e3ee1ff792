use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use velora_catalog::ProductId;
use velora_core::{CustomerId, ShopId};
use velora_events::EventEnvelope;
use velora_reviews::{RatingSummary, ReviewEvent, ReviewId, ReviewState};

use crate::projections::cursor::{CursorCheck, SequenceCursors};
use crate::read_model::ShopStore;

/// Queryable review read model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewReadModel {
    pub review_id: ReviewId,
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub title: String,
    pub rating: u8,
    pub body: String,
    pub state: ReviewState,
    pub verified_purchase: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum ReviewProjectionError {
    #[error("failed to deserialize review event: {0}")]
    Deserialize(String),

    #[error("shop isolation violation: {0}")]
    ShopIsolation(String),

    #[error("review {0} not present in read model")]
    MissingReview(ReviewId),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Review board projection.
///
/// Rating aggregates are computed over published rows only, so they change
/// exactly when a review enters or leaves the published state.
#[derive(Debug)]
pub struct ReviewBoardProjection<S>
where
    S: ShopStore<ReviewId, ReviewReadModel>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> ReviewBoardProjection<S>
where
    S: ShopStore<ReviewId, ReviewReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    pub fn get(&self, shop_id: ShopId, review_id: &ReviewId) -> Option<ReviewReadModel> {
        self.store.get(shop_id, review_id)
    }

    /// Published reviews for a product, newest first.
    pub fn published_for_product(
        &self,
        shop_id: ShopId,
        product_id: &ProductId,
    ) -> Vec<ReviewReadModel> {
        let mut reviews: Vec<_> = self
            .store
            .list(shop_id)
            .into_iter()
            .filter(|r| r.product_id == *product_id && r.state == ReviewState::Published)
            .collect();
        reviews.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        reviews
    }

    /// Count + mean rating over published reviews (zero/zero when none).
    pub fn summary(&self, shop_id: ShopId, product_id: &ProductId) -> RatingSummary {
        let ratings = self
            .store
            .list(shop_id)
            .into_iter()
            .filter(|r| r.product_id == *product_id && r.state == ReviewState::Published)
            .map(|r| r.rating);
        RatingSummary::from_ratings(ratings)
    }

    /// The one review a customer holds for a product, in any state.
    pub fn find_for_customer(
        &self,
        shop_id: ShopId,
        product_id: &ProductId,
        customer_id: &CustomerId,
    ) -> Option<ReviewReadModel> {
        self.store
            .list(shop_id)
            .into_iter()
            .find(|r| r.product_id == *product_id && r.customer_id == *customer_id)
    }

    /// Reviews awaiting moderation, oldest first.
    pub fn moderation_queue(&self, shop_id: ShopId) -> Vec<ReviewReadModel> {
        let mut reviews: Vec<_> = self
            .store
            .list(shop_id)
            .into_iter()
            .filter(|r| r.state == ReviewState::Draft)
            .collect();
        reviews.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        reviews
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ReviewProjectionError> {
        if envelope.aggregate_type() != "reviews.review" {
            return Ok(());
        }

        let shop_id = envelope.shop_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(shop_id, aggregate_id, seq) {
            Ok(CursorCheck::Duplicate) => return Ok(()),
            Ok(CursorCheck::Apply) => {}
            Err(last) => {
                return Err(ReviewProjectionError::NonMonotonicSequence { last, found: seq })
            }
        }

        let ev: ReviewEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ReviewProjectionError::Deserialize(e.to_string()))?;

        let (event_shop, review_id) = match &ev {
            ReviewEvent::ReviewSubmitted(e) => (e.shop_id, e.review_id),
            ReviewEvent::ReviewRevised(e) => (e.shop_id, e.review_id),
            ReviewEvent::ReviewPublished(e) => (e.shop_id, e.review_id),
            ReviewEvent::ReviewRejected(e) => (e.shop_id, e.review_id),
        };

        if event_shop != shop_id {
            return Err(ReviewProjectionError::ShopIsolation(
                "event shop_id does not match envelope shop_id".to_string(),
            ));
        }
        if review_id.0 != aggregate_id {
            return Err(ReviewProjectionError::ShopIsolation(
                "event review_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ReviewEvent::ReviewSubmitted(e) => {
                self.store.upsert(
                    shop_id,
                    e.review_id,
                    ReviewReadModel {
                        review_id: e.review_id,
                        product_id: e.product_id,
                        customer_id: e.customer_id,
                        title: e.title,
                        rating: e.rating.value(),
                        body: e.body,
                        state: ReviewState::Draft,
                        verified_purchase: e.verified_purchase,
                        submitted_at: e.occurred_at,
                    },
                );
            }
            ReviewEvent::ReviewRevised(e) => {
                let mut rm = self
                    .store
                    .get(shop_id, &e.review_id)
                    .ok_or(ReviewProjectionError::MissingReview(e.review_id))?;
                rm.title = e.title;
                rm.rating = e.rating.value();
                rm.body = e.body;
                rm.state = ReviewState::Draft;
                rm.submitted_at = e.occurred_at;
                self.store.upsert(shop_id, e.review_id, rm);
            }
            ReviewEvent::ReviewPublished(e) => {
                let mut rm = self
                    .store
                    .get(shop_id, &e.review_id)
                    .ok_or(ReviewProjectionError::MissingReview(e.review_id))?;
                rm.state = ReviewState::Published;
                self.store.upsert(shop_id, e.review_id, rm);
            }
            ReviewEvent::ReviewRejected(e) => {
                let mut rm = self
                    .store
                    .get(shop_id, &e.review_id)
                    .ok_or(ReviewProjectionError::MissingReview(e.review_id))?;
                rm.state = ReviewState::Rejected;
                self.store.upsert(shop_id, e.review_id, rm);
            }
        }

        self.cursors.advance(shop_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), ReviewProjectionError> {
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

    use velora_core::AggregateId;
    use velora_reviews::review::{ReviewPublished, ReviewRejected, ReviewSubmitted};
    use velora_reviews::Rating;

    use crate::read_model::InMemoryShopStore;

    type TestProjection = ReviewBoardProjection<Arc<InMemoryShopStore<ReviewId, ReviewReadModel>>>;

    fn projection() -> TestProjection {
        ReviewBoardProjection::new(Arc::new(InMemoryShopStore::new()))
    }

    fn envelope(shop_id: ShopId, review_id: ReviewId, seq: u64, ev: &ReviewEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            shop_id,
            review_id.0,
            "reviews.review",
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn submit(
        projection: &TestProjection,
        shop_id: ShopId,
        product_id: ProductId,
        rating: u8,
    ) -> ReviewId {
        let review_id = ReviewId::new(AggregateId::new());
        projection
            .apply_envelope(&envelope(
                shop_id,
                review_id,
                1,
                &ReviewEvent::ReviewSubmitted(ReviewSubmitted {
                    shop_id,
                    review_id,
                    product_id,
                    customer_id: CustomerId::new(),
                    title: "A title".to_string(),
                    rating: Rating::new(rating).unwrap(),
                    body: String::new(),
                    verified_purchase: false,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
        review_id
    }

    fn publish(projection: &TestProjection, shop_id: ShopId, review_id: ReviewId, seq: u64) {
        projection
            .apply_envelope(&envelope(
                shop_id,
                review_id,
                seq,
                &ReviewEvent::ReviewPublished(ReviewPublished {
                    shop_id,
                    review_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();
    }

    #[test]
    fn summary_counts_published_reviews_only() {
        let projection = projection();
        let shop_id = ShopId::new();
        let product_id = ProductId::new(AggregateId::new());

        let r1 = submit(&projection, shop_id, product_id, 4);
        let r2 = submit(&projection, shop_id, product_id, 5);
        let _draft = submit(&projection, shop_id, product_id, 1);

        // Nothing published yet: zero/zero.
        let summary = projection.summary(shop_id, &product_id);
        assert_eq!(summary.review_count, 0);
        assert_eq!(summary.average_rating, 0.0);

        publish(&projection, shop_id, r1, 2);
        publish(&projection, shop_id, r2, 2);

        let summary = projection.summary(shop_id, &product_id);
        assert_eq!(summary.review_count, 2);
        assert_eq!(summary.average_rating, 4.5);
    }

    #[test]
    fn rejecting_a_published_review_removes_it_from_aggregates() {
        let projection = projection();
        let shop_id = ShopId::new();
        let product_id = ProductId::new(AggregateId::new());

        let review_id = submit(&projection, shop_id, product_id, 5);
        publish(&projection, shop_id, review_id, 2);
        assert_eq!(projection.summary(shop_id, &product_id).review_count, 1);

        projection
            .apply_envelope(&envelope(
                shop_id,
                review_id,
                3,
                &ReviewEvent::ReviewRejected(ReviewRejected {
                    shop_id,
                    review_id,
                    occurred_at: Utc::now(),
                }),
            ))
            .unwrap();

        let summary = projection.summary(shop_id, &product_id);
        assert_eq!(summary.review_count, 0);
        assert!(projection.published_for_product(shop_id, &product_id).is_empty());
    }

    #[test]
    fn customer_review_is_found_in_any_state() {
        let projection = projection();
        let shop_id = ShopId::new();
        let product_id = ProductId::new(AggregateId::new());
        let review_id = submit(&projection, shop_id, product_id, 3);

        let rm = projection.get(shop_id, &review_id).unwrap();
        let found = projection
            .find_for_customer(shop_id, &product_id, &rm.customer_id)
            .unwrap();
        assert_eq!(found.review_id, review_id);
        assert_eq!(found.state, ReviewState::Draft);
    }

    #[test]
    fn moderation_queue_lists_drafts_oldest_first() {
        let projection = projection();
        let shop_id = ShopId::new();
        let product_id = ProductId::new(AggregateId::new());

        let first = submit(&projection, shop_id, product_id, 2);
        let second = submit(&projection, shop_id, product_id, 4);
        publish(&projection, shop_id, second, 2);

        let queue = projection.moderation_queue(shop_id);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].review_id, first);
    }
}
