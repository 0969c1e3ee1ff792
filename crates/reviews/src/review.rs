use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use velora_catalog::ProductId;
use velora_core::{Aggregate, AggregateId, AggregateRoot, CustomerId, DomainError, ShopId};
use velora_events::Event;

/// Review identifier (shop-scoped via `shop_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReviewId(pub AggregateId);

impl ReviewId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ReviewId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Star rating, 1 through 5.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub fn new(value: u8) -> Result<Self, DomainError> {
        if !(1..=5).contains(&value) {
            return Err(DomainError::validation("rating must be between 1 and 5"));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

/// Moderation lifecycle. Only published reviews count toward aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    Draft,
    Published,
    Rejected,
}

/// Aggregate root: Review.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    id: ReviewId,
    shop_id: Option<ShopId>,
    product_id: Option<ProductId>,
    customer_id: Option<CustomerId>,
    title: String,
    rating: Option<Rating>,
    body: String,
    state: ReviewState,
    verified_purchase: bool,
    version: u64,
    created: bool,
}

impl Review {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ReviewId) -> Self {
        Self {
            id,
            shop_id: None,
            product_id: None,
            customer_id: None,
            title: String::new(),
            rating: None,
            body: String::new(),
            state: ReviewState::Draft,
            verified_purchase: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ReviewId {
        self.id
    }

    pub fn shop_id(&self) -> Option<ShopId> {
        self.shop_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn rating(&self) -> Option<Rating> {
        self.rating
    }

    pub fn state(&self) -> ReviewState {
        self.state
    }

    pub fn is_verified_purchase(&self) -> bool {
        self.verified_purchase
    }
}

impl AggregateRoot for Review {
    type Id = ReviewId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: SubmitReview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReview {
    pub shop_id: ShopId,
    pub review_id: ReviewId,
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub title: String,
    pub rating: Rating,
    pub body: String,
    /// Fixed at submission time from the caller's order history.
    pub verified_purchase: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ReviseReview (same customer re-submits; back to moderation).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviseReview {
    pub shop_id: ShopId,
    pub review_id: ReviewId,
    pub customer_id: CustomerId,
    pub title: String,
    pub rating: Rating,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PublishReview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishReview {
    pub shop_id: ShopId,
    pub review_id: ReviewId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RejectReview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectReview {
    pub shop_id: ShopId,
    pub review_id: ReviewId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewCommand {
    SubmitReview(SubmitReview),
    ReviseReview(ReviseReview),
    PublishReview(PublishReview),
    RejectReview(RejectReview),
}

/// Event: ReviewSubmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewSubmitted {
    pub shop_id: ShopId,
    pub review_id: ReviewId,
    pub product_id: ProductId,
    pub customer_id: CustomerId,
    pub title: String,
    pub rating: Rating,
    pub body: String,
    pub verified_purchase: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReviewRevised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRevised {
    pub shop_id: ShopId,
    pub review_id: ReviewId,
    pub title: String,
    pub rating: Rating,
    pub body: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReviewPublished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewPublished {
    pub shop_id: ShopId,
    pub review_id: ReviewId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ReviewRejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRejected {
    pub shop_id: ShopId,
    pub review_id: ReviewId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewEvent {
    ReviewSubmitted(ReviewSubmitted),
    ReviewRevised(ReviewRevised),
    ReviewPublished(ReviewPublished),
    ReviewRejected(ReviewRejected),
}

impl Event for ReviewEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReviewEvent::ReviewSubmitted(_) => "reviews.review.submitted",
            ReviewEvent::ReviewRevised(_) => "reviews.review.revised",
            ReviewEvent::ReviewPublished(_) => "reviews.review.published",
            ReviewEvent::ReviewRejected(_) => "reviews.review.rejected",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReviewEvent::ReviewSubmitted(e) => e.occurred_at,
            ReviewEvent::ReviewRevised(e) => e.occurred_at,
            ReviewEvent::ReviewPublished(e) => e.occurred_at,
            ReviewEvent::ReviewRejected(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Review {
    type Command = ReviewCommand;
    type Event = ReviewEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReviewEvent::ReviewSubmitted(e) => {
                self.id = e.review_id;
                self.shop_id = Some(e.shop_id);
                self.product_id = Some(e.product_id);
                self.customer_id = Some(e.customer_id);
                self.title = e.title.clone();
                self.rating = Some(e.rating);
                self.body = e.body.clone();
                self.state = ReviewState::Draft;
                self.verified_purchase = e.verified_purchase;
                self.created = true;
            }
            ReviewEvent::ReviewRevised(e) => {
                self.title = e.title.clone();
                self.rating = Some(e.rating);
                self.body = e.body.clone();
                self.state = ReviewState::Draft;
            }
            ReviewEvent::ReviewPublished(_) => {
                self.state = ReviewState::Published;
            }
            ReviewEvent::ReviewRejected(_) => {
                self.state = ReviewState::Rejected;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReviewCommand::SubmitReview(cmd) => self.handle_submit(cmd),
            ReviewCommand::ReviseReview(cmd) => self.handle_revise(cmd),
            ReviewCommand::PublishReview(cmd) => self.handle_publish(cmd),
            ReviewCommand::RejectReview(cmd) => self.handle_reject(cmd),
        }
    }
}

impl Review {
    fn ensure_shop(&self, shop_id: ShopId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.shop_id != Some(shop_id) {
            return Err(DomainError::invariant("shop mismatch"));
        }
        Ok(())
    }

    fn ensure_review_id(&self, review_id: ReviewId) -> Result<(), DomainError> {
        if self.id != review_id {
            return Err(DomainError::invariant("review_id mismatch"));
        }
        Ok(())
    }

    fn handle_submit(&self, cmd: &SubmitReview) -> Result<Vec<ReviewEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("review already exists"));
        }

        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }

        Ok(vec![ReviewEvent::ReviewSubmitted(ReviewSubmitted {
            shop_id: cmd.shop_id,
            review_id: cmd.review_id,
            product_id: cmd.product_id,
            customer_id: cmd.customer_id,
            title: cmd.title.clone(),
            rating: cmd.rating,
            body: cmd.body.clone(),
            verified_purchase: cmd.verified_purchase,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_revise(&self, cmd: &ReviseReview) -> Result<Vec<ReviewEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_review_id(cmd.review_id)?;

        if self.customer_id != Some(cmd.customer_id) {
            return Err(DomainError::Unauthorized);
        }

        if cmd.title.trim().is_empty() {
            return Err(DomainError::validation("title cannot be empty"));
        }

        Ok(vec![ReviewEvent::ReviewRevised(ReviewRevised {
            shop_id: cmd.shop_id,
            review_id: cmd.review_id,
            title: cmd.title.clone(),
            rating: cmd.rating,
            body: cmd.body.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_publish(&self, cmd: &PublishReview) -> Result<Vec<ReviewEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_review_id(cmd.review_id)?;

        if self.state == ReviewState::Published {
            return Err(DomainError::conflict("review is already published"));
        }

        if self.state == ReviewState::Rejected {
            return Err(DomainError::invariant(
                "rejected reviews must be revised before publishing",
            ));
        }

        Ok(vec![ReviewEvent::ReviewPublished(ReviewPublished {
            shop_id: cmd.shop_id,
            review_id: cmd.review_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectReview) -> Result<Vec<ReviewEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_review_id(cmd.review_id)?;

        if self.state == ReviewState::Rejected {
            return Err(DomainError::conflict("review is already rejected"));
        }

        Ok(vec![ReviewEvent::ReviewRejected(ReviewRejected {
            shop_id: cmd.shop_id,
            review_id: cmd.review_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use velora_core::AggregateId;

    fn test_shop_id() -> ShopId {
        ShopId::new()
    }

    fn test_review_id() -> ReviewId {
        ReviewId::new(AggregateId::new())
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn submit_cmd(shop_id: ShopId, review_id: ReviewId, customer_id: CustomerId) -> SubmitReview {
        SubmitReview {
            shop_id,
            review_id,
            product_id: test_product_id(),
            customer_id,
            title: "Great fit".to_string(),
            rating: Rating::new(4).unwrap(),
            body: "True to size.".to_string(),
            verified_purchase: true,
            occurred_at: test_time(),
        }
    }

    fn submitted_review(shop_id: ShopId, review_id: ReviewId, customer_id: CustomerId) -> Review {
        let mut review = Review::empty(review_id);
        let events = review
            .handle(&ReviewCommand::SubmitReview(submit_cmd(
                shop_id, review_id, customer_id,
            )))
            .unwrap();
        review.apply(&events[0]);
        review
    }

    #[test]
    fn rating_is_validated() {
        assert!(Rating::new(0).is_err());
        assert!(Rating::new(6).is_err());
        for value in 1..=5 {
            assert_eq!(Rating::new(value).unwrap().value(), value);
        }
    }

    #[test]
    fn submitted_review_starts_in_draft() {
        let review = submitted_review(test_shop_id(), test_review_id(), CustomerId::new());
        assert_eq!(review.state(), ReviewState::Draft);
        assert!(review.is_verified_purchase());
    }

    #[test]
    fn submit_rejects_empty_title() {
        let review = Review::empty(test_review_id());
        let mut cmd = submit_cmd(test_shop_id(), test_review_id(), CustomerId::new());
        cmd.title = "  ".to_string();

        let err = review
            .handle(&ReviewCommand::SubmitReview(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for empty title"),
        }
    }

    #[test]
    fn publish_then_revise_returns_to_draft() {
        let shop_id = test_shop_id();
        let review_id = test_review_id();
        let customer_id = CustomerId::new();
        let mut review = submitted_review(shop_id, review_id, customer_id);

        let events = review
            .handle(&ReviewCommand::PublishReview(PublishReview {
                shop_id,
                review_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        review.apply(&events[0]);
        assert_eq!(review.state(), ReviewState::Published);

        let events = review
            .handle(&ReviewCommand::ReviseReview(ReviseReview {
                shop_id,
                review_id,
                customer_id,
                title: "Runs small".to_string(),
                rating: Rating::new(3).unwrap(),
                body: "Size up.".to_string(),
                occurred_at: test_time(),
            }))
            .unwrap();
        review.apply(&events[0]);
        assert_eq!(review.state(), ReviewState::Draft);
        assert_eq!(review.rating().unwrap().value(), 3);
    }

    #[test]
    fn revise_by_another_customer_is_unauthorized() {
        let shop_id = test_shop_id();
        let review_id = test_review_id();
        let review = submitted_review(shop_id, review_id, CustomerId::new());

        let err = review
            .handle(&ReviewCommand::ReviseReview(ReviseReview {
                shop_id,
                review_id,
                customer_id: CustomerId::new(),
                title: "Hijacked".to_string(),
                rating: Rating::new(1).unwrap(),
                body: String::new(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Unauthorized => {}
            _ => panic!("Expected Unauthorized for foreign revision"),
        }
    }

    #[test]
    fn rejected_review_cannot_be_published_directly() {
        let shop_id = test_shop_id();
        let review_id = test_review_id();
        let mut review = submitted_review(shop_id, review_id, CustomerId::new());

        let events = review
            .handle(&ReviewCommand::RejectReview(RejectReview {
                shop_id,
                review_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        review.apply(&events[0]);
        assert_eq!(review.state(), ReviewState::Rejected);

        let err = review
            .handle(&ReviewCommand::PublishReview(PublishReview {
                shop_id,
                review_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("revised before") => {}
            _ => panic!("Expected InvariantViolation for publishing rejected review"),
        }
    }

    #[test]
    fn double_publish_is_a_conflict() {
        let shop_id = test_shop_id();
        let review_id = test_review_id();
        let mut review = submitted_review(shop_id, review_id, CustomerId::new());

        let events = review
            .handle(&ReviewCommand::PublishReview(PublishReview {
                shop_id,
                review_id,
                occurred_at: test_time(),
            }))
            .unwrap();
        review.apply(&events[0]);

        let err = review
            .handle(&ReviewCommand::PublishReview(PublishReview {
                shop_id,
                review_id,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        match err {
            DomainError::Conflict(_) => {}
            _ => panic!("Expected Conflict for double publish"),
        }
    }
}
