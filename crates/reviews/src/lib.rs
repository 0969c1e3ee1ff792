//! `velora-reviews` — product review domain (moderated, verified purchases).

pub mod review;
pub mod summary;

pub use review::{
    PublishReview, Rating, RejectReview, Review, ReviewCommand, ReviewEvent, ReviewId,
    ReviewState, ReviseReview, SubmitReview,
};
pub use summary::RatingSummary;
