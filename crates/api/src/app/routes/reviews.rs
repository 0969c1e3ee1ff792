use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use velora_catalog::ProductId;
use velora_core::AggregateId;
use velora_reviews::{
    Rating, Review, ReviewCommand, ReviewId, ReviseReview, SubmitReview,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, ShopContext};

pub async fn submit_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SubmitReviewRequest>,
) -> axum::response::Response {
    let product_agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(product_agg);

    if services.catalog().get(shop.shop_id(), &product_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
    }

    let rating = match Rating::new(body.rating) {
        Ok(r) => r,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string()),
    };

    let customer_id = principal.customer_id();
    let review_body = body.body.unwrap_or_default();

    // One review per (customer, product): a second submission revises the
    // existing row and sends it back through moderation.
    let existing = services
        .reviews()
        .find_for_customer(shop.shop_id(), &product_id, &customer_id);

    let (review_agg, cmd, created) = match existing {
        Some(rm) => (
            rm.review_id.0,
            ReviewCommand::ReviseReview(ReviseReview {
                shop_id: shop.shop_id(),
                review_id: rm.review_id,
                customer_id,
                title: body.title,
                rating,
                body: review_body,
                occurred_at: Utc::now(),
            }),
            false,
        ),
        None => {
            let agg = AggregateId::new();
            // Verified purchase is fixed at submission time from the
            // caller's confirmed orders.
            let verified_purchase = services.orders().has_confirmed_purchase(
                shop.shop_id(),
                customer_id,
                product_id,
            );
            (
                agg,
                ReviewCommand::SubmitReview(SubmitReview {
                    shop_id: shop.shop_id(),
                    review_id: ReviewId::new(agg),
                    product_id,
                    customer_id,
                    title: body.title,
                    rating,
                    body: review_body,
                    verified_purchase,
                    occurred_at: Utc::now(),
                }),
                true,
            )
        }
    };

    match services.dispatch::<Review>(
        shop.shop_id(),
        review_agg,
        "reviews.review",
        cmd,
        |_s, id| Review::empty(ReviewId::new(id)),
    ) {
        Ok(_) => {
            let status = if created { StatusCode::CREATED } else { StatusCode::OK };
            (
                status,
                Json(serde_json::json!({
                    "review_id": ReviewId::new(review_agg).0.to_string(),
                    "product_id": product_id.0.to_string(),
                    "state": "draft",
                })),
            )
                .into_response()
        }
        Err(e) => errors::dispatch_error_to_response(e),
    }
}
