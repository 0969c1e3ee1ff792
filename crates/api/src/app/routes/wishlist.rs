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
use velora_wishlist::{ToggleEntry, ToggleOutcome, Wishlist, WishlistCommand, WishlistId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, ShopContext};

pub async fn wishlist_page(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let entries = services
        .wishlist()
        .list_for_customer(shop.shop_id(), principal.customer_id());

    let items = entries
        .iter()
        .map(|entry| {
            let product = services.catalog().get(shop.shop_id(), &entry.product_id);
            dto::wishlist_entry_to_json(entry, product.as_ref())
        })
        .collect::<Vec<_>>();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn toggle(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::WishlistToggleRequest>,
) -> axum::response::Response {
    let product_agg: AggregateId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(product_agg);

    if services.catalog().get(shop.shop_id(), &product_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
    }

    dispatch_toggle(&services, &shop, &principal, product_id)
}

pub async fn remove(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> axum::response::Response {
    let product_agg: AggregateId = match product_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(product_agg);

    if !services
        .wishlist()
        .contains(shop.shop_id(), principal.customer_id(), product_id)
    {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not in wishlist");
    }

    dispatch_toggle(&services, &shop, &principal, product_id)
}

/// Toggle is the single mutator: add when absent, remove when present.
fn dispatch_toggle(
    services: &AppServices,
    shop: &ShopContext,
    principal: &PrincipalContext,
    product_id: ProductId,
) -> axum::response::Response {
    let customer_id = principal.customer_id();
    let wishlist_id = WishlistId::for_customer(customer_id);

    let cmd = WishlistCommand::ToggleEntry(ToggleEntry {
        shop_id: shop.shop_id(),
        wishlist_id,
        customer_id,
        product_id,
        occurred_at: Utc::now(),
    });

    let committed = match services.dispatch::<Wishlist>(
        shop.shop_id(),
        wishlist_id.0,
        "wishlist.wishlist",
        cmd,
        |_s, id| Wishlist::empty(WishlistId::new(id)),
    ) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    // The committed event type is the source of truth for what happened.
    let outcome = match committed.first().map(|e| e.event_type.as_str()) {
        Some("wishlist.entry.added") => ToggleOutcome::Added,
        _ => ToggleOutcome::Removed,
    };

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "product_id": product_id.0.to_string(),
            "action": match outcome {
                ToggleOutcome::Added => "added",
                ToggleOutcome::Removed => "removed",
            },
            "in_wishlist": outcome == ToggleOutcome::Added,
        })),
    )
        .into_response()
}
