use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};

use velora_catalog::ProductId;
use velora_core::AggregateId;
use velora_infra::projections::catalog::{CatalogFilter, ProductReadModel};
use velora_infra::read_model::Page;
use velora_inventory::stock_status;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::ShopContext;

/// Number of products featured on the homepage.
const HOMEPAGE_LIMIT: usize = 8;

fn enriched_product_json(
    services: &AppServices,
    shop: &ShopContext,
    rm: &ProductReadModel,
) -> serde_json::Value {
    let quantity = services.stock().quantity(shop.shop_id(), &rm.product_id);
    let status = stock_status(quantity, rm.thresholds.min_stock_level);
    let summary = services.reviews().summary(shop.shop_id(), &rm.product_id);
    dto::product_to_json(rm, quantity, status, summary)
}

/// Filters shared by `/shop` and `/shop/search`.
///
/// Unknown enum values are ignored rather than failing the request; malformed
/// prices are likewise dropped.
fn filter_from_params(params: &HashMap<String, String>) -> CatalogFilter {
    CatalogFilter {
        audience: params
            .get("target_audience")
            .and_then(|s| s.parse().ok()),
        brand: params.get("brand").filter(|s| !s.is_empty()).cloned(),
        color: params.get("color").filter(|s| !s.is_empty()).cloned(),
        size: params.get("size").and_then(|s| s.parse().ok()),
        search: params.get("search").filter(|s| !s.is_empty()).cloned(),
        min_price: params.get("min_price").and_then(|s| s.parse().ok()),
        max_price: params.get("max_price").and_then(|s| s.parse().ok()),
    }
}

/// Parse the page parameter; a malformed value redirects to the canonical
/// unfiltered listing instead of failing the request.
fn page_from_params(params: &HashMap<String, String>) -> Result<Page, axum::response::Response> {
    match params.get("page") {
        None => Ok(Page::default()),
        Some(raw) => match raw.parse::<u32>() {
            Ok(n) => Ok(Page::new(n)),
            Err(_) => Err(Redirect::to("/shop").into_response()),
        },
    }
}

pub async fn home(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
) -> axum::response::Response {
    let items = services
        .catalog()
        .latest(shop.shop_id(), HOMEPAGE_LIMIT)
        .iter()
        .map(|rm| enriched_product_json(&services, &shop, rm))
        .collect::<Vec<_>>();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn shop(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Query(mut params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    // The plain catalog page exposes attribute filters only; full-text and
    // price filters belong to the search form.
    params.remove("search");
    params.remove("min_price");
    params.remove("max_price");
    shop_with_params(services, shop, params).await
}

pub async fn search(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response {
    shop_with_params(services, shop, params).await
}

async fn shop_with_params(
    services: Arc<AppServices>,
    shop: ShopContext,
    params: HashMap<String, String>,
) -> axum::response::Response {
    let page = match page_from_params(&params) {
        Ok(p) => p,
        Err(redirect) => return redirect,
    };
    let filter = filter_from_params(&params);

    let result = services.catalog().search(shop.shop_id(), &filter, page);
    let items = result
        .items
        .iter()
        .map(|rm| enriched_product_json(&services, &shop, rm))
        .collect::<Vec<_>>();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "items": items,
            "search_term": params.get("search").cloned().unwrap_or_default(),
            "page": result.page,
            "total_pages": result.total_pages,
            "total_count": result.total_count,
        })),
    )
        .into_response()
}

pub async fn product_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(agg);

    if services.catalog().get(shop.shop_id(), &product_id).is_none() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
    }

    let reviews = services
        .reviews()
        .published_for_product(shop.shop_id(), &product_id);
    let summary = services.reviews().summary(shop.shop_id(), &product_id);

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "product_id": product_id.0.to_string(),
            "reviews": reviews.iter().map(dto::review_to_json).collect::<Vec<_>>(),
            "average_rating": summary.average_rating,
            "total_reviews": summary.review_count,
        })),
    )
        .into_response()
}

pub async fn track_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Path(tracking_number): Path<String>,
) -> axum::response::Response {
    match services
        .orders()
        .find_by_tracking(shop.shop_id(), &tracking_number)
    {
        Some(order) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "tracking_number": tracking_number,
                "order": dto::order_to_json(&order),
            })),
        )
            .into_response(),
        None => errors::json_error(
            StatusCode::NOT_FOUND,
            "tracking_not_found",
            format!("no order found for tracking number {tracking_number}"),
        ),
    }
}
