use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use velora_inventory::stock_status;
use velora_sales::unit_price_for;
use velora_sales::CustomerType;

use crate::app::dto;
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, ShopContext};

/// B2B portal history is capped at the most recent orders.
const B2B_ORDER_LIMIT: usize = 10;

pub async fn b2b_portal(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    let orders = services
        .orders()
        .b2b_orders(shop.shop_id(), principal.customer_id(), B2B_ORDER_LIMIT)
        .iter()
        .map(dto::order_to_json)
        .collect::<Vec<_>>();

    // Storefront products carrying a dedicated B2B price.
    let products = services
        .catalog()
        .list(shop.shop_id())
        .into_iter()
        .filter(|p| p.is_storefront_visible() && p.pricing.b2b_price.is_some())
        .map(|p| {
            let quantity = services.stock().quantity(shop.shop_id(), &p.product_id);
            let status = stock_status(quantity, p.thresholds.min_stock_level);
            let summary = services.reviews().summary(shop.shop_id(), &p.product_id);
            let mut value = dto::product_to_json(&p, quantity, status, summary);
            value["b2b_unit_price"] = serde_json::json!(unit_price_for(
                CustomerType::B2b,
                p.pricing.list_price,
                p.pricing.b2b_price,
            ));
            value
        })
        .collect::<Vec<_>>();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "orders": orders,
            "products": products,
        })),
    )
        .into_response()
}
