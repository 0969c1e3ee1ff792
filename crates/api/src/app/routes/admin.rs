use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use velora_auth::Permission;
use velora_catalog::{
    ArchiveProduct, CreateProduct, Pricing, Product, ProductAttributes, ProductCommand, ProductId,
    PublishProduct, SetPricing, SetStockThresholds, StockThresholds,
};
use velora_core::AggregateId;
use velora_inventory::{
    InventoryCommand, LedgerId, MovementReason, OpenLedger, RecordMovement, StockLedger,
};
use velora_reviews::{PublishReview, RejectReview, Review, ReviewCommand, ReviewId};

use crate::app::routes::common::CmdAuth;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::{PrincipalContext, ShopContext};

pub fn router() -> Router {
    Router::new()
        .route("/products", post(create_product).get(list_products))
        .route("/products/:id/publish", post(publish_product))
        .route("/products/:id/archive", post(archive_product))
        .route("/products/:id/pricing", post(set_pricing))
        .route("/products/:id/thresholds", post(set_thresholds))
        .route("/stock/:product_id/move", post(move_stock))
        .route("/inventory/report", get(inventory_report))
        .route("/reviews/pending", get(pending_reviews))
        .route("/reviews/:id/publish", post(publish_review))
        .route("/reviews/:id/reject", post(reject_review))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    // Unknown enum values are a hard error here, unlike the lenient
    // storefront filters: an admin typo must not silently drop the attribute.
    let audience = match parse_opt(&body.target_audience) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let size = match parse_opt(&body.size) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let season = match parse_opt(&body.season) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let thresholds = match (body.min_stock_level, body.max_stock_level) {
        (None, None) => None,
        (min, max) => {
            let defaults = StockThresholds::default();
            Some(StockThresholds {
                min_stock_level: min.unwrap_or(defaults.min_stock_level),
                max_stock_level: max.unwrap_or(defaults.max_stock_level),
            })
        }
    };

    let agg = AggregateId::new();
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::CreateProduct(CreateProduct {
        shop_id: shop.shop_id(),
        product_id,
        sku: body.sku,
        name: body.name,
        description: body.description.unwrap_or_default(),
        attributes: ProductAttributes {
            brand: body.brand,
            color: body.color,
            material: body.material,
            audience,
            size,
            season,
        },
        pricing: Pricing {
            list_price: body.list_price,
            b2b_price: body.b2b_price,
        },
        thresholds,
        saleable: body.saleable.unwrap_or(true),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.create")],
    };
    if let Err(e) = authz::authorize_command(&shop, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    if let Err(e) = services.dispatch::<Product>(
        shop.shop_id(),
        agg,
        "catalog.product",
        cmd_auth.inner,
        |_s, aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        return errors::dispatch_error_to_response(e);
    }

    // Open the product's stock ledger alongside the catalog entry.
    let open_ledger = InventoryCommand::OpenLedger(OpenLedger {
        shop_id: shop.shop_id(),
        ledger_id: LedgerId::new(agg),
        occurred_at: Utc::now(),
    });
    if let Err(e) = services.dispatch::<StockLedger>(
        shop.shop_id(),
        agg,
        "inventory.ledger",
        open_ledger,
        |_s, aggregate_id| StockLedger::empty(LedgerId::new(aggregate_id)),
    ) {
        tracing::warn!(product_id = %product_id, "opening stock ledger failed: {e:?}");
    }

    (
        StatusCode::CREATED,
        Json(serde_json::json!({ "id": agg.to_string() })),
    )
        .into_response()
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) =
        authz::authorize_permissions(&shop, &principal, &[Permission::new("catalog.read")])
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let items = services
        .catalog()
        .list(shop.shop_id())
        .iter()
        .map(|rm| {
            let quantity = services.stock().quantity(shop.shop_id(), &rm.product_id);
            let status = velora_inventory::stock_status(quantity, rm.thresholds.min_stock_level);
            let summary = services.reviews().summary(shop.shop_id(), &rm.product_id);
            dto::product_to_json(rm, quantity, status, summary)
        })
        .collect::<Vec<_>>();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn publish_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::PublishProduct(PublishProduct {
        shop_id: shop.shop_id(),
        product_id,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.publish")],
    };
    if let Err(e) = authz::authorize_command(&shop, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<Product>(
        shop.shop_id(),
        agg,
        "catalog.product",
        cmd_auth.inner,
        |_s, aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id": agg.to_string() }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(agg);

    let cmd = ProductCommand::ArchiveProduct(ArchiveProduct {
        shop_id: shop.shop_id(),
        product_id,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.archive")],
    };
    if let Err(e) = authz::authorize_command(&shop, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<Product>(
        shop.shop_id(),
        agg,
        "catalog.product",
        cmd_auth.inner,
        |_s, aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id": agg.to_string() }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn set_pricing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetPricingRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    let cmd = ProductCommand::SetPricing(SetPricing {
        shop_id: shop.shop_id(),
        product_id: ProductId::new(agg),
        pricing: Pricing {
            list_price: body.list_price,
            b2b_price: body.b2b_price,
        },
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.price")],
    };
    if let Err(e) = authz::authorize_command(&shop, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<Product>(
        shop.shop_id(),
        agg,
        "catalog.product",
        cmd_auth.inner,
        |_s, aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id": agg.to_string() }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn set_thresholds(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SetThresholdsRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    let cmd = ProductCommand::SetStockThresholds(SetStockThresholds {
        shop_id: shop.shop_id(),
        product_id: ProductId::new(agg),
        thresholds: StockThresholds {
            min_stock_level: body.min_stock_level,
            max_stock_level: body.max_stock_level,
        },
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("catalog.thresholds")],
    };
    if let Err(e) = authz::authorize_command(&shop, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<Product>(
        shop.shop_id(),
        agg,
        "catalog.product",
        cmd_auth.inner,
        |_s, aggregate_id| Product::empty(ProductId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id": agg.to_string() }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn move_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Json(body): Json<dto::StockMoveRequest>,
) -> axum::response::Response {
    let agg: AggregateId = match product_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };

    let reason = match body.reason.as_deref() {
        None => MovementReason::Adjustment,
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", format!("{e}"))
            }
        },
    };

    let cmd = InventoryCommand::RecordMovement(RecordMovement {
        shop_id: shop.shop_id(),
        ledger_id: LedgerId::new(agg),
        delta: body.delta,
        reason,
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("inventory.move")],
    };
    if let Err(e) = authz::authorize_command(&shop, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<StockLedger>(
        shop.shop_id(),
        agg,
        "inventory.ledger",
        cmd_auth.inner,
        |_s, aggregate_id| StockLedger::empty(LedgerId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id": agg.to_string() }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

/// The low-stock report: one pass over stock levels joined with catalog
/// thresholds.
pub async fn inventory_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) =
        authz::authorize_permissions(&shop, &principal, &[Permission::new("inventory.report")])
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let products = services.catalog().list(shop.shop_id());
    let rows = services.stock().inventory_report(shop.shop_id(), &products);
    let low = rows
        .iter()
        .filter(|r| r.stock_status != velora_inventory::StockStatus::InStock)
        .map(dto::report_row_to_json)
        .collect::<Vec<_>>();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "rows": rows.iter().map(dto::report_row_to_json).collect::<Vec<_>>(),
            "low_stock": low,
        })),
    )
        .into_response()
}

pub async fn pending_reviews(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) =
        authz::authorize_permissions(&shop, &principal, &[Permission::new("reviews.moderate")])
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let items = services
        .reviews()
        .moderation_queue(shop.shop_id())
        .iter()
        .map(dto::review_to_json)
        .collect::<Vec<_>>();

    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn publish_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid review id"),
    };

    let cmd = ReviewCommand::PublishReview(PublishReview {
        shop_id: shop.shop_id(),
        review_id: ReviewId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("reviews.moderate")],
    };
    if let Err(e) = authz::authorize_command(&shop, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<Review>(
        shop.shop_id(),
        agg,
        "reviews.review",
        cmd_auth.inner,
        |_s, aggregate_id| Review::empty(ReviewId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id": agg.to_string() }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn reject_review(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg: AggregateId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid review id"),
    };

    let cmd = ReviewCommand::RejectReview(RejectReview {
        shop_id: shop.shop_id(),
        review_id: ReviewId::new(agg),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![Permission::new("reviews.moderate")],
    };
    if let Err(e) = authz::authorize_command(&shop, &principal, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.dispatch::<Review>(
        shop.shop_id(),
        agg,
        "reviews.review",
        cmd_auth.inner,
        |_s, aggregate_id| Review::empty(ReviewId::new(aggregate_id)),
    ) {
        Ok(_) => (StatusCode::OK, Json(serde_json::json!({ "id": agg.to_string() }))).into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

fn parse_opt<T: core::str::FromStr<Err = velora_core::DomainError>>(
    raw: &Option<String>,
) -> Result<Option<T>, axum::response::Response> {
    match raw {
        None => Ok(None),
        Some(s) => s
            .parse()
            .map(Some)
            .map_err(|e: velora_core::DomainError| {
                errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
            }),
    }
}
