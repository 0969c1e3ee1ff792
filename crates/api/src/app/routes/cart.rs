use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Redirect},
    Json,
};
use chrono::{Duration, Utc};

use velora_catalog::ProductId;
use velora_core::AggregateId;
use velora_infra::projections::sales_orders::SalesOrderReadModel;
use velora_invoicing::{Invoice, InvoiceCommand, InvoiceId, IssueInvoice, PostInvoice};
use velora_inventory::{
    InventoryCommand, LedgerId, MovementReason, RecordMovement, StockLedger,
};
use velora_sales::{
    payment_terms_for, unit_price_for, AssignTracking, ConfirmOrder, CustomerType, DeliveryMethod,
    LinePrice,
    MarkInvoiced, OpenOrder, OrderSource, OrderStatus, ProductAvailability, SalesOrder,
    SalesOrderCommand, SalesOrderId, SetCustomerType, SetDeliveryMethod, UpdateLine,
};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::{PrincipalContext, ShopContext};

/// Delivery options offered at checkout.
const DELIVERY_METHODS: [(&str, &str); 3] = [
    ("standard", "Standard Delivery (3-5 days) - Free"),
    ("express", "Express Delivery (1-2 days) - $10"),
    ("pickup", "Store Pickup - Free"),
];

fn tracking_number_for(order_id: SalesOrderId) -> String {
    let hex = order_id.0.as_uuid().simple().to_string();
    format!("VL-{}", hex[..8].to_uppercase())
}

pub async fn cart_update(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::CartUpdateRequest>,
) -> axum::response::Response {
    let product_agg: AggregateId = match body.product_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid product id"),
    };
    let product_id = ProductId::new(product_agg);

    let Some(product) = services.catalog().get(shop.shop_id(), &product_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not found");
    };
    if !product.is_storefront_visible() {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "product not available");
    }

    if body.quantity < 0 {
        return errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "quantity cannot be negative",
        );
    }

    // Stock check against the current snapshot; the aggregate re-validates
    // against the same snapshot on dispatch.
    let available = services.stock().quantity(shop.shop_id(), &product_id);
    if body.quantity > available {
        return (
            StatusCode::CONFLICT,
            Json(serde_json::json!({
                "error": "stock_unavailable",
                "message": format!("requested quantity exceeds available stock for {}", product.name),
                "product_id": product_id.0.to_string(),
                "available_qty": available,
                "requested_qty": body.quantity,
            })),
        )
            .into_response();
    }

    // Resolve the draft order: reuse the caller's order or open a fresh one.
    let customer_id = principal.customer_id();
    let order_agg: AggregateId = match &body.order_id {
        Some(raw) => {
            let agg: AggregateId = match raw.parse() {
                Ok(v) => v,
                Err(_) => {
                    return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id")
                }
            };
            if let Some(existing) = services.orders().get(shop.shop_id(), &SalesOrderId::new(agg)) {
                if existing.customer_id != customer_id {
                    return errors::json_error(StatusCode::FORBIDDEN, "forbidden", "not your order");
                }
            }
            agg
        }
        None => {
            let agg = AggregateId::new();
            let open = SalesOrderCommand::OpenOrder(OpenOrder {
                shop_id: shop.shop_id(),
                order_id: SalesOrderId::new(agg),
                customer_id,
                source: OrderSource::Storefront,
                occurred_at: Utc::now(),
            });
            if let Err(e) = services.dispatch::<SalesOrder>(
                shop.shop_id(),
                agg,
                "sales.order",
                open,
                |_s, id| SalesOrder::empty(SalesOrderId::new(id)),
            ) {
                return errors::dispatch_error_to_response(e);
            }
            agg
        }
    };
    let order_id = SalesOrderId::new(order_agg);

    let unit_price = unit_price_for(
        CustomerType::B2c,
        product.pricing.list_price,
        product.pricing.b2b_price,
    );

    let cmd = SalesOrderCommand::UpdateLine(UpdateLine {
        shop_id: shop.shop_id(),
        order_id,
        product_id,
        quantity: body.quantity,
        unit_price,
        quantity_available: available,
        occurred_at: Utc::now(),
    });

    match services.dispatch::<SalesOrder>(
        shop.shop_id(),
        order_agg,
        "sales.order",
        cmd,
        |_s, id| SalesOrder::empty(SalesOrderId::new(id)),
    ) {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "order_id": order_id.0.to_string(),
                "product_id": product_id.0.to_string(),
                "quantity": body.quantity,
                "unit_price": unit_price,
            })),
        )
            .into_response(),
        Err(e) => errors::dispatch_error_to_response(e),
    }
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> axum::response::Response {
    // The open cart is the customer's newest draft order.
    let draft = services
        .orders()
        .list_for_customer(shop.shop_id(), principal.customer_id())
        .into_iter()
        .find(|o| o.status == OrderStatus::Draft);

    let Some(order) = draft else {
        return Redirect::to("/shop").into_response();
    };
    if order.lines.is_empty() {
        return Redirect::to("/shop").into_response();
    }

    let delivery_methods = DELIVERY_METHODS
        .iter()
        .map(|(key, label)| serde_json::json!({ "key": key, "label": label }))
        .collect::<Vec<_>>();

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order": dto::order_to_json(&order),
            "delivery_methods": delivery_methods,
        })),
    )
        .into_response()
}

pub async fn confirm_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(shop): Extension<ShopContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<dto::ConfirmOrderRequest>,
) -> axum::response::Response {
    let order_agg: AggregateId = match body.order_id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"),
    };
    let order_id = SalesOrderId::new(order_agg);

    let Some(order) = services.orders().get(shop.shop_id(), &order_id) else {
        return errors::json_error(StatusCode::NOT_FOUND, "not_found", "order not found");
    };
    if order.customer_id != principal.customer_id() {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", "not your order");
    }

    // Optional customer-type switch before confirmation (re-prices lines).
    let mut customer_type = order.customer_type;
    if let Some(ref raw) = body.customer_type {
        let requested: CustomerType = match raw.parse() {
            Ok(v) => v,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
            }
        };
        if requested != customer_type {
            let price_book = match price_book_for(&services, &shop, &order, requested) {
                Ok(v) => v,
                Err(resp) => return resp,
            };
            let cmd = SalesOrderCommand::SetCustomerType(SetCustomerType {
                shop_id: shop.shop_id(),
                order_id,
                customer_type: requested,
                price_book,
                occurred_at: Utc::now(),
            });
            if let Err(e) = services.dispatch::<SalesOrder>(
                shop.shop_id(),
                order_agg,
                "sales.order",
                cmd,
                |_s, id| SalesOrder::empty(SalesOrderId::new(id)),
            ) {
                return errors::dispatch_error_to_response(e);
            }
            customer_type = requested;
        }
    }

    // Optional delivery method.
    if let Some(ref raw) = body.delivery_method {
        let method: DeliveryMethod = match raw.parse() {
            Ok(v) => v,
            Err(e) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "validation_error", e.to_string())
            }
        };
        let cmd = SalesOrderCommand::SetDeliveryMethod(SetDeliveryMethod {
            shop_id: shop.shop_id(),
            order_id,
            delivery_method: method,
            occurred_at: Utc::now(),
        });
        if let Err(e) = services.dispatch::<SalesOrder>(
            shop.shop_id(),
            order_agg,
            "sales.order",
            cmd,
            |_s, id| SalesOrder::empty(SalesOrderId::new(id)),
        ) {
            return errors::dispatch_error_to_response(e);
        }
    }

    // Confirmation against a fresh availability snapshot. Best-effort: stock
    // may still move between this check and the shipment movements below.
    let availability: Vec<ProductAvailability> = order
        .lines
        .iter()
        .map(|l| ProductAvailability {
            product_id: l.product_id,
            quantity_available: services.stock().quantity(shop.shop_id(), &l.product_id),
        })
        .collect();

    let cmd = SalesOrderCommand::ConfirmOrder(ConfirmOrder {
        shop_id: shop.shop_id(),
        order_id,
        availability,
        occurred_at: Utc::now(),
    });
    if let Err(e) = services.dispatch::<SalesOrder>(
        shop.shop_id(),
        order_agg,
        "sales.order",
        cmd,
        |_s, id| SalesOrder::empty(SalesOrderId::new(id)),
    ) {
        return match e {
            velora_infra::command_dispatcher::DispatchError::InvariantViolation(msg) => {
                errors::json_error(StatusCode::UNPROCESSABLE_ENTITY, "insufficient_stock", msg)
            }
            other => errors::dispatch_error_to_response(other),
        };
    }

    // Ship the stock: one movement per line. Failures are logged, never
    // unwound (the confirmation stands).
    for line in &order.lines {
        let cmd = InventoryCommand::RecordMovement(RecordMovement {
            shop_id: shop.shop_id(),
            ledger_id: LedgerId::new(line.product_id.0),
            delta: -line.quantity,
            reason: MovementReason::Shipment,
            occurred_at: Utc::now(),
        });
        if let Err(e) = services.dispatch::<StockLedger>(
            shop.shop_id(),
            line.product_id.0,
            "inventory.ledger",
            cmd,
            |_s, id| StockLedger::empty(LedgerId::new(id)),
        ) {
            tracing::warn!(
                order_id = %order_id,
                product_id = %line.product_id,
                "shipment movement failed after confirmation: {e:?}"
            );
        }
    }

    // Tracking number for the public tracking page.
    let tracking_number = tracking_number_for(order_id);
    let cmd = SalesOrderCommand::AssignTracking(AssignTracking {
        shop_id: shop.shop_id(),
        order_id,
        tracking_number: tracking_number.clone(),
        occurred_at: Utc::now(),
    });
    if let Err(e) = services.dispatch::<SalesOrder>(
        shop.shop_id(),
        order_agg,
        "sales.order",
        cmd,
        |_s, id| SalesOrder::empty(SalesOrderId::new(id)),
    ) {
        tracing::warn!(order_id = %order_id, "tracking assignment failed: {e:?}");
    }

    // Retail storefront orders get an invoice, best-effort: a failure is
    // logged and the confirmation stands.
    let mut invoice_id_json = serde_json::Value::Null;
    if customer_type == CustomerType::B2c && order.source == OrderSource::Storefront {
        match issue_invoice(&services, &shop, &order, customer_type) {
            Ok(invoice_id) => {
                invoice_id_json = serde_json::json!(invoice_id.0.to_string());
                let cmd = SalesOrderCommand::MarkInvoiced(MarkInvoiced {
                    shop_id: shop.shop_id(),
                    order_id,
                    occurred_at: Utc::now(),
                });
                if let Err(e) = services.dispatch::<SalesOrder>(
                    shop.shop_id(),
                    order_agg,
                    "sales.order",
                    cmd,
                    |_s, id| SalesOrder::empty(SalesOrderId::new(id)),
                ) {
                    tracing::warn!(order_id = %order_id, "marking order invoiced failed: {e:?}");
                }
            }
            Err(e) => {
                tracing::warn!(order_id = %order_id, "invoice generation failed: {e}");
            }
        }
    }

    (
        StatusCode::OK,
        Json(serde_json::json!({
            "order_id": order_id.0.to_string(),
            "status": "confirmed",
            "customer_type": customer_type.as_str(),
            "payment_terms": payment_terms_for(customer_type).as_str(),
            "tracking_number": tracking_number,
            "invoice_id": invoice_id_json,
        })),
    )
        .into_response()
}

/// Build the per-line price book for a customer-type switch.
fn price_book_for(
    services: &AppServices,
    shop: &ShopContext,
    order: &SalesOrderReadModel,
    customer_type: CustomerType,
) -> Result<Vec<LinePrice>, axum::response::Response> {
    order
        .lines
        .iter()
        .map(|line| {
            let product = services
                .catalog()
                .get(shop.shop_id(), &line.product_id)
                .ok_or_else(|| {
                    errors::json_error(
                        StatusCode::UNPROCESSABLE_ENTITY,
                        "invariant_violation",
                        format!("product {} no longer exists", line.product_id),
                    )
                })?;
            Ok(LinePrice {
                product_id: line.product_id,
                unit_price: unit_price_for(
                    customer_type,
                    product.pricing.list_price,
                    product.pricing.b2b_price,
                ),
            })
        })
        .collect()
}

/// Issue + post the invoice for a freshly confirmed order.
fn issue_invoice(
    services: &AppServices,
    shop: &ShopContext,
    order: &SalesOrderReadModel,
    customer_type: CustomerType,
) -> Result<InvoiceId, String> {
    let invoice_agg = AggregateId::new();
    let invoice_id = InvoiceId::new(invoice_agg);
    let now = Utc::now();
    let terms = payment_terms_for(customer_type);

    // Recompute the total at current prices for the final customer type; the
    // projection row may predate a repricing in this same request.
    let total: u64 = order
        .lines
        .iter()
        .map(|line| {
            let unit_price = services
                .catalog()
                .get(shop.shop_id(), &line.product_id)
                .map(|p| unit_price_for(customer_type, p.pricing.list_price, p.pricing.b2b_price))
                .unwrap_or(line.unit_price);
            line.quantity.max(0) as u64 * unit_price
        })
        .sum();

    let issue = InvoiceCommand::IssueInvoice(IssueInvoice {
        shop_id: shop.shop_id(),
        invoice_id,
        order_id: order.order_id,
        customer_id: order.customer_id,
        total,
        due_date: now + Duration::days(terms.due_in_days()),
        occurred_at: now,
    });
    services
        .dispatch::<Invoice>(shop.shop_id(), invoice_agg, "invoicing.invoice", issue, |_s, id| {
            Invoice::empty(InvoiceId::new(id))
        })
        .map_err(|e| format!("issue failed: {e:?}"))?;

    let post = InvoiceCommand::PostInvoice(PostInvoice {
        shop_id: shop.shop_id(),
        invoice_id,
        occurred_at: Utc::now(),
    });
    services
        .dispatch::<Invoice>(shop.shop_id(), invoice_agg, "invoicing.invoice", post, |_s, id| {
            Invoice::empty(InvoiceId::new(id))
        })
        .map_err(|e| format!("post failed: {e:?}"))?;

    Ok(invoice_id)
}
