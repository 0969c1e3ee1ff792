use serde::Deserialize;
use serde_json::json;

use velora_infra::projections::{
    catalog::ProductReadModel,
    invoices::InvoiceReadModel,
    reviews::ReviewReadModel,
    sales_orders::SalesOrderReadModel,
    stock::InventoryReportRow,
    wishlist::WishlistEntryReadModel,
};
use velora_inventory::StockStatus;
use velora_reviews::RatingSummary;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub target_audience: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub season: Option<String>,
    pub list_price: u64,
    #[serde(default)]
    pub b2b_price: Option<u64>,
    #[serde(default)]
    pub min_stock_level: Option<i64>,
    #[serde(default)]
    pub max_stock_level: Option<i64>,
    #[serde(default)]
    pub saleable: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SetPricingRequest {
    pub list_price: u64,
    #[serde(default)]
    pub b2b_price: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct SetThresholdsRequest {
    pub min_stock_level: i64,
    pub max_stock_level: i64,
}

#[derive(Debug, Deserialize)]
pub struct StockMoveRequest {
    pub delta: i64,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CartUpdateRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    pub product_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmOrderRequest {
    pub order_id: String,
    #[serde(default)]
    pub delivery_method: Option<String>,
    #[serde(default)]
    pub customer_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WishlistToggleRequest {
    pub product_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SubmitReviewRequest {
    pub title: String,
    pub rating: u8,
    #[serde(default)]
    pub body: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

/// Catalog entry enriched with the derived stock/review displays.
pub fn product_to_json(
    rm: &ProductReadModel,
    quantity_available: i64,
    stock_status: StockStatus,
    summary: RatingSummary,
) -> serde_json::Value {
    json!({
        "id": rm.product_id.0.to_string(),
        "sku": rm.sku,
        "name": rm.name,
        "description": rm.description,
        "brand": rm.brand,
        "color": rm.color,
        "material": rm.material,
        "target_audience": rm.audience.map(|a| a.as_str()),
        "size": rm.size.map(|s| s.as_str()),
        "season": rm.season,
        "list_price": rm.pricing.list_price,
        "b2b_price": rm.pricing.b2b_price,
        "status": format!("{:?}", rm.status).to_lowercase(),
        "quantity_available": quantity_available,
        "stock_status": stock_status.as_str(),
        "review_count": summary.review_count,
        "average_rating": summary.average_rating,
    })
}

pub fn order_to_json(rm: &SalesOrderReadModel) -> serde_json::Value {
    json!({
        "id": rm.order_id.0.to_string(),
        "customer_id": rm.customer_id.to_string(),
        "customer_type": rm.customer_type.as_str(),
        "source": format!("{:?}", rm.source).to_lowercase(),
        "status": format!("{:?}", rm.status).to_lowercase(),
        "delivery_method": rm.delivery_method.map(|d| format!("{d:?}").to_lowercase()),
        "tracking_number": rm.tracking_number,
        "payment_terms": rm.payment_terms.as_str(),
        "total": rm.total(),
        "lines": rm.lines.iter().map(|l| json!({
            "line_no": l.line_no,
            "product_id": l.product_id.0.to_string(),
            "quantity": l.quantity,
            "unit_price": l.unit_price,
        })).collect::<Vec<_>>(),
    })
}

pub fn review_to_json(rm: &ReviewReadModel) -> serde_json::Value {
    json!({
        "id": rm.review_id.0.to_string(),
        "product_id": rm.product_id.0.to_string(),
        "title": rm.title,
        "rating": rm.rating,
        "body": rm.body,
        "state": format!("{:?}", rm.state).to_lowercase(),
        "verified_purchase": rm.verified_purchase,
        "submitted_at": rm.submitted_at.to_rfc3339(),
    })
}

/// Wishlist entry joined with catalog details for quick display.
pub fn wishlist_entry_to_json(
    entry: &WishlistEntryReadModel,
    product: Option<&ProductReadModel>,
) -> serde_json::Value {
    json!({
        "product_id": entry.product_id.0.to_string(),
        "added_at": entry.added_at.to_rfc3339(),
        "product_name": product.map(|p| p.name.clone()),
        "product_brand": product.and_then(|p| p.brand.clone()),
        "product_price": product.map(|p| p.pricing.list_price),
    })
}

pub fn report_row_to_json(row: &InventoryReportRow) -> serde_json::Value {
    json!({
        "product_id": row.product_id.0.to_string(),
        "name": row.name,
        "brand": row.brand,
        "target_audience": row.audience.map(|a| a.as_str()),
        "quantity_available": row.quantity_available,
        "min_stock_level": row.min_stock_level,
        "max_stock_level": row.max_stock_level,
        "stock_status": row.stock_status.as_str(),
        "shortage": row.shortage,
        "reorder_quantity": row.reorder_quantity,
    })
}

pub fn invoice_to_json(rm: &InvoiceReadModel) -> serde_json::Value {
    json!({
        "id": rm.invoice_id.0.to_string(),
        "order_id": rm.order_id.0.to_string(),
        "total": rm.total,
        "due_date": rm.due_date.to_rfc3339(),
        "status": format!("{:?}", rm.status).to_lowercase(),
    })
}
