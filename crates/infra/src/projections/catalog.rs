use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use velora_catalog::{
    ClothingSize, Pricing, ProductEvent, ProductId, ProductStatus, Season, StockThresholds,
    TargetAudience,
};
use velora_core::ShopId;
use velora_events::EventEnvelope;

use crate::projections::cursor::{CursorCheck, SequenceCursors};
use crate::read_model::{paginate, Page, Paged, ShopStore};

/// Queryable product read model (catalog + storefront attributes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub brand: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub audience: Option<TargetAudience>,
    pub size: Option<ClothingSize>,
    pub season: Option<Season>,
    pub pricing: Pricing,
    pub thresholds: StockThresholds,
    pub saleable: bool,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl ProductReadModel {
    /// Storefront visibility: published, saleable, with a target audience.
    pub fn is_storefront_visible(&self) -> bool {
        self.status == ProductStatus::Published && self.saleable && self.audience.is_some()
    }

    fn placeholder(product_id: ProductId) -> Self {
        Self {
            product_id,
            sku: String::new(),
            name: String::new(),
            description: String::new(),
            brand: None,
            color: None,
            material: None,
            audience: None,
            size: None,
            season: None,
            pricing: Pricing {
                list_price: 0,
                b2b_price: None,
            },
            thresholds: StockThresholds::default(),
            saleable: false,
            status: ProductStatus::Draft,
            created_at: DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// Optional storefront filters, combined conjunctively.
///
/// Unknown enum values never reach this struct — the API drops them while
/// parsing query parameters, matching the "ignore invalid filter" policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogFilter {
    pub audience: Option<TargetAudience>,
    /// Case-insensitive substring match on the brand.
    pub brand: Option<String>,
    /// Case-insensitive substring match on the color.
    pub color: Option<String>,
    pub size: Option<ClothingSize>,
    /// Free text matched against name, brand, and description.
    pub search: Option<String>,
    pub min_price: Option<u64>,
    pub max_price: Option<u64>,
}

impl CatalogFilter {
    pub fn matches(&self, product: &ProductReadModel) -> bool {
        if let Some(audience) = self.audience {
            if product.audience != Some(audience) {
                return false;
            }
        }

        if let Some(ref brand) = self.brand {
            match &product.brand {
                Some(b) if contains_ci(b, brand) => {}
                _ => return false,
            }
        }

        if let Some(ref color) = self.color {
            match &product.color {
                Some(c) if contains_ci(c, color) => {}
                _ => return false,
            }
        }

        if let Some(size) = self.size {
            if product.size != Some(size) {
                return false;
            }
        }

        if let Some(min) = self.min_price {
            if product.pricing.list_price < min {
                return false;
            }
        }

        if let Some(max) = self.max_price {
            if product.pricing.list_price > max {
                return false;
            }
        }

        if let Some(ref term) = self.search {
            let in_name = contains_ci(&product.name, term);
            let in_brand = product
                .brand
                .as_deref()
                .map(|b| contains_ci(b, term))
                .unwrap_or(false);
            let in_description = contains_ci(&product.description, term);
            if !(in_name || in_brand || in_description) {
                return false;
            }
        }

        true
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Error)]
pub enum CatalogProjectionError {
    #[error("failed to deserialize product event: {0}")]
    Deserialize(String),

    #[error("shop isolation violation: {0}")]
    ShopIsolation(String),

    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}

/// Catalog projection.
///
/// Consumes published envelopes (JSON payloads) and maintains a shop-isolated
/// read model. Read models are disposable and rebuildable from the event
/// stream.
#[derive(Debug)]
pub struct CatalogProjection<S>
where
    S: ShopStore<ProductId, ProductReadModel>,
{
    store: S,
    cursors: SequenceCursors,
}

impl<S> CatalogProjection<S>
where
    S: ShopStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: SequenceCursors::new(),
        }
    }

    /// Query read model for one shop/product.
    pub fn get(&self, shop_id: ShopId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(shop_id, product_id)
    }

    /// List all products for a shop (admin view).
    pub fn list(&self, shop_id: ShopId) -> Vec<ProductReadModel> {
        self.store.list(shop_id)
    }

    /// The newest storefront-visible products (homepage).
    pub fn latest(&self, shop_id: ShopId, limit: usize) -> Vec<ProductReadModel> {
        let mut items: Vec<_> = self
            .store
            .list(shop_id)
            .into_iter()
            .filter(ProductReadModel::is_storefront_visible)
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        items.truncate(limit);
        items
    }

    /// Filtered, name-sorted, paginated storefront search.
    ///
    /// Always restricted to storefront-visible products; the filter only
    /// narrows further.
    pub fn search(
        &self,
        shop_id: ShopId,
        filter: &CatalogFilter,
        page: Page,
    ) -> Paged<ProductReadModel> {
        let mut items: Vec<_> = self
            .store
            .list(shop_id)
            .into_iter()
            .filter(|p| p.is_storefront_visible() && filter.matches(p))
            .collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        paginate(items, page)
    }

    /// Apply a published envelope into the projection.
    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), CatalogProjectionError> {
        if envelope.aggregate_type() != "catalog.product" {
            return Ok(());
        }

        let shop_id = envelope.shop_id();
        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        match self.cursors.check(shop_id, aggregate_id, seq) {
            Ok(CursorCheck::Duplicate) => return Ok(()),
            Ok(CursorCheck::Apply) => {}
            Err(last) => {
                return Err(CatalogProjectionError::NonMonotonicSequence { last, found: seq })
            }
        }

        let ev: ProductEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| CatalogProjectionError::Deserialize(e.to_string()))?;

        let (event_shop, product_id) = match &ev {
            ProductEvent::ProductCreated(e) => (e.shop_id, e.product_id),
            ProductEvent::ProductPublished(e) => (e.shop_id, e.product_id),
            ProductEvent::ProductArchived(e) => (e.shop_id, e.product_id),
            ProductEvent::PricingChanged(e) => (e.shop_id, e.product_id),
            ProductEvent::StockThresholdsChanged(e) => (e.shop_id, e.product_id),
        };

        if event_shop != shop_id {
            return Err(CatalogProjectionError::ShopIsolation(
                "event shop_id does not match envelope shop_id".to_string(),
            ));
        }
        if product_id.0 != aggregate_id {
            return Err(CatalogProjectionError::ShopIsolation(
                "event product_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    shop_id,
                    e.product_id,
                    ProductReadModel {
                        product_id: e.product_id,
                        sku: e.sku,
                        name: e.name,
                        description: e.description,
                        brand: e.attributes.brand,
                        color: e.attributes.color,
                        material: e.attributes.material,
                        audience: e.attributes.audience,
                        size: e.attributes.size,
                        season: e.attributes.season,
                        pricing: e.pricing,
                        thresholds: e.thresholds,
                        saleable: e.saleable,
                        status: ProductStatus::Draft,
                        created_at: e.occurred_at,
                    },
                );
            }
            ProductEvent::ProductPublished(e) => {
                let mut rm = self
                    .store
                    .get(shop_id, &e.product_id)
                    .unwrap_or_else(|| ProductReadModel::placeholder(e.product_id));
                rm.status = ProductStatus::Published;
                self.store.upsert(shop_id, e.product_id, rm);
            }
            ProductEvent::ProductArchived(e) => {
                let mut rm = self
                    .store
                    .get(shop_id, &e.product_id)
                    .unwrap_or_else(|| ProductReadModel::placeholder(e.product_id));
                rm.status = ProductStatus::Archived;
                self.store.upsert(shop_id, e.product_id, rm);
            }
            ProductEvent::PricingChanged(e) => {
                let mut rm = self
                    .store
                    .get(shop_id, &e.product_id)
                    .unwrap_or_else(|| ProductReadModel::placeholder(e.product_id));
                rm.pricing = e.pricing;
                self.store.upsert(shop_id, e.product_id, rm);
            }
            ProductEvent::StockThresholdsChanged(e) => {
                let mut rm = self
                    .store
                    .get(shop_id, &e.product_id)
                    .unwrap_or_else(|| ProductReadModel::placeholder(e.product_id));
                rm.thresholds = e.thresholds;
                self.store.upsert(shop_id, e.product_id, rm);
            }
        }

        self.cursors.advance(shop_id, aggregate_id, seq);
        Ok(())
    }

    /// Rebuild the read model from scratch by replaying envelopes.
    pub fn rebuild_from_scratch(
        &self,
        envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
    ) -> Result<(), CatalogProjectionError> {
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

        // Deterministic replay order: shop, aggregate, sequence.
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
