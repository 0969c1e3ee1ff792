use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use velora_core::{Aggregate, AggregateId, AggregateRoot, DomainError, ShopId};
use velora_events::Event;

/// Product identifier (shop-scoped via `shop_id` fields in events/commands).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Draft,
    Published,
    Archived,
}

/// Catalog classification driving storefront filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetAudience {
    Men,
    Women,
    Children,
}

impl TargetAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetAudience::Men => "men",
            TargetAudience::Women => "women",
            TargetAudience::Children => "children",
        }
    }
}

impl core::str::FromStr for TargetAudience {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "men" => Ok(TargetAudience::Men),
            "women" => Ok(TargetAudience::Women),
            "children" => Ok(TargetAudience::Children),
            other => Err(DomainError::validation(format!(
                "unknown target audience '{other}'"
            ))),
        }
    }
}

/// Garment size scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClothingSize {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
    Xxxl,
}

impl ClothingSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClothingSize::Xs => "xs",
            ClothingSize::S => "s",
            ClothingSize::M => "m",
            ClothingSize::L => "l",
            ClothingSize::Xl => "xl",
            ClothingSize::Xxl => "xxl",
            ClothingSize::Xxxl => "xxxl",
        }
    }
}

impl core::str::FromStr for ClothingSize {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "xs" => Ok(ClothingSize::Xs),
            "s" => Ok(ClothingSize::S),
            "m" => Ok(ClothingSize::M),
            "l" => Ok(ClothingSize::L),
            "xl" => Ok(ClothingSize::Xl),
            "xxl" => Ok(ClothingSize::Xxl),
            "xxxl" => Ok(ClothingSize::Xxxl),
            other => Err(DomainError::validation(format!("unknown size '{other}'"))),
        }
    }
}

/// Seasonal collection tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Spring,
    Summer,
    Autumn,
    Winter,
    AllSeason,
}

impl core::str::FromStr for Season {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spring" => Ok(Season::Spring),
            "summer" => Ok(Season::Summer),
            "autumn" => Ok(Season::Autumn),
            "winter" => Ok(Season::Winter),
            "all_season" => Ok(Season::AllSeason),
            other => Err(DomainError::validation(format!("unknown season '{other}'"))),
        }
    }
}

/// Fashion attributes attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProductAttributes {
    pub brand: Option<String>,
    pub color: Option<String>,
    pub material: Option<String>,
    pub audience: Option<TargetAudience>,
    pub size: Option<ClothingSize>,
    pub season: Option<Season>,
}

/// List + B2B pricing. Prices in smallest currency unit (e.g., cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub list_price: u64,
    pub b2b_price: Option<u64>,
}

/// Replenishment thresholds driving the stock status and low-stock report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockThresholds {
    pub min_stock_level: i64,
    pub max_stock_level: i64,
}

impl Default for StockThresholds {
    fn default() -> Self {
        Self {
            min_stock_level: 10,
            max_stock_level: 100,
        }
    }
}

impl StockThresholds {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.min_stock_level < 0 {
            return Err(DomainError::validation(
                "min_stock_level cannot be negative",
            ));
        }
        if self.max_stock_level <= self.min_stock_level {
            return Err(DomainError::invariant(
                "max_stock_level must be greater than min_stock_level",
            ));
        }
        Ok(())
    }
}

/// Aggregate root: Product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    shop_id: Option<ShopId>,
    sku: String,
    name: String,
    description: String,
    attributes: ProductAttributes,
    pricing: Pricing,
    thresholds: StockThresholds,
    saleable: bool,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            shop_id: None,
            sku: String::new(),
            name: String::new(),
            description: String::new(),
            attributes: ProductAttributes::default(),
            pricing: Pricing {
                list_price: 0,
                b2b_price: None,
            },
            thresholds: StockThresholds::default(),
            saleable: false,
            status: ProductStatus::Draft,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn shop_id(&self) -> Option<ShopId> {
        self.shop_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attributes(&self) -> &ProductAttributes {
        &self.attributes
    }

    pub fn pricing(&self) -> Pricing {
        self.pricing
    }

    pub fn thresholds(&self) -> StockThresholds {
        self.thresholds
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn is_saleable(&self) -> bool {
        self.saleable
    }

    /// Whether the product appears on the storefront: published, saleable,
    /// and classified with a target audience.
    pub fn is_storefront_visible(&self) -> bool {
        self.status == ProductStatus::Published
            && self.saleable
            && self.attributes.audience.is_some()
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub attributes: ProductAttributes,
    pub pricing: Pricing,
    pub thresholds: Option<StockThresholds>,
    pub saleable: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: PublishProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishProduct {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ArchiveProduct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetPricing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetPricing {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub pricing: Pricing,
    pub occurred_at: DateTime<Utc>,
}

/// Command: SetStockThresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetStockThresholds {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub thresholds: StockThresholds,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    PublishProduct(PublishProduct),
    ArchiveProduct(ArchiveProduct),
    SetPricing(SetPricing),
    SetStockThresholds(SetStockThresholds),
}

/// Event: ProductCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: String,
    pub attributes: ProductAttributes,
    pub pricing: Pricing,
    pub thresholds: StockThresholds,
    pub saleable: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductPublished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPublished {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ProductArchived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PricingChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingChanged {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub pricing: Pricing,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockThresholdsChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockThresholdsChanged {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub thresholds: StockThresholds,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    ProductPublished(ProductPublished),
    ProductArchived(ProductArchived),
    PricingChanged(PricingChanged),
    StockThresholdsChanged(StockThresholdsChanged),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "catalog.product.created",
            ProductEvent::ProductPublished(_) => "catalog.product.published",
            ProductEvent::ProductArchived(_) => "catalog.product.archived",
            ProductEvent::PricingChanged(_) => "catalog.product.pricing_changed",
            ProductEvent::StockThresholdsChanged(_) => "catalog.product.thresholds_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::ProductPublished(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
            ProductEvent::PricingChanged(e) => e.occurred_at,
            ProductEvent::StockThresholdsChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.shop_id = Some(e.shop_id);
                self.sku = e.sku.clone();
                self.name = e.name.clone();
                self.description = e.description.clone();
                self.attributes = e.attributes.clone();
                self.pricing = e.pricing;
                self.thresholds = e.thresholds;
                self.saleable = e.saleable;
                self.status = ProductStatus::Draft;
                self.created = true;
            }
            ProductEvent::ProductPublished(_) => {
                self.status = ProductStatus::Published;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
            ProductEvent::PricingChanged(e) => {
                self.pricing = e.pricing;
            }
            ProductEvent::StockThresholdsChanged(e) => {
                self.thresholds = e.thresholds;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::PublishProduct(cmd) => self.handle_publish(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
            ProductCommand::SetPricing(cmd) => self.handle_set_pricing(cmd),
            ProductCommand::SetStockThresholds(cmd) => self.handle_set_thresholds(cmd),
        }
    }
}

impl Product {
    fn ensure_shop(&self, shop_id: ShopId) -> Result<(), DomainError> {
        if !self.created {
            return Ok(());
        }
        if self.shop_id != Some(shop_id) {
            return Err(DomainError::invariant("shop mismatch"));
        }
        Ok(())
    }

    fn ensure_product_id(&self, product_id: ProductId) -> Result<(), DomainError> {
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        if cmd.sku.trim().is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }

        if cmd.pricing.list_price == 0 {
            return Err(DomainError::validation("list_price must be positive"));
        }

        if cmd.pricing.b2b_price == Some(0) {
            return Err(DomainError::validation("b2b_price must be positive when set"));
        }

        let thresholds = cmd.thresholds.unwrap_or_default();
        thresholds.validate()?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            shop_id: cmd.shop_id,
            product_id: cmd.product_id,
            sku: cmd.sku.clone(),
            name: cmd.name.clone(),
            description: cmd.description.clone(),
            attributes: cmd.attributes.clone(),
            pricing: cmd.pricing,
            thresholds,
            saleable: cmd.saleable,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_publish(&self, cmd: &PublishProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if self.status == ProductStatus::Published {
            return Err(DomainError::conflict("product is already published"));
        }

        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant(
                "archived products cannot be published",
            ));
        }

        Ok(vec![ProductEvent::ProductPublished(ProductPublished {
            shop_id: cmd.shop_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            shop_id: cmd.shop_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_pricing(&self, cmd: &SetPricing) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_product_id(cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant(
                "archived products cannot be repriced",
            ));
        }

        if cmd.pricing.list_price == 0 {
            return Err(DomainError::validation("list_price must be positive"));
        }

        if cmd.pricing.b2b_price == Some(0) {
            return Err(DomainError::validation("b2b_price must be positive when set"));
        }

        Ok(vec![ProductEvent::PricingChanged(PricingChanged {
            shop_id: cmd.shop_id,
            product_id: cmd.product_id,
            pricing: cmd.pricing,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_set_thresholds(
        &self,
        cmd: &SetStockThresholds,
    ) -> Result<Vec<ProductEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        self.ensure_shop(cmd.shop_id)?;
        self.ensure_product_id(cmd.product_id)?;

        cmd.thresholds.validate()?;

        Ok(vec![ProductEvent::StockThresholdsChanged(
            StockThresholdsChanged {
                shop_id: cmd.shop_id,
                product_id: cmd.product_id,
                thresholds: cmd.thresholds,
                occurred_at: cmd.occurred_at,
            },
        )])
    }
}
