//! `velora-catalog` — product catalog domain (fashion attributes + lifecycle).

pub mod product;

pub use product::{
    ArchiveProduct, ClothingSize, CreateProduct, Pricing, Product, ProductAttributes,
    ProductCommand, ProductEvent, ProductId, ProductStatus, PublishProduct, Season, SetPricing,
    SetStockThresholds, StockThresholds, TargetAudience,
};
