use axum::{
    routing::{delete, get, post},
    Router,
};

pub mod admin;
pub mod cart;
pub mod common;
pub mod orders;
pub mod reviews;
pub mod storefront;
pub mod system;
pub mod wishlist;

/// Router for anonymous storefront endpoints (shop scope via `X-Shop-Id`).
pub fn public_router() -> Router {
    Router::new()
        .route("/", get(storefront::home))
        .route("/shop", get(storefront::shop))
        .route("/shop/search", get(storefront::search))
        .route("/shop/products/:id/reviews", get(storefront::product_reviews))
        .route("/shop/track/:tracking_number", get(storefront::track_order))
}

/// Router for authenticated (token-scoped) endpoints.
pub fn protected_router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/shop/cart/update", post(cart::cart_update))
        .route("/shop/checkout", get(cart::checkout))
        .route("/shop/confirm_order", post(cart::confirm_order))
        .route("/shop/b2b", get(orders::b2b_portal))
        .route("/shop/wishlist", get(wishlist::wishlist_page))
        .route("/shop/wishlist/toggle", post(wishlist::toggle))
        .route("/shop/wishlist/:product_id", delete(wishlist::remove))
        .route("/shop/products/:id/review", post(reviews::submit_review))
        .nest("/admin", admin::router())
}
