use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::StatusCode;
use serde_json::json;

use velora_auth::{JwtClaims, PrincipalId, Role};
use velora_core::ShopId;

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(jwt_secret: &str) -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let app = velora_api::app::build_app(jwt_secret.to_string()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(jwt_secret: &str, shop_id: ShopId, sub: PrincipalId, roles: Vec<Role>) -> String {
    let now = Utc::now();
    let claims = JwtClaims {
        sub,
        shop_id,
        roles,
        issued_at: now,
        expires_at: now + ChronoDuration::minutes(10),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(jwt_secret.as_bytes()),
    )
    .expect("failed to encode jwt")
}

struct Shop {
    srv: TestServer,
    client: reqwest::Client,
    shop_id: ShopId,
    admin_token: String,
    customer_token: String,
}

impl Shop {
    async fn spawn() -> Self {
        let jwt_secret = "test-secret";
        let srv = TestServer::spawn(jwt_secret).await;
        let shop_id = ShopId::new();
        Self {
            srv,
            client: reqwest::Client::new(),
            shop_id,
            admin_token: mint_jwt(jwt_secret, shop_id, PrincipalId::new(), vec![Role::new("admin")]),
            customer_token: mint_jwt(
                jwt_secret,
                shop_id,
                PrincipalId::new(),
                vec![Role::new("customer")],
            ),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.srv.base_url, path)
    }

    async fn shop_page(&self, query: &str) -> serde_json::Value {
        let res = self
            .client
            .get(self.url(&format!("/shop{query}")))
            .header("x-shop-id", self.shop_id.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }

    async fn product_reviews(&self, product_id: &str) -> serde_json::Value {
        let res = self
            .client
            .get(self.url(&format!("/shop/products/{product_id}/reviews")))
            .header("x-shop-id", self.shop_id.to_string())
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json().await.unwrap()
    }

    /// Poll briefly until `check` succeeds (the API is intentionally
    /// eventual-consistent between the command path and projection updates).
    async fn wait_until(&self, what: &str, check: impl AsyncFn() -> bool) {
        for _ in 0..200 {
            if check().await {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("{what} did not converge within timeout");
    }

    /// Create + publish a product and put `stock` units on hand.
    async fn seed_product(&self, body: serde_json::Value, stock: i64) -> String {
        let res = self
            .client
            .post(self.url("/admin/products"))
            .bearer_auth(&self.admin_token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let created: serde_json::Value = res.json().await.unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let res = self
            .client
            .post(self.url(&format!("/admin/products/{id}/publish")))
            .bearer_auth(&self.admin_token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        if stock > 0 {
            let res = self
                .client
                .post(self.url(&format!("/admin/stock/{id}/move")))
                .bearer_auth(&self.admin_token)
                .json(&json!({ "delta": stock, "reason": "receipt" }))
                .send()
                .await
                .unwrap();
            assert_eq!(res.status(), StatusCode::OK);
        }

        // Wait for the catalog + stock projections to catch up.
        self.wait_until("seeded product", async || {
            let body = self.shop_page("").await;
            body["items"].as_array().unwrap().iter().any(|p| {
                p["id"] == json!(id) && p["quantity_available"] == json!(stock)
            })
        })
        .await;

        id
    }

    /// Open a cart with one line and return the order id.
    async fn cart_with(&self, product_id: &str, quantity: i64) -> String {
        let res = self
            .client
            .post(self.url("/shop/cart/update"))
            .bearer_auth(&self.customer_token)
            .json(&json!({ "product_id": product_id, "quantity": quantity }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body: serde_json::Value = res.json().await.unwrap();
        let order_id = body["order_id"].as_str().unwrap().to_string();

        // The checkout page sees the draft once the projection catches up.
        self.wait_until("draft order", async || {
            let res = self
                .client
                .get(self.url("/shop/checkout"))
                .bearer_auth(&self.customer_token)
                .send()
                .await
                .unwrap();
            res.status() == StatusCode::OK && {
                let body: serde_json::Value = res.json().await.unwrap();
                body["order"]["id"] == json!(order_id)
            }
        })
        .await;

        order_id
    }
}

fn tee_product() -> serde_json::Value {
    json!({
        "sku": "TEE-001",
        "name": "Crewneck Tee",
        "description": "Plain cotton tee",
        "brand": "Northwind",
        "color": "navy",
        "target_audience": "men",
        "size": "m",
        "season": "all_season",
        "list_price": 8000,
        "b2b_price": 5000,
        "min_stock_level": 10,
        "max_stock_level": 100,
    })
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let shop = Shop::spawn().await;

    let res = shop.client.get(shop.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = shop
        .client
        .post(shop.url("/admin/products"))
        .json(&tee_product())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn public_routes_require_a_shop_header() {
    let shop = Shop::spawn().await;

    let res = shop.client.get(shop.url("/shop")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_admin_cannot_manage_the_catalog() {
    let shop = Shop::spawn().await;

    let res = shop
        .client
        .post(shop.url("/admin/products"))
        .bearer_auth(&shop.customer_token)
        .json(&tee_product())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn catalog_filters_and_pagination() {
    let shop = Shop::spawn().await;
    shop.seed_product(tee_product(), 50).await;
    shop.seed_product(
        json!({
            "sku": "DRESS-001",
            "name": "Summer Dress",
            "brand": "Aster & Finch",
            "color": "red",
            "target_audience": "women",
            "size": "s",
            "list_price": 7800,
        }),
        20,
    )
    .await;

    // Unfiltered: both products, one page, sorted by name.
    let body = shop.shop_page("").await;
    assert_eq!(body["total_count"], json!(2));
    assert_eq!(body["total_pages"], json!(1));
    assert_eq!(body["items"][0]["name"], json!("Crewneck Tee"));

    // Audience filter.
    let body = shop.shop_page("?target_audience=women").await;
    assert_eq!(body["total_count"], json!(1));
    assert_eq!(body["items"][0]["name"], json!("Summer Dress"));

    // Unknown audience/size values are ignored, not errors.
    let body = shop.shop_page("?target_audience=unisex&size=xxxxl").await;
    assert_eq!(body["total_count"], json!(2));

    // Brand substring, case-insensitive.
    let body = shop.shop_page("?brand=northwind").await;
    assert_eq!(body["total_count"], json!(1));
    assert_eq!(body["items"][0]["name"], json!("Crewneck Tee"));

    // Beyond the last page: empty items, not an error.
    let body = shop.shop_page("?page=5").await;
    assert_eq!(body["total_count"], json!(2));
    assert!(body["items"].as_array().unwrap().is_empty());

    // Search endpoint: free text + price range.
    let res = shop
        .client
        .get(shop.url("/shop/search?search=dress&min_price=5000&max_price=9000"))
        .header("x-shop-id", shop.shop_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total_count"], json!(1));
    assert_eq!(body["items"][0]["name"], json!("Summer Dress"));

    // Malformed price bounds are ignored.
    let res = shop
        .client
        .get(shop.url("/shop/search?min_price=cheap"))
        .header("x-shop-id", shop.shop_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total_count"], json!(2));
}

#[tokio::test]
async fn malformed_page_redirects_to_the_canonical_listing() {
    let shop = Shop::spawn().await;

    let no_redirect = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    let res = no_redirect
        .get(shop.url("/shop?page=abc"))
        .header("x-shop-id", shop.shop_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::SEE_OTHER);
    assert_eq!(res.headers()["location"], "/shop");
}

#[tokio::test]
async fn stock_status_reflects_thresholds_and_cart_rejects_excess_quantity() {
    let shop = Shop::spawn().await;
    // quantity_available=5 with min_stock_level=10: low stock.
    let id = shop.seed_product(tee_product(), 5).await;

    let body = shop.shop_page("").await;
    let product = &body["items"][0];
    assert_eq!(product["quantity_available"], json!(5));
    assert_eq!(product["stock_status"], json!("low_stock"));

    // Requesting 6 of 5 available is rejected with the availability shown.
    let res = shop
        .client
        .post(shop.url("/shop/cart/update"))
        .bearer_auth(&shop.customer_token)
        .json(&json!({ "product_id": id, "quantity": 6 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], json!("stock_unavailable"));
    assert_eq!(body["available_qty"], json!(5));
    assert_eq!(body["requested_qty"], json!(6));
}

#[tokio::test]
async fn b2c_checkout_confirms_ships_and_invoices() {
    let shop = Shop::spawn().await;
    let id = shop.seed_product(tee_product(), 50).await;
    let order_id = shop.cart_with(&id, 2).await;

    // Confirm with express delivery.
    let res = shop
        .client
        .post(shop.url("/shop/confirm_order"))
        .bearer_auth(&shop.customer_token)
        .json(&json!({ "order_id": order_id, "delivery_method": "express" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], json!("confirmed"));
    assert_eq!(body["payment_terms"], json!("immediate"));
    let tracking = body["tracking_number"].as_str().unwrap().to_string();
    assert!(body["invoice_id"].is_string());

    // Stock was shipped: 50 - 2 = 48.
    shop.wait_until("shipped stock", async || {
        let body = shop.shop_page("").await;
        body["items"]
            .as_array()
            .unwrap()
            .iter()
            .any(|p| p["id"] == json!(id) && p["quantity_available"] == json!(48))
    })
    .await;

    // Public tracking lookup works without auth.
    shop.wait_until("tracking lookup", async || {
        let res = shop
            .client
            .get(shop.url(&format!("/shop/track/{tracking}")))
            .header("x-shop-id", shop.shop_id.to_string())
            .send()
            .await
            .unwrap();
        res.status() == StatusCode::OK
    })
    .await;

    let res = shop
        .client
        .get(shop.url("/shop/track/VL-DOESNOTEXIST"))
        .header("x-shop-id", shop.shop_id.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn switching_to_b2b_reprices_and_extends_payment_terms() {
    let shop = Shop::spawn().await;
    // list_price 8000, b2b_price 5000.
    let id = shop.seed_product(tee_product(), 50).await;
    let order_id = shop.cart_with(&id, 1).await;

    let res = shop
        .client
        .post(shop.url("/shop/confirm_order"))
        .bearer_auth(&shop.customer_token)
        .json(&json!({
            "order_id": order_id,
            "delivery_method": "pickup",
            "customer_type": "b2b",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["customer_type"], json!("b2b"));
    assert_eq!(body["payment_terms"], json!("30_days"));
    // No invoice for B2B orders.
    assert!(body["invoice_id"].is_null());

    // The B2B portal lists the order with the repriced line.
    shop.wait_until("b2b portal", async || {
        let res = shop
            .client
            .get(shop.url("/shop/b2b"))
            .bearer_auth(&shop.customer_token)
            .send()
            .await
            .unwrap();
        res.status() == StatusCode::OK && {
            let body: serde_json::Value = res.json().await.unwrap();
            body["orders"].as_array().unwrap().iter().any(|o| {
                o["id"] == json!(order_id)
                    && o["lines"][0]["unit_price"] == json!(5000)
                    && o["payment_terms"] == json!("30_days")
            })
        }
    })
    .await;
}

#[tokio::test]
async fn wishlist_toggle_is_an_involution() {
    let shop = Shop::spawn().await;
    let id = shop.seed_product(tee_product(), 50).await;

    let toggle = async || {
        let res = shop
            .client
            .post(shop.url("/shop/wishlist/toggle"))
            .bearer_auth(&shop.customer_token)
            .json(&json!({ "product_id": id }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        res.json::<serde_json::Value>().await.unwrap()
    };

    let first = toggle().await;
    assert_eq!(first["action"], json!("added"));
    assert_eq!(first["in_wishlist"], json!(true));

    let second = toggle().await;
    assert_eq!(second["action"], json!("removed"));
    assert_eq!(second["in_wishlist"], json!(false));

    // Back to the original membership: the wishlist page is empty.
    shop.wait_until("empty wishlist", async || {
        let res = shop
            .client
            .get(shop.url("/shop/wishlist"))
            .bearer_auth(&shop.customer_token)
            .send()
            .await
            .unwrap();
        res.status() == StatusCode::OK && {
            let body: serde_json::Value = res.json().await.unwrap();
            body["items"].as_array().unwrap().is_empty()
        }
    })
    .await;

    // Removing a product that is not on the list is a 404.
    let res = shop
        .client
        .delete(shop.url(&format!("/shop/wishlist/{id}")))
        .bearer_auth(&shop.customer_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reviews_flow_through_moderation_into_aggregates() {
    let shop = Shop::spawn().await;
    let id = shop.seed_product(tee_product(), 50).await;
    let second_customer = mint_jwt(
        "test-secret",
        shop.shop_id,
        PrincipalId::new(),
        vec![Role::new("customer")],
    );

    let submit = async |token: &str, rating: u8, title: &str| {
        shop.client
            .post(shop.url(&format!("/shop/products/{id}/review")))
            .bearer_auth(token)
            .json(&json!({ "title": title, "rating": rating }))
            .send()
            .await
            .unwrap()
    };

    // Two customers submit reviews (4 and 5 stars).
    let res = submit(&shop.customer_token, 4, "Good tee").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let first: serde_json::Value = res.json().await.unwrap();
    let first_id = first["review_id"].as_str().unwrap().to_string();

    let res = submit(&second_customer, 5, "Great tee").await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let second: serde_json::Value = res.json().await.unwrap();
    let second_id = second["review_id"].as_str().unwrap().to_string();

    // Out-of-range ratings are rejected.
    let res = submit(&shop.customer_token, 9, "Broken").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Drafts do not count toward the public aggregates.
    let body = shop.product_reviews(&id).await;
    assert_eq!(body["total_reviews"], json!(0));
    assert_eq!(body["average_rating"], json!(0.0));

    // Publish both; 4 and 5 stars average to 4.5.
    for review_id in [&first_id, &second_id] {
        shop.wait_until("review published", async || {
            let res = shop
                .client
                .post(shop.url(&format!("/admin/reviews/{review_id}/publish")))
                .bearer_auth(&shop.admin_token)
                .send()
                .await
                .unwrap();
            // Conflict means a previous attempt already went through.
            res.status() == StatusCode::OK || res.status() == StatusCode::CONFLICT
        })
        .await;
    }

    shop.wait_until("rating aggregates", async || {
        let body = shop.product_reviews(&id).await;
        body["total_reviews"] == json!(2) && body["average_rating"] == json!(4.5)
    })
    .await;

    // Re-submission by the same customer revises the existing review and
    // resets it to draft: aggregates drop to the remaining published review.
    let res = submit(&shop.customer_token, 2, "Shrunk in the wash").await;
    assert_eq!(res.status(), StatusCode::OK);
    let revised: serde_json::Value = res.json().await.unwrap();
    assert_eq!(revised["review_id"], json!(first_id));

    shop.wait_until("aggregates after revision", async || {
        let body = shop.product_reviews(&id).await;
        body["total_reviews"] == json!(1) && body["average_rating"] == json!(5.0)
    })
    .await;
}

#[tokio::test]
async fn verified_purchase_is_set_from_confirmed_orders() {
    let shop = Shop::spawn().await;
    let id = shop.seed_product(tee_product(), 50).await;

    // Buy the product first.
    let order_id = shop.cart_with(&id, 1).await;
    let res = shop
        .client
        .post(shop.url("/shop/confirm_order"))
        .bearer_auth(&shop.customer_token)
        .json(&json!({ "order_id": order_id, "delivery_method": "standard" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    // Once the orders projection shows the confirmation, no draft is left
    // and the checkout page redirects back to the shop.
    let no_redirect = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    shop.wait_until("confirmed purchase visible", async || {
        let res = no_redirect
            .get(shop.url("/shop/checkout"))
            .bearer_auth(&shop.customer_token)
            .send()
            .await
            .unwrap();
        res.status() == StatusCode::SEE_OTHER
    })
    .await;

    let res = shop
        .client
        .post(shop.url(&format!("/shop/products/{id}/review")))
        .bearer_auth(&shop.customer_token)
        .json(&json!({ "title": "Fits well", "rating": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: serde_json::Value = res.json().await.unwrap();
    let review_id = body["review_id"].as_str().unwrap().to_string();

    shop.wait_until("review published", async || {
        let res = shop
            .client
            .post(shop.url(&format!("/admin/reviews/{review_id}/publish")))
            .bearer_auth(&shop.admin_token)
            .send()
            .await
            .unwrap();
        res.status() == StatusCode::OK || res.status() == StatusCode::CONFLICT
    })
    .await;

    shop.wait_until("verified purchase flag", async || {
        let body = shop.product_reviews(&id).await;
        body["reviews"][0]["verified_purchase"] == json!(true)
    })
    .await;
}

#[tokio::test]
async fn low_stock_report_lists_shortages() {
    let shop = Shop::spawn().await;
    // 5 on hand against a minimum of 10.
    shop.seed_product(tee_product(), 5).await;

    shop.wait_until("low stock report", async || {
        let res = shop
            .client
            .get(shop.url("/admin/inventory/report"))
            .bearer_auth(&shop.admin_token)
            .send()
            .await
            .unwrap();
        res.status() == StatusCode::OK && {
            let body: serde_json::Value = res.json().await.unwrap();
            let low = body["low_stock"].as_array().unwrap().clone();
            low.len() == 1
                && low[0]["stock_status"] == json!("low_stock")
                && low[0]["quantity_available"] == json!(5)
                && low[0]["shortage"] == json!(5)
        }
    })
    .await;

    // Customers cannot read the report.
    let res = shop
        .client
        .get(shop.url("/admin/inventory/report"))
        .bearer_auth(&shop.customer_token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn shops_are_isolated_from_each_other() {
    let shop = Shop::spawn().await;
    shop.seed_product(tee_product(), 50).await;

    // Another shop browsing the same server sees an empty catalog.
    let other_shop = ShopId::new();
    let res = shop
        .client
        .get(shop.url("/shop"))
        .header("x-shop-id", other_shop.to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["total_count"], json!(0));
}
