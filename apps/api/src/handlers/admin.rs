//! # Admin Routes
//!
//! Everything here takes an [`AdminUser`]; a customer token gets 403.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Orders      GET  /admin/orders            all orders, newest first    │
//! │              PUT  /admin/orders/{id}       status change + notify      │
//! │                                                                         │
//! │  Catalog     POST /admin/products          create                      │
//! │              PUT  /admin/products/{id}     partial edit                │
//! │              DEL  /admin/products/{id}     soft delete                 │
//! │              PUT  /admin/products/{id}/flash-sale                      │
//! │                                                                         │
//! │  Reports     GET  /admin/low-stock                                     │
//! │              GET  /admin/analytics                                     │
//! │              GET  /admin/leaderboard                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AdminUser;
use crate::error::{ApiError, ApiJson};
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use flashmart_core::validation::{
    validate_description, validate_price_cents, validate_product_name, validate_stock,
};
use flashmart_core::{
    Category, FlashSale, Money, Order, OrderStatus, PricedProduct, Product, LOW_STOCK_THRESHOLD,
};
use flashmart_db::{
    CategorySales, DailySales, LeaderboardEntry, ProductPatch, SalesSummary, TopProduct,
};

const ADMIN_ORDER_LIMIT: u32 = 500;
const TOP_PRODUCTS: u32 = 5;
const TREND_DAYS: u32 = 7;
const RECENT_ORDERS: u32 = 10;
const LEADERBOARD_SIZE: u32 = 10;

// =============================================================================
// Orders
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// `GET /api/admin/orders`
pub async fn list_orders(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Vec<Order>> {
    let orders = state.db.orders().list_all(ADMIN_ORDER_LIMIT).await?;
    Ok(ApiResponse::list(orders))
}

/// `PUT /api/admin/orders/{id}`
pub async fn update_order_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(order_ref): Path<String>,
    ApiJson(req): ApiJson<UpdateStatusRequest>,
) -> ApiResult<Order> {
    let status: OrderStatus = req.status.parse()?;

    let order = state
        .db
        .orders()
        .set_status(&order_ref, status, state.clock.now())
        .await?;

    state.mail.wake();

    info!(
        order = %order.order_number,
        status = %status,
        admin = %admin.id,
        "Order status changed"
    );

    Ok(ApiResponse::ok(order).with_message("Order status updated"))
}

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlashSaleRequest {
    pub is_active: bool,
    #[serde(default)]
    pub sale_price: Money,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: Category,
    pub base_price: Money,
    pub stock: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<Category>,
    pub base_price: Option<Money>,
    pub stock: Option<i64>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(req: UpdateProductRequest) -> Self {
        ProductPatch {
            name: req.name,
            description: req.description,
            category: req.category,
            base_price: req.base_price,
            stock: req.stock,
        }
    }
}

/// `POST /api/admin/products`
pub async fn create_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    ApiJson(req): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, ApiResponse<PricedProduct>), ApiError> {
    validate_product_name(&req.name)?;
    if !req.description.is_empty() {
        validate_description(&req.description)?;
    }
    validate_price_cents("basePrice", req.base_price.cents())?;
    validate_stock(req.stock)?;

    let now = state.clock.now();
    let product = Product::new(req.name.trim(), req.category, req.base_price, req.stock, now)
        .with_description(req.description);
    let product = state.db.products().insert(&product).await?;

    info!(product = %product.id, name = %product.name, admin = %admin.id, "Product created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(PricedProduct::at(product, now)),
    ))
}

/// `PUT /api/admin/products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateProductRequest>,
) -> ApiResult<PricedProduct> {
    let now = state.clock.now();
    let product = state
        .db
        .products()
        .update(&id, &ProductPatch::from(req), now)
        .await?;

    Ok(ApiResponse::ok(PricedProduct::at(product, now)).with_message("Product updated"))
}

/// `DELETE /api/admin/products/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.db.products().soft_delete(&id, state.clock.now()).await?;

    info!(product = %id, admin = %admin.id, "Product removed");
    Ok(ApiResponse::message("Product removed"))
}

/// `PUT /api/admin/products/{id}/flash-sale`
pub async fn update_flash_sale(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<FlashSaleRequest>,
) -> ApiResult<PricedProduct> {
    let sale = FlashSale {
        is_active: req.is_active,
        sale_price: req.sale_price,
        end_time: req.end_time,
    };

    let now = state.clock.now();
    let product = state.db.products().set_flash_sale(&id, &sale, now).await?;

    Ok(ApiResponse::ok(PricedProduct::at(product, now)).with_message("Flash sale updated"))
}

// =============================================================================
// Reports
// =============================================================================

/// `GET /api/admin/low-stock`
pub async fn low_stock(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Vec<PricedProduct>> {
    let now = state.clock.now();
    let products = state.db.products().low_stock(LOW_STOCK_THRESHOLD).await?;

    Ok(ApiResponse::list(
        products
            .into_iter()
            .map(|p| PricedProduct::at(p, now))
            .collect(),
    ))
}

/// Dashboard payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub summary: SalesSummary,
    pub top_products: Vec<TopProduct>,
    pub category_breakdown: Vec<CategorySales>,
    pub sales_trend: Vec<DailySales>,
    pub recent_orders: Vec<Order>,
}

/// `GET /api/admin/analytics`
pub async fn analytics(State(state): State<AppState>, _admin: AdminUser) -> ApiResult<Analytics> {
    let reports = state.db.reports();

    let analytics = Analytics {
        summary: reports.sales_summary().await?,
        top_products: reports.top_products(TOP_PRODUCTS).await?,
        category_breakdown: reports.category_breakdown().await?,
        sales_trend: reports.sales_trend(state.clock.now(), TREND_DAYS).await?,
        recent_orders: state.db.orders().list_all(RECENT_ORDERS).await?,
    };

    Ok(ApiResponse::ok(analytics))
}

/// `GET /api/admin/leaderboard`
pub async fn leaderboard(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> ApiResult<Vec<LeaderboardEntry>> {
    let entries = state.db.reports().leaderboard(LEADERBOARD_SIZE).await?;
    Ok(ApiResponse::list(entries))
}

#[cfg(test)]
mod tests {
    use crate::auth::Role;
    use crate::test_support::*;
    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use flashmart_core::NotificationKind;
    use serde_json::json;

    async fn place_order(app: &TestApp, user: &str, product_id: &str) -> String {
        let token = app.token(user, Role::Customer);
        app.request(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({"productId": product_id})),
        )
        .await;
        let (status, body) = app
            .request(
                Method::POST,
                "/api/orders",
                Some(&token),
                Some(json!({"shippingAddress": address_json()})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_admin_routes_reject_customers() {
        let app = TestApp::new().await;
        let customer = app.token("u1", Role::Customer);

        let (status, body) = app.get("/api/admin/orders", Some(&customer)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["message"], "Admin access required");

        let (status, _) = app.get("/api/admin/orders", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_change_notifies_owner_once() {
        let app = TestApp::new().await;
        let admin = app.token("admin", Role::Admin);
        let product = seed_product(&app.db, "Masala Chai", 5000, 5).await;
        let order_id = place_order(&app, "u1", &product.id).await;
        let uri = format!("/api/admin/orders/{}", order_id);

        let (status, _) = app
            .request(Method::PUT, &uri, Some(&admin), Some(json!({"status": "shipped"})))
            .await;
        assert_eq!(status, StatusCode::OK);

        let notifications = app.db.notifications();
        let before = notifications
            .count_for_user("u1", NotificationKind::Order)
            .await
            .unwrap();

        let (status, body) = app
            .request(Method::PUT, &uri, Some(&admin), Some(json!({"status": "delivered"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "delivered");

        let after = notifications
            .count_for_user("u1", NotificationKind::Order)
            .await
            .unwrap();
        assert_eq!(after, before + 1);

        let latest = &notifications.list_for_user("u1", now()).await.unwrap()[0];
        assert!(latest.message.ends_with("status updated to delivered"));

        // Placement + two status changes
        assert_eq!(app.db.mail_outbox().for_order(&order_id).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_status_change_survives_mail_failure() {
        let app = TestApp::new().await;
        let admin = app.token("admin", Role::Admin);
        let product = seed_product(&app.db, "Masala Chai", 5000, 5).await;
        let order_id = place_order(&app, "u1", &product.id).await;

        let (dispatcher, _handle) = crate::mail::MailDispatcher::new(
            app.db.clone(),
            app.clock.clone(),
            std::sync::Arc::new(crate::mail::testing::FailingMailer),
            crate::config::MailSettings::default(),
        );

        let (status, body) = app
            .request(
                Method::PUT,
                &format!("/api/admin/orders/{}", order_id),
                Some(&admin),
                Some(json!({"status": "processing"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);

        let report = dispatcher.drain().await.unwrap();
        assert_eq!(report.failed, 2);
        let order = app.db.orders().get_by_id(&order_id).await.unwrap().unwrap();
        assert_eq!(order.status.as_str(), "processing");
    }

    #[tokio::test]
    async fn test_invalid_status_and_unknown_order() {
        let app = TestApp::new().await;
        let admin = app.token("admin", Role::Admin);
        let product = seed_product(&app.db, "Masala Chai", 5000, 5).await;
        let order_id = place_order(&app, "u1", &product.id).await;

        let (status, body) = app
            .request(
                Method::PUT,
                &format!("/api/admin/orders/{}", order_id),
                Some(&admin),
                Some(json!({"status": "lost"})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, body) = app
            .request(
                Method::PUT,
                "/api/admin/orders/missing",
                Some(&admin),
                Some(json!({"status": "shipped"})),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Order not found");
    }

    #[tokio::test]
    async fn test_flash_sale_update_and_announcement() {
        let app = TestApp::new().await;
        let admin = app.token("admin", Role::Admin);
        let product = seed_product(&app.db, "Masala Chai", 10000, 5).await;

        let shopper = app.token("u1", Role::Customer);
        app.request(
            Method::POST,
            "/api/cart",
            Some(&shopper),
            Some(json!({"productId": product.id})),
        )
        .await;

        let end = now() + Duration::minutes(10);
        let (status, body) = app
            .request(
                Method::PUT,
                &format!("/api/admin/products/{}/flash-sale", product.id),
                Some(&admin),
                Some(json!({"isActive": true, "salePrice": 7500, "endTime": end})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["effectivePrice"], 7500);
        assert_eq!(body["data"]["flashSale"]["secondsRemaining"], 600);

        assert_eq!(
            app.db
                .notifications()
                .count_for_user("u1", NotificationKind::FlashSale)
                .await
                .unwrap(),
            1
        );

        let (status, _) = app
            .request(
                Method::PUT,
                &format!("/api/admin/products/{}/flash-sale", product.id),
                Some(&admin),
                Some(json!({"isActive": true, "salePrice": -1, "endTime": end})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // Active without an end time is stored but never on sale
        let (status, body) = app
            .request(
                Method::PUT,
                &format!("/api/admin/products/{}/flash-sale", product.id),
                Some(&admin),
                Some(json!({"isActive": true, "salePrice": 7500, "endTime": null})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["onSale"], false);
        assert_eq!(body["data"]["effectivePrice"], 10000);
    }

    #[tokio::test]
    async fn test_product_crud() {
        let app = TestApp::new().await;
        let admin = app.token("admin", Role::Admin);

        let (status, body) = app
            .request(
                Method::POST,
                "/api/admin/products",
                Some(&admin),
                Some(json!({
                    "name": "Rose Soap",
                    "description": "Handmade",
                    "category": "Beauty",
                    "basePrice": 12000,
                    "stock": 3
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = app
            .request(
                Method::PUT,
                &format!("/api/admin/products/{}", id),
                Some(&admin),
                Some(json!({"basePrice": 9900})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["basePrice"], 9900);
        assert_eq!(body["data"]["name"], "Rose Soap");

        let (_, body) = app.get("/api/admin/low-stock", Some(&admin)).await;
        assert_eq!(body["count"], 1);

        let (status, _) = app
            .request(Method::DELETE, &format!("/api/admin/products/{}", id), Some(&admin), None)
            .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = app.get(&format!("/api/products/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = app
            .request(
                Method::POST,
                "/api/admin/products",
                Some(&admin),
                Some(json!({"name": " ", "category": "Food", "basePrice": 100, "stock": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_prices_above_ceiling_are_rejected() {
        let app = TestApp::new().await;
        let admin = app.token("admin", Role::Admin);
        let product = seed_product(&app.db, "Masala Chai", 10000, 5).await;
        let huge = i64::MAX / 2;

        let (status, body) = app
            .request(
                Method::POST,
                "/api/admin/products",
                Some(&admin),
                Some(json!({"name": "Gold Tea", "category": "Food", "basePrice": huge, "stock": 1})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let (status, _) = app
            .request(
                Method::PUT,
                &format!("/api/admin/products/{}", product.id),
                Some(&admin),
                Some(json!({"basePrice": huge})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let end = now() + Duration::hours(1);
        let (status, _) = app
            .request(
                Method::PUT,
                &format!("/api/admin/products/{}/flash-sale", product.id),
                Some(&admin),
                Some(json!({"isActive": true, "salePrice": huge, "endTime": end})),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // The stored price is untouched and the cart still totals it
        let customer = app.token("u1", Role::Customer);
        let (status, _) = app
            .request(
                Method::POST,
                "/api/cart",
                Some(&customer),
                Some(json!({"productId": product.id, "quantity": 3})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = app.get("/api/cart", Some(&customer)).await;
        assert_eq!(body["data"]["totalAmount"], 30000);
    }

    #[tokio::test]
    async fn test_analytics_and_leaderboard() {
        let app = TestApp::new().await;
        let admin = app.token("admin", Role::Admin);
        let product = seed_product(&app.db, "Masala Chai", 5000, 10).await;
        place_order(&app, "u1", &product.id).await;
        place_order(&app, "u2", &product.id).await;

        let (status, body) = app.get("/api/admin/analytics", Some(&admin)).await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["summary"]["totalOrders"], 2);
        assert_eq!(data["summary"]["totalSales"], 10000);
        assert_eq!(data["topProducts"][0]["totalQuantity"], 2);
        assert_eq!(data["salesTrend"].as_array().unwrap().len(), 7);
        assert_eq!(data["recentOrders"].as_array().unwrap().len(), 2);

        let (_, body) = app.get("/api/admin/leaderboard", Some(&admin)).await;
        assert_eq!(body["count"], 2);
    }
}
