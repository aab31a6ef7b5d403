//! # Flashmart API
//!
//! HTTP surface of the storefront: catalog, cart, checkout, order history,
//! notifications and the admin console.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront API                                   │
//! │                                                                         │
//! │  Request                                                                │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  TraceLayer ─► CorsLayer ─► Router                                      │
//! │                               │                                         │
//! │              ┌────────────────┼─────────────────┐                       │
//! │              ▼                ▼                 ▼                       │
//! │          public          AuthUser           AdminUser                   │
//! │         products      cart / orders /     /api/admin/*                  │
//! │          health       notifications                                     │
//! │              │                │                 │                       │
//! │              └────────────────┼─────────────────┘                       │
//! │                               ▼                                         │
//! │                     flashmart-db repositories                           │
//! │                               │                                         │
//! │                               ▼  (after commit)                         │
//! │                     MailDispatcher::wake ─► Mailer                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! `flashmart.toml` plus environment overrides, see [`config`]:
//! - `FLASHMART_PORT` / `FLASHMART_BIND` - listen address (default `0.0.0.0:5000`)
//! - `FLASHMART_DATABASE` - SQLite file
//! - `FLASHMART_JWT_SECRET` - HS256 secret shared with the identity service
//! - `FLASHMART_MAIL_MODE` / `FLASHMART_MAIL_RELAY_URL` - `log` or `http`

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod response;
pub mod shutdown;
pub mod state;

#[cfg(test)]
mod test_support;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::ApiConfig;
pub use error::ApiError;
pub use state::AppState;

use handlers::{admin, cart, health, notifications, orders, products};

/// Builds the full application router.
///
/// An empty `allowed_origins` allows any origin.
pub fn build_router(state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .nest("/api", api_routes())
        .fallback(handlers::route_not_found)
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/products", get(products::list_products))
        .route("/products/flash-sales", get(products::list_flash_sales))
        .route("/products/{id}", get(products::get_product))
        // Cart
        .route("/cart", get(cart::get_cart).post(cart::add_to_cart))
        .route(
            "/cart/{item_id}",
            put(cart::update_cart_item).delete(cart::remove_cart_item),
        )
        // Orders
        .route("/orders", get(orders::list_my_orders).post(orders::place_order))
        .route("/orders/{id}", get(orders::get_order))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/mark-all-read", put(notifications::mark_all_read))
        .route(
            "/notifications/{id}",
            put(notifications::mark_read).delete(notifications::delete_notification),
        )
        // Admin
        .route("/admin/orders", get(admin::list_orders))
        .route("/admin/orders/{id}", put(admin::update_order_status))
        .route("/admin/products", post(admin::create_product))
        .route(
            "/admin/products/{id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/admin/products/{id}/flash-sale", put(admin::update_flash_sale))
        .route("/admin/low-stock", get(admin::low_stock))
        .route("/admin/analytics", get(admin::analytics))
        .route("/admin/leaderboard", get(admin::leaderboard))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(origins)
}
