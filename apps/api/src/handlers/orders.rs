//! Checkout and order history.
//!
//! ```text
//! POST /api/orders
//!   │
//!   ▼
//! OrderRepository::place_order ── one transaction: stock, order, cart,
//!   │                             notification, mail_outbox
//!   ├── Err ─► 400 "Cart is empty" / "Insufficient stock for X"
//!   ▼
//! mail.wake() ─► 201 { success, data: order }
//! ```
//!
//! The response never waits on email. A mail failure after commit stays in
//! the outbox.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiJson};
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use flashmart_core::{Order, ShippingAddress};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub shipping_address: ShippingAddress,
}

/// `POST /api/orders`
pub async fn place_order(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<PlaceOrderRequest>,
) -> Result<(StatusCode, ApiResponse<Order>), ApiError> {
    let order = state
        .db
        .orders()
        .place_order(&user.customer(), &req.shipping_address, state.clock.now())
        .await?;

    state.mail.wake();

    info!(
        order = %order.order_number,
        user = %user.id,
        total = %order.total_amount,
        "Order placed"
    );

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(order).with_message("Order placed successfully"),
    ))
}

/// `GET /api/orders`
pub async fn list_my_orders(State(state): State<AppState>, user: AuthUser) -> ApiResult<Vec<Order>> {
    let orders = state.db.orders().list_for_user(&user.id).await?;
    Ok(ApiResponse::list(orders))
}

/// `GET /api/orders/{id}`. Accepts the id or the order number.
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_ref): Path<String>,
) -> ApiResult<Order> {
    let order = state
        .db
        .orders()
        .find(&order_ref)
        .await?
        .ok_or_else(|| ApiError::NotFound("Order not found".into()))?;

    if !order.is_owned_by(&user.id) && !user.is_admin() {
        return Err(ApiError::Forbidden("Not authorized to view this order".into()));
    }

    Ok(ApiResponse::ok(order))
}
