//! The caller's cart. Every mutation answers with the whole cart so the
//! client never recomputes totals.

use axum::extract::{Path, State};
use serde::Deserialize;
use tracing::debug;

use crate::auth::AuthUser;
use crate::error::ApiJson;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use flashmart_core::{CartSummary, LineChange};

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    pub product_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

async fn summary(state: &AppState, user_id: &str) -> ApiResult<CartSummary> {
    let cart = state.db.carts().get_cart(user_id, state.clock.now()).await?;
    Ok(ApiResponse::ok(CartSummary::from(&cart)))
}

/// `GET /api/cart`
pub async fn get_cart(State(state): State<AppState>, user: AuthUser) -> ApiResult<CartSummary> {
    summary(&state, &user.id).await
}

/// `POST /api/cart`
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    ApiJson(req): ApiJson<AddToCartRequest>,
) -> ApiResult<CartSummary> {
    let line = state
        .db
        .carts()
        .add_item(&user.id, &req.product_id, req.quantity, state.clock.now())
        .await?;

    debug!(user = %user.id, product = %line.product_id, quantity = line.quantity, "Added to cart");

    Ok(summary(&state, &user.id).await?.with_message("Item added to cart"))
}

/// `PUT /api/cart/{item_id}`. Quantity 0 removes the line.
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<String>,
    ApiJson(req): ApiJson<UpdateQuantityRequest>,
) -> ApiResult<CartSummary> {
    let change = state
        .db
        .carts()
        .update_quantity(&user.id, &item_id, req.quantity, state.clock.now())
        .await?;

    let message = match change {
        LineChange::Updated(_) => "Cart updated",
        LineChange::Removed(_) => "Item removed from cart",
    };

    Ok(summary(&state, &user.id).await?.with_message(message))
}

/// `DELETE /api/cart/{item_id}`. Removing a line that is not there succeeds.
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(item_id): Path<String>,
) -> ApiResult<CartSummary> {
    let removed = state
        .db
        .carts()
        .remove_item(&user.id, &item_id, state.clock.now())
        .await?;

    if !removed {
        debug!(user = %user.id, item = %item_id, "Cart line already gone");
    }

    Ok(summary(&state, &user.id).await?.with_message("Item removed from cart"))
}
