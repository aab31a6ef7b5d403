//! # HTTP Handlers
//!
//! One module per resource. Handlers stay thin: extract, call a repository,
//! wrap the result in the envelope.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  /api/products ........ products        (public)                       │
//! │  /api/cart ............ cart            (AuthUser)                     │
//! │  /api/orders .......... orders          (AuthUser, owner or admin)     │
//! │  /api/notifications ... notifications   (AuthUser)                     │
//! │  /api/admin/* ......... admin           (AdminUser)                    │
//! │  /health .............. health          (public)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod admin;
pub mod cart;
pub mod health;
pub mod notifications;
pub mod orders;
pub mod products;

use crate::error::ApiError;

/// Fallback for unknown routes.
pub async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route not found".into())
}
