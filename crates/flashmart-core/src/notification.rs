//! # Notifications
//!
//! In-app messages shown in the storefront's bell menu. Clients poll for
//! them; there is no push channel.
//!
//! A notification expires [`NOTIFICATION_TTL_DAYS`] after creation. Expiry is
//! evaluated at read-time like flash sales are, and a purge sweeps the rows
//! out of storage afterwards.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::order::{Order, OrderStatus};
use crate::NOTIFICATION_TTL_DAYS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Stock,
    FlashSale,
    General,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Notification {
    pub id: String,
    pub user_id: String,
    #[serde(rename = "type")]
    #[ts(rename = "type")]
    pub kind: NotificationKind,
    pub message: String,
    pub is_read: bool,
    pub link: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub expires_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        user_id: impl Into<String>,
        kind: NotificationKind,
        message: impl Into<String>,
        link: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            kind,
            message: message.into(),
            is_read: false,
            link,
            created_at: now,
            expires_at: now + Duration::days(NOTIFICATION_TTL_DAYS),
        }
    }

    /// Written in the same transaction that creates `order`.
    pub fn order_placed(order: &Order, now: DateTime<Utc>) -> Self {
        Self::new(
            order.user_id.clone(),
            NotificationKind::Order,
            format!("Your order {} has been placed successfully", order.order_number),
            Some(order.link()),
            now,
        )
    }

    /// Written in the same transaction that changes the status.
    pub fn status_changed(order: &Order, status: OrderStatus, now: DateTime<Utc>) -> Self {
        Self::new(
            order.user_id.clone(),
            NotificationKind::Order,
            format!("Your order {} status updated to {}", order.order_number, status),
            Some(order.link()),
            now,
        )
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
