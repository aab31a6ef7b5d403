//! # Post-Commit Events
//!
//! Side effects that must not be able to fail the operation that caused
//! them (confirmation and status-update emails) are described as events.
//!
//! ```text
//! ┌──────────────── one DB transaction ────────────────┐
//! │ insert order ─► decrement stock ─► clear cart      │
//! │      ─► insert notification ─► enqueue OrderEvent  │
//! └────────────────────────┬───────────────────────────┘
//!                          │ commit
//!                          ▼
//!              mail dispatcher drains the queue
//!         (delivery errors are logged, never returned)
//! ```
//!
//! Only the order id travels in the event; the dispatcher reloads the order
//! when it renders the email.

use serde::{Deserialize, Serialize};

use crate::order::OrderStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    OrderPlaced { order_id: String },
    StatusChanged { order_id: String, status: OrderStatus },
}

impl OrderEvent {
    /// Short label stored alongside the payload for filtering and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced { .. } => "order_placed",
            OrderEvent::StatusChanged { .. } => "status_changed",
        }
    }

    pub fn order_id(&self) -> &str {
        match self {
            OrderEvent::OrderPlaced { order_id } | OrderEvent::StatusChanged { order_id, .. } => {
                order_id
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_payload_round_trips_through_json() {
        let event = OrderEvent::StatusChanged {
            order_id: "o1".into(),
            status: OrderStatus::Shipped,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"type":"status_changed","order_id":"o1","status":"shipped"}"#);

        let back: OrderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.kind(), "status_changed");
        assert_eq!(back.order_id(), "o1");
    }
}
