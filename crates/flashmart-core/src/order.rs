//! # Orders
//!
//! An order is written once, at checkout, and afterwards only its `status`
//! moves.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   pending ──► processing ──► shipped ──► delivered                     │
//! │      │             │            │                                       │
//! │      └─────────────┴────────────┴──────► cancelled                     │
//! │                                                                         │
//! │   Admins may set any status from any status; the arrows are the        │
//! │   expected path, not an enforced one.                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity
//! - `id`: UUID v4, used for relations and `/orders/{id}` links
//! - `order_number`: `ORD-<year>-<5-digit sequence>`, shown to shoppers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::cart::Cart;
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::Customer;

// =============================================================================
// Order Number
// =============================================================================

/// Human-readable order identifier, e.g. `ORD-2026-00042`.
///
/// The sequence restarts every calendar year and is handed out by an atomic
/// per-year counter in the database, so two concurrent checkouts never share
/// a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderNumber {
    pub year: i32,
    pub sequence: i64,
}

impl OrderNumber {
    pub const PREFIX: &'static str = "ORD";

    pub fn new(year: i32, sequence: i64) -> Self {
        Self { year, sequence }
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{:05}", Self::PREFIX, self.year, self.sequence)
    }
}

impl FromStr for OrderNumber {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidFormat {
            field: "orderId".to_string(),
            reason: "expected ORD-<year>-<sequence>".to_string(),
        };

        let mut parts = s.splitn(3, '-');
        if parts.next() != Some(Self::PREFIX) {
            return Err(invalid());
        }
        let year = parts
            .next()
            .and_then(|y| y.parse::<i32>().ok())
            .ok_or_else(invalid)?;
        let sequence = parts
            .next()
            .filter(|seq| seq.len() >= 5 && seq.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|seq| seq.parse::<i64>().ok())
            .ok_or_else(invalid)?;

        Ok(Self { year, sequence })
    }
}

// =============================================================================
// Statuses
// =============================================================================

/// Fulfilment status, the only mutable part of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pending,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Delivered and cancelled orders are at the end of the expected path.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// One-line explanation used in status-update emails.
    pub fn customer_message(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Your order is pending confirmation.",
            OrderStatus::Processing => "We are processing your order.",
            OrderStatus::Shipped => "Your order has been shipped and is on its way!",
            OrderStatus::Delivered => "Your order has been delivered. Enjoy your purchase!",
            OrderStatus::Cancelled => "Your order has been cancelled.",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: OrderStatus::ALL.iter().map(|st| st.to_string()).collect(),
            })
    }
}

/// Payment state. Recorded on every order; nothing transitions it yet
/// because payment capture happens outside this system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
}

impl Default for PaymentStatus {
    fn default() -> Self {
        PaymentStatus::Pending
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Shipping Address
// =============================================================================

/// Where the order goes. Copied onto the order at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

// =============================================================================
// Order
// =============================================================================

/// A purchased line, frozen at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct OrderItem {
    pub product_id: String,
    /// Product name at time of purchase.
    pub name: String,
    pub quantity: i64,
    /// The cart's frozen price-at-add.
    pub unit_price: Money,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Order {
    pub id: String,
    #[ts(type = "string")]
    #[serde(with = "order_number_serde")]
    pub order_number: OrderNumber,
    pub user_id: String,
    /// Recipient for status-update emails.
    pub customer_email: String,
    pub customer_name: String,
    pub items: Vec<OrderItem>,
    pub total_amount: Money,
    pub shipping_address: ShippingAddress,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Snapshots a cart into a new pending order.
    ///
    /// Prices come from the cart's frozen `price_at_add`; nothing is
    /// re-resolved here. Stock is NOT checked: that happens against the
    /// ledger inside the checkout transaction.
    pub fn from_cart(
        cart: &Cart,
        customer: &Customer,
        shipping_address: ShippingAddress,
        order_number: OrderNumber,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        if cart.is_empty() {
            return Err(CoreError::EmptyCart);
        }

        let items: Vec<OrderItem> = cart
            .lines
            .iter()
            .map(|line| OrderItem {
                product_id: line.product_id.clone(),
                name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.price_at_add,
            })
            .collect();
        let total_amount = items.iter().map(OrderItem::line_total).sum();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            order_number,
            user_id: customer.id.clone(),
            customer_email: customer.email.clone(),
            customer_name: customer.name.clone(),
            items,
            total_amount,
            shipping_address,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Link used by notifications and emails.
    pub fn link(&self) -> String {
        format!("/orders/{}", self.id)
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

/// `OrderNumber` travels as its display string (`"ORD-2026-00001"`).
mod order_number_serde {
    use super::OrderNumber;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(number: &OrderNumber, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(number)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OrderNumber, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, FlashSale, Product};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    fn address() -> ShippingAddress {
        ShippingAddress {
            name: "Asha Rao".into(),
            phone: "9800000000".into(),
            street: "12 MG Road".into(),
            city: "Bengaluru".into(),
            state: "KA".into(),
            pincode: "560001".into(),
        }
    }

    fn customer() -> Customer {
        Customer::new("u1", "asha@example.com", "Asha")
    }

    #[test]
    fn test_order_number_format() {
        assert_eq!(OrderNumber::new(2026, 5).to_string(), "ORD-2026-00005");
        assert_eq!(OrderNumber::new(2026, 123456).to_string(), "ORD-2026-123456");
    }

    #[test]
    fn test_order_number_parse() {
        let parsed: OrderNumber = "ORD-2026-00042".parse().unwrap();
        assert_eq!(parsed, OrderNumber::new(2026, 42));

        assert!("ORD-2026-42".parse::<OrderNumber>().is_err());
        assert!("INV-2026-00042".parse::<OrderNumber>().is_err());
        assert!("6f1c0c2e-uuid".parse::<OrderNumber>().is_err());
    }

    #[test]
    fn test_status_parse_and_display() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("returned".parse::<OrderStatus>().is_err());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(!OrderStatus::Shipped.is_terminal());
    }

    #[test]
    fn test_from_cart_uses_frozen_prices() {
        let mut product = Product::new("Chai", Category::Food, Money::from_cents(100), 5, now());
        product.flash_sale = FlashSale::live(Money::from_cents(50), now() + Duration::minutes(1));

        let mut cart = Cart::new("u1", now());
        cart.add_item(&product, 2, now()).unwrap();

        // Sale is long over by checkout time
        let later = now() + Duration::days(1);
        let order = Order::from_cart(&cart, &customer(), address(), OrderNumber::new(2026, 1), later)
            .unwrap();

        assert_eq!(order.total_amount.cents(), 100);
        assert_eq!(order.items[0].unit_price.cents(), 50);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert_eq!(order.created_at, later);
    }

    #[test]
    fn test_from_empty_cart_fails() {
        let cart = Cart::new("u1", now());
        let err = Order::from_cart(&cart, &customer(), address(), OrderNumber::new(2026, 1), now())
            .unwrap_err();
        assert!(matches!(err, CoreError::EmptyCart));
    }

    #[test]
    fn test_order_json() {
        let product = Product::new("Chai", Category::Food, Money::from_cents(100), 5, now());
        let mut cart = Cart::new("u1", now());
        cart.add_item(&product, 1, now()).unwrap();
        let order = Order::from_cart(&cart, &customer(), address(), OrderNumber::new(2026, 7), now())
            .unwrap();

        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["orderNumber"], "ORD-2026-00007");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["paymentStatus"], "pending");
        assert_eq!(value["shippingAddress"]["pincode"], "560001");

        let back: Order = serde_json::from_value(value).unwrap();
        assert_eq!(back.order_number, OrderNumber::new(2026, 7));
        assert_eq!(order.link(), format!("/orders/{}", order.id));
    }
}
