use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Processing,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown order status '{0}'")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// A line of an incoming order request, before any price is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedItem {
    pub product_id: String,
    pub quantity: i32,
}

impl RequestedItem {
    pub fn new(product_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// A persisted order line. `price_at_purchase` is captured once, during
/// order creation, and never recomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: i32,
    pub price_at_purchase: BigDecimal,
}

impl OrderItem {
    pub fn line_total(&self) -> BigDecimal {
        &self.price_at_purchase * BigDecimal::from(self.quantity)
    }
}

/// Price and stock of a product as read from the catalog. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub price: BigDecimal,
    pub stock_quantity: i32,
}

/// One atomic stock change sent to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: String,
    pub delta: i32,
}

/// An order ready to be written, still without identifier or timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: BigDecimal,
    pub status: OrderStatus,
}

impl NewOrder {
    pub fn pending(user_id: impl Into<String>, items: Vec<OrderItem>) -> Self {
        let total_amount = items
            .iter()
            .fold(BigDecimal::from(0), |acc, item| acc + item.line_total());
        Self {
            user_id: user_id.into(),
            items,
            total_amount,
            status: OrderStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub total_amount: BigDecimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
