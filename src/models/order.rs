use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Assigned,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Placed,
        OrderStatus::Assigned,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Placed => "placed",
            OrderStatus::Assigned => "assigned",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Orders a partner is still working on.
    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Assigned | OrderStatus::OutForDelivery)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == normalized)
            .ok_or(UnknownStatus(normalized))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub item_name: String,
    pub quantity: u32,
    pub price_per_item: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_phone: String,
    pub placed_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    /// Minutes between placement and delivery.
    pub delivery_time: Option<i64>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_address: String,
    /// Phone number of the assigned delivery partner.
    pub assigned_to: Option<String>,
    pub items: Vec<OrderItem>,
}

/// Rounds a currency amount to two decimal places with a fixed scale, so
/// `250` and `250.0` both render as `"250.00"`.
pub fn money(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded
}
