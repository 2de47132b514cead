use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOutcome {
    Completed,
    Cancelled,
}

/// Terminal outcome of one order. At most one record exists per
/// (order, outcome) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryHistory {
    pub id: Uuid,
    pub order_id: Uuid,
    pub partner_phone: Option<String>,
    pub completed_at: DateTime<Utc>,
    pub earnings: Decimal,
    pub outcome: HistoryOutcome,
}
