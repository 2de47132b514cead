use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::lifecycle::LifecycleError;
use crate::models::customer::Customer;
use crate::models::history::{DeliveryHistory, HistoryOutcome};
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::models::partner::DeliveryPartner;
use crate::state::AppState;

/// Assigned partner as it appears in HTTP responses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnerSummary {
    pub id: Uuid,
    pub name: String,
    pub phone_number: String,
}

/// Assigned partner as pushed to websocket sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PartnerContact {
    pub name: String,
    pub phone_number: String,
}

impl From<&PartnerSummary> for PartnerContact {
    fn from(summary: &PartnerSummary) -> Self {
        Self {
            name: summary.name.clone(),
            phone_number: summary.phone_number.clone(),
        }
    }
}

impl From<&DeliveryPartner> for PartnerSummary {
    fn from(partner: &DeliveryPartner) -> Self {
        Self {
            id: partner.id,
            name: partner.name.clone(),
            phone_number: partner.phone_number.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerSummary {
    pub name: String,
    pub phone_number: String,
    pub address: String,
}

impl From<&Customer> for CustomerSummary {
    fn from(customer: &Customer) -> Self {
        Self {
            name: customer.name.clone(),
            phone_number: customer.phone_number.clone(),
            address: customer.address.clone(),
        }
    }
}

/// The one shape every producer of order state emits: creation, status
/// updates, status queries, listings and broadcasts.
///
/// `P` is the representation of the assigned partner. HTTP responses carry
/// the full [`PartnerSummary`]; sessions narrow it to a [`PartnerContact`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderPayload<P = PartnerSummary> {
    pub order_id: Uuid,
    pub placed_at: DateTime<Utc>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub out_for_delivery_at: Option<DateTime<Utc>>,
    pub delivery_time: Option<i64>,
    pub total_amount: Decimal,
    pub delivery_status: OrderStatus,
    pub assigned_to: Option<P>,
    pub items: Vec<OrderItem>,
    pub delivery_address: String,
    pub user: CustomerSummary,
}

impl OrderPayload {
    pub fn session_view(&self) -> OrderPayload<PartnerContact> {
        OrderPayload {
            order_id: self.order_id,
            placed_at: self.placed_at,
            assigned_at: self.assigned_at,
            out_for_delivery_at: self.out_for_delivery_at,
            delivery_time: self.delivery_time,
            total_amount: self.total_amount,
            delivery_status: self.delivery_status,
            assigned_to: self.assigned_to.as_ref().map(PartnerContact::from),
            items: self.items.clone(),
            delivery_address: self.delivery_address.clone(),
            user: self.user.clone(),
        }
    }
}

/// One row of a partner's delivery history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub order_id: Uuid,
    pub delivery_status: OrderStatus,
    pub completed_at: DateTime<Utc>,
    pub earnings: Decimal,
    pub total_amount: Decimal,
    pub assigned_to: PartnerContact,
    pub user: CustomerSummary,
    pub items: Vec<OrderItem>,
}

pub fn build_payload(state: &AppState, order: &Order) -> Result<OrderPayload, LifecycleError> {
    let user = state
        .customers
        .get(&order.customer_phone)
        .map(|customer| CustomerSummary::from(customer.value()))
        .ok_or_else(|| {
            LifecycleError::Inconsistent(format!(
                "order {} references unknown customer {}",
                order.id, order.customer_phone
            ))
        })?;

    let assigned_to = match &order.assigned_to {
        Some(phone) => Some(
            state
                .partners
                .get(phone)
                .map(|partner| PartnerSummary::from(partner.value()))
                .ok_or_else(|| {
                    LifecycleError::Inconsistent(format!(
                        "order {} references unknown partner {phone}",
                        order.id
                    ))
                })?,
        ),
        None => None,
    };

    Ok(OrderPayload {
        order_id: order.id,
        placed_at: order.placed_at,
        assigned_at: order.assigned_at,
        out_for_delivery_at: order.out_for_delivery_at,
        delivery_time: order.delivery_time,
        total_amount: order.total_amount,
        delivery_status: order.status,
        assigned_to,
        items: order.items.clone(),
        delivery_address: order.delivery_address.clone(),
        user,
    })
}

pub fn build_history_entry(
    state: &AppState,
    partner: &DeliveryPartner,
    record: &DeliveryHistory,
    order: &Order,
) -> Result<HistoryEntry, LifecycleError> {
    let user = state
        .customers
        .get(&order.customer_phone)
        .map(|customer| CustomerSummary::from(customer.value()))
        .ok_or_else(|| {
            LifecycleError::Inconsistent(format!(
                "order {} references unknown customer {}",
                order.id, order.customer_phone
            ))
        })?;

    let delivery_status = match record.outcome {
        HistoryOutcome::Completed => OrderStatus::Delivered,
        HistoryOutcome::Cancelled => OrderStatus::Cancelled,
    };

    Ok(HistoryEntry {
        order_id: order.id,
        delivery_status,
        completed_at: record.completed_at,
        earnings: record.earnings,
        total_amount: order.total_amount,
        assigned_to: PartnerContact {
            name: partner.name.clone(),
            phone_number: partner.phone_number.clone(),
        },
        user,
        items: order.items.clone(),
    })
}
