use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::gateway::{BroadcastGateway, Group, OrderEvent};
use crate::engine::payload::{build_payload, OrderPayload};
use crate::models::history::{DeliveryHistory, HistoryOutcome};
use crate::models::order::{money, Order, OrderItem, OrderStatus};
use crate::state::AppState;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("invalid status '{given}'; must be one of placed, assigned, out_for_delivery, delivered, cancelled")]
    InvalidStatus { given: String },

    #[error("delivery partner {0} not found")]
    PartnerNotFound(String),

    #[error("'phone_number' is required to assign an order")]
    MissingPhoneForAssignment,

    #[error("customer {0} not found")]
    CustomerNotFound(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("inconsistent order data: {0}")]
    Inconsistent(String),
}

/// Share of the order total credited to the partner on delivery.
fn earnings_rate() -> Decimal {
    dec!(0.10)
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_phone: String,
    pub total_amount: Decimal,
    pub items: Vec<OrderItem>,
}

/// Places an order for an existing customer and announces it to the partner
/// pool and to the customer.
pub async fn create_order(state: &AppState, new_order: NewOrder) -> Result<OrderPayload, LifecycleError> {
    validate_new_order(&new_order)?;

    let customer = state
        .customers
        .get(&new_order.customer_phone)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| LifecycleError::CustomerNotFound(new_order.customer_phone.clone()))?;

    let order = Order {
        id: Uuid::new_v4(),
        customer_phone: customer.phone_number.clone(),
        placed_at: Utc::now(),
        assigned_at: None,
        out_for_delivery_at: None,
        delivery_time: None,
        total_amount: money(new_order.total_amount),
        status: OrderStatus::Placed,
        delivery_address: customer.address.clone(),
        assigned_to: None,
        items: new_order
            .items
            .into_iter()
            .map(|item| OrderItem {
                item_name: item.item_name.trim().to_string(),
                quantity: item.quantity,
                price_per_item: money(item.price_per_item),
            })
            .collect(),
    };

    let mut tx = state.orders.begin().await;
    let payload = build_payload(state, &order)?;
    tx.insert_order(order)?;
    tx.commit();

    state.metrics.orders_created_total.inc();
    info!(
        order_id = %payload.order_id,
        customer = %payload.user.phone_number,
        total = %payload.total_amount,
        "order placed"
    );

    let event = OrderEvent::OrderCreated(Arc::new(payload.clone()));
    state.gateway.publish(&Group::Unassigned, event.clone());
    state
        .gateway
        .publish(&Group::customer(&payload.user.phone_number), event);

    Ok(payload)
}

fn validate_new_order(new_order: &NewOrder) -> Result<(), LifecycleError> {
    if new_order.items.is_empty() {
        return Err(LifecycleError::InvalidOrder("order needs at least one item".to_string()));
    }
    if new_order.total_amount.is_sign_negative() {
        return Err(LifecycleError::InvalidOrder("total cannot be negative".to_string()));
    }
    for item in &new_order.items {
        if item.item_name.trim().is_empty() {
            return Err(LifecycleError::InvalidOrder("item name cannot be empty".to_string()));
        }
        if item.quantity == 0 {
            return Err(LifecycleError::InvalidOrder(format!(
                "quantity for {} must be > 0",
                item.item_name
            )));
        }
        if item.price_per_item.is_sign_negative() {
            return Err(LifecycleError::InvalidOrder(format!(
                "price for {} cannot be negative",
                item.item_name
            )));
        }
    }
    Ok(())
}

/// Moves an order to `requested` status, records terminal history, and fans
/// the new state out once the change is committed.
pub async fn transition(
    state: &AppState,
    order_id: Uuid,
    requested: &str,
    partner_phone: Option<&str>,
) -> Result<OrderPayload, LifecycleError> {
    let start = Instant::now();
    let result = apply_transition(state, order_id, requested, partner_phone).await;
    let elapsed = start.elapsed().as_secs_f64();

    let status_label = requested
        .parse::<OrderStatus>()
        .map(|status| status.as_str())
        .unwrap_or("invalid");

    match &result {
        Ok(payload) => {
            state
                .metrics
                .transition_latency_seconds
                .with_label_values(&["success"])
                .observe(elapsed);
            state
                .metrics
                .order_transitions_total
                .with_label_values(&[status_label, "success"])
                .inc();
            fan_out_update(&state.gateway, payload);
            info!(
                order_id = %order_id,
                status = %payload.delivery_status,
                "order status updated"
            );
        }
        Err(err) => {
            state
                .metrics
                .transition_latency_seconds
                .with_label_values(&["error"])
                .observe(elapsed);
            state
                .metrics
                .order_transitions_total
                .with_label_values(&[status_label, "error"])
                .inc();
            warn!(order_id = %order_id, requested, error = %err, "order status update rejected");
        }
    }

    result
}

async fn apply_transition(
    state: &AppState,
    order_id: Uuid,
    requested: &str,
    partner_phone: Option<&str>,
) -> Result<OrderPayload, LifecycleError> {
    let status: OrderStatus = requested
        .parse()
        .map_err(|_| LifecycleError::InvalidStatus {
            given: requested.trim().to_string(),
        })?;

    let mut tx = state.orders.begin().await;
    let mut order = tx
        .order(order_id)
        .cloned()
        .ok_or(LifecycleError::OrderNotFound(order_id))?;
    let now = Utc::now();

    match status {
        OrderStatus::Placed => {}
        OrderStatus::Assigned => {
            let phone = partner_phone
                .map(str::trim)
                .filter(|phone| !phone.is_empty())
                .ok_or(LifecycleError::MissingPhoneForAssignment)?;
            let partner = state
                .partners
                .get(phone)
                .map(|entry| entry.value().phone_number.clone())
                .ok_or_else(|| LifecycleError::PartnerNotFound(phone.to_string()))?;
            order.assigned_to = Some(partner);
            order.assigned_at = Some(now);
        }
        OrderStatus::OutForDelivery => {
            order.out_for_delivery_at.get_or_insert(now);
        }
        OrderStatus::Delivered => {
            if !tx.has_history(order_id, HistoryOutcome::Completed) {
                tx.record_history(DeliveryHistory {
                    id: Uuid::new_v4(),
                    order_id,
                    partner_phone: order.assigned_to.clone(),
                    completed_at: now,
                    earnings: money(order.total_amount * earnings_rate()),
                    outcome: HistoryOutcome::Completed,
                })?;
            }
            if order.delivery_time.is_none() {
                order.delivery_time = Some((now - order.placed_at).num_minutes());
            }
        }
        OrderStatus::Cancelled => {
            if let Some(partner_phone) = order.assigned_to.clone() {
                if !tx.has_history(order_id, HistoryOutcome::Cancelled) {
                    tx.record_history(DeliveryHistory {
                        id: Uuid::new_v4(),
                        order_id,
                        partner_phone: Some(partner_phone),
                        completed_at: now,
                        earnings: money(Decimal::ZERO),
                        outcome: HistoryOutcome::Cancelled,
                    })?;
                }
            }
        }
    }

    order.status = status;
    let payload = build_payload(state, &order)?;
    tx.update_order(order);
    tx.commit();

    Ok(payload)
}

/// Targets for a committed status change: the customer and the general
/// audience always, the partner pool while nobody has the order.
pub fn update_targets(payload: &OrderPayload) -> Vec<Group> {
    let mut groups = vec![
        Group::customer(&payload.user.phone_number),
        Group::AllOrders,
    ];
    if payload.assigned_to.is_none() {
        groups.push(Group::Unassigned);
    }
    groups
}

fn fan_out_update(gateway: &BroadcastGateway, payload: &OrderPayload) {
    let event = OrderEvent::OrderUpdated(Arc::new(payload.clone()));
    for group in update_targets(payload) {
        gateway.publish(&group, event.clone());
    }
}
