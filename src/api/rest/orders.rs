use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::rest::accounts::{required, PhoneQuery};
use crate::engine::lifecycle::{self, NewOrder};
use crate::engine::payload::{build_history_entry, build_payload, HistoryEntry, OrderPayload};
use crate::error::AppError;
use crate::models::order::{Order, OrderItem, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create-order", post(create_order))
        .route("/order-history", get(customer_order_history))
        .route("/orders/all", get(all_orders))
        .route("/orders/unassigned", get(unassigned_orders))
        .route("/orders/assigned", get(assigned_orders))
        .route("/orders/history", get(partner_history))
        .route("/orders/:order_id/status", get(order_status))
        .route("/orders/:order_id/update-status", patch(update_order_status))
}

#[derive(Deserialize)]
pub struct CreateOrderItem {
    #[serde(alias = "name")]
    pub item_name: String,
    #[serde(alias = "qty")]
    pub quantity: u32,
    #[serde(alias = "price")]
    pub price_per_item: Decimal,
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub phone_number: Option<String>,
    pub total: Option<Decimal>,
    #[serde(default)]
    pub items: Vec<CreateOrderItem>,
}

#[derive(Serialize)]
pub struct CreateOrderResponse {
    pub message: &'static str,
    pub order_id: Uuid,
    pub order: OrderPayload,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Serialize)]
pub struct UpdateStatusResponse {
    pub success: bool,
    pub order: OrderPayload,
}

fn parse_order_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("invalid order id {raw}")))
}

fn payloads(state: &AppState, orders: &[Order]) -> Result<Vec<OrderPayload>, AppError> {
    orders
        .iter()
        .map(|order| build_payload(state, order).map_err(AppError::from))
        .collect()
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), AppError> {
    let Json(payload) = payload?;
    let phone = required(payload.phone_number, "phone_number")?;
    let total = payload
        .total
        .ok_or_else(|| AppError::BadRequest("'total' is required".to_string()))?;
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("'items' is required".to_string()));
    }

    let new_order = NewOrder {
        customer_phone: phone,
        total_amount: total,
        items: payload
            .items
            .into_iter()
            .map(|item| OrderItem {
                item_name: item.item_name,
                quantity: item.quantity,
                price_per_item: item.price_per_item,
            })
            .collect(),
    };

    let order = lifecycle::create_order(&state, new_order).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            message: "Order created successfully",
            order_id: order.order_id,
            order,
        }),
    ))
}

async fn customer_order_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<Vec<OrderPayload>>, AppError> {
    let phone = required(query.phone, "phone")?;
    if !state.customers.contains_key(&phone) {
        return Err(AppError::NotFound("user not found".to_string()));
    }

    let orders = state
        .orders
        .orders_where(|order| order.customer_phone == phone)
        .await;
    Ok(Json(payloads(&state, &orders)?))
}

async fn all_orders(State(state): State<Arc<AppState>>) -> Result<Json<Vec<OrderPayload>>, AppError> {
    let orders = state.orders.orders_where(|_| true).await;
    Ok(Json(payloads(&state, &orders)?))
}

/// Open orders nobody has picked up yet, oldest first.
async fn unassigned_orders(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<OrderPayload>>, AppError> {
    let mut orders = state
        .orders
        .orders_where(|order| {
            order.assigned_to.is_none()
                && !matches!(order.status, OrderStatus::Delivered | OrderStatus::Cancelled)
        })
        .await;
    orders.reverse();
    Ok(Json(payloads(&state, &orders)?))
}

async fn assigned_orders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<Vec<OrderPayload>>, AppError> {
    let phone = required(query.phone, "phone")?;
    if !state.partners.contains_key(&phone) {
        return Ok(Json(Vec::new()));
    }

    let orders = state
        .orders
        .orders_where(|order| {
            order.assigned_to.as_deref() == Some(phone.as_str()) && order.status.is_active()
        })
        .await;
    Ok(Json(payloads(&state, &orders)?))
}

async fn partner_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    let phone = required(query.phone, "phone")?;
    let partner = state
        .partners
        .get(&phone)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound("delivery partner not found".to_string()))?;

    let entries = state
        .orders
        .history_for_partner(&phone)
        .await
        .iter()
        .map(|(record, order)| {
            build_history_entry(&state, &partner, record, order).map_err(AppError::from)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(entries))
}

async fn order_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
) -> Result<Json<OrderPayload>, AppError> {
    let order_id = parse_order_id(&order_id)?;
    let order = state
        .orders
        .get(order_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

    Ok(Json(build_payload(&state, &order)?))
}

async fn update_order_status(
    State(state): State<Arc<AppState>>,
    Path(order_id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<UpdateStatusResponse>, AppError> {
    let order_id = parse_order_id(&order_id)?;
    let Json(payload) = payload?;
    let status = required(payload.status, "status")?;

    let order = lifecycle::transition(
        &state,
        order_id,
        &status,
        payload.phone_number.as_deref(),
    )
    .await?;

    Ok(Json(UpdateStatusResponse {
        success: true,
        order,
    }))
}
