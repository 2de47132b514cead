use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use tracing::info;

use crate::api::rest::accounts::{
    self, required, LoginResponse, MessageResponse, PhoneQuery, RegisterRequest, Registration,
    SendOtpRequest, VerifyOtpRequest,
};
use crate::error::AppError;
use crate::models::customer::Customer;
use crate::models::otp::AccountKind;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register_customer))
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/get-user-profile", get(get_profile))
        .route("/update-user-profile", post(update_profile))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

async fn register_customer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    let registration = Registration::try_from(payload)?;

    match state.customers.entry(registration.phone_number.clone()) {
        Entry::Occupied(_) => Err(AppError::Conflict("user already exists".to_string())),
        Entry::Vacant(slot) => {
            slot.insert(Customer {
                phone_number: registration.phone_number.clone(),
                name: registration.name,
                address: registration.address,
            });
            info!(phone = %registration.phone_number, "customer registered");
            Ok(Json(MessageResponse {
                message: "User registered successfully",
            }))
        }
    }
}

async fn send_otp(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    accounts::send_otp(&state, AccountKind::Customer, payload).map(Json)
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    accounts::verify_otp(&state, AccountKind::Customer, payload).map(Json)
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<Customer>, AppError> {
    let phone = required(query.phone, "phone")?;
    state
        .customers
        .get(&phone)
        .map(|customer| Json(customer.value().clone()))
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    let phone = required(payload.phone_number, "phone_number")?;
    let address = required(payload.address, "address")?;

    let mut customer = state
        .customers
        .get_mut(&phone)
        .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
    customer.address = address;

    Ok(Json(MessageResponse {
        message: "Address updated successfully",
    }))
}
