use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use dashmap::mapref::entry::Entry;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::accounts::{
    self, required, LoginResponse, MessageResponse, PhoneQuery, RegisterRequest, Registration,
    SendOtpRequest, VerifyOtpRequest,
};
use crate::error::AppError;
use crate::models::otp::AccountKind;
use crate::models::partner::DeliveryPartner;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register-partner", post(register_partner))
        .route("/send-otp-partner", post(send_otp))
        .route("/verify-otp-partner", post(verify_otp))
        .route("/get-partner-profile", get(get_profile))
        .route("/delivery-partner/update-profile", post(update_profile))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub phone_number: Option<String>,
    pub name: Option<String>,
    pub is_online: Option<bool>,
}

async fn register_partner(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    let registration = Registration::try_from(payload)?;

    match state.partners.entry(registration.phone_number.clone()) {
        Entry::Occupied(_) => Err(AppError::Conflict(
            "phone number already registered".to_string(),
        )),
        Entry::Vacant(slot) => {
            slot.insert(DeliveryPartner {
                id: Uuid::new_v4(),
                phone_number: registration.phone_number.clone(),
                name: registration.name,
                address: registration.address,
                is_online: false,
            });
            info!(phone = %registration.phone_number, "delivery partner registered");
            Ok(Json(MessageResponse {
                message: "Delivery partner registered successfully",
            }))
        }
    }
}

async fn send_otp(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    accounts::send_otp(&state, AccountKind::Partner, payload).map(Json)
}

async fn verify_otp(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(payload) = payload?;
    accounts::verify_otp(&state, AccountKind::Partner, payload).map(Json)
}

async fn get_profile(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PhoneQuery>,
) -> Result<Json<DeliveryPartner>, AppError> {
    let phone = required(query.phone, "phone")?;
    state
        .partners
        .get(&phone)
        .map(|partner| Json(partner.value().clone()))
        .ok_or_else(|| AppError::NotFound("delivery partner not found".to_string()))
}

async fn update_profile(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    let phone = required(payload.phone_number, "phone_number")?;

    let mut partner = state
        .partners
        .get_mut(&phone)
        .ok_or_else(|| AppError::NotFound("delivery partner not found".to_string()))?;

    if let Some(name) = payload.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) {
        partner.name = name;
    }
    if let Some(is_online) = payload.is_online {
        partner.is_online = is_online;
    }

    Ok(Json(MessageResponse {
        message: "Profile updated successfully",
    }))
}
