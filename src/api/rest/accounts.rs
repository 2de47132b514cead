use serde::{Deserialize, Serialize};

use crate::auth::{self, VerifiedAccount};
use crate::error::AppError;
use crate::models::is_valid_phone;
use crate::models::otp::AccountKind;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct SendOtpRequest {
    pub phone_number: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub phone_number: Option<String>,
    pub name: Option<String>,
    pub otp: Option<String>,
}

#[derive(Deserialize)]
pub struct PhoneQuery {
    pub phone: Option<String>,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub account: VerifiedAccount,
}

/// Trimmed value of a required field; missing and blank are both rejected.
pub fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::BadRequest(format!("'{field}' is required")))
}

pub struct Registration {
    pub name: String,
    pub phone_number: String,
    pub address: String,
}

impl TryFrom<RegisterRequest> for Registration {
    type Error = AppError;

    fn try_from(request: RegisterRequest) -> Result<Self, Self::Error> {
        let registration = Registration {
            name: required(request.name, "name")?,
            phone_number: required(request.phone_number, "phone_number")?,
            address: required(request.address, "address")?,
        };
        if !is_valid_phone(&registration.phone_number) {
            return Err(AppError::BadRequest("invalid phone number".to_string()));
        }
        Ok(registration)
    }
}

pub fn send_otp(
    state: &AppState,
    kind: AccountKind,
    request: SendOtpRequest,
) -> Result<MessageResponse, AppError> {
    let phone = required(request.phone_number, "phone_number")?;
    let name = required(request.name, "name")?;
    auth::issue_otp(state, kind, &phone, &name)?;
    Ok(MessageResponse {
        message: "OTP sent successfully",
    })
}

pub fn verify_otp(
    state: &AppState,
    kind: AccountKind,
    request: VerifyOtpRequest,
) -> Result<LoginResponse, AppError> {
    let phone = required(request.phone_number, "phone_number")?;
    let name = required(request.name, "name")?;
    let code = required(request.otp, "otp")?;
    let account = auth::verify_otp(state, kind, &phone, &name, &code)?;
    Ok(LoginResponse {
        message: "OTP verified, login successful",
        account,
    })
}
