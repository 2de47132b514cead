pub mod sms;

use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::models::otp::{AccountKind, OtpRecord};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct VerifiedAccount {
    pub phone_number: String,
    pub name: String,
}

pub fn generate_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

fn account_matches(state: &AppState, kind: AccountKind, phone: &str, name: &str) -> bool {
    match kind {
        AccountKind::Customer => state
            .customers
            .get(phone)
            .is_some_and(|customer| customer.name == name),
        AccountKind::Partner => state
            .partners
            .get(phone)
            .is_some_and(|partner| partner.name == name),
    }
}

/// Stores a fresh code for the account, replacing any earlier one, then hands
/// it to the SMS provider. The record exists before sending starts.
pub fn issue_otp(
    state: &AppState,
    kind: AccountKind,
    phone: &str,
    name: &str,
) -> Result<(), AppError> {
    if !account_matches(state, kind, phone, name) {
        state
            .metrics
            .otp_requests_total
            .with_label_values(&["unknown_account"])
            .inc();
        return Err(AppError::NotFound(
            "user not found with given name and phone number".to_string(),
        ));
    }

    let code = generate_code();
    state.otps.insert(
        (kind, phone.to_string()),
        OtpRecord {
            code: code.clone(),
            created_at: Utc::now(),
        },
    );
    state
        .metrics
        .otp_requests_total
        .with_label_values(&["issued"])
        .inc();
    info!(phone = %phone, ?kind, "otp issued");

    state.sms.dispatch_otp(phone.to_string(), code);
    Ok(())
}

/// Checks `code` against the live record. A successful check consumes the
/// record, so the same code never verifies twice.
pub fn verify_otp(
    state: &AppState,
    kind: AccountKind,
    phone: &str,
    name: &str,
    code: &str,
) -> Result<VerifiedAccount, AppError> {
    let key = (kind, phone.to_string());
    let record = state
        .otps
        .get(&key)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| AppError::NotFound("otp not found".to_string()))?;

    if Utc::now() - record.created_at > state.otp_ttl {
        state
            .metrics
            .otp_requests_total
            .with_label_values(&["expired"])
            .inc();
        return Err(AppError::Expired("otp expired".to_string()));
    }

    if record.code != code.trim() {
        state
            .metrics
            .otp_requests_total
            .with_label_values(&["mismatch"])
            .inc();
        return Err(AppError::Unauthorized("invalid otp".to_string()));
    }

    if !account_matches(state, kind, phone, name) {
        return Err(AppError::NotFound(
            "user not found with given name and phone".to_string(),
        ));
    }

    // Two concurrent verifications race here; only one removes the record.
    state
        .otps
        .remove_if(&key, |_, live| live.code == record.code)
        .ok_or_else(|| AppError::NotFound("otp not found".to_string()))?;

    state
        .metrics
        .otp_requests_total
        .with_label_values(&["verified"])
        .inc();
    info!(phone = %phone, ?kind, "otp verified");

    Ok(VerifiedAccount {
        phone_number: phone.to_string(),
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{generate_code, issue_otp, verify_otp};
    use crate::config::Config;
    use crate::error::AppError;
    use crate::models::customer::Customer;
    use crate::models::otp::{AccountKind, OtpRecord};
    use crate::models::partner::DeliveryPartner;
    use crate::state::AppState;

    const PHONE: &str = "9876543210";

    fn state() -> AppState {
        let state = AppState::new(&Config::default());
        state.customers.insert(
            PHONE.to_string(),
            Customer {
                phone_number: PHONE.to_string(),
                name: "Asha".to_string(),
                address: "12 MG Road".to_string(),
            },
        );
        state
    }

    fn stored_code(state: &AppState, kind: AccountKind) -> String {
        state
            .otps
            .get(&(kind, PHONE.to_string()))
            .map(|entry| entry.code.clone())
            .unwrap()
    }

    #[test]
    fn codes_have_four_digits() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), 4);
            assert!(code.parse::<u32>().unwrap() >= 1000);
        }
    }

    #[tokio::test]
    async fn issue_requires_matching_name() {
        let state = state();
        let err = issue_otp(&state, AccountKind::Customer, PHONE, "Someone").unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(state.otps.is_empty());
    }

    #[tokio::test]
    async fn code_verifies_once() {
        let state = state();
        issue_otp(&state, AccountKind::Customer, PHONE, "Asha").unwrap();
        let code = stored_code(&state, AccountKind::Customer);

        let account = verify_otp(&state, AccountKind::Customer, PHONE, "Asha", &code).unwrap();
        assert_eq!(account.phone_number, PHONE);

        let err = verify_otp(&state, AccountKind::Customer, PHONE, "Asha", &code).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn wrong_code_is_unauthorized_and_keeps_record() {
        let state = state();
        issue_otp(&state, AccountKind::Customer, PHONE, "Asha").unwrap();
        let code = stored_code(&state, AccountKind::Customer);
        let wrong = if code == "1000" { "1001" } else { "1000" };

        let err = verify_otp(&state, AccountKind::Customer, PHONE, "Asha", wrong).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
        assert!(verify_otp(&state, AccountKind::Customer, PHONE, "Asha", &code).is_ok());
    }

    #[tokio::test]
    async fn wrong_name_does_not_consume_code() {
        let state = state();
        issue_otp(&state, AccountKind::Customer, PHONE, "Asha").unwrap();
        let code = stored_code(&state, AccountKind::Customer);

        let err = verify_otp(&state, AccountKind::Customer, PHONE, "Other", &code).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(verify_otp(&state, AccountKind::Customer, PHONE, "Asha", &code).is_ok());
    }

    #[test]
    fn stale_code_is_expired() {
        let state = state();
        state.otps.insert(
            (AccountKind::Customer, PHONE.to_string()),
            OtpRecord {
                code: "4821".to_string(),
                created_at: Utc::now() - Duration::minutes(6),
            },
        );

        let err = verify_otp(&state, AccountKind::Customer, PHONE, "Asha", "4821").unwrap_err();
        assert!(matches!(err, AppError::Expired(_)));
    }

    #[tokio::test]
    async fn customer_and_partner_codes_are_separate() {
        let state = state();
        state.partners.insert(
            PHONE.to_string(),
            DeliveryPartner {
                id: Uuid::new_v4(),
                phone_number: PHONE.to_string(),
                name: "Asha".to_string(),
                address: "Depot 4".to_string(),
                is_online: false,
            },
        );

        issue_otp(&state, AccountKind::Partner, PHONE, "Asha").unwrap();
        let code = stored_code(&state, AccountKind::Partner);

        let err = verify_otp(&state, AccountKind::Customer, PHONE, "Asha", &code).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(verify_otp(&state, AccountKind::Partner, PHONE, "Asha", &code).is_ok());
    }
}
