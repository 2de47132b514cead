use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub session_buffer_size: usize,
    pub otp_ttl_secs: i64,
    pub sms_base_url: String,
    /// SMS sending is disabled when no key is configured.
    pub sms_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 8000,
            log_level: "info".to_string(),
            session_buffer_size: 256,
            otp_ttl_secs: 300,
            sms_base_url: "https://2factor.in".to_string(),
            sms_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            session_buffer_size: parse_or_default(
                "SESSION_BUFFER_SIZE",
                defaults.session_buffer_size,
            )?,
            otp_ttl_secs: parse_or_default("OTP_TTL_SECS", defaults.otp_ttl_secs)?,
            sms_base_url: env::var("SMS_BASE_URL").unwrap_or(defaults.sms_base_url),
            sms_api_key: env::var("SMS_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
