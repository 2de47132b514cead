use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("sms sending is disabled: no api key configured")]
    Disabled,

    #[error("sms request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Client for the OTP SMS provider. The provider's answer is logged and never
/// interpreted.
#[derive(Clone)]
pub struct SmsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SmsClient {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn otp_url(&self, phone: &str, code: &str) -> Option<String> {
        self.api_key
            .as_ref()
            .map(|key| format!("{}/API/V1/{key}/SMS/{phone}/{code}", self.base_url))
    }

    /// Sends `code` to `phone` and returns the provider's raw response body.
    pub async fn send_otp(&self, phone: &str, code: &str) -> Result<String, SmsError> {
        let url = self.otp_url(phone, code).ok_or(SmsError::Disabled)?;
        let body = self.http.get(url).send().await?.text().await?;
        Ok(body)
    }

    /// Fire-and-forget variant used by request handlers.
    pub fn dispatch_otp(&self, phone: String, code: String) {
        if !self.is_enabled() {
            info!(phone = %phone, "sms disabled; otp not sent");
            return;
        }

        let client = self.clone();
        tokio::spawn(async move {
            match client.send_otp(&phone, &code).await {
                Ok(body) => info!(phone = %phone, response = %body, "otp sms sent"),
                Err(err) => warn!(phone = %phone, error = %err, "otp sms failed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::{SmsClient, SmsError};

    #[test]
    fn url_embeds_key_phone_and_code() {
        let client = SmsClient::new("https://sms.example/".to_string(), Some("k3y".to_string()));
        assert_eq!(
            client.otp_url("9876543210", "4821").as_deref(),
            Some("https://sms.example/API/V1/k3y/SMS/9876543210/4821")
        );
    }

    #[tokio::test]
    async fn send_returns_provider_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/API/V1/k3y/SMS/9876543210/4821");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"Status":"Success","Details":"abc"}"#);
        });

        let client = SmsClient::new(server.base_url(), Some("k3y".to_string()));
        let body = client.send_otp("9876543210", "4821").await.unwrap();

        mock.assert();
        assert!(body.contains("Success"));
    }

    #[tokio::test]
    async fn provider_errors_are_not_interpreted() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/API/V1/k3y/SMS/9876543210/4821");
            then.status(400).body(r#"{"Status":"Error"}"#);
        });

        let client = SmsClient::new(server.base_url(), Some("k3y".to_string()));
        let body = client.send_otp("9876543210", "4821").await.unwrap();

        mock.assert();
        assert!(body.contains("Error"));
    }

    #[tokio::test]
    async fn disabled_client_refuses_to_send() {
        let client = SmsClient::new("https://sms.example".to_string(), None);
        assert!(!client.is_enabled());
        assert!(matches!(
            client.send_otp("9876543210", "4821").await,
            Err(SmsError::Disabled)
        ));
    }
}
