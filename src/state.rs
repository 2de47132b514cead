use std::sync::Arc;

use chrono::Duration;
use dashmap::DashMap;

use crate::auth::sms::SmsClient;
use crate::config::Config;
use crate::engine::gateway::BroadcastGateway;
use crate::models::customer::Customer;
use crate::models::otp::{AccountKind, OtpRecord};
use crate::models::partner::DeliveryPartner;
use crate::observability::metrics::Metrics;
use crate::store::OrderStore;

pub struct AppState {
    /// Customers keyed by phone number.
    pub customers: DashMap<String, Customer>,
    /// Delivery partners keyed by phone number.
    pub partners: DashMap<String, DeliveryPartner>,
    pub otps: DashMap<(AccountKind, String), OtpRecord>,
    pub orders: OrderStore,
    pub gateway: Arc<BroadcastGateway>,
    pub sms: SmsClient,
    pub otp_ttl: Duration,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        let metrics = Metrics::new();

        Self {
            customers: DashMap::new(),
            partners: DashMap::new(),
            otps: DashMap::new(),
            orders: OrderStore::new(),
            gateway: Arc::new(BroadcastGateway::new(
                config.session_buffer_size,
                metrics.clone(),
            )),
            sms: SmsClient::new(config.sms_base_url.clone(), config.sms_api_key.clone()),
            otp_ttl: Duration::seconds(config.otp_ttl_secs),
            metrics,
        }
    }
}
