use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryPartner {
    pub id: Uuid,
    pub phone_number: String,
    pub name: String,
    pub address: String,
    pub is_online: bool,
}
