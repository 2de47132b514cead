use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountKind {
    Customer,
    Partner,
}

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub code: String,
    pub created_at: DateTime<Utc>,
}
