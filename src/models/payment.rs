use chrono::{DateTime, Utc};
use serde::Serialize;

/// A recorded payment driving a subscription extension.
#[derive(Clone, Debug, Serialize)]
pub struct Payment {
    pub payment_id: i64,
    pub username: String,
    pub amount: f64,
    pub currency: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}
