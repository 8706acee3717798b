use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::package::Package;

/// A control word issued for one user and package tier.
///
/// Rows are append-only: a newer key supersedes older ones because lookups
/// always prefer the most recent row, but history is retained.
#[derive(Clone, Debug, Serialize)]
pub struct ControlWord {
    pub key_id: i64,
    /// 128-bit secret, hex encoded.
    pub key_value: String,
    pub created_at: DateTime<Utc>,
    /// `None` means the key never expires.
    pub valid_until: Option<DateTime<Utc>>,
    pub username: String,
    pub paket: Package,
}
