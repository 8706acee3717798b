use chrono::NaiveDate;
use serde::Serialize;

use crate::models::package::Package;

/// One entitlement window granting a package to a user.
///
/// Overlapping rows per user are expected and resolved by tier priority at
/// read time; rows are never merged or deduplicated on insert.
#[derive(Clone, Debug, Serialize)]
pub struct Subscription {
    pub sub_id: i64,
    pub username: String,
    pub paket: Package,
    pub start_date: NaiveDate,
    /// Inclusive validity boundary.
    pub end_date: NaiveDate,
    /// Cancellation stops renewal; the end date stays authoritative.
    pub canceled: bool,
}
