//! Control-word issuance and lookup.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use crate::crypto::signature;
use crate::db::Database;
use crate::error::Result;
use crate::models::package::Package;
use crate::models::subscription::Subscription;
use crate::repositories::key as key_repo;

/// The most recently created, not-yet-expired control word for a user.
pub async fn valid_key_for(db: &Database, username: &str, now: DateTime<Utc>) -> Result<Option<String>> {
    let keys = key_repo::get_valid_keys(db, Some(username), None, now).await?;
    Ok(keys.into_iter().next().map(|key| key.key_value))
}

/// Mints and persists a fresh 128-bit control word.
///
/// Prior keys are left untouched: lookups prefer the newest row, so the new
/// key supersedes without invalidating history. An old, still-unexpired key
/// therefore stays usable until its own window closes.
pub async fn issue_key(
    db: &Database,
    username: &str,
    paket: Package,
    valid_until: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<String> {
    let value = signature::generate_control_word();
    key_repo::store_key(db, &value, now, valid_until, username, paket).await?;
    Ok(value)
}

/// Validity window for a new key: the entitlement's inclusive end date, so
/// keys never outlive the subscription. The one-hour fallback only applies
/// when no subscription detail is available, which an entitlement-checked
/// caller should never hit.
pub fn validity_window(subscription: Option<&Subscription>, now: DateTime<Utc>) -> DateTime<Utc> {
    match subscription {
        Some(sub) => end_of_day(sub.end_date),
        None => now + chrono::Duration::hours(1),
    }
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| date.and_time(NaiveTime::MIN))
        .and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn instant(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).expect("valid RFC 3339").with_timezone(&Utc)
    }

    #[tokio::test]
    async fn test_issue_then_lookup_returns_the_issued_value() {
        let db = Database::open_in_memory().expect("in-memory database");
        let now = instant("2026-08-06T12:00:00Z");

        assert!(valid_key_for(&db, "alice", now).await.expect("lookup").is_none());

        let issued = issue_key(&db, "alice", Package::Basis, Some(now + Duration::hours(1)), now)
            .await
            .expect("issue");
        let found = valid_key_for(&db, "alice", now).await.expect("lookup").expect("present");
        assert_eq!(found, issued);
    }

    #[tokio::test]
    async fn test_second_issue_supersedes_the_first() {
        let db = Database::open_in_memory().expect("in-memory database");
        let now = instant("2026-08-06T12:00:00Z");

        let first = issue_key(&db, "alice", Package::Basis, Some(now + Duration::hours(2)), now)
            .await
            .expect("first");
        let second = issue_key(
            &db,
            "alice",
            Package::Basis,
            Some(now + Duration::hours(2)),
            now + Duration::seconds(1),
        )
        .await
        .expect("second");

        let found = valid_key_for(&db, "alice", now + Duration::seconds(2))
            .await
            .expect("lookup")
            .expect("present");
        assert_eq!(found, second);
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_expired_key_is_not_returned() {
        let db = Database::open_in_memory().expect("in-memory database");
        let now = instant("2026-08-06T12:00:00Z");

        issue_key(&db, "alice", Package::Basis, Some(now + Duration::hours(1)), now)
            .await
            .expect("issue");
        assert!(
            valid_key_for(&db, "alice", now + Duration::hours(2))
                .await
                .expect("lookup")
                .is_none()
        );
    }

    #[test]
    fn test_validity_window_reuses_the_subscription_boundary() {
        let now = instant("2026-08-06T12:00:00Z");
        let sub = Subscription {
            sub_id: 1,
            username: "alice".to_string(),
            paket: Package::Basis,
            start_date: "2026-08-01".parse().expect("date"),
            end_date: "2026-09-05".parse().expect("date"),
            canceled: false,
        };

        let window = validity_window(Some(&sub), now);
        assert_eq!(window, instant("2026-09-05T23:59:59Z"));

        // Defensive fallback when the entitlement detail is missing.
        assert_eq!(validity_window(None, now), now + Duration::hours(1));
    }
}
