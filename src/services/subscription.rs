//! Resolves a user's entitlements from overlapping subscription windows.

use chrono::{Duration, NaiveDate};

use crate::db::Database;
use crate::error::Result;
use crate::models::package::Package;
use crate::models::subscription::Subscription;
use crate::repositories::subscription as subscription_repo;

/// Paid billing cycles offered for every tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BillingCycle {
    OneMonth,
    SixMonths,
    TwelveMonths,
}

impl BillingCycle {
    /// Parses the wire labels `1m`, `6m`, `12m`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "1m" => Some(Self::OneMonth),
            "6m" => Some(Self::SixMonths),
            "12m" => Some(Self::TwelveMonths),
            _ => None,
        }
    }

    /// Entitlement days bought by this cycle.
    pub fn days(self) -> i64 {
        match self {
            Self::OneMonth => 30,
            Self::SixMonths => 180,
            Self::TwelveMonths => 365,
        }
    }

    /// List price in Euro for one tier.
    pub fn price_eur(self, paket: Package) -> f64 {
        match (paket, self) {
            (Package::Basis, Self::OneMonth) => 10.0,
            (Package::Basis, Self::SixMonths) => 55.0,
            (Package::Basis, Self::TwelveMonths) => 100.0,
            (Package::BasisPlus, Self::OneMonth) => 15.0,
            (Package::BasisPlus, Self::SixMonths) => 80.0,
            (Package::BasisPlus, Self::TwelveMonths) => 150.0,
            (Package::Premium, Self::OneMonth) => 20.0,
            (Package::Premium, Self::SixMonths) => 110.0,
            (Package::Premium, Self::TwelveMonths) => 210.0,
        }
    }
}

/// Picks the highest-priority subscription from an already-ordered active
/// set. Rank ties resolve to the first row, which the store ordering
/// guarantees is the one with the longest remaining validity.
pub fn best_of(subscriptions: &[Subscription]) -> Option<&Subscription> {
    let mut best: Option<&Subscription> = None;
    for sub in subscriptions {
        if best.is_none_or(|b| sub.paket.rank() > b.paket.rank()) {
            best = Some(sub);
        }
    }
    best
}

/// True iff the user holds at least one subscription inside its paid period.
pub async fn has_active_subscription(db: &Database, username: &str, today: NaiveDate) -> Result<bool> {
    let subscriptions = subscription_repo::get_active_subscriptions(db, username, today).await?;
    Ok(!subscriptions.is_empty())
}

/// The user's active subscription with the highest tier, if any.
pub async fn best_active_subscription(
    db: &Database,
    username: &str,
    today: NaiveDate,
) -> Result<Option<Subscription>> {
    let subscriptions = subscription_repo::get_active_subscriptions(db, username, today).await?;
    Ok(best_of(&subscriptions).cloned())
}

/// The user's best active package, or `None` for "no active package".
pub async fn best_active_package(
    db: &Database,
    username: &str,
    today: NaiveDate,
) -> Result<Option<Package>> {
    Ok(best_active_subscription(db, username, today).await?.map(|sub| sub.paket))
}

/// Whole days of validity left; never negative.
pub fn remaining_days(end_date: NaiveDate, today: NaiveDate) -> i64 {
    (end_date - today).num_days().max(0)
}

/// Books or extends an entitlement window for one package.
///
/// An extension bought while a window for the same package is still running
/// queues after the current end date; otherwise it starts today. Returns
/// the new window.
pub async fn extend_subscription(
    db: &Database,
    username: &str,
    paket: Package,
    days: i64,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let start = match subscription_repo::latest_end_date(db, username, paket, today).await? {
        Some(end) => end + Duration::days(1),
        None => today,
    };
    let end = start + Duration::days(days);
    subscription_repo::add_subscription(db, username, paket, start, end).await?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(s: &str) -> NaiveDate {
        s.parse().expect("valid date")
    }

    async fn db() -> Database {
        Database::open_in_memory().expect("in-memory database")
    }

    #[tokio::test]
    async fn test_best_package_prefers_rank_over_duration() {
        let db = db().await;
        let today = day("2026-08-06");

        // A long-running Basis window and a shorter Premium upgrade.
        subscription_repo::add_subscription(&db, "alice", Package::Basis, today, today + Duration::days(300))
            .await
            .expect("basis");
        subscription_repo::add_subscription(&db, "alice", Package::Premium, today, today + Duration::days(30))
            .await
            .expect("premium");

        assert_eq!(
            best_active_package(&db, "alice", today).await.expect("resolve"),
            Some(Package::Premium)
        );
    }

    #[tokio::test]
    async fn test_no_active_rows_yields_the_none_sentinel() {
        let db = db().await;
        let today = day("2026-08-06");

        subscription_repo::add_subscription(&db, "alice", Package::Premium, today - Duration::days(60), today - Duration::days(1))
            .await
            .expect("expired");

        assert_eq!(best_active_package(&db, "alice", today).await.expect("resolve"), None);
        assert!(!has_active_subscription(&db, "alice", today).await.expect("resolve"));
    }

    #[tokio::test]
    async fn test_rank_tie_takes_longest_remaining_window() {
        let db = db().await;
        let today = day("2026-08-06");

        subscription_repo::add_subscription(&db, "alice", Package::Basis, today, today + Duration::days(10))
            .await
            .expect("short");
        subscription_repo::add_subscription(&db, "alice", Package::Basis, today, today + Duration::days(40))
            .await
            .expect("long");

        let best = best_active_subscription(&db, "alice", today)
            .await
            .expect("resolve")
            .expect("active");
        assert_eq!(best.end_date, today + Duration::days(40));
    }

    #[test]
    fn test_remaining_days_is_never_negative() {
        let today = day("2026-08-06");
        assert_eq!(remaining_days(today + Duration::days(30), today), 30);
        assert_eq!(remaining_days(today, today), 0);
        assert_eq!(remaining_days(today - Duration::days(5), today), 0);
    }

    #[tokio::test]
    async fn test_extension_queues_after_running_window() {
        let db = db().await;
        let today = day("2026-08-06");

        let (start, end) = extend_subscription(&db, "alice", Package::Basis, 30, today)
            .await
            .expect("first booking");
        assert_eq!(start, today);
        assert_eq!(end, today + Duration::days(30));

        let (start2, end2) = extend_subscription(&db, "alice", Package::Basis, 30, today)
            .await
            .expect("renewal");
        assert_eq!(start2, end + Duration::days(1));
        assert_eq!(end2, start2 + Duration::days(30));

        // A different tier starts its own window immediately.
        let (start3, _) = extend_subscription(&db, "alice", Package::Premium, 30, today)
            .await
            .expect("upgrade");
        assert_eq!(start3, today);
    }

    #[test]
    fn test_billing_cycles() {
        assert_eq!(BillingCycle::parse("6m"), Some(BillingCycle::SixMonths));
        assert_eq!(BillingCycle::parse("2w"), None);
        assert_eq!(BillingCycle::TwelveMonths.days(), 365);
        assert_eq!(BillingCycle::SixMonths.price_eur(Package::Premium), 110.0);
    }
}
