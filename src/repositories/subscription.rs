use chrono::NaiveDate;
use rusqlite::{OptionalExtension, Row, params};

use crate::db::{self, Database};
use crate::error::Result;
use crate::models::package::Package;
use crate::models::subscription::Subscription;

const SUBSCRIPTION_COLUMNS: &str =
    "sub_id, username, paket, start_date, end_date, canceled_flag";

fn row_to_subscription(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let paket: String = row.get("paket")?;
    let start_date: String = row.get("start_date")?;
    let end_date: String = row.get("end_date")?;
    let canceled: i64 = row.get("canceled_flag")?;
    Ok(Subscription {
        sub_id: row.get("sub_id")?,
        username: row.get("username")?,
        paket: db::read_package(2, &paket)?,
        start_date: db::read_date(3, &start_date)?,
        end_date: db::read_date(4, &end_date)?,
        canceled: canceled != 0,
    })
}

/// Inserts a new entitlement window. Overlaps with existing rows are
/// expected and resolved at read time, never merged here.
pub async fn add_subscription(
    db: &Database,
    username: &str,
    paket: Package,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<()> {
    let conn = db.conn().await;
    conn.execute(
        r#"
        INSERT INTO subscriptions (username, paket, start_date, end_date)
        VALUES (?1, ?2, ?3, ?4)
        "#,
        params![
            username,
            paket.as_str(),
            db::format_date(start_date),
            db::format_date(end_date)
        ],
    )?;
    Ok(())
}

/// Returns every subscription still inside its paid period, longest
/// remaining validity first. Cancelled rows stay active until they expire.
pub async fn get_active_subscriptions(
    db: &Database,
    username: &str,
    today: NaiveDate,
) -> Result<Vec<Subscription>> {
    let conn = db.conn().await;
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {SUBSCRIPTION_COLUMNS}
        FROM subscriptions
        WHERE username = ?1
          AND date(end_date) >= date(?2)
        ORDER BY date(end_date) DESC
        "#
    ))?;
    let subscriptions = stmt
        .query_map(params![username, db::format_date(today)], row_to_subscription)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(subscriptions)
}

/// Flags every still-active, uncancelled subscription as cancelled.
/// End dates are untouched; the remaining paid period keeps running.
pub async fn cancel_subscription(db: &Database, username: &str, today: NaiveDate) -> Result<usize> {
    let conn = db.conn().await;
    let flagged = conn.execute(
        r#"
        UPDATE subscriptions
        SET canceled_flag = 1
        WHERE username = ?1
          AND canceled_flag = 0
          AND date(end_date) >= date(?2)
        "#,
        params![username, db::format_date(today)],
    )?;
    Ok(flagged)
}

/// Latest end date among still-valid windows for one (user, package) pair.
/// Basis for queueing a paid extension after the current period.
pub async fn latest_end_date(
    db: &Database,
    username: &str,
    paket: Package,
    today: NaiveDate,
) -> Result<Option<NaiveDate>> {
    let conn = db.conn().await;
    let end: Option<String> = conn
        .prepare(
            r#"
            SELECT end_date
            FROM subscriptions
            WHERE username = ?1
              AND paket = ?2
              AND date(end_date) >= date(?3)
            ORDER BY date(end_date) DESC
            LIMIT 1
            "#,
        )?
        .query_row(
            params![username, paket.as_str(), db::format_date(today)],
            |row| row.get(0),
        )
        .optional()?;
    end.map(|raw| db::read_date(0, &raw).map_err(Into::into)).transpose()
}
