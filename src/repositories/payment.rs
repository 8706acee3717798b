use chrono::{DateTime, Utc};
use rusqlite::{Row, params};

use crate::db::{self, Database};
use crate::error::Result;
use crate::models::payment::Payment;

fn row_to_payment(row: &Row<'_>) -> rusqlite::Result<Payment> {
    let timestamp: String = row.get("timestamp")?;
    Ok(Payment {
        payment_id: row.get("payment_id")?,
        username: row.get("username")?,
        amount: row.get("amount")?,
        currency: row.get("currency")?,
        status: row.get("status")?,
        timestamp: db::read_datetime(5, &timestamp)?,
    })
}

/// Records one payment and returns its identifier.
pub async fn add_payment(
    db: &Database,
    username: &str,
    amount: f64,
    currency: &str,
    status: &str,
    timestamp: DateTime<Utc>,
) -> Result<i64> {
    let conn = db.conn().await;
    conn.execute(
        r#"
        INSERT INTO payments (username, amount, currency, status, timestamp)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![username, amount, currency, status, db::format_datetime(timestamp)],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Payment history for one user, newest first.
pub async fn get_payments_by_user(db: &Database, username: &str) -> Result<Vec<Payment>> {
    let conn = db.conn().await;
    let mut stmt = conn.prepare(
        r#"
        SELECT payment_id, username, amount, currency, status, timestamp
        FROM payments
        WHERE username = ?1
        ORDER BY datetime(timestamp) DESC, payment_id DESC
        "#,
    )?;
    let payments = stmt
        .query_map(params![username], row_to_payment)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(payments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_payment_history_is_newest_first() {
        let db = Database::open_in_memory().expect("in-memory database");
        let now = DateTime::parse_from_rfc3339("2026-08-06T12:00:00Z")
            .expect("valid RFC 3339")
            .with_timezone(&Utc);

        add_payment(&db, "alice", 10.0, "EUR", "completed", now - Duration::days(30))
            .await
            .expect("older");
        add_payment(&db, "alice", 55.0, "EUR", "completed", now).await.expect("newer");
        add_payment(&db, "bob", 20.0, "EUR", "pending", now).await.expect("other user");

        let history = get_payments_by_user(&db, "alice").await.expect("query");
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].amount, 55.0);
        assert_eq!(history[1].amount, 10.0);
    }
}
