use chrono::{DateTime, Utc};
use rusqlite::{Row, params, params_from_iter};

use crate::db::{self, Database};
use crate::error::Result;
use crate::models::key::ControlWord;
use crate::models::package::Package;

const KEY_COLUMNS: &str = "key_id, key_value, created_at, valid_until, username, paket";

fn row_to_key(row: &Row<'_>) -> rusqlite::Result<ControlWord> {
    let created_at: String = row.get("created_at")?;
    let valid_until: Option<String> = row.get("valid_until")?;
    let paket: String = row.get("paket")?;
    Ok(ControlWord {
        key_id: row.get("key_id")?,
        key_value: row.get("key_value")?,
        created_at: db::read_datetime(2, &created_at)?,
        valid_until: valid_until.map(|raw| db::read_datetime(3, &raw)).transpose()?,
        username: row.get("username")?,
        paket: db::read_package(5, &paket)?,
    })
}

/// Appends a control word. Prior rows are never touched; issuance is
/// monotonic and "most recent wins" at lookup time.
pub async fn store_key(
    db: &Database,
    value: &str,
    created_at: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
    username: &str,
    paket: Package,
) -> Result<i64> {
    let conn = db.conn().await;
    conn.execute(
        r#"
        INSERT INTO keys (key_value, created_at, valid_until, username, paket)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        params![
            value,
            db::format_datetime(created_at),
            valid_until.map(db::format_datetime),
            username,
            paket.as_str()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Returns the not-yet-expired keys matching the filters, most recent
/// first. A NULL `valid_until` never expires.
pub async fn get_valid_keys(
    db: &Database,
    username: Option<&str>,
    paket: Option<Package>,
    now: DateTime<Utc>,
) -> Result<Vec<ControlWord>> {
    let mut query = format!(
        "SELECT {KEY_COLUMNS} FROM keys \
         WHERE (valid_until IS NULL OR datetime(valid_until) > datetime(?))"
    );
    let mut values: Vec<String> = vec![db::format_datetime(now)];

    if let Some(username) = username {
        query.push_str(" AND username = ?");
        values.push(username.to_string());
    }
    if let Some(paket) = paket {
        query.push_str(" AND paket = ?");
        values.push(paket.as_str().to_string());
    }
    // key_id breaks ties between keys minted within the same second.
    query.push_str(" ORDER BY datetime(created_at) DESC, key_id DESC");

    let conn = db.conn().await;
    let mut stmt = conn.prepare(&query)?;
    let keys = stmt
        .query_map(params_from_iter(values), row_to_key)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}

/// Most recently minted keys regardless of validity. Admin history view.
pub async fn get_recent_keys(db: &Database, limit: u32) -> Result<Vec<ControlWord>> {
    let conn = db.conn().await;
    let mut stmt = conn.prepare(&format!(
        "SELECT {KEY_COLUMNS} FROM keys \
         ORDER BY datetime(created_at) DESC, key_id DESC LIMIT ?1"
    ))?;
    let keys = stmt
        .query_map(params![limit], row_to_key)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(keys)
}
