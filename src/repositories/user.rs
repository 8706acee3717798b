use rusqlite::{OptionalExtension, Row, params, params_from_iter};

use crate::db::{self, Database};
use crate::error::Result;
use crate::models::package::Package;
use crate::models::user::User;

const USER_COLUMNS: &str = "username, password, hwid, paket, token, email";

/// A helper function to map a row to a `User`.
fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let paket: String = row.get("paket")?;
    Ok(User {
        username: row.get("username")?,
        password: row.get("password")?,
        hwid: row.get("hwid")?,
        paket: db::read_package(3, &paket)?,
        token: row.get("token")?,
        email: row.get("email")?,
    })
}

/// Inserts a user, replacing every field if the username already exists.
/// Idempotent; never fails on a duplicate.
pub async fn add_user(
    db: &Database,
    username: &str,
    password: &str,
    hwid: &str,
    paket: Package,
    token: &str,
    email: &str,
) -> Result<()> {
    let conn = db.conn().await;
    conn.execute(
        r#"
        INSERT OR REPLACE INTO users (username, password, hwid, paket, token, email)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![username, password, hwid, paket.as_str(), token, email],
    )?;
    Ok(())
}

/// Best-effort deletion; absent users are not an error.
pub async fn delete_user(db: &Database, username: &str) -> Result<()> {
    let conn = db.conn().await;
    conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
    Ok(())
}

/// Best-effort deletion keyed by bearer token.
pub async fn delete_user_by_token(db: &Database, token: &str) -> Result<()> {
    let conn = db.conn().await;
    conn.execute("DELETE FROM users WHERE token = ?1", params![token])?;
    Ok(())
}

/// Finds a user by username.
pub async fn get_user_by_username(db: &Database, username: &str) -> Result<Option<User>> {
    let conn = db.conn().await;
    let user = conn
        .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"))?
        .query_row(params![username], row_to_user)
        .optional()?;
    Ok(user)
}

/// Finds a user by bearer token.
pub async fn get_user_by_token(db: &Database, token: &str) -> Result<Option<User>> {
    let conn = db.conn().await;
    let user = conn
        .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE token = ?1"))?
        .query_row(params![token], row_to_user)
        .optional()?;
    Ok(user)
}

/// Finds a user by hardware identifier.
pub async fn get_user_by_hwid(db: &Database, hwid: &str) -> Result<Option<User>> {
    let conn = db.conn().await;
    let user = conn
        .prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE hwid = ?1"))?
        .query_row(params![hwid], row_to_user)
        .optional()?;
    Ok(user)
}

/// Lists users matching the admin filters. The substring filters are
/// case-sensitive `LIKE` matches.
pub async fn list_users(
    db: &Database,
    paket: Option<Package>,
    hwid_filter: &str,
    token_filter: &str,
) -> Result<Vec<User>> {
    let mut query = format!("SELECT {USER_COLUMNS} FROM users WHERE 1=1");
    let mut values: Vec<String> = Vec::new();

    if let Some(paket) = paket {
        query.push_str(" AND paket = ?");
        values.push(paket.as_str().to_string());
    }
    if !hwid_filter.is_empty() {
        query.push_str(" AND hwid LIKE ?");
        values.push(format!("%{hwid_filter}%"));
    }
    if !token_filter.is_empty() {
        query.push_str(" AND token LIKE ?");
        values.push(format!("%{token_filter}%"));
    }
    query.push_str(" ORDER BY username");

    let conn = db.conn().await;
    let mut stmt = conn.prepare(&query)?;
    let users = stmt
        .query_map(params_from_iter(values), row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Returns every user record. Used by the rotation scheduler.
pub async fn get_all_users(db: &Database) -> Result<Vec<User>> {
    let conn = db.conn().await;
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY username"))?;
    let users = stmt
        .query_map([], row_to_user)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

/// Updates the mutable profile fields of an existing user.
pub async fn update_user_details(
    db: &Database,
    username: &str,
    paket: Package,
    hwid: &str,
    email: &str,
) -> Result<()> {
    let conn = db.conn().await;
    conn.execute(
        "UPDATE users SET paket = ?1, hwid = ?2, email = ?3 WHERE username = ?4",
        params![paket.as_str(), hwid, email, username],
    )?;
    Ok(())
}

/// Refreshes the informational best-package cache.
pub async fn update_user_package(db: &Database, username: &str, paket: Package) -> Result<()> {
    let conn = db.conn().await;
    conn.execute(
        "UPDATE users SET paket = ?1 WHERE username = ?2",
        params![paket.as_str(), username],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded_db() -> Database {
        let db = Database::open_in_memory().expect("in-memory database");
        add_user(&db, "alice", "", "HW1", Package::Basis, "T1", "a@example.com")
            .await
            .expect("add alice");
        add_user(&db, "bob", "", "HW2", Package::Premium, "T2", "")
            .await
            .expect("add bob");
        db
    }

    #[tokio::test]
    async fn test_add_user_is_an_upsert() {
        let db = seeded_db().await;
        add_user(&db, "alice", "", "HW9", Package::Premium, "T9", "")
            .await
            .expect("replace alice");

        let alice = get_user_by_username(&db, "alice")
            .await
            .expect("query")
            .expect("alice exists");
        assert_eq!(alice.hwid, "HW9");
        assert_eq!(alice.paket, Package::Premium);
        assert_eq!(alice.token, "T9");
        assert!(get_user_by_token(&db, "T1").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_lookup_by_token_and_hwid() {
        let db = seeded_db().await;
        assert_eq!(
            get_user_by_token(&db, "T2").await.expect("query").expect("bob").username,
            "bob"
        );
        assert_eq!(
            get_user_by_hwid(&db, "HW1").await.expect("query").expect("alice").username,
            "alice"
        );
        assert!(get_user_by_token(&db, "nope").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_delete_by_token_is_best_effort() {
        let db = seeded_db().await;
        delete_user_by_token(&db, "T2").await.expect("delete bob");
        delete_user_by_token(&db, "T2").await.expect("second delete is a no-op");
        assert!(get_user_by_username(&db, "bob").await.expect("query").is_none());
    }

    #[tokio::test]
    async fn test_list_users_filters_are_case_sensitive() {
        let db = seeded_db().await;

        let premium = list_users(&db, Some(Package::Premium), "", "").await.expect("list");
        assert_eq!(premium.len(), 1);
        assert_eq!(premium[0].username, "bob");

        let by_hwid = list_users(&db, None, "HW", "").await.expect("list");
        assert_eq!(by_hwid.len(), 2);

        let wrong_case = list_users(&db, None, "hw", "").await.expect("list");
        assert!(wrong_case.is_empty());
    }
}
