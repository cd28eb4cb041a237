use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::{optional_timestamp_column, timestamp_column, uuid_column};
use crate::db::DatabaseError;
use crate::models::User;

const USER_COLUMNS: &str =
    "id, name, email, password_hash, failed_attempts, locked_until, last_login, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        failed_attempts: row.get(4)?,
        locked_until: optional_timestamp_column(row, 5)?,
        last_login: optional_timestamp_column(row, 6)?,
        created_at: timestamp_column(row, 7)?,
    })
}

/// Insert a new user. A duplicate email surfaces as `ConstraintViolation`.
pub fn insert_user(conn: &Connection, user: &User) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO users (id, name, email, password_hash, failed_attempts, locked_until, last_login, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id.to_string(),
            user.name,
            user.email,
            user.password_hash,
            user.failed_attempts,
            user.locked_until.map(|t| t.to_rfc3339()),
            user.last_login.map(|t| t.to_rfc3339()),
            user.created_at.to_rfc3339(),
        ],
    )
    .map_err(DatabaseError::from_write)?;
    Ok(())
}

pub fn get_user(conn: &Connection, id: &Uuid) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let user = conn
        .query_row(&sql, params![id.to_string()], user_from_row)
        .optional()?;
    Ok(user)
}

/// Emails are stored normalized; callers pass the normalized form.
pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    let user = conn
        .query_row(&sql, params![email], user_from_row)
        .optional()?;
    Ok(user)
}

/// Mirror the in-memory attempt counter into the user row.
pub fn record_login_failure(
    conn: &Connection,
    id: &Uuid,
    failed_attempts: u32,
    locked_until: Option<DateTime<Utc>>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET failed_attempts = ?2, locked_until = ?3 WHERE id = ?1",
        params![
            id.to_string(),
            failed_attempts,
            locked_until.map(|t| t.to_rfc3339()),
        ],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("user", id));
    }
    Ok(())
}

/// Reset counters and stamp the login time.
pub fn record_login_success(
    conn: &Connection,
    id: &Uuid,
    at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE users SET failed_attempts = 0, locked_until = NULL, last_login = ?2 WHERE id = ?1",
        params![id.to_string(), at.to_rfc3339()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::not_found("user", id));
    }
    Ok(())
}
