use crate::errors::{ApiError, ApiResult};
use crate::helper::query_helpers::{self, now_timestamp};
use crate::models::User;
use rusqlite::{params, Connection, Row};

const USER_COLUMNS: &str = "id, name, email, is_admin, is_active, permissions, created_at, last_login_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        is_admin: row.get(3)?,
        is_active: row.get(4)?,
        permissions: row.get(5)?,
        created_at: row.get(6)?,
        last_login_at: row.get(7)?,
    })
}

fn missing_name(name: &str) -> impl FnOnce() -> ApiError + '_ {
    move || ApiError::not_found(format!("No user found with name {}", name))
}

pub fn create_user(conn: &Connection, name: &str, email: &str, password_hash: &str) -> ApiResult<User> {
    query_helpers::fetch_one(
        conn,
        &format!(
            "INSERT INTO users (name, email, password_hash, created_at) VALUES (?1, ?2, ?3, ?4) RETURNING {}",
            USER_COLUMNS
        ),
        params![name, email, password_hash, now_timestamp()],
        user_from_row,
        || ApiError::Internal("INSERT INTO users returned no row".to_string()),
    )
}

pub fn read_all_users(conn: &Connection) -> ApiResult<Vec<User>> {
    query_helpers::fetch_all(
        conn,
        &format!("SELECT {} FROM users ORDER BY id", USER_COLUMNS),
        [],
        user_from_row,
    )
}

pub fn read_user_by_name(conn: &Connection, name: &str) -> ApiResult<User> {
    query_helpers::fetch_one(
        conn,
        &format!("SELECT {} FROM users WHERE name = ?1", USER_COLUMNS),
        [name],
        user_from_row,
        missing_name(name),
    )
}

pub fn read_user_by_id(conn: &Connection, id: i64) -> ApiResult<Option<User>> {
    query_helpers::fetch_optional(
        conn,
        &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
        [id],
        user_from_row,
    )
}

/// Returns the user together with the stored password hash.
pub fn read_credentials(conn: &Connection, name: &str) -> ApiResult<(User, String)> {
    query_helpers::fetch_one(
        conn,
        &format!("SELECT {}, password_hash FROM users WHERE name = ?1", USER_COLUMNS),
        [name],
        |row| Ok((user_from_row(row)?, row.get(8)?)),
        missing_name(name),
    )
}

/// True when either the name or the email is already registered.
pub fn name_or_email_taken(conn: &Connection, name: &str, email: &str) -> ApiResult<bool> {
    query_helpers::fetch_one(
        conn,
        "SELECT EXISTS(SELECT 1 FROM users WHERE name = ?1 OR email = ?2)",
        params![name, email],
        |row| row.get(0),
        || ApiError::Internal("EXISTS query returned no row".to_string()),
    )
}

pub fn email_taken(conn: &Connection, email: &str) -> ApiResult<bool> {
    query_helpers::fetch_one(
        conn,
        "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
        [email],
        |row| row.get(0),
        || ApiError::Internal("EXISTS query returned no row".to_string()),
    )
}

pub fn update_password_hash(conn: &Connection, user_id: i64, password_hash: &str) -> ApiResult<usize> {
    query_helpers::execute(
        conn,
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, user_id],
    )
}

pub fn update_email(conn: &Connection, user_id: i64, email: &str) -> ApiResult<usize> {
    query_helpers::execute(conn, "UPDATE users SET email = ?1 WHERE id = ?2", params![email, user_id])
}

/// `None` leaves a field unchanged. `Some(None)` clears `permissions`.
pub fn update_flags(
    conn: &Connection,
    user_id: i64,
    is_admin: Option<bool>,
    is_active: Option<bool>,
    permissions: Option<Option<&str>>,
) -> ApiResult<User> {
    query_helpers::fetch_one(
        conn,
        &format!(
            "UPDATE users SET is_admin = COALESCE(?1, is_admin), is_active = COALESCE(?2, is_active), permissions = CASE WHEN ?3 THEN ?4 ELSE permissions END WHERE id = ?5 RETURNING {}",
            USER_COLUMNS
        ),
        params![is_admin, is_active, permissions.is_some(), permissions.flatten(), user_id],
        user_from_row,
        || ApiError::not_found(format!("No user found with ID {}", user_id)),
    )
}

pub fn update_last_login_time(conn: &Connection, user_id: i64) -> ApiResult<()> {
    query_helpers::execute(
        conn,
        "UPDATE users SET last_login_at = ?1 WHERE id = ?2",
        params![now_timestamp(), user_id],
    )?;
    Ok(())
}

/// Profiles, posts and both kinds of comments go with the user through
/// `ON DELETE CASCADE`.
pub fn delete_user(conn: &Connection, user_id: i64) -> ApiResult<usize> {
    query_helpers::execute(conn, "DELETE FROM users WHERE id = ?1", [user_id])
}
