//! Thin wrappers around parameterized rusqlite calls.
//!
//! Every helper maps driver failures onto [`ApiError`] so handlers can use
//! `?` throughout. Lookups that find nothing fail with whatever error the
//! caller supplies, which is how a route picks its own 404 message (or any
//! other status) for a missing row.

use crate::errors::{ApiError, ApiResult};
use crate::DbPool;
use chrono::{SecondsFormat, Utc};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, Params, Row};

pub type DbConn = PooledConnection<SqliteConnectionManager>;

pub fn get_conn(pool: &DbPool) -> ApiResult<DbConn> {
    pool.get().map_err(ApiError::Pool)
}

/// Runs a query expected to return a single row.
pub fn fetch_one<T, P, F, E>(
    conn: &Connection,
    sql: &str,
    params: P,
    map_row: F,
    on_missing: E,
) -> ApiResult<T>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    E: FnOnce() -> ApiError,
{
    match conn.query_row(sql, params, map_row) {
        Ok(value) => Ok(value),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(on_missing()),
        Err(e) => Err(ApiError::Database(e)),
    }
}

pub fn fetch_optional<T, P, F>(conn: &Connection, sql: &str, params: P, map_row: F) -> ApiResult<Option<T>>
where
    P: Params,
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    Ok(conn.query_row(sql, params, map_row).optional()?)
}

pub fn fetch_all<T, P, F>(conn: &Connection, sql: &str, params: P, map_row: F) -> ApiResult<Vec<T>>
where
    P: Params,
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, map_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<T>>>()?)
}

/// Executes a statement and returns the number of affected rows.
pub fn execute<P: Params>(conn: &Connection, sql: &str, params: P) -> ApiResult<usize> {
    Ok(conn.execute(sql, params)?)
}

pub fn is_unique_violation(err: &ApiError) -> bool {
    match err {
        ApiError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
            e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

/// Timestamp format stored in every `*_at` column.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
