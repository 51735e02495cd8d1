use crate::errors::{ApiError, ApiResult};
use crate::helper::query_helpers::{self, now_timestamp};
use crate::models::{Profile, ProfileFields};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const PROFILE_COLUMNS: &str =
    "id, user_id, display_name, bio, about, profile_picture_url, created_at, edited_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: row.get(0)?,
        user_id: row.get(1)?,
        display_name: row.get(2)?,
        bio: row.get(3)?,
        about: row.get(4)?,
        profile_picture_url: row.get(5)?,
        created_at: row.get(6)?,
        edited_at: row.get(7)?,
    })
}

pub fn create_profile(
    conn: &Connection,
    user_id: i64,
    display_name: &str,
    fields: &ProfileFields,
) -> ApiResult<Profile> {
    query_helpers::fetch_one(
        conn,
        &format!(
            "INSERT INTO profiles (user_id, display_name, bio, about, profile_picture_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) RETURNING {}",
            PROFILE_COLUMNS
        ),
        params![
            user_id,
            display_name,
            fields.bio,
            fields.about,
            fields.profile_picture_url,
            now_timestamp()
        ],
        profile_from_row,
        || ApiError::Internal("INSERT INTO profiles returned no row".to_string()),
    )
}

pub fn read_profile(conn: &Connection, user_id: i64, on_missing: impl FnOnce() -> ApiError) -> ApiResult<Profile> {
    query_helpers::fetch_one(
        conn,
        &format!("SELECT {} FROM profiles WHERE user_id = ?1", PROFILE_COLUMNS),
        [user_id],
        profile_from_row,
        on_missing,
    )
}

/// Updates only the fields present in `fields`. Callers reject an empty
/// change set before getting here.
pub fn update_profile(
    conn: &Connection,
    user_id: i64,
    fields: &ProfileFields,
    on_missing: impl FnOnce() -> ApiError,
) -> ApiResult<Profile> {
    let candidates = [
        ("display_name", &fields.display_name),
        ("bio", &fields.bio),
        ("about", &fields.about),
        ("profile_picture_url", &fields.profile_picture_url),
    ];

    let mut assignments = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    for (column, value) in candidates {
        if let Some(value) = value {
            values.push(Value::Text(value.clone()));
            assignments.push(format!("{} = ?{}", column, values.len()));
        }
    }
    values.push(Value::Text(now_timestamp()));
    assignments.push(format!("edited_at = ?{}", values.len()));
    values.push(Value::Integer(user_id));

    let sql = format!(
        "UPDATE profiles SET {} WHERE user_id = ?{} RETURNING {}",
        assignments.join(", "),
        values.len(),
        PROFILE_COLUMNS
    );
    query_helpers::fetch_one(conn, &sql, params_from_iter(values), profile_from_row, on_missing)
}

pub fn delete_profile(conn: &Connection, user_id: i64) -> ApiResult<usize> {
    query_helpers::execute(conn, "DELETE FROM profiles WHERE user_id = ?1", [user_id])
}
