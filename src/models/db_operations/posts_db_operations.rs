use crate::errors::{ApiError, ApiResult};
use crate::helper::query_helpers::{self, now_timestamp};
use crate::models::Post;
use rusqlite::{params, Connection, Row};

const POST_COLUMNS: &str = "id, user_id, title, content, created_at, edited_at";

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
        edited_at: row.get(5)?,
    })
}

fn missing_post(post_id: i64) -> impl FnOnce() -> ApiError {
    move || ApiError::not_found(format!("No post found with ID {}", post_id))
}

pub fn create_post(conn: &Connection, user_id: i64, title: &str, content: &str) -> ApiResult<Post> {
    query_helpers::fetch_one(
        conn,
        &format!(
            "INSERT INTO posts (user_id, title, content, created_at) VALUES (?1, ?2, ?3, ?4) RETURNING {}",
            POST_COLUMNS
        ),
        params![user_id, title, content, now_timestamp()],
        post_from_row,
        || ApiError::Internal("INSERT INTO posts returned no row".to_string()),
    )
}

/// Newest first.
pub fn read_all_posts(conn: &Connection) -> ApiResult<Vec<Post>> {
    query_helpers::fetch_all(
        conn,
        &format!("SELECT {} FROM posts ORDER BY created_at DESC, id DESC", POST_COLUMNS),
        [],
        post_from_row,
    )
}

pub fn read_posts_by_user(conn: &Connection, user_id: i64) -> ApiResult<Vec<Post>> {
    query_helpers::fetch_all(
        conn,
        &format!(
            "SELECT {} FROM posts WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            POST_COLUMNS
        ),
        [user_id],
        post_from_row,
    )
}

pub fn read_post(conn: &Connection, post_id: i64) -> ApiResult<Post> {
    query_helpers::fetch_one(
        conn,
        &format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS),
        [post_id],
        post_from_row,
        missing_post(post_id),
    )
}

/// Looks a post up under its author, so `/users/alice/posts/7` is a 404 when
/// post 7 belongs to someone else.
pub fn read_user_post(conn: &Connection, user_id: i64, post_id: i64, user_name: &str) -> ApiResult<Post> {
    query_helpers::fetch_one(
        conn,
        &format!("SELECT {} FROM posts WHERE id = ?1 AND user_id = ?2", POST_COLUMNS),
        params![post_id, user_id],
        post_from_row,
        || ApiError::not_found(format!("No post found with ID {} for user {}", post_id, user_name)),
    )
}

pub fn update_post(
    conn: &Connection,
    post_id: i64,
    title: Option<&str>,
    content: Option<&str>,
) -> ApiResult<Post> {
    query_helpers::fetch_one(
        conn,
        &format!(
            "UPDATE posts SET title = COALESCE(?1, title), content = COALESCE(?2, content), edited_at = ?3
             WHERE id = ?4 RETURNING {}",
            POST_COLUMNS
        ),
        params![title, content, now_timestamp(), post_id],
        post_from_row,
        missing_post(post_id),
    )
}

pub fn delete_post(conn: &Connection, post_id: i64) -> ApiResult<usize> {
    query_helpers::execute(conn, "DELETE FROM posts WHERE id = ?1", [post_id])
}
