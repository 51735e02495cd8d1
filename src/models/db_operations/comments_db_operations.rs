use crate::errors::{ApiError, ApiResult};
use crate::helper::query_helpers::{self, now_timestamp};
use crate::models::{Comment, CommentThread};
use rusqlite::{params, Connection, Row};

fn columns(thread: CommentThread) -> String {
    format!(
        "id, {}, user_id, parent_id, content, created_at, edited_at",
        thread.column()
    )
}

fn comment_from_row(thread: CommentThread) -> impl Fn(&Row<'_>) -> rusqlite::Result<Comment> {
    move |row| {
        let thread_id: i64 = row.get(1)?;
        let (post_id, user_page_id) = match thread {
            CommentThread::Post(_) => (Some(thread_id), None),
            CommentThread::UserPage(_) => (None, Some(thread_id)),
        };
        Ok(Comment {
            id: row.get(0)?,
            post_id,
            user_page_id,
            user_id: row.get(2)?,
            parent_id: row.get(3)?,
            content: row.get(4)?,
            created_at: row.get(5)?,
            edited_at: row.get(6)?,
        })
    }
}

pub fn missing_comment(comment_id: i64) -> impl FnOnce() -> ApiError {
    move || ApiError::not_found(format!("No comment found with ID {}", comment_id))
}

pub fn create_comment(
    conn: &Connection,
    thread: CommentThread,
    author_id: i64,
    parent_id: Option<i64>,
    content: &str,
) -> ApiResult<Comment> {
    let sql = format!(
        "INSERT INTO {} ({}, user_id, parent_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5) RETURNING {}",
        thread.table(),
        thread.column(),
        columns(thread)
    );
    query_helpers::fetch_one(
        conn,
        &sql,
        params![thread.id(), author_id, parent_id, content, now_timestamp()],
        comment_from_row(thread),
        || ApiError::Internal(format!("INSERT INTO {} returned no row", thread.table())),
    )
}

/// Every comment in the thread, replies included, oldest first.
pub fn read_thread_comments(conn: &Connection, thread: CommentThread) -> ApiResult<Vec<Comment>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1 ORDER BY id",
        columns(thread),
        thread.table(),
        thread.column()
    );
    query_helpers::fetch_all(conn, &sql, [thread.id()], comment_from_row(thread))
}

pub fn read_comment(conn: &Connection, thread: CommentThread, comment_id: i64) -> ApiResult<Comment> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1 AND id = ?2",
        columns(thread),
        thread.table(),
        thread.column()
    );
    query_helpers::fetch_one(
        conn,
        &sql,
        params![thread.id(), comment_id],
        comment_from_row(thread),
        missing_comment(comment_id),
    )
}

pub fn read_replies(conn: &Connection, thread: CommentThread, parent_id: i64) -> ApiResult<Vec<Comment>> {
    let sql = format!(
        "SELECT {} FROM {} WHERE {} = ?1 AND parent_id = ?2 ORDER BY id",
        columns(thread),
        thread.table(),
        thread.column()
    );
    query_helpers::fetch_all(conn, &sql, params![thread.id(), parent_id], comment_from_row(thread))
}

pub fn update_comment_content(
    conn: &Connection,
    thread: CommentThread,
    comment_id: i64,
    content: &str,
) -> ApiResult<Comment> {
    let sql = format!(
        "UPDATE {} SET content = ?1, edited_at = ?2 WHERE {} = ?3 AND id = ?4 RETURNING {}",
        thread.table(),
        thread.column(),
        columns(thread)
    );
    query_helpers::fetch_one(
        conn,
        &sql,
        params![content, now_timestamp(), thread.id(), comment_id],
        comment_from_row(thread),
        missing_comment(comment_id),
    )
}

/// Replies to the comment are removed by the `parent_id` cascade.
pub fn delete_comment(conn: &Connection, thread: CommentThread, comment_id: i64) -> ApiResult<usize> {
    let sql = format!(
        "DELETE FROM {} WHERE {} = ?1 AND id = ?2",
        thread.table(),
        thread.column()
    );
    query_helpers::execute(conn, &sql, params![thread.id(), comment_id])
}

// Post comments written by a given user, across all posts.

pub fn read_post_comments_by_author(conn: &Connection, author_id: i64) -> ApiResult<Vec<Comment>> {
    // The thread id is only used to pick the table and column.
    let thread = CommentThread::Post(0);
    let sql = format!(
        "SELECT {} FROM comments WHERE user_id = ?1 ORDER BY id",
        columns(thread)
    );
    query_helpers::fetch_all(conn, &sql, [author_id], comment_from_row(thread))
}

pub fn read_post_comment_by_author(
    conn: &Connection,
    author_id: i64,
    comment_id: i64,
    author_name: &str,
) -> ApiResult<Comment> {
    let thread = CommentThread::Post(0);
    let sql = format!(
        "SELECT {} FROM comments WHERE user_id = ?1 AND id = ?2",
        columns(thread)
    );
    query_helpers::fetch_one(
        conn,
        &sql,
        params![author_id, comment_id],
        comment_from_row(thread),
        || ApiError::not_found(format!("No comment found with ID {} by user {}", comment_id, author_name)),
    )
}
