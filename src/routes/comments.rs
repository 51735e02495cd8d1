//! Post comments and user page ("guestbook") comments.
//!
//! Both kinds of thread behave the same way: anyone signed in may comment
//! or reply, replies go one level deep, only the author may edit, and the
//! author or the thread owner (post author / page owner) may delete.

use crate::errors::{ApiError, ApiResult};
use crate::helper::auth_helpers::{self, AuthenticatedUser};
use crate::helper::query_helpers::get_conn;
use crate::helper::validation_helpers;
use crate::models::db_operations::{comments_db_operations, posts_db_operations, users_db_operations};
use crate::models::{Comment, CommentThread};
use crate::DbPool;
use actix_web::{web, HttpResponse};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct CommentRequest {
    content: Option<String>,
}

/// A resolved thread plus what handlers need to describe and authorize it.
struct Thread {
    thread: CommentThread,
    owner_id: i64,
    label: String,
}

fn post_thread(conn: &Connection, name: &str, post_id: i64) -> ApiResult<Thread> {
    let user = users_db_operations::read_user_by_name(conn, name)?;
    let post = posts_db_operations::read_user_post(conn, user.id, post_id, &user.name)?;
    Ok(Thread {
        thread: CommentThread::Post(post.id),
        owner_id: post.user_id,
        label: format!("post with ID {} and user {}", post.id, user.name),
    })
}

fn page_thread(conn: &Connection, name: &str) -> ApiResult<Thread> {
    let user = users_db_operations::read_user_by_name(conn, name)?;
    Ok(Thread {
        thread: CommentThread::UserPage(user.id),
        owner_id: user.id,
        label: format!("user {}", user.name),
    })
}

/// Routes nested under `/users`.
pub fn config_post_comments(cfg: &mut web::ServiceConfig) {
    cfg.route("/{name}/posts/{id}/comments", web::get().to(list_post_comments))
        .route("/{name}/posts/{id}/comments/create", web::post().to(create_post_comment))
        .route("/{name}/posts/{id}/comments/{comment_id}", web::get().to(get_post_comment))
        .route("/{name}/posts/{id}/comments/{comment_id}/reply", web::post().to(reply_post_comment))
        .route("/{name}/posts/{id}/comments/{comment_id}/replies", web::get().to(list_post_comment_replies))
        .route("/{name}/posts/{id}/comments/{comment_id}/edit", web::put().to(edit_post_comment))
        .route("/{name}/posts/{id}/comments/{comment_id}/delete", web::delete().to(delete_post_comment))
        .route("/{name}/post-comments", web::get().to(list_comments_by_author))
        .route("/{name}/post-comments/{comment_id}", web::get().to(get_comment_by_author));
}

/// Routes nested under `/users`.
pub fn config_user_comments(cfg: &mut web::ServiceConfig) {
    cfg.route("/{name}/user-comments", web::get().to(list_page_comments))
        .route("/{name}/user-comments/create", web::post().to(create_page_comment))
        .route("/{name}/user-comments/{comment_id}", web::get().to(get_page_comment))
        .route("/{name}/user-comments/{comment_id}/reply", web::post().to(reply_page_comment))
        .route("/{name}/user-comments/{comment_id}/replies", web::get().to(list_page_comment_replies))
        .route("/{name}/user-comments/{comment_id}/edit", web::put().to(edit_page_comment))
        .route("/{name}/user-comments/{comment_id}/delete", web::delete().to(delete_page_comment));
}

// --- Thread operations shared by both kinds of comments ---

fn list_comments(conn: &Connection, thread: &Thread) -> ApiResult<HttpResponse> {
    let comments = comments_db_operations::read_thread_comments(conn, thread.thread)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Comments for {} found", thread.label),
        "comments": comments,
    })))
}

fn create_comment(
    conn: &Connection,
    auth: &AuthenticatedUser,
    thread: &Thread,
    body: &CommentRequest,
) -> ApiResult<HttpResponse> {
    let content = validation_helpers::required("content", body.content.as_deref())?;
    let actor = auth_helpers::resolve_acting_identity(conn, auth)?;

    let comment = comments_db_operations::create_comment(conn, thread.thread, actor.id, None, content)?;
    Ok(HttpResponse::Created().json(json!({
        "message": format!("Comment added to {}", thread.label),
        "comment": comment,
    })))
}

fn get_comment(conn: &Connection, thread: &Thread, comment_id: i64) -> ApiResult<HttpResponse> {
    let comment = comments_db_operations::read_comment(conn, thread.thread, comment_id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Comment with ID {} for {} found", comment.id, thread.label),
        "comment": comment,
    })))
}

fn reply_to_comment(
    conn: &Connection,
    auth: &AuthenticatedUser,
    thread: &Thread,
    parent_id: i64,
    body: &CommentRequest,
) -> ApiResult<HttpResponse> {
    let content = validation_helpers::required("content", body.content.as_deref())?;
    let parent = comments_db_operations::read_comment(conn, thread.thread, parent_id)?;
    if parent.parent_id.is_some() {
        return Err(ApiError::bad_request("Replies can only be made to top-level comments"));
    }
    let actor = auth_helpers::resolve_acting_identity(conn, auth)?;

    let reply = comments_db_operations::create_comment(conn, thread.thread, actor.id, Some(parent.id), content)?;
    Ok(HttpResponse::Created().json(json!({
        "message": format!("Reply added to comment with ID {} for {}", parent.id, thread.label),
        "reply": reply,
    })))
}

fn list_replies(conn: &Connection, thread: &Thread, parent_id: i64) -> ApiResult<HttpResponse> {
    // 404 for an unknown parent rather than an empty list
    let parent = comments_db_operations::read_comment(conn, thread.thread, parent_id)?;
    let replies = comments_db_operations::read_replies(conn, thread.thread, parent.id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Replies for comment with ID {} for {}", parent.id, thread.label),
        "replies": replies,
    })))
}

fn edit_comment(
    conn: &Connection,
    auth: &AuthenticatedUser,
    thread: &Thread,
    comment_id: i64,
    body: &CommentRequest,
) -> ApiResult<HttpResponse> {
    let content = validation_helpers::required("content", body.content.as_deref())?;
    let comment = comments_db_operations::read_comment(conn, thread.thread, comment_id)?;
    let actor = auth_helpers::resolve_acting_identity(conn, auth)?;
    auth_helpers::require_ownership(comment.user_id, &actor, "edit your own comments")?;

    let comment = comments_db_operations::update_comment_content(conn, thread.thread, comment.id, content)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Comment with ID {} for {} updated", comment.id, thread.label),
        "comment": comment,
    })))
}

fn delete_comment(
    conn: &Connection,
    auth: &AuthenticatedUser,
    thread: &Thread,
    comment_id: i64,
) -> ApiResult<HttpResponse> {
    let comment: Comment = comments_db_operations::read_comment(conn, thread.thread, comment_id)?;
    let actor = auth_helpers::resolve_acting_identity(conn, auth)?;
    if actor.id != thread.owner_id {
        auth_helpers::require_ownership(comment.user_id, &actor, "delete your own comments")?;
    }

    comments_db_operations::delete_comment(conn, thread.thread, comment.id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Deleted comment with ID {} for {}", comment.id, thread.label),
    })))
}

// --- /users/{name}/posts/{id}/comments ---

async fn list_post_comments(pool: web::Data<DbPool>, path: web::Path<(String, i64)>) -> ApiResult<HttpResponse> {
    let (name, post_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = post_thread(&conn, &name, post_id)?;
    list_comments(&conn, &thread)
}

async fn create_post_comment(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64)>,
    body: web::Json<CommentRequest>,
) -> ApiResult<HttpResponse> {
    let (name, post_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = post_thread(&conn, &name, post_id)?;
    create_comment(&conn, &auth, &thread, &body)
}

async fn get_post_comment(pool: web::Data<DbPool>, path: web::Path<(String, i64, i64)>) -> ApiResult<HttpResponse> {
    let (name, post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = post_thread(&conn, &name, post_id)?;
    get_comment(&conn, &thread, comment_id)
}

async fn reply_post_comment(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64, i64)>,
    body: web::Json<CommentRequest>,
) -> ApiResult<HttpResponse> {
    let (name, post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = post_thread(&conn, &name, post_id)?;
    reply_to_comment(&conn, &auth, &thread, comment_id, &body)
}

async fn list_post_comment_replies(
    pool: web::Data<DbPool>,
    path: web::Path<(String, i64, i64)>,
) -> ApiResult<HttpResponse> {
    let (name, post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = post_thread(&conn, &name, post_id)?;
    list_replies(&conn, &thread, comment_id)
}

async fn edit_post_comment(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64, i64)>,
    body: web::Json<CommentRequest>,
) -> ApiResult<HttpResponse> {
    let (name, post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = post_thread(&conn, &name, post_id)?;
    edit_comment(&conn, &auth, &thread, comment_id, &body)
}

async fn delete_post_comment(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64, i64)>,
) -> ApiResult<HttpResponse> {
    let (name, post_id, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = post_thread(&conn, &name, post_id)?;
    delete_comment(&conn, &auth, &thread, comment_id)
}

// --- /users/{name}/post-comments: comments written by the user ---

async fn list_comments_by_author(pool: web::Data<DbPool>, name: web::Path<String>) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    let comments = comments_db_operations::read_post_comments_by_author(&conn, user.id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Comments by user {} found", user.name),
        "comments": comments,
    })))
}

async fn get_comment_by_author(pool: web::Data<DbPool>, path: web::Path<(String, i64)>) -> ApiResult<HttpResponse> {
    let (name, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    let comment = comments_db_operations::read_post_comment_by_author(&conn, user.id, comment_id, &user.name)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Comment with ID {} by user {} found", comment.id, user.name),
        "comment": comment,
    })))
}

// --- /users/{name}/user-comments ---

async fn list_page_comments(pool: web::Data<DbPool>, name: web::Path<String>) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let thread = page_thread(&conn, &name)?;
    list_comments(&conn, &thread)
}

async fn create_page_comment(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    name: web::Path<String>,
    body: web::Json<CommentRequest>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let thread = page_thread(&conn, &name)?;
    create_comment(&conn, &auth, &thread, &body)
}

async fn get_page_comment(pool: web::Data<DbPool>, path: web::Path<(String, i64)>) -> ApiResult<HttpResponse> {
    let (name, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = page_thread(&conn, &name)?;
    get_comment(&conn, &thread, comment_id)
}

async fn reply_page_comment(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64)>,
    body: web::Json<CommentRequest>,
) -> ApiResult<HttpResponse> {
    let (name, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = page_thread(&conn, &name)?;
    reply_to_comment(&conn, &auth, &thread, comment_id, &body)
}

async fn list_page_comment_replies(pool: web::Data<DbPool>, path: web::Path<(String, i64)>) -> ApiResult<HttpResponse> {
    let (name, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = page_thread(&conn, &name)?;
    list_replies(&conn, &thread, comment_id)
}

async fn edit_page_comment(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64)>,
    body: web::Json<CommentRequest>,
) -> ApiResult<HttpResponse> {
    let (name, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = page_thread(&conn, &name)?;
    edit_comment(&conn, &auth, &thread, comment_id, &body)
}

async fn delete_page_comment(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64)>,
) -> ApiResult<HttpResponse> {
    let (name, comment_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let thread = page_thread(&conn, &name)?;
    delete_comment(&conn, &auth, &thread, comment_id)
}
