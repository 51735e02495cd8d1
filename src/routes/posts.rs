use crate::errors::{ApiError, ApiResult};
use crate::helper::auth_helpers::{self, Actor, AuthenticatedUser};
use crate::helper::query_helpers::get_conn;
use crate::helper::validation_helpers::{self, MAX_TITLE_LEN};
use crate::models::db_operations::{posts_db_operations, users_db_operations};
use crate::models::Post;
use crate::DbPool;
use actix_web::{web, HttpResponse};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::json;

#[derive(Deserialize)]
struct CreatePostRequest {
    title: Option<String>,
    content: Option<String>,
}

#[derive(Deserialize)]
struct EditPostRequest {
    title: Option<String>,
    content: Option<String>,
}

/// Routes nested under `/users`.
pub fn config_user_posts(cfg: &mut web::ServiceConfig) {
    cfg.route("/{name}/posts", web::get().to(list_user_posts))
        .route("/{name}/posts/create", web::post().to(create_user_post))
        .route("/{name}/posts/{id}", web::get().to(get_user_post))
        .route("/{name}/posts/{id}/edit", web::put().to(edit_user_post))
        .route("/{name}/posts/{id}/delete", web::delete().to(delete_user_post));
}

pub fn config_posts(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/posts")
            .route("", web::get().to(list_posts))
            .route("/create", web::post().to(create_post))
            .route("/{id}", web::get().to(get_post))
            .route("/{id}/edit", web::put().to(edit_post))
            .route("/{id}/delete", web::delete().to(delete_post)),
    );
}

// --- Shared by the /posts and /users/{name}/posts handlers ---

fn insert_post(conn: &Connection, author_id: i64, body: &CreatePostRequest) -> ApiResult<Post> {
    let title = validation_helpers::required("title", body.title.as_deref())?;
    let title = validation_helpers::max_len("title", title, MAX_TITLE_LEN)?;
    let content = validation_helpers::required("content", body.content.as_deref())?;
    posts_db_operations::create_post(conn, author_id, title, content)
}

fn apply_post_edit(conn: &Connection, actor: &Actor, post: &Post, body: &EditPostRequest) -> ApiResult<Post> {
    auth_helpers::require_ownership(post.user_id, actor, "edit your own posts")?;

    if body.title.is_none() && body.content.is_none() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    let title = match body.title.as_deref() {
        Some(title) => Some(validation_helpers::max_len(
            "title",
            validation_helpers::required("title", Some(title))?,
            MAX_TITLE_LEN,
        )?),
        None => None,
    };
    let content = match body.content.as_deref() {
        Some(content) => Some(validation_helpers::required("content", Some(content))?),
        None => None,
    };
    posts_db_operations::update_post(conn, post.id, title, content)
}

fn remove_post(conn: &Connection, actor: &Actor, post: &Post) -> ApiResult<()> {
    auth_helpers::require_ownership(post.user_id, actor, "delete your own posts")?;
    posts_db_operations::delete_post(conn, post.id)?;
    Ok(())
}

// --- /users/{name}/posts ---

async fn list_user_posts(pool: web::Data<DbPool>, name: web::Path<String>) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    let posts = posts_db_operations::read_posts_by_user(&conn, user.id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Posts for user {} found", user.name),
        "posts": posts,
    })))
}

async fn create_user_post(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    name: web::Path<String>,
    body: web::Json<CreatePostRequest>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    let actor = auth_helpers::resolve_acting_identity(&conn, &auth)?;
    auth_helpers::require_ownership(user.id, &actor, "create posts for yourself")?;

    let post = insert_post(&conn, user.id, &body)?;
    Ok(HttpResponse::Created().json(json!({
        "message": format!("Created post with ID {} for user {}", post.id, user.name),
        "post": post,
    })))
}

async fn get_user_post(pool: web::Data<DbPool>, path: web::Path<(String, i64)>) -> ApiResult<HttpResponse> {
    let (name, post_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    let post = posts_db_operations::read_user_post(&conn, user.id, post_id, &user.name)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Post with ID {} for user {} found", post.id, user.name),
        "post": post,
    })))
}

async fn edit_user_post(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64)>,
    body: web::Json<EditPostRequest>,
) -> ApiResult<HttpResponse> {
    let (name, post_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    let post = posts_db_operations::read_user_post(&conn, user.id, post_id, &user.name)?;
    let actor = auth_helpers::resolve_acting_identity(&conn, &auth)?;

    let post = apply_post_edit(&conn, &actor, &post, &body)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Updated post with ID {} for user {}", post.id, user.name),
        "post": post,
    })))
}

async fn delete_user_post(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    path: web::Path<(String, i64)>,
) -> ApiResult<HttpResponse> {
    let (name, post_id) = path.into_inner();
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    let post = posts_db_operations::read_user_post(&conn, user.id, post_id, &user.name)?;
    let actor = auth_helpers::resolve_acting_identity(&conn, &auth)?;

    remove_post(&conn, &actor, &post)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Deleted post with ID {} for user {}", post.id, user.name),
    })))
}

// --- /posts, acting on behalf of the resolved identity ---

async fn list_posts(pool: web::Data<DbPool>) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let posts = posts_db_operations::read_all_posts(&conn)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "List of posts", "posts": posts })))
}

async fn get_post(pool: web::Data<DbPool>, post_id: web::Path<i64>) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let post = posts_db_operations::read_post(&conn, *post_id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Post with ID {} found", post.id),
        "post": post,
    })))
}

async fn create_post(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    body: web::Json<CreatePostRequest>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let actor = auth_helpers::resolve_acting_identity(&conn, &auth)?;

    let post = insert_post(&conn, actor.id, &body)?;
    Ok(HttpResponse::Created().json(json!({
        "message": format!("Created post with ID {}", post.id),
        "post": post,
    })))
}

async fn edit_post(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    post_id: web::Path<i64>,
    body: web::Json<EditPostRequest>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let post = posts_db_operations::read_post(&conn, *post_id)?;
    let actor = auth_helpers::resolve_acting_identity(&conn, &auth)?;

    let post = apply_post_edit(&conn, &actor, &post, &body)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Updated post with ID {}", post.id),
        "post": post,
    })))
}

async fn delete_post(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    post_id: web::Path<i64>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let post = posts_db_operations::read_post(&conn, *post_id)?;
    let actor = auth_helpers::resolve_acting_identity(&conn, &auth)?;

    remove_post(&conn, &actor, &post)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Deleted post with ID {}", post.id),
    })))
}
