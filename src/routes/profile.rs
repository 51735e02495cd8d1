use crate::errors::{ApiError, ApiResult};
use crate::helper::auth_helpers::{self, AuthenticatedUser};
use crate::helper::query_helpers::{get_conn, is_unique_violation};
use crate::helper::validation_helpers::{self, MAX_NAME_LEN, MAX_URL_LEN};
use crate::models::db_operations::{profiles_db_operations, users_db_operations};
use crate::models::{ProfileFields, User};
use crate::DbPool;
use actix_web::{web, HttpResponse};
use rusqlite::Connection;
use serde_json::json;

/// Routes nested under `/users`.
pub fn config_user_profile(cfg: &mut web::ServiceConfig) {
    cfg.route("/{name}/profile", web::get().to(get_user_profile))
        .route("/{name}/profile/create", web::post().to(create_user_profile))
        .route("/{name}/profile/edit", web::put().to(edit_user_profile))
        .route("/{name}/profile/delete", web::delete().to(delete_user_profile));
}

/// `/profile` always refers to the acting identity's own profile.
pub fn config_own_profile(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/profile")
            .route("", web::get().to(get_own_profile))
            .route("/create", web::post().to(create_own_profile))
            .route("/edit", web::put().to(edit_own_profile))
            .route("/delete", web::delete().to(delete_own_profile)),
    );
}

fn missing_profile(user: &User) -> impl FnOnce() -> ApiError + '_ {
    move || ApiError::not_found(format!("No profile found for user {}", user.name))
}

fn validate_optional_fields(fields: &ProfileFields) -> ApiResult<()> {
    if let Some(display_name) = fields.display_name.as_deref() {
        validation_helpers::max_len(
            "displayName",
            validation_helpers::required("displayName", Some(display_name))?,
            MAX_NAME_LEN,
        )?;
    }
    if let Some(url) = fields.profile_picture_url.as_deref() {
        validation_helpers::max_len("profilePictureUrl", url, MAX_URL_LEN)?;
    }
    Ok(())
}

// --- Operations on a known owner, shared by both route families ---

fn show_profile(conn: &Connection, user: &User) -> ApiResult<HttpResponse> {
    let profile = profiles_db_operations::read_profile(conn, user.id, missing_profile(user))?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Profile for user {} found", user.name),
        "profile": profile,
    })))
}

fn insert_profile(conn: &Connection, user: &User, fields: &ProfileFields) -> ApiResult<HttpResponse> {
    let display_name = validation_helpers::required("displayName", fields.display_name.as_deref())?;
    validate_optional_fields(fields)?;

    let exists = || ApiError::bad_request(format!("Profile for user {} already exists", user.name));
    let profile = profiles_db_operations::create_profile(conn, user.id, display_name, fields)
        .map_err(|e| if is_unique_violation(&e) { exists() } else { e })?;

    Ok(HttpResponse::Created().json(json!({
        "message": format!("Profile for user {} created", user.name),
        "profile": profile,
    })))
}

fn update_profile(conn: &Connection, user: &User, fields: &ProfileFields) -> ApiResult<HttpResponse> {
    if fields.is_empty() {
        return Err(ApiError::bad_request("No fields to update"));
    }
    validate_optional_fields(fields)?;

    let profile = profiles_db_operations::update_profile(conn, user.id, fields, missing_profile(user))?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Profile for user {} updated", user.name),
        "profile": profile,
    })))
}

fn remove_profile(conn: &Connection, user: &User) -> ApiResult<HttpResponse> {
    if profiles_db_operations::delete_profile(conn, user.id)? == 0 {
        return Err(missing_profile(user)());
    }
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Profile for user {} deleted", user.name),
    })))
}

/// Looks the named user up and checks that the request acts as them.
fn owned_user(conn: &Connection, auth: &AuthenticatedUser, name: &str, message: &str) -> ApiResult<User> {
    let user = users_db_operations::read_user_by_name(conn, name)?;
    let actor = auth_helpers::resolve_acting_identity(conn, auth)?;
    auth_helpers::require_ownership(user.id, &actor, message)?;
    Ok(user)
}

/// The user row behind the acting identity.
fn acting_user(conn: &Connection, auth: &AuthenticatedUser) -> ApiResult<User> {
    let actor = auth_helpers::resolve_acting_identity(conn, auth)?;
    users_db_operations::read_user_by_id(conn, actor.id)?.ok_or(ApiError::InvalidToken)
}

// --- /users/{name}/profile ---

async fn get_user_profile(pool: web::Data<DbPool>, name: web::Path<String>) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    show_profile(&conn, &user)
}

async fn create_user_profile(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    name: web::Path<String>,
    body: web::Json<ProfileFields>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = owned_user(&conn, &auth, &name, "create a profile for yourself")?;
    insert_profile(&conn, &user, &body)
}

async fn edit_user_profile(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    name: web::Path<String>,
    body: web::Json<ProfileFields>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = owned_user(&conn, &auth, &name, "update your own profile")?;
    update_profile(&conn, &user, &body)
}

async fn delete_user_profile(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    name: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = owned_user(&conn, &auth, &name, "delete your own profile")?;
    remove_profile(&conn, &user)
}

// --- /profile ---

async fn get_own_profile(pool: web::Data<DbPool>, auth: AuthenticatedUser) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = acting_user(&conn, &auth)?;
    show_profile(&conn, &user)
}

async fn create_own_profile(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    body: web::Json<ProfileFields>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = acting_user(&conn, &auth)?;
    insert_profile(&conn, &user, &body)
}

async fn edit_own_profile(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    body: web::Json<ProfileFields>,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = acting_user(&conn, &auth)?;
    update_profile(&conn, &user, &body)
}

async fn delete_own_profile(pool: web::Data<DbPool>, auth: AuthenticatedUser) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = acting_user(&conn, &auth)?;
    remove_profile(&conn, &user)
}
