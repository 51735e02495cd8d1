use crate::errors::{ApiError, ApiResult};
use crate::helper::auth_helpers::{self, AuthenticatedUser};
use crate::helper::query_helpers::{get_conn, is_unique_violation};
use crate::helper::validation_helpers;
use crate::models::db_operations::users_db_operations;
use crate::routes::{comments, posts, profile};
use crate::{AppState, DbPool};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Deserializer};
use serde_json::json;

#[derive(Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
struct LoginRequest {
    name: Option<String>,
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetPasswordRequest {
    old_password: Option<String>,
    new_password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SetEmailRequest {
    password: Option<String>,
    new_email: Option<String>,
}

#[derive(Deserialize)]
struct DeleteAccountRequest {
    password: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdminFlagsRequest {
    is_admin: Option<bool>,
    is_active: Option<bool>,
    #[serde(default, deserialize_with = "present_or_null")]
    permissions: Option<Option<String>>,
}

/// Keeps an explicit `null` apart from an absent field: absent stays `None`
/// through `default`, `null` becomes `Some(None)`.
fn present_or_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

pub fn config_users(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("/register", web::post().to(register_user))
            .route("/login", web::post().to(login_user))
            .route("/{name}", web::get().to(get_user))
            .route("/{name}/set-password", web::post().to(set_password))
            .route("/{name}/set-email", web::post().to(set_email))
            .route("/{name}/delete", web::delete().to(delete_user))
            .route("/{name}/admin-flags", web::put().to(update_admin_flags))
            .configure(profile::config_user_profile)
            .configure(posts::config_user_posts)
            .configure(comments::config_post_comments)
            .configure(comments::config_user_comments),
    );
}

fn login_payload(state: &AppState, message: String, name: &str, id: i64) -> ApiResult<serde_json::Value> {
    let token = auth_helpers::issue_token(&state.keys, name, id)?;
    Ok(json!({
        "message": message,
        "id": id,
        "token": token,
        "publicKey": state.keys.public_pem(),
    }))
}

async fn list_users(pool: web::Data<DbPool>) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let users = users_db_operations::read_all_users(&conn)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "List of users", "users": users })))
}

async fn get_user(pool: web::Data<DbPool>, name: web::Path<String>) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let user = users_db_operations::read_user_by_name(&conn, &name)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("User with name {} found", user.name),
        "user": user,
    })))
}

async fn register_user(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> ApiResult<HttpResponse> {
    let name = validation_helpers::validate_name(body.name.as_deref())?;
    let email = validation_helpers::validate_email("email", body.email.as_deref())?;
    let password = validation_helpers::validate_password("password", body.password.as_deref())?;

    let duplicate = || {
        ApiError::bad_request(format!(
            "User with name {} or email {} already exists",
            name, email
        ))
    };

    let conn = get_conn(&pool)?;
    if users_db_operations::name_or_email_taken(&conn, name, email)? {
        return Err(duplicate());
    }

    let password_hash = auth_helpers::hash_password(password, state.bcrypt_cost)?;
    // A concurrent registration can still win the race between the check
    // above and this insert; the UNIQUE constraints catch it.
    let user = users_db_operations::create_user(&conn, name, email, &password_hash).map_err(|e| {
        if is_unique_violation(&e) {
            duplicate()
        } else {
            e
        }
    })?;
    log::info!("Registered user '{}' (id {})", user.name, user.id);

    let payload = login_payload(
        &state,
        format!("User with name {} and email {} registered", user.name, user.email),
        &user.name,
        user.id,
    )?;
    Ok(HttpResponse::Created().json(payload))
}

async fn login_user(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> ApiResult<HttpResponse> {
    let name = validation_helpers::required("name", body.name.as_deref())?;
    let password = body.password.as_deref().unwrap_or_default();

    let conn = get_conn(&pool)?;
    let user = auth_helpers::check_account_credentials(&conn, name, password)?;
    users_db_operations::update_last_login_time(&conn, user.id)?;

    let payload = login_payload(
        &state,
        format!("User with name {} logged in", user.name),
        &user.name,
        user.id,
    )?;
    Ok(HttpResponse::Ok().json(payload))
}

async fn set_password(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    name: web::Path<String>,
    body: web::Json<SetPasswordRequest>,
) -> ApiResult<HttpResponse> {
    let old_password = body.old_password.as_deref().unwrap_or_default();
    let new_password = validation_helpers::validate_password("newPassword", body.new_password.as_deref())?;

    let conn = get_conn(&pool)?;
    let user = auth_helpers::check_account_credentials(&conn, &name, old_password)?;
    let password_hash = auth_helpers::hash_password(new_password, state.bcrypt_cost)?;
    users_db_operations::update_password_hash(&conn, user.id, &password_hash)?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Password for user {} updated", user.name),
    })))
}

async fn set_email(
    pool: web::Data<DbPool>,
    name: web::Path<String>,
    body: web::Json<SetEmailRequest>,
) -> ApiResult<HttpResponse> {
    let password = body.password.as_deref().unwrap_or_default();
    let new_email = validation_helpers::validate_email("newEmail", body.new_email.as_deref())?;

    let conn = get_conn(&pool)?;
    let user = auth_helpers::check_account_credentials(&conn, &name, password)?;
    let taken = || ApiError::bad_request(format!("Email {} is already in use", new_email));
    if user.email != new_email && users_db_operations::email_taken(&conn, new_email)? {
        return Err(taken());
    }
    users_db_operations::update_email(&conn, user.id, new_email)
        .map_err(|e| if is_unique_violation(&e) { taken() } else { e })?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Email for user {} updated", user.name),
    })))
}

async fn delete_user(
    pool: web::Data<DbPool>,
    name: web::Path<String>,
    body: web::Json<DeleteAccountRequest>,
) -> ApiResult<HttpResponse> {
    let password = body.password.as_deref().unwrap_or_default();

    let conn = get_conn(&pool)?;
    let user = auth_helpers::check_account_credentials(&conn, &name, password)?;
    users_db_operations::delete_user(&conn, user.id)?;
    log::info!("Deleted user '{}' (id {})", user.name, user.id);

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("User with name {} deleted", user.name),
    })))
}

async fn update_admin_flags(
    pool: web::Data<DbPool>,
    auth: AuthenticatedUser,
    name: web::Path<String>,
    body: web::Json<AdminFlagsRequest>,
) -> ApiResult<HttpResponse> {
    if body.is_admin.is_none() && body.is_active.is_none() && body.permissions.is_none() {
        return Err(ApiError::bad_request("No fields to update"));
    }

    let conn = get_conn(&pool)?;
    let actor = auth_helpers::resolve_acting_identity(&conn, &auth)?;
    auth_helpers::require_admin(&actor)?;

    let target = users_db_operations::read_user_by_name(&conn, &name)?;
    let user = users_db_operations::update_flags(
        &conn,
        target.id,
        body.is_admin,
        body.is_active,
        body.permissions.as_ref().map(Option::as_deref),
    )?;
    log::info!(
        "User '{}' flags set to admin={} active={} by user id {}",
        user.name,
        user.is_admin,
        user.is_active,
        actor.impersonated_by.unwrap_or(actor.id)
    );

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Flags for user {} updated", user.name),
        "user": user,
    })))
}
