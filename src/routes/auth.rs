use crate::errors::ApiResult;
use crate::helper::auth_helpers::{self, AuthenticatedUser};
use crate::helper::query_helpers::get_conn;
use crate::{AppState, DbPool};
use actix_web::{web, HttpResponse};
use serde_json::json;

pub fn config_auth(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/whoami", web::get().to(whoami))
            .route("/refresh", web::post().to(refresh_token)),
    );
}

/// Shows both the identity the token proves and the identity the request
/// would act as, so clients can check an `actingAsUserId` before using it.
async fn whoami(pool: web::Data<DbPool>, auth: AuthenticatedUser) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let actor = auth_helpers::resolve_acting_identity(&conn, &auth)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Authenticated as {}", auth.claims.name),
        "claims": auth.claims,
        "actingAs": actor,
    })))
}

/// Always refreshes the token's own subject, never an impersonated user.
async fn refresh_token(
    pool: web::Data<DbPool>,
    state: web::Data<AppState>,
    auth: AuthenticatedUser,
) -> ApiResult<HttpResponse> {
    let conn = get_conn(&pool)?;
    let verified = AuthenticatedUser { claims: auth.claims.clone(), acting_as_user_id: None };
    let actor = auth_helpers::resolve_acting_identity(&conn, &verified)?;

    let token = auth_helpers::issue_token(&state.keys, &actor.name, actor.id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Token for user {} refreshed", actor.name),
        "id": actor.id,
        "token": token,
    })))
}
