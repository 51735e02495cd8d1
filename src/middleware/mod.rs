use actix_web::{dev, http::header, web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use serde::Deserialize;

use crate::errors::ApiError;
use crate::helper::auth_helpers::{self, AuthenticatedUser};
use crate::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActingAsQuery {
    acting_as_user_id: Option<i64>,
}

fn authenticate(req: &HttpRequest) -> Result<AuthenticatedUser, ApiError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("AppState is not registered".to_string()))?;

    let authorization = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let claims = auth_helpers::verify_token(&state.keys, authorization)?;

    let acting_as_user_id = web::Query::<ActingAsQuery>::from_query(req.query_string())
        .map_err(|_| ApiError::bad_request("actingAsUserId must be an integer user ID"))?
        .into_inner()
        .acting_as_user_id;

    Ok(AuthenticatedUser { claims, acting_as_user_id })
}

/// Requires a valid bearer token. Handlers still call
/// `auth_helpers::resolve_acting_identity` with their own connection to learn
/// who is acting.
impl FromRequest for AuthenticatedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut dev::Payload) -> Self::Future {
        ready(authenticate(req).map_err(actix_web::Error::from))
    }
}
