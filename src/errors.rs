use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

const BEARER_CHALLENGE: &str = r#"Bearer realm="User Visible Realm""#;
const BASIC_CHALLENGE: &str = r#"Basic realm="User Visible Realm""#;

/// Every failure a handler can return. Each variant maps onto exactly one
/// HTTP status; internal failures are logged and never leak their cause.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("Invalid token")]
    InvalidToken,
    #[error("{0}")]
    InvalidCredentials(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
    #[error("Password hashing error: {0}")]
    Hashing(#[from] bcrypt::BcryptError),
    #[error("Token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        ApiError::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        ApiError::Forbidden(msg.into())
    }

    fn is_internal(&self) -> bool {
        matches!(
            self,
            ApiError::Internal(_)
                | ApiError::Database(_)
                | ApiError::Pool(_)
                | ApiError::Hashing(_)
                | ApiError::Token(_)
        )
    }

    fn challenge(&self) -> Option<&'static str> {
        match self {
            ApiError::Unauthorized(_) | ApiError::InvalidToken => Some(BEARER_CHALLENGE),
            ApiError::InvalidCredentials(_) => Some(BASIC_CHALLENGE),
            _ => None,
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) | ApiError::InvalidToken | ApiError::InvalidCredentials(_) => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_)
            | ApiError::Database(_)
            | ApiError::Pool(_)
            | ApiError::Hashing(_)
            | ApiError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        if let Some(challenge) = self.challenge() {
            builder.insert_header((header::WWW_AUTHENTICATE, challenge));
        }

        if self.is_internal() {
            log::error!("Error executing request: {}", self);
            builder.json(json!({ "error": "Internal server error" }))
        } else {
            builder.json(json!({ "error": self.to_string() }))
        }
    }
}

/// Turns actix's own extractor failures (bad JSON, bad path segments) into
/// the same `{"error": ...}` shape as every other client error.
pub fn extractor_error(err: impl std::fmt::Display) -> actix_web::Error {
    ApiError::BadRequest(err.to_string()).into()
}
