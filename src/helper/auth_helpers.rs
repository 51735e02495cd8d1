//! Password hashing, access tokens, and the "who is acting" protocol.
//!
//! A request is authorized in three steps:
//!
//! 1. [`verify_token`] checks the bearer token and yields its [`Claims`].
//! 2. [`resolve_acting_identity`] turns the claims into an [`Actor`]. An admin
//!    who passes `actingAsUserId` becomes that user for the rest of the
//!    request; everyone else acts as themselves.
//! 3. [`require_ownership`] compares the actor with the owner of the row
//!    being changed.

use crate::errors::{ApiError, ApiResult};
use crate::models::db_operations::users_db_operations;
use crate::models::User;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Access tokens expire one hour after issuance.
pub const TOKEN_TTL_SECS: i64 = 60 * 60;

#[derive(Error, Debug)]
pub enum AuthKeyError {
    #[error("Failed to read key file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid RSA key in '{path}': {source}")]
    InvalidKey {
        path: String,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

/// The RSA key pair used for RS256. The private half never leaves this
/// module; the public PEM is served as-is so clients can verify tokens.
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    public_pem: String,
}

impl JwtKeys {
    pub fn from_pem(private_pem: &[u8], public_pem: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        Ok(JwtKeys {
            encoding: EncodingKey::from_rsa_pem(private_pem)?,
            decoding: DecodingKey::from_rsa_pem(public_pem.as_bytes())?,
            public_pem: public_pem.to_string(),
        })
    }

    pub fn from_pem_files(private_path: &Path, public_path: &Path) -> Result<Self, AuthKeyError> {
        let read = |path: &Path| {
            fs::read_to_string(path).map_err(|source| AuthKeyError::Io {
                path: path.display().to_string(),
                source,
            })
        };
        let private_pem = read(private_path)?;
        let public_pem = read(public_path)?;

        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes()).map_err(|source| {
            AuthKeyError::InvalidKey { path: private_path.display().to_string(), source }
        })?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes()).map_err(|source| {
            AuthKeyError::InvalidKey { path: public_path.display().to_string(), source }
        })?;

        Ok(JwtKeys { encoding, decoding, public_pem })
    }

    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub name: String,
    pub id: i64,
    pub iat: i64,
    pub exp: i64,
}

/// The identity a request acts as once impersonation is resolved.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
    /// Id of the admin acting on this user's behalf, if any.
    pub impersonated_by: Option<i64>,
    /// Admin flag of the token's own user, which may differ from
    /// `is_admin` while impersonating.
    #[serde(skip)]
    pub verified_is_admin: bool,
}

impl Actor {
    fn from_user(user: &User, verified: &User, impersonated_by: Option<i64>) -> Self {
        Actor {
            id: user.id,
            name: user.name.clone(),
            is_admin: user.is_admin,
            impersonated_by,
            verified_is_admin: verified.is_admin,
        }
    }
}

/// Verified bearer claims plus the optional impersonation target taken from
/// the query string. Produced by the request extractor in `middleware`.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub claims: Claims,
    pub acting_as_user_id: Option<i64>,
}

pub fn hash_password(password: &str, cost: u32) -> ApiResult<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// A stored hash that bcrypt cannot parse never matches.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

pub fn issue_token(keys: &JwtKeys, name: &str, id: i64) -> ApiResult<String> {
    let iat = Utc::now().timestamp();
    let claims = Claims {
        name: name.to_string(),
        id,
        iat,
        exp: iat + TOKEN_TTL_SECS,
    };
    Ok(encode(&Header::new(Algorithm::RS256), &claims, &keys.encoding)?)
}

/// Checks an `Authorization` header value. Anything other than
/// `Bearer <token>` counts as a missing token.
pub fn verify_token(keys: &JwtKeys, authorization: Option<&str>) -> ApiResult<Claims> {
    let token = authorization
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Missing token".to_string()))?;

    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = 0;

    decode::<Claims>(token, &keys.decoding, &validation)
        .map(|data| data.claims)
        .map_err(|e| {
            log::debug!("Rejected bearer token: {}", e);
            ApiError::InvalidToken
        })
}

/// Maps verified claims to the identity the request acts as.
pub fn resolve_acting_identity(conn: &Connection, auth: &AuthenticatedUser) -> ApiResult<Actor> {
    let verified = users_db_operations::read_user_by_id(conn, auth.claims.id)?
        .filter(|user| user.name == auth.claims.name)
        .ok_or(ApiError::InvalidToken)?;

    if !verified.is_active {
        return Err(ApiError::forbidden("Account is suspended"));
    }

    match auth.acting_as_user_id {
        Some(target_id) if verified.is_admin => {
            let target = users_db_operations::read_user_by_id(conn, target_id)?
                .ok_or_else(|| ApiError::not_found(format!("No user found with ID {}", target_id)))?;
            log::info!(
                "Admin '{}' (id {}) acting as user '{}' (id {})",
                verified.name,
                verified.id,
                target.name,
                target.id
            );
            Ok(Actor::from_user(&target, &verified, Some(verified.id)))
        }
        Some(target_id) => {
            log::warn!(
                "Ignoring actingAsUserId={} from non-admin user '{}'",
                target_id,
                verified.name
            );
            Ok(Actor::from_user(&verified, &verified, None))
        }
        None => Ok(Actor::from_user(&verified, &verified, None)),
    }
}

/// `message` completes the sentence "You can only ...".
pub fn require_ownership(owner_id: i64, actor: &Actor, message: &str) -> ApiResult<()> {
    if owner_id != actor.id {
        return Err(ApiError::forbidden(format!("You can only {}", message)));
    }
    Ok(())
}

/// Checks the token's own user, so an admin impersonating a regular user
/// still passes and impersonating an admin grants nothing extra.
pub fn require_admin(actor: &Actor) -> ApiResult<()> {
    if actor.verified_is_admin {
        Ok(())
    } else {
        Err(ApiError::forbidden("Only administrators can do this"))
    }
}

/// Password check for account operations that take a password instead of a
/// token (login, password and email changes, account deletion).
pub fn check_account_credentials(conn: &Connection, name: &str, password: &str) -> ApiResult<User> {
    let (user, hash) = users_db_operations::read_credentials(conn, name)?;
    if !verify_password(password, &hash) {
        return Err(ApiError::InvalidCredentials("Incorrect password".to_string()));
    }
    if !user.is_active {
        return Err(ApiError::forbidden("Account is suspended"));
    }
    Ok(user)
}
