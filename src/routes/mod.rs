use crate::errors;
use actix_web::web;

pub mod auth;
pub mod comments;
pub mod posts;
pub mod profile;
pub mod public;
pub mod users;

/// Registers every API route plus the JSON/path extractor settings. Static
/// docs are mounted separately by the server binary.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(64 * 1024)
            .error_handler(|err, _req| errors::extractor_error(err)),
    )
    .app_data(web::PathConfig::default().error_handler(|err, _req| errors::extractor_error(err)))
    .configure(public::config_api)
    .configure(auth::config_auth)
    .configure(users::config_users)
    .configure(profile::config_own_profile)
    .configure(posts::config_posts);
}
