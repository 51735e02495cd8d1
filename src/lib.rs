use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use helper::auth_helpers::JwtKeys;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub keys: JwtKeys,
    pub bcrypt_cost: u32,
}

pub mod config;
pub mod errors;
pub mod helper;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod setup;
