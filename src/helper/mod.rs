pub mod auth_helpers;
pub mod query_helpers;
pub mod validation_helpers;
