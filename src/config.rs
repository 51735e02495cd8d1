use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    // Populated from the .env file
    pub database_path: String,
    pub jwt_private_key_path: String,
    pub jwt_public_key_path: String,
    pub docs_path: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub db_pool_size: u32,
    pub bcrypt_cost: u32,
}

fn required_var(name: &str) -> Result<String, config::ConfigError> {
    env::var(name).map_err(|_| {
        config::ConfigError::Message(format!(
            "FATAL: Environment variable '{}' is not set in your .env file.",
            name
        ))
    })
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, config::ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map_err(|_| {
            config::ConfigError::Message(format!(
                "FATAL: Environment variable '{}' has an invalid value ('{}').",
                name, raw
            ))
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path).map_err(|e| {
            config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}",
                env_path.display(),
                e
            ))
        })?;

        let database_path = required_var("DATABASE_PATH")?;
        let jwt_private_key_path = required_var("JWT_PRIVATE_KEY_PATH")?;
        let jwt_public_key_path = required_var("JWT_PUBLIC_KEY_PATH")?;

        let docs_path = env::var("DOCS_PATH").unwrap_or_else(|_| "./docs".to_string());
        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_default();
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let db_pool_size = parsed_var("DB_POOL_SIZE", 8u32)?;
        let bcrypt_cost = parsed_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?;

        if Path::new(&database_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'DATABASE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                database_path
            )));
        }

        if db_pool_size == 0 {
            return Err(config::ConfigError::Message(
                "FATAL: 'DB_POOL_SIZE' must be at least 1.".to_string(),
            ));
        }

        // bcrypt only accepts costs in this range
        if !(4..=31).contains(&bcrypt_cost) {
            return Err(config::ConfigError::Message(format!(
                "FATAL: 'BCRYPT_COST' must be between 4 and 31 (got {}).",
                bcrypt_cost
            )));
        }

        let builder = config::Config::builder()
            // Host and port live in the TOML file.
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("jwt_private_key_path", jwt_private_key_path)?
            .set_override("jwt_public_key_path", jwt_public_key_path)?
            .set_override("docs_path", docs_path)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("db_pool_size", db_pool_size)?
            .set_override("bcrypt_cost", bcrypt_cost)?
            .build()?;

        builder.try_deserialize()
    }

    /// Full path to the SQLite database file inside `DATABASE_PATH`.
    pub fn db_file_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path).join("postedit.db")
    }
}
