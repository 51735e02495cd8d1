use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use thiserror::Error;

use crate::DbPool;
use r2d2_sqlite::SqliteConnectionManager;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
    #[error("R2D2 Pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

/// Foreign keys are off by default in SQLite and the setting is per
/// connection, so every connection handed out must run this first.
pub fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

pub fn setup_database(conn: &mut Connection) -> Result<(), SetupError> {
    init_connection(conn)?;
    let tx = conn.transaction()?;

    log::info!("Creating 'users' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            is_admin INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            permissions TEXT,
            created_at TEXT NOT NULL,
            last_login_at TEXT
        )",
        [],
    )?;

    log::info!("Creating 'profiles' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL UNIQUE,
            display_name TEXT NOT NULL,
            bio TEXT,
            about TEXT,
            profile_picture_url TEXT,
            created_at TEXT NOT NULL,
            edited_at TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;

    log::info!("Creating 'posts' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            edited_at TEXT,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
        )",
        [],
    )?;

    log::info!("Creating 'comments' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            parent_id INTEGER,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            edited_at TEXT,
            FOREIGN KEY (post_id) REFERENCES posts(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
        )",
        [],
    )?;

    log::info!("Creating 'user_comments' table...");
    tx.execute(
        "CREATE TABLE IF NOT EXISTS user_comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_page_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            parent_id INTEGER,
            content TEXT NOT NULL,
            created_at TEXT NOT NULL,
            edited_at TEXT,
            FOREIGN KEY (user_page_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (parent_id) REFERENCES user_comments(id) ON DELETE CASCADE
        )",
        [],
    )?;

    tx.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_posts_user ON posts(user_id);
         CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
         CREATE INDEX IF NOT EXISTS idx_comments_user ON comments(user_id);
         CREATE INDEX IF NOT EXISTS idx_user_comments_page ON user_comments(user_page_id);",
    )?;

    tx.commit()?;
    Ok(())
}

/// Pool over an existing database file. Fails instead of creating an empty
/// file when the schema has not been set up yet.
pub fn open_pool(db_path: &Path, max_size: u32) -> Result<DbPool, SetupError> {
    let manager = SqliteConnectionManager::file(db_path)
        .with_flags(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX)
        .with_init(init_connection);
    Ok(r2d2::Pool::builder().max_size(max_size).build(manager)?)
}

/// A single-connection in-memory pool with the schema applied. Every
/// `:memory:` connection is its own database, hence one connection.
pub fn open_memory_pool() -> Result<DbPool, SetupError> {
    let manager = SqliteConnectionManager::memory().with_init(init_connection);
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    {
        let mut conn = pool.get()?;
        setup_database(&mut conn)?;
    }
    Ok(pool)
}
