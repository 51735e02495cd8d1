use clap::{Parser, Subcommand};
use postedit_backend::config::Config;
use postedit_backend::helper::auth_helpers;
use postedit_backend::models::db_operations::users_db_operations;
use postedit_backend::setup::db_setup;
use rusqlite::{params, Connection};
use std::fs;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup_cli", author, version, about = "A CLI for initial application setup.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand, Debug)]
enum DbAction {
    Setup,
}

#[derive(Subcommand, Debug)]
enum AdminAction {
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    List,
    /// Grants admin rights to an existing user.
    Promote {
        #[arg(long)]
        name: String,
    },
    ChangePassword {
        #[arg(long)]
        name: String,
        #[arg(long)]
        new_password: String,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    match &cli.command {
        Commands::Db { action: DbAction::Setup } => setup_database(&config),
        Commands::Admin { action } => {
            let Some(conn) = open_existing(&config) else { return };
            match action {
                AdminAction::Create { name, email, password } => {
                    create_admin_user(&conn, config.bcrypt_cost, name, email, password)
                }
                AdminAction::List => list_admin_users(&conn),
                AdminAction::Promote { name } => promote_user(&conn, name),
                AdminAction::ChangePassword { name, new_password } => {
                    change_password(&conn, config.bcrypt_cost, name, new_password)
                }
            }
        }
    }
}

fn setup_database(config: &Config) {
    let db_path = config.db_file_path();
    println!("\nSetting up database at '{}'...", db_path.display());

    if let Some(parent_dir) = db_path.parent() {
        fs::create_dir_all(parent_dir).expect("Could not create database directory.");
    }

    let mut conn = Connection::open(&db_path).expect("Could not create database file.");
    match db_setup::setup_database(&mut conn) {
        Ok(_) => println!("✅ Database setup completed successfully."),
        Err(e) => eprintln!("❌ Error setting up database: {}", e),
    }
}

fn open_existing(config: &Config) -> Option<Connection> {
    let db_path = config.db_file_path();
    if !db_path.exists() {
        eprintln!(
            "❌ Error: Database not found at '{}'. Please run `setup_cli db setup` first.",
            db_path.display()
        );
        return None;
    }
    let mut conn = match Connection::open(&db_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("❌ Error opening database: {}", e);
            return None;
        }
    };
    if let Err(e) = db_setup::init_connection(&mut conn) {
        eprintln!("❌ Error configuring database connection: {}", e);
        return None;
    }
    Some(conn)
}

fn create_admin_user(conn: &Connection, cost: u32, name: &str, email: &str, password: &str) {
    let hashed_password = match auth_helpers::hash_password(password, cost) {
        Ok(h) => h,
        Err(e) => {
            eprintln!("❌ Error hashing password: {}", e);
            return;
        }
    };

    let created = users_db_operations::create_user(conn, name, email, &hashed_password)
        .and_then(|user| users_db_operations::update_flags(conn, user.id, Some(true), Some(true), None));
    match created {
        Ok(user) => println!("✅ Admin user '{}' created with id {}.", user.name, user.id),
        Err(e) => eprintln!(
            "❌ Error creating admin user: {}. The name or email might already be taken.",
            e
        ),
    }
}

fn list_admin_users(conn: &Connection) {
    match users_db_operations::read_all_users(conn) {
        Ok(users) => {
            println!("Listing Admin Users:");
            for user in users.iter().filter(|u| u.is_admin) {
                let status = if user.is_active { "" } else { " (suspended)" };
                println!("- {} <{}> id={}{}", user.name, user.email, user.id, status);
            }
        }
        Err(e) => eprintln!("❌ Error fetching admins: {}", e),
    }
}

fn promote_user(conn: &Connection, name: &str) {
    match conn.execute("UPDATE users SET is_admin = 1 WHERE name = ?1", params![name]) {
        Ok(0) => eprintln!("❌ Error: No user named '{}' found.", name),
        Ok(_) => println!("✅ User '{}' is now an admin.", name),
        Err(e) => eprintln!("❌ Error promoting user: {}", e),
    }
}

fn change_password(conn: &Connection, cost: u32, name: &str, new_password: &str) {
    let user = match users_db_operations::read_user_by_name(conn, name) {
        Ok(u) => u,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            return;
        }
    };
    let result = auth_helpers::hash_password(new_password, cost)
        .and_then(|hash| users_db_operations::update_password_hash(conn, user.id, &hash));
    match result {
        Ok(_) => println!("✅ Password for user '{}' changed successfully.", user.name),
        Err(e) => eprintln!("❌ Error updating password: {}", e),
    }
}
