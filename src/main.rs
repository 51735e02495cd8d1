use actix_cors::Cors;
use actix_web::{http::header, middleware::{DefaultHeaders, Logger}, web, App, HttpServer};
use clap::Parser;
use postedit_backend::{
    config::Config,
    helper::auth_helpers::JwtKeys,
    routes,
    setup::db_setup,
    AppState,
};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "postedit_server", author, version, about = "Starts the PostEdit API server.")]
struct Cli {
    /// Path to the .env configuration file.
    #[arg(long, required = true, value_name = "FILE")]
    env_file: PathBuf,
}

fn build_cors(allowed_origins: &str) -> Cors {
    let cors = if allowed_origins.trim() == "*" {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };
    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env(&cli.env_file)
        .expect("FATAL: Failed to load or parse configuration.");

    env_logger::init_from_env(env_logger::Env::new().default_filter_or(&config.log_level));

    let db_path = config.db_file_path();
    if !db_path.exists() {
        panic!(
            "FATAL: Database not found at '{}'. Run 'cargo run --bin setup_cli -- --env-file <path> db setup'",
            db_path.display()
        );
    }
    let pool = db_setup::open_pool(&db_path, config.db_pool_size)
        .expect("FATAL: Failed to create Rusqlite connection pool.");

    let keys = JwtKeys::from_pem_files(
        Path::new(&config.jwt_private_key_path),
        Path::new(&config.jwt_public_key_path),
    )
    .expect("FATAL: Failed to load the JWT key pair.");

    let app_state = web::Data::new(AppState {
        keys,
        bcrypt_cost: config.bcrypt_cost,
    });
    let pool_data = web::Data::new(pool);

    let server_address = format!("{}:{}", config.web.host, config.web.port);
    log::info!("Server starting at http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .wrap(build_cors(&config.allowed_origins))
            .wrap(Logger::default())
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("X-Frame-Options", "DENY")),
            )
            .app_data(pool_data.clone())
            .app_data(app_state.clone())
            .configure(routes::configure)
            .service(actix_files::Files::new("/docs", &config.docs_path).index_file("index.html"))
    })
    .bind(server_address)?
    .run()
    .await
}
