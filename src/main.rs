use std::io;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use tuition_backend::config::Config;
use tuition_backend::data::database::Database;
use tuition_backend::error;
use tuition_backend::state::AppState;
use tuition_backend::utils::gateway::SandboxGateway;
use tuition_backend::utils::identity::HmacTokenVerifier;
use tuition_backend::utils::routes;

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn startup_error(err: impl std::fmt::Display) -> io::Error {
    io::Error::other(err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    init_logging();

    let config = Config::from_env().map_err(startup_error)?;

    let db = Database::open(&config.database_path, config.busy_timeout).map_err(startup_error)?;
    let identity = HmacTokenVerifier::new(&config.token_secret).map_err(startup_error)?;

    let server_url = format!("http://{}:{}", config.host, config.port);
    if config.production {
        warn!("the sandbox gateway never completes sessions in production; checkout confirmation will fail");
    } else {
        warn!("payments run against the sandbox gateway and are paid immediately");
    }
    let payments = SandboxGateway::new(config.client_url.clone(), !config.production);

    let state = web::Data::new(AppState::new(
        db,
        Arc::new(identity),
        Arc::new(payments),
        config.client_url.clone(),
    ));

    info!(url = %server_url, production = config.production, "starting server");

    let cors_origin = config.cors_origin.clone();
    let production = config.production;
    HttpServer::new(move || {
        let cors = match &cors_origin {
            Some(origin) => Cors::default()
                .allowed_origin(origin)
                .allow_any_method()
                .allow_any_header()
                .max_age(3600),
            None => Cors::permissive(),
        };

        App::new()
            .wrap(middleware::Condition::new(production, error::redact_server_errors()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
