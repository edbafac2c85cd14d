use std::io;
use std::sync::Arc;

use dotenvy::dotenv;
use order_orchestrator::infrastructure::{
    build_client, DieselOrderStore, HttpCatalog, HttpUserValidator,
};
use order_orchestrator::{
    build_server, create_pool, run_migrations, ApiSettings, AppConfig, OrderService,
};

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    io::Error::other(format!("{context}: {err}"))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| startup_error("invalid configuration", e))?;

    let pool = create_pool(&config.database_url)
        .map_err(|e| startup_error("failed to create database pool", e))?;
    run_migrations(&pool).map_err(|e| startup_error("failed to run database migrations", e))?;

    let client = build_client(config.remote_timeout)
        .map_err(|e| startup_error("failed to build HTTP client", e))?;
    let service = OrderService::new(
        Arc::new(DieselOrderStore::new(pool)),
        Arc::new(HttpUserValidator::new(client.clone(), &config.user_service_url)),
        Arc::new(HttpCatalog::new(client, &config.product_service_url)),
    );

    log::info!(
        "Using user service at {} and product service at {}",
        config.user_service_url,
        config.product_service_url
    );
    log::info!("Starting server at http://{}:{}", config.host, config.port);

    build_server(service, ApiSettings::from(&config), &config.host, config.port)?.await
}
