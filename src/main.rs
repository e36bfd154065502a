use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use reservagym::auth::AuthService;
use reservagym::configuration::get_configuration;
use reservagym::startup::run;
use reservagym::store::PgStore;
use reservagym::telemetry::init_telemetry;

fn startup_error(kind: std::io::ErrorKind, message: &str) -> std::io::Error {
    std::io::Error::new(kind, message.to_string())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    configuration.jwt.validate().map_err(|e| {
        tracing::error!("Invalid JWT configuration: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;
    tracing::info!("Configuration loaded successfully");

    tracing::info!("Attempting to connect to database");
    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            startup_error(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
        tracing::error!("Failed to run migrations: {}", e);
        startup_error(std::io::ErrorKind::Other, "Migration error")
    })?;
    tracing::info!("Database ready");

    let auth_service = AuthService::new(
        Arc::new(PgStore::new(pool)),
        configuration.jwt.clone(),
        &configuration.password,
    )
    .map_err(|e| {
        tracing::error!("Failed to build auth service: {}", e);
        startup_error(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, auth_service, configuration.application.static_dir.clone())?.await
}
