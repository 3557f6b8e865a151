use std::net::SocketAddr;
use std::sync::Arc;

use calendar_admin_api::{
    authz::PgPrincipalStore, build_router, config::Config, db::Database, telemetry, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = Config::load()?;

    // Initialize tracing
    telemetry::init(&config.logging);
    tracing::info!("Configuration loaded successfully");

    // Initialize database connections
    let db = Database::connect(&config.database).await?;
    tracing::info!("Database connections established");

    if config.database.run_migrations {
        db.run_migrations().await?;
    }

    // Build application state
    let principals = Arc::new(PgPrincipalStore::new(db.pg.clone()));
    let state = AppState::new(config.clone(), db, principals)?;
    tracing::info!(baseline = %state.authorizer.baseline(), "Authorization policy loaded");

    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
