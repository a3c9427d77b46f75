//! Marketplace HTTP server.
//!
//! Wires the `PostgreSQL` store and REST payment gateway into the generic
//! router and serves it with graceful shutdown.

use bidhouse::config::Config;
use bidhouse::http::state::WebhookConfig;
use bidhouse::http::{app_router, AppState};
use bidhouse::providers::rest_gateway::RestPaymentGateway;
use bidhouse::stores::PostgresStore;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bidhouse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting BidHouse marketplace server");

    let config = Config::from_env();
    info!(
        host = %config.server.host,
        port = config.server.port,
        gateway = %config.gateway.base_url,
        "Configuration loaded"
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.postgres.max_connections)
        .min_connections(config.postgres.min_connections)
        .acquire_timeout(Duration::from_secs(config.postgres.connect_timeout))
        .connect(&config.postgres.url)
        .await?;
    info!("Database connected");

    let store = PostgresStore::new(pool);
    store.migrate().await?;
    info!("Migrations applied");

    let gateway = RestPaymentGateway::new(&config.gateway)?;

    let state = AppState::new(
        store.clone(),
        store.clone(),
        store,
        gateway,
        config.fees.clone(),
        WebhookConfig {
            secret: config.gateway.webhook_secret.clone(),
            tolerance: config.gateway.webhook_tolerance,
        },
    );
    let app = app_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        },
    }
}
