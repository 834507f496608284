use secrecy::ExposeSecret;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use carte_handicap::api::{self, AppState};
use carte_handicap::config::Config;
use carte_handicap::db::{self, PgStore};
use carte_handicap::services::{documents::LocalDocumentStore, password::Argon2Hasher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carte_handicap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting carte-handicap server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        upload_dir = %config.upload_dir.display(),
        admin_token = config.admin_token.is_some(),
        "Configuration loaded successfully"
    );

    // Create database pool
    let pool = db::create_pool(
        config.database_url.expose_secret(),
        config.database_max_connections,
    )
    .await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let state = AppState {
        store: Arc::new(PgStore::new(pool)),
        documents: Arc::new(LocalDocumentStore::new(
            config.upload_dir.clone(),
            config.max_upload_bytes,
        )),
        hasher: Arc::new(Argon2Hasher::new()),
        config: Arc::new(config.clone()),
    };

    let app = api::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr = config.bind_address();
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
