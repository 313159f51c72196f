//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, HttpDiagnosisAdapter, MemoryAdapter},
    config::Config,
    error::ApiError,
    web::{router, state::AppState, ApiDoc},
};
use axum::Router;
use patient_portal_core::ports::{DocumentStore, IdentityService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Choose the Document Store & Identity Adapters ---
    let (store, identity): (Arc<dyn DocumentStore>, Arc<dyn IdentityService>) =
        match &config.database_url {
            Some(database_url) => {
                info!("Connecting to database...");
                let db_pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect(database_url)
                    .await?;
                let db_adapter = Arc::new(DbAdapter::new(db_pool));
                info!("Running database migrations...");
                db_adapter.run_migrations().await?;
                info!("Database migrations complete.");
                let store: Arc<dyn DocumentStore> = db_adapter.clone();
                let identity: Arc<dyn IdentityService> = db_adapter;
                (store, identity)
            }
            None => {
                warn!("DATABASE_URL is not set; data is kept in memory and lost on exit");
                let memory = Arc::new(MemoryAdapter::new());
                let store: Arc<dyn DocumentStore> = memory.clone();
                let identity: Arc<dyn IdentityService> = memory;
                (store, identity)
            }
        };

    // --- 3. Initialize the Diagnosis Client ---
    let diagnosis = Arc::new(HttpDiagnosisAdapter::new(config.diagnosis_timeout)?);
    info!("Diagnosis server: {}", config.diagnosis_host);

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        store,
        identity,
        diagnosis,
        config: config.clone(),
    });

    // --- 5. Create the Web Router ---
    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(router(app_state)?)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        info!("Shutdown signal received");
        on_signal.cancel();
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("Server stopped");
    Ok(())
}
