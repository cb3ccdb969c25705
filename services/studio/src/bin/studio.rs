//! services/studio/src/bin/studio.rs

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use curriculum_core::store::{DraftStore, StoreConfig};
use curriculum_core::upload::UploadOrchestrator;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use studio_lib::{
    adapters::{HttpCourseApi, HttpMediaHost, OEmbedVideoMetadata, SqliteCache},
    config::Config,
    error::StudioError,
    web::{self, ApiDoc, AppState},
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), StudioError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting studio...");

    // --- 2. Open the Local Cache & Run Migrations ---
    info!("Opening local cache at {}", config.cache_database_url);
    let cache_pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&config.cache_database_url)
        .await?;
    let cache = Arc::new(SqliteCache::new(cache_pool));
    cache.run_migrations().await?;
    info!("Local cache migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let course_api = Arc::new(HttpCourseApi::new(
        http_client.clone(),
        config.course_api_url.clone(),
    ));
    let media_host = Arc::new(HttpMediaHost::new(
        http_client.clone(),
        config.media_upload_url.clone(),
        config.media_upload_preset.clone(),
        config.media_delete_url.clone(),
    ));
    let video_metadata = Arc::new(
        OEmbedVideoMetadata::new(http_client.clone())
            .map_err(|e| StudioError::Internal(format!("Invalid video link pattern: {}", e)))?,
    );

    // --- 4. Build the Draft Engine ---
    let store = DraftStore::new(
        course_api,
        cache,
        StoreConfig {
            autosave_debounce: config.autosave_debounce,
            autosave_policy: config.autosave_policy,
        },
    );
    match store.resume().await {
        Ok(Some(outcome)) => info!("Resumed the last course from {:?}", outcome.source),
        Ok(None) => info!("No course to resume."),
        Err(e) => warn!("Failed to resume the last course: {}", e),
    }
    let uploads = UploadOrchestrator::new(
        store.clone(),
        media_host,
        video_metadata,
        config.upload_concurrency,
    );

    let app_state = Arc::new(AppState {
        store: store.clone(),
        uploads,
    });

    // --- 5. Create the Web Router ---
    let allowed_origin = config
        .allowed_origin
        .parse::<HeaderValue>()
        .map_err(|e| StudioError::Internal(format!("Invalid ALLOWED_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(allowed_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(web::router(app_state).layer(cors))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // --- 7. Push Pending Edits Before Exiting ---
    match store.flush().await {
        Ok(outcome) => info!("Final save: {:?}", outcome),
        Err(e) => warn!("Final save skipped: {}", e),
    }
    store.dispose();
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received.");
}
