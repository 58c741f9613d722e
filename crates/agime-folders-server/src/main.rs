//! AGIME Folders Server - Standalone folder hierarchy service
//!
//! Serves the folder API over in-memory stores, optionally seeded from a
//! JSON file.

mod config;
mod seed;

use agime_folders::FolderService;
use anyhow::Result;
use axum::{http::HeaderValue, response::Json, routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::seed::Seed;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "agime_folders=info,agime_folders_server=info,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    info!(
        "Starting AGIME Folders Server on {}:{}",
        config.host, config.port
    );

    let seed = match &config.seed_file {
        Some(path) => {
            let seed = Seed::load(path)?;
            info!(
                "Loaded seed {}: {} folders, {} documents",
                path.display(),
                seed.folders.len(),
                seed.documents.len()
            );
            seed
        }
        None => Seed::default(),
    };
    let (folders, documents) = seed.into_stores();
    let service = Arc::new(FolderService::new(
        Arc::new(folders),
        Arc::new(documents),
        config.folders.clone(),
    ));

    // Warm auto-refreshing smart folders
    let scheduled = service.notify_documents_changed().await?;
    info!("Scheduled {} smart folder refreshes", scheduled);

    let app = build_router(service, &config);

    let addr = SocketAddr::new(config.host.parse()?, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(service: Arc<FolderService>, config: &Config) -> Router {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();
    let cors = if origins.is_empty() {
        CorsLayer::new().allow_origin(Any)
    } else {
        CorsLayer::new().allow_origin(origins)
    };
    let cors = cors.allow_methods(Any).allow_headers(Any);

    let public_routes = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check));

    Router::new()
        .merge(public_routes)
        .nest("/api", agime_folders::routes::router(service))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn root() -> &'static str {
    "AGIME Folders Server"
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
