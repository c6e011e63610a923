//! File management for web applications: validation, storage, retrieval,
//! deletion and zip compression of uploads under a configurable root
//! folder, plus the axum routes that expose it.

pub mod config;
pub mod error;
pub mod files;
pub mod handlers;
pub mod middleware;
pub mod models;

pub use config::{AppConfig, FileConfig, LinkStyle, ServerConfig, StorageLayout};
pub use error::{AppError, Result};
pub use files::{
    Destination, FileCategory, FileManager, FileUpload, FileValidator, LocalStorage, PathResolver,
    RequestOrigin, StorageBackend, StoredFile, Subfolder, ValidationError,
};
pub use handlers::routes::create_routes;

use axum::{extract::DefaultBodyLimit, Router};
use std::net::SocketAddr;
use tokio::signal;
use tower_http::services::ServeDir;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub app_name: String,
    pub version: String,
    pub file_manager: FileManager,
}

impl AppState {
    pub fn new(file_manager: FileManager) -> Self {
        Self {
            app_name: "File Manager".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            file_manager,
        }
    }
}

/// Builds the router: file endpoints, read-only static serving of the root
/// folder at `/<root folder name>`, and request tracing.
pub fn create_app(state: AppState) -> Result<Router> {
    let root_directory = state.file_manager.root_directory()?;
    let static_prefix = format!("/{}", state.file_manager.config().root_folder_name);
    let body_limit = state.file_manager.config().max_request_bytes();

    info!(
        "Serving {} at {}",
        root_directory.display(),
        static_prefix
    );

    let router = Router::new()
        .merge(create_routes())
        .nest_service(&static_prefix, ServeDir::new(root_directory))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::logging::logging_layer())
        .with_state(state);

    Ok(router)
}

pub async fn run_server(app: Router, addr: SocketAddr) -> Result<()> {
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
