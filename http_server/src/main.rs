//! Main entry point for the file manager server binary

use anyhow::Result;
use file_manager::{create_app, run_server, AppConfig, AppState, FileManager};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = AppConfig::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded successfully");
    info!("Server will bind to: {}", config.bind_address());

    let addr = config
        .socket_addr()
        .map_err(|e| anyhow::anyhow!("Invalid bind address: {}", e))?;

    info!(
        "Storage layout: {}, root folder: {}",
        config.files.layout, config.files.root_folder_name
    );

    let file_manager = FileManager::new(config.files);
    file_manager
        .initialize()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize file manager: {}", e))?;

    let state = AppState::new(file_manager);
    info!("App: {} v{}", state.app_name, state.version);

    let app = create_app(state)
        .map_err(|e| anyhow::anyhow!("Failed to build application: {}", e))?;

    run_server(app, addr).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        format!(
            "{}={},file_manager={},tower_http=debug",
            env!("CARGO_CRATE_NAME").replace('-', "_"),
            default_level,
            default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
