//! Route table for the file endpoints

use crate::{models::ApiResponse, AppState};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use super::files;

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/files/upload", post(files::upload_file))
        .route("/api/files/upload-many", post(files::upload_many))
        .route("/api/files/upload-compressed", post(files::upload_compressed))
        .route("/api/files/upload-many-compressed", post(files::upload_many_compressed))
        .route("/api/files/compress", post(files::compress_file))
        .route(
            "/api/files/:name",
            get(files::download_file).delete(files::delete_file),
        )
}

async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(serde_json::json!({
        "status": "healthy",
        "app": state.app_name,
        "version": state.version,
        "layout": state.file_manager.layout(),
        "root_folder": state.file_manager.config().root_folder_name,
    })))
}
