use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::StorageLayout,
    error::{AppError, Result},
    files::{Destination, FileCategory, FileUpload, RequestOrigin, StoredFile},
    models::ApiResponse,
    AppState,
};

const MEGABYTE: usize = 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
pub struct DestinationQuery {
    pub category: Option<String>,
    pub subfolder: Option<String>,
    pub limit_mb: Option<f64>,
}

impl DestinationQuery {
    /// Explicit destination, if the caller named one.
    pub fn destination(&self) -> Result<Option<Destination>> {
        match (&self.category, &self.subfolder) {
            (Some(_), Some(_)) => Err(AppError::BadRequest(
                "Specify either category or subfolder, not both".to_string(),
            )),
            (Some(category), None) => {
                let category = category.parse::<FileCategory>().map_err(AppError::BadRequest)?;
                Ok(Some(Destination::Category(category)))
            }
            (None, Some(subfolder)) => Ok(Some(Destination::subfolder(subfolder)?)),
            (None, None) => Ok(None),
        }
    }

    /// Destination for an upload; falls back to `Other` or the root folder.
    pub fn upload_destination(&self, layout: StorageLayout) -> Result<Destination> {
        Ok(self.destination()?.unwrap_or(match layout {
            StorageLayout::Category => Destination::Category(FileCategory::Other),
            StorageLayout::Subfolder => Destination::root(),
        }))
    }
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
    pub count: usize,
}

/// Scheme and host the client used, for building absolute file URLs.
pub fn request_origin(headers: &HeaderMap) -> Option<RequestOrigin> {
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");

    Some(RequestOrigin::new(scheme, host))
}

fn multipart_error(err: MultipartError, limit_bytes: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!(
            "Request body exceeds the upload limit of {} MB; send fewer or smaller files",
            limit_bytes.div_ceil(MEGABYTE)
        ))
    } else {
        AppError::BadRequest(format!("Failed to read multipart data: {}", err.body_text()))
    }
}

async fn read_uploads(multipart: &mut Multipart, limit_bytes: usize) -> Result<Vec<FileUpload>> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_bytes))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, limit_bytes))?;

        uploads.push(FileUpload::new(filename, content_type, data.to_vec()));
    }

    Ok(uploads)
}

async fn read_single_upload(multipart: &mut Multipart, limit_bytes: usize) -> Result<FileUpload> {
    read_uploads(multipart, limit_bytes)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| AppError::BadRequest("No file found in request".to_string()))
}

pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DestinationQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<StoredFile>>> {
    let destination = query.upload_destination(state.file_manager.layout())?;
    let limit_bytes = state.file_manager.config().max_request_bytes();
    let upload = read_single_upload(&mut multipart, limit_bytes).await?;
    let origin = request_origin(&headers);

    let stored = state
        .file_manager
        .upload(upload, &destination, origin.as_ref())
        .await?;

    Ok(Json(ApiResponse::success(stored)))
}

pub async fn upload_many(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DestinationQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<StoredFile>>>> {
    let destination = query.upload_destination(state.file_manager.layout())?;
    let limit_bytes = state.file_manager.config().max_request_bytes();
    let uploads = read_uploads(&mut multipart, limit_bytes).await?;
    let origin = request_origin(&headers);

    let stored = state
        .file_manager
        .upload_many(uploads, &destination, query.limit_mb, origin.as_ref())
        .await?;

    Ok(Json(ApiResponse::success(stored)))
}

pub async fn upload_compressed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DestinationQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<StoredFile>>> {
    let destination = query.upload_destination(state.file_manager.layout())?;
    let limit_bytes = state.file_manager.config().max_request_bytes();
    let upload = read_single_upload(&mut multipart, limit_bytes).await?;
    let origin = request_origin(&headers);

    let stored = state
        .file_manager
        .upload_compressed(upload, &destination, origin.as_ref())
        .await?;

    Ok(Json(ApiResponse::success(stored)))
}

pub async fn upload_many_compressed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<DestinationQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Vec<StoredFile>>>> {
    let destination = query.upload_destination(state.file_manager.layout())?;
    let limit_bytes = state.file_manager.config().max_request_bytes();
    let uploads = read_uploads(&mut multipart, limit_bytes).await?;
    let origin = request_origin(&headers);

    let stored = state
        .file_manager
        .upload_many_compressed(uploads, &destination, query.limit_mb, origin.as_ref())
        .await?;

    Ok(Json(ApiResponse::success(stored)))
}

pub async fn compress_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Response> {
    let limit_bytes = state.file_manager.config().max_request_bytes();
    let upload = read_single_upload(&mut multipart, limit_bytes).await?;

    let stem = std::path::Path::new(&upload.original_filename)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("archive")
        .to_string();
    let archive = state.file_manager.compress(upload).await?;

    let disposition = format!("attachment; filename=\"{}.zip\"", stem.replace('"', "\\\""));
    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];

    Ok((headers, archive).into_response())
}

pub async fn download_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<DestinationQuery>,
) -> Result<Response> {
    let data = match query.destination()? {
        Some(destination) => state.file_manager.download(&name, &destination).await?,
        None => state.file_manager.download_by_name(&name).await?,
    };

    let content_type = mime_guess::from_path(&name).first_or_octet_stream();
    let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "\\\""));
    let headers = [
        (header::CONTENT_TYPE, content_type.to_string()),
        (header::CONTENT_DISPOSITION, disposition),
    ];

    Ok((headers, data).into_response())
}

pub async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<DestinationQuery>,
) -> Result<Json<ApiResponse<DeleteResponse>>> {
    let count = match query.destination()? {
        Some(destination) => {
            state.file_manager.delete(&name, &destination).await?;
            1
        }
        None => state.file_manager.delete_by_name(&name).await?,
    };

    Ok(Json(
        ApiResponse::success(DeleteResponse { deleted: true, count })
            .with_message(format!("Deleted {} file(s)", count)),
    ))
}
