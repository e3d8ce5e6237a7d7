use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::services::RegistrationRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PhotoParams {
    pub filename: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegistrationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state.registry.register(payload).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "pet_id": receipt.identifier,
            "scan_url": receipt.scan_url,
        })),
    ))
}

/// Raw image bytes in the body; the original filename travels as `?filename=`.
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
    Query(params): Query<PhotoParams>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let filename = params.filename.unwrap_or_else(|| "photo.jpg".to_string());
    let photo_url = state.registry.attach_photo(&pet_id, &filename, &body).await?;

    Ok(Json(json!({ "success": true, "photo_url": photo_url })))
}

pub async fn scan(
    State(state): State<AppState>,
    Path(pet_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.registry.scan(&pet_id).await?))
}
