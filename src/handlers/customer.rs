use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;

use crate::domain::ReplacementReason;
use crate::error::AppError;
use crate::middleware::auth::CustomerIdentity;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub pet_id: String,
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplacementRequest {
    pub reason: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        state
            .customers
            .login(&payload.pet_id, &payload.email)
            .await?,
    ))
}

pub async fn my_pet(
    State(state): State<AppState>,
    CustomerIdentity(pet_id): CustomerIdentity,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.customers.view(&pet_id).await?))
}

pub async fn request_replacement(
    State(state): State<AppState>,
    CustomerIdentity(pet_id): CustomerIdentity,
    Json(payload): Json<ReplacementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reason: ReplacementReason = payload.reason.parse()?;
    let replacement = state
        .replacements
        .request_replacement(&pet_id, reason)
        .await?;

    Ok((StatusCode::CREATED, Json(replacement)))
}
