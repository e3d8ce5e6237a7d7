//! Admin API. Every route here sits behind `middleware::auth::admin_auth`.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde_json::json;

use crate::domain::{PaymentStatus, PetFilter, ReplacementReason, TagStatus};
use crate::error::AppError;
use crate::services::billing::parse_payment_results;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PaymentStatusRequest {
    pub pet_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct TagStatusRequest {
    pub pet_id: String,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkTagStatusRequest {
    pub pet_ids: Vec<String>,
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct ManufacturingBatchRequest {
    pub pet_ids: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct ShippingBatchRequest {
    pub pet_ids: Vec<String>,
    pub courier: String,
    #[serde(default)]
    pub tracking_number: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplacementRequest {
    pub pet_id: String,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplacementQuery {
    pub pet_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeeAdjustmentRequest {
    pub percentage: BigDecimal,
}

/// The token was already checked by the middleware.
pub async fn login() -> impl IntoResponse {
    Json(json!({ "success": true }))
}

pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.billing.stats().await?))
}

pub async fn list_pets(
    State(state): State<AppState>,
    Query(filter): Query<PetFilter>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.registry.list_pets(&filter).await?))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    Json(payload): Json<PaymentStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status: PaymentStatus = payload.status.parse()?;
    state
        .billing
        .update_payment_status(&payload.pet_id, status)
        .await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn print_queue(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.lifecycle.print_queue().await?))
}

pub async fn update_tag_status(
    State(state): State<AppState>,
    Json(payload): Json<TagStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status: TagStatus = payload.status.parse()?;
    state.lifecycle.set_status(&payload.pet_id, status).await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn bulk_update_tags(
    State(state): State<AppState>,
    Json(payload): Json<BulkTagStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let status: TagStatus = payload.status.parse()?;
    let updated = state
        .lifecycle
        .bulk_set_status(&payload.pet_ids, status)
        .await?;

    Ok(Json(json!({ "success": true, "updated_count": updated })))
}

pub async fn create_manufacturing_batch(
    State(state): State<AppState>,
    Json(payload): Json<ManufacturingBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state
        .lifecycle
        .create_manufacturing_batch(&payload.pet_ids, &payload.notes)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_manufacturing_batches(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.lifecycle.list_manufacturing_batches().await?))
}

pub async fn start_manufacturing_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    state.lifecycle.start_manufacturing_batch(&batch_id).await?;
    Ok(Json(json!({ "success": true, "batch_id": batch_id })))
}

pub async fn complete_manufacturing_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        state
            .lifecycle
            .complete_manufacturing_batch(&batch_id)
            .await?,
    ))
}

pub async fn create_shipping_batch(
    State(state): State<AppState>,
    Json(payload): Json<ShippingBatchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = state
        .lifecycle
        .create_shipping_batch(&payload.pet_ids, &payload.courier, &payload.tracking_number)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn create_replacement(
    State(state): State<AppState>,
    Json(payload): Json<ReplacementRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reason: ReplacementReason = payload.reason.parse()?;
    let receipt = state
        .replacements
        .create_replacement(&payload.pet_id, reason)
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn list_replacements(
    State(state): State<AppState>,
    Query(query): Query<ReplacementQuery>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(
        state
            .replacements
            .list_replacements(query.pet_id.as_deref())
            .await?,
    ))
}

pub async fn generate_billing_csv(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    Ok(Json(state.billing.generate_billing_batch().await?))
}

pub async fn download_billing_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let bytes = state.billing.download(&filename).await?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    ))
}

/// Body is the bank's results CSV as-is.
pub async fn import_payment_results(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let results = parse_payment_results(body.as_ref())?;
    Ok(Json(state.billing.import_payment_results(&results).await?))
}

pub async fn adjust_fees(
    State(state): State<AppState>,
    Json(payload): Json<FeeAdjustmentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let adjustment = state
        .billing
        .apply_annual_fee_adjustment(payload.percentage)
        .await?;

    Ok(Json(json!({
        "success": true,
        "adjustment_id": adjustment.adjustment_id,
        "affected_count": adjustment.affected_count,
    })))
}
