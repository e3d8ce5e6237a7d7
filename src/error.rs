use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ports::RepositoryError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("No eligible records: {0}")]
    NoEligibleRecords(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::NoEligibleRecords(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(what) => AppError::NotFound(what),
            RepositoryError::InvalidKey(key) => AppError::InvalidInput(key),
            RepositoryError::Unavailable(reason) => AppError::StorageUnavailable(reason),
            RepositoryError::Conflict(_) | RepositoryError::Decode(_) => {
                AppError::Internal(err.to_string())
            }
        }
    }
}

impl From<crate::validation::ValidationError> for AppError {
    fn from(err: crate::validation::ValidationError) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl From<crate::domain::UnknownVariant> for AppError {
    fn from(err: crate::domain::UnknownVariant) -> Self {
        AppError::InvalidInput(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error_status_code() {
        let error = AppError::NotFound("PET000001".to_string());
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_input_error_status_code() {
        let error = AppError::InvalidInput("bad status".to_string());
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_storage_unavailable_error_status_code() {
        let error = AppError::StorageUnavailable("connection refused".to_string());
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_no_eligible_records_is_client_visible() {
        let error = AppError::NoEligibleRecords("no paid records".to_string());
        assert!(error.status_code().is_client_error());
    }

    #[test]
    fn test_unauthorized_error_status_code() {
        let error = AppError::Unauthorized("bad token".to_string());
        assert_eq!(error.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_repository_errors_map_to_taxonomy() {
        let err: AppError = RepositoryError::Unavailable("down".to_string()).into();
        assert!(matches!(err, AppError::StorageUnavailable(_)));

        let err: AppError = RepositoryError::NotFound("x".to_string()).into();
        assert!(matches!(err, AppError::NotFound(_)));

        let err: AppError = RepositoryError::Conflict("PET000001".to_string()).into();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_not_found_error_response() {
        let error = AppError::NotFound("Pet not found".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_storage_error_response() {
        let error = AppError::StorageUnavailable("down".to_string());
        let response = error.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
