//! Domain error to HTTP status mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::shared::DomainError;

use super::common::ApiResponse;

/// Wrapper so domain errors can bubble out of handlers with `?`.
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DomainError::NotFound { .. } => StatusCode::NOT_FOUND,
            DomainError::Validation(_) | DomainError::Integrity(_) => StatusCode::BAD_REQUEST,
            DomainError::Conflict(_) | DomainError::StationAtCapacity { .. } => {
                StatusCode::CONFLICT
            }
            DomainError::Forbidden(_) => StatusCode::FORBIDDEN,
            DomainError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ApiResponse::<()>::error(self.0.to_string());
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
