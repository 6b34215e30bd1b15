use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use orchestrator::OrchestratorError;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    Internal(String),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::WorkflowExists(_) => AppError::Conflict(err.to_string()),
            OrchestratorError::WorkflowNotFound(_) => AppError::NotFound(err.to_string()),
            OrchestratorError::Core(e) => AppError::BadRequest(e.to_string()),
            OrchestratorError::PhaseFailed { .. } => AppError::Internal(err.to_string()),
        }
    }
}

impl From<crewflow_core::CoreError> for AppError {
    fn from(err: crewflow_core::CoreError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_errors_map_to_distinct_statuses() {
        let conflict = AppError::from(OrchestratorError::WorkflowExists("wf".to_string()));
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);

        let missing = AppError::from(OrchestratorError::WorkflowNotFound("wf".to_string()));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = AppError::from(crewflow_core::CoreError::InvalidRequest("array".to_string()));
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);
    }
}
