// Map workbench errors onto HTTP responses
use crate::domain::error::WorkbenchError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

impl WorkbenchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkbenchError::Configuration(_) | WorkbenchError::Validation(_) => {
                StatusCode::BAD_REQUEST
            }
            WorkbenchError::CapabilityDenied(_) => StatusCode::FORBIDDEN,
            WorkbenchError::EmptyResult(_) => StatusCode::NOT_FOUND,
            WorkbenchError::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for WorkbenchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
