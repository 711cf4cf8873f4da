//! Error abstractions.

use axum::http::StatusCode;
use axum::Json;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{Status, StatusDetails};
use serde_json::Value;

pub use things_core::AppError;

/// The response type of all API handlers.
pub type ApiResponse = (StatusCode, Json<Value>);

/// An extension trait for the core `AppError`.
pub trait AppErrorExt {
    /// Get the HTTP status code and the Kubernetes `Status` object for this error.
    fn into_status(self) -> (StatusCode, Status);

    /// Render this error as an API response.
    fn into_response(self) -> ApiResponse;
}

impl AppErrorExt for AppError {
    fn into_status(self) -> (StatusCode, Status) {
        let message = self.to_string();
        let (code, reason, details) = match self {
            AppError::NotFound { resource, name } => (
                StatusCode::NOT_FOUND,
                "NotFound",
                Some(StatusDetails {
                    group: Some(resource.group),
                    kind: Some(resource.resource),
                    name: Some(name),
                    ..Default::default()
                }),
            ),
            AppError::AlreadyExists { resource, name } => (
                StatusCode::CONFLICT,
                "AlreadyExists",
                Some(StatusDetails {
                    group: Some(resource.group),
                    kind: Some(resource.resource),
                    name: Some(name),
                    ..Default::default()
                }),
            ),
            AppError::Unimplemented(_) => (StatusCode::NOT_IMPLEMENTED, "NotImplemented", None),
            AppError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BadRequest", None),
            AppError::Ise(err) => {
                tracing::error!(error = ?err, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError", None)
            }
        };
        let status = Status {
            code: Some(i32::from(code.as_u16())),
            details,
            message: Some(message),
            reason: Some(reason.into()),
            status: Some("Failure".into()),
            ..Default::default()
        };
        (code, status)
    }

    fn into_response(self) -> ApiResponse {
        let (code, status) = self.into_status();
        match serde_json::to_value(&status) {
            Ok(body) => (code, Json(body)),
            Err(err) => {
                tracing::error!(error = ?err, "error serializing status object");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(Value::Null))
            }
        }
    }
}

/// Serialize the given value as a response body with the given status code.
pub fn json_response<T: serde::Serialize>(code: StatusCode, body: &T) -> ApiResponse {
    match serde_json::to_value(body) {
        Ok(body) => (code, Json(body)),
        Err(err) => AppError::Ise(err.into()).into_response(),
    }
}
