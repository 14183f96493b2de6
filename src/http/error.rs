//! HTTP error taxonomy: a typed `ApiError` mapped to a JSON `ErrorResponse`.

use std::collections::HashMap;

use axum::{http::StatusCode, response::IntoResponse, response::Response, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::engine::EngineError;
use crate::pid::PidError;
use crate::policy::PolicyError;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Pid(#[from] PidError),
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Pid(_) => (StatusCode::BAD_REQUEST, "INVALID_ID", self.to_string()),
            ApiError::Engine(err) => engine_status(err),
        };

        if !matches!(self, ApiError::Engine(EngineError::ActionNotAssigned { .. })) {
            tracing::error!(%code, %message, "request failed");
        } else {
            tracing::debug!(%code, %message, "action not assigned");
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: code.to_string(),
                message,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

fn engine_status(err: &EngineError) -> (StatusCode, &'static str, String) {
    let message = err.to_string();
    match err {
        EngineError::InvalidArgument(_)
        | EngineError::InvalidID(_)
        | EngineError::InvalidType(_)
        | EngineError::InvalidAction(_)
        | EngineError::InvalidNamespace(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
        EngineError::RoleNotFound | EngineError::RoleBindingNotFound => {
            (StatusCode::NOT_FOUND, "NOT_FOUND", message)
        }
        EngineError::RoleAlreadyExists | EngineError::RoleNameTaken => {
            (StatusCode::CONFLICT, "CONFLICT", message)
        }
        EngineError::DeleteRoleInUse => (StatusCode::CONFLICT, "DELETE_ROLE_IN_USE", message),
        EngineError::ActionNotAssigned { .. } => (StatusCode::FORBIDDEN, "FORBIDDEN", message),
        EngineError::PermissionsMiddlewareMissing => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "PERMISSIONS_MIDDLEWARE_MISSING",
            message,
        ),
        EngineError::Unexpected(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "an internal error occurred".to_string())
        }
    }
}
