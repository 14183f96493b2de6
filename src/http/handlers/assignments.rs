//! v1 role assignments: `POST/GET/DELETE /roles/:role_id/assignments`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::http::error::ApiError;
use crate::http::AppState;
use crate::pid::Pid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignmentRequest {
    pub subject_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub subject_id: String,
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
    Json(body): Json<AssignmentRequest>,
) -> Result<StatusCode, ApiError> {
    let role_id = Pid::parse(&role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let subject_id = Pid::parse(&body.subject_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.engine.assign_subject_role(&role_id, &subject_id).await?;
    Ok(StatusCode::CREATED)
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
) -> Result<Json<Vec<AssignmentResponse>>, ApiError> {
    let role_id = Pid::parse(&role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let subjects = state.engine.list_assignments(&role_id).await?;
    Ok(Json(
        subjects
            .into_iter()
            .map(|s| AssignmentResponse { subject_id: s.to_string() })
            .collect(),
    ))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
    Json(body): Json<AssignmentRequest>,
) -> Result<StatusCode, ApiError> {
    let role_id = Pid::parse(&role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let subject_id = Pid::parse(&body.subject_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.engine.unassign_subject_role(&role_id, &subject_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
