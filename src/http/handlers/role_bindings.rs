//! v2 role bindings: `POST/GET/DELETE /resources/:id/role-bindings`.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::RoleBinding;
use crate::http::error::ApiError;
use crate::http::AppState;
use crate::pid::Pid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleBindingRequest {
    pub role_id: String,
    pub subjects: Vec<RoleBindingSubjectRequest>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleBindingSubjectRequest {
    pub id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleBindingResponse {
    pub id: String,
    pub role_id: String,
    pub target: String,
    pub subjects: Vec<String>,
}

impl From<RoleBinding> for RoleBindingResponse {
    fn from(binding: RoleBinding) -> Self {
        Self {
            id: binding.id.to_string(),
            role_id: binding.role_id.to_string(),
            target: binding.target.id.to_string(),
            subjects: binding.subjects.into_iter().map(|s| s.resource.id.to_string()).collect(),
        }
    }
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
    Json(body): Json<CreateRoleBindingRequest>,
) -> Result<(StatusCode, Json<RoleBindingResponse>), ApiError> {
    let target = Pid::parse(&target).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let role_id = Pid::parse(&body.role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let mut subjects = Vec::with_capacity(body.subjects.len());
    for s in body.subjects {
        subjects.push(Pid::parse(&s.id).map_err(|e| ApiError::BadRequest(e.to_string()))?);
    }

    let binding = state.engine.bind_role_v2(&target, &role_id, &subjects).await?;
    Ok((StatusCode::CREATED, Json(binding.into())))
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(target): Path<String>,
) -> Result<Json<Vec<RoleBindingResponse>>, ApiError> {
    let target = Pid::parse(&target).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let bindings = state.engine.list_role_bindings_v2(&target).await?;
    Ok(Json(bindings.into_iter().map(Into::into).collect()))
}

pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path((target, binding_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let target = Pid::parse(&target).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let binding_id = Pid::parse(&binding_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.engine.unbind_role_v2(&target, &binding_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
