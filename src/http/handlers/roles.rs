//! Role CRUD, split by version.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::{RoleV1, RoleV2};
use crate::http::error::ApiError;
use crate::http::middleware::AuthContext;
use crate::http::AppState;
use crate::pid::Pid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRoleRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub actions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub actions: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponseV1 {
    pub id: String,
    pub owner: String,
    pub actions: Vec<String>,
}

impl From<RoleV1> for RoleResponseV1 {
    fn from(role: RoleV1) -> Self {
        Self {
            id: role.id.to_string(),
            owner: role.owner.to_string(),
            actions: role.actions,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleResponseV2 {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub actions: Vec<String>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RoleV2> for RoleResponseV2 {
    fn from(role: RoleV2) -> Self {
        Self {
            id: role.id.to_string(),
            name: role.name,
            owner: role.owner.to_string(),
            actions: role.actions,
            created_by: role.created_by,
            updated_by: role.updated_by,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

pub async fn create_role_v1(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponseV1>), ApiError> {
    let _ = &auth;
    let owner = Pid::parse(&owner).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let role = state.engine.create_role_v1(&owner, body.actions).await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

pub async fn list_roles_v1(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<RoleResponseV1>>, ApiError> {
    let owner = Pid::parse(&owner).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let roles = state.engine.list_roles_v1(&owner).await?;
    Ok(Json(roles.into_iter().map(Into::into).collect()))
}

pub async fn get_role_v1(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
) -> Result<Json<RoleResponseV1>, ApiError> {
    let role_id = Pid::parse(&role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let role = state.engine.get_role_v1(&role_id).await?;
    Ok(Json(role.into()))
}

pub async fn delete_role_v1(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let role_id = Pid::parse(&role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.engine.delete_role_v1(&role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_role_v2(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<RoleResponseV2>), ApiError> {
    let owner = Pid::parse(&owner).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let name = body
        .name
        .ok_or_else(|| ApiError::BadRequest("name is required".to_string()))?;
    let role = state
        .engine
        .create_role_v2(&owner, &name, body.actions, &auth.subject.to_string())
        .await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

pub async fn list_roles_v2(
    State(state): State<Arc<AppState>>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<RoleResponseV2>>, ApiError> {
    let owner = Pid::parse(&owner).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let roles = state.engine.list_roles_v2(&owner).await?;
    Ok(Json(roles.into_iter().map(Into::into).collect()))
}

pub async fn get_role_v2(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
) -> Result<Json<RoleResponseV2>, ApiError> {
    let role_id = Pid::parse(&role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let role = state.engine.get_role_v2(&role_id).await?;
    Ok(Json(role.into()))
}

pub async fn update_role_v2(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
    Json(body): Json<UpdateRoleRequest>,
) -> Result<Json<RoleResponseV2>, ApiError> {
    let role_id = Pid::parse(&role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let role = state
        .engine
        .update_role_v2(
            &role_id,
            body.name.as_deref(),
            body.actions,
            &auth.subject.to_string(),
        )
        .await?;
    Ok(Json(role.into()))
}

pub async fn delete_role_v2(
    State(state): State<Arc<AppState>>,
    Path(role_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let role_id = Pid::parse(&role_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    state.engine.delete_role_v2(&role_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
