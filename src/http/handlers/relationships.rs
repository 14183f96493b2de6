//! Relationship listing and creation.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::Relationship as EngineRelationship;
use crate::http::error::ApiError;
use crate::http::AppState;
use crate::pid::Pid;

#[derive(Debug, Serialize, ToSchema)]
pub struct RelationshipResponse {
    pub resource_type: String,
    pub resource_id: String,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
}

impl From<EngineRelationship> for RelationshipResponse {
    fn from(rel: EngineRelationship) -> Self {
        Self {
            resource_type: rel.resource_type,
            resource_id: rel.resource_id.to_string(),
            relation: rel.relation,
            subject_type: rel.subject_type,
            subject_id: rel.subject_id.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRelationshipRequest {
    pub relation: String,
    pub subject_type: String,
    pub subject_id: String,
}

pub async fn for_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RelationshipResponse>>, ApiError> {
    let id = Pid::parse(&id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let rels = state.engine.list_relationships_for_resource(&id).await?;
    Ok(Json(rels.into_iter().map(Into::into).collect()))
}

pub async fn create_for_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Vec<CreateRelationshipRequest>>,
) -> Result<StatusCode, ApiError> {
    let resource_id = Pid::parse(&id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let resource_type = state
        .engine
        .policy()
        .type_for_prefix(resource_id.prefix())
        .ok_or_else(|| ApiError::BadRequest(format!("unknown resource type for {resource_id}")))?
        .name
        .clone();

    let mut rels = Vec::with_capacity(body.len());
    for item in body {
        let subject_id =
            Pid::parse(&item.subject_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        rels.push(EngineRelationship {
            resource_type: resource_type.clone(),
            resource_id: resource_id.clone(),
            relation: item.relation,
            subject_type: item.subject_type,
            subject_id,
        });
    }
    state.engine.create_relationships(&rels).await?;
    Ok(StatusCode::CREATED)
}

pub async fn delete_for_resource(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let resource_id = Pid::parse(&id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let resource_type = state
        .engine
        .policy()
        .type_for_prefix(resource_id.prefix())
        .ok_or_else(|| ApiError::BadRequest(format!("unknown resource type for {resource_id}")))?
        .name
        .clone();
    state
        .engine
        .delete_relationships_for_resource(&resource_type, &resource_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn from(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RelationshipResponse>>, ApiError> {
    let id = Pid::parse(&id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let rels = state.engine.list_relationships_from(&id).await?;
    Ok(Json(rels.into_iter().map(Into::into).collect()))
}

pub async fn to(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RelationshipResponse>>, ApiError> {
    let id = Pid::parse(&id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let rels = state.engine.list_relationships_to(&id).await?;
    Ok(Json(rels.into_iter().map(Into::into).collect()))
}
