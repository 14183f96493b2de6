//! `GET/POST /allow`.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::engine::check::{BulkCheckResult, CheckItem};
use crate::http::error::ApiError;
use crate::http::middleware::AuthContext;
use crate::http::AppState;
use crate::pid::Pid;

#[derive(Debug, Deserialize)]
pub struct AllowQuery {
    pub resource: String,
    pub action: String,
}

pub async fn check(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<AllowQuery>,
) -> Result<StatusCode, ApiError> {
    let resource_id = Pid::parse(&query.resource).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let (resource_type, subject_type) = resolve_types(&state, &resource_id, &auth.subject)?;

    state
        .engine
        .subject_has_permission(&subject_type, &auth.subject, &resource_type, &resource_id, &query.action)
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAllowRequest {
    pub actions: Vec<BulkAllowItem>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkAllowItem {
    pub resource_id: String,
    pub action: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAllowResponseItem {
    pub index: usize,
    pub resource_id: String,
    pub action: String,
    pub permitted: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkAllowResponse {
    pub results: Vec<BulkAllowResponseItem>,
}

pub async fn bulk_check(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<BulkAllowRequest>,
) -> Result<(StatusCode, Json<BulkAllowResponse>), ApiError> {
    let mut items = Vec::with_capacity(body.actions.len());
    for action in &body.actions {
        let resource_id =
            Pid::parse(&action.resource_id).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        let resource_type = state
            .engine
            .policy()
            .type_for_prefix(resource_id.prefix())
            .ok_or_else(|| ApiError::BadRequest(format!("unknown resource type for {resource_id}")))?
            .name
            .clone();
        items.push(CheckItem {
            resource_type,
            resource_id,
            action: action.action.clone(),
        });
    }

    let subject_type = state
        .engine
        .policy()
        .type_for_prefix(auth.subject.prefix())
        .ok_or_else(|| ApiError::BadRequest(format!("unknown subject type for {}", auth.subject)))?
        .name
        .clone();

    let outcome = state
        .engine
        .check_all_actions(&subject_type, &auth.subject, items)
        .await?;

    let (status, outcomes) = match outcome {
        BulkCheckResult::Ok(outcomes) => (StatusCode::OK, outcomes),
        BulkCheckResult::Forbidden(outcomes) => (StatusCode::FORBIDDEN, outcomes),
    };

    let results = outcomes
        .into_iter()
        .map(|o| BulkAllowResponseItem {
            index: o.index,
            resource_id: o.resource_id.to_string(),
            action: o.action,
            permitted: o.permitted,
        })
        .collect();

    Ok((status, Json(BulkAllowResponse { results })))
}

fn resolve_types(
    state: &AppState,
    resource_id: &Pid,
    subject_id: &Pid,
) -> Result<(String, String), ApiError> {
    let resource_type = state
        .engine
        .policy()
        .type_for_prefix(resource_id.prefix())
        .ok_or_else(|| ApiError::BadRequest(format!("unknown resource type for {resource_id}")))?
        .name
        .clone();
    let subject_type = state
        .engine
        .policy()
        .type_for_prefix(subject_id.prefix())
        .ok_or_else(|| ApiError::BadRequest(format!("unknown subject type for {subject_id}")))?
        .name
        .clone();
    Ok((resource_type, subject_type))
}
