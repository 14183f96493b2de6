//! `GET /actions`.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::http::AppState;

pub async fn list(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.engine.policy().actions.clone())
}
