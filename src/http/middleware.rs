//! Bearer-JWT authentication middleware. Full JWT validation is treated as
//! an external collaborator's contract — this only decodes the subject PID
//! the collaborator is expected to have put in `sub`.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::http::AppState;
use crate::pid::Pid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
}

#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: Pid,
}

const PUBLIC_PATHS: &[&str] = &["/health", "/version", "/api-docs/openapi.json"];

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let path = request.uri().path();
    if PUBLIC_PATHS.contains(&path) || path.starts_with("/swagger-ui") {
        return Ok(next.run(request).await);
    }

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let claims = decode::<AuthClaims>(
        token,
        &DecodingKey::from_secret(state.settings.jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| StatusCode::UNAUTHORIZED)?
    .claims;

    let subject = Pid::parse(&claims.sub).map_err(|_| StatusCode::UNAUTHORIZED)?;
    request.extensions_mut().insert(AuthContext { subject });

    Ok(next.run(request).await)
}
