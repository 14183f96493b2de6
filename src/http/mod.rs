//! REST surface: router assembly, shared app state, error taxonomy,
//! bearer-auth middleware, and per-resource handlers.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::Settings;
use crate::engine::AuthEngine;

pub struct AppState {
    pub engine: Arc<AuthEngine>,
    pub settings: Settings,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    let protected_routes = Router::new()
        .route("/allow", get(handlers::allow::check).post(handlers::allow::bulk_check))
        .route("/actions", get(handlers::actions::list))
        .route(
            "/resources/:id/relationships",
            get(handlers::relationships::for_resource)
                .post(handlers::relationships::create_for_resource)
                .delete(handlers::relationships::delete_for_resource),
        )
        .route("/relationships/from/:id", get(handlers::relationships::from))
        .route("/relationships/to/:id", get(handlers::relationships::to))
        .nest("/api/v1", v1_routes())
        .nest("/api/v2", v2_routes())
        .route_layer(from_fn_with_state(state.clone(), middleware::auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn v1_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/resources/:id/roles",
            post(handlers::roles::create_role_v1).get(handlers::roles::list_roles_v1),
        )
        .route("/roles/:role_id", get(handlers::roles::get_role_v1).delete(handlers::roles::delete_role_v1))
        .route(
            "/roles/:role_id/assignments",
            post(handlers::assignments::create)
                .get(handlers::assignments::list)
                .delete(handlers::assignments::delete),
        )
}

fn v2_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/resources/:id/roles",
            post(handlers::roles::create_role_v2).get(handlers::roles::list_roles_v2),
        )
        .route(
            "/roles/:role_id",
            get(handlers::roles::get_role_v2)
                .patch(handlers::roles::update_role_v2)
                .delete(handlers::roles::delete_role_v2),
        )
        .route(
            "/resources/:id/role-bindings",
            post(handlers::role_bindings::create).get(handlers::role_bindings::list),
        )
        .route(
            "/resources/:id/role-bindings/:binding_id",
            delete(handlers::role_bindings::delete),
        )
}

async fn health() -> &'static str {
    "ok"
}

async fn version() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}
