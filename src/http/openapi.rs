//! OpenAPI document assembly. Path metadata lives on small stub functions
//! kept separate from the real handlers, so handler signatures stay free
//! of documentation concerns.

use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

use crate::http::error::{ErrorDetails, ErrorResponse};
use crate::http::handlers::allow::{BulkAllowRequest, BulkAllowResponse};
use crate::http::handlers::assignments::{AssignmentRequest, AssignmentResponse};
use crate::http::handlers::relationships::{CreateRelationshipRequest, RelationshipResponse};
use crate::http::handlers::role_bindings::{CreateRoleBindingRequest, RoleBindingResponse, RoleBindingSubjectRequest};
use crate::http::handlers::roles::{CreateRoleRequest, RoleResponseV1, RoleResponseV2, UpdateRoleRequest};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::http::openapi::health,
        crate::http::openapi::version,
        crate::http::openapi::allow_check,
        crate::http::openapi::allow_bulk_check,
        crate::http::openapi::create_role,
        crate::http::openapi::list_roles,
        crate::http::openapi::get_role,
        crate::http::openapi::update_role,
        crate::http::openapi::delete_role,
        crate::http::openapi::create_assignment,
        crate::http::openapi::list_assignments,
        crate::http::openapi::delete_assignment,
        crate::http::openapi::create_role_binding,
        crate::http::openapi::list_role_bindings,
        crate::http::openapi::delete_role_binding,
        crate::http::openapi::list_relationships,
        crate::http::openapi::list_actions,
    ),
    components(
        schemas(
            BulkAllowRequest,
            BulkAllowResponse,
            crate::http::handlers::allow::BulkAllowResponseItem,
            CreateRoleRequest,
            UpdateRoleRequest,
            RoleResponseV1,
            RoleResponseV2,
            AssignmentRequest,
            AssignmentResponse,
            CreateRoleBindingRequest,
            RoleBindingSubjectRequest,
            RoleBindingResponse,
            RelationshipResponse,
            CreateRelationshipRequest,
            ErrorResponse,
            ErrorDetails,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health and version endpoints"),
        (name = "Allow", description = "Permission checks"),
        (name = "Roles", description = "Role v1/v2 lifecycle"),
        (name = "Assignments", description = "v1 direct subject assignments"),
        (name = "RoleBindings", description = "v2 role bindings"),
        (name = "Relationships", description = "Relationship graph queries"),
    ),
    info(
        title = "Permissions Engine API",
        version = "1.0.0",
        description = "IAPL policy compiler, authorization engine, and change subscriber",
        license(name = "MIT"),
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[utoipa::path(get, path = "/health", tag = "Health", responses((status = 200, description = "Service is healthy")))]
#[allow(dead_code)]
pub async fn health() {}

#[utoipa::path(get, path = "/version", tag = "Health", responses((status = 200, description = "API version", body = serde_json::Value)))]
#[allow(dead_code)]
pub async fn version() {}

#[utoipa::path(
    get, path = "/allow", tag = "Allow",
    params(("resource" = String, Query, description = "Resource PID"), ("action" = String, Query, description = "Action name")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Permitted"),
        (status = 400, description = "Invalid input", body = ErrorResponse),
        (status = 403, description = "Not assigned", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn allow_check() {}

#[utoipa::path(
    post, path = "/allow", tag = "Allow", request_body = BulkAllowRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All permitted", body = BulkAllowResponse),
        (status = 403, description = "At least one not assigned", body = BulkAllowResponse),
    ),
)]
#[allow(dead_code)]
pub async fn allow_bulk_check() {}

#[utoipa::path(
    post, path = "/resources/{id}/roles", tag = "Roles", request_body = CreateRoleRequest,
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Role owner PID")),
    responses(
        (status = 201, description = "Role created", body = RoleResponseV2),
        (status = 409, description = "Role name already taken", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn create_role() {}

#[utoipa::path(
    get, path = "/resources/{id}/roles", tag = "Roles",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Role owner PID")),
    responses((status = 200, description = "List of roles", body = Vec<RoleResponseV2>)),
)]
#[allow(dead_code)]
pub async fn list_roles() {}

#[utoipa::path(
    get, path = "/roles/{role_id}", tag = "Roles",
    security(("bearer_auth" = [])),
    params(("role_id" = String, Path, description = "Role PID")),
    responses(
        (status = 200, description = "Role details", body = RoleResponseV2),
        (status = 404, description = "Role not found", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn get_role() {}

#[utoipa::path(
    patch, path = "/roles/{role_id}", tag = "Roles", request_body = UpdateRoleRequest,
    security(("bearer_auth" = [])),
    params(("role_id" = String, Path, description = "Role PID")),
    responses((status = 200, description = "Role updated", body = RoleResponseV2)),
)]
#[allow(dead_code)]
pub async fn update_role() {}

#[utoipa::path(
    delete, path = "/roles/{role_id}", tag = "Roles",
    security(("bearer_auth" = [])),
    params(("role_id" = String, Path, description = "Role PID")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 409, description = "Role still referenced by a binding", body = ErrorResponse),
    ),
)]
#[allow(dead_code)]
pub async fn delete_role() {}

#[utoipa::path(
    post, path = "/roles/{role_id}/assignments", tag = "Assignments", request_body = AssignmentRequest,
    security(("bearer_auth" = [])),
    params(("role_id" = String, Path, description = "v1 role PID")),
    responses((status = 201, description = "Subject assigned")),
)]
#[allow(dead_code)]
pub async fn create_assignment() {}

#[utoipa::path(
    get, path = "/roles/{role_id}/assignments", tag = "Assignments",
    security(("bearer_auth" = [])),
    params(("role_id" = String, Path, description = "v1 role PID")),
    responses((status = 200, description = "List of assignments", body = Vec<AssignmentResponse>)),
)]
#[allow(dead_code)]
pub async fn list_assignments() {}

#[utoipa::path(
    delete, path = "/roles/{role_id}/assignments", tag = "Assignments", request_body = AssignmentRequest,
    security(("bearer_auth" = [])),
    params(("role_id" = String, Path, description = "v1 role PID")),
    responses((status = 204, description = "Subject unassigned")),
)]
#[allow(dead_code)]
pub async fn delete_assignment() {}

#[utoipa::path(
    post, path = "/resources/{id}/role-bindings", tag = "RoleBindings", request_body = CreateRoleBindingRequest,
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Grant-target PID")),
    responses((status = 201, description = "Binding created", body = RoleBindingResponse)),
)]
#[allow(dead_code)]
pub async fn create_role_binding() {}

#[utoipa::path(
    get, path = "/resources/{id}/role-bindings", tag = "RoleBindings",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Grant-target PID")),
    responses((status = 200, description = "List of bindings", body = Vec<RoleBindingResponse>)),
)]
#[allow(dead_code)]
pub async fn list_role_bindings() {}

#[utoipa::path(
    delete, path = "/resources/{id}/role-bindings/{binding_id}", tag = "RoleBindings",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Grant-target PID"), ("binding_id" = String, Path, description = "Binding PID")),
    responses((status = 204, description = "Binding deleted")),
)]
#[allow(dead_code)]
pub async fn delete_role_binding() {}

#[utoipa::path(
    get, path = "/resources/{id}/relationships", tag = "Relationships",
    security(("bearer_auth" = [])),
    params(("id" = String, Path, description = "Resource PID")),
    responses((status = 200, description = "Relationships for resource", body = Vec<RelationshipResponse>)),
)]
#[allow(dead_code)]
pub async fn list_relationships() {}

#[utoipa::path(
    get, path = "/actions", tag = "Allow",
    security(("bearer_auth" = [])),
    responses((status = 200, description = "All declared actions", body = Vec<String>)),
)]
#[allow(dead_code)]
pub async fn list_actions() {}
