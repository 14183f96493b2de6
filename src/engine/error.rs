use thiserror::Error;

use crate::store::StoreError;

/// Engine error kinds. Each maps to exactly one HTTP status at the `http`
/// boundary; see `http::error::ApiError`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid id: {0}")]
    InvalidID(String),
    #[error("invalid type: {0}")]
    InvalidType(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("invalid namespace: {0}")]
    InvalidNamespace(String),
    #[error("role not found")]
    RoleNotFound,
    #[error("role binding not found")]
    RoleBindingNotFound,
    #[error("role already exists")]
    RoleAlreadyExists,
    #[error("role name already taken")]
    RoleNameTaken,
    #[error("role is still referenced by a role binding")]
    DeleteRoleInUse,
    #[error("subject {subject:?} does not have action {action:?} on {resource:?}")]
    ActionNotAssigned {
        subject: String,
        action: String,
        resource: String,
    },
    #[error("permissions middleware missing")]
    PermissionsMiddlewareMissing,
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NameTaken => EngineError::RoleNameTaken,
            StoreError::NotFound => EngineError::RoleNotFound,
            other => EngineError::Unexpected(other.to_string()),
        }
    }
}

impl From<crate::pid::PidError> for EngineError {
    fn from(err: crate::pid::PidError) -> Self {
        EngineError::InvalidID(err.to_string())
    }
}
