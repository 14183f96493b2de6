use thiserror::Error;

/// Typed policy-compiler errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("type {0:?} already declared")]
    TypeExists(String),
    #[error("unknown type {0:?}")]
    UnknownType(String),
    #[error("type {type_name:?} has no relation {relation:?}")]
    UnknownRelation { type_name: String, relation: String },
    #[error("unknown action {0:?}")]
    UnknownAction(String),
    #[error("condition on action {action:?}/{type_name:?} is invalid: {reason}")]
    InvalidCondition {
        action: String,
        type_name: String,
        reason: String,
    },
    #[error("action binding for ({type_name:?}, {action:?}) already exists")]
    ActionBindingExists { type_name: String, action: String },
    #[error("relation {relation:?} on {type_name:?} is missing required relationship")]
    MissingRelationship { type_name: String, relation: String },
    #[error("more than one policy document declares an RBAC block")]
    DuplicateRBACDefinition,
}
