//! The authorization engine: role, role-binding, assignment, relationship,
//! and permission-check operations, with transactional consistency across
//! the metadata store and the graph store.

pub mod check;
pub mod error;
pub mod relationship;
pub mod role_v1;
pub mod role_v2;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::pid::Pid;
use crate::policy::CompiledPolicy;
use crate::store::{GraphStore, MetadataStore, ResourceRef, SubjectRef};

pub use error::EngineError;
pub use relationship::Relationship;

#[derive(Debug, Clone)]
pub struct RoleV1 {
    pub id: Pid,
    pub owner: Pid,
    pub actions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RoleV2 {
    pub id: Pid,
    pub name: String,
    pub owner: Pid,
    pub actions: Vec<String>,
    pub created_by: String,
    pub updated_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RoleBindingSubject {
    pub resource: ResourceRef,
    pub condition: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RoleBinding {
    pub id: Pid,
    pub role_id: Pid,
    pub target: ResourceRef,
    pub subjects: Vec<RoleBindingSubject>,
}

pub struct EngineConfig {
    pub check_concurrency: usize,
    pub check_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_concurrency: 5,
            check_timeout: Duration::from_secs(5),
        }
    }
}

/// The engine: re-entrant, safe for concurrent calls, holding only
/// read-only shared state (the compiled policy) plus handles to the two
/// external stores.
pub struct AuthEngine {
    pub(crate) policy: Arc<CompiledPolicy>,
    pub(crate) metadata: Arc<dyn MetadataStore>,
    pub(crate) graph: Arc<dyn GraphStore>,
    pub(crate) config: EngineConfig,
}

impl AuthEngine {
    pub fn new(
        policy: Arc<CompiledPolicy>,
        metadata: Arc<dyn MetadataStore>,
        graph: Arc<dyn GraphStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            policy,
            metadata,
            graph,
            config,
        }
    }

    pub fn policy(&self) -> &CompiledPolicy {
        &self.policy
    }

    /// Resolve `(type_name, id)` into a validated `ResourceRef`: the type
    /// must be declared and the id's prefix must match it.
    pub(crate) fn resource_ref(&self, type_name: &str, id: &Pid) -> Result<ResourceRef, EngineError> {
        let rt = self
            .policy
            .resource_type(type_name)
            .ok_or_else(|| EngineError::InvalidType(type_name.to_string()))?;
        id.require_prefix(&rt.id_prefix)
            .map_err(|e| EngineError::InvalidID(e.to_string()))?;
        Ok(ResourceRef {
            type_name: type_name.to_string(),
            id: id.clone(),
        })
    }

    /// Resolve a resource purely from its PID by matching the id's prefix
    /// against a declared type (used when the caller doesn't know the
    /// resource type up front, e.g. the change subscriber).
    pub(crate) fn resource_ref_from_pid(&self, id: &Pid) -> Result<ResourceRef, EngineError> {
        let rt = self
            .policy
            .type_for_prefix(id.prefix())
            .ok_or_else(|| EngineError::InvalidID(format!("unknown prefix {:?}", id.prefix())))?;
        Ok(ResourceRef {
            type_name: rt.name.clone(),
            id: id.clone(),
        })
    }

    pub(crate) fn subject_ref(&self, type_name: &str, id: &Pid) -> Result<SubjectRef, EngineError> {
        let rt = self
            .policy
            .resource_type(type_name)
            .ok_or_else(|| EngineError::InvalidType(type_name.to_string()))?;
        id.require_prefix(&rt.id_prefix)
            .map_err(|e| EngineError::InvalidID(e.to_string()))?;
        Ok(SubjectRef {
            type_name: type_name.to_string(),
            id: id.clone(),
            relation: None,
        })
    }

    pub(crate) fn validate_actions(&self, actions: &[String]) -> Result<(), EngineError> {
        for action in actions {
            if !self.policy.action_exists(action) {
                return Err(EngineError::InvalidAction(action.clone()));
            }
        }
        Ok(())
    }

    fn rbac(&self) -> Result<&crate::policy::compiled::RbacConfig, EngineError> {
        self.policy
            .rbac
            .as_ref()
            .ok_or_else(|| EngineError::Unexpected("policy has no RBAC block".to_string()))
    }
}

/// A compiled policy plus in-memory fakes, shared by the engine unit tests
/// in `check.rs`, `relationship.rs`, `role_v1.rs`, and `role_v2.rs`.
#[cfg(test)]
pub(crate) mod test_support {
    use super::{AuthEngine, EngineConfig};
    use crate::policy::document::{
        ActionBindingDef, ActionDef, ConditionDef, PolicyDocument, RbacBlock, RbacResourceDef,
        RelationshipActionDef, RelationshipDef, RelationshipTargetDef, ResourceTypeDef,
    };
    use crate::store::graph::fake::FakeGraphStore;
    use crate::store::metadata::fake::FakeMetadataStore;
    use std::sync::Arc;

    /// `tenant` (owner) / `user` (role subject) / `loadbalancer` (owned by
    /// `tenant`, with a `loadbalancer_get` action bound on `owner`), plus an
    /// RBAC block so both role versions and role bindings are exercised.
    pub fn fixture_engine() -> AuthEngine {
        let doc = PolicyDocument {
            resource_types: vec![
                ResourceTypeDef {
                    name: "tenant".to_string(),
                    id_prefix: "tnntten".to_string(),
                    relationships: vec![],
                    role_binding_v2: false,
                    inherit_permissions_from: vec![],
                },
                ResourceTypeDef {
                    name: "user".to_string(),
                    id_prefix: "idntusr".to_string(),
                    relationships: vec![],
                    role_binding_v2: false,
                    inherit_permissions_from: vec![],
                },
                ResourceTypeDef {
                    name: "loadbalancer".to_string(),
                    id_prefix: "loadbal".to_string(),
                    relationships: vec![RelationshipDef {
                        relation: "owner".to_string(),
                        targets: vec![RelationshipTargetDef {
                            type_name: "tenant".to_string(),
                            subject_relation: None,
                        }],
                    }],
                    role_binding_v2: false,
                    inherit_permissions_from: vec![],
                },
            ],
            unions: vec![],
            actions: vec![ActionDef { name: "loadbalancer_get".to_string() }],
            action_bindings: vec![ActionBindingDef {
                action: "loadbalancer_get".to_string(),
                type_name: "loadbalancer".to_string(),
                conditions: vec![ConditionDef {
                    relationship_action: Some(RelationshipActionDef {
                        relation: "owner".to_string(),
                        action_name: None,
                    }),
                    ..Default::default()
                }],
                condition_sets: vec![],
            }],
            rbac: Some(RbacBlock {
                role_resource: RbacResourceDef {
                    name: "role".to_string(),
                    id_prefix: "permrol".to_string(),
                },
                role_binding_resource: RbacResourceDef {
                    name: "role-binding".to_string(),
                    id_prefix: "permrbn".to_string(),
                },
                role_subject_types: vec!["user".to_string()],
                role_owners: vec!["tenant".to_string()],
                role_binding_subjects: vec!["user".to_string()],
            }),
        };

        let policy = crate::policy::compile(vec![doc]).expect("fixture policy compiles");
        AuthEngine::new(
            Arc::new(policy),
            Arc::new(FakeMetadataStore::default()),
            Arc::new(FakeGraphStore::default()),
            EngineConfig::default(),
        )
    }
}
