//! The flat, expanded structures the engine consumes at request time.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    RoleBinding,
    RoleBindingV2,
    RelationshipAction {
        relation: String,
        action_name: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct ActionBinding {
    pub action: String,
    pub conditions: Vec<Condition>,
    pub condition_sets: Vec<Vec<Condition>>,
}

#[derive(Debug, Clone)]
pub struct RelationTarget {
    pub type_name: String,
    pub subject_relation: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Relationship {
    pub relation: String,
    pub targets: Vec<RelationTarget>,
}

#[derive(Debug, Clone)]
pub struct ResourceType {
    pub name: String,
    pub id_prefix: String,
    pub relationships: Vec<Relationship>,
    pub actions: Vec<ActionBinding>,
}

impl ResourceType {
    pub fn relation(&self, name: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.relation == name)
    }

    pub fn action(&self, name: &str) -> Option<&ActionBinding> {
        self.actions.iter().find(|a| a.action == name)
    }
}

#[derive(Debug, Clone)]
pub struct RbacConfig {
    pub role_type_name: String,
    pub role_id_prefix: String,
    pub role_binding_type_name: String,
    pub role_binding_id_prefix: String,
    pub role_subject_types: Vec<String>,
    pub role_owners: Vec<String>,
    pub role_binding_subjects: Vec<String>,
}

/// The compiled policy: a flat resource-type map plus a constant-time
/// action-by-type index, produced once at startup and read-only thereafter.
#[derive(Debug, Clone)]
pub struct CompiledPolicy {
    pub resource_types: HashMap<String, ResourceType>,
    pub actions: Vec<String>,
    pub rbac: Option<RbacConfig>,
}

impl CompiledPolicy {
    pub fn resource_type(&self, name: &str) -> Option<&ResourceType> {
        self.resource_types.get(name)
    }

    pub fn type_for_prefix(&self, prefix: &str) -> Option<&ResourceType> {
        self.resource_types.values().find(|rt| rt.id_prefix == prefix)
    }

    pub fn action_exists(&self, name: &str) -> bool {
        self.actions.iter().any(|a| a == name)
    }

    pub fn permission_relation(action: &str) -> String {
        format!("{action}_rel")
    }
}
