//! IAPL policy document types — the YAML shape a policy author writes.
//!
//! One document declares `resourceTypes`, `unions`, `actions`,
//! `actionBindings`, and optionally one `rbac` block.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct PolicyDocument {
    #[serde(rename = "resourceTypes", default)]
    pub resource_types: Vec<ResourceTypeDef>,
    #[serde(default)]
    pub unions: Vec<UnionDef>,
    #[serde(default)]
    pub actions: Vec<ActionDef>,
    #[serde(rename = "actionBindings", default)]
    pub action_bindings: Vec<ActionBindingDef>,
    #[serde(rename = "rbac", default)]
    pub rbac: Option<RbacBlock>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResourceTypeDef {
    pub name: String,
    #[serde(rename = "idPrefix")]
    pub id_prefix: String,
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
    /// Opts this type into RBAC v2: a `member_role` relation is added and an
    /// `available_roles` synthetic action is computed.
    #[serde(rename = "roleBindingV2", default)]
    pub role_binding_v2: bool,
    #[serde(rename = "inheritPermissionsFrom", default)]
    pub inherit_permissions_from: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelationshipDef {
    pub relation: String,
    pub targets: Vec<RelationshipTargetDef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelationshipTargetDef {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(rename = "subjectRelation", default)]
    pub subject_relation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UnionDef {
    pub name: String,
    #[serde(rename = "resourceTypes")]
    pub resource_types: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionDef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionBindingDef {
    pub action: String,
    #[serde(rename = "typeName")]
    pub type_name: String,
    #[serde(default)]
    pub conditions: Vec<ConditionDef>,
    #[serde(rename = "conditionSets", default)]
    pub condition_sets: Vec<ConditionSetDef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionSetDef {
    pub conditions: Vec<ConditionDef>,
}

/// Exactly one clause must be populated.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConditionDef {
    #[serde(rename = "roleBinding", default)]
    pub role_binding: Option<bool>,
    #[serde(rename = "roleBindingV2", default)]
    pub role_binding_v2: Option<bool>,
    #[serde(rename = "relationshipAction", default)]
    pub relationship_action: Option<RelationshipActionDef>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelationshipActionDef {
    pub relation: String,
    #[serde(rename = "actionName", default)]
    pub action_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RbacBlock {
    #[serde(rename = "roleResource")]
    pub role_resource: RbacResourceDef,
    #[serde(rename = "roleBindingResource")]
    pub role_binding_resource: RbacResourceDef,
    #[serde(rename = "roleSubjectTypes", default)]
    pub role_subject_types: Vec<String>,
    #[serde(rename = "roleOwners", default)]
    pub role_owners: Vec<String>,
    #[serde(rename = "roleBindingSubjects", default)]
    pub role_binding_subjects: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RbacResourceDef {
    pub name: String,
    #[serde(rename = "idPrefix")]
    pub id_prefix: String,
}

/// Parse a single YAML stream that may contain multiple `---`-separated
/// documents.
pub fn parse_documents(yaml: &str) -> Result<Vec<PolicyDocument>, serde_yaml::Error> {
    serde_yaml::Deserializer::from_str(yaml)
        .map(PolicyDocument::deserialize)
        .collect()
}
