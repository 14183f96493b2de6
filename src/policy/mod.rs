pub mod compiled;
pub mod document;
pub mod error;
pub mod expand;
pub mod merge;
pub mod schema;
pub mod validate;

use std::path::Path;

pub use compiled::CompiledPolicy;
pub use error::PolicyError;

/// Parses, merges, validates, and expands one or more policy documents
/// found under `dir` (all `*.yaml`/`*.yml` files, read in sorted
/// path order).
pub fn compile_from_dir(dir: &Path) -> anyhow::Result<CompiledPolicy> {
    let mut paths: Vec<_> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    let mut docs = Vec::new();
    for path in paths {
        let contents = std::fs::read_to_string(&path)?;
        docs.extend(document::parse_documents(&contents)?);
    }
    Ok(compile(docs)?)
}

/// Parse → merge → validate → expand a set of already-parsed documents.
pub fn compile(docs: Vec<document::PolicyDocument>) -> Result<CompiledPolicy, PolicyError> {
    let merged = merge::merge_documents(docs)?;
    validate::validate(&merged)?;
    let compiled = expand::expand(&merged)?;
    validate::validate_expanded(&merged, &compiled)?;
    Ok(compiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use document::*;

    #[test]
    fn compile_end_to_end_matches_s1_scenario() {
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
            actions: vec![
                ActionDef { name: "loadbalancer_get".to_string() },
                ActionDef { name: "loadbalancer_list".to_string() },
                ActionDef { name: "loadbalancer_delete".to_string() },
            ],
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
                role_resource: RbacResourceDef { name: "role".to_string(), id_prefix: "permrol".to_string() },
                role_binding_resource: RbacResourceDef { name: "role-binding".to_string(), id_prefix: "permrbn".to_string() },
                role_subject_types: vec!["user".to_string()],
                role_owners: vec!["tenant".to_string()],
                role_binding_subjects: vec!["user".to_string()],
            }),
        };

        let compiled = compile(vec![doc]).unwrap();
        assert!(compiled.action_exists("loadbalancer_get"));
        assert!(compiled.type_for_prefix("tnntten").is_some());
        assert!(compiled.resource_type("role").is_some());
    }

    #[test]
    fn unknown_action_name_on_relationship_action_fails_post_expansion() {
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
                        action_name: Some("no_such_action".to_string()),
                    }),
                    ..Default::default()
                }],
                condition_sets: vec![],
            }],
            rbac: None,
        };

        assert!(matches!(compile(vec![doc]), Err(PolicyError::InvalidCondition { .. })));
    }
}
