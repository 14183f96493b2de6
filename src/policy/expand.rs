use std::collections::HashMap;

use super::compiled::{
    ActionBinding, CompiledPolicy, Condition, RbacConfig, RelationTarget, Relationship,
    ResourceType,
};
use super::document::{ActionBindingDef, ConditionDef, PolicyDocument};
use super::error::PolicyError;

/// Deterministic expansion of a validated, merged document into the flat
/// structures the engine consumes.
pub fn expand(doc: &PolicyDocument) -> Result<CompiledPolicy, PolicyError> {
    let unions: HashMap<&str, Vec<String>> = doc
        .unions
        .iter()
        .map(|u| (u.name.as_str(), u.resource_types.clone()))
        .collect();

    let mut resource_types: HashMap<String, ResourceType> = doc
        .resource_types
        .iter()
        .map(|rt| {
            (
                rt.name.clone(),
                ResourceType {
                    name: rt.name.clone(),
                    id_prefix: rt.id_prefix.clone(),
                    relationships: rt
                        .relationships
                        .iter()
                        .map(|rel| expand_relationship(rel, &unions))
                        .collect(),
                    actions: Vec::new(),
                },
            )
        })
        .collect();

    let actions: Vec<String> = doc.actions.iter().map(|a| a.name.clone()).collect();

    // Step 1: synthesize a permission relation name per action. This is a
    // pure naming function (CompiledPolicy::permission_relation); no state
    // to record here.

    let rbac = if let Some(rbac_block) = &doc.rbac {
        let role_type = synth_role_type(rbac_block, &actions);
        let binding_type = synth_role_binding_type(rbac_block, &actions);
        resource_types.insert(role_type.name.clone(), role_type.clone());
        resource_types.insert(binding_type.name.clone(), binding_type.clone());

        // Step 4: RBAC v2 member_role / available_roles per opted-in type.
        for rt in &doc.resource_types {
            if rt.role_binding_v2 {
                apply_rbac_v2(&mut resource_types, rt, &role_type.name);
            }
        }

        Some(RbacConfig {
            role_type_name: rbac_block.role_resource.name.clone(),
            role_id_prefix: rbac_block.role_resource.id_prefix.clone(),
            role_binding_type_name: rbac_block.role_binding_resource.name.clone(),
            role_binding_id_prefix: rbac_block.role_binding_resource.id_prefix.clone(),
            role_subject_types: rbac_block.role_subject_types.clone(),
            role_owners: rbac_block.role_owners.clone(),
            role_binding_subjects: rbac_block.role_binding_subjects.clone(),
        })
    } else {
        None
    };

    // Step 5 + fan-out: expand action bindings, including union fan-out,
    // into per-type `actions` lists.
    for binding in &doc.action_bindings {
        for type_name in fan_out_type(&binding.type_name, &unions) {
            let Some(rt) = resource_types.get_mut(&type_name) else {
                continue;
            };
            insert_binding(rt, binding)?;
        }
    }

    Ok(CompiledPolicy {
        resource_types,
        actions,
        rbac,
    })
}

fn fan_out_type(type_name: &str, unions: &HashMap<&str, Vec<String>>) -> Vec<String> {
    match unions.get(type_name) {
        Some(members) => members.clone(),
        None => vec![type_name.to_string()],
    }
}

fn expand_relationship(
    rel: &super::document::RelationshipDef,
    unions: &HashMap<&str, Vec<String>>,
) -> Relationship {
    let targets = rel
        .targets
        .iter()
        .flat_map(|t| {
            fan_out_type(&t.type_name, unions)
                .into_iter()
                .map(move |type_name| RelationTarget {
                    type_name,
                    subject_relation: t.subject_relation.clone(),
                })
        })
        .collect();
    Relationship {
        relation: rel.relation.clone(),
        targets,
    }
}

fn insert_binding(rt: &mut ResourceType, def: &ActionBindingDef) -> Result<(), PolicyError> {
    if rt.actions.iter().any(|a| a.action == def.action) {
        return Err(PolicyError::ActionBindingExists {
            type_name: rt.name.clone(),
            action: def.action.clone(),
        });
    }
    rt.actions.push(ActionBinding {
        action: def.action.clone(),
        conditions: def.conditions.iter().map(to_condition).collect(),
        condition_sets: def
            .condition_sets
            .iter()
            .map(|set| set.conditions.iter().map(to_condition).collect())
            .collect(),
    });
    Ok(())
}

fn to_condition(def: &ConditionDef) -> Condition {
    if def.role_binding == Some(true) {
        Condition::RoleBinding
    } else if def.role_binding_v2 == Some(true) {
        Condition::RoleBindingV2
    } else {
        let rel_action = def
            .relationship_action
            .clone()
            .expect("validated: exactly one condition clause populated");
        Condition::RelationshipAction {
            relation: rel_action.relation,
            action_name: rel_action.action_name,
        }
    }
}

/// Step 2: derived role resource type.
fn synth_role_type(rbac: &super::document::RbacBlock, actions: &[String]) -> ResourceType {
    let mut relationships = vec![
        Relationship {
            relation: "owner".to_string(),
            targets: rbac
                .role_owners
                .iter()
                .map(|t| RelationTarget {
                    type_name: t.clone(),
                    subject_relation: None,
                })
                .collect(),
        },
        // v1 direct subject assignment.
        Relationship {
            relation: "subject".to_string(),
            targets: rbac
                .role_subject_types
                .iter()
                .map(|t| RelationTarget {
                    type_name: t.clone(),
                    subject_relation: None,
                })
                .collect(),
        },
    ];

    for action in actions {
        relationships.push(Relationship {
            relation: CompiledPolicy::permission_relation(action),
            targets: rbac
                .role_subject_types
                .iter()
                .map(|t| RelationTarget {
                    type_name: t.clone(),
                    subject_relation: Some("*".to_string()),
                })
                .collect(),
        });
    }

    ResourceType {
        name: rbac.role_resource.name.clone(),
        id_prefix: rbac.role_resource.id_prefix.clone(),
        relationships,
        actions: vec![],
    }
}

/// Step 3: derived role-binding resource type. Each action gets a binding
/// whose condition is `(role->action_rel) ∧ subject`, expressed as a single
/// condition SET (an AND-group) rather than two independent OR'd
/// conditions.
fn synth_role_binding_type(rbac: &super::document::RbacBlock, actions: &[String]) -> ResourceType {
    let relationships = vec![
        Relationship {
            relation: "role".to_string(),
            targets: vec![RelationTarget {
                type_name: rbac.role_resource.name.clone(),
                subject_relation: None,
            }],
        },
        Relationship {
            relation: "subject".to_string(),
            targets: rbac
                .role_binding_subjects
                .iter()
                .map(|t| RelationTarget {
                    type_name: t.clone(),
                    subject_relation: None,
                })
                .collect(),
        },
    ];

    let action_bindings = actions
        .iter()
        .map(|action| ActionBinding {
            action: action.clone(),
            conditions: vec![],
            condition_sets: vec![vec![
                Condition::RelationshipAction {
                    relation: "role".to_string(),
                    action_name: Some(action.clone()),
                },
                Condition::RelationshipAction {
                    relation: "subject".to_string(),
                    action_name: None,
                },
            ]],
        })
        .collect();

    ResourceType {
        name: rbac.role_binding_resource.name.clone(),
        id_prefix: rbac.role_binding_resource.id_prefix.clone(),
        relationships,
        actions: action_bindings,
    }
}

/// Step 4: add `member_role` to an RBAC-v2 owner and the `available_roles`
/// synthetic action (union of own member_role plus
/// `inheritPermissionsFrom[*]->available_roles`).
fn apply_rbac_v2(
    resource_types: &mut HashMap<String, ResourceType>,
    owner_def: &super::document::ResourceTypeDef,
    role_type_name: &str,
) {
    let Some(rt) = resource_types.get_mut(&owner_def.name) else {
        return;
    };

    rt.relationships.push(Relationship {
        relation: "member_role".to_string(),
        targets: vec![RelationTarget {
            type_name: role_type_name.to_string(),
            subject_relation: None,
        }],
    });

    let mut condition_set = vec![Condition::RelationshipAction {
        relation: "member_role".to_string(),
        action_name: None,
    }];
    for inherited_from in &owner_def.inherit_permissions_from {
        condition_set.push(Condition::RelationshipAction {
            relation: inherited_from.clone(),
            action_name: Some("available_roles".to_string()),
        });
    }

    rt.actions.push(ActionBinding {
        action: "available_roles".to_string(),
        conditions: condition_set,
        condition_sets: vec![],
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::document::*;

    fn minimal_rbac_doc() -> PolicyDocument {
        PolicyDocument {
            resource_types: vec![ResourceTypeDef {
                name: "tenant".to_string(),
                id_prefix: "tnntten".to_string(),
                relationships: vec![],
                role_binding_v2: false,
                inherit_permissions_from: vec![],
            }, ResourceTypeDef {
                name: "user".to_string(),
                id_prefix: "idntusr".to_string(),
                relationships: vec![],
                role_binding_v2: false,
                inherit_permissions_from: vec![],
            }],
            unions: vec![],
            actions: vec![ActionDef { name: "loadbalancer_get".to_string() }],
            action_bindings: vec![],
            rbac: Some(RbacBlock {
                role_resource: RbacResourceDef { name: "role".to_string(), id_prefix: "permrol".to_string() },
                role_binding_resource: RbacResourceDef { name: "role-binding".to_string(), id_prefix: "permrbn".to_string() },
                role_subject_types: vec!["user".to_string()],
                role_owners: vec!["tenant".to_string()],
                role_binding_subjects: vec!["user".to_string()],
            }),
        }
    }

    #[test]
    fn derives_role_and_binding_types() {
        let compiled = expand(&minimal_rbac_doc()).unwrap();
        let role_type = compiled.resource_type("role").unwrap();
        assert!(role_type.relation("owner").is_some());
        assert!(role_type.relation("loadbalancer_get_rel").is_some());

        let binding_type = compiled.resource_type("role-binding").unwrap();
        assert!(binding_type.relation("role").is_some());
        assert!(binding_type.relation("subject").is_some());
        let binding_action = binding_type.action("loadbalancer_get").unwrap();
        assert_eq!(binding_action.condition_sets.len(), 1);
        assert_eq!(binding_action.condition_sets[0].len(), 2);
    }

    #[test]
    fn duplicate_type_action_binding_fails_post_expansion() {
        let mut doc = minimal_rbac_doc();
        doc.action_bindings = vec![
            ActionBindingDef {
                action: "loadbalancer_get".to_string(),
                type_name: "tenant".to_string(),
                conditions: vec![ConditionDef { role_binding: Some(true), ..Default::default() }],
                condition_sets: vec![],
            },
            ActionBindingDef {
                action: "loadbalancer_get".to_string(),
                type_name: "tenant".to_string(),
                conditions: vec![ConditionDef { role_binding: Some(true), ..Default::default() }],
                condition_sets: vec![],
            },
        ];
        let err = expand(&doc).unwrap_err();
        assert_eq!(
            err,
            PolicyError::ActionBindingExists {
                type_name: "tenant".to_string(),
                action: "loadbalancer_get".to_string()
            }
        );
    }

    #[test]
    fn union_binding_fans_out_to_members() {
        let mut doc = minimal_rbac_doc();
        doc.unions.push(UnionDef {
            name: "any_owner".to_string(),
            resource_types: vec!["tenant".to_string(), "user".to_string()],
        });
        doc.action_bindings.push(ActionBindingDef {
            action: "loadbalancer_get".to_string(),
            type_name: "any_owner".to_string(),
            conditions: vec![ConditionDef { role_binding: Some(true), ..Default::default() }],
            condition_sets: vec![],
        });
        let compiled = expand(&doc).unwrap();
        assert!(compiled.resource_type("tenant").unwrap().action("loadbalancer_get").is_some());
        assert!(compiled.resource_type("user").unwrap().action("loadbalancer_get").is_some());
    }

    #[test]
    fn rbac_v2_adds_member_role_and_available_roles() {
        let mut doc = minimal_rbac_doc();
        doc.resource_types[0].role_binding_v2 = true;
        let compiled = expand(&doc).unwrap();
        let tenant = compiled.resource_type("tenant").unwrap();
        assert!(tenant.relation("member_role").is_some());
        assert!(tenant.action("available_roles").is_some());
    }
}
