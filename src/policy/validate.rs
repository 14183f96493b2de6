use std::collections::{HashMap, HashSet};

use super::compiled::CompiledPolicy;
use super::document::{ActionBindingDef, ConditionDef, PolicyDocument};
use super::error::PolicyError;

/// Structural validation that runs before expansion.
pub fn validate(doc: &PolicyDocument) -> Result<(), PolicyError> {
    let type_names: HashSet<&str> = doc.resource_types.iter().map(|t| t.name.as_str()).collect();
    let union_names: HashSet<&str> = doc.unions.iter().map(|u| u.name.as_str()).collect();
    let action_names: HashSet<&str> = doc.actions.iter().map(|a| a.name.as_str()).collect();

    // Union names must not collide with resource-type names, and every
    // union member must be a known resource type.
    for union in &doc.unions {
        if type_names.contains(union.name.as_str()) {
            return Err(PolicyError::TypeExists(union.name.clone()));
        }
        for member in &union.resource_types {
            if !type_names.contains(member.as_str()) {
                return Err(PolicyError::UnknownType(member.clone()));
            }
        }
    }

    // idPrefix must be non-empty and well-formed for every declared type.
    for rt in &doc.resource_types {
        if rt.id_prefix.trim().is_empty() {
            return Err(PolicyError::InvalidCondition {
                action: String::new(),
                type_name: rt.name.clone(),
                reason: "idPrefix must be non-empty".to_string(),
            });
        }
    }

    // Relations: each relationship's target names a known type or union; a
    // subject relation, if given, names a relation or binding on that type.
    let relations_by_type: HashMap<&str, HashSet<&str>> = doc
        .resource_types
        .iter()
        .map(|rt| {
            (
                rt.name.as_str(),
                rt.relationships.iter().map(|r| r.relation.as_str()).collect(),
            )
        })
        .collect();

    for rt in &doc.resource_types {
        for rel in &rt.relationships {
            for target in &rel.targets {
                let is_known = type_names.contains(target.type_name.as_str())
                    || union_names.contains(target.type_name.as_str())
                    || target.type_name == "*";
                if !is_known {
                    return Err(PolicyError::UnknownType(target.type_name.clone()));
                }
                if let Some(subject_relation) = &target.subject_relation {
                    let target_relations = relations_by_type
                        .get(target.type_name.as_str())
                        .cloned()
                        .unwrap_or_default();
                    if !target_relations.contains(subject_relation.as_str()) {
                        return Err(PolicyError::UnknownRelation {
                            type_name: target.type_name.clone(),
                            relation: subject_relation.clone(),
                        });
                    }
                }
            }
        }
    }

    // Action bindings: known action + known type/union, exactly one
    // populated condition clause, relationship-action conditions reference
    // a valid relation (and action, if named).
    for binding in &doc.action_bindings {
        validate_binding(binding, &type_names, &union_names, &action_names, &relations_by_type)?;
    }

    // RBAC role owners must name known resource types.
    if let Some(rbac) = &doc.rbac {
        for owner in &rbac.role_owners {
            if !type_names.contains(owner.as_str()) {
                return Err(PolicyError::UnknownType(owner.clone()));
            }
        }
        for subject_type in &rbac.role_binding_subjects {
            if !type_names.contains(subject_type.as_str()) && !union_names.contains(subject_type.as_str())
            {
                return Err(PolicyError::UnknownType(subject_type.clone()));
            }
        }
    }

    Ok(())
}

fn validate_binding(
    binding: &ActionBindingDef,
    type_names: &HashSet<&str>,
    union_names: &HashSet<&str>,
    action_names: &HashSet<&str>,
    relations_by_type: &HashMap<&str, HashSet<&str>>,
) -> Result<(), PolicyError> {
    if !action_names.contains(binding.action.as_str()) {
        return Err(PolicyError::UnknownAction(binding.action.clone()));
    }
    if !type_names.contains(binding.type_name.as_str()) && !union_names.contains(binding.type_name.as_str())
    {
        return Err(PolicyError::UnknownType(binding.type_name.clone()));
    }

    let all_conditions: Vec<&ConditionDef> = binding
        .conditions
        .iter()
        .chain(binding.condition_sets.iter().flat_map(|set| set.conditions.iter()))
        .collect();

    for condition in all_conditions {
        validate_condition(condition, binding, relations_by_type)?;
    }

    Ok(())
}

fn validate_condition(
    condition: &ConditionDef,
    binding: &ActionBindingDef,
    relations_by_type: &HashMap<&str, HashSet<&str>>,
) -> Result<(), PolicyError> {
    let populated = condition.role_binding.is_some() as u8
        + condition.role_binding_v2.is_some() as u8
        + condition.relationship_action.is_some() as u8;

    if populated != 1 {
        return Err(PolicyError::InvalidCondition {
            action: binding.action.clone(),
            type_name: binding.type_name.clone(),
            reason: format!("exactly one condition clause must be set, found {populated}"),
        });
    }

    if let Some(rel_action) = &condition.relationship_action {
        let target_relations = relations_by_type
            .get(binding.type_name.as_str())
            .cloned()
            .unwrap_or_default();
        if !target_relations.contains(rel_action.relation.as_str()) {
            return Err(PolicyError::UnknownRelation {
                type_name: binding.type_name.clone(),
                relation: rel_action.relation.clone(),
            });
        }
    }

    Ok(())
}

/// Structural validation that runs after expansion, once every type (including
/// RBAC-synthesized role and role-binding types) is in its final form. A
/// `relationshipAction` condition's `actionName`, when set, must name either a
/// relation or a bound action on every type the condition's relation can
/// target; this can't be checked before expansion because the target may be
/// a type introduced by expansion itself.
pub fn validate_expanded(doc: &PolicyDocument, compiled: &CompiledPolicy) -> Result<(), PolicyError> {
    let unions: HashMap<&str, Vec<String>> = doc
        .unions
        .iter()
        .map(|u| (u.name.as_str(), u.resource_types.clone()))
        .collect();

    for binding in &doc.action_bindings {
        let all_conditions: Vec<&ConditionDef> = binding
            .conditions
            .iter()
            .chain(binding.condition_sets.iter().flat_map(|set| set.conditions.iter()))
            .collect();

        for condition in all_conditions {
            let Some(rel_action) = &condition.relationship_action else {
                continue;
            };
            let Some(action_name) = &rel_action.action_name else {
                continue;
            };

            for owning_type in fan_out(&binding.type_name, &unions) {
                let Some(rt) = compiled.resource_type(&owning_type) else {
                    continue;
                };
                let Some(relation) = rt.relation(&rel_action.relation) else {
                    continue;
                };
                for target in &relation.targets {
                    let Some(target_rt) = compiled.resource_type(&target.type_name) else {
                        return Err(PolicyError::UnknownType(target.type_name.clone()));
                    };
                    let exists = target_rt.relation(action_name).is_some()
                        || target_rt.action(action_name).is_some();
                    if !exists {
                        return Err(PolicyError::InvalidCondition {
                            action: binding.action.clone(),
                            type_name: binding.type_name.clone(),
                            reason: format!(
                                "actionName {action_name:?} names no relation or action on {:?} (reached via {:?}->{:?})",
                                target.type_name, owning_type, rel_action.relation
                            ),
                        });
                    }
                }
            }
        }
    }

    Ok(())
}

fn fan_out(type_name: &str, unions: &HashMap<&str, Vec<String>>) -> Vec<String> {
    match unions.get(type_name) {
        Some(members) => members.clone(),
        None => vec![type_name.to_string()],
    }
}
