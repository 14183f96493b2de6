//! Renders the compiled policy into a SpiceDB/Zanzibar schema document.
//! Only needed for one-shot schema bootstrapping, never on the request path.

use std::fmt::Write as _;

use super::compiled::{Condition, CompiledPolicy, ResourceType};

pub fn render_schema(policy: &CompiledPolicy) -> String {
    let mut out = String::new();
    let mut names: Vec<&String> = policy.resource_types.keys().collect();
    names.sort();

    for name in names {
        let rt = &policy.resource_types[name];
        render_definition(&mut out, rt);
        out.push('\n');
    }
    out
}

fn render_definition(out: &mut String, rt: &ResourceType) {
    let _ = writeln!(out, "definition {} {{", rt.name);
    for rel in &rt.relationships {
        let targets: Vec<String> = rel
            .targets
            .iter()
            .map(|t| match &t.subject_relation {
                Some(sr) if sr == "*" => format!("{}:*", t.type_name),
                Some(sr) => format!("{}#{}", t.type_name, sr),
                None => t.type_name.clone(),
            })
            .collect();
        let _ = writeln!(out, "    relation {}: {}", rel.relation, targets.join(" | "));
    }
    for binding in &rt.actions {
        let _ = writeln!(out, "    permission {} = {}", binding.action, render_expr(binding));
    }
    out.push_str("}\n");
}

fn render_expr(binding: &super::compiled::ActionBinding) -> String {
    let mut clauses: Vec<String> = binding.conditions.iter().map(render_condition).collect();
    for set in &binding.condition_sets {
        let and_clause = set
            .iter()
            .map(render_condition)
            .collect::<Vec<_>>()
            .join(" & ");
        clauses.push(format!("({and_clause})"));
    }
    if clauses.is_empty() {
        "nil".to_string()
    } else {
        clauses.join(" + ")
    }
}

fn render_condition(condition: &Condition) -> String {
    match condition {
        Condition::RoleBinding => "role_binding->subject".to_string(),
        Condition::RoleBindingV2 => "role_binding_v2->subject".to_string(),
        Condition::RelationshipAction { relation, action_name } => match action_name {
            Some(action) => format!("{relation}->{action}"),
            None => relation.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::expand::expand;
    use crate::policy::document::*;

    #[test]
    fn renders_a_definition_per_type() {
        let doc = PolicyDocument {
            resource_types: vec![ResourceTypeDef {
                name: "tenant".to_string(),
                id_prefix: "tnntten".to_string(),
                relationships: vec![],
                role_binding_v2: false,
                inherit_permissions_from: vec![],
            }],
            unions: vec![],
            actions: vec![],
            action_bindings: vec![],
            rbac: None,
        };
        let compiled = expand(&doc).unwrap();
        let schema = render_schema(&compiled);
        assert!(schema.contains("definition tenant {"));
    }
}
