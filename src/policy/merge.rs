use super::document::PolicyDocument;
use super::error::PolicyError;

/// Merge policy documents in file-path order. Lists concatenate; at most
/// one document may carry the RBAC block.
pub fn merge_documents(docs: Vec<PolicyDocument>) -> Result<PolicyDocument, PolicyError> {
    let mut merged = PolicyDocument::default();
    for doc in docs {
        merged.resource_types.extend(doc.resource_types);
        merged.unions.extend(doc.unions);
        merged.actions.extend(doc.actions);
        merged.action_bindings.extend(doc.action_bindings);
        if let Some(rbac) = doc.rbac {
            if merged.rbac.is_some() {
                return Err(PolicyError::DuplicateRBACDefinition);
            }
            merged.rbac = Some(rbac);
        }
    }
    Ok(merged)
}
