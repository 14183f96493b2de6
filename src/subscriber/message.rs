//! Wire format for resource-lifecycle change events: `{action, objectID,
//! relations: [{relation, subjectID}]}`.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Write,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationChange {
    pub relation: String,
    #[serde(rename = "subjectID")]
    pub subject_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChangeMessage {
    pub action: ChangeAction,
    #[serde(rename = "objectID")]
    pub object_id: String,
    #[serde(default)]
    pub relations: Vec<RelationChange>,
}
