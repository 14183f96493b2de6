//! The relationship-graph authorization store (SpiceDB-class engine).
//! Relationships live only here; the metadata store never sees them.

use async_trait::async_trait;
use spicedb_grpc::authzed::api::v1::{
    check_permission_response::Permissionship, consistency::Requirement, relationship_update,
    CheckPermissionRequest, Consistency, DeleteRelationshipsRequest, ObjectReference,
    Relationship as GrpcRelationship, RelationshipFilter as GrpcRelationshipFilter,
    RelationshipUpdate, SubjectFilter as GrpcSubjectFilter, SubjectReference,
    WriteRelationshipsRequest, WriteSchemaRequest,
};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument};

use crate::pid::Pid;
use crate::store::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub type_name: String,
    pub id: Pid,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    pub type_name: String,
    pub id: Pid,
    pub relation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationshipTuple {
    pub resource: ResourceRef,
    pub relation: String,
    pub subject: SubjectRef,
}

#[derive(Debug, Clone, Default)]
pub struct RelationshipFilter {
    pub resource_type: Option<String>,
    pub resource_id: Option<Pid>,
    pub relation: Option<String>,
    pub subject_type: Option<String>,
    pub subject_id: Option<Pid>,
}

impl RelationshipFilter {
    pub fn for_resource(resource: &ResourceRef) -> Self {
        Self {
            resource_type: Some(resource.type_name.clone()),
            resource_id: Some(resource.id.clone()),
            ..Default::default()
        }
    }
}

/// Whether a permission check must observe the caller's own last write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    MinimizeLatency,
    FullyConsistent,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn check_permission(
        &self,
        resource: &ResourceRef,
        permission: &str,
        subject: &SubjectRef,
        consistency: Consistency,
    ) -> Result<bool, StoreError>;

    async fn write_relationships(&self, rels: &[RelationshipTuple]) -> Result<(), StoreError>;

    async fn delete_relationship_tuples(
        &self,
        rels: &[RelationshipTuple],
    ) -> Result<(), StoreError>;

    async fn delete_relationships(&self, filter: &RelationshipFilter) -> Result<(), StoreError>;

    async fn read_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> Result<Vec<RelationshipTuple>, StoreError>;

    async fn write_schema(&self, schema: &str) -> Result<(), StoreError>;
}

fn to_object_reference(type_name: &str, id: &Pid) -> ObjectReference {
    ObjectReference {
        object_type: type_name.to_string(),
        object_id: id.as_str().to_string(),
    }
}

fn to_subject_reference(subject: &SubjectRef) -> SubjectReference {
    SubjectReference {
        object: Some(to_object_reference(&subject.type_name, &subject.id)),
        optional_relation: subject.relation.clone().unwrap_or_default(),
    }
}

fn to_grpc_consistency(consistency: Consistency) -> spicedb_grpc::authzed::api::v1::Consistency {
    let requirement = match consistency {
        Consistency::FullyConsistent => Requirement::FullyConsistent(true),
        Consistency::MinimizeLatency => Requirement::MinimizeLatency(true),
    };
    spicedb_grpc::authzed::api::v1::Consistency {
        requirement: Some(requirement),
    }
}

/// The real backend: a long-lived SpiceDB gRPC connection behind a
/// Mutex, since the generated client needs `&mut self`.
pub struct SpiceDbGraphStore {
    client: AsyncMutex<spicedb_client::SpicedbClient>,
}

impl SpiceDbGraphStore {
    pub async fn connect(endpoint: String, preshared_key: String) -> Result<Self, StoreError> {
        let endpoint: &'static str = Box::leak(endpoint.into_boxed_str());
        let preshared_key: &'static str = Box::leak(preshared_key.into_boxed_str());
        let client = spicedb_client::SpicedbClient::from_url_and_preshared_key(endpoint, preshared_key)
            .await
            .map_err(|e| StoreError::GraphUnavailable(e.to_string()))?;
        Ok(Self {
            client: AsyncMutex::new(client),
        })
    }
}

#[async_trait]
impl GraphStore for SpiceDbGraphStore {
    #[instrument(skip(self))]
    async fn check_permission(
        &self,
        resource: &ResourceRef,
        permission: &str,
        subject: &SubjectRef,
        consistency: Consistency,
    ) -> Result<bool, StoreError> {
        let request = CheckPermissionRequest {
            resource: Some(to_object_reference(&resource.type_name, &resource.id)),
            permission: permission.to_string(),
            subject: Some(to_subject_reference(subject)),
            consistency: Some(to_grpc_consistency(consistency)),
            ..Default::default()
        };

        let mut client = self.client.lock().await;
        let response = client
            .check_permission(request)
            .await
            .map_err(|e| StoreError::GraphUnavailable(e.to_string()))?;

        let has_permission = response.permissionship() == Permissionship::HasPermission;
        debug!(has_permission, permission, "permission check result");
        Ok(has_permission)
    }

    async fn write_relationships(&self, rels: &[RelationshipTuple]) -> Result<(), StoreError> {
        let updates = rels
            .iter()
            .map(|rel| RelationshipUpdate {
                operation: relationship_update::Operation::Touch as i32,
                relationship: Some(GrpcRelationship {
                    resource: Some(to_object_reference(&rel.resource.type_name, &rel.resource.id)),
                    relation: rel.relation.clone(),
                    subject: Some(to_subject_reference(&rel.subject)),
                    optional_caveat: None,
                }),
            })
            .collect();

        let request = WriteRelationshipsRequest {
            updates,
            ..Default::default()
        };
        let mut client = self.client.lock().await;
        client
            .write_relationships(request)
            .await
            .map_err(|e| StoreError::Graph(e.to_string()))?;
        Ok(())
    }

    async fn delete_relationship_tuples(&self, rels: &[RelationshipTuple]) -> Result<(), StoreError> {
        let updates = rels
            .iter()
            .map(|rel| RelationshipUpdate {
                operation: relationship_update::Operation::Delete as i32,
                relationship: Some(GrpcRelationship {
                    resource: Some(to_object_reference(&rel.resource.type_name, &rel.resource.id)),
                    relation: rel.relation.clone(),
                    subject: Some(to_subject_reference(&rel.subject)),
                    optional_caveat: None,
                }),
            })
            .collect();

        let request = WriteRelationshipsRequest {
            updates,
            ..Default::default()
        };
        let mut client = self.client.lock().await;
        client
            .write_relationships(request)
            .await
            .map_err(|e| StoreError::Graph(e.to_string()))?;
        Ok(())
    }

    async fn delete_relationships(&self, filter: &RelationshipFilter) -> Result<(), StoreError> {
        let request = DeleteRelationshipsRequest {
            relationship_filter: Some(GrpcRelationshipFilter {
                resource_type: filter.resource_type.clone().unwrap_or_default(),
                optional_resource_id: filter
                    .resource_id
                    .as_ref()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
                optional_relation: filter.relation.clone().unwrap_or_default(),
                optional_subject_filter: filter.subject_type.clone().map(|t| GrpcSubjectFilter {
                    subject_type: t,
                    optional_subject_id: filter
                        .subject_id
                        .as_ref()
                        .map(|p| p.as_str().to_string())
                        .unwrap_or_default(),
                    optional_relation: None,
                }),
                optional_resource_id_prefix: String::new(),
            }),
            ..Default::default()
        };
        let mut client = self.client.lock().await;
        client
            .delete_relationships(request)
            .await
            .map_err(|e| StoreError::Graph(e.to_string()))?;
        Ok(())
    }

    async fn read_relationships(
        &self,
        filter: &RelationshipFilter,
    ) -> Result<Vec<RelationshipTuple>, StoreError> {
        use futures::StreamExt;

        let request = spicedb_grpc::authzed::api::v1::ReadRelationshipsRequest {
            relationship_filter: Some(GrpcRelationshipFilter {
                resource_type: filter.resource_type.clone().unwrap_or_default(),
                optional_resource_id: filter
                    .resource_id
                    .as_ref()
                    .map(|p| p.as_str().to_string())
                    .unwrap_or_default(),
                optional_relation: filter.relation.clone().unwrap_or_default(),
                optional_subject_filter: filter.subject_type.clone().map(|t| GrpcSubjectFilter {
                    subject_type: t,
                    optional_subject_id: filter
                        .subject_id
                        .as_ref()
                        .map(|p| p.as_str().to_string())
                        .unwrap_or_default(),
                    optional_relation: None,
                }),
                optional_resource_id_prefix: String::new(),
            }),
            consistency: Some(to_grpc_consistency(Consistency::FullyConsistent)),
            ..Default::default()
        };

        let mut client = self.client.lock().await;
        let mut stream = client
            .read_relationships(request)
            .await
            .map_err(|e| StoreError::Graph(e.to_string()))?;

        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            let item = item.map_err(|e| StoreError::Graph(e.to_string()))?;
            let Some(rel) = item.relationship else { continue };
            let Some(resource) = rel.resource else { continue };
            let Some(subject_ref) = rel.subject else { continue };
            let Some(subject_obj) = subject_ref.object else { continue };
            out.push(RelationshipTuple {
                resource: ResourceRef {
                    type_name: resource.object_type,
                    id: Pid::parse(&resource.object_id)
                        .map_err(|e| StoreError::Graph(e.to_string()))?,
                },
                relation: rel.relation,
                subject: SubjectRef {
                    type_name: subject_obj.object_type,
                    id: Pid::parse(&subject_obj.object_id)
                        .map_err(|e| StoreError::Graph(e.to_string()))?,
                    relation: (!subject_ref.optional_relation.is_empty())
                        .then_some(subject_ref.optional_relation),
                },
            });
        }
        Ok(out)
    }

    async fn write_schema(&self, schema: &str) -> Result<(), StoreError> {
        let mut client = self.client.lock().await;
        client
            .write_schema(WriteSchemaRequest {
                schema: schema.to_string(),
            })
            .await
            .map_err(|e| StoreError::Graph(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
pub mod fake {
    //! In-memory graph store for engine unit tests.
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct FakeGraphStore {
        pub tuples: Mutex<Vec<RelationshipTuple>>,
        /// Permission relations considered granted for (resource_type,
        /// permission) via a direct relation traversal; tests register
        /// these to stand in for SpiceDB's schema evaluation.
        pub direct_relations: Vec<(String, String)>,
    }

    fn matches(filter: &RelationshipFilter, tuple: &RelationshipTuple) -> bool {
        filter
            .resource_type
            .as_ref()
            .map(|t| *t == tuple.resource.type_name)
            .unwrap_or(true)
            && filter
                .resource_id
                .as_ref()
                .map(|id| *id == tuple.resource.id)
                .unwrap_or(true)
            && filter
                .relation
                .as_ref()
                .map(|r| *r == tuple.relation)
                .unwrap_or(true)
            && filter
                .subject_type
                .as_ref()
                .map(|t| *t == tuple.subject.type_name)
                .unwrap_or(true)
            && filter
                .subject_id
                .as_ref()
                .map(|id| *id == tuple.subject.id)
                .unwrap_or(true)
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn check_permission(
            &self,
            resource: &ResourceRef,
            permission: &str,
            subject: &SubjectRef,
            _consistency: Consistency,
        ) -> Result<bool, StoreError> {
            let tuples = self.tuples.lock().unwrap();
            // Direct relation check: resource --relation--> subject, where
            // relation is named after the permission (mirrors a schema
            // whose permission is exactly one relation).
            let direct = tuples.iter().any(|t| {
                t.resource == *resource && t.relation == permission && t.subject == *subject
            });
            if direct {
                return Ok(true);
            }
            // Fall back to the `<action>_rel` wildcard pattern the policy
            // compiler synthesizes onto role resources.
            let rel_name = format!("{permission}_rel");
            Ok(tuples.iter().any(|t| {
                t.resource == *resource && t.relation == rel_name && t.subject.id == subject.id
            }))
        }

        async fn write_relationships(&self, rels: &[RelationshipTuple]) -> Result<(), StoreError> {
            let mut tuples = self.tuples.lock().unwrap();
            for rel in rels {
                if !tuples.contains(rel) {
                    tuples.push(rel.clone());
                }
            }
            Ok(())
        }

        async fn delete_relationship_tuples(
            &self,
            rels: &[RelationshipTuple],
        ) -> Result<(), StoreError> {
            let mut tuples = self.tuples.lock().unwrap();
            tuples.retain(|t| !rels.contains(t));
            Ok(())
        }

        async fn delete_relationships(&self, filter: &RelationshipFilter) -> Result<(), StoreError> {
            let mut tuples = self.tuples.lock().unwrap();
            tuples.retain(|t| !matches(filter, t));
            Ok(())
        }

        async fn read_relationships(
            &self,
            filter: &RelationshipFilter,
        ) -> Result<Vec<RelationshipTuple>, StoreError> {
            Ok(self
                .tuples
                .lock()
                .unwrap()
                .iter()
                .filter(|t| matches(filter, t))
                .cloned()
                .collect())
        }

        async fn write_schema(&self, _schema: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }
}
