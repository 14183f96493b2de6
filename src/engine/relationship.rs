//! Relationship lifecycle: creating, deleting, and listing graph-store
//! relationship tuples.

use tracing::instrument;

use crate::pid::Pid;
use crate::store::{RelationshipFilter, RelationshipTuple};

use super::{AuthEngine, EngineError};

#[derive(Debug, Clone)]
pub struct Relationship {
    pub resource_type: String,
    pub resource_id: Pid,
    pub relation: String,
    pub subject_type: String,
    pub subject_id: Pid,
}

impl From<RelationshipTuple> for Relationship {
    fn from(tuple: RelationshipTuple) -> Self {
        Self {
            resource_type: tuple.resource.type_name,
            resource_id: tuple.resource.id,
            relation: tuple.relation,
            subject_type: tuple.subject.type_name,
            subject_id: tuple.subject.id,
        }
    }
}

impl AuthEngine {
    /// Validates that every relation is declared for the participating
    /// types, then passes the writes through to the graph store.
    #[instrument(skip(self, rels))]
    pub async fn create_relationships(&self, rels: &[Relationship]) -> Result<(), EngineError> {
        let mut tuples = Vec::with_capacity(rels.len());
        for rel in rels {
            tuples.push(self.validate_relationship(rel)?);
        }
        self.graph.write_relationships(&tuples).await?;
        Ok(())
    }

    /// Deletes exactly the given relationship tuples, leaving any other
    /// relation on the resource untouched.
    #[instrument(skip(self, rels))]
    pub async fn delete_relationships_by_tuple(&self, rels: &[Relationship]) -> Result<(), EngineError> {
        let mut tuples = Vec::with_capacity(rels.len());
        for rel in rels {
            tuples.push(self.validate_relationship(rel)?);
        }
        self.graph.delete_relationship_tuples(&tuples).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_relationships_for_resource(
        &self,
        resource_type: &str,
        resource_id: &Pid,
    ) -> Result<(), EngineError> {
        let resource = self.resource_ref(resource_type, resource_id)?;
        self.graph
            .delete_relationships(&RelationshipFilter::for_resource(&resource))
            .await?;
        Ok(())
    }

    /// All relationships where `resource_id` is the resource side.
    #[instrument(skip(self))]
    pub async fn list_relationships_for_resource(
        &self,
        resource_id: &Pid,
    ) -> Result<Vec<Relationship>, EngineError> {
        let resource = self.resource_ref_from_pid(resource_id)?;
        let tuples = self
            .graph
            .read_relationships(&RelationshipFilter::for_resource(&resource))
            .await?;
        Ok(tuples.into_iter().map(Relationship::from).collect())
    }

    /// All relationships where `subject_id` is the subject side.
    #[instrument(skip(self))]
    pub async fn list_relationships_from(&self, subject_id: &Pid) -> Result<Vec<Relationship>, EngineError> {
        let tuples = self
            .graph
            .read_relationships(&RelationshipFilter {
                subject_id: Some(subject_id.clone()),
                ..Default::default()
            })
            .await?;
        Ok(tuples.into_iter().map(Relationship::from).collect())
    }

    /// All relationships where `resource_id` is the resource side, regardless
    /// of relation.
    #[instrument(skip(self))]
    pub async fn list_relationships_to(&self, resource_id: &Pid) -> Result<Vec<Relationship>, EngineError> {
        self.list_relationships_for_resource(resource_id).await
    }

    pub(crate) fn validate_relationship(
        &self,
        rel: &Relationship,
    ) -> Result<RelationshipTuple, EngineError> {
        let resource = self.resource_ref(&rel.resource_type, &rel.resource_id)?;
        let subject = self.subject_ref(&rel.subject_type, &rel.subject_id)?;

        let rt = self
            .policy
            .resource_type(&rel.resource_type)
            .expect("validated by resource_ref");
        let relation_def = rt
            .relation(&rel.relation)
            .ok_or_else(|| EngineError::InvalidArgument(format!(
                "{} declares no relation {:?}",
                rel.resource_type, rel.relation
            )))?;
        let allowed = relation_def
            .targets
            .iter()
            .any(|t| t.type_name == rel.subject_type || t.type_name == "*");
        if !allowed {
            return Err(EngineError::InvalidArgument(format!(
                "relation {:?} on {} does not accept subject type {}",
                rel.relation, rel.resource_type, rel.subject_type
            )));
        }

        Ok(RelationshipTuple {
            resource,
            relation: rel.relation.clone(),
            subject,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::fixture_engine;
    use super::*;

    fn owner_rel(resource: &str, subject: &str) -> Relationship {
        Relationship {
            resource_type: "loadbalancer".to_string(),
            resource_id: Pid::parse(resource).unwrap(),
            relation: "owner".to_string(),
            subject_type: "tenant".to_string(),
            subject_id: Pid::parse(subject).unwrap(),
        }
    }

    #[tokio::test]
    async fn create_then_list_for_resource_and_from_subject() {
        let engine = fixture_engine();
        let rel = owner_rel("loadbal-prod", "tnntten-acme");

        engine.create_relationships(&[rel.clone()]).await.unwrap();

        let by_resource = engine
            .list_relationships_for_resource(&Pid::parse("loadbal-prod").unwrap())
            .await
            .unwrap();
        assert_eq!(by_resource.len(), 1);
        assert_eq!(by_resource[0].relation, "owner");
        assert_eq!(by_resource[0].subject_id, rel.subject_id);

        let by_subject = engine
            .list_relationships_from(&Pid::parse("tnntten-acme").unwrap())
            .await
            .unwrap();
        assert_eq!(by_subject.len(), 1);
        assert_eq!(by_subject[0].resource_id, rel.resource_id);

        let to_resource = engine
            .list_relationships_to(&Pid::parse("loadbal-prod").unwrap())
            .await
            .unwrap();
        assert_eq!(to_resource.len(), 1);
    }

    #[tokio::test]
    async fn delete_by_tuple_removes_only_that_tuple() {
        let engine = fixture_engine();
        let rel_a = owner_rel("loadbal-prod", "tnntten-acme");
        let rel_b = owner_rel("loadbal-staging", "tnntten-acme");
        engine.create_relationships(&[rel_a.clone(), rel_b.clone()]).await.unwrap();

        engine.delete_relationships_by_tuple(&[rel_a]).await.unwrap();

        assert!(engine
            .list_relationships_for_resource(&Pid::parse("loadbal-prod").unwrap())
            .await
            .unwrap()
            .is_empty());
        assert_eq!(
            engine
                .list_relationships_for_resource(&Pid::parse("loadbal-staging").unwrap())
                .await
                .unwrap()
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn delete_for_resource_clears_every_relation_on_it() {
        let engine = fixture_engine();
        let rel = owner_rel("loadbal-prod", "tnntten-acme");
        engine.create_relationships(&[rel]).await.unwrap();

        engine
            .delete_relationships_for_resource("loadbalancer", &Pid::parse("loadbal-prod").unwrap())
            .await
            .unwrap();

        assert!(engine
            .list_relationships_for_resource(&Pid::parse("loadbal-prod").unwrap())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn create_rejects_relation_not_declared_on_resource_type() {
        let engine = fixture_engine();
        let rel = Relationship {
            resource_type: "loadbalancer".to_string(),
            resource_id: Pid::parse("loadbal-prod").unwrap(),
            relation: "no_such_relation".to_string(),
            subject_type: "tenant".to_string(),
            subject_id: Pid::parse("tnntten-acme").unwrap(),
        };
        let err = engine.create_relationships(&[rel]).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn create_rejects_subject_type_not_accepted_by_relation() {
        let engine = fixture_engine();
        let rel = Relationship {
            resource_type: "loadbalancer".to_string(),
            resource_id: Pid::parse("loadbal-prod").unwrap(),
            relation: "owner".to_string(),
            subject_type: "user".to_string(),
            subject_id: Pid::parse("idntusr-alice").unwrap(),
        };
        let err = engine.create_relationships(&[rel]).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidArgument(_)));
    }
}
