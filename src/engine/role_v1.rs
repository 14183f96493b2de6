//! v1 role lifecycle: no metadata row, subjects attached directly via a
//! `subject` relation on the role.

use tracing::instrument;
use uuid::Uuid;

use crate::pid::{Pid, PREFIX_ROLE_V1};
use crate::policy::compiled::CompiledPolicy;
use crate::store::{Consistency, RelationshipFilter, RelationshipTuple, ResourceRef, SubjectRef};

use super::{AuthEngine, EngineError, RoleV1};

impl AuthEngine {
    #[instrument(skip(self, actions))]
    pub async fn create_role_v1(
        &self,
        owner: &Pid,
        actions: Vec<String>,
    ) -> Result<RoleV1, EngineError> {
        self.validate_actions(&actions)?;
        let rbac = self.rbac()?;
        let owner_ref = self.resource_ref_from_pid(owner)?;

        let role_id = Pid::new(PREFIX_ROLE_V1, &Uuid::new_v4().simple().to_string());
        let role_ref = ResourceRef {
            type_name: rbac.role_type_name.clone(),
            id: role_id.clone(),
        };

        let mut tuples = vec![RelationshipTuple {
            resource: role_ref.clone(),
            relation: "owner".to_string(),
            subject: SubjectRef {
                type_name: owner_ref.type_name.clone(),
                id: owner_ref.id.clone(),
                relation: None,
            },
        }];
        tuples.extend(self.action_wildcard_tuples(&role_ref, &actions));

        self.graph.write_relationships(&tuples).await?;

        Ok(RoleV1 {
            id: role_id,
            owner: owner.clone(),
            actions,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_role_v1(&self, role_id: &Pid) -> Result<RoleV1, EngineError> {
        let rbac = self.rbac()?;
        let role_ref = ResourceRef {
            type_name: rbac.role_type_name.clone(),
            id: role_id.clone(),
        };
        let owner_tuples = self
            .graph
            .read_relationships(&RelationshipFilter {
                resource_type: Some(rbac.role_type_name.clone()),
                resource_id: Some(role_id.clone()),
                relation: Some("owner".to_string()),
                ..Default::default()
            })
            .await?;
        let owner = owner_tuples
            .first()
            .map(|t| t.subject.id.clone())
            .ok_or(EngineError::RoleNotFound)?;

        let actions = self.actions_from_wildcard_tuples(&role_ref).await?;
        Ok(RoleV1 {
            id: role_id.clone(),
            owner,
            actions,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_roles_v1(&self, owner: &Pid) -> Result<Vec<RoleV1>, EngineError> {
        let rbac = self.rbac()?;
        let by_owner = self
            .graph
            .read_relationships(&RelationshipFilter {
                resource_type: Some(rbac.role_type_name.clone()),
                relation: Some("owner".to_string()),
                subject_id: Some(owner.clone()),
                ..Default::default()
            })
            .await?;

        let mut roles = Vec::with_capacity(by_owner.len());
        for tuple in by_owner {
            roles.push(self.get_role_v1(&tuple.resource.id).await?);
        }
        Ok(roles)
    }

    /// v1 delete: drop metadata is a no-op (v1 roles have none); delete all
    /// relationships where the role is subject or resource. This does not
    /// cascade beyond that — outstanding assignment back-edges elsewhere
    /// are left to the graph store's own schema.
    #[instrument(skip(self))]
    pub async fn delete_role_v1(&self, role_id: &Pid) -> Result<(), EngineError> {
        let rbac = self.rbac()?;
        self.graph
            .delete_relationships(&RelationshipFilter {
                resource_type: Some(rbac.role_type_name.clone()),
                resource_id: Some(role_id.clone()),
                ..Default::default()
            })
            .await?;
        self.graph
            .delete_relationships(&RelationshipFilter {
                subject_type: Some(rbac.role_type_name.clone()),
                subject_id: Some(role_id.clone()),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn assign_subject_role(
        &self,
        role_id: &Pid,
        subject: &Pid,
    ) -> Result<(), EngineError> {
        let rbac = self.rbac()?;
        let subject_ref = self.resource_ref_from_pid(subject)?;
        let tuple = RelationshipTuple {
            resource: ResourceRef {
                type_name: rbac.role_type_name.clone(),
                id: role_id.clone(),
            },
            relation: "subject".to_string(),
            subject: SubjectRef {
                type_name: subject_ref.type_name,
                id: subject_ref.id,
                relation: None,
            },
        };
        self.graph.write_relationships(&[tuple]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn unassign_subject_role(
        &self,
        role_id: &Pid,
        subject: &Pid,
    ) -> Result<(), EngineError> {
        let rbac = self.rbac()?;
        let subject_ref = self.resource_ref_from_pid(subject)?;
        let tuple = RelationshipTuple {
            resource: ResourceRef {
                type_name: rbac.role_type_name.clone(),
                id: role_id.clone(),
            },
            relation: "subject".to_string(),
            subject: SubjectRef {
                type_name: subject_ref.type_name,
                id: subject_ref.id,
                relation: None,
            },
        };
        self.graph.delete_relationship_tuples(&[tuple]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_assignments(&self, role_id: &Pid) -> Result<Vec<Pid>, EngineError> {
        let rbac = self.rbac()?;
        let tuples = self
            .graph
            .read_relationships(&RelationshipFilter {
                resource_type: Some(rbac.role_type_name.clone()),
                resource_id: Some(role_id.clone()),
                relation: Some("subject".to_string()),
                ..Default::default()
            })
            .await?;
        Ok(tuples.into_iter().map(|t| t.subject.id).collect())
    }

    fn action_wildcard_tuples(
        &self,
        role_ref: &ResourceRef,
        actions: &[String],
    ) -> Vec<RelationshipTuple> {
        let rbac = match &self.policy.rbac {
            Some(rbac) => rbac,
            None => return vec![],
        };
        actions
            .iter()
            .flat_map(|action| {
                rbac.role_subject_types.iter().map(move |subject_type| RelationshipTuple {
                    resource: role_ref.clone(),
                    relation: CompiledPolicy::permission_relation(action),
                    subject: SubjectRef {
                        type_name: subject_type.clone(),
                        id: Pid::new(subject_type, "*"),
                        relation: Some("*".to_string()),
                    },
                })
            })
            .collect()
    }

    pub(crate) async fn actions_from_wildcard_tuples(
        &self,
        role_ref: &ResourceRef,
    ) -> Result<Vec<String>, EngineError> {
        let mut actions = Vec::new();
        for action in &self.policy.actions {
            let tuples = self
                .graph
                .read_relationships(&RelationshipFilter {
                    resource_type: Some(role_ref.type_name.clone()),
                    resource_id: Some(role_ref.id.clone()),
                    relation: Some(CompiledPolicy::permission_relation(action)),
                    ..Default::default()
                })
                .await?;
            if !tuples.is_empty() {
                actions.push(action.clone());
            }
        }
        Ok(actions)
    }

    /// `SubjectHasPermission` for v1 checks `role_get` on the role's
    /// *owning* resource.
    pub async fn check_role_get_v1(&self, role_id: &Pid, subject: &Pid) -> Result<bool, EngineError> {
        let role = self.get_role_v1(role_id).await?;
        let owner_ref = self.resource_ref_from_pid(&role.owner)?;
        let subject_ref = self.resource_ref_from_pid(subject)?;
        Ok(self
            .graph
            .check_permission(&owner_ref, "role_get", &subject_ref, Consistency::MinimizeLatency)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::fixture_engine;
    use crate::pid::Pid;

    #[tokio::test]
    async fn create_assign_and_list_assignments() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();
        let user = Pid::parse("idntusr-alice").unwrap();

        let role = engine
            .create_role_v1(&tenant, vec!["loadbalancer_get".to_string()])
            .await
            .unwrap();
        assert_eq!(role.owner, tenant);
        assert_eq!(role.actions, vec!["loadbalancer_get".to_string()]);

        engine.assign_subject_role(&role.id, &user).await.unwrap();
        let assignments = engine.list_assignments(&role.id).await.unwrap();
        assert_eq!(assignments, vec![user.clone()]);

        engine.unassign_subject_role(&role.id, &user).await.unwrap();
        assert!(engine.list_assignments(&role.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_and_list_roundtrip_through_wildcard_tuples() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();

        let created = engine
            .create_role_v1(&tenant, vec!["loadbalancer_get".to_string()])
            .await
            .unwrap();

        let fetched = engine.get_role_v1(&created.id).await.unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.actions, vec!["loadbalancer_get".to_string()]);

        let listed = engine.list_roles_v1(&tenant).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, created.id);
    }

    #[tokio::test]
    async fn delete_removes_role_as_both_resource_and_subject() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();
        let user = Pid::parse("idntusr-alice").unwrap();

        let role = engine.create_role_v1(&tenant, vec![]).await.unwrap();
        engine.assign_subject_role(&role.id, &user).await.unwrap();

        engine.delete_role_v1(&role.id).await.unwrap();

        assert!(matches!(
            engine.get_role_v1(&role.id).await,
            Err(crate::engine::EngineError::RoleNotFound)
        ));
    }

    #[tokio::test]
    async fn create_rejects_unknown_action() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();
        let err = engine
            .create_role_v1(&tenant, vec!["no_such_action".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, crate::engine::EngineError::InvalidAction(_)));
    }
}
