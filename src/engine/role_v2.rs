//! v2 role and role-binding lifecycle: a durable metadata row plus
//! graph-store relationships, committed together.

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::pid::{Pid, PREFIX_ROLE_BINDING, PREFIX_ROLE_V2};
use crate::policy::compiled::CompiledPolicy;
use crate::store::{RelationshipFilter, RelationshipTuple, ResourceRef, RoleRow, SubjectRef};

use super::{AuthEngine, EngineError, RoleBinding, RoleBindingSubject, RoleV2};

impl AuthEngine {
    #[instrument(skip(self, actions))]
    pub async fn create_role_v2(
        &self,
        owner: &Pid,
        name: &str,
        actions: Vec<String>,
        created_by: &str,
    ) -> Result<RoleV2, EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::InvalidArgument("role name is empty".to_string()));
        }
        self.validate_actions(&actions)?;
        let rbac = self.rbac()?;
        let owner_ref = self.resource_ref_from_pid(owner)?;

        let role_id = Pid::new(PREFIX_ROLE_V2, &Uuid::new_v4().simple().to_string());
        let now = Utc::now();
        let row = RoleRow {
            id: role_id.clone(),
            name: name.to_string(),
            resource_id: owner.clone(),
            created_by: created_by.to_string(),
            updated_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.metadata.begin().await?;
        if let Err(err) = tx.insert_role(&row).await {
            tx.rollback().await.ok();
            return Err(err.into());
        }

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
        tuples.extend(self.action_rel_tuples(&role_ref, &actions, &rbac.role_subject_types));

        if let Err(err) = self.graph.write_relationships(&tuples).await {
            tx.rollback().await.ok();
            return Err(err.into());
        }

        tx.commit().await?;

        Ok(RoleV2 {
            id: role_id,
            name: name.to_string(),
            owner: owner.clone(),
            actions,
            created_by: created_by.to_string(),
            updated_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Diffs `new_actions` against the role's current actions and its name
    /// against the stored name; a request that changes neither is a no-op.
    #[instrument(skip(self, new_actions))]
    pub async fn update_role_v2(
        &self,
        role_id: &Pid,
        new_name: Option<&str>,
        new_actions: Option<Vec<String>>,
        updated_by: &str,
    ) -> Result<RoleV2, EngineError> {
        if let Some(actions) = &new_actions {
            self.validate_actions(actions)?;
        }
        let rbac = self.rbac()?;
        let role_ref = {
            let row = self
                .metadata
                .get_role(role_id)
                .await?
                .ok_or(EngineError::RoleNotFound)?;
            ResourceRef {
                type_name: rbac.role_type_name.clone(),
                id: row.id,
            }
        };

        let mut tx = self.metadata.begin().await?;
        let row = tx
            .lock_role_for_update(role_id)
            .await?
            .ok_or(EngineError::RoleNotFound)?;

        let current_actions = self.actions_from_wildcard_tuples(&role_ref).await?;
        let name_changed = matches!(new_name, Some(n) if !n.trim().is_empty() && n != row.name);
        let actions_changed = new_actions
            .as_ref()
            .map(|a| !same_action_set(a, &current_actions))
            .unwrap_or(false);

        if !name_changed && !actions_changed {
            tx.rollback().await.ok();
            return Ok(RoleV2 {
                id: row.id,
                name: row.name,
                owner: row.resource_id,
                actions: current_actions,
                created_by: row.created_by,
                updated_by: row.updated_by,
                created_at: row.created_at,
                updated_at: row.updated_at,
            });
        }

        let now = Utc::now();
        let final_name = if name_changed {
            new_name.unwrap().to_string()
        } else {
            row.name.clone()
        };

        if name_changed {
            if let Err(err) = tx.update_role(role_id, &final_name, updated_by, now).await {
                tx.rollback().await.ok();
                return Err(err.into());
            }
        }

        let final_actions = if actions_changed {
            let wanted = new_actions.clone().unwrap();
            let to_add: Vec<String> = wanted
                .iter()
                .filter(|a| !current_actions.contains(a))
                .cloned()
                .collect();
            let to_remove: Vec<String> = current_actions
                .iter()
                .filter(|a| !wanted.contains(a))
                .cloned()
                .collect();

            let add_tuples = self.action_rel_tuples(&role_ref, &to_add, &rbac.role_subject_types);
            let remove_tuples =
                self.action_rel_tuples(&role_ref, &to_remove, &rbac.role_subject_types);

            if let Err(err) = self.graph.write_relationships(&add_tuples).await {
                tx.rollback().await.ok();
                return Err(err.into());
            }
            if let Err(err) = self.graph.delete_relationship_tuples(&remove_tuples).await {
                tx.rollback().await.ok();
                return Err(err.into());
            }
            wanted
        } else {
            current_actions
        };

        tx.commit().await?;

        Ok(RoleV2 {
            id: role_id.clone(),
            name: final_name,
            owner: row.resource_id,
            actions: final_actions,
            created_by: row.created_by,
            updated_by: updated_by.to_string(),
            created_at: row.created_at,
            updated_at: now,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_role_v2(&self, role_id: &Pid) -> Result<RoleV2, EngineError> {
        let rbac = self.rbac()?;
        let row = self
            .metadata
            .get_role(role_id)
            .await?
            .ok_or(EngineError::RoleNotFound)?;
        let role_ref = ResourceRef {
            type_name: rbac.role_type_name.clone(),
            id: row.id.clone(),
        };
        let actions = self.actions_from_wildcard_tuples(&role_ref).await?;
        Ok(RoleV2 {
            id: row.id,
            name: row.name,
            owner: row.resource_id,
            actions,
            created_by: row.created_by,
            updated_by: row.updated_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    #[instrument(skip(self))]
    pub async fn list_roles_v2(&self, owner: &Pid) -> Result<Vec<RoleV2>, EngineError> {
        let rows = self.metadata.list_roles(owner).await?;
        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            roles.push(self.get_role_v2(&row.id).await?);
        }
        Ok(roles)
    }

    /// Refuses with `DeleteRoleInUse` while any binding still references the
    /// role.
    #[instrument(skip(self))]
    pub async fn delete_role_v2(&self, role_id: &Pid) -> Result<(), EngineError> {
        let rbac = self.rbac()?;
        let bound = self
            .graph
            .read_relationships(&RelationshipFilter {
                subject_type: Some(rbac.role_type_name.clone()),
                subject_id: Some(role_id.clone()),
                relation: Some("role".to_string()),
                ..Default::default()
            })
            .await?;
        if !bound.is_empty() {
            return Err(EngineError::DeleteRoleInUse);
        }

        let mut tx = self.metadata.begin().await?;
        if !tx.delete_role(role_id).await? {
            tx.rollback().await.ok();
            return Err(EngineError::RoleNotFound);
        }

        if let Err(err) = self
            .graph
            .delete_relationships(&RelationshipFilter {
                resource_type: Some(rbac.role_type_name.clone()),
                resource_id: Some(role_id.clone()),
                ..Default::default()
            })
            .await
        {
            tx.rollback().await.ok();
            return Err(err.into());
        }

        tx.commit().await?;
        Ok(())
    }

    /// Binds `role_id` to `target` for the given subjects via the 3-way
    /// relationship `target--grant-->binding--role-->role`,
    /// `binding--subject-->subject`.
    #[instrument(skip(self, subjects))]
    pub async fn bind_role_v2(
        &self,
        target: &Pid,
        role_id: &Pid,
        subjects: &[Pid],
    ) -> Result<RoleBinding, EngineError> {
        let rbac = self.rbac()?;
        self.metadata
            .get_role(role_id)
            .await?
            .ok_or(EngineError::RoleNotFound)?;

        let target_ref = self.resource_ref_from_pid(target)?;
        let binding_id = Pid::new(PREFIX_ROLE_BINDING, &Uuid::new_v4().simple().to_string());
        let binding_ref = ResourceRef {
            type_name: rbac.role_binding_type_name.clone(),
            id: binding_id.clone(),
        };

        let mut tuples = vec![
            RelationshipTuple {
                resource: target_ref.clone(),
                relation: "grant".to_string(),
                subject: SubjectRef {
                    type_name: binding_ref.type_name.clone(),
                    id: binding_ref.id.clone(),
                    relation: None,
                },
            },
            RelationshipTuple {
                resource: binding_ref.clone(),
                relation: "role".to_string(),
                subject: SubjectRef {
                    type_name: rbac.role_type_name.clone(),
                    id: role_id.clone(),
                    relation: None,
                },
            },
        ];
        let mut bound_subjects = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let subject_ref = self.resource_ref_from_pid(subject)?;
            tuples.push(RelationshipTuple {
                resource: binding_ref.clone(),
                relation: "subject".to_string(),
                subject: SubjectRef {
                    type_name: subject_ref.type_name.clone(),
                    id: subject_ref.id.clone(),
                    relation: None,
                },
            });
            bound_subjects.push(RoleBindingSubject {
                resource: subject_ref,
                condition: None,
            });
        }

        self.graph.write_relationships(&tuples).await?;

        Ok(RoleBinding {
            id: binding_id,
            role_id: role_id.clone(),
            target: target_ref,
            subjects: bound_subjects,
        })
    }

    #[instrument(skip(self))]
    pub async fn unbind_role_v2(&self, target: &Pid, binding_id: &Pid) -> Result<(), EngineError> {
        let rbac = self.rbac()?;
        let target_ref = self.resource_ref_from_pid(target)?;
        self.graph
            .delete_relationships(&RelationshipFilter {
                resource_type: Some(target_ref.type_name),
                resource_id: Some(target_ref.id),
                relation: Some("grant".to_string()),
                subject_type: Some(rbac.role_binding_type_name.clone()),
                subject_id: Some(binding_id.clone()),
            })
            .await?;
        self.graph
            .delete_relationships(&RelationshipFilter {
                resource_type: Some(rbac.role_binding_type_name.clone()),
                resource_id: Some(binding_id.clone()),
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_role_bindings_v2(&self, target: &Pid) -> Result<Vec<RoleBinding>, EngineError> {
        let rbac = self.rbac()?;
        let target_ref = self.resource_ref_from_pid(target)?;
        let grants = self
            .graph
            .read_relationships(&RelationshipFilter {
                resource_type: Some(target_ref.type_name.clone()),
                resource_id: Some(target_ref.id.clone()),
                relation: Some("grant".to_string()),
                ..Default::default()
            })
            .await?;

        let mut bindings = Vec::with_capacity(grants.len());
        for grant in grants {
            let binding_id = grant.subject.id;
            let role_tuples = self
                .graph
                .read_relationships(&RelationshipFilter {
                    resource_type: Some(rbac.role_binding_type_name.clone()),
                    resource_id: Some(binding_id.clone()),
                    relation: Some("role".to_string()),
                    ..Default::default()
                })
                .await?;
            let Some(role_id) = role_tuples.first().map(|t| t.subject.id.clone()) else {
                continue;
            };
            let subject_tuples = self
                .graph
                .read_relationships(&RelationshipFilter {
                    resource_type: Some(rbac.role_binding_type_name.clone()),
                    resource_id: Some(binding_id.clone()),
                    relation: Some("subject".to_string()),
                    ..Default::default()
                })
                .await?;
            let subjects = subject_tuples
                .into_iter()
                .map(|t| RoleBindingSubject {
                    resource: ResourceRef {
                        type_name: t.subject.type_name,
                        id: t.subject.id,
                    },
                    condition: None,
                })
                .collect();

            bindings.push(RoleBinding {
                id: binding_id,
                role_id,
                target: target_ref.clone(),
                subjects,
            });
        }
        Ok(bindings)
    }

    fn action_rel_tuples(
        &self,
        role_ref: &ResourceRef,
        actions: &[String],
        subject_types: &[String],
    ) -> Vec<RelationshipTuple> {
        actions
            .iter()
            .flat_map(|action| {
                subject_types.iter().map(move |subject_type| RelationshipTuple {
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
}

fn same_action_set(a: &[String], b: &[String]) -> bool {
    a.len() == b.len() && a.iter().all(|x| b.contains(x))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::fixture_engine;
    use crate::pid::Pid;

    #[tokio::test]
    async fn create_update_and_delete_role() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();

        let role = engine
            .create_role_v2(&tenant, "readers", vec!["loadbalancer_get".to_string()], "alice")
            .await
            .unwrap();
        assert_eq!(role.name, "readers");
        assert_eq!(role.owner, tenant);

        let fetched = engine.get_role_v2(&role.id).await.unwrap();
        assert_eq!(fetched.actions, vec!["loadbalancer_get".to_string()]);

        let renamed = engine
            .update_role_v2(&role.id, Some("viewers"), None, "bob")
            .await
            .unwrap();
        assert_eq!(renamed.name, "viewers");
        assert_eq!(renamed.updated_by, "bob");
        assert_eq!(renamed.actions, vec!["loadbalancer_get".to_string()]);

        engine.delete_role_v2(&role.id).await.unwrap();
        assert!(matches!(
            engine.get_role_v2(&role.id).await,
            Err(crate::engine::EngineError::RoleNotFound)
        ));
    }

    #[tokio::test]
    async fn update_with_no_changes_is_a_no_op() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();

        let role = engine
            .create_role_v2(&tenant, "readers", vec!["loadbalancer_get".to_string()], "alice")
            .await
            .unwrap();

        let result = engine
            .update_role_v2(&role.id, Some("readers"), None, "bob")
            .await
            .unwrap();

        assert_eq!(result.name, "readers");
        assert_eq!(result.updated_by, "alice");
    }

    #[tokio::test]
    async fn duplicate_name_for_same_owner_is_rejected() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();

        engine
            .create_role_v2(&tenant, "readers", vec![], "alice")
            .await
            .unwrap();

        let err = engine
            .create_role_v2(&tenant, "readers", vec![], "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::engine::EngineError::RoleNameTaken));
    }

    #[tokio::test]
    async fn bind_and_unbind_role() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();
        let user = Pid::parse("idntusr-alice").unwrap();
        let lb = Pid::parse("loadbal-prod").unwrap();

        let role = engine
            .create_role_v2(&tenant, "readers", vec!["loadbalancer_get".to_string()], "alice")
            .await
            .unwrap();

        let binding = engine
            .bind_role_v2(&lb, &role.id, std::slice::from_ref(&user))
            .await
            .unwrap();
        assert_eq!(binding.role_id, role.id);
        assert_eq!(binding.subjects.len(), 1);
        assert_eq!(binding.subjects[0].resource.id, user);

        let bindings = engine.list_role_bindings_v2(&lb).await.unwrap();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].id, binding.id);

        engine.unbind_role_v2(&lb, &binding.id).await.unwrap();
        assert!(engine.list_role_bindings_v2(&lb).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_fails_while_role_is_bound() {
        let engine = fixture_engine();
        let tenant = Pid::parse("tnntten-acme").unwrap();
        let user = Pid::parse("idntusr-alice").unwrap();
        let lb = Pid::parse("loadbal-prod").unwrap();

        let role = engine
            .create_role_v2(&tenant, "readers", vec![], "alice")
            .await
            .unwrap();
        engine
            .bind_role_v2(&lb, &role.id, std::slice::from_ref(&user))
            .await
            .unwrap();

        let err = engine.delete_role_v2(&role.id).await.unwrap_err();
        assert!(matches!(err, crate::engine::EngineError::DeleteRoleInUse));
    }
}
