//! Single and bulk permission checks.

use std::cmp::Ordering;

use futures::stream::{self, StreamExt};
use tracing::{debug, instrument};

use crate::pid::Pid;
use crate::store::{Consistency, SubjectRef};

use super::{AuthEngine, EngineError};

#[derive(Debug, Clone)]
pub struct CheckItem {
    pub resource_type: String,
    pub resource_id: Pid,
    pub action: String,
}

#[derive(Debug, Clone)]
pub struct CheckOutcome {
    pub index: usize,
    pub resource_type: String,
    pub resource_id: Pid,
    pub action: String,
    pub permitted: bool,
}

/// Aggregated bulk-check result. Internal failures short-circuit to an
/// `Err`; everything else resolves to one of these two, carrying every
/// item's outcome.
#[derive(Debug)]
pub enum BulkCheckResult {
    Ok(Vec<CheckOutcome>),
    Forbidden(Vec<CheckOutcome>),
}

enum CheckVerdict {
    Permitted,
    NotAssigned,
    Internal(String),
}

impl AuthEngine {
    #[instrument(skip(self))]
    pub async fn subject_has_permission(
        &self,
        subject_type: &str,
        subject_id: &Pid,
        resource_type: &str,
        resource_id: &Pid,
        action: &str,
    ) -> Result<(), EngineError> {
        if !self.policy.action_exists(action) {
            return Err(EngineError::InvalidAction(action.to_string()));
        }
        let resource = self.resource_ref(resource_type, resource_id)?;
        let subject = self.subject_ref(subject_type, subject_id)?;

        let permitted = self
            .graph
            .check_permission(&resource, action, &subject, Consistency::MinimizeLatency)
            .await?;
        if permitted {
            Ok(())
        } else {
            debug!(%action, resource = %resource.id, subject = %subject.id, "action not assigned");
            Err(EngineError::ActionNotAssigned {
                subject: subject.id.to_string(),
                action: action.to_string(),
                resource: resource.id.to_string(),
            })
        }
    }

    /// Drains `items` through a bounded worker pool, bounded by a single
    /// overall timeout. Results are collected unordered and re-sorted by
    /// index before returning, since callers expect the outcome list to
    /// line up with the request they sent.
    #[instrument(skip(self, items))]
    pub async fn check_all_actions(
        &self,
        subject_type: &str,
        subject_id: &Pid,
        items: Vec<CheckItem>,
    ) -> Result<BulkCheckResult, EngineError> {
        let subject = self.subject_ref(subject_type, subject_id)?;
        let concurrency = self.config.check_concurrency.max(1);

        let checks = stream::iter(items.into_iter().enumerate()).map(|(index, item)| {
            let subject = subject.clone();
            async move {
                let verdict = self.check_one(&subject, &item).await;
                (index, item, verdict)
            }
        });

        let collected = tokio::time::timeout(
            self.config.check_timeout,
            checks.buffer_unordered(concurrency).collect::<Vec<_>>(),
        )
        .await
        .map_err(|_| EngineError::Unexpected("bulk permission check timed out".to_string()))?;

        let mut internal = None;
        let mut any_forbidden = false;
        let mut outcomes = Vec::with_capacity(collected.len());
        for (index, item, verdict) in collected {
            let permitted = match verdict {
                CheckVerdict::Permitted => true,
                CheckVerdict::NotAssigned => {
                    any_forbidden = true;
                    false
                }
                CheckVerdict::Internal(reason) => {
                    internal.get_or_insert(reason);
                    false
                }
            };
            outcomes.push(CheckOutcome {
                index,
                resource_type: item.resource_type,
                resource_id: item.resource_id,
                action: item.action,
                permitted,
            });
        }
        outcomes.sort_by(|a, b| a.index.cmp(&b.index).then(Ordering::Equal));

        if let Some(reason) = internal {
            return Err(EngineError::Unexpected(reason));
        }
        if any_forbidden {
            Ok(BulkCheckResult::Forbidden(outcomes))
        } else {
            Ok(BulkCheckResult::Ok(outcomes))
        }
    }

    async fn check_one(&self, subject: &SubjectRef, item: &CheckItem) -> CheckVerdict {
        if !self.policy.action_exists(&item.action) {
            return CheckVerdict::Internal(format!("unknown action {:?}", item.action));
        }
        let resource = match self.resource_ref(&item.resource_type, &item.resource_id) {
            Ok(r) => r,
            Err(e) => return CheckVerdict::Internal(e.to_string()),
        };
        match self
            .graph
            .check_permission(&resource, &item.action, subject, Consistency::MinimizeLatency)
            .await
        {
            Ok(true) => CheckVerdict::Permitted,
            Ok(false) => CheckVerdict::NotAssigned,
            Err(e) => CheckVerdict::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::fixture_engine;
    use super::*;
    use crate::store::{GraphStore, RelationshipTuple, ResourceRef};

    fn lb(id: &str) -> (ResourceRef, Pid) {
        let pid = Pid::parse(&format!("loadbal-{id}")).unwrap();
        (ResourceRef { type_name: "loadbalancer".to_string(), id: pid.clone() }, pid)
    }

    #[tokio::test]
    async fn subject_has_permission_succeeds_when_granted() {
        let engine = fixture_engine();
        let (resource, resource_id) = lb("prod");
        let user = Pid::parse("idntusr-alice").unwrap();
        let subject = SubjectRef { type_name: "user".to_string(), id: user.clone(), relation: None };

        engine
            .graph
            .write_relationships(&[RelationshipTuple {
                resource: resource.clone(),
                relation: "loadbalancer_get".to_string(),
                subject: subject.clone(),
            }])
            .await
            .unwrap();

        engine
            .subject_has_permission("user", &user, "loadbalancer", &resource_id, "loadbalancer_get")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn subject_has_permission_names_subject_action_and_resource_when_denied() {
        let engine = fixture_engine();
        let (_, resource_id) = lb("prod");
        let user = Pid::parse("idntusr-alice").unwrap();

        let err = engine
            .subject_has_permission("user", &user, "loadbalancer", &resource_id, "loadbalancer_get")
            .await
            .unwrap_err();

        match err {
            EngineError::ActionNotAssigned { subject, action, resource } => {
                assert_eq!(subject, user.to_string());
                assert_eq!(action, "loadbalancer_get");
                assert_eq!(resource, resource_id.to_string());
            }
            other => panic!("expected ActionNotAssigned, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn check_all_actions_aggregates_to_forbidden_when_any_item_is_denied() {
        let engine = fixture_engine();
        let (granted_resource, granted_id) = lb("prod");
        let (_, denied_id) = lb("staging");
        let user = Pid::parse("idntusr-alice").unwrap();
        let subject = SubjectRef { type_name: "user".to_string(), id: user.clone(), relation: None };

        engine
            .graph
            .write_relationships(&[RelationshipTuple {
                resource: granted_resource,
                relation: "loadbalancer_get".to_string(),
                subject,
            }])
            .await
            .unwrap();

        let items = vec![
            CheckItem {
                resource_type: "loadbalancer".to_string(),
                resource_id: granted_id.clone(),
                action: "loadbalancer_get".to_string(),
            },
            CheckItem {
                resource_type: "loadbalancer".to_string(),
                resource_id: denied_id.clone(),
                action: "loadbalancer_get".to_string(),
            },
        ];

        let result = engine.check_all_actions("user", &user, items).await.unwrap();
        let outcomes = match result {
            BulkCheckResult::Forbidden(outcomes) => outcomes,
            BulkCheckResult::Ok(_) => panic!("expected Forbidden, a check was denied"),
        };

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].index, 0);
        assert_eq!(outcomes[0].resource_id, granted_id);
        assert!(outcomes[0].permitted);
        assert_eq!(outcomes[1].index, 1);
        assert_eq!(outcomes[1].resource_id, denied_id);
        assert!(!outcomes[1].permitted);
    }

    #[tokio::test]
    async fn check_all_actions_is_ok_when_every_item_is_permitted() {
        let engine = fixture_engine();
        let (resource, resource_id) = lb("prod");
        let user = Pid::parse("idntusr-alice").unwrap();
        let subject = SubjectRef { type_name: "user".to_string(), id: user.clone(), relation: None };

        engine
            .graph
            .write_relationships(&[RelationshipTuple {
                resource,
                relation: "loadbalancer_get".to_string(),
                subject,
            }])
            .await
            .unwrap();

        let items = vec![CheckItem {
            resource_type: "loadbalancer".to_string(),
            resource_id,
            action: "loadbalancer_get".to_string(),
        }];

        let result = engine.check_all_actions("user", &user, items).await.unwrap();
        assert!(matches!(result, BulkCheckResult::Ok(_)));
    }

    #[tokio::test]
    async fn check_all_actions_rejects_unknown_action_as_internal_error() {
        let engine = fixture_engine();
        let (_, resource_id) = lb("prod");
        let user = Pid::parse("idntusr-alice").unwrap();

        let items = vec![CheckItem {
            resource_type: "loadbalancer".to_string(),
            resource_id,
            action: "no_such_action".to_string(),
        }];

        let err = engine.check_all_actions("user", &user, items).await.unwrap_err();
        assert!(matches!(err, EngineError::Unexpected(_)));
    }
}
