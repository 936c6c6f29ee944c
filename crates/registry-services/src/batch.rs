//! Batch deletion guard
//!
//! Bulk deletion can remove many objects in one request, so it needs a
//! server-held secret on top of the usual permission checks. Secret and
//! permission failures stop immediately; per-object problems are collected
//! and reported together.

use std::collections::BTreeSet;
use std::sync::Arc;

use registry_core::config::looks_like_uuid;
use registry_core::models::{DeletionRequest, IntellectualObject, User};
use registry_core::token::secure_compare;
use registry_core::{AppError, AppResult, BatchViolation};

use crate::context::ServiceContext;
use crate::deletion::DeletionService;

#[derive(Debug, Clone)]
pub struct BatchDeletionRequest {
    pub institution_id: i64,
    pub requestor_id: i64,
    pub object_ids: Vec<i64>,
    pub secret_key: String,
}

#[derive(Clone)]
pub struct BatchDeletionGuard {
    ctx: Arc<ServiceContext>,
    deletion: DeletionService,
}

impl BatchDeletionGuard {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let deletion = DeletionService::new(ctx.clone());
        Self { ctx, deletion }
    }

    /// Checks every precondition and returns the requestor and the objects.
    #[tracing::instrument(skip(self, batch), fields(institution_id = batch.institution_id, objects = batch.object_ids.len()))]
    pub async fn validate(
        &self,
        batch: &BatchDeletionRequest,
    ) -> AppResult<(User, Vec<IntellectualObject>)> {
        if !looks_like_uuid(&batch.secret_key)
            || !secure_compare(&batch.secret_key, self.ctx.config.batch_deletion_key())
        {
            tracing::warn!(requestor_id = batch.requestor_id, "Batch deletion with bad secret key");
            return Err(AppError::PermissionDenied(
                "Invalid batch deletion key".to_string(),
            ));
        }

        let requestor = self
            .ctx
            .catalog
            .get_user(batch.requestor_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", batch.requestor_id)))?;
        if !(requestor.is_sys_admin() || requestor.is_admin_of(batch.institution_id)) {
            return Err(AppError::PermissionDenied(format!(
                "User {} may not delete content of institution {}",
                requestor.id, batch.institution_id
            )));
        }

        let ids: Vec<i64> = batch
            .object_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if ids.is_empty() {
            return Err(AppError::InvalidInput(
                "Batch deletion needs at least one object id".to_string(),
            ));
        }

        let objects = self.ctx.catalog.get_objects(&ids).await?;
        let mut violations = Vec::new();
        for id in &ids {
            let Some(object) = objects.iter().find(|o| o.id == *id) else {
                violations.push(BatchViolation::NotFound { object_id: *id });
                continue;
            };
            if object.institution_id != batch.institution_id {
                violations.push(BatchViolation::WrongInstitution {
                    object_id: object.id,
                    institution_id: object.institution_id,
                });
                continue;
            }
            if object.is_deleted() {
                violations.push(BatchViolation::AlreadyDeleted {
                    object_id: object.id,
                });
                continue;
            }
            let pending = self
                .ctx
                .work_items
                .pending_for_object(object.institution_id, &object.bag_name)
                .await?;
            if !pending.is_empty() {
                violations.push(BatchViolation::PendingWork {
                    object_id: object.id,
                    work_item_ids: pending.iter().map(|item| item.id).collect(),
                });
            }
        }

        if !violations.is_empty() {
            tracing::warn!(
                violations = violations.len(),
                "Batch deletion rejected"
            );
            return Err(AppError::BatchRejected(violations));
        }
        Ok((requestor, objects))
    }

    /// Validates the batch and opens one deletion request covering all of it.
    pub async fn request_deletion(&self, batch: &BatchDeletionRequest) -> AppResult<DeletionRequest> {
        let (requestor, objects) = self.validate(batch).await?;
        let request = self
            .deletion
            .request_for_objects(batch.institution_id, &requestor, objects)
            .await?;
        tracing::info!(
            deletion_request_id = request.id,
            objects = request.intellectual_object_ids.len(),
            "Batch deletion requested"
        );
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{TestHarness, TEST_BATCH_KEY};
    use registry_core::models::{Action, AlertType, Role, Stage, State, WorkItemStatus};
    use registry_db::test_helpers::{object, user, work_item_for};

    fn batch(object_ids: Vec<i64>, secret_key: &str) -> BatchDeletionRequest {
        BatchDeletionRequest {
            institution_id: 1,
            requestor_id: 101,
            object_ids,
            secret_key: secret_key.to_string(),
        }
    }

    fn seeded() -> TestHarness {
        let harness = TestHarness::new();
        for id in [10, 11, 12] {
            harness.seed_object(&object(id, 1));
        }
        harness
    }

    #[tokio::test]
    async fn test_valid_batch_opens_one_request() {
        let harness = seeded();
        let request = harness
            .batch_guard()
            .request_deletion(&batch(vec![12, 10, 11, 10], TEST_BATCH_KEY))
            .await
            .unwrap();

        assert_eq!(request.intellectual_object_ids, vec![10, 11, 12]);
        assert_eq!(request.requested_by_id, 101);
        assert!(request.confirmation_token().is_some());
        assert_eq!(harness.store.deletion_requests().len(), 1);
        assert_eq!(
            harness.store.alerts()[0].alert_type,
            AlertType::DeletionRequested
        );
    }

    #[tokio::test]
    async fn test_wrong_secret_fails_fast() {
        let harness = seeded();
        for key in ["", "not-a-uuid", "00000000-0000-0000-0000-000000000000"] {
            let err = harness
                .batch_guard()
                .request_deletion(&batch(vec![10], key))
                .await
                .unwrap_err();
            assert!(matches!(err, AppError::PermissionDenied(_)));
        }
        assert!(harness.store.deletion_requests().is_empty());
    }

    #[tokio::test]
    async fn test_requestor_must_administer_institution() {
        let harness = seeded();
        harness.store.add_user(user(5, 1, Role::InstUser));
        let mut req = batch(vec![10], TEST_BATCH_KEY);
        req.requestor_id = 5;
        let err = harness.batch_guard().validate(&req).await.unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        harness.store.add_user(user(6, 99, Role::SysAdmin));
        req.requestor_id = 6;
        assert!(harness.batch_guard().validate(&req).await.is_ok());
    }

    #[tokio::test]
    async fn test_object_violations_are_reported_together() {
        let harness = seeded();
        let mut deleted = object(13, 1);
        deleted.state = State::Deleted;
        harness.seed_object(&deleted);
        harness.seed_object(&object(20, 2));
        let busy = harness.store.add_work_item(work_item_for(
            &object(11, 1),
            Action::Ingest,
            Stage::Validate,
            WorkItemStatus::Pending,
        ));

        let err = harness
            .batch_guard()
            .request_deletion(&batch(vec![10, 11, 13, 20, 99], TEST_BATCH_KEY))
            .await
            .unwrap_err();

        let violations = match err {
            AppError::BatchRejected(violations) => violations,
            other => panic!("expected BatchRejected, got {:?}", other),
        };
        assert_eq!(
            violations,
            vec![
                BatchViolation::PendingWork {
                    object_id: 11,
                    work_item_ids: vec![busy.id],
                },
                BatchViolation::AlreadyDeleted { object_id: 13 },
                BatchViolation::WrongInstitution {
                    object_id: 20,
                    institution_id: 2,
                },
                BatchViolation::NotFound { object_id: 99 },
            ]
        );
        assert!(harness.store.deletion_requests().is_empty());
    }
}
