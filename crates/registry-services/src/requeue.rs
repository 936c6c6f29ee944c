//! Operator requeue of stuck work items.

use std::sync::Arc;

use registry_core::models::{Stage, User, WorkItem};
use registry_core::requeue::{requeue_options, set_for_requeue};
use registry_core::{AppError, AppResult};

use crate::context::ServiceContext;
use crate::permissions::ensure_sys_admin;
use crate::work_items::WorkItemService;

#[derive(Clone)]
pub struct RequeueService {
    ctx: Arc<ServiceContext>,
    work_items: WorkItemService,
}

impl RequeueService {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let work_items = WorkItemService::new(ctx.clone());
        Self { ctx, work_items }
    }

    /// Stages the operator may pick for this item.
    pub async fn options(&self, work_item_id: i64, user: &User) -> AppResult<(WorkItem, Vec<Stage>)> {
        ensure_sys_admin(user, "requeue work items")?;
        let item = self.load(work_item_id).await?;
        let stages = requeue_options(&item)?;
        Ok((item, stages))
    }

    /// Resets the item to `stage`, saves it and publishes it again.
    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn requeue(&self, work_item_id: i64, stage: Stage, user: &User) -> AppResult<WorkItem> {
        ensure_sys_admin(user, "requeue work items")?;
        let mut item = self.load(work_item_id).await?;
        requeue_options(&item)?;
        set_for_requeue(&mut item, stage).inspect_err(|e| {
            tracing::error!(work_item_id, stage = %stage, error = %e, "Rejected requeue target")
        })?;

        let item = self.ctx.work_items.update(&item).await?;
        self.work_items.dispatch(&item).await?;

        tracing::info!(work_item_id, stage = %stage, "Work item requeued");
        Ok(item)
    }

    async fn load(&self, id: i64) -> AppResult<WorkItem> {
        self.ctx
            .work_items
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Work item {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestHarness;
    use registry_core::models::{Action, Role, WorkItemStatus};
    use registry_db::test_helpers::{object, user, work_item_for};

    fn stuck_ingest(harness: &TestHarness) -> WorkItem {
        let obj = object(1, 1);
        let mut item = work_item_for(&obj, Action::Ingest, Stage::Store, WorkItemStatus::Started);
        item.node = "worker-3".to_string();
        item.pid = 4242;
        item.needs_admin_review = true;
        harness.store.add_work_item(item)
    }

    #[tokio::test]
    async fn test_requeue_resets_and_republishes() {
        let harness = TestHarness::new();
        let item = stuck_ingest(&harness);
        let admin = user(1, 99, Role::SysAdmin);

        let requeued = harness
            .requeue_service()
            .requeue(item.id, Stage::Validate, &admin)
            .await
            .unwrap();

        assert_eq!(requeued.stage, Stage::Validate);
        assert_eq!(requeued.status, WorkItemStatus::Pending);
        assert!(requeued.retry);
        assert!(requeued.node.is_empty());
        assert_eq!(requeued.pid, 0);
        assert_eq!(requeued.note, "Requeued for Validate");
        assert_eq!(
            harness.queue.published(),
            vec![("ingest02_bag_validation".to_string(), item.id)]
        );
        assert!(harness.store.work_item(item.id).unwrap().queued_at.is_some());
    }

    #[tokio::test]
    async fn test_requeue_rejects_future_stage() {
        let harness = TestHarness::new();
        let item = stuck_ingest(&harness);

        let err = harness
            .requeue_service()
            .requeue(item.id, Stage::Cleanup, &user(1, 99, Role::SysAdmin))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidStage { .. }));
        assert_eq!(harness.store.work_item(item.id).unwrap().stage, Stage::Store);
        assert!(harness.queue.published().is_empty());
    }

    #[tokio::test]
    async fn test_only_sys_admins_requeue() {
        let harness = TestHarness::new();
        let item = stuck_ingest(&harness);
        let err = harness
            .requeue_service()
            .options(item.id, &user(2, 1, Role::InstAdmin))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));

        let (_, stages) = harness
            .requeue_service()
            .options(item.id, &user(1, 99, Role::SysAdmin))
            .await
            .unwrap();
        assert_eq!(stages.len(), 6);
    }

    #[tokio::test]
    async fn test_completed_items_cannot_be_requeued() {
        let harness = TestHarness::new();
        let item = stuck_ingest(&harness);
        harness
            .store
            .set_work_item_status(item.id, WorkItemStatus::Success, false);

        let err = harness
            .requeue_service()
            .requeue(item.id, Stage::Receive, &user(1, 99, Role::SysAdmin))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotSupported(_)));
    }
}
