//! Creating and dispatching delete/restore work items.
//!
//! New items copy the deposit identity (bag name, bucket, etag, object
//! identifier) from the object's last successful ingest, so the worker can
//! find the bag exactly as it was stored.

use chrono::Utc;
use std::sync::Arc;

use registry_core::models::{
    Action, GenericFile, IntellectualObject, User, WorkItem, WorkItemStatus,
};
use registry_core::stages::{initial_stage, topic_for};
use registry_core::{AppError, AppResult};

use crate::context::ServiceContext;

const NOT_STARTED: &str = "Not started";

/// What a new work item acts on. File targets still carry their parent
/// object, which identifies the bag.
#[derive(Debug, Clone, Copy)]
pub enum WorkTarget<'a> {
    Object(&'a IntellectualObject),
    File(&'a IntellectualObject, &'a GenericFile),
}

impl<'a> WorkTarget<'a> {
    pub fn object(&self) -> &'a IntellectualObject {
        match self {
            WorkTarget::Object(object) | WorkTarget::File(object, _) => object,
        }
    }

    pub fn file(&self) -> Option<&'a GenericFile> {
        match self {
            WorkTarget::Object(_) => None,
            WorkTarget::File(_, file) => Some(file),
        }
    }

    pub fn identifier(&self) -> &'a str {
        match self {
            WorkTarget::Object(object) => &object.identifier,
            WorkTarget::File(_, file) => &file.identifier,
        }
    }
}

#[derive(Clone)]
pub struct WorkItemService {
    ctx: Arc<ServiceContext>,
}

impl WorkItemService {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Builds an unsaved item for `action` on `target`, requested by `user`.
    /// Fails with `NotFound` if the object was never successfully ingested.
    #[tracing::instrument(skip(self, target, user), fields(object_id = target.object().id))]
    pub async fn build(
        &self,
        action: Action,
        target: WorkTarget<'_>,
        user: &User,
    ) -> AppResult<WorkItem> {
        let object = target.object();
        let template = self
            .ctx
            .work_items
            .last_successful_ingest(object.id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "No successful ingest found for {}",
                    object.identifier
                ))
            })?;

        let now = Utc::now();
        let mut item = template;
        item.id = 0;
        item.action = action;
        item.stage = initial_stage(action)?;
        item.status = WorkItemStatus::Pending;
        item.note = NOT_STARTED.to_string();
        item.outcome = NOT_STARTED.to_string();
        item.retry = false;
        item.needs_admin_review = false;
        item.node.clear();
        item.pid = 0;
        item.queued_at = None;
        item.stage_started_at = None;
        item.date_processed = now;
        item.deletion_request_id = None;
        item.user = user.email.clone();
        item.intellectual_object_id = Some(object.id);
        item.object_identifier = Some(object.identifier.clone());
        item.generic_file_id = None;
        item.generic_file_identifier = None;
        if let Some(file) = target.file() {
            item.generic_file_id = Some(file.id);
            item.generic_file_identifier = Some(file.identifier.clone());
            item.size = file.size;
        }
        item.created_at = now;
        item.updated_at = now;
        Ok(item)
    }

    /// Publishes a saved item to its topic and stamps `queued_at`. A transport
    /// failure is returned as-is and leaves `queued_at` empty.
    #[tracing::instrument(skip(self, item), fields(work_item_id = item.id))]
    pub async fn dispatch(&self, item: &WorkItem) -> AppResult<()> {
        let topic = topic_for(item.action, item.stage).inspect_err(|e| {
            tracing::error!(
                action = %item.action,
                stage = %item.stage,
                error = %e,
                "Work item has no routing rule"
            )
        })?;
        self.ctx.queue.enqueue(topic, item.id).await?;
        self.ctx.work_items.mark_queued(item.id, Utc::now()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestHarness;
    use registry_core::models::{Role, Stage};
    use registry_db::test_helpers::{file, object, successful_ingest, user};
    use registry_db::WorkItemStore;

    #[tokio::test]
    async fn test_build_copies_last_successful_ingest() {
        let harness = TestHarness::new();
        let obj = object(1, 1);
        let gf = file(2, &obj);
        harness.store.add_object(obj.clone());
        let ingest = harness.store.add_work_item(successful_ingest(&obj));
        let requester = user(3, 1, Role::InstAdmin);

        let item = harness
            .work_item_service()
            .build(Action::Delete, WorkTarget::File(&obj, &gf), &requester)
            .await
            .unwrap();

        assert_eq!(item.id, 0);
        assert_eq!(item.name, ingest.name);
        assert_eq!(item.etag, ingest.etag);
        assert_eq!(item.bucket, ingest.bucket);
        assert_eq!(item.action, Action::Delete);
        assert_eq!(item.stage, Stage::Requested);
        assert_eq!(item.status, WorkItemStatus::Pending);
        assert!(!item.retry);
        assert_eq!(item.user, requester.email);
        assert_eq!(item.generic_file_id, Some(2));
        assert_eq!(item.size, gf.size);
        assert_eq!(item.note, "Not started");
    }

    #[tokio::test]
    async fn test_build_needs_a_prior_ingest() {
        let harness = TestHarness::new();
        let obj = object(1, 1);
        let err = harness
            .work_item_service()
            .build(Action::Delete, WorkTarget::Object(&obj), &user(3, 1, Role::InstAdmin))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_dispatch_routes_and_stamps_queued_at() {
        let harness = TestHarness::new();
        let obj = object(1, 1);
        harness.store.add_work_item(successful_ingest(&obj));
        let service = harness.work_item_service();
        let item = service
            .build(Action::Delete, WorkTarget::Object(&obj), &user(3, 1, Role::InstAdmin))
            .await
            .unwrap();
        let saved = harness.store.insert(&item).await.unwrap();

        service.dispatch(&saved).await.unwrap();

        assert_eq!(harness.queue.published(), vec![("delete_item".to_string(), saved.id)]);
        assert!(harness.store.work_item(saved.id).unwrap().queued_at.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_failure_leaves_item_unqueued() {
        let harness = TestHarness::new();
        harness.queue.fail_with("nsqd unavailable");
        let obj = object(1, 1);
        harness.store.add_work_item(successful_ingest(&obj));
        let service = harness.work_item_service();
        let item = service
            .build(Action::RestoreObject, WorkTarget::Object(&obj), &user(3, 1, Role::InstUser))
            .await
            .unwrap();
        let saved = harness.store.insert(&item).await.unwrap();

        let err = service.dispatch(&saved).await.unwrap_err();
        assert!(matches!(err, AppError::Queue(_)));
        assert!(harness.store.work_item(saved.id).unwrap().queued_at.is_none());
    }
}
