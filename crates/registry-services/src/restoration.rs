//! Restoration requests
//!
//! Unlike deletion, restoration needs no second approval: the work item is
//! created and queued straight away, and the institution's admins are told.

use std::sync::Arc;

use registry_core::models::{
    Action, Alert, AlertType, GenericFile, IntellectualObject, User, WorkItem,
};
use registry_core::{AppError, AppResult};
use registry_db::PendingScope;

use crate::alerts::TemplateData;
use crate::context::ServiceContext;
use crate::permissions::ensure_can_request_restoration;
use crate::work_items::{WorkItemService, WorkTarget};

#[derive(Clone)]
pub struct RestorationService {
    ctx: Arc<ServiceContext>,
    work_items: WorkItemService,
}

impl RestorationService {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let work_items = WorkItemService::new(ctx.clone());
        Self { ctx, work_items }
    }

    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn restore_object(
        &self,
        intellectual_object_id: i64,
        user: &User,
    ) -> AppResult<WorkItem> {
        let object = self.load_object(intellectual_object_id).await?;
        ensure_can_request_restoration(user, object.institution_id)?;
        if object.is_deleted() {
            return Err(AppError::AlreadyDeleted(object.identifier));
        }
        self.restore(WorkTarget::Object(&object), user).await
    }

    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn restore_file(&self, generic_file_id: i64, user: &User) -> AppResult<WorkItem> {
        let file: GenericFile = self
            .ctx
            .catalog
            .get_file(generic_file_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Generic file {} not found", generic_file_id)))?;
        ensure_can_request_restoration(user, file.institution_id)?;
        if file.is_deleted() {
            return Err(AppError::AlreadyDeleted(file.identifier));
        }
        let object = self.load_object(file.intellectual_object_id).await?;
        self.restore(WorkTarget::File(&object, &file), user).await
    }

    async fn restore(&self, target: WorkTarget<'_>, user: &User) -> AppResult<WorkItem> {
        let object = target.object();
        let (action, scope) = match target {
            WorkTarget::Object(object) => (Action::RestoreObject, PendingScope::for_object(object)),
            WorkTarget::File(object, file) => (Action::RestoreFile, PendingScope::for_file(object, file)),
        };
        let action = if object.is_glacier_only() {
            Action::GlacierRestore
        } else {
            action
        };

        let item = self.work_items.build(action, target, user).await?;
        let item = self
            .ctx
            .work_items
            .insert_if_no_pending_work(&item, &scope)
            .await?;

        if let Err(e) = self.work_items.dispatch(&item).await {
            tracing::error!(
                work_item_id = item.id,
                error = %e,
                "Restoration work item saved but not queued; requeue it once the queue is back"
            );
            return Err(e);
        }

        let mut data = TemplateData::new();
        data.insert("requester_name".to_string(), user.name.clone());
        data.insert("target".to_string(), target.identifier().to_string());
        data.insert("institution_name".to_string(), self.institution_name(object).await?);
        data.insert(
            "work_item_urls".to_string(),
            format!("{}/work_items/show/{}", self.ctx.base_url(), item.id),
        );

        let mut alert = Alert::new(
            object.institution_id,
            AlertType::RestorationRequested,
            AlertType::RestorationRequested.to_string(),
        );
        alert.work_item_ids = vec![item.id];
        alert.recipients = self
            .ctx
            .catalog
            .institution_admins(object.institution_id)
            .await?;
        self.ctx
            .alerts
            .create_alert(alert, AlertType::RestorationRequested.template_name(), &data)
            .await?;

        tracing::info!(work_item_id = item.id, action = %item.action, "Restoration requested");
        Ok(item)
    }

    async fn institution_name(&self, object: &IntellectualObject) -> AppResult<String> {
        self.ctx
            .catalog
            .get_institution(object.institution_id)
            .await?
            .map(|institution| institution.name)
            .ok_or_else(|| {
                AppError::NotFound(format!("Institution {} not found", object.institution_id))
            })
    }

    async fn load_object(&self, id: i64) -> AppResult<IntellectualObject> {
        self.ctx
            .catalog
            .get_object(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Intellectual object {} not found", id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestHarness;
    use registry_core::models::{Role, Stage, WorkItemStatus};
    use registry_db::test_helpers::{file, object, successful_ingest, user, work_item_for};

    #[tokio::test]
    async fn test_restore_object_queues_and_alerts() {
        let harness = TestHarness::new();
        let obj = object(10, 1);
        harness.seed_object(&obj);
        let depositor = user(5, 1, Role::InstUser);

        let item = harness
            .restoration_service()
            .restore_object(obj.id, &depositor)
            .await
            .unwrap();

        assert_eq!(item.action, Action::RestoreObject);
        assert_eq!(item.stage, Stage::Requested);
        assert_eq!(harness.queue.published(), vec![("restore_object".to_string(), item.id)]);
        let alerts = harness.store.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::RestorationRequested);
        assert_eq!(alerts[0].work_item_ids, vec![item.id]);
    }

    #[tokio::test]
    async fn test_glacier_only_objects_use_glacier_restore() {
        let harness = TestHarness::new();
        let mut obj = object(10, 1);
        obj.storage_option = "Glacier-Deep-OR".to_string();
        harness.seed_object(&obj);
        let gf = file(11, &obj);
        harness.store.add_file(gf.clone());

        let item = harness
            .restoration_service()
            .restore_file(gf.id, &user(5, 1, Role::InstAdmin))
            .await
            .unwrap();

        assert_eq!(item.action, Action::GlacierRestore);
        assert_eq!(item.generic_file_id, Some(gf.id));
        assert_eq!(harness.queue.published()[0].0, "restore_glacier");
    }

    #[tokio::test]
    async fn test_restore_refused_while_work_is_pending() {
        let harness = TestHarness::new();
        let obj = object(10, 1);
        harness.seed_object(&obj);
        harness.store.add_work_item(work_item_for(
            &obj,
            Action::Ingest,
            Stage::Store,
            WorkItemStatus::Started,
        ));

        let err = harness
            .restoration_service()
            .restore_object(obj.id, &user(5, 1, Role::InstUser))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PendingWork(_)));
        assert!(harness.queue.published().is_empty());
        assert!(harness
            .store
            .work_items()
            .iter()
            .all(|item| item.action == Action::Ingest));
    }

    #[tokio::test]
    async fn test_other_institutions_cannot_restore() {
        let harness = TestHarness::new();
        let obj = object(10, 1);
        harness.store.add_object(obj.clone());
        harness.store.add_work_item(successful_ingest(&obj));

        let err = harness
            .restoration_service()
            .restore_object(obj.id, &user(5, 2, Role::InstAdmin))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PermissionDenied(_)));
    }
}
