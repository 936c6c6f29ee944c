//! Deletion request lifecycle
//!
//! A deletion starts as a pending request carrying a one-time confirmation
//! token. An institutional admin follows the review link, then either
//! confirms it (delete work items are created and queued) or cancels it.
//! Each step alerts the institution's admins.
//!
//! Confirmation is persisted before dispatch. If dispatch fails, the request
//! stays confirmed with no work item id; such requests are reported by
//! [`DeletionService::find_stranded`] and repaired by
//! [`DeletionService::redispatch_stranded`].

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

use registry_core::models::{
    Action, Alert, AlertType, DeletionRequest, GenericFile, IntellectualObject, NewDeletionRequest,
    User, WorkItem, WorkItemStatus,
};
use registry_core::{AppError, AppResult};
use registry_db::PendingScope;

use crate::alerts::TemplateData;
use crate::context::ServiceContext;
use crate::permissions::{ensure_can_request_deletion, ensure_can_review_deletion};
use crate::work_items::{WorkItemService, WorkTarget};

/// A file or object named by a deletion request, with its parent object.
struct Target {
    object: IntellectualObject,
    file: Option<GenericFile>,
}

impl Target {
    fn as_work_target(&self) -> WorkTarget<'_> {
        match &self.file {
            Some(file) => WorkTarget::File(&self.object, file),
            None => WorkTarget::Object(&self.object),
        }
    }

    fn identifier(&self) -> &str {
        self.as_work_target().identifier()
    }

    fn scope(&self) -> PendingScope {
        match &self.file {
            Some(file) => PendingScope::for_file(&self.object, file),
            None => PendingScope::for_object(&self.object),
        }
    }

    /// True if `item` is this target's delete work item.
    fn matches(&self, item: &WorkItem) -> bool {
        item.intellectual_object_id == Some(self.object.id)
            && item.generic_file_id == self.file.as_ref().map(|f| f.id)
    }
}

/// Read-only view of a request and the work it produced.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionDetails {
    pub request: DeletionRequest,
    pub work_items: Vec<WorkItem>,
}

#[derive(Clone)]
pub struct DeletionService {
    ctx: Arc<ServiceContext>,
    work_items: WorkItemService,
}

impl DeletionService {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        let work_items = WorkItemService::new(ctx.clone());
        Self { ctx, work_items }
    }

    /// Opens a request to delete one file. Fails with `PendingWork` while the
    /// file or its object has outstanding work.
    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn request_for_file(
        &self,
        generic_file_id: i64,
        user: &User,
    ) -> AppResult<DeletionRequest> {
        let file = self.load_file(generic_file_id).await?;
        ensure_can_request_deletion(user, file.institution_id)?;
        if file.is_deleted() {
            return Err(AppError::AlreadyDeleted(file.identifier));
        }
        let object = self.load_object(file.intellectual_object_id).await?;
        let target = Target {
            object,
            file: Some(file),
        };
        self.open_request(target.object.institution_id, user, vec![target])
            .await
    }

    /// Opens a request to delete an object and every file in it.
    #[tracing::instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn request_for_object(
        &self,
        intellectual_object_id: i64,
        user: &User,
    ) -> AppResult<DeletionRequest> {
        let object = self.load_object(intellectual_object_id).await?;
        ensure_can_request_deletion(user, object.institution_id)?;
        if object.is_deleted() {
            return Err(AppError::AlreadyDeleted(object.identifier));
        }
        let institution_id = object.institution_id;
        let target = Target { object, file: None };
        self.open_request(institution_id, user, vec![target]).await
    }

    /// One request covering several objects. Callers validate the batch first.
    pub(crate) async fn request_for_objects(
        &self,
        institution_id: i64,
        requester: &User,
        objects: Vec<IntellectualObject>,
    ) -> AppResult<DeletionRequest> {
        let targets = objects
            .into_iter()
            .map(|object| Target { object, file: None })
            .collect();
        self.open_request(institution_id, requester, targets).await
    }

    /// Loads a request for an admin who followed its review link. Fails with
    /// `InvalidToken` unless `token` verifies against the stored hash.
    #[tracing::instrument(skip(self, token))]
    pub async fn load_for_review(
        &self,
        deletion_request_id: i64,
        token: &str,
    ) -> AppResult<DeletionRequest> {
        let request = self.load_request(deletion_request_id).await?;
        if !self
            .ctx
            .tokens
            .verify(&request.encrypted_confirmation_token, token)
        {
            tracing::warn!(deletion_request_id, "Invalid deletion confirmation token");
            return Err(AppError::InvalidToken);
        }
        Ok(request)
    }

    /// Request plus its work items, for anyone at the owning institution.
    pub async fn details(&self, deletion_request_id: i64, viewer: &User) -> AppResult<DeletionDetails> {
        let request = self.load_request(deletion_request_id).await?;
        if !(viewer.is_sys_admin() || viewer.belongs_to(request.institution_id)) {
            return Err(AppError::PermissionDenied(
                "You are not allowed to view this deletion request".to_string(),
            ));
        }
        let work_items = self
            .ctx
            .work_items
            .list_for_deletion_request(request.id)
            .await?;
        Ok(DeletionDetails {
            request,
            work_items,
        })
    }

    /// Approves a pending request, then creates and queues its delete work
    /// items. Fails with `AlreadyApproved`/`AlreadyCancelled` if another admin
    /// acted first.
    #[tracing::instrument(skip(self, request, admin), fields(deletion_request_id = request.id, admin_id = admin.id))]
    pub async fn confirm(
        &self,
        request: &DeletionRequest,
        admin: &User,
    ) -> AppResult<DeletionRequest> {
        ensure_can_review_deletion(admin, request.institution_id)?;
        request.ensure_pending()?;

        let mut confirmed = self
            .ctx
            .deletion_requests
            .mark_confirmed(request.id, admin.id, Utc::now())
            .await?;

        let items = self.create_and_dispatch(&confirmed, admin).await?;
        confirmed.work_item_id = items.first().map(|item| item.id);

        self.alert_confirmed(&confirmed, admin, &items).await;
        Ok(confirmed)
    }

    /// Rejects a pending request. No work item is created.
    #[tracing::instrument(skip(self, request, admin), fields(deletion_request_id = request.id, admin_id = admin.id))]
    pub async fn cancel(
        &self,
        request: &DeletionRequest,
        admin: &User,
    ) -> AppResult<DeletionRequest> {
        ensure_can_review_deletion(admin, request.institution_id)?;
        request.ensure_pending()?;

        let cancelled = self
            .ctx
            .deletion_requests
            .mark_cancelled(request.id, admin.id, Utc::now())
            .await?;

        let targets = self.load_targets(&cancelled).await?;
        let mut data = self.base_alert_data(&cancelled, &targets).await?;
        data.insert("admin_name".to_string(), admin.name.clone());
        self.send_alert(&cancelled, AlertType::DeletionCancelled, data, vec![])
            .await?;
        Ok(cancelled)
    }

    /// Confirmed requests that never got a work item recorded.
    pub async fn find_stranded(&self) -> AppResult<Vec<DeletionRequest>> {
        Ok(self.ctx.deletion_requests.find_stranded().await?)
    }

    /// Finishes dispatch for a stranded request: creates any missing delete
    /// items, queues the unqueued ones and records the work item id.
    #[tracing::instrument(skip(self))]
    pub async fn redispatch_stranded(&self, deletion_request_id: i64) -> AppResult<DeletionRequest> {
        let mut request = self.load_request(deletion_request_id).await?;
        if !request.is_stranded() {
            return Err(AppError::NotSupported(format!(
                "Deletion request {} is not awaiting dispatch",
                deletion_request_id
            )));
        }
        let approver_id = request.confirmed_by_id.unwrap_or(request.requested_by_id);
        let approver = self.load_user(approver_id).await?;

        let items = self.create_and_dispatch(&request, &approver).await?;
        request.work_item_id = items.first().map(|item| item.id);
        tracing::info!(
            deletion_request_id,
            work_items = items.len(),
            "Stranded deletion request dispatched"
        );

        self.alert_confirmed(&request, &approver, &items).await;
        Ok(request)
    }

    /// Test environments only: a confirmed file deletion with a started
    /// delete item, as a worker would find it. No alerts, nothing queued.
    pub async fn prepare_file_delete(&self, generic_file_id: i64) -> AppResult<DeletionRequest> {
        self.ensure_test_environment()?;
        let file = self.load_file(generic_file_id).await?;
        let object = self.load_object(file.intellectual_object_id).await?;
        self.prepare_delete(Target {
            object,
            file: Some(file),
        })
        .await
    }

    /// Object counterpart of [`Self::prepare_file_delete`].
    pub async fn prepare_object_delete(
        &self,
        intellectual_object_id: i64,
    ) -> AppResult<DeletionRequest> {
        self.ensure_test_environment()?;
        let object = self.load_object(intellectual_object_id).await?;
        self.prepare_delete(Target { object, file: None }).await
    }

    fn ensure_test_environment(&self) -> AppResult<()> {
        if self.ctx.config.is_test() {
            Ok(())
        } else {
            Err(AppError::NotSupported(
                "This operation is only available in the test environment".to_string(),
            ))
        }
    }

    async fn prepare_delete(&self, target: Target) -> AppResult<DeletionRequest> {
        let institution_id = target.object.institution_id;
        let admin = self
            .ctx
            .catalog
            .institution_admins(institution_id)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                AppError::NotFound(format!("Institution {} has no active admin", institution_id))
            })?;

        let token = self.ctx.tokens.issue()?;
        let request = self
            .ctx
            .deletion_requests
            .create_if_no_pending_work(
                new_request(institution_id, &admin, std::slice::from_ref(&target), token.hash),
                &[],
            )
            .await?;
        let mut request = self
            .ctx
            .deletion_requests
            .mark_confirmed(request.id, admin.id, Utc::now())
            .await?;

        let mut item = self
            .work_items
            .build(Action::Delete, target.as_work_target(), &admin)
            .await?;
        item.status = WorkItemStatus::Started;
        item.deletion_request_id = Some(request.id);
        let item = self.ctx.work_items.insert(&item).await?;

        self.ctx
            .deletion_requests
            .set_work_item_id(request.id, item.id)
            .await?;
        request.work_item_id = Some(item.id);
        Ok(request)
    }

    async fn open_request(
        &self,
        institution_id: i64,
        requester: &User,
        targets: Vec<Target>,
    ) -> AppResult<DeletionRequest> {
        for target in &targets {
            self.ensure_no_pending_work(target).await?;
        }
        let scopes: Vec<PendingScope> = targets.iter().map(Target::scope).collect();
        let token = self.ctx.tokens.issue()?;

        let request = self
            .ctx
            .deletion_requests
            .create_if_no_pending_work(
                new_request(institution_id, requester, &targets, token.hash),
                &scopes,
            )
            .await?
            .with_confirmation_token(token.plaintext);

        if let Err(e) = self.alert_requested(&request, requester, &targets).await {
            // The review link exists only in this alert; a request nobody
            // can review is withdrawn.
            tracing::error!(
                deletion_request_id = request.id,
                error = %e,
                "Deletion request alert failed; cancelling the request"
            );
            self.ctx
                .deletion_requests
                .mark_cancelled(request.id, requester.id, Utc::now())
                .await?;
            return Err(e);
        }
        Ok(request)
    }

    /// Early exit before a token is hashed. The store repeats the check
    /// under lock when the request is inserted.
    async fn ensure_no_pending_work(&self, target: &Target) -> AppResult<()> {
        let mut pending = self
            .ctx
            .work_items
            .pending_for_object(target.object.institution_id, &target.object.bag_name)
            .await?;
        if let Some(file) = &target.file {
            pending.extend(self.ctx.work_items.pending_for_file(file.id).await?);
        }
        if pending.is_empty() {
            return Ok(());
        }
        let ids: Vec<i64> = pending.iter().map(|item| item.id).collect();
        Err(AppError::PendingWork(format!(
            "{} has pending work items {:?}",
            target.identifier(),
            ids
        )))
    }

    async fn alert_requested(
        &self,
        request: &DeletionRequest,
        requester: &User,
        targets: &[Target],
    ) -> AppResult<()> {
        let mut data = self.base_alert_data(request, targets).await?;
        data.insert("requester_name".to_string(), requester.name.clone());
        data.insert("review_url".to_string(), request.review_url(self.ctx.base_url())?);
        self.send_alert(request, AlertType::DeletionRequested, data, vec![])
            .await
    }

    /// Creates the delete items this request still lacks and queues every
    /// unqueued one. Records the first item id once all are queued.
    async fn create_and_dispatch(
        &self,
        request: &DeletionRequest,
        approver: &User,
    ) -> AppResult<Vec<WorkItem>> {
        let result = self.try_create_and_dispatch(request, approver).await;
        if let Err(e) = &result {
            tracing::error!(
                deletion_request_id = request.id,
                error = %e,
                "Deletion request is confirmed but its work items were not dispatched; \
                 run stranded_deletions --redispatch once the cause is fixed"
            );
        }
        result
    }

    async fn try_create_and_dispatch(
        &self,
        request: &DeletionRequest,
        approver: &User,
    ) -> AppResult<Vec<WorkItem>> {
        let targets = self.load_targets(request).await?;
        let mut items = self
            .ctx
            .work_items
            .list_for_deletion_request(request.id)
            .await?;

        for target in &targets {
            if items.iter().any(|item| target.matches(item)) {
                continue;
            }
            let mut item = self
                .work_items
                .build(Action::Delete, target.as_work_target(), approver)
                .await?;
            item.deletion_request_id = Some(request.id);
            items.push(self.ctx.work_items.insert(&item).await?);
        }

        for item in items.iter().filter(|item| item.queued_at.is_none()) {
            self.work_items.dispatch(item).await?;
        }

        let first = items.first().ok_or_else(|| {
            AppError::Internal(format!("Deletion request {} has no targets", request.id))
        })?;
        self.ctx
            .deletion_requests
            .set_work_item_id(request.id, first.id)
            .await?;
        Ok(items)
    }

    /// The delete work is already queued when this runs, so a failure here is
    /// logged and not returned.
    async fn alert_confirmed(&self, request: &DeletionRequest, admin: &User, items: &[WorkItem]) {
        if let Err(e) = self.try_alert_confirmed(request, admin, items).await {
            tracing::error!(
                deletion_request_id = request.id,
                error = %e,
                "Deletion queued but the confirmation alert failed"
            );
        }
    }

    async fn try_alert_confirmed(
        &self,
        request: &DeletionRequest,
        admin: &User,
        items: &[WorkItem],
    ) -> AppResult<()> {
        let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        let targets = self.load_targets(request).await?;
        let mut data = self.base_alert_data(request, &targets).await?;
        data.insert("admin_name".to_string(), admin.name.clone());
        data.insert(
            "work_item_urls".to_string(),
            request.work_item_urls(self.ctx.base_url(), &ids)?.join("\n"),
        );
        self.send_alert(request, AlertType::DeletionConfirmed, data, ids)
            .await
    }

    async fn base_alert_data(
        &self,
        request: &DeletionRequest,
        targets: &[Target],
    ) -> AppResult<TemplateData> {
        let institution = self
            .ctx
            .catalog
            .get_institution(request.institution_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Institution {} not found", request.institution_id))
            })?;
        let mut data = TemplateData::new();
        data.insert("request_id".to_string(), request.id.to_string());
        data.insert("institution_name".to_string(), institution.name);
        data.insert(
            "targets".to_string(),
            targets
                .iter()
                .map(Target::identifier)
                .collect::<Vec<_>>()
                .join("\n"),
        );
        data.insert(
            "read_only_url".to_string(),
            request.read_only_url(self.ctx.base_url()),
        );
        Ok(data)
    }

    async fn send_alert(
        &self,
        request: &DeletionRequest,
        alert_type: AlertType,
        data: TemplateData,
        work_item_ids: Vec<i64>,
    ) -> AppResult<()> {
        let mut alert = Alert::new(request.institution_id, alert_type, alert_type.to_string());
        alert.deletion_request_id = Some(request.id);
        alert.work_item_ids = work_item_ids;
        alert.recipients = self
            .ctx
            .catalog
            .institution_admins(request.institution_id)
            .await?;
        self.ctx
            .alerts
            .create_alert(alert, alert_type.template_name(), &data)
            .await?;
        Ok(())
    }

    async fn load_targets(&self, request: &DeletionRequest) -> AppResult<Vec<Target>> {
        let mut targets = Vec::new();
        for object in self
            .ctx
            .catalog
            .get_objects(&request.intellectual_object_ids)
            .await?
        {
            targets.push(Target { object, file: None });
        }
        for file in self
            .ctx
            .catalog
            .get_files(&request.generic_file_ids)
            .await?
        {
            let object = self.load_object(file.intellectual_object_id).await?;
            targets.push(Target {
                object,
                file: Some(file),
            });
        }
        if targets.is_empty() {
            return Err(AppError::NotFound(format!(
                "Deletion request {} names no existing files or objects",
                request.id
            )));
        }
        Ok(targets)
    }

    async fn load_request(&self, id: i64) -> AppResult<DeletionRequest> {
        self.ctx
            .deletion_requests
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deletion request {} not found", id)))
    }

    async fn load_object(&self, id: i64) -> AppResult<IntellectualObject> {
        self.ctx
            .catalog
            .get_object(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Intellectual object {} not found", id)))
    }

    async fn load_file(&self, id: i64) -> AppResult<GenericFile> {
        self.ctx
            .catalog
            .get_file(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Generic file {} not found", id)))
    }

    async fn load_user(&self, id: i64) -> AppResult<User> {
        self.ctx
            .catalog
            .get_user(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }
}

fn new_request(
    institution_id: i64,
    requester: &User,
    targets: &[Target],
    token_hash: String,
) -> NewDeletionRequest {
    let mut generic_file_ids = Vec::new();
    let mut intellectual_object_ids = Vec::new();
    for target in targets {
        match &target.file {
            Some(file) => generic_file_ids.push(file.id),
            None => intellectual_object_ids.push(target.object.id),
        }
    }
    NewDeletionRequest {
        institution_id,
        requested_by_id: requester.id,
        requested_at: Utc::now(),
        encrypted_confirmation_token: token_hash,
        generic_file_ids,
        intellectual_object_ids,
    }
}
