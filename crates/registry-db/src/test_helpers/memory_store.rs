use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use registry_core::models::{
    Action, Alert, DeletionRequest, GenericFile, Institution, IntellectualObject,
    NewDeletionRequest, Role, Stage, User, WorkItem, WorkItemStatus,
};
use registry_core::AppError;

use crate::traits::{AlertStore, CatalogStore, DeletionRequestStore, PendingScope, WorkItemStore};

#[derive(Default)]
struct State {
    next_id: i64,
    institutions: HashMap<i64, Institution>,
    users: HashMap<i64, User>,
    objects: HashMap<i64, IntellectualObject>,
    files: HashMap<i64, GenericFile>,
    work_items: BTreeMap<i64, WorkItem>,
    deletion_requests: BTreeMap<i64, DeletionRequest>,
    alerts: Vec<Alert>,
    sent: Vec<(i64, i64)>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn pending_under(&self, scope: &PendingScope) -> Vec<i64> {
        self.work_items
            .values()
            .filter(|item| scope.covers(item) && item.is_pending())
            .map(|item| item.id)
            .collect()
    }

    fn insert_work_item(&mut self, item: &WorkItem) -> WorkItem {
        let mut saved = item.clone();
        saved.id = self.next_id();
        let now = Utc::now();
        saved.created_at = now;
        saved.updated_at = now;
        self.work_items.insert(saved.id, saved.clone());
        saved
    }
}

/// Shared in-memory registry used in place of PostgreSQL.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_institution(&self, institution: Institution) {
        self.state
            .lock()
            .unwrap()
            .institutions
            .insert(institution.id, institution);
    }

    pub fn add_user(&self, user: User) {
        self.state.lock().unwrap().users.insert(user.id, user);
    }

    pub fn add_object(&self, object: IntellectualObject) {
        self.state.lock().unwrap().objects.insert(object.id, object);
    }

    pub fn add_file(&self, file: GenericFile) {
        self.state.lock().unwrap().files.insert(file.id, file);
    }

    /// Stores a work item, assigning an id when it has none.
    pub fn add_work_item(&self, item: WorkItem) -> WorkItem {
        let mut state = self.state.lock().unwrap();
        if item.id == 0 {
            state.insert_work_item(&item)
        } else {
            state.next_id = state.next_id.max(item.id);
            state.work_items.insert(item.id, item.clone());
            item
        }
    }

    pub fn work_items(&self) -> Vec<WorkItem> {
        self.state.lock().unwrap().work_items.values().cloned().collect()
    }

    pub fn work_item(&self, id: i64) -> Option<WorkItem> {
        self.state.lock().unwrap().work_items.get(&id).cloned()
    }

    pub fn deletion_requests(&self) -> Vec<DeletionRequest> {
        self.state
            .lock()
            .unwrap()
            .deletion_requests
            .values()
            .cloned()
            .collect()
    }

    pub fn deletion_request(&self, id: i64) -> Option<DeletionRequest> {
        self.state.lock().unwrap().deletion_requests.get(&id).cloned()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.state.lock().unwrap().alerts.clone()
    }

    /// (alert_id, user_id) pairs marked as sent.
    pub fn sent(&self) -> Vec<(i64, i64)> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Overwrites the execution state of a stored item, as a worker would.
    pub fn set_work_item_status(&self, id: i64, status: WorkItemStatus, retry: bool) {
        if let Some(item) = self.state.lock().unwrap().work_items.get_mut(&id) {
            item.status = status;
            item.retry = retry;
        }
    }
}

#[async_trait]
impl WorkItemStore for MemoryStore {
    async fn get(&self, id: i64) -> Result<Option<WorkItem>> {
        Ok(self.work_item(id))
    }

    async fn pending_for_file(&self, generic_file_id: i64) -> Result<Vec<WorkItem>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .work_items
            .values()
            .filter(|item| item.generic_file_id == Some(generic_file_id) && item.is_pending())
            .cloned()
            .collect())
    }

    async fn pending_for_object(
        &self,
        institution_id: i64,
        bag_name: &str,
    ) -> Result<Vec<WorkItem>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .work_items
            .values()
            .filter(|item| {
                item.institution_id == institution_id && item.name == bag_name && item.is_pending()
            })
            .cloned()
            .collect())
    }

    async fn last_successful_ingest(
        &self,
        intellectual_object_id: i64,
    ) -> Result<Option<WorkItem>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .work_items
            .values()
            .filter(|item| {
                item.intellectual_object_id == Some(intellectual_object_id)
                    && item.action == Action::Ingest
                    && item.status == WorkItemStatus::Success
                    && matches!(item.stage, Stage::Record | Stage::Cleanup)
            })
            .max_by_key(|item| (item.date_processed, item.id))
            .cloned())
    }

    async fn list_for_deletion_request(&self, deletion_request_id: i64) -> Result<Vec<WorkItem>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .work_items
            .values()
            .filter(|item| item.deletion_request_id == Some(deletion_request_id))
            .cloned()
            .collect())
    }

    async fn insert(&self, item: &WorkItem) -> Result<WorkItem> {
        Ok(self.state.lock().unwrap().insert_work_item(item))
    }

    async fn insert_if_no_pending_work(
        &self,
        item: &WorkItem,
        scope: &PendingScope,
    ) -> Result<WorkItem> {
        let mut state = self.state.lock().unwrap();
        let pending = state.pending_under(scope);
        if !pending.is_empty() {
            return Err(AppError::PendingWork(format!(
                "{} has pending work items {:?}",
                scope.bag_name, pending
            ))
            .into());
        }
        Ok(state.insert_work_item(item))
    }

    async fn update(&self, item: &WorkItem) -> Result<WorkItem> {
        let mut state = self.state.lock().unwrap();
        match state.work_items.get_mut(&item.id) {
            Some(stored) => {
                *stored = item.clone();
                stored.updated_at = Utc::now();
                Ok(stored.clone())
            }
            None => Err(AppError::NotFound(format!("Work item {} not found", item.id)).into()),
        }
    }

    async fn mark_queued(&self, id: i64, queued_at: DateTime<Utc>) -> Result<()> {
        if let Some(item) = self.state.lock().unwrap().work_items.get_mut(&id) {
            item.queued_at = Some(queued_at);
        }
        Ok(())
    }
}

#[async_trait]
impl DeletionRequestStore for MemoryStore {
    async fn create_if_no_pending_work(
        &self,
        new: NewDeletionRequest,
        scopes: &[PendingScope],
    ) -> Result<DeletionRequest> {
        let mut state = self.state.lock().unwrap();
        for scope in scopes {
            let pending = state.pending_under(scope);
            if !pending.is_empty() {
                return Err(AppError::PendingWork(format!(
                    "{} has pending work items {:?}",
                    scope.bag_name, pending
                ))
                .into());
            }
        }
        let id = state.next_id();
        let request = DeletionRequest::from_new(id, new, Utc::now());
        state.deletion_requests.insert(id, request.clone());
        Ok(request)
    }

    async fn get(&self, id: i64) -> Result<Option<DeletionRequest>> {
        Ok(self.deletion_request(id))
    }

    async fn mark_confirmed(
        &self,
        id: i64,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DeletionRequest> {
        let mut state = self.state.lock().unwrap();
        let request = state
            .deletion_requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Deletion request {} not found", id)))?;
        request.ensure_pending()?;
        request.confirmed_at = Some(at);
        request.confirmed_by_id = Some(admin_id);
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn mark_cancelled(
        &self,
        id: i64,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DeletionRequest> {
        let mut state = self.state.lock().unwrap();
        let request = state
            .deletion_requests
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Deletion request {} not found", id)))?;
        request.ensure_pending()?;
        request.cancelled_at = Some(at);
        request.cancelled_by_id = Some(admin_id);
        request.updated_at = Utc::now();
        Ok(request.clone())
    }

    async fn set_work_item_id(&self, id: i64, work_item_id: i64) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        match state.deletion_requests.get_mut(&id) {
            Some(request) if request.confirmed_at.is_some() => {
                request.work_item_id = Some(work_item_id);
                Ok(())
            }
            Some(_) => Err(AppError::NotSupported(format!(
                "Deletion request {} is not confirmed",
                id
            ))
            .into()),
            None => Err(AppError::NotFound(format!("Deletion request {} not found", id)).into()),
        }
    }

    async fn find_stranded(&self) -> Result<Vec<DeletionRequest>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .deletion_requests
            .values()
            .filter(|r| r.is_stranded())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        Ok(self.state.lock().unwrap().users.get(&id).cloned())
    }

    async fn get_institution(&self, id: i64) -> Result<Option<Institution>> {
        Ok(self.state.lock().unwrap().institutions.get(&id).cloned())
    }

    async fn get_object(&self, id: i64) -> Result<Option<IntellectualObject>> {
        Ok(self.state.lock().unwrap().objects.get(&id).cloned())
    }

    async fn get_objects(&self, ids: &[i64]) -> Result<Vec<IntellectualObject>> {
        let state = self.state.lock().unwrap();
        let mut objects: Vec<_> = ids
            .iter()
            .filter_map(|id| state.objects.get(id).cloned())
            .collect();
        objects.sort_by_key(|o| o.id);
        objects.dedup_by_key(|o| o.id);
        Ok(objects)
    }

    async fn get_file(&self, id: i64) -> Result<Option<GenericFile>> {
        Ok(self.state.lock().unwrap().files.get(&id).cloned())
    }

    async fn get_files(&self, ids: &[i64]) -> Result<Vec<GenericFile>> {
        let state = self.state.lock().unwrap();
        let mut files: Vec<_> = ids
            .iter()
            .filter_map(|id| state.files.get(id).cloned())
            .collect();
        files.sort_by_key(|f| f.id);
        files.dedup_by_key(|f| f.id);
        Ok(files)
    }

    async fn institution_admins(&self, institution_id: i64) -> Result<Vec<User>> {
        let state = self.state.lock().unwrap();
        let mut admins: Vec<_> = state
            .users
            .values()
            .filter(|u| {
                u.institution_id == institution_id && u.role == Role::InstAdmin && u.is_active()
            })
            .cloned()
            .collect();
        admins.sort_by_key(|u| u.id);
        Ok(admins)
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn insert(&self, alert: &Alert) -> Result<Alert> {
        let mut state = self.state.lock().unwrap();
        let mut saved = alert.clone();
        saved.id = state.next_id();
        state.alerts.push(saved.clone());
        Ok(saved)
    }

    async fn mark_sent(&self, alert_id: i64, user_id: i64, _at: DateTime<Utc>) -> Result<()> {
        self.state.lock().unwrap().sent.push((alert_id, user_id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{object, successful_ingest, work_item_for};

    #[tokio::test]
    async fn test_pending_queries_respect_terminal_statuses() {
        let store = MemoryStore::new();
        let obj = object(1, 1);
        store.add_work_item(successful_ingest(&obj));
        let failed = store.add_work_item(work_item_for(
            &obj,
            Action::Ingest,
            Stage::Store,
            WorkItemStatus::Failed,
        ));

        assert!(store.pending_for_object(1, "bag1").await.unwrap().is_empty());

        store.set_work_item_status(failed.id, WorkItemStatus::Failed, true);
        let pending = store.pending_for_object(1, "bag1").await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, failed.id);

        // Different institution, same bag name
        assert!(store.pending_for_object(2, "bag1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_conditional_confirm_refuses_second_write() {
        let store = MemoryStore::new();
        let request = store
            .create_if_no_pending_work(
                NewDeletionRequest {
                    institution_id: 1,
                    requested_by_id: 2,
                    requested_at: Utc::now(),
                    encrypted_confirmation_token: "hash".to_string(),
                    generic_file_ids: vec![],
                    intellectual_object_ids: vec![1],
                },
                &[],
            )
            .await
            .unwrap();

        let first = store.mark_confirmed(request.id, 3, Utc::now()).await.unwrap();
        let err = store.mark_cancelled(request.id, 4, Utc::now()).await.unwrap_err();
        assert!(matches!(AppError::from(err), AppError::AlreadyApproved(_)));

        let stored = store.deletion_request(request.id).unwrap();
        assert_eq!(stored.confirmed_by_id, first.confirmed_by_id);
        assert!(stored.cancelled_at.is_none());
    }
}
