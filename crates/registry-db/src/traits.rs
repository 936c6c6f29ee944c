//! Store trait abstractions
//!
//! Services depend on these traits rather than on the PostgreSQL repositories,
//! so they can be exercised against in-memory stores.
//!
//! Domain failures (`PendingWork`, `AlreadyApproved`, ...) travel inside the
//! `anyhow::Error` as an `AppError` and are recovered with `AppError::from`.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use registry_core::models::{
    Alert, DeletionRequest, GenericFile, Institution, IntellectualObject, NewDeletionRequest,
    User, WorkItem,
};

/// Target whose outstanding work blocks a delete or restore.
///
/// Object-level pending work is matched by institution and bag name so that a
/// reingest of the same bag counts. When `generic_file_id` is set, work on
/// that file also counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingScope {
    pub intellectual_object_id: i64,
    pub institution_id: i64,
    pub bag_name: String,
    pub generic_file_id: Option<i64>,
}

impl PendingScope {
    pub fn for_object(object: &IntellectualObject) -> Self {
        Self {
            intellectual_object_id: object.id,
            institution_id: object.institution_id,
            bag_name: object.bag_name.clone(),
            generic_file_id: None,
        }
    }

    pub fn for_file(object: &IntellectualObject, file: &GenericFile) -> Self {
        Self {
            generic_file_id: Some(file.id),
            ..Self::for_object(object)
        }
    }

    /// True if `item` is work on this scope's target (regardless of status).
    pub fn covers(&self, item: &WorkItem) -> bool {
        let same_bag = item.institution_id == self.institution_id && item.name == self.bag_name;
        let same_file = self.generic_file_id.is_some() && item.generic_file_id == self.generic_file_id;
        same_bag || same_file
    }
}

#[async_trait]
pub trait WorkItemStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Option<WorkItem>>;

    /// Non-terminal work items for a single file.
    async fn pending_for_file(&self, generic_file_id: i64) -> Result<Vec<WorkItem>>;

    /// Non-terminal work items for a bag, including reingests of it.
    async fn pending_for_object(&self, institution_id: i64, bag_name: &str)
        -> Result<Vec<WorkItem>>;

    /// Latest ingest that reached Record or Cleanup with status Success.
    async fn last_successful_ingest(&self, intellectual_object_id: i64)
        -> Result<Option<WorkItem>>;

    async fn list_for_deletion_request(&self, deletion_request_id: i64) -> Result<Vec<WorkItem>>;

    /// Inserts `item` and returns it with its assigned id.
    async fn insert(&self, item: &WorkItem) -> Result<WorkItem>;

    /// Inserts `item` only if nothing under `scope` is pending, atomically.
    /// Fails with `AppError::PendingWork` otherwise.
    async fn insert_if_no_pending_work(&self, item: &WorkItem, scope: &PendingScope)
        -> Result<WorkItem>;

    async fn update(&self, item: &WorkItem) -> Result<WorkItem>;

    /// Stamps `queued_at` after a successful enqueue.
    async fn mark_queued(&self, id: i64, queued_at: DateTime<Utc>) -> Result<()>;
}

#[async_trait]
pub trait DeletionRequestStore: Send + Sync {
    /// Inserts the request and its file/object links, failing with
    /// `AppError::PendingWork` if any scope has outstanding work. The check and
    /// the insert happen atomically.
    async fn create_if_no_pending_work(
        &self,
        new: NewDeletionRequest,
        scopes: &[PendingScope],
    ) -> Result<DeletionRequest>;

    async fn get(&self, id: i64) -> Result<Option<DeletionRequest>>;

    /// Sets the confirmation fields only while the request is still pending.
    /// Fails with `AlreadyApproved`/`AlreadyCancelled` if another admin won.
    async fn mark_confirmed(
        &self,
        id: i64,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DeletionRequest>;

    /// Same guard as `mark_confirmed`, for cancellation.
    async fn mark_cancelled(
        &self,
        id: i64,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DeletionRequest>;

    async fn set_work_item_id(&self, id: i64, work_item_id: i64) -> Result<()>;

    /// Confirmed requests with no work item recorded.
    async fn find_stranded(&self) -> Result<Vec<DeletionRequest>>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>>;

    async fn get_institution(&self, id: i64) -> Result<Option<Institution>>;

    async fn get_object(&self, id: i64) -> Result<Option<IntellectualObject>>;

    /// Objects that exist among `ids`; missing ids are simply absent.
    async fn get_objects(&self, ids: &[i64]) -> Result<Vec<IntellectualObject>>;

    async fn get_file(&self, id: i64) -> Result<Option<GenericFile>>;

    async fn get_files(&self, ids: &[i64]) -> Result<Vec<GenericFile>>;

    /// Active institutional admins of the institution.
    async fn institution_admins(&self, institution_id: i64) -> Result<Vec<User>>;
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Saves the alert with its recipients and work item links.
    async fn insert(&self, alert: &Alert) -> Result<Alert>;

    async fn mark_sent(&self, alert_id: i64, user_id: i64, at: DateTime<Utc>) -> Result<()>;
}
