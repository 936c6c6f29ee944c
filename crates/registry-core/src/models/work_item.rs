use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

/// What a work item asks the worker fleet to do.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub enum Action {
    Ingest,
    Delete,
    #[serde(rename = "Restore File")]
    RestoreFile,
    #[serde(rename = "Restore Object")]
    RestoreObject,
    #[serde(rename = "Glacier Restore")]
    GlacierRestore,
    #[serde(rename = "Fixity Check")]
    FixityCheck,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ingest => "Ingest",
            Action::Delete => "Delete",
            Action::RestoreFile => "Restore File",
            Action::RestoreObject => "Restore Object",
            Action::GlacierRestore => "Glacier Restore",
            Action::FixityCheck => "Fixity Check",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Ingest" => Ok(Action::Ingest),
            "Delete" => Ok(Action::Delete),
            "Restore File" => Ok(Action::RestoreFile),
            "Restore Object" => Ok(Action::RestoreObject),
            "Glacier Restore" => Ok(Action::GlacierRestore),
            "Fixity Check" => Ok(Action::FixityCheck),
            _ => Err(anyhow::anyhow!("Invalid work item action: {}", s)),
        }
    }
}

/// A processing step. Which stages are legal depends on the action; see
/// [`crate::stages::canonical_stages`]. Some values are only ever written by
/// workers (e.g. `Restoring`) and exist here so their rows still load.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub enum Stage {
    Receive,
    Validate,
    #[serde(rename = "Reingest Check")]
    ReingestCheck,
    #[serde(rename = "Copy To Staging")]
    CopyToStaging,
    #[serde(rename = "Format Identification")]
    FormatIdentification,
    Store,
    #[serde(rename = "Storage Validation")]
    StorageValidation,
    Record,
    Cleanup,
    Requested,
    #[serde(rename = "Available in S3")]
    AvailableInS3,
    Fetch,
    Package,
    Resolve,
    Restoring,
    Unpack,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Receive => "Receive",
            Stage::Validate => "Validate",
            Stage::ReingestCheck => "Reingest Check",
            Stage::CopyToStaging => "Copy To Staging",
            Stage::FormatIdentification => "Format Identification",
            Stage::Store => "Store",
            Stage::StorageValidation => "Storage Validation",
            Stage::Record => "Record",
            Stage::Cleanup => "Cleanup",
            Stage::Requested => "Requested",
            Stage::AvailableInS3 => "Available in S3",
            Stage::Fetch => "Fetch",
            Stage::Package => "Package",
            Stage::Resolve => "Resolve",
            Stage::Restoring => "Restoring",
            Stage::Unpack => "Unpack",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Receive" => Ok(Stage::Receive),
            "Validate" => Ok(Stage::Validate),
            "Reingest Check" => Ok(Stage::ReingestCheck),
            "Copy To Staging" => Ok(Stage::CopyToStaging),
            "Format Identification" => Ok(Stage::FormatIdentification),
            "Store" => Ok(Stage::Store),
            "Storage Validation" => Ok(Stage::StorageValidation),
            "Record" => Ok(Stage::Record),
            "Cleanup" => Ok(Stage::Cleanup),
            "Requested" => Ok(Stage::Requested),
            "Available in S3" => Ok(Stage::AvailableInS3),
            "Fetch" => Ok(Stage::Fetch),
            "Package" => Ok(Stage::Package),
            "Resolve" => Ok(Stage::Resolve),
            "Restoring" => Ok(Stage::Restoring),
            "Unpack" => Ok(Stage::Unpack),
            _ => Err(anyhow::anyhow!("Invalid work item stage: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
pub enum WorkItemStatus {
    Pending,
    Started,
    Success,
    Failed,
    Cancelled,
    Suspended,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkItemStatus::Pending => "Pending",
            WorkItemStatus::Started => "Started",
            WorkItemStatus::Success => "Success",
            WorkItemStatus::Failed => "Failed",
            WorkItemStatus::Cancelled => "Cancelled",
            WorkItemStatus::Suspended => "Suspended",
        }
    }
}

impl Display for WorkItemStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkItemStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(WorkItemStatus::Pending),
            "Started" => Ok(WorkItemStatus::Started),
            "Success" => Ok(WorkItemStatus::Success),
            "Failed" => Ok(WorkItemStatus::Failed),
            "Cancelled" => Ok(WorkItemStatus::Cancelled),
            "Suspended" => Ok(WorkItemStatus::Suspended),
            _ => Err(anyhow::anyhow!("Invalid work item status: {}", s)),
        }
    }
}

/// One unit of work handed to the external worker fleet.
///
/// `status`, `stage`, `node` and `pid` are shared with the workers, which
/// update them while processing.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkItem {
    pub id: i64,
    pub institution_id: i64,
    pub intellectual_object_id: Option<i64>,
    pub generic_file_id: Option<i64>,
    pub deletion_request_id: Option<i64>,
    pub name: String,
    pub etag: String,
    pub bucket: String,
    /// Email address of the user who caused this item to exist
    pub user: String,
    pub object_identifier: Option<String>,
    pub generic_file_identifier: Option<String>,
    pub action: Action,
    pub stage: Stage,
    pub status: WorkItemStatus,
    pub note: String,
    pub outcome: String,
    pub bag_date: DateTime<Utc>,
    pub date_processed: DateTime<Utc>,
    pub retry: bool,
    pub node: String,
    pub pid: i32,
    pub needs_admin_review: bool,
    pub queued_at: Option<DateTime<Utc>>,
    pub size: i64,
    pub stage_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for WorkItem {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        fn decode<T: FromStr<Err = anyhow::Error>>(
            row: &sqlx::postgres::PgRow,
            column: &str,
        ) -> Result<T, sqlx::Error> {
            row.get::<String, _>(column).parse().map_err(|e| {
                sqlx::Error::Decode(format!("Failed to parse {}: {}", column, e).into())
            })
        }

        Ok(WorkItem {
            id: row.get("id"),
            institution_id: row.get("institution_id"),
            intellectual_object_id: row.get("intellectual_object_id"),
            generic_file_id: row.get("generic_file_id"),
            deletion_request_id: row.get("deletion_request_id"),
            name: row.get("name"),
            etag: row.get("etag"),
            bucket: row.get("bucket"),
            user: row.get("user"),
            object_identifier: row.get("object_identifier"),
            generic_file_identifier: row.get("generic_file_identifier"),
            action: decode(row, "action")?,
            stage: decode(row, "stage")?,
            status: decode(row, "status")?,
            note: row.get("note"),
            outcome: row.get("outcome"),
            bag_date: row.get("bag_date"),
            date_processed: row.get("date_processed"),
            retry: row.get("retry"),
            node: row.get::<Option<String>, _>("node").unwrap_or_default(),
            pid: row.get("pid"),
            needs_admin_review: row.get("needs_admin_review"),
            queued_at: row.get("queued_at"),
            size: row.get("size"),
            stage_started_at: row.get("stage_started_at"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

impl WorkItem {
    /// A terminal outcome: success, cancellation, or failure the workers
    /// will not retry.
    pub fn has_completed(&self) -> bool {
        match self.status {
            WorkItemStatus::Success | WorkItemStatus::Cancelled => true,
            WorkItemStatus::Failed => !self.retry,
            WorkItemStatus::Pending | WorkItemStatus::Started | WorkItemStatus::Suspended => false,
        }
    }

    /// Outstanding work that blocks a new delete or restore on the same target.
    pub fn is_pending(&self) -> bool {
        !self.has_completed()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn work_item(action: Action, stage: Stage, status: WorkItemStatus) -> WorkItem {
        let now = Utc::now();
        WorkItem {
            id: 42,
            institution_id: 1,
            intellectual_object_id: Some(10),
            generic_file_id: None,
            deletion_request_id: None,
            name: "bag.tar".to_string(),
            etag: "0123456789abcdef0123456789abcdef".to_string(),
            bucket: "receiving.example.edu".to_string(),
            user: "user@example.edu".to_string(),
            object_identifier: Some("example.edu/bag".to_string()),
            generic_file_identifier: None,
            action,
            stage,
            status,
            note: String::new(),
            outcome: String::new(),
            bag_date: now,
            date_processed: now,
            retry: false,
            node: String::new(),
            pid: 0,
            needs_admin_review: false,
            queued_at: None,
            size: 1024,
            stage_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
