use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use utoipa::ToSchema;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeletionRequestStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl Display for DeletionRequestStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            DeletionRequestStatus::Pending => write!(f, "pending"),
            DeletionRequestStatus::Confirmed => write!(f, "confirmed"),
            DeletionRequestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Insert payload for a new request. Carries only the token hash.
#[derive(Debug, Clone)]
pub struct NewDeletionRequest {
    pub institution_id: i64,
    pub requested_by_id: i64,
    pub requested_at: DateTime<Utc>,
    pub encrypted_confirmation_token: String,
    pub generic_file_ids: Vec<i64>,
    pub intellectual_object_ids: Vec<i64>,
}

/// Intent to delete files and/or objects, waiting on an institutional admin.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeletionRequest {
    pub id: i64,
    pub institution_id: i64,
    pub requested_by_id: i64,
    pub requested_at: DateTime<Utc>,
    pub confirmed_by_id: Option<i64>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub cancelled_by_id: Option<i64>,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub encrypted_confirmation_token: String,
    pub generic_file_ids: Vec<i64>,
    pub intellectual_object_ids: Vec<i64>,
    pub work_item_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Plaintext token. Only present on the value returned by the call that
    /// issued it; never persisted or serialized.
    #[serde(skip)]
    confirmation_token: Option<String>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for DeletionRequest {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(DeletionRequest {
            id: row.get("id"),
            institution_id: row.get("institution_id"),
            requested_by_id: row.get("requested_by_id"),
            requested_at: row.get("requested_at"),
            confirmed_by_id: row.get("confirmed_by_id"),
            confirmed_at: row.get("confirmed_at"),
            cancelled_by_id: row.get("cancelled_by_id"),
            cancelled_at: row.get("cancelled_at"),
            encrypted_confirmation_token: row.get("encrypted_confirmation_token"),
            generic_file_ids: row
                .get::<Option<Vec<i64>>, _>("generic_file_ids")
                .unwrap_or_default(),
            intellectual_object_ids: row
                .get::<Option<Vec<i64>>, _>("intellectual_object_ids")
                .unwrap_or_default(),
            work_item_id: row.get("work_item_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            confirmation_token: None,
        })
    }
}

impl DeletionRequest {
    /// Builds the stored form of a freshly inserted request.
    pub fn from_new(id: i64, new: NewDeletionRequest, now: DateTime<Utc>) -> Self {
        DeletionRequest {
            id,
            institution_id: new.institution_id,
            requested_by_id: new.requested_by_id,
            requested_at: new.requested_at,
            confirmed_by_id: None,
            confirmed_at: None,
            cancelled_by_id: None,
            cancelled_at: None,
            encrypted_confirmation_token: new.encrypted_confirmation_token,
            generic_file_ids: new.generic_file_ids,
            intellectual_object_ids: new.intellectual_object_ids,
            work_item_id: None,
            created_at: now,
            updated_at: now,
            confirmation_token: None,
        }
    }

    pub fn with_confirmation_token(mut self, plaintext: String) -> Self {
        self.confirmation_token = Some(plaintext);
        self
    }

    pub fn confirmation_token(&self) -> Option<&str> {
        self.confirmation_token.as_deref()
    }

    /// Copy of this request as it would look after a reload from storage.
    pub fn without_confirmation_token(&self) -> Self {
        let mut copy = self.clone();
        copy.confirmation_token = None;
        copy
    }

    pub fn status(&self) -> DeletionRequestStatus {
        if self.confirmed_at.is_some() {
            DeletionRequestStatus::Confirmed
        } else if self.cancelled_at.is_some() {
            DeletionRequestStatus::Cancelled
        } else {
            DeletionRequestStatus::Pending
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status() == DeletionRequestStatus::Pending
    }

    /// Confirmed but no work item recorded: dispatch failed after approval.
    pub fn is_stranded(&self) -> bool {
        self.confirmed_at.is_some() && self.work_item_id.is_none()
    }

    /// Never both terminal; a work item only on a confirmed request.
    pub fn is_consistent(&self) -> bool {
        let both_terminal = self.confirmed_at.is_some() && self.cancelled_at.is_some();
        let orphan_item = self.work_item_id.is_some() && self.confirmed_at.is_none();
        !both_terminal && !orphan_item
    }

    /// Refuses a second terminal transition.
    pub fn ensure_pending(&self) -> Result<(), AppError> {
        if self.confirmed_at.is_some() {
            return Err(AppError::AlreadyApproved(self.id));
        }
        if self.cancelled_at.is_some() {
            return Err(AppError::AlreadyCancelled(self.id));
        }
        Ok(())
    }

    /// Link an admin follows to review and approve. Only available while the
    /// plaintext token is still attached.
    pub fn review_url(&self, base_url: &str) -> Result<String, AppError> {
        let token = self.confirmation_token.as_deref().ok_or_else(|| {
            AppError::NotSupported(
                "Review URL is only available when the request is first created".to_string(),
            )
        })?;
        Ok(format!(
            "{}/deletions/review/{}?token={}",
            base_url.trim_end_matches('/'),
            self.id,
            token
        ))
    }

    pub fn read_only_url(&self, base_url: &str) -> String {
        format!("{}/deletions/show/{}", base_url.trim_end_matches('/'), self.id)
    }

    pub fn work_item_urls(
        &self,
        base_url: &str,
        work_item_ids: &[i64],
    ) -> Result<Vec<String>, AppError> {
        if work_item_ids.is_empty() {
            return Err(AppError::NotSupported(format!(
                "Deletion request {} has no work items",
                self.id
            )));
        }
        let base = base_url.trim_end_matches('/');
        Ok(work_item_ids
            .iter()
            .map(|id| format!("{}/work_items/show/{}", base, id))
            .collect())
    }
}
