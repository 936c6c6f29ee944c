use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use utoipa::ToSchema;

use super::catalog::User;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub enum AlertType {
    #[serde(rename = "Deletion Requested")]
    DeletionRequested,
    #[serde(rename = "Deletion Confirmed")]
    DeletionConfirmed,
    #[serde(rename = "Deletion Cancelled")]
    DeletionCancelled,
    #[serde(rename = "Restoration Requested")]
    RestorationRequested,
}

impl AlertType {
    /// Template used to render the alert body.
    pub fn template_name(&self) -> &'static str {
        match self {
            AlertType::DeletionRequested => "deletion_requested",
            AlertType::DeletionConfirmed => "deletion_confirmed",
            AlertType::DeletionCancelled => "deletion_cancelled",
            AlertType::RestorationRequested => "restoration_requested",
        }
    }
}

impl Display for AlertType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            AlertType::DeletionRequested => write!(f, "Deletion Requested"),
            AlertType::DeletionConfirmed => write!(f, "Deletion Confirmed"),
            AlertType::DeletionCancelled => write!(f, "Deletion Cancelled"),
            AlertType::RestorationRequested => write!(f, "Restoration Requested"),
        }
    }
}

impl FromStr for AlertType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Deletion Requested" => Ok(AlertType::DeletionRequested),
            "Deletion Confirmed" => Ok(AlertType::DeletionConfirmed),
            "Deletion Cancelled" => Ok(AlertType::DeletionCancelled),
            "Restoration Requested" => Ok(AlertType::RestorationRequested),
            _ => Err(anyhow::anyhow!("Invalid alert type: {}", s)),
        }
    }
}

/// A notification recorded for a set of users and, when enabled, emailed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Alert {
    pub id: i64,
    pub institution_id: i64,
    pub alert_type: AlertType,
    pub subject: String,
    /// Rendered body; empty until the alert service fills it in.
    pub content: String,
    pub deletion_request_id: Option<i64>,
    pub work_item_ids: Vec<i64>,
    pub recipients: Vec<User>,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(institution_id: i64, alert_type: AlertType, subject: impl Into<String>) -> Self {
        Alert {
            id: 0,
            institution_id,
            alert_type,
            subject: subject.into(),
            content: String::new(),
            deletion_request_id: None,
            work_item_ids: Vec::new(),
            recipients: Vec::new(),
            created_at: Utc::now(),
        }
    }
}
