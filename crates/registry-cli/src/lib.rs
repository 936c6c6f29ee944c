//! Operator tooling for the registry.

use anyhow::Result;
use chrono::{DateTime, Utc};
use registry_core::models::DeletionRequest;
use registry_services::DeletionService;
use serde::Serialize;

/// One line of the stranded deletion report.
#[derive(Debug, Serialize)]
pub struct StrandedRow {
    pub id: i64,
    pub institution_id: i64,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub objects: usize,
    pub files: usize,
    /// Set once `--redispatch` has repaired the request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub work_item_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&DeletionRequest> for StrandedRow {
    fn from(request: &DeletionRequest) -> Self {
        Self {
            id: request.id,
            institution_id: request.institution_id,
            confirmed_at: request.confirmed_at,
            objects: request.intellectual_object_ids.len(),
            files: request.generic_file_ids.len(),
            work_item_id: request.work_item_id,
            error: None,
        }
    }
}

/// Lists confirmed requests with no work item and, when `redispatch` is
/// set, finishes dispatch for each one. A failure on one request is
/// recorded in its row and does not stop the others.
pub async fn reconcile(deletion: &DeletionService, redispatch: bool) -> Result<Vec<StrandedRow>> {
    let stranded = deletion.find_stranded().await?;
    tracing::info!(count = stranded.len(), redispatch, "Stranded deletion requests found");

    let mut rows = Vec::with_capacity(stranded.len());
    for request in &stranded {
        let mut row = StrandedRow::from(request);
        if redispatch {
            match deletion.redispatch_stranded(request.id).await {
                Ok(repaired) => row.work_item_id = repaired.work_item_id,
                Err(e) => {
                    tracing::error!(deletion_request_id = request.id, error = %e, "Redispatch failed");
                    row.error = Some(e.to_string());
                }
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
