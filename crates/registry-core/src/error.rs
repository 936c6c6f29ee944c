//! Error types module
//!
//! Every failure the registry can report is a variant of the closed `AppError`
//! enum. Callers match on variants; the HTTP boundary turns them into responses
//! through `ErrorMetadata`.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::fmt;

use serde::Serialize;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for conflicts and refused operations
    Warn,
    /// Error level - for unexpected failures and data-model violations
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "PENDING_WORK")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether details should be hidden in production
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// One reason a batch deletion cannot proceed for a particular object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BatchViolation {
    NotFound {
        object_id: i64,
    },
    WrongInstitution {
        object_id: i64,
        institution_id: i64,
    },
    AlreadyDeleted {
        object_id: i64,
    },
    PendingWork {
        object_id: i64,
        work_item_ids: Vec<i64>,
    },
}

impl BatchViolation {
    pub fn object_id(&self) -> i64 {
        match self {
            BatchViolation::NotFound { object_id }
            | BatchViolation::WrongInstitution { object_id, .. }
            | BatchViolation::AlreadyDeleted { object_id }
            | BatchViolation::PendingWork { object_id, .. } => *object_id,
        }
    }
}

impl fmt::Display for BatchViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchViolation::NotFound { object_id } => {
                write!(f, "object {} does not exist", object_id)
            }
            BatchViolation::WrongInstitution {
                object_id,
                institution_id,
            } => write!(
                f,
                "object {} belongs to institution {}",
                object_id, institution_id
            ),
            BatchViolation::AlreadyDeleted { object_id } => {
                write!(f, "object {} is already deleted", object_id)
            }
            BatchViolation::PendingWork {
                object_id,
                work_item_ids,
            } => write!(
                f,
                "object {} has pending work items {:?}",
                object_id, work_item_ids
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Pending work: {0}")]
    PendingWork(String),

    #[error("Invalid confirmation token")]
    InvalidToken,

    #[error("Deletion request {0} has already been approved")]
    AlreadyApproved(i64),

    #[error("Deletion request {0} has already been cancelled")]
    AlreadyCancelled(i64),

    #[error("Action '{0}' has no stage sequence")]
    UnsupportedAction(String),

    #[error("Stage '{stage}' is not valid for action '{action}'")]
    InvalidStage { action: String, stage: String },

    #[error("No queue topic for action '{action}' at stage '{stage}'")]
    UnsupportedCombination { action: String, stage: String },

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Object {object_id} does not belong to institution {institution_id}")]
    WrongInstitution { object_id: i64, institution_id: i64 },

    #[error("Already deleted: {0}")]
    AlreadyDeleted(String),

    #[error("Batch deletion rejected with {} violation(s)", .0.len())]
    BatchRejected(Vec<BatchViolation>),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        match err {
            SqlxError::RowNotFound => AppError::NotFound("Record not found".to_string()),
            other => AppError::Database(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Repositories wrap AppError values in anyhow context; unwrap them back out.
        match err.downcast::<AppError>() {
            Ok(app_err) => app_err,
            Err(err) => AppError::InternalWithSource {
                message: err.to_string(),
                source: err,
            },
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(format!("Validation error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Database(_) => (
            500,
            "DATABASE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::PendingWork(_) => (
            409,
            "PENDING_WORK",
            true,
            Some("Wait for outstanding work items to finish, then retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::InvalidToken => (
            403,
            "INVALID_TOKEN",
            false,
            Some("Use the review link from the original notification"),
            false,
            LogLevel::Warn,
        ),
        AppError::AlreadyApproved(_) => (
            409,
            "ALREADY_APPROVED",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::AlreadyCancelled(_) => (
            409,
            "ALREADY_CANCELLED",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::UnsupportedAction(_) => (
            500,
            "UNSUPPORTED_ACTION",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidStage { .. } => (
            500,
            "INVALID_STAGE",
            false,
            Some("Choose one of the stages offered for this work item"),
            false,
            LogLevel::Error,
        ),
        AppError::UnsupportedCombination { .. } => (
            500,
            "UNSUPPORTED_COMBINATION",
            false,
            Some("Contact support if this error persists"),
            true,
            LogLevel::Error,
        ),
        AppError::NotSupported(_) => (
            400,
            "NOT_SUPPORTED",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::PermissionDenied(_) => (
            403,
            "PERMISSION_DENIED",
            false,
            Some("Ask an institutional administrator to perform this action"),
            false,
            LogLevel::Warn,
        ),
        AppError::WrongInstitution { .. } => (
            400,
            "WRONG_INSTITUTION",
            false,
            Some("Only include objects owned by the named institution"),
            false,
            LogLevel::Debug,
        ),
        AppError::AlreadyDeleted(_) => (
            409,
            "ALREADY_DELETED",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::BatchRejected(_) => (
            409,
            "BATCH_REJECTED",
            false,
            Some("Remove the listed objects from the batch and retry"),
            false,
            LogLevel::Warn,
        ),
        AppError::Queue(_) => (
            502,
            "QUEUE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::InvalidInput(_) => (
            400,
            "INVALID_INPUT",
            false,
            Some("Check request parameters and try again"),
            false,
            LogLevel::Debug,
        ),
        AppError::BadRequest(_) => (
            400,
            "BAD_REQUEST",
            false,
            Some("Check request format and parameters"),
            false,
            LogLevel::Debug,
        ),
        AppError::NotFound(_) => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the resource ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Unauthorized(_) => (
            401,
            "UNAUTHORIZED",
            false,
            Some("Check the authentication token"),
            false,
            LogLevel::Debug,
        ),
    }
}

impl AppError {
    /// Get the error type name for detailed error responses
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::PendingWork(_) => "PendingWork",
            AppError::InvalidToken => "InvalidToken",
            AppError::AlreadyApproved(_) => "AlreadyApproved",
            AppError::AlreadyCancelled(_) => "AlreadyCancelled",
            AppError::UnsupportedAction(_) => "UnsupportedAction",
            AppError::InvalidStage { .. } => "InvalidStage",
            AppError::UnsupportedCombination { .. } => "UnsupportedCombination",
            AppError::NotSupported(_) => "NotSupported",
            AppError::PermissionDenied(_) => "PermissionDenied",
            AppError::WrongInstitution { .. } => "WrongInstitution",
            AppError::AlreadyDeleted(_) => "AlreadyDeleted",
            AppError::BatchRejected(_) => "BatchRejected",
            AppError::Queue(_) => "Queue",
            AppError::InvalidInput(_) => "InvalidInput",
            AppError::BadRequest(_) => "BadRequest",
            AppError::NotFound(_) => "NotFound",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "Internal",
            AppError::Unauthorized(_) => "Unauthorized",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        if let AppError::BatchRejected(violations) = self {
            for v in violations {
                details.push_str(&format!("\n  - {}", v));
            }
        }

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Queue(_) => "Failed to queue work item".to_string(),
            AppError::UnsupportedAction(_) | AppError::UnsupportedCombination { .. } => {
                "Work item routing error".to_string()
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
            AppError::PendingWork(ref msg)
            | AppError::NotSupported(ref msg)
            | AppError::PermissionDenied(ref msg)
            | AppError::AlreadyDeleted(ref msg)
            | AppError::InvalidInput(ref msg)
            | AppError::BadRequest(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::Unauthorized(ref msg) => msg.clone(),
            AppError::BatchRejected(violations) => violations
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}
