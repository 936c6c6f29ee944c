//! Registry Services Layer
//!
//! Orchestration for the deletion and work item workflows. Every service is
//! built from an explicit [`ServiceContext`] holding the stores, the queue
//! client, the alert service and configuration; nothing here reads global
//! state. Keep HTTP concerns in registry-api.

pub mod alerts;
pub mod batch;
pub mod context;
pub mod deletion;
pub mod email;
pub mod permissions;
pub mod queue;
pub mod requeue;
pub mod restoration;
pub mod work_items;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use alerts::{AlertMailer, AlertService, RegistryAlertService, TemplateData};
pub use batch::{BatchDeletionGuard, BatchDeletionRequest};
pub use context::ServiceContext;
pub use deletion::DeletionService;
pub use email::EmailService;
pub use queue::{NsqClient, QueueClient};
pub use requeue::RequeueService;
pub use restoration::RestorationService;
pub use work_items::{WorkItemService, WorkTarget};
