//! PostgreSQL repositories

pub mod alert;
pub mod catalog;
pub mod deletion_request;
pub mod transaction;
pub mod work_item;

pub use alert::AlertRepository;
pub use catalog::CatalogRepository;
pub use deletion_request::DeletionRequestRepository;
pub use transaction::TransactionGuard;
pub use work_item::WorkItemRepository;

/// Work items that are not yet in a terminal state. Shared by every
/// pending-work query so they all agree with `WorkItem::has_completed`.
pub(crate) const PENDING_PREDICATE: &str =
    "NOT (status IN ('Success', 'Cancelled') OR (status = 'Failed' AND retry = FALSE))";
