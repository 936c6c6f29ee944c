//! Registry Database Layer
//!
//! Store traits used by the services, their PostgreSQL implementations, and
//! (behind `test-helpers`) an in-memory store for tests.

pub mod db;
pub mod traits;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use db::{
    AlertRepository, CatalogRepository, DeletionRequestRepository, TransactionGuard,
    WorkItemRepository,
};
pub use traits::{AlertStore, CatalogStore, DeletionRequestStore, PendingScope, WorkItemStore};
