//! Explicit service context
//!
//! Built once at startup and shared by reference with every service. Holds
//! configuration, the store handles and the outbound collaborators.

use std::sync::Arc;

use registry_core::{Config, ConfirmationTokenAuthority};
use registry_db::{CatalogStore, DeletionRequestStore, WorkItemStore};

use crate::alerts::AlertService;
use crate::queue::QueueClient;

#[derive(Clone)]
pub struct ServiceContext {
    pub config: Config,
    pub work_items: Arc<dyn WorkItemStore>,
    pub deletion_requests: Arc<dyn DeletionRequestStore>,
    pub catalog: Arc<dyn CatalogStore>,
    pub alerts: Arc<dyn AlertService>,
    pub queue: Arc<dyn QueueClient>,
    pub tokens: ConfirmationTokenAuthority,
}

impl ServiceContext {
    pub fn new(
        config: Config,
        work_items: Arc<dyn WorkItemStore>,
        deletion_requests: Arc<dyn DeletionRequestStore>,
        catalog: Arc<dyn CatalogStore>,
        alerts: Arc<dyn AlertService>,
        queue: Arc<dyn QueueClient>,
    ) -> Self {
        let tokens = ConfirmationTokenAuthority::new(config.token_hash_cost());
        Self {
            config,
            work_items,
            deletion_requests,
            catalog,
            alerts,
            queue,
            tokens,
        }
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url()
    }
}
