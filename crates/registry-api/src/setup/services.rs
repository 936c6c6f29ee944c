//! Builds the service context over the PostgreSQL repositories.

use std::sync::Arc;

use anyhow::{Context, Result};
use registry_core::Config;
use registry_db::{
    AlertRepository, CatalogRepository, DeletionRequestRepository, WorkItemRepository,
};
use registry_services::{
    AlertMailer, EmailService, NsqClient, RegistryAlertService, ServiceContext,
};
use sqlx::PgPool;

pub fn build_context(config: &Config, pool: PgPool) -> Result<Arc<ServiceContext>> {
    let mailer = EmailService::from_config(config).map(|m| Arc::new(m) as Arc<dyn AlertMailer>);
    if mailer.is_none() {
        tracing::info!("Email alerts disabled; alerts are recorded but not sent");
    }
    let alerts = RegistryAlertService::new(Arc::new(AlertRepository::new(pool.clone())), mailer)
        .context("Failed to build alert service")?;
    let queue = NsqClient::from_config(config).context("Failed to build queue client")?;
    tracing::info!(nsq_url = %config.nsq_url(), "Queue client ready");

    Ok(Arc::new(ServiceContext::new(
        config.clone(),
        Arc::new(WorkItemRepository::new(pool.clone())),
        Arc::new(DeletionRequestRepository::new(pool.clone())),
        Arc::new(CatalogRepository::new(pool)),
        Arc::new(alerts),
        Arc::new(queue),
    )))
}
