//! Application state shared by every handler.

use std::sync::Arc;

use registry_core::Config;
use registry_services::{
    BatchDeletionGuard, DeletionService, RequeueService, RestorationService, ServiceContext,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub ctx: Arc<ServiceContext>,
    pub deletion: DeletionService,
    pub restoration: RestorationService,
    pub requeue: RequeueService,
    pub batch: BatchDeletionGuard,
}

impl AppState {
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self {
            config: ctx.config.clone(),
            deletion: DeletionService::new(ctx.clone()),
            restoration: RestorationService::new(ctx.clone()),
            requeue: RequeueService::new(ctx.clone()),
            batch: BatchDeletionGuard::new(ctx.clone()),
            ctx,
        }
    }
}
