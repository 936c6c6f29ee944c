//! Test doubles for the outbound collaborators and a harness that wires them
//! into a [`ServiceContext`] over the in-memory store.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use registry_core::models::{Alert, IntellectualObject, Role, User};
use registry_core::{AppError, AppResult, BaseConfig, Config, RegistryConfig};
use registry_db::test_helpers::{institution, successful_ingest, user, MemoryStore};

use crate::alerts::{AlertMailer, AlertService, RegistryAlertService, TemplateData};
use crate::batch::BatchDeletionGuard;
use crate::context::ServiceContext;
use crate::deletion::DeletionService;
use crate::queue::QueueClient;
use crate::requeue::RequeueService;
use crate::restoration::RestorationService;
use crate::work_items::WorkItemService;

pub const TEST_BATCH_KEY: &str = "8a1c1b2e-4b1f-4c55-9d43-3d3f1f6ab0de";

/// Configuration for the `test` environment with the cheapest bcrypt cost.
pub fn test_config() -> Config {
    Config(Box::new(RegistryConfig {
        base: BaseConfig {
            server_port: 8080,
            cors_origins: vec!["*".to_string()],
            database_url: "postgresql://localhost/registry_test".to_string(),
            db_max_connections: 1,
            db_timeout_seconds: 1,
            jwt_secret: "test-secret-key-min-32-characters-long".to_string(),
            jwt_expiry_hours: 1,
            environment: "test".to_string(),
            log_format: "compact".to_string(),
        },
        base_url: "http://localhost:8080".to_string(),
        nsq_url: "http://localhost:4151".to_string(),
        queue_timeout_seconds: 0,
        batch_deletion_key: TEST_BATCH_KEY.to_string(),
        token_hash_cost: 4,
        email_alerts_enabled: false,
        smtp_host: None,
        smtp_port: None,
        smtp_user: None,
        smtp_password: None,
        smtp_from: None,
        smtp_tls: true,
    }))
}

/// Queue client that records what was published, or fails on demand.
#[derive(Default)]
pub struct RecordingQueue {
    published: Mutex<Vec<(String, i64)>>,
    failure: Mutex<Option<String>>,
}

impl RecordingQueue {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn published(&self) -> Vec<(String, i64)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl QueueClient for RecordingQueue {
    async fn enqueue(&self, topic: &str, work_item_id: i64) -> AppResult<()> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(AppError::Queue(message));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), work_item_id));
        Ok(())
    }
}

/// Mailer that records recipients, optionally failing for one address.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<String>>,
    failing_for: Option<String>,
}

impl RecordingMailer {
    pub fn failing_for(address: &str) -> Self {
        Self {
            sent: Mutex::default(),
            failing_for: Some(address.to_string()),
        }
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertMailer for RecordingMailer {
    async fn send(&self, to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
        if self.failing_for.as_deref() == Some(to) {
            return Err(anyhow::anyhow!("mailbox unavailable: {}", to));
        }
        self.sent.lock().unwrap().push(to.to_string());
        Ok(())
    }
}

/// Real alert service that can be made to fail before anything is saved.
pub struct SwitchableAlerts {
    inner: RegistryAlertService,
    failure: Mutex<Option<String>>,
}

impl SwitchableAlerts {
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
    }
}

#[async_trait]
impl AlertService for SwitchableAlerts {
    async fn create_alert(
        &self,
        alert: Alert,
        template_name: &str,
        data: &TemplateData,
    ) -> AppResult<Alert> {
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(AppError::Internal(message));
        }
        self.inner.create_alert(alert, template_name, data).await
    }
}

/// A service context over one [`MemoryStore`], a recording queue and a
/// recording mailer.
pub struct TestHarness {
    pub store: MemoryStore,
    pub queue: Arc<RecordingQueue>,
    pub mailer: Arc<RecordingMailer>,
    pub alerts: Arc<SwitchableAlerts>,
    pub ctx: Arc<ServiceContext>,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = MemoryStore::new();
        let queue = Arc::new(RecordingQueue::default());
        let mailer = Arc::new(RecordingMailer::default());
        let inner = RegistryAlertService::new(
            Arc::new(store.clone()),
            Some(mailer.clone() as Arc<dyn AlertMailer>),
        )
        .expect("alert service");
        let alerts = Arc::new(SwitchableAlerts {
            inner,
            failure: Mutex::default(),
        });
        let ctx = Arc::new(ServiceContext::new(
            config,
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            alerts.clone(),
            queue.clone(),
        ));
        Self {
            store,
            queue,
            mailer,
            alerts,
            ctx,
        }
    }

    /// Adds the object, its institution, one institutional admin (id
    /// `100 + institution_id`) and a successful ingest. Returns the admin.
    pub fn seed_object(&self, object: &IntellectualObject) -> User {
        let admin = user(100 + object.institution_id, object.institution_id, Role::InstAdmin);
        self.store.add_institution(institution(object.institution_id));
        self.store.add_user(admin.clone());
        self.store.add_object(object.clone());
        self.store.add_work_item(successful_ingest(object));
        admin
    }

    pub fn work_item_service(&self) -> WorkItemService {
        WorkItemService::new(self.ctx.clone())
    }

    pub fn deletion_service(&self) -> DeletionService {
        DeletionService::new(self.ctx.clone())
    }

    pub fn restoration_service(&self) -> RestorationService {
        RestorationService::new(self.ctx.clone())
    }

    pub fn requeue_service(&self) -> RequeueService {
        RequeueService::new(self.ctx.clone())
    }

    pub fn batch_guard(&self) -> BatchDeletionGuard {
        BatchDeletionGuard::new(self.ctx.clone())
    }
}
