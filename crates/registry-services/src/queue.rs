//! Outbound queue client
//!
//! Workers claim items from NSQ topics. The registry only publishes the work
//! item id; the worker loads everything else from the shared tables.

use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

use registry_core::{AppError, AppResult, Config};

#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Publishes `work_item_id` to `topic`. Not retried; failures surface as
    /// `AppError::Queue`.
    async fn enqueue(&self, topic: &str, work_item_id: i64) -> AppResult<()>;
}

/// Publishes through nsqd's HTTP interface.
#[derive(Clone)]
pub struct NsqClient {
    http_client: reqwest::Client,
    url: String,
}

impl NsqClient {
    pub fn new(url: &str, timeout: Option<Duration>) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http_client = builder
            .build()
            .context("Failed to create HTTP client for NSQ")?;
        Ok(Self {
            http_client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            config.nsq_url(),
            config.queue_timeout_seconds().map(Duration::from_secs),
        )
    }

    fn publish_url(&self, topic: &str) -> String {
        format!("{}/pub?topic={}", self.url, topic)
    }
}

#[async_trait]
impl QueueClient for NsqClient {
    #[tracing::instrument(skip(self))]
    async fn enqueue(&self, topic: &str, work_item_id: i64) -> AppResult<()> {
        let response = self
            .http_client
            .post(self.publish_url(topic))
            .body(work_item_id.to_string())
            .send()
            .await
            .map_err(|e| AppError::Queue(format!("Failed to reach NSQ: {}", e)))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::Queue(format!(
                "NSQ returned {} for topic {}: {}",
                status, topic, error_text
            )));
        }

        tracing::info!(work_item_id, topic, "Work item queued");
        Ok(())
    }
}
