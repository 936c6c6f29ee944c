//! Alert rendering, persistence and delivery.
//!
//! Alerts are saved with their recipients first, then emailed one recipient
//! at a time. Delivery problems are logged and never fail the caller; the
//! alert remains unsent for that user.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

use registry_core::models::Alert;
use registry_core::{AppError, AppResult};
use registry_db::AlertStore;

/// Values substituted into `{{key}}` placeholders.
pub type TemplateData = BTreeMap<String, String>;

const DELETION_REQUESTED: &str = "\
{{requester_name}} has requested deletion of the following item(s) from {{institution_name}}:

{{targets}}

Please review this request and approve or cancel it here:

{{review_url}}

A read-only record of the request is available at {{read_only_url}}
";

const DELETION_CONFIRMED: &str = "\
{{admin_name}} has approved deletion request {{request_id}} for {{institution_name}}:

{{targets}}

The deletion has been queued. You can follow its progress here:

{{work_item_urls}}

Request details: {{read_only_url}}
";

const DELETION_CANCELLED: &str = "\
{{admin_name}} has cancelled deletion request {{request_id}} for {{institution_name}}:

{{targets}}

Nothing will be deleted. Request details: {{read_only_url}}
";

const RESTORATION_REQUESTED: &str = "\
{{requester_name}} has requested restoration of {{target}} for {{institution_name}}.

The restoration has been queued. You can follow its progress here:

{{work_item_urls}}
";

fn template(name: &str) -> Option<&'static str> {
    match name {
        "deletion_requested" => Some(DELETION_REQUESTED),
        "deletion_confirmed" => Some(DELETION_CONFIRMED),
        "deletion_cancelled" => Some(DELETION_CANCELLED),
        "restoration_requested" => Some(RESTORATION_REQUESTED),
        _ => None,
    }
}

/// Renders the named alert template.
pub struct TemplateRenderer {
    placeholder: Regex,
}

impl TemplateRenderer {
    pub fn new() -> anyhow::Result<Self> {
        let placeholder =
            Regex::new(r"\{\{\s*([A-Za-z_]+)\s*\}\}").context("Invalid placeholder pattern")?;
        Ok(Self { placeholder })
    }

    /// Fails if the template is unknown or a placeholder has no value.
    pub fn render(&self, template_name: &str, data: &TemplateData) -> AppResult<String> {
        let source = template(template_name).ok_or_else(|| {
            AppError::Internal(format!("Unknown alert template: {}", template_name))
        })?;

        if let Some(missing) = self
            .placeholder
            .captures_iter(source)
            .map(|c| c[1].to_string())
            .find(|key| !data.contains_key(key))
        {
            return Err(AppError::Internal(format!(
                "Alert template {} needs a value for {}",
                template_name, missing
            )));
        }

        Ok(self
            .placeholder
            .replace_all(source, |caps: &regex::Captures| {
                data.get(&caps[1]).cloned().unwrap_or_default()
            })
            .into_owned())
    }
}

/// Delivers one rendered alert to one address.
#[async_trait]
pub trait AlertMailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

#[async_trait]
pub trait AlertService: Send + Sync {
    /// Renders `template_name` into the alert body, saves the alert with its
    /// recipients and sends it. Returns the saved alert.
    async fn create_alert(
        &self,
        alert: Alert,
        template_name: &str,
        data: &TemplateData,
    ) -> AppResult<Alert>;
}

pub struct RegistryAlertService {
    store: Arc<dyn AlertStore>,
    mailer: Option<Arc<dyn AlertMailer>>,
    renderer: TemplateRenderer,
    echo_content: bool,
}

impl RegistryAlertService {
    pub fn new(store: Arc<dyn AlertStore>, mailer: Option<Arc<dyn AlertMailer>>) -> AppResult<Self> {
        Ok(Self {
            store,
            mailer,
            renderer: TemplateRenderer::new()?,
            echo_content: false,
        })
    }

    /// Logs full alert bodies, review links included. For development and
    /// test environments only.
    pub fn with_echo(mut self, echo_content: bool) -> Self {
        self.echo_content = echo_content;
        self
    }

    async fn deliver(&self, alert: &Alert) {
        let Some(mailer) = &self.mailer else {
            tracing::debug!(alert_id = alert.id, "Email disabled; alert recorded only");
            return;
        };

        for user in &alert.recipients {
            match mailer.send(&user.email, &alert.subject, &alert.content).await {
                Ok(()) => {
                    if let Err(e) = self.store.mark_sent(alert.id, user.id, Utc::now()).await {
                        tracing::warn!(
                            alert_id = alert.id,
                            user_id = user.id,
                            error = %e,
                            "Alert sent but could not be marked as sent"
                        );
                    }
                }
                Err(e) => tracing::warn!(
                    alert_id = alert.id,
                    user_id = user.id,
                    error = %e,
                    "Failed to email alert"
                ),
            }
        }
    }
}

#[async_trait]
impl AlertService for RegistryAlertService {
    #[tracing::instrument(skip(self, alert, data), fields(alert_type = %alert.alert_type))]
    async fn create_alert(
        &self,
        mut alert: Alert,
        template_name: &str,
        data: &TemplateData,
    ) -> AppResult<Alert> {
        alert.content = self.renderer.render(template_name, data)?;
        let saved = self.store.insert(&alert).await?;

        if self.echo_content {
            tracing::info!(alert_id = saved.id, content = %saved.content, "Alert created");
        } else {
            tracing::info!(
                alert_id = saved.id,
                recipients = saved.recipients.len(),
                "Alert created"
            );
        }

        self.deliver(&saved).await;
        Ok(saved)
    }
}
