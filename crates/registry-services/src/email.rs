//! SMTP delivery for alert emails.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;

use registry_core::Config;

use crate::alerts::AlertMailer;

/// Email service for alert notifications.
/// Absent when email alerts are disabled or SMTP is not configured.
#[derive(Clone)]
pub struct EmailService {
    mailer: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl EmailService {
    /// Create email service from config. Returns `None` if disabled or SMTP not configured.
    pub fn from_config(config: &Config) -> Option<Self> {
        if !config.email_alerts_enabled() {
            tracing::debug!("Email alerts disabled (EMAIL_ALERTS_ENABLED=false)");
            return None;
        }
        let host = config.smtp_host()?;
        let from = config.smtp_from()?.to_string();
        let port = config.smtp_port().unwrap_or(587);
        let credentials = match (config.smtp_user(), config.smtp_password()) {
            (Some(u), Some(p)) => Some(Credentials::new(u.to_string(), p.to_string())),
            _ => None,
        };

        let mailer = if config.smtp_tls() {
            let b = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                .map_err(|e| tracing::error!(host = %host, error = %e, "Invalid SMTP relay"))
                .ok()?
                .port(port);
            let b = match credentials {
                Some(c) => b.credentials(c),
                None => b,
            };
            tracing::info!(host = %host, port = port, "Email service initialized (SMTP with STARTTLS)");
            b.build()
        } else {
            let b = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host).port(port);
            let b = match credentials {
                Some(c) => b.credentials(c),
                None => b,
            };
            tracing::info!(host = %host, port = port, "Email service initialized (SMTP)");
            b.build()
        };

        Some(Self {
            mailer: Arc::new(mailer),
            from,
        })
    }
}

#[async_trait]
impl AlertMailer for EmailService {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let to_addr: Mailbox = to
            .parse()
            .map_err(|e| anyhow!("Invalid recipient address {}: {}", to, e))?;
        let from_addr: Mailbox = self
            .from
            .parse()
            .map_err(|e| anyhow!("Invalid SMTP_FROM: {}", e))?;

        let email = Message::builder()
            .from(from_addr)
            .to(to_addr)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .context("Failed to build alert email")?;

        self.mailer
            .send(email)
            .await
            .context("SMTP delivery failed")?;
        tracing::debug!(to = %to, "Alert email sent");
        Ok(())
    }
}
