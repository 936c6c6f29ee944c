use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use registry_core::models::Alert;

use super::transaction::TransactionGuard;
use crate::traits::AlertStore;

#[derive(Clone)]
pub struct AlertRepository {
    pool: PgPool,
}

impl AlertRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertStore for AlertRepository {
    #[tracing::instrument(skip(self, alert), fields(alert_type = %alert.alert_type))]
    async fn insert(&self, alert: &Alert) -> Result<Alert> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;

        let (id, created_at): (i64, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO alerts (institution_id, type, subject, content, deletion_request_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, created_at
            "#,
        )
        .bind(alert.institution_id)
        .bind(alert.alert_type.to_string())
        .bind(&alert.subject)
        .bind(&alert.content)
        .bind(alert.deletion_request_id)
        .fetch_one(tx.conn()?)
        .await
        .context("Failed to insert alert")?;

        let user_ids: Vec<i64> = alert.recipients.iter().map(|u| u.id).collect();
        if !user_ids.is_empty() {
            sqlx::query(
                "INSERT INTO alerts_users (alert_id, user_id) SELECT $1, unnest($2::BIGINT[])",
            )
            .bind(id)
            .bind(&user_ids)
            .execute(tx.conn()?)
            .await
            .context("Failed to link alert recipients")?;
        }

        if !alert.work_item_ids.is_empty() {
            sqlx::query(
                "INSERT INTO alerts_work_items (alert_id, work_item_id) SELECT $1, unnest($2::BIGINT[])",
            )
            .bind(id)
            .bind(&alert.work_item_ids)
            .execute(tx.conn()?)
            .await
            .context("Failed to link alert work items")?;
        }

        tx.commit().await?;

        tracing::debug!(alert_id = id, recipients = user_ids.len(), "Alert saved");

        let mut saved = alert.clone();
        saved.id = id;
        saved.created_at = created_at;
        Ok(saved)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_sent(&self, alert_id: i64, user_id: i64, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE alerts_users SET sent_at = $3 WHERE alert_id = $1 AND user_id = $2")
            .bind(alert_id)
            .bind(user_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .context("Failed to mark alert sent")?;
        Ok(())
    }
}
