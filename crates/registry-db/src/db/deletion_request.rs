use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};

use registry_core::models::{DeletionRequest, NewDeletionRequest};
use registry_core::AppError;

use super::transaction::TransactionGuard;
use super::work_item::pending_ids_in;
use crate::traits::{DeletionRequestStore, PendingScope};

const DELETION_REQUEST_SELECT: &str = r#"
    SELECT
        dr.id,
        dr.institution_id,
        dr.requested_by_id,
        dr.requested_at,
        dr.confirmed_by_id,
        dr.confirmed_at,
        dr.cancelled_by_id,
        dr.cancelled_at,
        dr.encrypted_confirmation_token,
        dr.work_item_id,
        dr.created_at,
        dr.updated_at,
        ARRAY(
            SELECT generic_file_id FROM deletion_requests_generic_files
            WHERE deletion_request_id = dr.id ORDER BY generic_file_id
        ) AS generic_file_ids,
        ARRAY(
            SELECT intellectual_object_id FROM deletion_requests_intellectual_objects
            WHERE deletion_request_id = dr.id ORDER BY intellectual_object_id
        ) AS intellectual_object_ids
    FROM deletion_requests dr
"#;

#[derive(Clone)]
pub struct DeletionRequestRepository {
    pool: PgPool,
}

impl DeletionRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: i64) -> Result<Option<DeletionRequest>> {
        let sql = format!("{} WHERE dr.id = $1", DELETION_REQUEST_SELECT);
        let request = sqlx::query_as::<Postgres, DeletionRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch deletion request")?;
        Ok(request)
    }

    /// Runs a conditional terminal-state update. Zero affected rows means the
    /// request is missing or another admin already acted on it.
    async fn finish(
        &self,
        id: i64,
        sql: &str,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DeletionRequest> {
        let result = sqlx::query(sql)
            .bind(id)
            .bind(admin_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .context("Failed to update deletion request")?;

        let current = self
            .fetch(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Deletion request {} not found", id)))?;

        if result.rows_affected() == 0 {
            current.ensure_pending()?;
            // Not terminal, yet nothing was updated: only possible if the row vanished.
            return Err(AppError::Internal(format!(
                "Deletion request {} could not be updated",
                id
            ))
            .into());
        }
        Ok(current)
    }
}

#[async_trait]
impl DeletionRequestStore for DeletionRequestRepository {
    #[tracing::instrument(skip(self, new, scopes), fields(institution_id = new.institution_id))]
    async fn create_if_no_pending_work(
        &self,
        new: NewDeletionRequest,
        scopes: &[PendingScope],
    ) -> Result<DeletionRequest> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        let object_ids: Vec<i64> = scopes.iter().map(|s| s.intellectual_object_id).collect();
        tx.lock_objects(&object_ids).await?;

        for scope in scopes {
            let pending = pending_ids_in(tx.conn()?, scope).await?;
            if !pending.is_empty() {
                tx.rollback().await?;
                tracing::warn!(
                    intellectual_object_id = scope.intellectual_object_id,
                    pending = ?pending,
                    "Deletion request refused: work is pending"
                );
                return Err(AppError::PendingWork(format!(
                    "{} has pending work items {:?}",
                    scope.bag_name, pending
                ))
                .into());
            }
        }

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO deletion_requests (
                institution_id, requested_by_id, requested_at, encrypted_confirmation_token
            )
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(new.institution_id)
        .bind(new.requested_by_id)
        .bind(new.requested_at)
        .bind(&new.encrypted_confirmation_token)
        .fetch_one(tx.conn()?)
        .await
        .context("Failed to insert deletion request")?;

        if !new.generic_file_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO deletion_requests_generic_files (deletion_request_id, generic_file_id)
                SELECT $1, unnest($2::BIGINT[])
                "#,
            )
            .bind(id)
            .bind(&new.generic_file_ids)
            .execute(tx.conn()?)
            .await
            .context("Failed to link files to deletion request")?;
        }

        if !new.intellectual_object_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO deletion_requests_intellectual_objects (deletion_request_id, intellectual_object_id)
                SELECT $1, unnest($2::BIGINT[])
                "#,
            )
            .bind(id)
            .bind(&new.intellectual_object_ids)
            .execute(tx.conn()?)
            .await
            .context("Failed to link objects to deletion request")?;
        }

        tx.commit().await?;

        tracing::info!(
            deletion_request_id = id,
            institution_id = new.institution_id,
            files = new.generic_file_ids.len(),
            objects = new.intellectual_object_ids.len(),
            "Deletion request created"
        );

        self.fetch(id).await?.ok_or_else(|| {
            AppError::Internal(format!("Deletion request {} vanished after insert", id)).into()
        })
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Option<DeletionRequest>> {
        self.fetch(id).await
    }

    #[tracing::instrument(skip(self))]
    async fn mark_confirmed(
        &self,
        id: i64,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DeletionRequest> {
        let request = self
            .finish(
                id,
                r#"
                UPDATE deletion_requests
                SET confirmed_by_id = $2, confirmed_at = $3, updated_at = NOW()
                WHERE id = $1 AND confirmed_at IS NULL AND cancelled_at IS NULL
                "#,
                admin_id,
                at,
            )
            .await?;
        tracing::info!(deletion_request_id = id, admin_id, "Deletion request confirmed");
        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_cancelled(
        &self,
        id: i64,
        admin_id: i64,
        at: DateTime<Utc>,
    ) -> Result<DeletionRequest> {
        let request = self
            .finish(
                id,
                r#"
                UPDATE deletion_requests
                SET cancelled_by_id = $2, cancelled_at = $3, updated_at = NOW()
                WHERE id = $1 AND confirmed_at IS NULL AND cancelled_at IS NULL
                "#,
                admin_id,
                at,
            )
            .await?;
        tracing::info!(deletion_request_id = id, admin_id, "Deletion request cancelled");
        Ok(request)
    }

    #[tracing::instrument(skip(self))]
    async fn set_work_item_id(&self, id: i64, work_item_id: i64) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE deletion_requests
            SET work_item_id = $2, updated_at = NOW()
            WHERE id = $1 AND confirmed_at IS NOT NULL
            "#,
        )
        .bind(id)
        .bind(work_item_id)
        .execute(&self.pool)
        .await
        .context("Failed to record work item on deletion request")?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotSupported(format!(
                "Deletion request {} is not confirmed",
                id
            ))
            .into());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn find_stranded(&self) -> Result<Vec<DeletionRequest>> {
        let sql = format!(
            "{} WHERE dr.confirmed_at IS NOT NULL AND dr.work_item_id IS NULL ORDER BY dr.confirmed_at",
            DELETION_REQUEST_SELECT
        );
        let requests = sqlx::query_as::<Postgres, DeletionRequest>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query stranded deletion requests")?;
        Ok(requests)
    }
}
