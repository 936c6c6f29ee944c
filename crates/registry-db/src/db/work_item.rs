use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres};

use registry_core::models::WorkItem;
use registry_core::AppError;

use super::transaction::TransactionGuard;
use super::PENDING_PREDICATE;
use crate::traits::{PendingScope, WorkItemStore};

pub(crate) const WORK_ITEM_COLUMNS: &str = r#"
    id, institution_id, intellectual_object_id, generic_file_id, deletion_request_id,
    name, etag, bucket, "user", object_identifier, generic_file_identifier,
    action, stage, status, note, outcome, bag_date, date_processed, retry,
    node, pid, needs_admin_review, queued_at, size, stage_started_at,
    created_at, updated_at
"#;

#[derive(Clone)]
pub struct WorkItemRepository {
    pool: PgPool,
}

impl WorkItemRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Ids of pending work items under `scope`, read on the given connection.
pub(crate) async fn pending_ids_in(
    conn: &mut PgConnection,
    scope: &PendingScope,
) -> Result<Vec<i64>> {
    let sql = format!(
        r#"
        SELECT id FROM work_items
        WHERE ((institution_id = $1 AND name = $2)
               OR ($3::BIGINT IS NOT NULL AND generic_file_id = $3))
          AND {}
        ORDER BY id
        "#,
        PENDING_PREDICATE
    );
    let ids: Vec<i64> = sqlx::query_scalar(&sql)
        .bind(scope.institution_id)
        .bind(&scope.bag_name)
        .bind(scope.generic_file_id)
        .fetch_all(conn)
        .await
        .context("Failed to query pending work items")?;
    Ok(ids)
}

pub(crate) async fn insert_in(conn: &mut PgConnection, item: &WorkItem) -> Result<WorkItem> {
    let sql = format!(
        r#"
        INSERT INTO work_items (
            institution_id, intellectual_object_id, generic_file_id, deletion_request_id,
            name, etag, bucket, "user", object_identifier, generic_file_identifier,
            action, stage, status, note, outcome, bag_date, date_processed, retry,
            node, pid, needs_admin_review, queued_at, size, stage_started_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                $17, $18, $19, $20, $21, $22, $23, $24)
        RETURNING {}
        "#,
        WORK_ITEM_COLUMNS
    );
    let saved = sqlx::query_as::<Postgres, WorkItem>(&sql)
        .bind(item.institution_id)
        .bind(item.intellectual_object_id)
        .bind(item.generic_file_id)
        .bind(item.deletion_request_id)
        .bind(&item.name)
        .bind(&item.etag)
        .bind(&item.bucket)
        .bind(&item.user)
        .bind(&item.object_identifier)
        .bind(&item.generic_file_identifier)
        .bind(item.action.to_string())
        .bind(item.stage.to_string())
        .bind(item.status.to_string())
        .bind(&item.note)
        .bind(&item.outcome)
        .bind(item.bag_date)
        .bind(item.date_processed)
        .bind(item.retry)
        .bind(&item.node)
        .bind(item.pid)
        .bind(item.needs_admin_review)
        .bind(item.queued_at)
        .bind(item.size)
        .bind(item.stage_started_at)
        .fetch_one(conn)
        .await
        .context("Failed to insert work item")?;

    tracing::info!(
        work_item_id = saved.id,
        action = %saved.action,
        stage = %saved.stage,
        institution_id = saved.institution_id,
        "Work item created"
    );
    Ok(saved)
}

#[async_trait]
impl WorkItemStore for WorkItemRepository {
    #[tracing::instrument(skip(self))]
    async fn get(&self, id: i64) -> Result<Option<WorkItem>> {
        let sql = format!("SELECT {} FROM work_items WHERE id = $1", WORK_ITEM_COLUMNS);
        let item = sqlx::query_as::<Postgres, WorkItem>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch work item")?;
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    async fn pending_for_file(&self, generic_file_id: i64) -> Result<Vec<WorkItem>> {
        let sql = format!(
            "SELECT {} FROM work_items WHERE generic_file_id = $1 AND {} ORDER BY id",
            WORK_ITEM_COLUMNS, PENDING_PREDICATE
        );
        let items = sqlx::query_as::<Postgres, WorkItem>(&sql)
            .bind(generic_file_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query pending work items for file")?;
        Ok(items)
    }

    #[tracing::instrument(skip(self))]
    async fn pending_for_object(
        &self,
        institution_id: i64,
        bag_name: &str,
    ) -> Result<Vec<WorkItem>> {
        let sql = format!(
            "SELECT {} FROM work_items WHERE institution_id = $1 AND name = $2 AND {} ORDER BY id",
            WORK_ITEM_COLUMNS, PENDING_PREDICATE
        );
        let items = sqlx::query_as::<Postgres, WorkItem>(&sql)
            .bind(institution_id)
            .bind(bag_name)
            .fetch_all(&self.pool)
            .await
            .context("Failed to query pending work items for object")?;
        Ok(items)
    }

    #[tracing::instrument(skip(self))]
    async fn last_successful_ingest(
        &self,
        intellectual_object_id: i64,
    ) -> Result<Option<WorkItem>> {
        let sql = format!(
            r#"
            SELECT {} FROM work_items
            WHERE intellectual_object_id = $1
              AND action = 'Ingest'
              AND status = 'Success'
              AND stage IN ('Record', 'Cleanup')
            ORDER BY date_processed DESC, id DESC
            LIMIT 1
            "#,
            WORK_ITEM_COLUMNS
        );
        let item = sqlx::query_as::<Postgres, WorkItem>(&sql)
            .bind(intellectual_object_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query last successful ingest")?;
        Ok(item)
    }

    #[tracing::instrument(skip(self))]
    async fn list_for_deletion_request(&self, deletion_request_id: i64) -> Result<Vec<WorkItem>> {
        let sql = format!(
            "SELECT {} FROM work_items WHERE deletion_request_id = $1 ORDER BY id",
            WORK_ITEM_COLUMNS
        );
        let items = sqlx::query_as::<Postgres, WorkItem>(&sql)
            .bind(deletion_request_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list work items for deletion request")?;
        Ok(items)
    }

    #[tracing::instrument(skip(self, item), fields(action = %item.action))]
    async fn insert(&self, item: &WorkItem) -> Result<WorkItem> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .context("Failed to acquire connection")?;
        insert_in(&mut conn, item).await
    }

    #[tracing::instrument(skip(self, item), fields(action = %item.action))]
    async fn insert_if_no_pending_work(
        &self,
        item: &WorkItem,
        scope: &PendingScope,
    ) -> Result<WorkItem> {
        let mut tx = TransactionGuard::begin(&self.pool).await?;
        tx.lock_objects(&[scope.intellectual_object_id]).await?;

        let pending = pending_ids_in(tx.conn()?, scope).await?;
        if !pending.is_empty() {
            tx.rollback().await?;
            tracing::warn!(
                intellectual_object_id = scope.intellectual_object_id,
                pending = ?pending,
                "Refusing new work item while other work is pending"
            );
            return Err(AppError::PendingWork(format!(
                "{} has pending work items {:?}",
                scope.bag_name, pending
            ))
            .into());
        }

        let saved = insert_in(tx.conn()?, item).await?;
        tx.commit().await?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self, item), fields(work_item_id = item.id))]
    async fn update(&self, item: &WorkItem) -> Result<WorkItem> {
        let sql = format!(
            r#"
            UPDATE work_items
            SET stage = $2,
                status = $3,
                note = $4,
                outcome = $5,
                retry = $6,
                node = $7,
                pid = $8,
                needs_admin_review = $9,
                queued_at = $10,
                date_processed = $11,
                stage_started_at = $12
            WHERE id = $1
            RETURNING {}
            "#,
            WORK_ITEM_COLUMNS
        );
        let saved = sqlx::query_as::<Postgres, WorkItem>(&sql)
            .bind(item.id)
            .bind(item.stage.to_string())
            .bind(item.status.to_string())
            .bind(&item.note)
            .bind(&item.outcome)
            .bind(item.retry)
            .bind(&item.node)
            .bind(item.pid)
            .bind(item.needs_admin_review)
            .bind(item.queued_at)
            .bind(item.date_processed)
            .bind(item.stage_started_at)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update work item")?
            .ok_or_else(|| AppError::NotFound(format!("Work item {} not found", item.id)))?;
        Ok(saved)
    }

    #[tracing::instrument(skip(self))]
    async fn mark_queued(&self, id: i64, queued_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE work_items SET queued_at = $2 WHERE id = $1")
            .bind(id)
            .bind(queued_at)
            .execute(&self.pool)
            .await
            .context("Failed to mark work item queued")?;
        Ok(())
    }
}
