use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres};

use registry_core::models::{GenericFile, Institution, IntellectualObject, User};

use crate::traits::CatalogStore;

/// Read-only access to institutions, users, objects and files.
#[derive(Clone)]
pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    #[tracing::instrument(skip(self))]
    async fn get_user(&self, id: i64) -> Result<Option<User>> {
        sqlx::query_as::<Postgres, User>(
            "SELECT id, name, email, institution_id, role, deactivated_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")
    }

    #[tracing::instrument(skip(self))]
    async fn get_institution(&self, id: i64) -> Result<Option<Institution>> {
        sqlx::query_as::<Postgres, Institution>(
            "SELECT id, name, identifier, state FROM institutions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch institution")
    }

    #[tracing::instrument(skip(self))]
    async fn get_object(&self, id: i64) -> Result<Option<IntellectualObject>> {
        sqlx::query_as::<Postgres, IntellectualObject>(
            r#"
            SELECT id, institution_id, identifier, bag_name, title, state, storage_option, size
            FROM intellectual_objects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch intellectual object")
    }

    #[tracing::instrument(skip(self))]
    async fn get_objects(&self, ids: &[i64]) -> Result<Vec<IntellectualObject>> {
        sqlx::query_as::<Postgres, IntellectualObject>(
            r#"
            SELECT id, institution_id, identifier, bag_name, title, state, storage_option, size
            FROM intellectual_objects
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch intellectual objects")
    }

    #[tracing::instrument(skip(self))]
    async fn get_file(&self, id: i64) -> Result<Option<GenericFile>> {
        sqlx::query_as::<Postgres, GenericFile>(
            r#"
            SELECT id, institution_id, intellectual_object_id, identifier, size, state, storage_option
            FROM generic_files
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch generic file")
    }

    #[tracing::instrument(skip(self))]
    async fn get_files(&self, ids: &[i64]) -> Result<Vec<GenericFile>> {
        sqlx::query_as::<Postgres, GenericFile>(
            r#"
            SELECT id, institution_id, intellectual_object_id, identifier, size, state, storage_option
            FROM generic_files
            WHERE id = ANY($1)
            ORDER BY id
            "#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch generic files")
    }

    #[tracing::instrument(skip(self))]
    async fn institution_admins(&self, institution_id: i64) -> Result<Vec<User>> {
        sqlx::query_as::<Postgres, User>(
            r#"
            SELECT id, name, email, institution_id, role, deactivated_at
            FROM users
            WHERE institution_id = $1
              AND role = 'institutional_admin'
              AND deactivated_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(institution_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load institutional admins")
    }
}
