//! Transaction helper for guarded check-and-insert operations
//!
//! Pending-work checks and the inserts they protect must run in one
//! transaction while the target object rows are locked.

use anyhow::{Context, Result};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// Owns an open transaction until it is committed or rolled back.
///
/// ```ignore
/// let mut tx = TransactionGuard::begin(&pool).await?;
/// tx.lock_objects(&[object_id]).await?;
/// sqlx::query("INSERT INTO ...").execute(tx.conn()?).await?;
/// tx.commit().await?;
/// ```
pub struct TransactionGuard<'a> {
    transaction: Option<Transaction<'a, Postgres>>,
}

impl<'a> TransactionGuard<'a> {
    pub async fn begin(pool: &'a PgPool) -> Result<Self> {
        let transaction = pool
            .begin()
            .await
            .context("Failed to begin database transaction")?;
        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Connection for running statements inside the transaction.
    pub fn conn(&mut self) -> Result<&mut PgConnection> {
        self.transaction
            .as_deref_mut()
            .context("Transaction was already committed or rolled back")
    }

    /// Takes row locks on the given intellectual objects, in id order so two
    /// guarded operations never deadlock on each other.
    pub async fn lock_objects(&mut self, object_ids: &[i64]) -> Result<()> {
        let mut ids = object_ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        sqlx::query("SELECT id FROM intellectual_objects WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&ids)
            .fetch_all(self.conn()?)
            .await
            .context("Failed to lock intellectual object rows")?;
        Ok(())
    }

    pub async fn commit(mut self) -> Result<()> {
        if let Some(tx) = self.transaction.take() {
            tx.commit()
                .await
                .context("Failed to commit database transaction")?;
        }
        Ok(())
    }

    pub async fn rollback(mut self) -> Result<()> {
        if let Some(tx) = self.transaction.take() {
            tx.rollback()
                .await
                .context("Failed to rollback database transaction")?;
        }
        Ok(())
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.transaction.is_some() {
            // sqlx rolls the transaction back when it is dropped.
            tracing::warn!("Transaction dropped without commit or rollback - rolling back");
        }
    }
}
