// Unresolvable Repository - unresolvable_domains table
//
// Rows are created by the retry queue's batch flush and consumed by its
// periodic sweep; nothing else writes this table.

use crate::db::models::{UnresolvableDomain, UnresolvableInsert};
use crate::PipelineError;
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct UnresolvableRepository {
    pool: SqlitePool,
}

impl UnresolvableRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a batch inside one transaction; existing domains are left alone
    pub async fn insert_batch(&self, batch: &[UnresolvableInsert]) -> Result<u64> {
        if batch.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to open tx: {}", e)))?;

        let now = Utc::now();
        let mut inserted = 0u64;

        for item in batch {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO unresolvable_domains \
                 (domain, wildcard_ref, retry_count, last_retry_at, created_at) \
                 VALUES (?, ?, 0, NULL, ?)",
            )
            .bind(&item.domain)
            .bind(&item.wildcard_ref)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                PipelineError::DatabaseError(format!("Failed to insert unresolvable: {}", e))
            })?;

            inserted += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to commit: {}", e)))?;

        Ok(inserted)
    }

    /// Delete rows older than `days`, regardless of retry outcome
    pub async fn purge_older_than(&self, days: i64) -> Result<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - Duration::days(days);

        let result = sqlx::query("DELETE FROM unresolvable_domains WHERE created_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to purge: {}", e)))?;

        Ok(result.rows_affected())
    }

    /// Next rows to retry, least-retried first
    pub async fn next_batch(&self, limit: i64) -> Result<Vec<UnresolvableDomain>> {
        let rows = sqlx::query_as::<_, UnresolvableDomain>(
            "SELECT id, domain, wildcard_ref, retry_count, last_retry_at, created_at \
             FROM unresolvable_domains ORDER BY retry_count ASC, id ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::DatabaseError(format!("Failed to fetch batch: {}", e)))?;

        Ok(rows)
    }

    pub async fn delete(&self, domain: &str) -> Result<()> {
        sqlx::query("DELETE FROM unresolvable_domains WHERE domain = ?")
            .bind(domain)
            .execute(&self.pool)
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to delete: {}", e)))?;

        Ok(())
    }

    /// Record a failed retry attempt
    pub async fn bump_retry(&self, domain: &str) -> Result<()> {
        sqlx::query(
            "UPDATE unresolvable_domains SET retry_count = retry_count + 1, last_retry_at = ? \
             WHERE domain = ?",
        )
        .bind(Utc::now())
        .bind(domain)
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::DatabaseError(format!("Failed to bump retry: {}", e)))?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM unresolvable_domains")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to count: {}", e)))?;

        Ok(row.0)
    }
}
