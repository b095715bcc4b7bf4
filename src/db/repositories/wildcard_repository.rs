// Wildcard Repository - persisted mirror of the refresher's pattern set

use crate::db::models::WildcardRow;
use crate::wildcards::WildcardPattern;
use crate::PipelineError;
use crate::Result;
use chrono::Utc;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct WildcardRepository {
    pool: SqlitePool,
}

impl WildcardRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Replace the whole stored pattern set in one transaction
    ///
    /// The in-memory trie is the working set; this table exists so a
    /// restart can report scope without waiting for the first refresh and
    /// so unresolvable rows have something to reference.
    pub async fn replace_all(&self, patterns: &[WildcardPattern]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to open tx: {}", e)))?;

        sqlx::query("DELETE FROM wildcards")
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                PipelineError::DatabaseError(format!("Failed to clear wildcards: {}", e))
            })?;

        let now = Utc::now();
        for pattern in patterns {
            sqlx::query(
                "INSERT OR IGNORE INTO wildcards (pattern, program, created_at) VALUES (?, ?, ?)",
            )
            .bind(&pattern.suffix)
            .bind(&pattern.program)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                PipelineError::DatabaseError(format!("Failed to insert wildcard: {}", e))
            })?;
        }

        tx.commit()
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to commit: {}", e)))?;

        Ok(())
    }

    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wildcards")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to count: {}", e)))?;

        Ok(row.0)
    }

    pub async fn all(&self) -> Result<Vec<WildcardRow>> {
        let rows = sqlx::query_as::<_, WildcardRow>(
            "SELECT id, pattern, program, created_at FROM wildcards ORDER BY pattern",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::DatabaseError(format!("Failed to fetch wildcards: {}", e)))?;

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[tokio::test]
    async fn test_replace_all_is_wholesale() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.wildcards();

        repo.replace_all(&[
            WildcardPattern::new("example.com", "src", "acme"),
            WildcardPattern::new("example.org", "src", "acme"),
        ])
        .await
        .unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);

        repo.replace_all(&[WildcardPattern::new("example.net", "src", "acme")])
            .await
            .unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);

        let rows = repo.all().await.unwrap();
        assert_eq!(rows[0].pattern, "example.net");
        assert_eq!(rows[0].program, "acme");
    }

    #[tokio::test]
    async fn test_duplicate_suffixes_collapse() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.wildcards();

        repo.replace_all(&[
            WildcardPattern::new("example.com", "a", "first"),
            WildcardPattern::new("example.com", "b", "second"),
        ])
        .await
        .unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
