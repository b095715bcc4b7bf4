// Domain Repository - discovered_domains table
//
// The unique constraint on domain is the ground truth for idempotency;
// the in-memory deduplicator only reduces load on this table.

use crate::db::models::DiscoveredDomain;
use crate::PipelineError;
use crate::Result;
use chrono::Utc;
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct DomainRepository {
    pool: SqlitePool,
}

impl DomainRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Whether the domain has already been discovered
    pub async fn exists(&self, domain: &str) -> Result<bool> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM discovered_domains WHERE domain = ?")
                .bind(domain)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    PipelineError::DatabaseError(format!("Failed to check domain: {}", e))
                })?;

        Ok(row.0 > 0)
    }

    /// Insert a discovery; returns false when the row already existed
    pub async fn insert(&self, domain: &str, ip: &str, program: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO discovered_domains (domain, ip, program, discovered_at) \
             VALUES (?, ?, ?, ?)",
        )
        .bind(domain)
        .bind(ip)
        .bind(program)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| PipelineError::DatabaseError(format!("Failed to insert domain: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Most recently discovered domain names, newest first
    ///
    /// Used to pre-populate the deduplicator on cold start.
    pub async fn recent(&self, limit: i64) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT domain FROM discovered_domains ORDER BY discovered_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PipelineError::DatabaseError(format!("Failed to fetch recent: {}", e)))?;

        Ok(rows.into_iter().map(|(domain,)| domain).collect())
    }

    pub async fn get(&self, domain: &str) -> Result<Option<DiscoveredDomain>> {
        let row = sqlx::query_as::<_, DiscoveredDomain>(
            "SELECT id, domain, ip, program, discovered_at FROM discovered_domains \
             WHERE domain = ?",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PipelineError::DatabaseError(format!("Failed to fetch domain: {}", e)))?;

        Ok(row)
    }

    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM discovered_domains")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Failed to count: {}", e)))?;

        Ok(row.0)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[tokio::test]
    async fn test_insert_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.domains();

        assert!(repo
            .insert("api.example.com", "93.184.216.34", "acme")
            .await
            .unwrap());
        // Second insert hits the unique constraint and reports not-inserted
        assert!(!repo
            .insert("api.example.com", "93.184.216.34", "acme")
            .await
            .unwrap());

        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exists_and_get() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.domains();

        assert!(!repo.exists("api.example.com").await.unwrap());
        repo.insert("api.example.com", "93.184.216.34", "acme")
            .await
            .unwrap();
        assert!(repo.exists("api.example.com").await.unwrap());

        let row = repo.get("api.example.com").await.unwrap().unwrap();
        assert_eq!(row.ip, "93.184.216.34");
        assert_eq!(row.program, "acme");
    }

    #[tokio::test]
    async fn test_recent_ordering_and_limit() {
        let db = Database::in_memory().await.unwrap();
        let repo = db.domains();

        for i in 0..5 {
            repo.insert(&format!("host{}.example.com", i), "1.2.3.4", "acme")
                .await
                .unwrap();
        }

        let recent = repo.recent(3).await.unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0], "host4.example.com");
    }
}
