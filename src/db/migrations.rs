// Database Migrations - embedded schema, applied at startup

use crate::PipelineError;
use crate::Result;
use sqlx::SqlitePool;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS wildcards (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        pattern TEXT NOT NULL UNIQUE,
        program TEXT NOT NULL,
        created_at TIMESTAMP NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_wildcards_pattern ON wildcards(pattern)",
    r#"
    CREATE TABLE IF NOT EXISTS discovered_domains (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL UNIQUE,
        ip TEXT NOT NULL,
        program TEXT NOT NULL,
        discovered_at TIMESTAMP NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_discovered_domains_domain ON discovered_domains(domain)",
    r#"
    CREATE TABLE IF NOT EXISTS unresolvable_domains (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain TEXT NOT NULL UNIQUE,
        wildcard_ref TEXT NOT NULL,
        retry_count INTEGER NOT NULL DEFAULT 0,
        last_retry_at TIMESTAMP,
        created_at TIMESTAMP NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_unresolvable_domains_domain ON unresolvable_domains(domain)",
    "CREATE INDEX IF NOT EXISTS idx_unresolvable_domains_retry_count ON unresolvable_domains(retry_count)",
    "CREATE INDEX IF NOT EXISTS idx_unresolvable_domains_created_at ON unresolvable_domains(created_at)",
];

/// Apply the schema; every statement is idempotent
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| PipelineError::DatabaseError(format!("Migration failed: {}", e)))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::connect;

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let pool = connect(":memory:", 1).await.unwrap();
        run_migrations(&pool).await.unwrap();
        run_migrations(&pool).await.unwrap();

        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(count.0 >= 3);
        pool.close().await;
    }
}
