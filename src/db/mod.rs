// Database Module - SQLite persistence for the pipeline

pub mod connection;
pub mod migrations;
pub mod models;
pub mod repositories;

pub use models::{DiscoveredDomain, UnresolvableDomain, UnresolvableInsert, WildcardRow};
pub use repositories::{DomainRepository, UnresolvableRepository, WildcardRepository};

use crate::Result;
use sqlx::SqlitePool;

/// Database facade holding the pool and per-table repositories
pub struct Database {
    pool: SqlitePool,
    wildcards: WildcardRepository,
    domains: DomainRepository,
    unresolvables: UnresolvableRepository,
}

impl Database {
    /// Open the database at `path`, creating it and its schema if missing
    ///
    /// `max_connections` should match the worker ceiling so persistence
    /// checks from concurrent validations do not serialize.
    pub async fn open(path: &str, max_connections: u32) -> Result<Self> {
        let pool = connection::connect(path, max_connections).await?;
        migrations::run_migrations(&pool).await?;

        Ok(Self {
            wildcards: WildcardRepository::new(pool.clone()),
            domains: DomainRepository::new(pool.clone()),
            unresolvables: UnresolvableRepository::new(pool.clone()),
            pool,
        })
    }

    /// In-memory database for tests
    pub async fn in_memory() -> Result<Self> {
        Self::open(":memory:", 1).await
    }

    pub fn wildcards(&self) -> &WildcardRepository {
        &self.wildcards
    }

    pub fn domains(&self) -> &DomainRepository {
        &self.domains
    }

    pub fn unresolvables(&self) -> &UnresolvableRepository {
        &self.unresolvables
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = Database::in_memory().await.unwrap();
        assert_eq!(db.domains().count().await.unwrap(), 0);
        assert_eq!(db.unresolvables().count().await.unwrap(), 0);
        db.close().await;
    }
}
