// Database Models - row types for the three pipeline tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A persisted wildcard pattern
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WildcardRow {
    pub id: i64,
    /// Canonical suffix (no leading `*.`)
    pub pattern: String,
    pub program: String,
    pub created_at: DateTime<Utc>,
}

/// A validated discovery
///
/// One row per domain; re-discovery is suppressed by the unique constraint.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DiscoveredDomain {
    pub id: i64,
    pub domain: String,
    pub ip: String,
    pub program: String,
    pub discovered_at: DateTime<Utc>,
}

/// A transiently unresolvable domain awaiting retry
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct UnresolvableDomain {
    pub id: i64,
    pub domain: String,
    /// Suffix of the wildcard pattern the domain matched
    pub wildcard_ref: String,
    pub retry_count: i64,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload buffered by the retry queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvableInsert {
    pub domain: String,
    pub wildcard_ref: String,
}
