// Wildcard Refresher - periodic multi-source fetch, merge and swap
//
// Polls every enabled source API, extracts "*.suffix" values, builds a
// fresh trie and swaps it into the shared index. A failing source is
// skipped; the previous trie survives until a swap happens.

use crate::config::ApiSourceConfig;
use crate::db::Database;
use crate::error::PipelineError;
use crate::stats::StatsTracker;
use crate::wildcards::extractor::extract_wildcards;
use crate::wildcards::index::{WildcardIndex, WildcardPattern, WildcardTrie};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Periodic wildcard refresh loop
pub struct WildcardRefresher {
    sources: Vec<ApiSourceConfig>,
    interval: Duration,
    client: reqwest::Client,
    index: Arc<WildcardIndex>,
    db: Arc<Database>,
    stats: StatsTracker,
}

impl WildcardRefresher {
    pub fn new(
        sources: Vec<ApiSourceConfig>,
        interval: Duration,
        index: Arc<WildcardIndex>,
        db: Arc<Database>,
        stats: StatsTracker,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            sources,
            interval,
            client,
            index,
            db,
            stats,
        }
    }

    /// Fetch all enabled sources, rebuild and swap the trie
    ///
    /// Returns the number of patterns in the new trie. A per-source failure
    /// is logged and skipped; only a wholesale failure is an error.
    pub async fn refresh_once(&self) -> Result<usize> {
        let mut patterns: Vec<WildcardPattern> = Vec::new();

        for source in self.sources.iter().filter(|s| s.enabled) {
            match self.fetch_source(source).await {
                Ok(mut fetched) => {
                    debug!(
                        "Source '{}' contributed {} wildcard(s)",
                        source.name,
                        fetched.len()
                    );
                    patterns.append(&mut fetched);
                }
                Err(e) => {
                    warn!("Skipping wildcard source '{}': {}", source.name, e);
                }
            }
        }

        let trie = WildcardTrie::build(patterns);
        let count = trie.len();

        if count == 0 {
            // Swap anyway (the sources are the truth), but keep the
            // persisted set so a restart can fall back to it
            warn!("Wildcard refresh produced an empty trie; swapping anyway");
        } else if let Err(e) = self.db.wildcards().replace_all(trie.patterns()).await {
            // The in-memory index is the working set; persistence is bookkeeping
            error!("Failed to persist wildcard set: {}", e);
        }

        self.index.swap(trie);
        self.stats.set_wildcard_count(count);

        info!("Wildcard index refreshed: {} pattern(s)", count);
        Ok(count)
    }

    /// Fetch one source and extract its wildcard patterns
    async fn fetch_source(&self, source: &ApiSourceConfig) -> Result<Vec<WildcardPattern>> {
        let mut request = self.client.get(&source.url);
        for (key, value) in &source.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::SourceFetchError {
                source_name: source.name.clone(),
                details: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PipelineError::SourceFetchError {
                source_name: source.name.clone(),
                details: format!("status {}", response.status()),
            });
        }

        let document: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| PipelineError::SourceFetchError {
                    source_name: source.name.clone(),
                    details: format!("invalid JSON: {}", e),
                })?;

        let patterns = extract_wildcards(&document)
            .into_iter()
            .map(|w| {
                let program = w.program.unwrap_or_else(|| source.name.clone());
                WildcardPattern::new(w.suffix, source.name.clone(), program)
            })
            .collect();

        Ok(patterns)
    }

    /// Refresh loop: runs until the shutdown signal fires
    ///
    /// The initial fetch is the daemon's responsibility (it needs to block
    /// on it); this loop only handles the periodic follow-ups. Cycle
    /// failures are logged and the loop continues.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut tick = tokio::time::interval(self.interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick fires immediately; the initial fetch already ran
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.refresh_once().await {
                        error!("Wildcard refresh cycle failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        debug!("Wildcard refresher stopping");
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn test_refresher(sources: Vec<ApiSourceConfig>) -> WildcardRefresher {
        let db = Arc::new(Database::in_memory().await.unwrap());
        WildcardRefresher::new(
            sources,
            Duration::from_secs(86_400),
            Arc::new(WildcardIndex::new()),
            db,
            StatsTracker::new(),
        )
    }

    #[tokio::test]
    async fn test_refresh_with_no_sources_swaps_empty() {
        let refresher = test_refresher(Vec::new()).await;
        let count = refresher.refresh_once().await.unwrap();
        assert_eq!(count, 0);
        assert!(refresher.index.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_source_is_skipped() {
        let sources = vec![ApiSourceConfig {
            name: "dead".to_string(),
            // Closed local port; the request fails fast with refused
            url: "http://127.0.0.1:9/scopes".to_string(),
            headers: Default::default(),
            enabled: true,
        }];

        let refresher = test_refresher(sources).await;
        // A failing source is not an error for the cycle
        let count = refresher.refresh_once().await.unwrap();
        assert_eq!(count, 0);
    }
}
