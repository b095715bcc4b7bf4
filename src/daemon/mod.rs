// Daemon - wires the components, handles signals, shuts down gracefully
//
// Startup order: database, wildcard index (initial fetch), dedup preload,
// stats, then the ingest client, worker pool and retry scheduler. The
// first SIGINT/SIGTERM stops ingestion and drains the workers up to the
// configured timeout; a second signal forces an immediate exit.

use crate::config::Config;
use crate::db::Database;
use crate::ingest::IngestClient;
use crate::notify::Notifier;
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::prober::Prober;
use crate::pipeline::queue::{IngestQueue, OverflowPolicy};
use crate::pipeline::resolver::Resolver;
use crate::pipeline::validate::Validator;
use crate::pipeline::worker::WorkerPool;
use crate::retry::RetryQueue;
use crate::stats::StatsTracker;
use crate::wildcards::{WildcardIndex, WildcardPattern, WildcardRefresher, WildcardTrie};
use crate::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Console stats report period
const CONSOLE_REPORT_EVERY: Duration = Duration::from_secs(600);
/// Dedup preload bound
const DEDUP_PRELOAD_LIMIT: i64 = 100_000;

/// How the run ended; main maps this to an exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Graceful shutdown after SIGTERM
    Clean,
    /// Graceful shutdown after SIGINT (conventional 130)
    Interrupted,
    /// Second signal forced the exit
    Forced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Int,
    Term,
}

pub struct Daemon {
    config: Config,
}

impl Daemon {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        let config = &self.config;

        let db = Arc::new(
            Database::open(&config.database.path, config.concurrency.max as u32).await?,
        );
        info!("Database ready at {}", config.database.path);

        let stats = StatsTracker::new();
        let index = Arc::new(WildcardIndex::new());

        let refresher = Arc::new(WildcardRefresher::new(
            config.apis.clone(),
            Duration::from_secs(config.wildcards_update_interval),
            Arc::clone(&index),
            Arc::clone(&db),
            stats.clone(),
        ));

        self.initial_wildcard_load(&refresher, &index, &db, &stats)
            .await;

        let dedup = Arc::new(Deduplicator::new(config.concurrency.dedup_max));
        match db.domains().recent(DEDUP_PRELOAD_LIMIT).await {
            Ok(recent) => {
                let count = recent.len();
                dedup.preload(recent);
                if count > 0 {
                    info!("Deduplicator preloaded with {} recent discoveries", count);
                }
            }
            Err(e) => warn!("Dedup preload failed: {}", e),
        }

        let resolver = Arc::new(Resolver::new(
            Duration::from_secs(config.dns.timeout),
            config.dns.lookup_ipv6,
            config.dns.cache_size,
        ));
        let prober = Arc::new(Prober::new(&config.http)?);
        let notifier = Arc::new(Notifier::from_config(config));
        notifier.test_channels().await;

        let validator = Arc::new(Validator::new(
            Arc::clone(&resolver),
            Arc::clone(&prober),
            Arc::clone(&notifier),
            Arc::clone(&db),
            stats.clone(),
        ));

        let retry = Arc::new(RetryQueue::new(
            Arc::clone(&db),
            Arc::clone(&validator),
            Arc::clone(&index),
            Duration::from_secs(config.database.retry_interval),
            config.database.max_retries,
        ));

        let overflow = if config.certstream.block_on_full {
            OverflowPolicy::Block
        } else {
            OverflowPolicy::DropNewest
        };
        let (queue, receiver) =
            IngestQueue::new(config.concurrency.queue_max, overflow, stats.clone());

        let pool = Arc::new(WorkerPool::new(
            Arc::clone(&index),
            Arc::clone(&dedup),
            Arc::clone(&validator),
            Arc::clone(&retry),
            stats.clone(),
            config.concurrency.min,
            config.concurrency.max,
            config.certstream.exclusions.clone(),
            config.certstream.keep_wildcard_names,
        ));

        let client = IngestClient::new(config.certstream.url.clone(), queue);

        // Background signal: stops refresher, retry scheduler and reporters
        let (background_tx, background_rx) = watch::channel(false);
        // Ingest signal: stops the stream reader, closing the queue
        let (ingest_tx, ingest_rx) = watch::channel(false);
        // Force signal: abandons in-flight work past the drain deadline
        let (force_tx, force_rx) = watch::channel(false);

        let refresher_task = {
            let refresher = Arc::clone(&refresher);
            let rx = background_rx.clone();
            tokio::spawn(async move { refresher.run(rx).await })
        };

        let retry_task = {
            let retry = Arc::clone(&retry);
            let rx = background_rx.clone();
            tokio::spawn(async move { retry.run(rx).await })
        };

        let reporter_task = self.spawn_reporters(
            stats.clone(),
            Arc::clone(&notifier),
            background_rx.clone(),
        );

        let mut pool_task = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.run(receiver, force_rx).await })
        };

        let client_task = tokio::spawn(async move { client.run(ingest_rx).await });

        notifier
            .notify_log(
                "CertHound started",
                &format!("Watching {} wildcard pattern(s)", index.len()),
            )
            .await;
        info!("Pipeline running; press Ctrl-C to stop");

        // Wait for the first signal
        let first = wait_for_signal().await;
        info!("Received {:?}; beginning graceful shutdown", first);
        notifier
            .notify_log("CertHound stopping", "Draining the worker pool")
            .await;

        // Stop ingestion; the dropped queue sender lets the pool drain
        let _ = ingest_tx.send(true);
        let _ = client_task.await;

        let drain = Duration::from_secs(config.shutdown.timeout);
        let outcome = tokio::select! {
            result = tokio::time::timeout(drain, &mut pool_task) => {
                if result.is_err() {
                    warn!(
                        "Worker pool did not drain within {}s; abandoning in-flight jobs",
                        config.shutdown.timeout
                    );
                    let _ = force_tx.send(true);
                    let _ = pool_task.await;
                }
                match first {
                    Signal::Int => RunOutcome::Interrupted,
                    Signal::Term => RunOutcome::Clean,
                }
            }
            _ = wait_for_signal() => {
                warn!("Second signal received; forcing exit");
                RunOutcome::Forced
            }
        };

        if outcome == RunOutcome::Forced {
            return Ok(outcome);
        }

        // Stop the background loops; the retry queue flushes its buffer
        let _ = background_tx.send(true);
        let _ = retry_task.await;
        let _ = refresher_task.await;
        reporter_task.abort();

        // Final report
        stats.print_report();
        notifier.notify_stats(&stats.snapshot()).await;
        notifier.notify_log("CertHound stopped", "Shutdown complete").await;

        db.close().await;
        info!("Shutdown complete");

        Ok(outcome)
    }

    /// Initial wildcard load: fetch, fall back to the persisted set
    ///
    /// A failing first fetch is survivable when a previous run left
    /// patterns in the database; with neither, the daemon starts with an
    /// empty scope and relies on the periodic refresh.
    async fn initial_wildcard_load(
        &self,
        refresher: &WildcardRefresher,
        index: &WildcardIndex,
        db: &Database,
        stats: &StatsTracker,
    ) {
        match refresher.refresh_once().await {
            Ok(count) if count > 0 => return,
            Ok(_) => {}
            Err(e) => error!("Initial wildcard fetch failed: {}", e),
        }

        if !index.is_empty() {
            return;
        }

        match db.wildcards().all().await {
            Ok(rows) if !rows.is_empty() => {
                let patterns: Vec<WildcardPattern> = rows
                    .into_iter()
                    .map(|row| WildcardPattern::new(row.pattern, "database", row.program))
                    .collect();
                let count = patterns.len();
                index.swap(WildcardTrie::build(patterns));
                stats.set_wildcard_count(count);
                warn!(
                    "Sources unavailable; loaded {} wildcard(s) from the database",
                    count
                );
            }
            Ok(_) => {
                warn!("Starting with an empty wildcard scope; nothing will match until a refresh succeeds");
            }
            Err(e) => {
                error!("Failed to load persisted wildcards: {}", e);
            }
        }
    }

    /// Console and webhook stats reporters
    fn spawn_reporters(
        &self,
        stats: StatsTracker,
        notifier: Arc<Notifier>,
        mut shutdown: watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        let webhook_every = Duration::from_secs(self.config.discord.stats_interval.max(1));

        tokio::spawn(async move {
            let mut console_tick = tokio::time::interval(CONSOLE_REPORT_EVERY);
            let mut webhook_tick = tokio::time::interval(webhook_every);
            // Skip the immediate first firing of both timers
            console_tick.tick().await;
            webhook_tick.tick().await;

            loop {
                tokio::select! {
                    _ = console_tick.tick() => {
                        stats.print_report();
                    }
                    _ = webhook_tick.tick() => {
                        notifier.notify_stats(&stats.snapshot()).await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            return;
                        }
                    }
                }
            }
        })
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> Signal {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return Signal::Int;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to install SIGINT handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
            return Signal::Int;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => Signal::Term,
        _ = sigint.recv() => Signal::Int,
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> Signal {
    let _ = tokio::signal::ctrl_c().await;
    Signal::Int
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_equality() {
        assert_eq!(RunOutcome::Clean, RunOutcome::Clean);
        assert_ne!(RunOutcome::Clean, RunOutcome::Forced);
    }

    #[tokio::test]
    async fn test_daemon_construction() {
        let daemon = Daemon::new(Config::default());
        assert_eq!(daemon.config.concurrency.min, 10);
    }
}
