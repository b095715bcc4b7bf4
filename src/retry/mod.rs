// Retry Queue - persistent store of transiently unresolvable names
//
// Worker insertions are buffered in memory and flushed in batches; a
// jittered periodic sweep re-runs the oldest rows through the same
// validation path the workers use.

use crate::db::models::UnresolvableInsert;
use crate::db::Database;
use crate::pipeline::job::PipelineJob;
use crate::pipeline::validate::{Validator, Verdict};
use crate::wildcards::{WildcardIndex, WildcardPattern};
use rand::Rng;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Buffered inserts before a forced flush
const BUFFER_FLUSH_AT: usize = 100;
/// Timer-driven flush period
const BUFFER_FLUSH_EVERY: Duration = Duration::from_secs(10);
/// Rows older than this are purged before retry selection
const PURGE_AGE_DAYS: i64 = 3;
/// Rows retried per sweep
const SWEEP_LIMIT: i64 = 1_000;

pub struct RetryQueue {
    buffer: Mutex<Vec<UnresolvableInsert>>,
    db: Arc<Database>,
    validator: Arc<Validator>,
    index: Arc<WildcardIndex>,
    sweep_interval: Duration,
    max_retries: i64,
}

impl RetryQueue {
    pub fn new(
        db: Arc<Database>,
        validator: Arc<Validator>,
        index: Arc<WildcardIndex>,
        sweep_interval: Duration,
        max_retries: i64,
    ) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            db,
            validator,
            index,
            sweep_interval,
            max_retries,
        }
    }

    /// Buffer an unresolvable name; flushes when the threshold is hit
    pub async fn enqueue(&self, domain: &str, wildcard_ref: &str) {
        let should_flush = {
            let mut buffer = match self.buffer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            buffer.push(UnresolvableInsert {
                domain: domain.to_string(),
                wildcard_ref: wildcard_ref.to_string(),
            });
            buffer.len() >= BUFFER_FLUSH_AT
        };

        if should_flush {
            self.flush().await;
        }
    }

    /// Write the buffered batch; copies out under the lock, writes outside
    pub async fn flush(&self) {
        let batch = {
            let mut buffer = match self.buffer.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *buffer)
        };

        if batch.is_empty() {
            return;
        }

        match self.db.unresolvables().insert_batch(&batch).await {
            Ok(inserted) => {
                debug!(
                    "Flushed {} unresolvable name(s) ({} new)",
                    batch.len(),
                    inserted
                );
            }
            Err(e) => error!("Failed to flush unresolvable batch: {}", e),
        }
    }

    /// Number of buffered, not yet flushed inserts
    pub fn buffered(&self) -> usize {
        match self.buffer.lock() {
            Ok(buffer) => buffer.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// One retry sweep: purge, select, re-validate
    pub async fn sweep(&self) {
        match self.db.unresolvables().purge_older_than(PURGE_AGE_DAYS).await {
            Ok(0) => {}
            Ok(purged) => info!("Purged {} stale unresolvable row(s)", purged),
            Err(e) => error!("Unresolvable purge failed: {}", e),
        }

        let rows = match self.db.unresolvables().next_batch(SWEEP_LIMIT).await {
            Ok(rows) => rows,
            Err(e) => {
                error!("Failed to select retry batch: {}", e);
                return;
            }
        };

        if rows.is_empty() {
            return;
        }

        info!("Retrying {} unresolvable name(s)", rows.len());

        for row in rows {
            if row.retry_count > self.max_retries {
                debug!(
                    "{} exhausted {} retries; abandoning",
                    row.domain, row.retry_count
                );
                if let Err(e) = self.db.unresolvables().delete(&row.domain).await {
                    error!("Failed to delete {}: {}", row.domain, e);
                }
                continue;
            }

            // Prefer the live pattern; fall back to the stored reference if
            // the scope disappeared between sweeps
            let pattern = self
                .index
                .match_host(&row.domain)
                .unwrap_or_else(|| {
                    WildcardPattern::new(
                        row.wildcard_ref.clone(),
                        "retry",
                        row.wildcard_ref.clone(),
                    )
                });

            let mut job = PipelineJob::new(row.domain.clone());
            job.matched = Some(pattern);

            match self.validator.validate(&mut job, false).await {
                Verdict::Discovered { ip, .. } => {
                    debug!("Retry resolved {} -> {}", row.domain, ip);
                    if let Err(e) = self.db.unresolvables().delete(&row.domain).await {
                        error!("Failed to delete resolved {}: {}", row.domain, e);
                    }
                }
                Verdict::PrivateIp => {
                    if let Err(e) = self.db.unresolvables().delete(&row.domain).await {
                        error!("Failed to delete private {}: {}", row.domain, e);
                    }
                }
                Verdict::AlreadyKnown => {
                    if let Err(e) = self.db.unresolvables().delete(&row.domain).await {
                        error!("Failed to delete known {}: {}", row.domain, e);
                    }
                }
                Verdict::Failed(kind) => {
                    debug!("Retry of {} failed again: {:?}", row.domain, kind);
                    if let Err(e) = self.db.unresolvables().bump_retry(&row.domain).await {
                        error!("Failed to bump retry for {}: {}", row.domain, e);
                    }
                }
            }
        }
    }

    /// Flush timer + jittered sweep loop, until shutdown
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut flush_tick = tokio::time::interval(BUFFER_FLUSH_EVERY);
        flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut next_sweep = tokio::time::Instant::now() + self.jittered_interval();

        loop {
            tokio::select! {
                _ = flush_tick.tick() => {
                    self.flush().await;
                }
                _ = tokio::time::sleep_until(next_sweep) => {
                    self.sweep().await;
                    next_sweep = tokio::time::Instant::now() + self.jittered_interval();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        self.flush().await;
                        warn!("Retry queue stopping; buffer flushed");
                        return;
                    }
                }
            }
        }
    }

    /// Sweep interval with +-10% jitter to avoid thundering herds
    fn jittered_interval(&self) -> Duration {
        let base = self.sweep_interval.as_secs() as i64;
        if base == 0 {
            return Duration::from_secs(1);
        }

        let jitter_range = base / 10;
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0
        };

        Duration::from_secs((base + jitter).max(1) as u64)
    }
}
