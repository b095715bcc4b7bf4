// Worker Pool - bounded-concurrency dispatch over the ingest queue
//
// The dispatcher runs the cheap stages inline (normalize, static exclude,
// self-wildcard drop, trie match, dedup admit) and spawns the expensive
// stages into tasks bounded by a scalable semaphore.

use crate::error::ResolveErrorKind;
use crate::pipeline::dedup::Deduplicator;
use crate::pipeline::job::{JobStage, PipelineJob};
use crate::pipeline::queue::IngestReceiver;
use crate::pipeline::validate::{Validator, Verdict};
use crate::retry::RetryQueue;
use crate::stats::StatsTracker;
use crate::wildcards::WildcardIndex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Queue depth that triggers scale-up when sustained
const SCALE_UP_DEPTH: usize = 20_000;
/// Queue depth below which the pool returns to minimum when sustained
const SCALE_DOWN_DEPTH: usize = 10_000;
/// How long a depth condition must hold before acting
const SUSTAIN_FOR: Duration = Duration::from_secs(60);
/// Depth sampling period
const SAMPLE_EVERY: Duration = Duration::from_secs(5);

/// Scalable concurrency limit shared by dispatcher and autoscaler
struct WorkerLimit {
    semaphore: Arc<Semaphore>,
    current: AtomicUsize,
    min: usize,
    max: usize,
}

impl WorkerLimit {
    fn new(min: usize, max: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(min)),
            current: AtomicUsize::new(min),
            min,
            max,
        }
    }

    fn current(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// Grow by 1.5x, capped at max; returns the new size when it changed
    fn scale_up(&self) -> Option<usize> {
        let current = self.current();
        let target = ((current * 3).div_ceil(2)).min(self.max);
        if target <= current {
            return None;
        }

        self.semaphore.add_permits(target - current);
        self.current.store(target, Ordering::Relaxed);
        Some(target)
    }

    /// Shrink back to the minimum; permits are reclaimed as workers finish
    async fn scale_down(&self) -> Option<usize> {
        let current = self.current();
        if current <= self.min {
            return None;
        }

        let excess = (current - self.min) as u32;
        match self.semaphore.acquire_many(excess).await {
            Ok(permits) => permits.forget(),
            Err(_) => return None,
        }
        self.current.store(self.min, Ordering::Relaxed);
        Some(self.min)
    }
}

/// Static filters applied before the expensive stages
pub struct WorkerPool {
    index: Arc<WildcardIndex>,
    dedup: Arc<Deduplicator>,
    validator: Arc<Validator>,
    retry: Arc<RetryQueue>,
    stats: StatsTracker,
    limit: Arc<WorkerLimit>,
    exclusions: Vec<String>,
    keep_wildcard_names: bool,
}

impl WorkerPool {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        index: Arc<WildcardIndex>,
        dedup: Arc<Deduplicator>,
        validator: Arc<Validator>,
        retry: Arc<RetryQueue>,
        stats: StatsTracker,
        min_workers: usize,
        max_workers: usize,
        exclusions: Vec<String>,
        keep_wildcard_names: bool,
    ) -> Self {
        let limit = Arc::new(WorkerLimit::new(min_workers.max(1), max_workers.max(1)));
        stats.set_worker_count(limit.current());

        Self {
            index,
            dedup,
            validator,
            retry,
            stats,
            limit,
            exclusions,
            keep_wildcard_names,
        }
    }

    /// Consume the ingest queue until it closes or the force signal fires
    ///
    /// In-flight validation tasks are always awaited before returning; the
    /// daemon bounds the whole call with the shutdown timeout.
    pub async fn run(&self, mut receiver: IngestReceiver, mut force_stop: watch::Receiver<bool>) {
        let mut tasks: JoinSet<()> = JoinSet::new();
        let scaler = self.spawn_autoscaler(receiver.depth_handle());

        loop {
            // Reap finished tasks so the set stays small
            while tasks.try_join_next().is_some() {}

            tokio::select! {
                maybe = receiver.recv() => {
                    match maybe {
                        Some(raw) => self.dispatch(raw, &mut tasks).await,
                        None => {
                            debug!("Ingest queue closed; draining workers");
                            break;
                        }
                    }
                }
                _ = force_stop.changed() => {
                    if *force_stop.borrow() {
                        warn!("Worker pool force-stopped with {} name(s) queued", receiver.depth());
                        break;
                    }
                }
            }
        }

        // A force-stop abandons in-flight validations; a natural drain
        // waits for them
        if *force_stop.borrow() {
            tasks.abort_all();
        }
        while tasks.join_next().await.is_some() {}
        scaler.abort();
        info!("Worker pool drained");
    }

    /// Cheap stages; hands matched jobs to a bounded validation task
    async fn dispatch(&self, raw: String, tasks: &mut JoinSet<()>) {
        self.stats.incr_total_processed();

        let mut job = PipelineJob::new(raw);
        if job.cleaned_name.is_empty() {
            return;
        }

        if self
            .exclusions
            .iter()
            .any(|suffix| job.cleaned_name.ends_with(suffix.as_str()))
        {
            return;
        }

        // The suffix alone is rarely interesting; config may flip this
        if job.was_wildcard() && !self.keep_wildcard_names {
            return;
        }

        let Some(pattern) = self.index.match_host(&job.cleaned_name) else {
            return;
        };
        job.matched = Some(pattern);
        job.stage = JobStage::Matched;
        self.stats.incr_matched();

        if !self.dedup.admit(&job.cleaned_name) {
            self.stats.incr_dedup_hit();
            return;
        }
        job.stage = JobStage::Admitted;

        let permit = match self.limit.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        let validator = Arc::clone(&self.validator);
        let retry = Arc::clone(&self.retry);

        tasks.spawn(async move {
            let _permit = permit;

            let verdict = validator.validate(&mut job, true).await;

            if let Verdict::Failed(kind) = verdict {
                if kind.is_transient() {
                    let suffix = job
                        .matched
                        .as_ref()
                        .map(|m| m.suffix.clone())
                        .unwrap_or_default();
                    retry.enqueue(&job.cleaned_name, &suffix).await;
                } else if kind == ResolveErrorKind::NxDomain {
                    debug!("{} is NXDOMAIN; dropped", job.cleaned_name);
                }
            }
        });
    }

    /// Periodic depth sampling driving the 1.5x scale policy and gauges
    fn spawn_autoscaler(&self, depth: Arc<AtomicUsize>) -> tokio::task::JoinHandle<()> {
        let limit = Arc::clone(&self.limit);
        let stats = self.stats.clone();
        let dedup = Arc::clone(&self.dedup);

        tokio::spawn(async move {
            let mut above_since: Option<Instant> = None;
            let mut below_since: Option<Instant> = None;
            let mut tick = tokio::time::interval(SAMPLE_EVERY);

            loop {
                tick.tick().await;

                let current_depth = depth.load(Ordering::Relaxed);
                stats.set_queue_size(current_depth);
                stats.set_dedup_size(dedup.len());
                stats.set_worker_count(limit.current());

                if current_depth > SCALE_UP_DEPTH {
                    below_since = None;
                    let since = *above_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= SUSTAIN_FOR {
                        if let Some(target) = limit.scale_up() {
                            info!(
                                "Queue depth {} sustained; scaling workers to {}",
                                current_depth, target
                            );
                            stats.set_worker_count(target);
                        }
                        above_since = Some(Instant::now());
                    }
                } else if current_depth < SCALE_DOWN_DEPTH {
                    above_since = None;
                    let since = *below_since.get_or_insert_with(Instant::now);
                    if since.elapsed() >= SUSTAIN_FOR {
                        if let Some(target) = limit.scale_down().await {
                            info!("Queue pressure gone; scaling workers to {}", target);
                            stats.set_worker_count(target);
                        }
                        below_since = Some(Instant::now());
                    }
                } else {
                    above_since = None;
                    below_since = None;
                }
            }
        })
    }

    /// Current worker ceiling
    pub fn worker_count(&self) -> usize {
        self.limit.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_up_steps() {
        let limit = WorkerLimit::new(10, 50);
        assert_eq!(limit.current(), 10);

        assert_eq!(limit.scale_up(), Some(15));
        assert_eq!(limit.scale_up(), Some(23));
        assert_eq!(limit.scale_up(), Some(35));
        assert_eq!(limit.scale_up(), Some(50));
        // Capped
        assert_eq!(limit.scale_up(), None);
        assert_eq!(limit.current(), 50);
    }

    #[tokio::test]
    async fn test_scale_down_returns_to_min() {
        let limit = WorkerLimit::new(10, 50);
        limit.scale_up();
        limit.scale_up();
        assert_eq!(limit.current(), 23);

        assert_eq!(limit.scale_down().await, Some(10));
        assert_eq!(limit.current(), 10);
        // Already at the floor
        assert_eq!(limit.scale_down().await, None);
        assert_eq!(limit.semaphore.available_permits(), 10);
    }

    #[test]
    fn test_min_is_at_least_one() {
        let limit = WorkerLimit::new(1, 1);
        assert_eq!(limit.current(), 1);
        assert_eq!(limit.scale_up(), None);
    }
}
