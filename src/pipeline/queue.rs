// Ingest Queue - bounded channel between the stream reader and the workers
//
// The queue has a hard cap; on overflow the configured policy either drops
// the newest name (default, counted and warn-logged) or blocks the reader.

use crate::stats::StatsTracker;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::warn;

/// What to do when a push hits the cap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Drop the incoming name, warn and count
    DropNewest,
    /// Apply backpressure to the ingest loop
    Block,
}

/// Producer half, held by the ingest client
pub struct IngestQueue {
    tx: mpsc::Sender<String>,
    depth: Arc<AtomicUsize>,
    policy: OverflowPolicy,
    stats: StatsTracker,
}

/// Consumer half, held by the worker pool dispatcher
pub struct IngestReceiver {
    rx: mpsc::Receiver<String>,
    depth: Arc<AtomicUsize>,
}

impl IngestQueue {
    pub fn new(
        capacity: usize,
        policy: OverflowPolicy,
        stats: StatsTracker,
    ) -> (Self, IngestReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let depth = Arc::new(AtomicUsize::new(0));

        let queue = Self {
            tx,
            depth: Arc::clone(&depth),
            policy,
            stats,
        };

        let receiver = IngestReceiver { rx, depth };

        (queue, receiver)
    }

    /// Push one name; returns false when it was dropped
    pub async fn push(&self, name: String) -> bool {
        match self.policy {
            OverflowPolicy::DropNewest => match self.tx.try_send(name) {
                Ok(()) => {
                    self.depth.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(mpsc::error::TrySendError::Full(name)) => {
                    warn!("Ingest queue full; dropping {}", name);
                    self.stats.incr_queue_dropped();
                    false
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            },
            OverflowPolicy::Block => match self.tx.send(name).await {
                Ok(()) => {
                    self.depth.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(_) => false,
            },
        }
    }

    /// Current number of queued names
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }
}

impl IngestReceiver {
    /// Pop the next name; None when every producer is gone
    pub async fn recv(&mut self) -> Option<String> {
        let name = self.rx.recv().await;
        if name.is_some() {
            self.depth.fetch_sub(1, Ordering::Relaxed);
        }
        name
    }

    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Shared depth gauge handle for the autoscaler
    pub fn depth_handle(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.depth)
    }
}
