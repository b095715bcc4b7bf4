// Pipeline Statistics - thread-safe counters, gauges and periodic reports

use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Counters and gauges for the whole pipeline
///
/// Counters are monotonic; gauges are overwritten. Readers get an
/// eventually consistent snapshot, which is all the reporters need.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stats {
    /// Names taken off the ingest stream
    pub total_processed: u64,
    /// Names that matched a wildcard pattern
    pub matched: u64,
    /// Names suppressed by the deduplicator
    pub dedup_hit: u64,
    /// Names dropped on ingest queue overflow
    pub queue_dropped: u64,
    pub dns_resolved: u64,
    pub dns_failed: u64,
    pub private_ip: u64,
    pub http_active: u64,
    pub http_timeout: u64,
    pub fingerprinter_sent: u64,
    pub fingerprinter_failed: u64,

    // Gauges
    pub queue_size: u64,
    pub worker_count: u64,
    pub dedup_size: u64,
    pub wildcard_count: u64,

    #[serde(skip)]
    pub start_time: Option<Instant>,
    pub uptime_secs: u64,
}

impl Stats {
    /// Fraction of processed names that matched a pattern
    pub fn match_rate(&self) -> f64 {
        if self.total_processed == 0 {
            return 0.0;
        }
        self.matched as f64 / self.total_processed as f64
    }

    /// Fraction of attempted resolutions that produced an IP
    pub fn resolve_rate(&self) -> f64 {
        let attempts = self.dns_resolved + self.dns_failed;
        if attempts == 0 {
            return 0.0;
        }
        self.dns_resolved as f64 / attempts as f64
    }

    /// Processed names per second of uptime
    pub fn domains_per_sec(&self) -> f64 {
        if self.uptime_secs == 0 {
            return 0.0;
        }
        self.total_processed as f64 / self.uptime_secs as f64
    }
}

/// Shared, thread-safe statistics tracker
pub struct StatsTracker {
    stats: Arc<Mutex<Stats>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        let stats = Stats {
            start_time: Some(Instant::now()),
            ..Default::default()
        };

        Self {
            stats: Arc::new(Mutex::new(stats)),
        }
    }

    fn update<F: FnOnce(&mut Stats)>(&self, f: F) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    pub fn incr_total_processed(&self) {
        self.update(|s| s.total_processed += 1);
    }

    pub fn incr_matched(&self) {
        self.update(|s| s.matched += 1);
    }

    pub fn incr_dedup_hit(&self) {
        self.update(|s| s.dedup_hit += 1);
    }

    pub fn incr_queue_dropped(&self) {
        self.update(|s| s.queue_dropped += 1);
    }

    pub fn incr_dns_resolved(&self) {
        self.update(|s| s.dns_resolved += 1);
    }

    pub fn incr_dns_failed(&self) {
        self.update(|s| s.dns_failed += 1);
    }

    pub fn incr_private_ip(&self) {
        self.update(|s| s.private_ip += 1);
    }

    pub fn incr_http_active(&self) {
        self.update(|s| s.http_active += 1);
    }

    pub fn incr_http_timeout(&self) {
        self.update(|s| s.http_timeout += 1);
    }

    pub fn incr_fingerprinter_sent(&self) {
        self.update(|s| s.fingerprinter_sent += 1);
    }

    pub fn incr_fingerprinter_failed(&self) {
        self.update(|s| s.fingerprinter_failed += 1);
    }

    pub fn set_queue_size(&self, size: usize) {
        self.update(|s| s.queue_size = size as u64);
    }

    pub fn set_worker_count(&self, count: usize) {
        self.update(|s| s.worker_count = count as u64);
    }

    pub fn set_dedup_size(&self, size: usize) {
        self.update(|s| s.dedup_size = size as u64);
    }

    pub fn set_wildcard_count(&self, count: usize) {
        self.update(|s| s.wildcard_count = count as u64);
    }

    /// Current snapshot with uptime filled in
    pub fn snapshot(&self) -> Stats {
        if let Ok(mut stats) = self.stats.lock() {
            if let Some(start) = stats.start_time {
                stats.uptime_secs = start.elapsed().as_secs();
            }
            stats.clone()
        } else {
            Stats::default()
        }
    }

    /// Print a console report block
    pub fn print_report(&self) {
        let s = self.snapshot();

        println!("\n{}", "=== CertHound Statistics ===".bold());
        println!("Uptime:              {} s", s.uptime_secs);
        println!("Processed:           {} ({:.1}/s)", s.total_processed, s.domains_per_sec());
        println!(
            "Matched:             {} ({:.3}%)",
            s.matched,
            s.match_rate() * 100.0
        );
        println!("Dedup hits:          {}", s.dedup_hit);
        println!("Queue dropped:       {}", s.queue_dropped);
        println!(
            "DNS resolved/failed: {}/{} ({:.1}% ok)",
            s.dns_resolved,
            s.dns_failed,
            s.resolve_rate() * 100.0
        );
        println!("Private IPs:         {}", s.private_ip);
        println!("HTTP active:         {}", s.http_active);
        println!("HTTP timeouts:       {}", s.http_timeout);
        println!(
            "Fingerprinter:       {} sent, {} failed",
            s.fingerprinter_sent, s.fingerprinter_failed
        );
        println!(
            "Gauges:              queue={} workers={} dedup={} wildcards={}",
            s.queue_size, s.worker_count, s.dedup_size, s.wildcard_count
        );
        println!("{}\n", "============================".bold());
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for StatsTracker {
    fn clone(&self) -> Self {
        Self {
            stats: Arc::clone(&self.stats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let tracker = StatsTracker::new();

        tracker.incr_total_processed();
        tracker.incr_total_processed();
        tracker.incr_matched();
        tracker.incr_dns_resolved();

        let s = tracker.snapshot();
        assert_eq!(s.total_processed, 2);
        assert_eq!(s.matched, 1);
        assert_eq!(s.dns_resolved, 1);
    }

    #[test]
    fn test_gauges_overwrite() {
        let tracker = StatsTracker::new();

        tracker.set_queue_size(100);
        tracker.set_queue_size(42);
        tracker.set_worker_count(10);

        let s = tracker.snapshot();
        assert_eq!(s.queue_size, 42);
        assert_eq!(s.worker_count, 10);
    }

    #[test]
    fn test_rates() {
        let tracker = StatsTracker::new();

        for _ in 0..10 {
            tracker.incr_total_processed();
        }
        tracker.incr_matched();
        tracker.incr_dns_resolved();
        tracker.incr_dns_failed();

        let s = tracker.snapshot();
        assert!((s.match_rate() - 0.1).abs() < f64::EPSILON);
        assert!((s.resolve_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rates_with_no_traffic() {
        let s = StatsTracker::new().snapshot();
        assert_eq!(s.match_rate(), 0.0);
        assert_eq!(s.resolve_rate(), 0.0);
        assert_eq!(s.domains_per_sec(), 0.0);
    }

    #[test]
    fn test_clone_shares_state() {
        let tracker1 = StatsTracker::new();
        tracker1.incr_matched();

        let tracker2 = tracker1.clone();
        tracker2.incr_matched();

        assert_eq!(tracker1.snapshot().matched, 2);
    }
}
