// Validator - the expensive half of the pipeline
//
// Runs persistence check, DNS resolution, liveness probing and the final
// notify/fingerprint/persist fan-out for one job. Shared by the worker
// pool and the retry sweep so both paths behave identically.

use crate::db::Database;
use crate::error::ResolveErrorKind;
use crate::notify::{Discovery, Notifier};
use crate::pipeline::job::{JobStage, PipelineJob};
use crate::pipeline::prober::Prober;
use crate::pipeline::resolver::{ResolveOutcome, Resolver};
use crate::stats::StatsTracker;
use crate::wildcards::WildcardPattern;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Outcome of validating one matched job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Public IP found; notification/fingerprint/persist ran
    Discovered { ip: String, urls: Vec<String> },
    /// Resolved only to private addresses; dropped silently
    PrivateIp,
    /// DNS failed; kind decides whether the caller enqueues a retry
    Failed(ResolveErrorKind),
    /// The persistence layer already knows this domain
    AlreadyKnown,
}

pub struct Validator {
    resolver: Arc<Resolver>,
    prober: Arc<Prober>,
    notifier: Arc<Notifier>,
    db: Arc<Database>,
    stats: StatsTracker,
}

impl Validator {
    pub fn new(
        resolver: Arc<Resolver>,
        prober: Arc<Prober>,
        notifier: Arc<Notifier>,
        db: Arc<Database>,
        stats: StatsTracker,
    ) -> Self {
        Self {
            resolver,
            prober,
            notifier,
            db,
            stats,
        }
    }

    /// Validate a matched job and emit on success
    ///
    /// The job must carry its matched pattern. `check_known` short-circuits
    /// against discovered_domains; the retry sweep passes false because its
    /// rows are by definition undiscovered.
    pub async fn validate(&self, job: &mut PipelineJob, check_known: bool) -> Verdict {
        let name = job.cleaned_name.clone();

        let Some(pattern) = job.matched.clone() else {
            debug!("{} reached validation without a pattern; dropping", name);
            return Verdict::Failed(ResolveErrorKind::Other);
        };

        if check_known {
            match self.db.domains().exists(&name).await {
                Ok(true) => {
                    debug!("{} already discovered; skipping", name);
                    return Verdict::AlreadyKnown;
                }
                Ok(false) => {}
                Err(e) => {
                    // Fail open: the unique constraint still protects the write
                    error!("Persistence check failed for {}: {}", name, e);
                }
            }
        }

        let ip = match self.resolver.resolve(&name).await {
            ResolveOutcome::Public(ip) => {
                self.stats.incr_dns_resolved();
                ip
            }
            ResolveOutcome::PrivateOnly(ip) => {
                self.stats.incr_private_ip();
                debug!("{} resolves only to private {}; dropping", name, ip);
                return Verdict::PrivateIp;
            }
            ResolveOutcome::Failed(kind) => {
                self.stats.incr_dns_failed();
                debug!("{} failed to resolve: {:?}", name, kind);
                return Verdict::Failed(kind);
            }
        };

        job.ips.push(ip);
        job.stage = JobStage::Resolved;

        let urls = self.prober.probe(&name).await;
        if urls.is_empty() {
            self.stats.incr_http_timeout();
        } else {
            self.stats.incr_http_active();
        }

        job.probe_urls = urls.clone();
        job.stage = JobStage::Probed;

        self.emit(&name, &ip.to_string(), &urls, &pattern).await;
        job.stage = JobStage::Done;

        Verdict::Discovered {
            ip: ip.to_string(),
            urls,
        }
    }

    /// Persist, notify and fingerprint, each with independent error handling
    async fn emit(&self, name: &str, ip: &str, urls: &[String], pattern: &WildcardPattern) {
        // Persistence first: the unique constraint decides whether this
        // discovery is new, which gates the notification.
        let inserted = match self.db.domains().insert(name, ip, &pattern.program).await {
            Ok(inserted) => inserted,
            Err(e) => {
                error!("Failed to persist discovery {}: {}", name, e);
                // Unknown state; do not notify on top of a failed write
                return;
            }
        };

        if !inserted {
            debug!("{} raced an earlier insert; suppressing notification", name);
            return;
        }

        info!("Discovered {} -> {} ({} active URL(s))", name, ip, urls.len());

        let discovery = Discovery {
            domain: name.to_string(),
            ip: ip.to_string(),
            program: pattern.program.clone(),
            pattern: pattern.display(),
            urls: urls.to_vec(),
            found_at: Utc::now(),
        };

        self.notifier.notify_discovery(&discovery).await;

        // An IP alone is a discovery, but there is nothing to fingerprint
        if !urls.is_empty() && self.notifier.has_fingerprinter() {
            match self.notifier.fingerprint(urls).await {
                Ok(true) => self.stats.incr_fingerprinter_sent(),
                Ok(false) => {}
                Err(e) => {
                    self.stats.incr_fingerprinter_failed();
                    error!("Fingerprinter submission failed for {}: {}", name, e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::Config;
    use std::time::Duration;

    #[tokio::test]
    async fn test_job_without_pattern_fails_closed() {
        let db = Arc::new(Database::in_memory().await.unwrap());
        let validator = Validator::new(
            Arc::new(Resolver::new(Duration::from_secs(1), false, 10)),
            Arc::new(Prober::new(&HttpConfig::default()).unwrap()),
            Arc::new(Notifier::from_config(&Config::default())),
            db,
            StatsTracker::new(),
        );

        let mut job = PipelineJob::new("api.example.com");
        let verdict = validator.validate(&mut job, true).await;
        assert_eq!(verdict, Verdict::Failed(ResolveErrorKind::Other));
    }
}
