// Resolver - DNS lookup with timeout, private-range classification, cache

use crate::error::ResolveErrorKind;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind as HickoryErrorKind;
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use lru::LruCache;
use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Outcome of a resolution attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// First public IP found for the host
    Public(IpAddr),
    /// The host resolved, but only to private/reserved addresses
    PrivateOnly(IpAddr),
    /// The query failed with a classified kind
    Failed(ResolveErrorKind),
}

/// DNS resolver with a bounded result cache
pub struct Resolver {
    resolver: TokioAsyncResolver,
    cache: Mutex<LruCache<String, ResolveOutcome>>,
    query_timeout: Duration,
    lookup_ipv6: bool,
}

impl Resolver {
    pub fn new(query_timeout: Duration, lookup_ipv6: bool, cache_size: usize) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = query_timeout;
        // One retry after a failed lookup
        opts.attempts = 1;

        let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), opts);
        let cap = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);

        Self {
            resolver,
            cache: Mutex::new(LruCache::new(cap)),
            query_timeout,
            lookup_ipv6,
        }
    }

    /// Resolve a host to its first public IP
    ///
    /// Successful outcomes (public or private-only) are cached; failures
    /// are not, so the retry path always re-queries.
    pub async fn resolve(&self, host: &str) -> ResolveOutcome {
        if let Some(cached) = self.cache_get(host) {
            debug!("DNS cache hit for {}", host);
            return cached;
        }

        let outcome = self.lookup(host).await;

        if !matches!(outcome, ResolveOutcome::Failed(_)) {
            self.cache_put(host, outcome);
        }

        outcome
    }

    async fn lookup(&self, host: &str) -> ResolveOutcome {
        // Outer guard: the library timeout covers a single attempt
        let deadline = self.query_timeout * 2 + Duration::from_millis(500);

        let lookup = tokio::time::timeout(deadline, self.resolver.lookup_ip(host)).await;

        let response = match lookup {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return ResolveOutcome::Failed(classify_error(e.kind())),
            Err(_) => return ResolveOutcome::Failed(ResolveErrorKind::Timeout),
        };

        let mut first_private = None;

        for ip in response.iter() {
            if ip.is_ipv6() && !self.lookup_ipv6 {
                continue;
            }
            if is_private_ip(&ip) {
                first_private.get_or_insert(ip);
            } else {
                return ResolveOutcome::Public(ip);
            }
        }

        match first_private {
            Some(ip) => ResolveOutcome::PrivateOnly(ip),
            // Records existed but none were usable for this configuration
            None => ResolveOutcome::Failed(ResolveErrorKind::NxDomain),
        }
    }

    fn cache_get(&self, host: &str) -> Option<ResolveOutcome> {
        match self.cache.lock() {
            Ok(mut cache) => cache.get(host).copied(),
            Err(poisoned) => poisoned.into_inner().get(host).copied(),
        }
    }

    fn cache_put(&self, host: &str, outcome: ResolveOutcome) {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        cache.put(host.to_string(), outcome);
    }

    pub fn cache_len(&self) -> usize {
        match self.cache.lock() {
            Ok(cache) => cache.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

fn classify_error(kind: &HickoryErrorKind) -> ResolveErrorKind {
    match kind {
        HickoryErrorKind::NoRecordsFound { response_code, .. } => match response_code {
            ResponseCode::NXDomain => ResolveErrorKind::NxDomain,
            ResponseCode::ServFail => ResolveErrorKind::ServFail,
            // Empty answers on NoError are as permanent as NXDOMAIN
            ResponseCode::NoError => ResolveErrorKind::NxDomain,
            _ => ResolveErrorKind::Other,
        },
        HickoryErrorKind::Timeout => ResolveErrorKind::Timeout,
        _ => ResolveErrorKind::Other,
    }
}

/// Whether an address falls in a private, loopback or otherwise
/// non-routable range
pub fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let octets = v4.octets();
            v4.is_private()               // 10/8, 172.16/12, 192.168/16
                || v4.is_loopback()       // 127/8
                || v4.is_link_local()     // 169.254/16
                || octets[0] == 0 // 0/8
        }
        IpAddr::V6(v6) => {
            let segments = v6.segments();
            v6.is_loopback()                               // ::1/128
                || (segments[0] & 0xffc0) == 0xfe80        // fe80::/10
                || (segments[0] & 0xfe00) == 0xfc00 // fc00::/7
        }
    }
}

/// Fail-closed string classification: unparseable addresses are private
pub fn is_private_str(addr: &str) -> bool {
    match addr.parse::<IpAddr>() {
        Ok(ip) => is_private_ip(&ip),
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_private_v4_ranges() {
        for addr in [
            "10.0.0.5",
            "172.16.0.1",
            "172.31.255.255",
            "192.168.1.1",
            "127.0.0.1",
            "169.254.10.10",
            "0.1.2.3",
        ] {
            assert!(is_private_ip(&ip(addr)), "{} should be private", addr);
        }
    }

    #[test]
    fn test_public_v4() {
        for addr in ["93.184.216.34", "8.8.8.8", "172.32.0.1", "1.1.1.1"] {
            assert!(!is_private_ip(&ip(addr)), "{} should be public", addr);
        }
    }

    #[test]
    fn test_private_v6_ranges() {
        for addr in ["::1", "fe80::1", "fc00::1", "fd12:3456::1"] {
            assert!(is_private_ip(&ip(addr)), "{} should be private", addr);
        }
    }

    #[test]
    fn test_public_v6() {
        assert!(!is_private_ip(&ip("2606:2800:220:1:248:1893:25c8:1946")));
    }

    #[test]
    fn test_unparseable_is_private() {
        assert!(is_private_str("not-an-ip"));
        assert!(is_private_str(""));
        assert!(!is_private_str("93.184.216.34"));
        assert!(is_private_str("10.0.0.5"));
    }

    #[test]
    fn test_classify_timeout() {
        assert_eq!(
            classify_error(&HickoryErrorKind::Timeout),
            ResolveErrorKind::Timeout
        );
    }

    #[tokio::test]
    async fn test_cache_starts_empty() {
        let resolver = Resolver::new(Duration::from_secs(2), false, 100);
        assert_eq!(resolver.cache_len(), 0);
    }
}
