// Prober - parallel HTTP/S liveness checks against configured ports
//
// Reachability, not trust: TLS verification is disabled and any HTTP
// response at all (2xx through 5xx) marks the URL active.

use crate::config::{HttpConfig, ProbePortConfig};
use crate::Result;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::debug;

pub struct Prober {
    client: reqwest::Client,
    ports: Vec<ProbePortConfig>,
    concurrency: usize,
    overall_timeout: Duration,
}

impl Prober {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            ports: config.ports.clone(),
            concurrency: config.concurrency.max(1),
            overall_timeout: Duration::from_secs(config.probe_timeout),
        })
    }

    /// Probe every configured port; returns active URLs in ascending
    /// port order, deduplicated
    pub async fn probe(&self, host: &str) -> Vec<String> {
        let candidates: Vec<(u16, String)> = self
            .ports
            .iter()
            .map(|p| (p.port, build_url(&p.protocol, host, p.port)))
            .collect();

        let checks = stream::iter(candidates)
            .map(|(port, url)| {
                let client = self.client.clone();
                async move {
                    match client.head(&url).send().await {
                        Ok(response) => {
                            debug!("Probe {} -> {}", url, response.status());
                            Some((port, url))
                        }
                        Err(e) => {
                            debug!("Probe {} failed: {}", url, e);
                            None
                        }
                    }
                }
            })
            .buffer_unordered(self.concurrency)
            .collect::<Vec<_>>();

        let results = match tokio::time::timeout(self.overall_timeout, checks).await {
            Ok(results) => results,
            Err(_) => {
                debug!("Probe of {} hit the overall ceiling", host);
                return Vec::new();
            }
        };

        let mut active: Vec<(u16, String)> = results.into_iter().flatten().collect();
        active.sort_by_key(|(port, _)| *port);
        active.dedup_by(|a, b| a.1 == b.1);
        active.into_iter().map(|(_, url)| url).collect()
    }
}

/// Build a probe URL, eliding the scheme-default ports
fn build_url(protocol: &str, host: &str, port: u16) -> String {
    let default = matches!((protocol, port), ("http", 80) | ("https", 443));
    if default {
        format!("{}://{}", protocol, host)
    } else {
        format!("{}://{}:{}", protocol, host, port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ports_elided() {
        assert_eq!(build_url("http", "api.example.com", 80), "http://api.example.com");
        assert_eq!(
            build_url("https", "api.example.com", 443),
            "https://api.example.com"
        );
    }

    #[test]
    fn test_non_default_ports_kept() {
        assert_eq!(
            build_url("https", "api.example.com", 8443),
            "https://api.example.com:8443"
        );
        assert_eq!(
            build_url("http", "api.example.com", 8080),
            "http://api.example.com:8080"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_yields_no_urls() {
        let config = HttpConfig {
            ports: vec![ProbePortConfig {
                protocol: "http".to_string(),
                port: 9,
            }],
            timeout: 1,
            probe_timeout: 3,
            concurrency: 2,
        };

        let prober = Prober::new(&config).unwrap();
        let urls = prober.probe("127.0.0.1").await;
        assert!(urls.is_empty());
    }
}
