// Discord Webhook Channel - embed payloads for discoveries, logs and stats

use crate::error::PipelineError;
use crate::notify::{Discovery, NotifyChannel};
use crate::stats::Stats;
use crate::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

/// Embed accent colors
const COLOR_DISCOVERY: u32 = 0x2ecc71;
const COLOR_LOG: u32 = 0x3498db;
const COLOR_STATS: u32 = 0x9b59b6;

pub struct DiscordWebhook {
    client: reqwest::Client,
    url: String,
    username: String,
}

impl DiscordWebhook {
    pub fn new(url: String, username: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            url,
            username,
        }
    }

    async fn post(&self, payload: &Value) -> Result<()> {
        let response = self.client.post(&self.url).json(payload).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::NotificationError {
                channel: "discord".to_string(),
                details: format!("status {}: {}", status, body),
            });
        }

        Ok(())
    }

    fn embed_payload(
        &self,
        title: &str,
        description: &str,
        color: u32,
        fields: Vec<Value>,
    ) -> Value {
        json!({
            "username": self.username,
            "embeds": [{
                "title": title,
                "description": description,
                "color": color,
                "fields": fields,
                "footer": { "text": format!("certhound v{}", env!("CARGO_PKG_VERSION")) }
            }]
        })
    }

    /// Post an operational log embed
    pub async fn send_log(&self, title: &str, description: &str) -> Result<()> {
        let payload = self.embed_payload(title, description, COLOR_LOG, Vec::new());
        self.post(&payload).await
    }

    /// Post a stats report embed
    pub async fn send_stats(&self, stats: &Stats) -> Result<()> {
        let fields = vec![
            field("Processed", &stats.total_processed.to_string(), true),
            field("Matched", &stats.matched.to_string(), true),
            field("Dedup hits", &stats.dedup_hit.to_string(), true),
            field("DNS ok/failed", &format!("{}/{}", stats.dns_resolved, stats.dns_failed), true),
            field("Private IPs", &stats.private_ip.to_string(), true),
            field("HTTP active", &stats.http_active.to_string(), true),
            field(
                "Fingerprinter",
                &format!("{} sent, {} failed", stats.fingerprinter_sent, stats.fingerprinter_failed),
                true,
            ),
            field("Queue", &stats.queue_size.to_string(), true),
            field("Workers", &stats.worker_count.to_string(), true),
            field("Wildcards", &stats.wildcard_count.to_string(), true),
            field("Rate", &format!("{:.1} domains/s", stats.domains_per_sec()), true),
            field("Uptime", &format!("{} s", stats.uptime_secs), true),
        ];

        let description = format!(
            "Match rate {:.3}% | resolve rate {:.1}%",
            stats.match_rate() * 100.0,
            stats.resolve_rate() * 100.0
        );

        let payload = self.embed_payload("Pipeline statistics", &description, COLOR_STATS, fields);
        self.post(&payload).await
    }
}

fn field(name: &str, value: &str, inline: bool) -> Value {
    json!({ "name": name, "value": value, "inline": inline })
}

#[async_trait]
impl NotifyChannel for DiscordWebhook {
    async fn notify(&self, discovery: &Discovery) -> Result<()> {
        let urls = if discovery.urls.is_empty() {
            "none".to_string()
        } else {
            discovery.urls.join("\n")
        };

        let fields = vec![
            field("IP", &discovery.ip, true),
            field("Program", &discovery.program, true),
            field("Scope", &discovery.pattern, true),
            field("Active URLs", &urls, false),
        ];

        let payload = self.embed_payload(
            &format!("New domain: {}", discovery.domain),
            &format!("Discovered {}", discovery.found_at.format("%Y-%m-%d %H:%M:%S UTC")),
            COLOR_DISCOVERY,
            fields,
        );

        self.post(&payload).await
    }

    fn channel_name(&self) -> &str {
        "discord"
    }

    async fn test_connection(&self) -> Result<()> {
        let payload = json!({
            "username": self.username,
            "embeds": [{
                "title": "CertHound online",
                "description": "Webhook connectivity check",
                "color": COLOR_LOG,
                "fields": [],
                "footer": { "text": format!("certhound v{}", env!("CARGO_PKG_VERSION")) }
            }]
        });

        self.post(&payload).await
    }
}
