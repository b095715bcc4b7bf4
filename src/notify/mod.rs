// Notification sinks - Discord webhooks and the fingerprinter service

pub mod discord;
pub mod fingerprint;

pub use discord::DiscordWebhook;
pub use fingerprint::FingerprintClient;

use crate::config::Config;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};

/// A validated discovery ready for delivery
#[derive(Debug, Clone)]
pub struct Discovery {
    pub domain: String,
    pub ip: String,
    pub program: String,
    /// Matched pattern in display form (`*.suffix`)
    pub pattern: String,
    pub urls: Vec<String>,
    pub found_at: DateTime<Utc>,
}

/// A delivery channel for discoveries
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    async fn notify(&self, discovery: &Discovery) -> Result<()>;

    fn channel_name(&self) -> &str;

    /// Cheap end-to-end check used at startup
    async fn test_connection(&self) -> Result<()>;
}

/// Aggregate over the configured sinks
///
/// Every delivery is best-effort: failures are logged and counted by the
/// caller, never propagated into the pipeline.
pub struct Notifier {
    messages: Option<DiscordWebhook>,
    logs: Option<DiscordWebhook>,
    fingerprinter: Option<FingerprintClient>,
}

impl Notifier {
    pub fn from_config(config: &Config) -> Self {
        let username = config.discord.username.clone();

        let messages = config
            .discord
            .messages_webhook
            .as_ref()
            .map(|url| DiscordWebhook::new(url.clone(), username.clone()));

        let logs = config
            .discord
            .logs_webhook
            .as_ref()
            .map(|url| DiscordWebhook::new(url.clone(), username.clone()));

        let fingerprinter = config
            .fingerprinter
            .as_ref()
            .map(|fp| FingerprintClient::new(fp.clone()));

        Self {
            messages,
            logs,
            fingerprinter,
        }
    }

    /// Deliver a discovery to the messages webhook
    pub async fn notify_discovery(&self, discovery: &Discovery) {
        let Some(channel) = &self.messages else {
            debug!("No messages webhook configured; skipping notification");
            return;
        };

        if let Err(e) = channel.notify(discovery).await {
            error!("Failed to notify discovery of {}: {}", discovery.domain, e);
        }
    }

    /// Post an operational log line to the logs webhook
    pub async fn notify_log(&self, title: &str, description: &str) {
        let Some(channel) = &self.logs else {
            return;
        };

        if let Err(e) = channel.send_log(title, description).await {
            error!("Failed to post log webhook: {}", e);
        }
    }

    /// Post a stats report to the logs webhook
    pub async fn notify_stats(&self, stats: &crate::stats::Stats) {
        let Some(channel) = &self.logs else {
            return;
        };

        if let Err(e) = channel.send_stats(stats).await {
            error!("Failed to post stats webhook: {}", e);
        }
    }

    /// Submit active URLs to the fingerprinter; Ok(false) when no
    /// fingerprinter is configured
    pub async fn fingerprint(&self, urls: &[String]) -> Result<bool> {
        let Some(client) = &self.fingerprinter else {
            return Ok(false);
        };

        client.submit(urls).await?;
        Ok(true)
    }

    pub fn has_fingerprinter(&self) -> bool {
        self.fingerprinter.is_some()
    }

    /// Verify every configured channel, logging failures
    pub async fn test_channels(&self) {
        if let Some(channel) = &self.messages {
            if let Err(e) = channel.test_connection().await {
                error!("Messages webhook test failed: {}", e);
            }
        }
        if let Some(channel) = &self.logs {
            if let Err(e) = channel.test_connection().await {
                error!("Logs webhook test failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_notifier_is_inert() {
        let notifier = Notifier::from_config(&Config::default());
        assert!(!notifier.has_fingerprinter());
    }

    #[tokio::test]
    async fn test_fingerprint_without_client_reports_skipped() {
        let notifier = Notifier::from_config(&Config::default());
        let sent = notifier.fingerprint(&["https://x.example".to_string()]).await.unwrap();
        assert!(!sent);
    }
}
