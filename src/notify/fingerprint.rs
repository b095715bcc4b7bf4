// Fingerprinter Client - submits active URLs for application fingerprinting

use crate::config::FingerprinterConfig;
use crate::error::PipelineError;
use crate::Result;
use serde_json::json;
use std::time::Duration;

pub struct FingerprintClient {
    client: reqwest::Client,
    config: FingerprinterConfig,
}

impl FingerprintClient {
    pub fn new(config: FingerprinterConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { client, config }
    }

    /// Submit a URL batch; any 2xx response is success
    pub async fn submit(&self, urls: &[String]) -> Result<()> {
        let payload = json!({
            "urls": urls,
            "callback_urls": self.config.callback_urls,
        });

        let mut request = self
            .client
            .post(&self.config.url)
            .header("Content-Type", "application/json")
            .json(&payload);

        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(PipelineError::NotificationError {
                channel: "fingerprinter".to_string(),
                details: format!("status {}", response.status()),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_service_errors() {
        let client = FingerprintClient::new(FingerprinterConfig {
            url: "http://127.0.0.1:9/api/fingerprint".to_string(),
            api_key: Some("key".to_string()),
            callback_urls: vec!["https://callback.example".to_string()],
        });

        let result = client.submit(&["https://api.example.com".to_string()]).await;
        assert!(result.is_err());
    }
}
