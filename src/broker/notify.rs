use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::broker::BrokerError;

#[derive(Debug, Deserialize)]
pub struct ConsumerAck {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Calls every configured consumer URL so idle consumers start draining the queue.
#[derive(Debug, Clone)]
pub struct ConsumerNotifier {
    http: reqwest::Client,
    urls: Vec<String>,
}

impl ConsumerNotifier {
    pub fn new(urls: Vec<String>, timeout: Duration) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, urls })
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub async fn notify_all(&self) {
        tracing::debug!("triggering {} consumers", self.urls.len());
        for url in &self.urls {
            if let Err(e) = self.call(url).await {
                tracing::error!("failed to notify consumer {url}: {e}");
            }
        }
    }

    pub async fn call(&self, url: &str) -> Result<ConsumerAck, BrokerError> {
        let start = Instant::now();
        let ack: ConsumerAck = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .map_err(|e| format!("failed to parse json from consumer: {e}"))?;
        tracing::debug!(
            "response from consumer {}, took {:?}",
            ack.status,
            start.elapsed()
        );
        Ok(ack)
    }
}
