// ABOUTME: Outbound webhook delivery for forwarded Foos messages
// ABOUTME: POSTs {"content": ...} as JSON; non-success responses are logged, never retried

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use foos_core::traits::Forwarder;

#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub content: &'a str,
}

/// Forwarder backed by a single webhook URL
#[derive(Debug, Clone)]
pub struct WebhookForwarder {
    client: reqwest::Client,
    url: String,
}

/// Upper bound on one delivery, connect through response
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

impl WebhookForwarder {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl Forwarder for WebhookForwarder {
    async fn post(&self, content: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .json(&WebhookPayload { content })
            .send()
            .await
            .context("Failed to send webhook request")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Webhook error");
            return Ok(());
        }

        tracing::debug!(status = %status, "Webhook delivered");
        Ok(())
    }
}
