//! HTTP webhook audit sink.

use async_trait::async_trait;
use reqwest::{Client, header};
use std::time::Duration;
use tracing::trace;

use crate::error::{AuditError, Result};

use super::event::AuditEvent;
use super::sink::AuditSink;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Posts each audit event as JSON to a URL.
#[derive(Debug, Clone)]
pub struct WebhookAuditSink {
    /// HTTP client.
    client: Client,
    /// Target URL.
    url: String,
}

impl WebhookAuditSink {
    /// Creates a sink posting to `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(url: &str, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| {
                AuditError::delivery("webhook", format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Gets the target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AuditSink for WebhookAuditSink {
    async fn emit(&self, event: &AuditEvent) -> Result<()> {
        trace!("Posting audit event {} to {}", event.id, self.url);

        let response = self
            .client
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(event)
            .send()
            .await
            .map_err(|e| AuditError::delivery("webhook", format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuditError::delivery("webhook", format!("HTTP {status}")).into());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::event::{AuditAction, EntityType};
    use crate::error::VaultError;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn deploy_event() -> AuditEvent {
        AuditEvent::new(
            EntityType::Config,
            Uuid::new_v4(),
            "tenant",
            AuditAction::Deploy,
            "carol",
            json!({"environment": "prod", "deployedVersion": 4}),
        )
    }

    #[tokio::test]
    async fn test_posts_event_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audit"))
            .and(body_partial_json(json!({"action": "DEPLOY", "tenant_id": "tenant"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookAuditSink::new(&format!("{}/audit", server.uri()), DEFAULT_TIMEOUT_SECS)
            .expect("client");
        sink.emit(&deploy_event()).await.expect("delivered");
    }

    #[tokio::test]
    async fn test_error_status_is_a_delivery_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = WebhookAuditSink::new(&server.uri(), DEFAULT_TIMEOUT_SECS).expect("client");
        let err = sink.emit(&deploy_event()).await.expect_err("must fail");
        assert!(matches!(err, VaultError::Audit(AuditError::Delivery { sink: "webhook", .. })));
    }
}
