//! The gateway HTTP client.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use parlor_engine::{
    AdmissionError, Capabilities, CapabilitiesProbe, EventSource, IntentEnvelope, IntentSink,
    RecordStream, SessionBackend, SnapshotPage, SourceError, SubmitError,
};

use crate::config::GatewayConfig;
use crate::sse;

/// HTTP client for one gateway, implementing the engine's three transport
/// contracts.
///
/// No request timeout is configured: the tail subscription is legitimately
/// unbounded, and snapshot/ingress failures surface through ordinary
/// connection errors handled by the engine's retry and status paths.
pub struct GatewayClient {
    config: GatewayConfig,
    http: reqwest::Client,
}

impl GatewayClient {
    /// Create a client for the configured gateway.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Package this client as a [`SessionBackend`] (source + sink + probe).
    #[must_use]
    pub fn into_backend(self) -> SessionBackend {
        let client = Arc::new(self);
        SessionBackend {
            source: Arc::clone(&client) as Arc<dyn EventSource>,
            sink: Arc::clone(&client) as Arc<dyn IntentSink>,
            probe: client as Arc<dyn CapabilitiesProbe>,
        }
    }

    /// The configured base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url)
    }
}

#[async_trait]
impl CapabilitiesProbe for GatewayClient {
    async fn capabilities(&self) -> Result<Capabilities, AdmissionError> {
        let response = self
            .http
            .get(self.url("/capabilities"))
            .send()
            .await
            .map_err(|e| AdmissionError::Probe(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdmissionError::Probe(format!(
                "capabilities endpoint returned {status}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| AdmissionError::Probe(e.to_string()))
    }
}

#[async_trait]
impl EventSource for GatewayClient {
    async fn fetch_snapshot(&self, offset: u64, limit: u64) -> Result<SnapshotPage, SourceError> {
        let response = self
            .http
            .get(self.url("/snapshot"))
            .query(&[("offset", offset), ("limit", limit)])
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))
    }

    async fn subscribe_tail(&self, since: Option<u64>) -> Result<RecordStream, SourceError> {
        let mut request = self.http.get(self.url("/tail"));
        if let Some(since) = since {
            request = request.query(&[("since", since)]);
        }
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                status: status.as_u16(),
            });
        }
        debug!(since, "tail stream open");
        Ok(sse::record_stream(response.bytes_stream()))
    }
}

#[async_trait]
impl IntentSink for GatewayClient {
    async fn submit_intent(&self, envelope: &IntentEnvelope) -> Result<(), SubmitError> {
        let response = self
            .http
            .post(self.url("/ingress/intent"))
            .json(envelope)
            .send()
            .await
            .map_err(|e| SubmitError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Rejected {
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_join_without_double_slashes() {
        let client = GatewayClient::new(GatewayConfig::new("http://gw:8010/"));
        assert_eq!(client.url("/tail"), "http://gw:8010/tail");
        assert_eq!(client.base_url(), "http://gw:8010");
    }
}
