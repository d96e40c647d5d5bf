//! HTTP transport for analysis endpoints.

use super::{parse_payload, AnalysisClient, CallError};
use crate::models::{AnalysisPayload, AnalysisRequest, SentenceContext, TriggerReason};
use crate::registry::AnalysisKind;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Body posted to every analysis endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EndpointRequest<'a> {
    kind: AnalysisKind,
    sentence: &'a str,
    trigger_reason: TriggerReason,
    context: &'a SentenceContext,
}

/// Calls analysis endpoints over HTTP with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http_client: reqwest::Client,
}

impl HttpAnalysisClient {
    /// Creates a client whose transport gives up after `request_timeout`.
    ///
    /// The orchestrator enforces its own per-call bound; this one only keeps
    /// a stalled connection from outliving it.
    pub fn new(request_timeout: Duration) -> Result<Self> {
        info!(
            "Initializing HTTP analysis client (request timeout {}ms)",
            request_timeout.as_millis()
        );

        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("narralyze/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { http_client })
    }

    fn map_send_error(&self, endpoint: &str, e: reqwest::Error) -> CallError {
        if e.is_timeout() {
            CallError::Timeout
        } else if e.is_connect() {
            CallError::Connect {
                endpoint: endpoint.to_string(),
            }
        } else if e.is_builder() {
            CallError::Rejected(format!("invalid request for {}: {}", endpoint, e))
        } else {
            CallError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    async fn analyze(
        &self,
        kind: AnalysisKind,
        endpoint: &str,
        request: &AnalysisRequest,
    ) -> Result<AnalysisPayload, CallError> {
        let body = EndpointRequest {
            kind,
            sentence: request.sentence.raw_text(),
            trigger_reason: request.sentence.trigger_reason(),
            context: &request.context,
        };

        debug!("POST {} ({})", endpoint, kind);

        let response = self
            .http_client
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(endpoint, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CallError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                CallError::Timeout
            } else {
                CallError::Malformed(e.to_string())
            }
        })?;

        parse_payload(value)
    }
}
