//! Outbound analysis calls.
//!
//! Each analysis kind is an opaque remote capability. The orchestrator only
//! sees the [`AnalysisClient`] trait; [`HttpAnalysisClient`] is the
//! production implementation.

pub mod http;
#[doc(hidden)]
pub mod scripted;

use crate::models::{AnalysisPayload, AnalysisRequest};
use crate::registry::AnalysisKind;
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

pub use http::HttpAnalysisClient;
#[doc(hidden)]
pub use scripted::{ScriptedClient, ScriptedResponse};

/// Why a single call attempt failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error("cannot connect to {endpoint}")]
    Connect { endpoint: String },

    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed payload: {0}")]
    Malformed(String),

    /// A permanent failure that retrying cannot fix.
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl CallError {
    /// Network faults, non-2xx answers and malformed payloads are retried.
    pub fn is_transient(&self) -> bool {
        !matches!(self, CallError::Rejected(_))
    }
}

/// One remote analysis capability.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Runs one attempt of `kind` against `endpoint`.
    async fn analyze(
        &self,
        kind: AnalysisKind,
        endpoint: &str,
        request: &AnalysisRequest,
    ) -> Result<AnalysisPayload, CallError>;
}

/// Validates an endpoint response body into a payload.
///
/// The body must be a JSON object with a numeric `confidence` in `[0, 1]`.
pub fn parse_payload(body: Value) -> Result<AnalysisPayload, CallError> {
    if !body.is_object() {
        return Err(CallError::Malformed("expected a JSON object".to_string()));
    }

    let confidence = body
        .get("confidence")
        .and_then(Value::as_f64)
        .ok_or_else(|| CallError::Malformed("missing numeric confidence".to_string()))?;

    if !(0.0..=1.0).contains(&confidence) {
        return Err(CallError::Malformed(format!(
            "confidence {} outside [0, 1]",
            confidence
        )));
    }

    Ok(AnalysisPayload {
        confidence,
        data: body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payload() {
        let payload = parse_payload(json!({ "confidence": 0.82, "label": "negative" })).unwrap();
        assert_eq!(payload.confidence, 0.82);
        assert_eq!(payload.data["label"], "negative");
    }

    #[test]
    fn test_parse_payload_rejects_malformed() {
        assert!(matches!(
            parse_payload(json!([1, 2, 3])),
            Err(CallError::Malformed(_))
        ));
        assert!(matches!(
            parse_payload(json!({ "label": "positive" })),
            Err(CallError::Malformed(_))
        ));
        assert!(matches!(
            parse_payload(json!({ "confidence": 1.7 })),
            Err(CallError::Malformed(_))
        ));
    }

    #[test]
    fn test_transient_classification() {
        assert!(CallError::Timeout.is_transient());
        assert!(CallError::Status {
            status: 503,
            body: String::new()
        }
        .is_transient());
        assert!(CallError::Malformed("x".to_string()).is_transient());
        assert!(!CallError::Rejected("bad url".to_string()).is_transient());
    }
}
