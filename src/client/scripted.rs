//! In-memory client with scripted responses.
//!
//! Exercises the orchestrator without a network. Each kind gets a queue of
//! responses; the last entry repeats once the queue is drained.

use super::{AnalysisClient, CallError};
use crate::models::{AnalysisPayload, AnalysisRequest};
use crate::registry::AnalysisKind;
use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// One scripted answer.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// Succeed with the given confidence after `delay`.
    Succeed { confidence: f64, delay: Duration },
    /// Fail with the given error after `delay`.
    Fail { error: CallError, delay: Duration },
    /// Never answer.
    Hang,
    /// Panic inside the call.
    Panic,
}

impl ScriptedResponse {
    pub fn ok(confidence: f64) -> Self {
        ScriptedResponse::Succeed {
            confidence,
            delay: Duration::ZERO,
        }
    }

    pub fn ok_after(confidence: f64, delay: Duration) -> Self {
        ScriptedResponse::Succeed { confidence, delay }
    }

    pub fn fail(error: CallError) -> Self {
        ScriptedResponse::Fail {
            error,
            delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct Script {
    queues: HashMap<AnalysisKind, VecDeque<ScriptedResponse>>,
    calls: HashMap<AnalysisKind, u32>,
    sentences: Vec<String>,
}

/// An [`AnalysisClient`] that answers from a script.
///
/// Kinds without a script succeed with `fallback_confidence`.
#[derive(Debug)]
pub struct ScriptedClient {
    script: Mutex<Script>,
    fallback_confidence: f64,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
            fallback_confidence: 0.9,
        }
    }

    pub fn with_fallback_confidence(mut self, confidence: f64) -> Self {
        self.fallback_confidence = confidence;
        self
    }

    /// Queues responses for a kind, answered in order.
    pub fn script(self, kind: AnalysisKind, responses: Vec<ScriptedResponse>) -> Self {
        self.lock().queues.insert(kind, responses.into());
        self
    }

    /// Number of attempts made for a kind.
    pub fn calls(&self, kind: AnalysisKind) -> u32 {
        self.lock().calls.get(&kind).copied().unwrap_or(0)
    }

    /// Total attempts across every kind.
    pub fn total_calls(&self) -> u32 {
        self.lock().calls.values().sum()
    }

    /// Sentences seen, one entry per attempt.
    pub fn sentences(&self) -> Vec<String> {
        self.lock().sentences.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_response(&self, kind: AnalysisKind, sentence: &str) -> ScriptedResponse {
        let mut script = self.lock();
        *script.calls.entry(kind).or_insert(0) += 1;
        script.sentences.push(sentence.to_string());

        match script.queues.get_mut(&kind) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(ScriptedResponse::Hang),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| ScriptedResponse::ok(self.fallback_confidence)),
            None => ScriptedResponse::ok(self.fallback_confidence),
        }
    }
}

impl Default for ScriptedClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnalysisClient for ScriptedClient {
    async fn analyze(
        &self,
        kind: AnalysisKind,
        _endpoint: &str,
        request: &AnalysisRequest,
    ) -> Result<AnalysisPayload, CallError> {
        let response = self.next_response(kind, request.sentence.raw_text());

        match response {
            ScriptedResponse::Succeed { confidence, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(AnalysisPayload {
                    confidence,
                    data: json!({
                        "kind": kind.as_str(),
                        "confidence": confidence,
                    }),
                })
            }
            ScriptedResponse::Fail { error, delay } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Err(error)
            }
            ScriptedResponse::Hang => std::future::pending().await,
            ScriptedResponse::Panic => panic!("scripted panic for {}", kind),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CandidateSentence, PositionRange, SentenceContext, TriggerReason};

    fn request() -> AnalysisRequest {
        AnalysisRequest::new(
            CandidateSentence::new("Hello.", TriggerReason::Manual, PositionRange::new(0, 6)),
            SentenceContext::default(),
        )
    }

    #[tokio::test]
    async fn test_queue_then_repeat_last() {
        let client = ScriptedClient::new().script(
            AnalysisKind::Topic,
            vec![
                ScriptedResponse::fail(CallError::Timeout),
                ScriptedResponse::ok(0.7),
            ],
        );

        let first = client.analyze(AnalysisKind::Topic, "", &request()).await;
        let second = client.analyze(AnalysisKind::Topic, "", &request()).await;
        let third = client.analyze(AnalysisKind::Topic, "", &request()).await;

        assert_eq!(first, Err(CallError::Timeout));
        assert_eq!(second.unwrap().confidence, 0.7);
        assert_eq!(third.unwrap().confidence, 0.7);
        assert_eq!(client.calls(AnalysisKind::Topic), 3);
    }

    #[tokio::test]
    async fn test_unscripted_kind_uses_fallback() {
        let client = ScriptedClient::new().with_fallback_confidence(0.42);
        let payload = client
            .analyze(AnalysisKind::Intent, "", &request())
            .await
            .unwrap();
        assert_eq!(payload.confidence, 0.42);
        assert_eq!(client.sentences(), vec!["Hello.".to_string()]);
    }
}
