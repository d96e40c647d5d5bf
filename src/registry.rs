//! Analysis registry.
//!
//! The registry is the immutable catalog the orchestrator works from: which
//! analysis kinds exist, where each one lives, which are enabled by default,
//! and the timeout, retry and quality policies that apply to every call.
//! Environment presets are named bundles of the same schema.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Base URL that relative endpoint paths resolve against unless overridden.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// One independently toggleable analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AnalysisKind {
    Sentiment,
    Topic,
    Intent,
    NextSteps,
    FactCheck,
    Clarity,
    Coherence,
}

impl AnalysisKind {
    /// Every kind, in catalog order.
    pub const ALL: [AnalysisKind; 7] = [
        AnalysisKind::Sentiment,
        AnalysisKind::Topic,
        AnalysisKind::Intent,
        AnalysisKind::NextSteps,
        AnalysisKind::FactCheck,
        AnalysisKind::Clarity,
        AnalysisKind::Coherence,
    ];

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisKind::Sentiment => "sentiment",
            AnalysisKind::Topic => "topic",
            AnalysisKind::Intent => "intent",
            AnalysisKind::NextSteps => "nextSteps",
            AnalysisKind::FactCheck => "factCheck",
            AnalysisKind::Clarity => "clarity",
            AnalysisKind::Coherence => "coherence",
        }
    }

    /// Human-readable name.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::Sentiment => "Sentiment",
            AnalysisKind::Topic => "Topic",
            AnalysisKind::Intent => "Intent",
            AnalysisKind::NextSteps => "Next Steps",
            AnalysisKind::FactCheck => "Fact Check",
            AnalysisKind::Clarity => "Clarity",
            AnalysisKind::Coherence => "Coherence",
        }
    }

    /// Default endpoint path, relative to the endpoint base URL.
    pub fn default_path(&self) -> &'static str {
        match self {
            AnalysisKind::Sentiment => "/api/llm/sentiment",
            AnalysisKind::Topic => "/api/llm/topic",
            AnalysisKind::Intent => "/api/llm/intent",
            AnalysisKind::NextSteps => "/api/llm/next-steps",
            AnalysisKind::FactCheck => "/api/llm/fact-check",
            AnalysisKind::Clarity => "/api/llm/clarity",
            AnalysisKind::Coherence => "/api/llm/coherence",
        }
    }

    /// Whether the kind runs unless explicitly disabled.
    ///
    /// Fact checking and clarity are slow and off by default.
    pub fn enabled_by_default(&self) -> bool {
        !matches!(self, AnalysisKind::FactCheck | AnalysisKind::Clarity)
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisKind {
    type Err = ConfigError;

    /// Accepts `nextSteps`, `next-steps`, `next_steps` and any casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "sentiment" => Ok(AnalysisKind::Sentiment),
            "topic" => Ok(AnalysisKind::Topic),
            "intent" => Ok(AnalysisKind::Intent),
            "nextsteps" => Ok(AnalysisKind::NextSteps),
            "factcheck" => Ok(AnalysisKind::FactCheck),
            "clarity" => Ok(AnalysisKind::Clarity),
            "coherence" => Ok(AnalysisKind::Coherence),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// Catalog entry for one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindEntry {
    /// Absolute URL, or a path resolved against the registry base URL.
    pub endpoint: String,
    pub enabled_by_default: bool,
}

/// Per-call and total timeout budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    pub per_call: Duration,
    pub total: Duration,
}

impl TimeoutPolicy {
    pub fn from_millis(per_call_ms: u64, total_ms: u64) -> Self {
        Self {
            per_call: Duration::from_millis(per_call_ms),
            total: Duration::from_millis(total_ms),
        }
    }
}

/// Retry policy for transient failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay: Duration::from_millis(delay_ms),
        }
    }
}

/// Quality gate applied when aggregating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityGate {
    pub min_confidence: f64,
    pub max_errors: usize,
}

/// Named environment preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Default,
    #[default]
    Development,
    Production,
    Testing,
}

impl Profile {
    /// Resolves a profile name, falling back to [`Profile::Default`] for
    /// names that are not recognized.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_lowercase().as_str() {
            "default" => Profile::Default,
            "development" | "dev" => Profile::Development,
            "production" | "prod" => Profile::Production,
            "testing" | "test" => Profile::Testing,
            other => {
                warn!("Unknown profile '{}', using default settings", other);
                Profile::Default
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Default => "default",
            Profile::Development => "development",
            Profile::Production => "production",
            Profile::Testing => "testing",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable catalog of analysis kinds and call policies.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRegistry {
    profile: Profile,
    base_url: String,
    kinds: BTreeMap<AnalysisKind, KindEntry>,
    timeouts: TimeoutPolicy,
    retry: RetryPolicy,
    quality: QualityGate,
}

impl AnalysisRegistry {
    /// Builds the registry for a named preset.
    pub fn preset(profile: Profile) -> Self {
        let mut kinds: BTreeMap<AnalysisKind, KindEntry> = AnalysisKind::ALL
            .iter()
            .map(|kind| {
                (
                    *kind,
                    KindEntry {
                        endpoint: kind.default_path().to_string(),
                        enabled_by_default: kind.enabled_by_default(),
                    },
                )
            })
            .collect();

        let timeouts = match profile {
            Profile::Default => TimeoutPolicy::from_millis(10_000, 30_000),
            Profile::Development => TimeoutPolicy::from_millis(15_000, 45_000),
            Profile::Production => TimeoutPolicy::from_millis(8_000, 20_000),
            Profile::Testing => TimeoutPolicy::from_millis(5_000, 10_000),
        };

        if profile == Profile::Testing {
            for (kind, entry) in kinds.iter_mut() {
                entry.enabled_by_default =
                    matches!(kind, AnalysisKind::Sentiment | AnalysisKind::Topic);
            }
        }

        Self {
            profile,
            base_url: DEFAULT_BASE_URL.to_string(),
            kinds,
            timeouts,
            retry: RetryPolicy::new(3, 1000),
            quality: QualityGate {
                min_confidence: 0.6,
                max_errors: 2,
            },
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base: String = base_url.into();
        self.base_url = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_endpoint(mut self, kind: AnalysisKind, endpoint: impl Into<String>) -> Self {
        if let Some(entry) = self.kinds.get_mut(&kind) {
            entry.endpoint = endpoint.into();
        }
        self
    }

    pub fn with_enabled(mut self, kind: AnalysisKind, enabled: bool) -> Self {
        if let Some(entry) = self.kinds.get_mut(&kind) {
            entry.enabled_by_default = enabled;
        }
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutPolicy) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_quality_gate(mut self, quality: QualityGate) -> Self {
        self.quality = quality;
        self
    }

    /// Checks the registry for settings the orchestrator cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::NoAttempts);
        }
        if !(0.0..=1.0).contains(&self.quality.min_confidence) {
            return Err(ConfigError::ConfidenceOutOfRange(self.quality.min_confidence));
        }
        for (kind, entry) in &self.kinds {
            if entry.endpoint.trim().is_empty() {
                return Err(ConfigError::EmptyEndpoint { kind: *kind });
            }
            if entry.endpoint.starts_with('/') && !is_http_url(&self.base_url) {
                return Err(ConfigError::InvalidBaseUrl(self.base_url.clone()));
            }
        }
        Ok(())
    }

    pub fn profile(&self) -> Profile {
        self.profile
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn entry(&self, kind: AnalysisKind) -> Option<&KindEntry> {
        self.kinds.get(&kind)
    }

    /// Resolves the endpoint URL for a kind.
    ///
    /// Paths starting with `/` are joined to the base URL.
    pub fn endpoint_url(&self, kind: AnalysisKind) -> String {
        let endpoint = self
            .kinds
            .get(&kind)
            .map(|e| e.endpoint.as_str())
            .unwrap_or_else(|| kind.default_path());

        if endpoint.starts_with('/') {
            format!("{}{}", self.base_url, endpoint)
        } else {
            endpoint.to_string()
        }
    }

    /// Kinds enabled when an invocation does not say otherwise.
    pub fn default_enabled(&self) -> BTreeSet<AnalysisKind> {
        self.kinds
            .iter()
            .filter(|(_, e)| e.enabled_by_default)
            .map(|(k, _)| *k)
            .collect()
    }

    pub fn timeouts(&self) -> TimeoutPolicy {
        self.timeouts
    }

    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    pub fn quality(&self) -> QualityGate {
        self.quality
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Default for AnalysisRegistry {
    fn default() -> Self {
        Self::preset(Profile::Default)
    }
}

/// Starting set of kinds for an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPreset {
    /// Sentiment, topic, intent and next steps.
    Quick,
    /// Every kind.
    Deep,
    /// The registry's default-enabled kinds.
    #[default]
    Profile,
}

/// Per-invocation kind toggles.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSelection {
    pub preset: AnalysisPreset,
    pub enable: BTreeSet<AnalysisKind>,
    pub disable: BTreeSet<AnalysisKind>,
}

impl KindSelection {
    pub fn preset(preset: AnalysisPreset) -> Self {
        Self {
            preset,
            ..Self::default()
        }
    }

    pub fn enable(mut self, kind: AnalysisKind) -> Self {
        self.disable.remove(&kind);
        self.enable.insert(kind);
        self
    }

    pub fn disable(mut self, kind: AnalysisKind) -> Self {
        self.enable.remove(&kind);
        self.disable.insert(kind);
        self
    }

    /// Resolves the set of kinds to run against a registry.
    pub fn resolve(&self, registry: &AnalysisRegistry) -> BTreeSet<AnalysisKind> {
        let mut kinds = match self.preset {
            AnalysisPreset::Quick => [
                AnalysisKind::Sentiment,
                AnalysisKind::Topic,
                AnalysisKind::Intent,
                AnalysisKind::NextSteps,
            ]
            .into_iter()
            .collect(),
            AnalysisPreset::Deep => AnalysisKind::ALL.into_iter().collect(),
            AnalysisPreset::Profile => registry.default_enabled(),
        };

        kinds.extend(self.enable.iter().copied());
        kinds.retain(|k| !self.disable.contains(k));
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preset() {
        let registry = AnalysisRegistry::default();
        assert_eq!(registry.timeouts().per_call, Duration::from_millis(10_000));
        assert_eq!(registry.timeouts().total, Duration::from_millis(30_000));
        assert_eq!(registry.retry().max_attempts, 3);
        assert_eq!(registry.quality().max_errors, 2);

        let enabled = registry.default_enabled();
        assert_eq!(enabled.len(), 5);
        assert!(!enabled.contains(&AnalysisKind::FactCheck));
        assert!(!enabled.contains(&AnalysisKind::Clarity));
    }

    #[test]
    fn test_profiles_share_schema() {
        let production = AnalysisRegistry::preset(Profile::Production);
        assert_eq!(production.timeouts(), TimeoutPolicy::from_millis(8_000, 20_000));

        let testing = AnalysisRegistry::preset(Profile::Testing);
        assert_eq!(
            testing.default_enabled().into_iter().collect::<Vec<_>>(),
            vec![AnalysisKind::Sentiment, AnalysisKind::Topic]
        );
        assert_eq!(testing.timeouts(), TimeoutPolicy::from_millis(5_000, 10_000));
    }

    #[test]
    fn test_unknown_profile_falls_back_to_default() {
        assert_eq!(Profile::from_name("staging"), Profile::Default);
        assert_eq!(Profile::from_name("Production"), Profile::Production);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("nextSteps".parse::<AnalysisKind>(), Ok(AnalysisKind::NextSteps));
        assert_eq!("next-steps".parse::<AnalysisKind>(), Ok(AnalysisKind::NextSteps));
        assert_eq!("FACT_CHECK".parse::<AnalysisKind>(), Ok(AnalysisKind::FactCheck));
        assert!("mood".parse::<AnalysisKind>().is_err());
    }

    #[test]
    fn test_endpoint_resolution() {
        let registry = AnalysisRegistry::default()
            .with_base_url("http://localhost:3000/")
            .with_endpoint(AnalysisKind::Topic, "https://topics.example.com/classify");

        assert_eq!(
            registry.endpoint_url(AnalysisKind::NextSteps),
            "http://localhost:3000/api/llm/next-steps"
        );
        assert_eq!(
            registry.endpoint_url(AnalysisKind::Topic),
            "https://topics.example.com/classify"
        );
    }

    #[test]
    fn test_validation() {
        assert!(AnalysisRegistry::default().validate().is_ok());

        let no_attempts = AnalysisRegistry::default().with_retry(RetryPolicy::new(0, 100));
        assert_eq!(no_attempts.validate(), Err(ConfigError::NoAttempts));

        let bad_gate = AnalysisRegistry::default().with_quality_gate(QualityGate {
            min_confidence: 1.5,
            max_errors: 0,
        });
        assert!(matches!(
            bad_gate.validate(),
            Err(ConfigError::ConfidenceOutOfRange(_))
        ));

        let bare_host = AnalysisRegistry::default().with_base_url("localhost:3000");
        assert_eq!(
            bare_host.validate(),
            Err(ConfigError::InvalidBaseUrl("localhost:3000".to_string()))
        );

        // Absolute endpoints do not need a usable base URL.
        let absolute = AnalysisKind::ALL.iter().fold(bare_host, |registry, kind| {
            registry.with_endpoint(*kind, format!("https://nlp.example.com/{}", kind))
        });
        assert!(absolute.validate().is_ok());
    }

    #[test]
    fn test_default_endpoints_are_absolute() {
        let registry = AnalysisRegistry::preset(Profile::Production);
        assert_eq!(registry.base_url(), DEFAULT_BASE_URL);

        for kind in AnalysisKind::ALL {
            let url = registry.endpoint_url(kind);
            assert!(url.starts_with("http://localhost:3000/api/llm/"), "{}", url);
        }
    }

    #[test]
    fn test_selection_presets_and_toggles() {
        let registry = AnalysisRegistry::default();

        let quick = KindSelection::preset(AnalysisPreset::Quick).resolve(&registry);
        assert_eq!(quick.len(), 4);
        assert!(!quick.contains(&AnalysisKind::Coherence));

        let deep = KindSelection::preset(AnalysisPreset::Deep).resolve(&registry);
        assert_eq!(deep.len(), AnalysisKind::ALL.len());

        let custom = KindSelection::default()
            .enable(AnalysisKind::Clarity)
            .disable(AnalysisKind::Intent)
            .resolve(&registry);
        assert!(custom.contains(&AnalysisKind::Clarity));
        assert!(!custom.contains(&AnalysisKind::Intent));
    }
}
