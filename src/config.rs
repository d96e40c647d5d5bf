//! Configuration file handling.
//!
//! This module handles loading `.narralyze.toml` files and layering them on
//! top of a named profile. Values present in the file override the profile;
//! CLI arguments override the file.

use crate::detector::DetectorConfig;
use crate::registry::{
    AnalysisKind, AnalysisRegistry, Profile, QualityGate, RetryPolicy, TimeoutPolicy,
    DEFAULT_BASE_URL,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::warn;

/// Default config file name, looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = ".narralyze.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// Per-kind enabled overrides, keyed by kind name.
    #[serde(default)]
    pub analyses: BTreeMap<String, bool>,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub thresholds: ThresholdsConfig,

    #[serde(default)]
    pub detector: DetectorConfig,
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Profile to start from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,

    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative_goal: Option<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            profile: None,
            output: default_output(),
            verbose: false,
            target_audience: None,
            narrative_goal: None,
        }
    }
}

fn default_output() -> String {
    "narralyze_report.md".to_string()
}

/// Endpoint locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    /// Base URL that relative endpoint paths are resolved against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Per-kind endpoint overrides (a path or an absolute URL).
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub individual_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_errors: Option<usize>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Resolves the profile.
    ///
    /// `requested` comes from `--profile` or `NARRALYZE_PROFILE`; without it
    /// the file's profile applies, then development.
    pub fn resolve_profile(&self, requested: Option<&str>) -> Profile {
        requested
            .or(self.general.profile.as_deref())
            .map(Profile::from_name)
            .unwrap_or_default()
    }

    /// Builds the registry for a profile with this file's overrides applied.
    pub fn registry(&self, profile: Profile) -> Result<AnalysisRegistry> {
        let mut registry = AnalysisRegistry::preset(profile);

        if let Some(ref base_url) = self.endpoints.base_url {
            registry = registry.with_base_url(base_url.clone());
        }
        for (name, endpoint) in &self.endpoints.paths {
            let kind: AnalysisKind = name
                .parse()
                .with_context(|| format!("Invalid [endpoints.paths] entry '{}'", name))?;
            registry = registry.with_endpoint(kind, endpoint.clone());
        }

        for (name, enabled) in &self.analyses {
            let kind: AnalysisKind = name
                .parse()
                .with_context(|| format!("Invalid [analyses] entry '{}'", name))?;
            registry = registry.with_enabled(kind, *enabled);
        }

        let timeouts = registry.timeouts();
        registry = registry.with_timeouts(TimeoutPolicy::from_millis(
            self.timeouts
                .individual_ms
                .unwrap_or(timeouts.per_call.as_millis() as u64),
            self.timeouts
                .total_ms
                .unwrap_or(timeouts.total.as_millis() as u64),
        ));

        let retry = registry.retry();
        registry = registry.with_retry(RetryPolicy::new(
            self.retry.max_attempts.unwrap_or(retry.max_attempts),
            self.retry
                .delay_ms
                .unwrap_or(retry.delay.as_millis() as u64),
        ));

        let quality = registry.quality();
        registry = registry.with_quality_gate(QualityGate {
            min_confidence: self
                .thresholds
                .min_confidence
                .unwrap_or(quality.min_confidence),
            max_errors: self.thresholds.max_errors.unwrap_or(quality.max_errors),
        });

        if registry.timeouts().total < registry.timeouts().per_call {
            warn!(
                "Total timeout {}ms is shorter than the per-call timeout {}ms",
                registry.timeouts().total.as_millis(),
                registry.timeouts().per_call.as_millis()
            );
        }

        registry.validate().context("Invalid analysis configuration")?;
        Ok(registry)
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// This method only overrides config when CLI provides explicit values.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.endpoints.base_url = Some(endpoint.clone());
        }

        if let Some(timeout) = args.timeout {
            self.timeouts.individual_ms = Some(timeout);
        }
        if let Some(total) = args.total_timeout {
            self.timeouts.total_ms = Some(total);
        }
        if let Some(max_attempts) = args.max_attempts {
            self.retry.max_attempts = Some(max_attempts);
        }
        if let Some(max_errors) = args.max_errors {
            self.thresholds.max_errors = Some(max_errors);
        }
        if let Some(min_confidence) = args.min_confidence {
            self.thresholds.min_confidence = Some(min_confidence);
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.audience.is_some() {
            self.general.target_audience = args.audience.clone();
        }
        if args.goal.is_some() {
            self.general.narrative_goal = args.goal.clone();
        }

        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Renders a starter configuration file with the development profile's
    /// values spelled out.
    pub fn default_toml() -> String {
        let profile = Profile::Development;
        let registry = AnalysisRegistry::preset(profile);
        let timeouts = registry.timeouts();
        let retry = registry.retry();
        let quality = registry.quality();

        let config = Config {
            general: GeneralConfig {
                profile: Some(profile.as_str().to_string()),
                ..GeneralConfig::default()
            },
            endpoints: EndpointsConfig {
                base_url: Some(DEFAULT_BASE_URL.to_string()),
                paths: BTreeMap::new(),
            },
            analyses: AnalysisKind::ALL
                .iter()
                .map(|kind| {
                    let enabled = registry
                        .entry(*kind)
                        .map(|e| e.enabled_by_default)
                        .unwrap_or(false);
                    (kind.as_str().to_string(), enabled)
                })
                .collect(),
            timeouts: TimeoutsConfig {
                individual_ms: Some(timeouts.per_call.as_millis() as u64),
                total_ms: Some(timeouts.total.as_millis() as u64),
            },
            retry: RetryConfig {
                max_attempts: Some(retry.max_attempts),
                delay_ms: Some(retry.delay.as_millis() as u64),
            },
            thresholds: ThresholdsConfig {
                min_confidence: Some(quality.min_confidence),
                max_errors: Some(quality.max_errors),
            },
            detector: DetectorConfig::default(),
        };

        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
