//! Configuration loading, validation, and management for Deliberate.
//!
//! Loads configuration from `~/.deliberate/config.toml` with environment
//! variable overrides. Validates all settings before a run starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.deliberate/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion service settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Control loop settings
    #[serde(default)]
    pub agent: AgentSettings,

    /// Stop gating policy
    #[serde(default)]
    pub stop_policy: StopPolicyConfig,

    /// Output extractor settings
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Backend kind: "ollama", "openai", "openrouter", or a custom
    /// OpenAI-compatible name (requires `base_url`)
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Bounded wait for every completion call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider_kind() -> String {
    "ollama".into()
}
fn default_model() -> String {
    "llama3.2".into()
}
fn default_timeout_secs() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            base_url: None,
            model: default_model(),
            api_key: None,
            temperature: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Turns rendered into each prompt
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,

    #[serde(default = "default_saved_note_capacity")]
    pub saved_note_capacity: usize,

    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,

    #[serde(default = "default_decide_parse_retries")]
    pub decide_parse_retries: u32,

    #[serde(default = "default_model_error_retries")]
    pub model_error_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

fn default_max_steps() -> u32 {
    15
}
fn default_recent_turns() -> usize {
    5
}
fn default_memory_capacity() -> usize {
    100
}
fn default_saved_note_capacity() -> usize {
    20
}
fn default_summary_max_chars() -> usize {
    2000
}
fn default_decide_parse_retries() -> u32 {
    1
}
fn default_model_error_retries() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_retry_max_delay_ms() -> u64 {
    8000
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            recent_turns: default_recent_turns(),
            memory_capacity: default_memory_capacity(),
            saved_note_capacity: default_saved_note_capacity(),
            summary_max_chars: default_summary_max_chars(),
            decide_parse_retries: default_decide_parse_retries(),
            model_error_retries: default_model_error_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

/// Which stop gating policy the loop applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopPolicyKind {
    /// Stop whenever the decision asks to
    Permissive,
    /// Refuse low-confidence or unsupported stops
    ConfidenceGate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopPolicyConfig {
    #[serde(default = "default_stop_policy_kind")]
    pub kind: StopPolicyKind,

    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Phrases that mark a stop as unsupported when no capability ran
    #[serde(default = "default_insufficient_phrases")]
    pub insufficient_phrases: Vec<String>,
}

fn default_stop_policy_kind() -> StopPolicyKind {
    StopPolicyKind::ConfidenceGate
}
fn default_min_confidence() -> f64 {
    0.6
}

/// The default "insufficient information" phrase set.
pub fn default_insufficient_phrases() -> Vec<String> {
    [
        "insufficient",
        "not enough information",
        "not sufficient",
        "need more information",
        "missing information",
        "lack of information",
        "unable to determine",
        "cannot determine",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

impl Default for StopPolicyConfig {
    fn default() -> Self {
        Self {
            kind: default_stop_policy_kind(),
            min_confidence: default_min_confidence(),
            insufficient_phrases: default_insufficient_phrases(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Characters of raw answer kept when no label can be extracted
    #[serde(default = "default_fallback_chars")]
    pub fallback_chars: usize,
}

fn default_fallback_chars() -> usize {
    500
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            fallback_chars: default_fallback_chars(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.deliberate/config.toml).
    ///
    /// Environment variables override file values:
    /// - `DELIBERATE_PROVIDER`, `DELIBERATE_MODEL`, `DELIBERATE_BASE_URL`
    /// - `DELIBERATE_API_KEY` (then `OPENAI_API_KEY`, `OPENROUTER_API_KEY`)
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through a lookup function.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(kind) = lookup("DELIBERATE_PROVIDER") {
            self.provider.kind = kind;
        }
        if let Some(model) = lookup("DELIBERATE_MODEL") {
            self.provider.model = model;
        }
        if let Some(url) = lookup("DELIBERATE_BASE_URL") {
            self.provider.base_url = Some(url);
        }
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("DELIBERATE_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".deliberate")
    }

    /// Get the configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_steps == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_steps must be at least 1".into(),
            ));
        }

        if self.agent.memory_capacity == 0 || self.agent.saved_note_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "memory capacities must be at least 1".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.stop_policy.min_confidence) {
            return Err(ConfigError::ValidationError(
                "stop_policy.min_confidence must be between 0.0 and 1.0".into(),
            ));
        }

        if let Some(t) = self.provider.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.provider.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "provider.timeout_secs must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            agent: AgentSettings::default(),
            stop_policy: StopPolicyConfig::default(),
            extractor: ExtractorConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
