//! Configuration types

use crate::{AskError, AskResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|s| s == "true" || s == "1")
        .unwrap_or(default)
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> AskError {
    AskError::Config(ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    })
}

// ============================================================================
// RETRY CONFIG
// ============================================================================

/// Backoff policy for retryable text-generation failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `retry_index` (0-based), capped at `max_backoff`.
    pub fn backoff_for(&self, retry_index: u32) -> Duration {
        let exponent = retry_index.min(i32::MAX as u32) as i32;
        let secs =
            self.initial_backoff.as_secs_f64() * f64::from(self.backoff_multiplier).powi(exponent);
        let cap = self.max_backoff.as_secs_f64();
        if !secs.is_finite() || secs >= cap {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }

    /// Total number of calls the policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn validate(&self) -> AskResult<()> {
        if self.backoff_multiplier <= 0.0 || !self.backoff_multiplier.is_finite() {
            return Err(invalid(
                "llm_retry.backoff_multiplier",
                self.backoff_multiplier,
                "backoff_multiplier must be positive",
            ));
        }
        if self.max_backoff < self.initial_backoff {
            return Err(invalid(
                "llm_retry.max_backoff",
                format!("{:?}", self.max_backoff),
                "max_backoff must be >= initial_backoff",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// PIPELINE CONFIG
// ============================================================================

/// Tunables for one pipeline instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Turns retained per session (N)
    pub history_limit: usize,
    /// Turns rendered into the prompt context (K, K <= N)
    pub context_turns: usize,
    /// Correction attempts after the first failed execution
    pub max_correction_retries: u32,
    /// Regenerations the schema validator may request
    pub max_schema_regenerations: u32,
    /// Rows returned to the caller
    pub display_row_cap: usize,
    /// Deadline applied to each text-generation call
    pub llm_timeout: Duration,
    /// Populate `technical` on failures
    pub debug_errors: bool,
    /// Generate follow-up suggestions after successful answers
    pub suggestions_enabled: bool,
    pub llm_retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_limit: 10,
            context_turns: 4,
            max_correction_retries: 2,
            max_schema_regenerations: 2,
            display_row_cap: 50,
            llm_timeout: Duration::from_secs(60),
            debug_errors: false,
            suggestions_enabled: true,
            llm_retry: RetryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `ASKDB_HISTORY_LIMIT` (default: 10)
    /// - `ASKDB_CONTEXT_TURNS` (default: 4)
    /// - `ASKDB_MAX_CORRECTION_RETRIES` (default: 2)
    /// - `ASKDB_MAX_SCHEMA_REGENERATIONS` (default: 2)
    /// - `ASKDB_DISPLAY_ROW_CAP` (default: 50)
    /// - `ASKDB_LLM_TIMEOUT_SECS` (default: 60)
    /// - `ASKDB_DEBUG_ERRORS` (default: false)
    /// - `ASKDB_SUGGESTIONS` (default: true)
    /// - `ASKDB_LLM_MAX_RETRIES`, `ASKDB_LLM_INITIAL_BACKOFF_MS`,
    ///   `ASKDB_LLM_MAX_BACKOFF_MS`, `ASKDB_LLM_BACKOFF_MULTIPLIER`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry = defaults.llm_retry.clone();

        Self {
            history_limit: env_or("ASKDB_HISTORY_LIMIT", defaults.history_limit),
            context_turns: env_or("ASKDB_CONTEXT_TURNS", defaults.context_turns),
            max_correction_retries: env_or(
                "ASKDB_MAX_CORRECTION_RETRIES",
                defaults.max_correction_retries,
            ),
            max_schema_regenerations: env_or(
                "ASKDB_MAX_SCHEMA_REGENERATIONS",
                defaults.max_schema_regenerations,
            ),
            display_row_cap: env_or("ASKDB_DISPLAY_ROW_CAP", defaults.display_row_cap),
            llm_timeout: Duration::from_secs(env_or(
                "ASKDB_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )),
            debug_errors: env_flag("ASKDB_DEBUG_ERRORS", defaults.debug_errors),
            suggestions_enabled: env_flag("ASKDB_SUGGESTIONS", defaults.suggestions_enabled),
            llm_retry: RetryConfig {
                max_retries: env_or("ASKDB_LLM_MAX_RETRIES", retry.max_retries),
                initial_backoff: Duration::from_millis(env_or(
                    "ASKDB_LLM_INITIAL_BACKOFF_MS",
                    retry.initial_backoff.as_millis() as u64,
                )),
                max_backoff: Duration::from_millis(env_or(
                    "ASKDB_LLM_MAX_BACKOFF_MS",
                    retry.max_backoff.as_millis() as u64,
                )),
                backoff_multiplier: env_or(
                    "ASKDB_LLM_BACKOFF_MULTIPLIER",
                    retry.backoff_multiplier,
                ),
            },
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - history_limit > 0
    /// - 0 < context_turns <= history_limit
    /// - display_row_cap > 0
    /// - llm_timeout is positive
    /// - retry policy is well-formed
    pub fn validate(&self) -> AskResult<()> {
        if self.history_limit == 0 {
            return Err(invalid(
                "history_limit",
                self.history_limit,
                "history_limit must be greater than 0",
            ));
        }

        if self.context_turns == 0 || self.context_turns > self.history_limit {
            return Err(invalid(
                "context_turns",
                self.context_turns,
                "context_turns must be between 1 and history_limit",
            ));
        }

        if self.display_row_cap == 0 {
            return Err(invalid(
                "display_row_cap",
                self.display_row_cap,
                "display_row_cap must be greater than 0",
            ));
        }

        if self.llm_timeout.is_zero() {
            return Err(invalid(
                "llm_timeout",
                format!("{:?}", self.llm_timeout),
                "llm_timeout must be positive",
            ));
        }

        self.llm_retry.validate()
    }
}

// ============================================================================
// PROVIDER CONFIG
// ============================================================================

/// Supported text-generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Gemini,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
        }
    }

    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini-2.0-flash",
            ProviderKind::OpenAi => "gpt-4o-mini",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(ConfigError::ProviderNotSupported {
                provider: other.to_string(),
            }),
        }
    }
}

/// Text-generation provider configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: Option<String>,
    /// Override of the provider's base URL (OpenAI-compatible gateways, proxies)
    pub endpoint: Option<String>,
    pub requests_per_minute: u32,
}

impl ProviderConfig {
    /// Environment variables:
    /// - `ASKDB_LLM_PROVIDER`: `gemini` or `openai` (default: gemini)
    /// - `ASKDB_LLM_MODEL`: model name (default depends on provider)
    /// - `ASKDB_LLM_API_KEY`: API key
    /// - `ASKDB_LLM_ENDPOINT`: optional base URL override
    /// - `ASKDB_LLM_RPM`: client-side request ceiling (default: 60)
    pub fn from_env() -> Result<Self, ConfigError> {
        let kind = match std::env::var("ASKDB_LLM_PROVIDER") {
            Ok(raw) => raw.parse()?,
            Err(_) => ProviderKind::Gemini,
        };

        Ok(Self {
            kind,
            model: std::env::var("ASKDB_LLM_MODEL")
                .unwrap_or_else(|_| kind.default_model().to_string()),
            api_key: std::env::var("ASKDB_LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            endpoint: std::env::var("ASKDB_LLM_ENDPOINT").ok().filter(|e| !e.is_empty()),
            requests_per_minute: env_or("ASKDB_LLM_RPM", 60),
        })
    }

    pub fn validate(&self) -> AskResult<()> {
        if self.api_key.is_none() {
            return Err(AskError::Config(ConfigError::MissingRequired {
                field: "ASKDB_LLM_API_KEY".to_string(),
            }));
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model", &self.model, "model must not be empty"));
        }
        if self.requests_per_minute == 0 {
            return Err(invalid(
                "requests_per_minute",
                self.requests_per_minute,
                "requests_per_minute must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================
