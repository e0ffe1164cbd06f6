// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Controller configuration.
//!
//! Configuration is plain JSON. A suite can pin it per controller with
//! [`Controller::with_config`](crate::Controller::with_config) or export it once
//! through the [`CONFIG_ENV_VAR`] environment variable and use
//! [`Controller::from_env`](crate::Controller::from_env).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable holding inline JSON for [`ControllerConfig::from_env`].
pub const CONFIG_ENV_VAR: &str = "DECOY_CONFIG";

/// Error type for config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration was provided.
    #[error("not found")]
    NotFound,
    /// Serialization/deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Catch-all error variant.
    #[error("other: {0}")]
    Other(String),
}

/// Which of several accepting expectations answers a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPriority {
    /// Earliest registered wins; later expectations queue behind it.
    #[default]
    Fifo,
    /// Most recently registered wins, so a test can override a default.
    Lifo,
}

/// Controller settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Name attached to log events, usually the test name.
    pub label: Option<String>,
    /// Expectation priority among accepting candidates.
    pub priority: MatchPriority,
    /// Whether a [`FinishGuard`](crate::FinishGuard) panics when verification fails.
    pub panic_on_drop_failure: bool,
    /// Whether successful calls are kept in the call log.
    pub record_calls: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            label: None,
            priority: MatchPriority::Fifo,
            panic_on_drop_failure: true,
            record_calls: true,
        }
    }
}

impl ControllerConfig {
    /// Parses JSON bytes; empty input yields the defaults.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Reads inline JSON from [`CONFIG_ENV_VAR`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_var(CONFIG_ENV_VAR)
    }

    /// Reads inline JSON from the named environment variable.
    pub fn from_env_var(name: &str) -> Result<Self, ConfigError> {
        match std::env::var(name) {
            Ok(raw) => Self::from_json(raw.as_bytes()),
            Err(std::env::VarError::NotPresent) => Err(ConfigError::NotFound),
            Err(e) => Err(ConfigError::Other(format!("{name}: {e}"))),
        }
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<Vec<u8>, ConfigError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Sets the label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the match priority.
    #[must_use]
    pub fn with_priority(mut self, priority: MatchPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets whether a failing guard panics.
    #[must_use]
    pub fn with_panic_on_drop_failure(mut self, enabled: bool) -> Self {
        self.panic_on_drop_failure = enabled;
        self
    }
}
