//! Typed configuration for the orchestrator and store bindings.
//!
//! Both structs deserialize with per-field defaults, so an application can
//! embed a partial JSON object (or nothing at all). Native hosts can also read
//! the orchestrator settings from the environment.

use serde::Deserialize;

/// Value substituted for a fragment segment written as `key` instead of
/// `key=value`.
pub const DEFAULT_MISSING_VALUE_PLACEHOLDER: &str = "UNKNOWN";
/// Key written and removed by the local storage availability probe.
pub const DEFAULT_STORAGE_PROBE_KEY: &str = "__storage_test__";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub missing_value_placeholder: String,
    pub storage_probe_key: String,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            missing_value_placeholder: DEFAULT_MISSING_VALUE_PLACEHOLDER.to_owned(),
            storage_probe_key: DEFAULT_STORAGE_PROBE_KEY.to_owned(),
        }
    }
}

impl RetentionConfig {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `KEEPSAKE_MISSING_VALUE_PLACEHOLDER`: default `UNKNOWN`
    /// - `KEEPSAKE_STORAGE_PROBE_KEY`: default `__storage_test__`
    ///
    /// Empty values are ignored.
    pub fn from_env() -> Self {
        Self {
            missing_value_placeholder: env_or(
                "KEEPSAKE_MISSING_VALUE_PLACEHOLDER",
                DEFAULT_MISSING_VALUE_PLACEHOLDER,
            ),
            storage_probe_key: env_or("KEEPSAKE_STORAGE_PROBE_KEY", DEFAULT_STORAGE_PROBE_KEY),
        }
    }
}

/// Per-binding persistence options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PersistOptions {
    /// Obfuscate persisted entries.
    pub safeguard: bool,
    /// Observe local storage changes made by other windows. Only applies to
    /// keys owned by local storage; pair it with throttling or debouncing when
    /// the value changes rapidly.
    pub cross_window: bool,
}

impl PersistOptions {
    #[must_use]
    pub fn safeguarded(mut self) -> Self {
        self.safeguard = true;
        self
    }

    #[must_use]
    pub fn cross_window(mut self) -> Self {
        self.cross_window = true;
        self
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_owned(),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
