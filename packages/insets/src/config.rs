//! Controller configuration.
//!
//! The defaults encode the system animation policy: durations for system bar
//! and keyboard transitions, the keyboard negotiation timeout, and the floating
//! keyboard offset. Configuration files use JSONC (JSON with `//` and `/* */`
//! comments).

use std::fs;
use std::path::Path;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ============================================================================
// Constants
// ============================================================================

/// Minimum animation duration (ms).
const MIN_DURATION_MS: u64 = 16;

/// Maximum animation duration (ms).
const MAX_DURATION_MS: u64 = 5_000;

/// Minimum keyboard negotiation timeout (ms).
const MIN_PENDING_TIMEOUT_MS: u64 = 100;

/// Maximum keyboard negotiation timeout (ms).
const MAX_PENDING_TIMEOUT_MS: u64 = 30_000;

// ============================================================================
// Controller Config
// ============================================================================

/// Configuration for the inset animation controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    /// Duration of the default system bar show animation (ms).
    pub show_duration_ms: u64,

    /// Duration of the default system bar hide animation (ms).
    pub hide_duration_ms: u64,

    /// Duration of keyboard animations when the host has animation callbacks (ms).
    pub sync_ime_duration_ms: u64,

    /// Duration of keyboard animations run off the UI thread (ms).
    pub unsync_ime_duration_ms: u64,

    /// How long a control request waits for the keyboard service (ms).
    pub pending_control_timeout_ms: u64,

    /// Bottom inset of a zero-height keyboard in its hidden position (dp).
    ///
    /// Negative values place the keyboard below the window edge so that it
    /// still slides in and out.
    pub floating_ime_bottom_inset_dp: i32,

    /// Frame interval of the off-thread animation driver and of the actor's
    /// frame ticks (ms).
    pub frame_interval_ms: u64,

    /// When true, default show/hide animations jump straight to their end state.
    pub animations_disabled: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            show_duration_ms: 275,
            hide_duration_ms: 340,
            sync_ime_duration_ms: 285,
            unsync_ime_duration_ms: 200,
            pending_control_timeout_ms: 2_000,
            floating_ime_bottom_inset_dp: -80,
            frame_interval_ms: 16,
            animations_disabled: false,
        }
    }
}

impl ControllerConfig {
    /// Parses a JSONC configuration string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ParseError`] if the content is not valid JSON
    /// after comments are stripped.
    pub fn from_jsonc_str(content: &str) -> Result<Self, ConfigError> {
        let reader = json_comments::StripComments::new(content.as_bytes());
        let config: Self = serde_json::from_reader(reader)?;
        Ok(config.sanitized())
    }

    /// Loads a JSONC configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file does not exist,
    /// [`ConfigError::IoError`] if it cannot be read and
    /// [`ConfigError::ParseError`] if it is not valid JSONC.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound);
        }
        let file = fs::File::open(path)?;
        let reader = json_comments::StripComments::new(file);
        let config: Self = serde_json::from_reader(reader)?;
        tracing::debug!(path = %path.display(), "loaded controller configuration");
        Ok(config.sanitized())
    }

    /// Clamps every duration into its supported range.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        for duration in [
            &mut self.show_duration_ms,
            &mut self.hide_duration_ms,
            &mut self.sync_ime_duration_ms,
            &mut self.unsync_ime_duration_ms,
        ] {
            *duration = (*duration).clamp(MIN_DURATION_MS, MAX_DURATION_MS);
        }
        self.pending_control_timeout_ms =
            self.pending_control_timeout_ms.clamp(MIN_PENDING_TIMEOUT_MS, MAX_PENDING_TIMEOUT_MS);
        self.frame_interval_ms = self.frame_interval_ms.clamp(1, 100);
        self
    }

    #[must_use]
    pub const fn pending_control_timeout(&self) -> Duration {
        Duration::from_millis(self.pending_control_timeout_ms)
    }

    #[must_use]
    pub const fn frame_interval(&self) -> Duration { Duration::from_millis(self.frame_interval_ms) }

    /// Generates the JSON Schema for the configuration file.
    #[must_use]
    pub fn json_schema() -> schemars::Schema { schemars::schema_for!(Self) }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur when loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// No configuration file exists at the given path.
    #[error("no configuration file found")]
    NotFound,
    /// The configuration file exists but could not be read.
    #[error("failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),
    /// The configuration file contains invalid JSON.
    #[error("failed to parse configuration file: {0}")]
    ParseError(#[from] serde_json::Error),
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_config_default() {
        let config = ControllerConfig::default();
        assert_eq!(config.show_duration_ms, 275);
        assert_eq!(config.hide_duration_ms, 340);
        assert_eq!(config.pending_control_timeout(), Duration::from_secs(2));
        assert_eq!(config.floating_ime_bottom_inset_dp, -80);
        assert!(!config.animations_disabled);
    }

    #[test]
    fn test_config_parses_jsonc() {
        let json = r#"{
            // Faster system bars
            "showDurationMs": 150,
            /* keep the rest */
            "animationsDisabled": true
        }"#;
        let config = ControllerConfig::from_jsonc_str(json).unwrap();
        assert_eq!(config.show_duration_ms, 150);
        assert_eq!(config.hide_duration_ms, 340);
        assert!(config.animations_disabled);
    }

    #[test]
    fn test_config_clamps_durations() {
        let config =
            ControllerConfig::from_jsonc_str(r#"{ "hideDurationMs": 0, "pendingControlTimeoutMs": 999999 }"#)
                .unwrap();
        assert_eq!(config.hide_duration_ms, MIN_DURATION_MS);
        assert_eq!(config.pending_control_timeout_ms, MAX_PENDING_TIMEOUT_MS);
    }

    #[test]
    fn test_config_rejects_invalid_json() {
        let result = ControllerConfig::from_jsonc_str("{ not json");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_config_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{ \"unsyncImeDurationMs\": 180 // tuned\n}}").unwrap();
        let config = ControllerConfig::from_path(file.path()).unwrap();
        assert_eq!(config.unsync_ime_duration_ms, 180);
    }

    #[test]
    fn test_config_from_missing_path() {
        let result = ControllerConfig::from_path(Path::new("/nonexistent/insets.jsonc"));
        assert!(matches!(result, Err(ConfigError::NotFound)));
    }

    #[test]
    fn test_config_schema_lists_properties() {
        let schema = serde_json::to_value(ControllerConfig::json_schema()).unwrap();
        assert_eq!(schema["title"], "ControllerConfig");
        assert!(schema["properties"]["pendingControlTimeoutMs"].is_object());
    }
}
