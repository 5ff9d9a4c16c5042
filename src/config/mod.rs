//! Rest timer configuration.
//!
//! Every field has a serde default, so a configuration file only needs
//! the values it wants to change. Files are JSON and live at
//! `<config_dir>/rest-timer/config.json` unless a path is given.
//!
//! # Example
//!
//! ```
//! use rest_timer::config::RestTimerConfig;
//!
//! let config: RestTimerConfig = serde_json::from_str(r#"{"default_rest_seconds": 120}"#).unwrap();
//! assert_eq!(config.default_rest_seconds, 120);
//! assert_eq!(config.tick_interval_ms, 1000);
//! ```

pub mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::notification::NotificationContent;
use crate::types::CountdownRequest;

pub use error::ConfigError;

/// Directory name under the platform config directory.
const CONFIG_DIR_NAME: &str = "rest-timer";

/// File name of the configuration file.
const CONFIG_FILE_NAME: &str = "config.json";

/// Longest countdown accepted as a default rest.
const MAX_REST_SECONDS: u32 = 24 * 60 * 60;

fn default_rest_seconds() -> u32 {
    90
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_alarm_title() -> String {
    "休憩終了".to_string()
}

fn default_notification_id() -> String {
    "exercise.rest.complete".to_string()
}

fn default_notification_title() -> String {
    "休憩終了".to_string()
}

fn default_notification_body() -> String {
    "次のセットを始めましょう。".to_string()
}

/// How long a fired alarm keeps ringing before it stops by itself.
fn default_post_alert_seconds() -> u64 {
    9 * 60
}

/// Rest timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RestTimerConfig {
    /// Countdown length used when the host does not pass one.
    #[serde(default = "default_rest_seconds")]
    pub default_rest_seconds: u32,

    /// Period of the tick loop in milliseconds.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Title shown by the alarm when it fires.
    #[serde(default = "default_alarm_title")]
    pub alarm_title: String,

    /// Secondary alarm text.
    #[serde(default)]
    pub alarm_message: String,

    /// Logical identifier of the fallback notification.
    #[serde(default = "default_notification_id")]
    pub notification_id: String,

    #[serde(default = "default_notification_title")]
    pub notification_title: String,

    #[serde(default = "default_notification_body")]
    pub notification_body: String,

    /// Ringing window of a fired alarm in seconds.
    #[serde(default = "default_post_alert_seconds")]
    pub post_alert_seconds: u64,
}

impl Default for RestTimerConfig {
    fn default() -> Self {
        Self {
            default_rest_seconds: default_rest_seconds(),
            tick_interval_ms: default_tick_interval_ms(),
            alarm_title: default_alarm_title(),
            alarm_message: String::new(),
            notification_id: default_notification_id(),
            notification_title: default_notification_title(),
            notification_body: default_notification_body(),
            post_alert_seconds: default_post_alert_seconds(),
        }
    }
}

impl RestTimerConfig {
    /// Returns the default configuration file path, if the platform has one.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded rest timer config");
        Ok(config)
    }

    /// Loads the configuration from `path`, or from the default location.
    ///
    /// An explicit path must exist. A missing file at the default location
    /// yields the default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be loaded.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_rest_seconds < 1 || self.default_rest_seconds > MAX_REST_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "default_rest_seconds は1-{}秒の範囲で指定してください",
                MAX_REST_SECONDS
            )));
        }
        if self.tick_interval_ms < 100 || self.tick_interval_ms > 60_000 {
            return Err(ConfigError::Invalid(
                "tick_interval_ms は100-60000ミリ秒の範囲で指定してください".to_string(),
            ));
        }
        if self.alarm_title.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "alarm_title は空にできません".to_string(),
            ));
        }
        if self.notification_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "notification_id は空にできません".to_string(),
            ));
        }
        if self.notification_title.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "notification_title は空にできません".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn post_alert(&self) -> Duration {
        Duration::from_secs(self.post_alert_seconds)
    }

    /// Builds the alarm request for a countdown of `seconds`.
    pub fn countdown_request(&self, seconds: u64) -> Option<CountdownRequest> {
        CountdownRequest::new(seconds, self.alarm_title.clone(), self.alarm_message.clone())
    }

    /// Builds the fallback notification content.
    pub fn notification_content(&self) -> NotificationContent {
        NotificationContent::new(
            self.notification_id.clone(),
            self.notification_title.clone(),
            self.notification_body.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = RestTimerConfig::default();
        assert_eq!(config.default_rest_seconds, 90);
        assert_eq!(config.tick_interval_ms, 1000);
        assert_eq!(config.notification_id, "exercise.rest.complete");
        assert_eq!(config.post_alert_seconds, 540);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: RestTimerConfig =
            serde_json::from_str(r#"{"tick_interval_ms": 500}"#).unwrap();
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.default_rest_seconds, 90);
        assert_eq!(config.alarm_title, "休憩終了");
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let config = RestTimerConfig {
            tick_interval_ms: 10,
            ..RestTimerConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = RestTimerConfig {
            default_rest_seconds: 0,
            ..RestTimerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = RestTimerConfig {
            notification_id: "  ".to_string(),
            ..RestTimerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_rest_seconds": 45, "alarm_title": "Go"}"#).unwrap();

        let config = RestTimerConfig::load(&path).unwrap();
        assert_eq!(config.default_rest_seconds, 45);
        assert_eq!(config.alarm_title, "Go");
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = RestTimerConfig::load(&path).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn test_load_or_default_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let err = RestTimerConfig::load_or_default(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_countdown_request_and_content() {
        let config = RestTimerConfig::default();
        let request = config.countdown_request(60).unwrap();
        assert_eq!(request.duration_seconds(), 60);
        assert_eq!(request.title(), config.alarm_title);
        assert!(config.countdown_request(0).is_none());

        let content = config.notification_content();
        assert_eq!(content.identifier(), "exercise.rest.complete");
        assert_eq!(content.body(), "次のセットを始めましょう。");
    }
}
