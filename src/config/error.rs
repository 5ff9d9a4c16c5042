//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the rest timer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("設定ファイル '{}' を読み込めません: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the expected schema.
    #[error("設定ファイル '{}' の形式が不正です: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of range.
    #[error("無効な設定値: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Returns true if the file exists but could not be parsed.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::Io { .. } => "ファイルのパスと権限を確認してください",
            Self::Parse { .. } => "JSONの構文とフィールド名を確認してください",
            Self::Invalid(_) => "設定値の範囲を確認してください",
        }
    }
}
