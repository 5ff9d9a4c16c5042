//! Alarm backend error types.

use thiserror::Error;

use super::AlarmHandle;
use crate::types::AuthorizationStatus;

/// Errors that can occur in an alarm backend.
///
/// None of these reach the caller of the rest timer: a failed schedule
/// falls back to a notification, and failed pause/resume/cancel calls are
/// logged and dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AlarmError {
    /// Alarms are not authorized.
    #[error("アラームが許可されていません（状態: {}）", .0.as_str())]
    NotAuthorized(AuthorizationStatus),

    /// The platform refused or failed to schedule the alarm.
    #[error("アラームのスケジュールに失敗しました: {0}")]
    ScheduleFailed(String),

    /// The handle does not refer to the active alarm.
    #[error("アラーム {0} は存在しません")]
    UnknownHandle(AlarmHandle),

    /// The backend cannot run in the current context.
    #[error("アラーム機能が利用できません")]
    NotAvailable,
}

impl AlarmError {
    /// Returns true if this error is related to authorization.
    #[must_use]
    pub fn is_permission_error(&self) -> bool {
        matches!(self, Self::NotAuthorized(_))
    }

    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::NotAuthorized(_) => "システム設定でアラームを許可してください",
            Self::ScheduleFailed(_) => "しばらくしてから再度お試しください",
            Self::UnknownHandle(_) => "アラームは既に終了しています",
            Self::NotAvailable => "非同期ランタイム内で実行してください",
        }
    }
}
