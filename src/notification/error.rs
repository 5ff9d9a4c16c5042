//! Notification backend error types.

use thiserror::Error;

/// Errors that can occur in a notification backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Failed to schedule a notification.
    #[error("通知のスケジュールに失敗しました: {0}")]
    ScheduleFailed(String),

    /// The backend cannot run in the current context.
    #[error("通知センターが利用できません")]
    NotAvailable,
}

impl NotificationError {
    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::ScheduleFailed(_) => "通知センターを確認してください",
            Self::NotAvailable => "非同期ランタイム内で実行してください",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NotificationError::ScheduleFailed("queue full".to_string());
        assert!(err.to_string().contains("queue full"));

        let err = NotificationError::NotAvailable;
        assert_eq!(err.to_string(), "通知センターが利用できません");
    }

    #[test]
    fn test_suggestion() {
        assert_ne!(
            NotificationError::NotAvailable.suggestion(),
            NotificationError::ScheduleFailed("x".into()).suggestion()
        );
    }
}
