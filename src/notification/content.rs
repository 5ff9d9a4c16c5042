//! Notification content.

use serde::{Deserialize, Serialize};

/// Maximum length of a notification title.
const MAX_TITLE_LENGTH: usize = 100;

/// Content of a rest-complete notification.
///
/// The identifier is the logical slot: scheduling a second notification
/// with the same identifier replaces the first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    identifier: String,
    title: String,
    body: String,
}

impl NotificationContent {
    /// Creates notification content, truncating an overlong title.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            title: truncate_title(title.into()),
            body: body.into(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &str {
        &self.body
    }
}

fn truncate_title(title: String) -> String {
    if title.chars().count() <= MAX_TITLE_LENGTH {
        return title;
    }
    title.chars().take(MAX_TITLE_LENGTH).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let content = NotificationContent::new("rest", "休憩終了", "次のセット");
        assert_eq!(content.identifier(), "rest");
        assert_eq!(content.title(), "休憩終了");
        assert_eq!(content.body(), "次のセット");
    }

    #[test]
    fn test_title_is_truncated_by_chars() {
        let long = "休".repeat(150);
        let content = NotificationContent::new("rest", long, "");
        assert_eq!(content.title().chars().count(), MAX_TITLE_LENGTH);
    }
}
