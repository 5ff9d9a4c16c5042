//! Notification backend for the rest timer.
//!
//! A notification is the fallback completion signal: a one-shot alert at
//! an absolute timestamp, used when the alarm backend is not authorized or
//! fails to schedule. Unlike an alarm it cannot be paused, only replaced or
//! cancelled.
//!
//! - [`LocalNotifier`] delivers in-process on a channel
//! - [`MockNotificationBackend`] records calls for tests

mod content;
pub mod error;
mod local;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

pub use self::content::NotificationContent;
pub use self::error::NotificationError;
pub use self::local::LocalNotifier;

/// Platform capability to fire a one-shot alert at a future time.
///
/// Calls are synchronous and cheap; the rest timer invokes them while
/// holding its state lock.
pub trait NotificationBackend: Send + Sync + 'static {
    /// Schedules `content` to fire at `at`.
    ///
    /// Replaces any pending notification with the same identifier.
    fn schedule_at(
        &self,
        at: DateTime<Utc>,
        content: &NotificationContent,
    ) -> Result<(), NotificationError>;

    /// Removes every pending notification.
    fn cancel_pending(&self) -> Result<(), NotificationError>;
}

/// A notification recorded by [`MockNotificationBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledNotification {
    pub at: DateTime<Utc>,
    pub content: NotificationContent,
}

#[derive(Debug, Default)]
pub struct MockNotificationBackend {
    scheduled: Mutex<Vec<ScheduledNotification>>,
    pending: Mutex<Option<ScheduledNotification>>,
    cancel_calls: AtomicUsize,
    should_fail: AtomicBool,
}

impl MockNotificationBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Every successful `schedule_at` call, in order.
    #[must_use]
    pub fn scheduled(&self) -> Vec<ScheduledNotification> {
        self.scheduled.lock().unwrap().clone()
    }

    #[must_use]
    pub fn schedule_count(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    /// The notification that would still fire, if any.
    #[must_use]
    pub fn pending(&self) -> Option<ScheduledNotification> {
        self.pending.lock().unwrap().clone()
    }

    #[must_use]
    pub fn cancel_count(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

impl NotificationBackend for MockNotificationBackend {
    fn schedule_at(
        &self,
        at: DateTime<Utc>,
        content: &NotificationContent,
    ) -> Result<(), NotificationError> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::ScheduleFailed("Mock failure".to_string()));
        }
        let record = ScheduledNotification {
            at,
            content: content.clone(),
        };
        self.scheduled.lock().unwrap().push(record.clone());
        *self.pending.lock().unwrap() = Some(record);
        Ok(())
    }

    fn cancel_pending(&self) -> Result<(), NotificationError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(NotificationError::NotAvailable);
        }
        *self.pending.lock().unwrap() = None;
        Ok(())
    }
}
