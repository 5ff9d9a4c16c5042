//! In-process notification backend.
//!
//! Each scheduled notification is a tokio task that sleeps until its
//! timestamp and then delivers the content on a channel. The host decides
//! how to present delivered content (the CLI prints it with a bell).
//! The wait re-checks the wall clock, so a timestamp that passed while the
//! host was asleep fires within a second of waking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{NotificationBackend, NotificationContent, NotificationError};
use crate::clock::{deadline_after, sleep_until_wall, Clock};

/// Notification backend that delivers on an mpsc channel.
pub struct LocalNotifier {
    clock: Arc<dyn Clock>,
    delivered: mpsc::UnboundedSender<NotificationContent>,
    pending: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl LocalNotifier {
    /// Creates a notifier that measures delays against `clock`.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        delivered: mpsc::UnboundedSender<NotificationContent>,
    ) -> Self {
        Self {
            clock,
            delivered,
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Number of notifications still waiting to fire.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl NotificationBackend for LocalNotifier {
    fn schedule_at(
        &self,
        at: DateTime<Utc>,
        content: &NotificationContent,
    ) -> Result<(), NotificationError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| NotificationError::NotAvailable)?;

        // A timestamp already in the past fires on the next poll.
        let delay = (at - self.clock.now()).to_std().unwrap_or_default();
        let deadline = deadline_after(delay);
        let clock = Arc::clone(&self.clock);
        let sender = self.delivered.clone();
        let payload = content.clone();
        let task = runtime.spawn(async move {
            sleep_until_wall(clock.as_ref(), Some(at), deadline).await;
            tracing::debug!(id = payload.identifier(), "delivering rest notification");
            let _ = sender.send(payload);
        });

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.insert(content.identifier().to_string(), task) {
            previous.abort();
        }
        tracing::debug!(id = content.identifier(), %at, "scheduled rest notification");
        Ok(())
    }

    fn cancel_pending(&self) -> Result<(), NotificationError> {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in pending.drain() {
            task.abort();
        }
        Ok(())
    }
}

impl Drop for LocalNotifier {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, task) in pending.drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, WALL_CLOCK_RECHECK};
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;

    fn create_notifier() -> (
        LocalNotifier,
        Arc<ManualClock>,
        mpsc::UnboundedReceiver<NotificationContent>,
    ) {
        let clock = Arc::new(ManualClock::default());
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = LocalNotifier::new(clock.clone(), tx);
        (notifier, clock, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_at_timestamp() {
        let (notifier, clock, mut rx) = create_notifier();
        let content = NotificationContent::new("rest", "休憩終了", "");

        notifier
            .schedule_at(clock.now() + ChronoDuration::seconds(10), &content)
            .unwrap();

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(rx.try_recv().unwrap(), content);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_identifier_replaces_previous() {
        let (notifier, clock, mut rx) = create_notifier();
        let first = NotificationContent::new("rest", "first", "");
        let second = NotificationContent::new("rest", "second", "");

        notifier
            .schedule_at(clock.now() + ChronoDuration::seconds(5), &first)
            .unwrap();
        notifier
            .schedule_at(clock.now() + ChronoDuration::seconds(8), &second)
            .unwrap();
        assert_eq!(notifier.pending_count(), 1);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(rx.try_recv().unwrap().title(), "second");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_pending() {
        let (notifier, clock, mut rx) = create_notifier();
        let content = NotificationContent::new("rest", "休憩終了", "");

        notifier
            .schedule_at(clock.now() + ChronoDuration::seconds(3), &content)
            .unwrap();
        notifier.cancel_pending().unwrap();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(rx.try_recv().is_err());
        assert_eq!(notifier.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivers_promptly_after_host_sleep() {
        let (notifier, clock, mut rx) = create_notifier();
        let content = NotificationContent::new("rest", "休憩終了", "");

        notifier
            .schedule_at(clock.now() + ChronoDuration::seconds(120), &content)
            .unwrap();

        // Suspended: the wall clock passed the timestamp, tokio time did not
        clock.advance_secs(125);
        tokio::time::sleep(WALL_CLOCK_RECHECK + Duration::from_millis(10)).await;
        assert_eq!(rx.try_recv().unwrap(), content);
    }

    #[test]
    fn test_schedule_outside_runtime_fails() {
        let (notifier, clock, _rx) = create_notifier();
        let content = NotificationContent::new("rest", "休憩終了", "");

        let result = notifier.schedule_at(clock.now(), &content);
        assert_eq!(result, Err(NotificationError::NotAvailable));
    }
}
