//! In-process alarm backend.
//!
//! Runs the alarm countdown on tokio timers inside the current process.
//! There is a single alarm slot: scheduling replaces whatever was there.
//! When the countdown ends the alarm rings for the post-alert window or
//! until it is cancelled.
//!
//! The countdown also tracks a wall-clock deadline, so an alarm whose time
//! passed while the host was asleep rings within a second of waking.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

use super::{AlarmBackend, AlarmError, AlarmHandle};
use crate::clock::{deadline_after, sleep_until_wall, wall_after, Clock, SystemClock};
use crate::types::{AuthorizationStatus, CountdownRequest};

/// How the local backend answers authorization requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPermission {
    Grant,
    Deny,
}

#[derive(Debug, Clone, Copy)]
enum SlotPhase {
    Running {
        deadline: Instant,
        wall: Option<DateTime<Utc>>,
    },
    Paused { remaining: Duration },
    Ringing,
}

struct Slot {
    handle: AlarmHandle,
    title: String,
    phase: SlotPhase,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    permission: AlarmPermission,
    clock: Arc<dyn Clock>,
    status: Mutex<AuthorizationStatus>,
    post_alert: Duration,
    slot: Mutex<Option<Slot>>,
    alerting: watch::Sender<bool>,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Option<Slot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Alarm backend driven by tokio timers.
pub struct LocalAlarmBackend {
    inner: Arc<Inner>,
}

impl LocalAlarmBackend {
    /// Creates a backend that answers authorization with `permission` and
    /// keeps a fired alarm ringing for `post_alert`.
    #[must_use]
    pub fn new(permission: AlarmPermission, post_alert: Duration) -> Self {
        Self::with_clock(permission, post_alert, Arc::new(SystemClock))
    }

    /// Like [`LocalAlarmBackend::new`], with wall-clock deadlines read from `clock`.
    #[must_use]
    pub fn with_clock(
        permission: AlarmPermission,
        post_alert: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (alerting, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                permission,
                clock,
                status: Mutex::new(AuthorizationStatus::NotDetermined),
                post_alert,
                slot: Mutex::new(None),
                alerting,
            }),
        }
    }

    /// The handle of the alarm in the slot, if any.
    #[must_use]
    pub fn active_handle(&self) -> Option<AlarmHandle> {
        self.inner.slot().as_ref().map(|slot| slot.handle)
    }

    /// Title of the alarm in the slot, if any.
    #[must_use]
    pub fn active_title(&self) -> Option<String> {
        self.inner.slot().as_ref().map(|slot| slot.title.clone())
    }

    /// Starts a running phase that ends after `left`.
    fn start_running(&self, handle: AlarmHandle, left: Duration) -> (SlotPhase, JoinHandle<()>) {
        let deadline = deadline_after(left);
        let wall = wall_after(self.inner.clock.as_ref(), left);
        let task = self.spawn_countdown(handle, deadline, wall);
        (SlotPhase::Running { deadline, wall }, task)
    }

    fn spawn_countdown(
        &self,
        handle: AlarmHandle,
        deadline: Instant,
        wall: Option<DateTime<Utc>>,
    ) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            sleep_until_wall(inner.clock.as_ref(), wall, deadline).await;
            {
                let mut slot = inner.slot();
                match slot.as_mut() {
                    Some(current) if current.handle == handle => {
                        current.phase = SlotPhase::Ringing;
                    }
                    _ => return,
                }
            }
            tracing::info!(%handle, "rest alarm ringing");
            inner.alerting.send_replace(true);

            tokio::time::sleep(inner.post_alert).await;
            let mut slot = inner.slot();
            if matches!(slot.as_ref(), Some(current) if current.handle == handle) {
                *slot = None;
                drop(slot);
                tracing::debug!(%handle, "rest alarm stopped after post-alert window");
                inner.alerting.send_replace(false);
            }
        })
    }
}

impl AlarmBackend for LocalAlarmBackend {
    async fn request_authorization(&self) -> AuthorizationStatus {
        let mut status = self
            .inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *status == AuthorizationStatus::NotDetermined {
            *status = match self.inner.permission {
                AlarmPermission::Grant => AuthorizationStatus::Authorized,
                AlarmPermission::Deny => AuthorizationStatus::Denied,
            };
        }
        *status
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        *self
            .inner
            .status
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    async fn schedule(&self, request: &CountdownRequest) -> Result<AlarmHandle, AlarmError> {
        let status = self.authorization_status();
        if !status.is_authorized() {
            return Err(AlarmError::NotAuthorized(status));
        }
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(AlarmError::NotAvailable);
        }

        let handle = AlarmHandle::new();
        let (phase, task) =
            self.start_running(handle, Duration::from_secs(request.duration_seconds()));

        let previous = self.inner.slot().replace(Slot {
            handle,
            title: request.title().to_string(),
            phase,
            task: Some(task),
        });
        if let Some(previous) = previous {
            if let Some(task) = previous.task {
                task.abort();
            }
            if matches!(previous.phase, SlotPhase::Ringing) {
                self.inner.alerting.send_replace(false);
            }
        }

        tracing::debug!(%handle, seconds = request.duration_seconds(), "scheduled rest alarm");
        Ok(handle)
    }

    async fn pause(&self, handle: &AlarmHandle) -> Result<(), AlarmError> {
        let mut slot = self.inner.slot();
        let current = match slot.as_mut() {
            Some(current) if current.handle == *handle => current,
            _ => return Err(AlarmError::UnknownHandle(*handle)),
        };
        if let SlotPhase::Running { deadline, wall } = current.phase {
            if let Some(task) = current.task.take() {
                task.abort();
            }
            let mut remaining = deadline.saturating_duration_since(Instant::now());
            if let Some(wall) = wall {
                let wall_left = (wall - self.inner.clock.now()).to_std().unwrap_or_default();
                remaining = remaining.min(wall_left);
            }
            current.phase = SlotPhase::Paused { remaining };
        }
        Ok(())
    }

    async fn resume(&self, handle: &AlarmHandle) -> Result<(), AlarmError> {
        let mut slot = self.inner.slot();
        let current = match slot.as_mut() {
            Some(current) if current.handle == *handle => current,
            _ => return Err(AlarmError::UnknownHandle(*handle)),
        };
        if let SlotPhase::Paused { remaining } = current.phase {
            let (phase, task) = self.start_running(*handle, remaining);
            current.phase = phase;
            current.task = Some(task);
        }
        Ok(())
    }

    async fn cancel(&self, handle: &AlarmHandle) -> Result<(), AlarmError> {
        let removed = {
            let mut slot = self.inner.slot();
            match slot.as_ref() {
                Some(current) if current.handle == *handle => slot.take(),
                _ => None,
            }
        };
        let removed = removed.ok_or(AlarmError::UnknownHandle(*handle))?;
        if let Some(task) = removed.task {
            task.abort();
        }
        if matches!(removed.phase, SlotPhase::Ringing) {
            self.inner.alerting.send_replace(false);
        }
        Ok(())
    }

    fn is_alerting(&self) -> bool {
        *self.inner.alerting.borrow()
    }

    fn watch_alerting(&self) -> watch::Receiver<bool> {
        self.inner.alerting.subscribe()
    }
}

impl Drop for LocalAlarmBackend {
    fn drop(&mut self) {
        if let Some(slot) = self.inner.slot().take() {
            if let Some(task) = slot.task {
                task.abort();
            }
        }
    }
}
