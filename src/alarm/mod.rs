//! Alarm backend for the rest timer.
//!
//! An alarm is the preferred completion signal: a countdown alert owned by
//! the platform that fires even while the host is suspended and can be
//! paused and resumed on its own. The backend also reports whether an
//! alarm is currently ringing so the host can offer a stop control.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐  Schedule/Pause/  ┌──────────────────┐
//! │    RestTimer     │──Resume/Cancel───▶│ AlarmDispatcher  │
//! └────────┬─────────┘   (in order)      └────────┬─────────┘
//!          │                                      │
//!          │ fallback                             ▼
//!          ▼                             ┌──────────────────┐
//! ┌──────────────────┐                   │   AlarmBackend   │
//! │NotificationBackend│                  │ (Local / Mock)   │
//! └──────────────────┘                   └──────────────────┘
//! ```

pub mod error;
mod local;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::types::{AuthorizationStatus, CountdownRequest};

pub use self::error::AlarmError;
pub use self::local::{AlarmPermission, LocalAlarmBackend};

// ============================================================================
// AlarmHandle
// ============================================================================

/// Identifier of a scheduled alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmHandle(Uuid);

impl AlarmHandle {
    /// Creates a fresh random handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AlarmHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AlarmHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// AlarmBackend
// ============================================================================

/// Platform capability to fire a countdown alert.
///
/// Futures are `Send` so the dispatcher can drive them from a spawned task.
pub trait AlarmBackend: Send + Sync + 'static {
    /// Asks the user for alarm permission if needed and caches the answer.
    fn request_authorization(&self) -> impl Future<Output = AuthorizationStatus> + Send;

    /// The cached authorization status.
    fn authorization_status(&self) -> AuthorizationStatus;

    /// Schedules a countdown alert.
    ///
    /// # Errors
    ///
    /// Fails when alarms are not authorized or the platform refuses.
    fn schedule(
        &self,
        request: &CountdownRequest,
    ) -> impl Future<Output = Result<AlarmHandle, AlarmError>> + Send;

    fn pause(&self, handle: &AlarmHandle) -> impl Future<Output = Result<(), AlarmError>> + Send;

    fn resume(&self, handle: &AlarmHandle)
        -> impl Future<Output = Result<(), AlarmError>> + Send;

    /// Cancels a scheduled alarm and silences it if it is ringing.
    fn cancel(&self, handle: &AlarmHandle)
        -> impl Future<Output = Result<(), AlarmError>> + Send;

    /// Returns true while an alarm is ringing.
    fn is_alerting(&self) -> bool;

    /// Subscribes to ringing state changes.
    fn watch_alerting(&self) -> watch::Receiver<bool>;
}

// ============================================================================
// MockAlarmBackend
// ============================================================================

#[derive(Debug)]
pub struct MockAlarmBackend {
    grant: Mutex<AuthorizationStatus>,
    status: Mutex<AuthorizationStatus>,
    schedule_delay: Mutex<Option<Duration>>,
    should_fail: AtomicBool,
    authorization_requests: AtomicUsize,
    scheduled: Mutex<Vec<(AlarmHandle, CountdownRequest)>>,
    paused: Mutex<Vec<AlarmHandle>>,
    resumed: Mutex<Vec<AlarmHandle>>,
    cancelled: Mutex<Vec<AlarmHandle>>,
    alerting: watch::Sender<bool>,
}

impl MockAlarmBackend {
    /// Creates a mock that grants authorization when asked.
    #[must_use]
    pub fn new() -> Self {
        let (alerting, _) = watch::channel(false);
        Self {
            grant: Mutex::new(AuthorizationStatus::Authorized),
            status: Mutex::new(AuthorizationStatus::NotDetermined),
            schedule_delay: Mutex::new(None),
            should_fail: AtomicBool::new(false),
            authorization_requests: AtomicUsize::new(0),
            scheduled: Mutex::new(Vec::new()),
            paused: Mutex::new(Vec::new()),
            resumed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            alerting,
        }
    }

    /// Sets the answer `request_authorization` will give.
    pub fn set_authorization(&self, status: AuthorizationStatus) {
        *self.grant.lock().unwrap() = status;
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Makes `schedule` sleep before resolving.
    pub fn set_schedule_delay(&self, delay: Option<Duration>) {
        *self.schedule_delay.lock().unwrap() = delay;
    }

    /// Simulates an alarm starting or stopping to ring.
    pub fn set_alerting(&self, alerting: bool) {
        self.alerting.send_replace(alerting);
    }

    #[must_use]
    pub fn authorization_request_count(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn schedule_count(&self) -> usize {
        self.scheduled.lock().unwrap().len()
    }

    #[must_use]
    pub fn scheduled(&self) -> Vec<(AlarmHandle, CountdownRequest)> {
        self.scheduled.lock().unwrap().clone()
    }

    #[must_use]
    pub fn scheduled_handles(&self) -> Vec<AlarmHandle> {
        self.scheduled
            .lock()
            .unwrap()
            .iter()
            .map(|(handle, _)| *handle)
            .collect()
    }

    #[must_use]
    pub fn paused(&self) -> Vec<AlarmHandle> {
        self.paused.lock().unwrap().clone()
    }

    #[must_use]
    pub fn resumed(&self) -> Vec<AlarmHandle> {
        self.resumed.lock().unwrap().clone()
    }

    /// How many times `handle` was cancelled.
    #[must_use]
    pub fn cancel_count_for(&self, handle: &AlarmHandle) -> usize {
        self.cancelled
            .lock()
            .unwrap()
            .iter()
            .filter(|cancelled| *cancelled == handle)
            .count()
    }
}

impl Default for MockAlarmBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AlarmBackend for MockAlarmBackend {
    async fn request_authorization(&self) -> AuthorizationStatus {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        let granted = *self.grant.lock().unwrap();
        *self.status.lock().unwrap() = granted;
        granted
    }

    fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock().unwrap()
    }

    async fn schedule(&self, request: &CountdownRequest) -> Result<AlarmHandle, AlarmError> {
        let delay = *self.schedule_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(AlarmError::ScheduleFailed("Mock failure".to_string()));
        }
        let status = self.authorization_status();
        if !status.is_authorized() {
            return Err(AlarmError::NotAuthorized(status));
        }
        let handle = AlarmHandle::new();
        self.scheduled
            .lock()
            .unwrap()
            .push((handle, request.clone()));
        Ok(handle)
    }

    async fn pause(&self, handle: &AlarmHandle) -> Result<(), AlarmError> {
        self.paused.lock().unwrap().push(*handle);
        Ok(())
    }

    async fn resume(&self, handle: &AlarmHandle) -> Result<(), AlarmError> {
        self.resumed.lock().unwrap().push(*handle);
        Ok(())
    }

    async fn cancel(&self, handle: &AlarmHandle) -> Result<(), AlarmError> {
        self.cancelled.lock().unwrap().push(*handle);
        self.alerting.send_replace(false);
        Ok(())
    }

    fn is_alerting(&self) -> bool {
        *self.alerting.borrow()
    }

    fn watch_alerting(&self) -> watch::Receiver<bool> {
        self.alerting.subscribe()
    }
}
