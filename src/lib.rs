//! Rest Timer Library
//!
//! This library provides the rest countdown used between training sets.
//! It includes:
//! - Timer engine with wall-clock anchored countdown and pause/resume
//! - Alarm backend trait with an in-process implementation and a mock
//! - Notification fallback for when alarms are denied or fail
//! - Injectable clock for deterministic tests
//! - JSON configuration and CLI utilities

pub mod alarm;
pub mod cli;
pub mod clock;
pub mod config;
pub mod notification;
pub mod timer;
pub mod types;

// Re-export commonly used types for convenience
pub use types::{AlertRoute, AuthorizationStatus, CountdownRequest, RestPhase, RestTimerState};

pub use alarm::{
    AlarmBackend, AlarmError, AlarmHandle, AlarmPermission, LocalAlarmBackend, MockAlarmBackend,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, RestTimerConfig};
pub use notification::{
    LocalNotifier, MockNotificationBackend, NotificationBackend, NotificationContent,
    NotificationError,
};
pub use timer::{RestEvent, RestTimer};
