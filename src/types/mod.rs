//! Core data types for the rest timer.
//!
//! This module defines the data structures used for:
//! - Countdown state snapshots published to the host
//! - Alarm authorization status
//! - Countdown requests handed to the alarm backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// RestPhase
// ============================================================================

/// The state machine position of the rest timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestPhase {
    /// No countdown in progress
    #[default]
    Idle,
    /// Counting down
    Resting,
    /// Countdown frozen by the user
    Paused,
}

impl RestPhase {
    /// Returns the string representation of the phase.
    pub fn as_str(&self) -> &'static str {
        match self {
            RestPhase::Idle => "idle",
            RestPhase::Resting => "resting",
            RestPhase::Paused => "paused",
        }
    }
}

// ============================================================================
// AuthorizationStatus
// ============================================================================

/// Alarm authorization as reported by the alarm backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    #[default]
    NotDetermined,
    /// Alarms may be scheduled
    Authorized,
    /// The user refused alarms
    Denied,
}

impl AuthorizationStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::NotDetermined => "not_determined",
            AuthorizationStatus::Authorized => "authorized",
            AuthorizationStatus::Denied => "denied",
        }
    }

    /// Returns true if alarms may be scheduled.
    pub fn is_authorized(&self) -> bool {
        matches!(self, AuthorizationStatus::Authorized)
    }
}

// ============================================================================
// AlertRoute
// ============================================================================

/// The backend that ended up armed to signal the end of a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertRoute {
    /// A system-level alarm that supports pause and resume
    Alarm,
    /// A one-shot notification at the absolute end time
    Notification,
}

impl AlertRoute {
    /// Returns the string representation of the route.
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertRoute::Alarm => "alarm",
            AlertRoute::Notification => "notification",
        }
    }
}

// ============================================================================
// CountdownRequest
// ============================================================================

/// A countdown alert to schedule on the alarm backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownRequest {
    duration_seconds: u64,
    title: String,
    message: String,
}

impl CountdownRequest {
    /// Creates a new request.
    ///
    /// Returns `None` if `duration_seconds` is zero.
    pub fn new(
        duration_seconds: u64,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Option<Self> {
        if duration_seconds == 0 {
            return None;
        }
        Some(Self {
            duration_seconds,
            title: title.into(),
            message: message.into(),
        })
    }

    /// Returns a copy of this request with a different duration.
    ///
    /// Returns `None` if `duration_seconds` is zero.
    pub fn with_duration_seconds(&self, duration_seconds: u64) -> Option<Self> {
        Self::new(duration_seconds, self.title.clone(), self.message.clone())
    }

    pub fn duration_seconds(&self) -> u64 {
        self.duration_seconds
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

// ============================================================================
// RestTimerState
// ============================================================================

/// Snapshot of the rest countdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestTimerState {
    /// A countdown is in progress (running or paused)
    pub is_resting: bool,
    /// The countdown is frozen
    pub is_paused: bool,
    /// Length of the countdown as started
    pub total_seconds: u64,
    /// Seconds left, derived from the end timestamp
    pub remaining_seconds: u64,
    /// Absolute end time of the running countdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<DateTime<Utc>>,
}

impl RestTimerState {
    /// Returns the state machine position for this snapshot.
    pub fn phase(&self) -> RestPhase {
        match (self.is_resting, self.is_paused) {
            (false, _) => RestPhase::Idle,
            (true, false) => RestPhase::Resting,
            (true, true) => RestPhase::Paused,
        }
    }

    /// Fraction of the countdown already elapsed, from 0.0 to 1.0.
    pub fn progress(&self) -> f64 {
        if self.total_seconds == 0 {
            return 0.0;
        }
        let elapsed = self.total_seconds.saturating_sub(self.remaining_seconds);
        elapsed as f64 / self.total_seconds as f64
    }
}

// ============================================================================
// Tests
// ============================================================================
