//! Rest timer engine.
//!
//! This module provides the rest countdown between sets:
//! - State transitions (Idle → Resting ⇄ Paused → Idle)
//! - Countdown with tokio::time::interval, anchored on an absolute end time
//! - Completion signaling through an alarm, with a notification fallback
//! - Event firing for the host (ticks, completion)
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use rest_timer::alarm::{AlarmPermission, LocalAlarmBackend};
//! use rest_timer::clock::SystemClock;
//! use rest_timer::config::RestTimerConfig;
//! use rest_timer::notification::LocalNotifier;
//! use rest_timer::timer::{RestEvent, RestTimer};
//! use tokio::sync::mpsc;
//!
//! # async fn example() {
//! let (event_tx, mut events) = mpsc::unbounded_channel();
//! let (delivered_tx, _delivered) = mpsc::unbounded_channel();
//! let alarm = Arc::new(LocalAlarmBackend::new(AlarmPermission::Grant, Duration::from_secs(540)));
//! let notifier = Arc::new(LocalNotifier::new(Arc::new(SystemClock), delivered_tx));
//! let timer = RestTimer::new(alarm, notifier, RestTimerConfig::default(), event_tx);
//!
//! timer.start_rest(90);
//! while let Some(event) = events.recv().await {
//!     if event == RestEvent::Completed {
//!         break;
//!     }
//! }
//! # }
//! ```

mod countdown;
mod dispatch;

use std::sync::Arc;

use chrono::TimeDelta;
use tokio::sync::{mpsc, watch};

use self::countdown::{end_after, exact_remaining, remaining_until, run_ticker, Shared};
use self::dispatch::{AlarmCommand, AlarmDispatcher};
use crate::alarm::AlarmBackend;
use crate::clock::{Clock, SystemClock};
use crate::config::RestTimerConfig;
use crate::notification::{NotificationBackend, NotificationContent};
use crate::types::{AlertRoute, AuthorizationStatus, RestTimerState};

// ============================================================================
// RestEvent
// ============================================================================

/// Rest timer events for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestEvent {
    /// A countdown started
    Started {
        /// Length of the countdown
        total_seconds: u64,
    },
    /// The remaining time changed
    Tick {
        /// Remaining seconds
        remaining_seconds: u64,
    },
    /// The countdown was frozen
    Paused {
        /// Remaining seconds at the moment of pause
        remaining_seconds: u64,
    },
    /// The countdown continues
    Resumed {
        /// Remaining seconds carried over from the pause
        remaining_seconds: u64,
    },
    /// An active countdown was cancelled
    Cancelled,
    /// The countdown reached zero; play completion feedback
    Completed,
    /// A backend was armed to signal the end of the countdown
    AlertArmed {
        /// Which backend
        route: AlertRoute,
    },
}

// ============================================================================
// RestTimer
// ============================================================================

/// The rest countdown between sets.
///
/// One instance lives for the whole process and is handed to whoever needs
/// it. At most one countdown is active; starting a new one cancels the
/// previous countdown together with its alarm and notification.
///
/// All operations return immediately. Backend failures are logged and
/// absorbed; the host only observes the resulting state.
pub struct RestTimer<A: AlarmBackend, N: NotificationBackend> {
    shared: Arc<Shared>,
    alarm: Arc<A>,
    notifier: Arc<N>,
    config: RestTimerConfig,
    content: NotificationContent,
    commands: mpsc::UnboundedSender<AlarmCommand>,
}

impl<A: AlarmBackend, N: NotificationBackend> RestTimer<A, N> {
    /// Creates a rest timer on the system clock.
    ///
    /// Must be called inside a tokio runtime: the alarm dispatcher is
    /// spawned here.
    pub fn new(
        alarm: Arc<A>,
        notifier: Arc<N>,
        config: RestTimerConfig,
        event_tx: mpsc::UnboundedSender<RestEvent>,
    ) -> Self {
        Self::with_clock(alarm, notifier, config, event_tx, Arc::new(SystemClock))
    }

    /// Creates a rest timer on the given clock.
    pub fn with_clock(
        alarm: Arc<A>,
        notifier: Arc<N>,
        config: RestTimerConfig,
        event_tx: mpsc::UnboundedSender<RestEvent>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let shared = Arc::new(Shared::new(clock, event_tx));
        let content = config.notification_content();
        let (commands, command_rx) = mpsc::unbounded_channel();

        let dispatcher = AlarmDispatcher::new(
            Arc::clone(&alarm),
            Arc::clone(&notifier),
            Arc::clone(&shared),
            content.clone(),
        );
        tokio::spawn(dispatcher.run(command_rx));

        Self {
            shared,
            alarm,
            notifier,
            config,
            content,
            commands,
        }
    }

    /// Starts a rest countdown of `total_seconds`.
    ///
    /// A non-positive duration is ignored without touching the state.
    pub fn start_rest(&self, total_seconds: i64) {
        if total_seconds <= 0 {
            tracing::debug!(total_seconds, "ignoring non-positive rest duration");
            return;
        }
        let total = total_seconds.unsigned_abs();
        let now = self.shared.now();
        let (Some(end), Some(request)) = (
            end_after(now, total),
            self.config.countdown_request(total),
        ) else {
            tracing::warn!(total_seconds, "休憩時間が大きすぎるため無視します");
            return;
        };

        self.cancel();

        let generation = {
            let mut countdown = self.shared.lock();
            countdown.generation += 1;
            countdown.is_resting = true;
            countdown.is_paused = false;
            countdown.total_seconds = total;
            countdown.remaining_seconds = total;
            countdown.end_timestamp = Some(end);
            self.shared.publish(&countdown);
            countdown.generation
        };
        tracing::debug!(generation, total_seconds = total, %end, "rest started");

        self.replace_ticker(generation);
        self.shared.emit(RestEvent::Started {
            total_seconds: total,
        });
        self.send(AlarmCommand::Schedule {
            generation,
            request,
        });
    }

    /// Freezes the countdown.
    ///
    /// A notification fallback that is already scheduled keeps its first
    /// time; only the alarm can be paused.
    pub fn pause(&self) {
        let remaining = {
            let now = self.shared.now();
            let mut countdown = self.shared.lock();
            if !countdown.is_resting || countdown.is_paused {
                return;
            }
            if let Some(end) = countdown.end_timestamp {
                let shown = remaining_until(end, now).min(countdown.remaining_seconds);
                let mut exact = exact_remaining(end, now);
                // A clock that stepped back must not hand time back on resume.
                if let Some(cap) = i64::try_from(shown).ok().and_then(TimeDelta::try_seconds) {
                    exact = exact.min(cap);
                }
                countdown.remaining_seconds = shown;
                countdown.paused_remaining = Some(exact);
            }
            if countdown.remaining_seconds > 0 {
                countdown.is_paused = true;
                self.shared.publish(&countdown);
            }
            countdown.remaining_seconds
        };

        if remaining == 0 {
            // Already over; let the tick path complete it.
            self.refresh();
            return;
        }
        tracing::debug!(remaining_seconds = remaining, "rest paused");
        self.send(AlarmCommand::Pause);
        self.shared.emit(RestEvent::Paused {
            remaining_seconds: remaining,
        });
    }

    /// Continues a paused countdown with the time it had left.
    pub fn resume(&self) {
        let (generation, remaining) = {
            let now = self.shared.now();
            let mut countdown = self.shared.lock();
            if !countdown.is_resting || !countdown.is_paused {
                return;
            }
            let end = match countdown.paused_remaining {
                Some(left) => now.checked_add_signed(left),
                None => end_after(now, countdown.remaining_seconds),
            };
            let Some(end) = end else {
                return;
            };
            countdown.is_paused = false;
            countdown.paused_remaining = None;
            countdown.end_timestamp = Some(end);
            countdown.remaining_seconds =
                remaining_until(end, now).min(countdown.remaining_seconds);
            if countdown.route == Some(AlertRoute::Notification) {
                if let Err(e) = self.notifier.schedule_at(end, &self.content) {
                    tracing::warn!(
                        suggestion = e.suggestion(),
                        "通知の再スケジュールに失敗しました: {}",
                        e
                    );
                }
            }
            self.shared.publish(&countdown);
            (countdown.generation, countdown.remaining_seconds)
        };
        tracing::debug!(remaining_seconds = remaining, "rest resumed");

        self.replace_ticker(generation);
        self.send(AlarmCommand::Resume);
        self.shared.emit(RestEvent::Resumed {
            remaining_seconds: remaining,
        });
    }

    /// Stops the countdown and silences every backend. Idempotent.
    pub fn cancel(&self) {
        let (was_resting, ticker) = {
            let mut countdown = self.shared.lock();
            let was_resting = countdown.is_resting;
            countdown.generation += 1;
            let ticker = countdown.ticker.take();
            countdown.clear();
            self.shared.publish(&countdown);
            (was_resting, ticker)
        };
        if let Some(ticker) = ticker {
            ticker.abort();
        }

        if let Err(e) = self.notifier.cancel_pending() {
            tracing::warn!(
                suggestion = e.suggestion(),
                "保留中の通知を削除できませんでした: {}",
                e
            );
        }
        self.send(AlarmCommand::Cancel);

        if was_resting {
            tracing::debug!("rest cancelled");
            self.shared.emit(RestEvent::Cancelled);
        }
    }

    /// Recomputes the remaining time right away.
    ///
    /// Hosts call this when they come back from the background so the
    /// display does not wait for the next tick.
    pub fn refresh(&self) {
        let generation = self.shared.lock().generation;
        self.shared.tick(generation);
    }

    /// Returns a snapshot of the countdown.
    pub fn state(&self) -> RestTimerState {
        self.shared.lock().snapshot()
    }

    /// Subscribes to state changes.
    pub fn subscribe(&self) -> watch::Receiver<RestTimerState> {
        self.shared.subscribe()
    }

    /// Returns true while the alarm is ringing.
    pub fn is_alerting(&self) -> bool {
        self.alarm.is_alerting()
    }

    /// Subscribes to the alarm's ringing state.
    pub fn watch_alerting(&self) -> watch::Receiver<bool> {
        self.alarm.watch_alerting()
    }

    /// The backend armed for the current countdown, once known.
    pub fn alert_route(&self) -> Option<AlertRoute> {
        self.shared.lock().route
    }

    /// The alarm backend's cached authorization status.
    pub fn authorization_status(&self) -> AuthorizationStatus {
        self.alarm.authorization_status()
    }

    pub fn config(&self) -> &RestTimerConfig {
        &self.config
    }

    fn replace_ticker(&self, generation: u64) {
        let task = tokio::spawn(run_ticker(
            Arc::clone(&self.shared),
            generation,
            self.config.tick_interval(),
        ));
        let previous = self.shared.lock().ticker.replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    fn send(&self, command: AlarmCommand) {
        if self.commands.send(command).is_err() {
            tracing::warn!("alarm dispatcher is gone; command dropped");
        }
    }
}

impl<A: AlarmBackend, N: NotificationBackend> Drop for RestTimer<A, N> {
    fn drop(&mut self) {
        if let Some(ticker) = self.shared.lock().ticker.take() {
            ticker.abort();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
