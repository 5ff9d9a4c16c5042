//! Countdown state shared between the timer, its tick loop, and the alarm
//! dispatcher.
//!
//! Remaining time is always derived from the absolute end timestamp, so a
//! host that was suspended for a while catches up on the next tick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use super::RestEvent;
use crate::clock::Clock;
use crate::notification::{NotificationBackend, NotificationContent};
use crate::types::{AlertRoute, CountdownRequest, RestTimerState};

/// Whole seconds left until `end`, rounded up and clamped at zero.
pub(crate) fn remaining_until(end: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (end - now).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    // Ceiling, so zero is reached exactly at the end timestamp.
    (millis as u64).div_ceil(1000)
}

/// Exact time left until `end`, clamped at zero.
pub(crate) fn exact_remaining(end: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
    (end - now).max(TimeDelta::zero())
}

/// `now + seconds`, or `None` if that is not representable.
pub(crate) fn end_after(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    now.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

// ============================================================================
// Countdown
// ============================================================================

#[derive(Debug, Default)]
pub(crate) struct Countdown {
    pub(crate) is_resting: bool,
    pub(crate) is_paused: bool,
    pub(crate) total_seconds: u64,
    pub(crate) remaining_seconds: u64,
    pub(crate) end_timestamp: Option<DateTime<Utc>>,
    /// Exact time left, held while paused. `remaining_seconds` is only its
    /// rounded-up display value.
    pub(crate) paused_remaining: Option<TimeDelta>,
    /// Bumped by every start and cancel; stale async work compares against it.
    pub(crate) generation: u64,
    pub(crate) route: Option<AlertRoute>,
    pub(crate) ticker: Option<JoinHandle<()>>,
}

impl Countdown {
    pub(crate) fn snapshot(&self) -> RestTimerState {
        RestTimerState {
            is_resting: self.is_resting,
            is_paused: self.is_paused,
            total_seconds: self.total_seconds,
            remaining_seconds: self.remaining_seconds,
            end_timestamp: self.end_timestamp,
        }
    }

    /// True if `generation` is the countdown still in progress.
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.is_resting && self.generation == generation
    }

    /// Resets everything except the generation counter and ticker handle.
    pub(crate) fn clear(&mut self) {
        self.is_resting = false;
        self.is_paused = false;
        self.total_seconds = 0;
        self.remaining_seconds = 0;
        self.end_timestamp = None;
        self.paused_remaining = None;
        self.route = None;
    }
}

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    Stop,
}

pub(crate) struct Shared {
    countdown: Mutex<Countdown>,
    clock: Arc<dyn Clock>,
    state_tx: watch::Sender<RestTimerState>,
    events: mpsc::UnboundedSender<RestEvent>,
}

impl Shared {
    pub(crate) fn new(clock: Arc<dyn Clock>, events: mpsc::UnboundedSender<RestEvent>) -> Self {
        let (state_tx, _) = watch::channel(RestTimerState::default());
        Self {
            countdown: Mutex::new(Countdown::default()),
            clock,
            state_tx,
            events,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Countdown> {
        self.countdown.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn publish(&self, countdown: &Countdown) {
        self.state_tx.send_replace(countdown.snapshot());
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<RestTimerState> {
        self.state_tx.subscribe()
    }

    /// Sends an event. Nobody listening is not an error.
    pub(crate) fn emit(&self, event: RestEvent) {
        let _ = self.events.send(event);
    }

    /// Recomputes the remaining time of countdown `generation`.
    ///
    /// Completes the countdown when it reaches zero; completion is emitted
    /// exactly once because it happens under the lock together with
    /// clearing `is_resting`.
    pub(crate) fn tick(&self, generation: u64) -> TickOutcome {
        let now = self.now();
        let mut countdown = self.lock();
        if !countdown.is_current(generation) {
            return TickOutcome::Stop;
        }
        if countdown.is_paused {
            return TickOutcome::Continue;
        }
        let Some(end) = countdown.end_timestamp else {
            return TickOutcome::Stop;
        };

        // The wall clock may step backwards; the display never climbs.
        let remaining = remaining_until(end, now).min(countdown.remaining_seconds);
        if remaining != countdown.remaining_seconds {
            countdown.remaining_seconds = remaining;
            self.publish(&countdown);
            self.emit(RestEvent::Tick {
                remaining_seconds: remaining,
            });
        }
        if remaining > 0 {
            return TickOutcome::Continue;
        }

        countdown.is_resting = false;
        countdown.is_paused = false;
        countdown.end_timestamp = None;
        countdown.paused_remaining = None;
        // Detach; the loop sees the idle state and exits on its own.
        drop(countdown.ticker.take());
        self.publish(&countdown);
        drop(countdown);

        tracing::info!("rest complete");
        self.emit(RestEvent::Completed);
        TickOutcome::Stop
    }

    /// Rebases `request` on the time left in countdown `generation`.
    ///
    /// Returns `None` if the countdown is stale or already at zero.
    pub(crate) fn alarm_request_for(
        &self,
        generation: u64,
        request: &CountdownRequest,
    ) -> Option<CountdownRequest> {
        let now = self.now();
        let countdown = self.lock();
        if !countdown.is_current(generation) {
            return None;
        }
        let remaining = match (countdown.is_paused, countdown.end_timestamp) {
            (false, Some(end)) => remaining_until(end, now),
            _ => countdown.remaining_seconds,
        };
        request.with_duration_seconds(remaining)
    }

    /// Records `route` as armed for countdown `generation`.
    ///
    /// Returns false if the countdown ended in the meantime.
    pub(crate) fn adopt_route(&self, generation: u64, route: AlertRoute) -> bool {
        {
            let mut countdown = self.lock();
            if !countdown.is_current(generation) {
                return false;
            }
            countdown.route = Some(route);
        }
        self.emit(RestEvent::AlertArmed { route });
        true
    }

    /// Arms the notification fallback for countdown `generation`.
    ///
    /// The check and the schedule happen under one lock, so a concurrent
    /// cancel either sees the notification and removes it or makes this a
    /// no-op. A paused countdown is only marked; resuming schedules it.
    pub(crate) fn arm_notification<N: NotificationBackend + ?Sized>(
        &self,
        generation: u64,
        notifier: &N,
        content: &NotificationContent,
    ) -> bool {
        {
            let mut countdown = self.lock();
            if !countdown.is_current(generation) {
                return false;
            }
            countdown.route = Some(AlertRoute::Notification);
            if !countdown.is_paused {
                if let Some(end) = countdown.end_timestamp {
                    if let Err(e) = notifier.schedule_at(end, content) {
                        tracing::warn!(
                            suggestion = e.suggestion(),
                            "通知のスケジュールに失敗しました: {}",
                            e
                        );
                    }
                }
            }
        }
        self.emit(RestEvent::AlertArmed {
            route: AlertRoute::Notification,
        });
        true
    }
}

/// Tick loop for countdown `generation`.
///
/// Exits when the countdown completes, is cancelled, or is replaced.
pub(crate) async fn run_ticker(shared: Arc<Shared>, generation: u64, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if shared.tick(generation) == TickOutcome::Stop {
            break;
        }
    }
    tracing::trace!(generation, "tick loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::notification::MockNotificationBackend;
    use chrono::TimeZone;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn create_shared() -> (
        Shared,
        Arc<ManualClock>,
        mpsc::UnboundedReceiver<RestEvent>,
    ) {
        let clock = Arc::new(ManualClock::new(start_time()));
        let (tx, rx) = mpsc::unbounded_channel();
        (Shared::new(clock.clone(), tx), clock, rx)
    }

    fn begin(shared: &Shared, seconds: u64) -> u64 {
        let now = shared.now();
        let mut countdown = shared.lock();
        countdown.generation += 1;
        countdown.is_resting = true;
        countdown.total_seconds = seconds;
        countdown.remaining_seconds = seconds;
        countdown.end_timestamp = end_after(now, seconds);
        countdown.generation
    }

    mod remaining_tests {
        use super::*;

        #[test]
        fn test_remaining_rounds_up() {
            let now = start_time();
            let end = now + TimeDelta::milliseconds(4_200);
            assert_eq!(remaining_until(end, now), 5);
            assert_eq!(remaining_until(now + TimeDelta::seconds(3), now), 3);
        }

        #[test]
        fn test_remaining_clamps_at_zero() {
            let now = start_time();
            assert_eq!(remaining_until(now, now), 0);
            assert_eq!(remaining_until(now - TimeDelta::seconds(30), now), 0);
        }

        #[test]
        fn test_exact_remaining_keeps_fraction() {
            let now = start_time();
            let end = now + TimeDelta::milliseconds(4_200);
            assert_eq!(exact_remaining(end, now), TimeDelta::milliseconds(4_200));
            assert_eq!(exact_remaining(now, end), TimeDelta::zero());
        }

        #[test]
        fn test_end_after_overflow() {
            assert!(end_after(start_time(), u64::MAX).is_none());
            assert_eq!(
                end_after(start_time(), 60),
                Some(start_time() + TimeDelta::seconds(60))
            );
        }
    }

    mod tick_tests {
        use super::*;

        #[test]
        fn test_tick_recomputes_from_end_timestamp() {
            let (shared, clock, mut rx) = create_shared();
            let generation = begin(&shared, 10);

            clock.advance_secs(3);
            assert_eq!(shared.tick(generation), TickOutcome::Continue);
            assert_eq!(shared.lock().remaining_seconds, 7);
            assert_eq!(
                rx.try_recv().unwrap(),
                RestEvent::Tick {
                    remaining_seconds: 7
                }
            );
        }

        #[test]
        fn test_tick_catches_up_after_suspension() {
            let (shared, clock, _rx) = create_shared();
            let generation = begin(&shared, 120);

            // Nothing ticked for 100 seconds
            clock.advance_secs(100);
            shared.tick(generation);
            assert_eq!(shared.lock().remaining_seconds, 20);
        }

        #[test]
        fn test_tick_never_climbs_when_clock_steps_back() {
            let (shared, clock, _rx) = create_shared();
            let generation = begin(&shared, 60);

            clock.advance_secs(30);
            shared.tick(generation);
            clock.advance_secs(-20);
            shared.tick(generation);
            assert_eq!(shared.lock().remaining_seconds, 30);
        }

        #[test]
        fn test_tick_completes_once() {
            let (shared, clock, mut rx) = create_shared();
            let generation = begin(&shared, 5);

            clock.advance_secs(6);
            assert_eq!(shared.tick(generation), TickOutcome::Stop);
            assert_eq!(shared.tick(generation), TickOutcome::Stop);

            let events: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok()).collect();
            assert_eq!(
                events,
                vec![
                    RestEvent::Tick {
                        remaining_seconds: 0
                    },
                    RestEvent::Completed
                ]
            );
            let state = shared.lock().snapshot();
            assert!(!state.is_resting);
            assert!(state.end_timestamp.is_none());
        }

        #[test]
        fn test_tick_skips_while_paused() {
            let (shared, clock, mut rx) = create_shared();
            let generation = begin(&shared, 10);
            shared.lock().is_paused = true;

            clock.advance_secs(50);
            assert_eq!(shared.tick(generation), TickOutcome::Continue);
            assert_eq!(shared.lock().remaining_seconds, 10);
            assert!(rx.try_recv().is_err());
        }

        #[test]
        fn test_stale_generation_stops() {
            let (shared, _clock, _rx) = create_shared();
            let generation = begin(&shared, 10);
            begin(&shared, 20);
            assert_eq!(shared.tick(generation), TickOutcome::Stop);
        }

        #[test]
        fn test_tick_publishes_state() {
            let (shared, clock, _rx) = create_shared();
            let state_rx = shared.subscribe();
            let generation = begin(&shared, 10);

            clock.advance_secs(4);
            shared.tick(generation);
            assert_eq!(state_rx.borrow().remaining_seconds, 6);
        }
    }

    mod routing_tests {
        use super::*;

        #[test]
        fn test_alarm_request_rebased_on_time_left() {
            let (shared, clock, _rx) = create_shared();
            let generation = begin(&shared, 60);
            let request = CountdownRequest::new(60, "休憩終了", "").unwrap();

            clock.advance_secs(15);
            let rebased = shared.alarm_request_for(generation, &request).unwrap();
            assert_eq!(rebased.duration_seconds(), 45);

            assert!(shared.alarm_request_for(generation + 1, &request).is_none());
        }

        #[test]
        fn test_arm_notification_at_end_timestamp() {
            let (shared, _clock, mut rx) = create_shared();
            let generation = begin(&shared, 60);
            let notifier = MockNotificationBackend::new();
            let content = NotificationContent::new("rest", "休憩終了", "");

            assert!(shared.arm_notification(generation, &notifier, &content));
            assert_eq!(
                notifier.pending().unwrap().at,
                start_time() + TimeDelta::seconds(60)
            );
            assert_eq!(shared.lock().route, Some(AlertRoute::Notification));
            assert_eq!(
                rx.try_recv().unwrap(),
                RestEvent::AlertArmed {
                    route: AlertRoute::Notification
                }
            );
        }

        #[test]
        fn test_arm_notification_while_paused_only_marks_route() {
            let (shared, _clock, _rx) = create_shared();
            let generation = begin(&shared, 60);
            shared.lock().is_paused = true;
            let notifier = MockNotificationBackend::new();

            assert!(shared.arm_notification(
                generation,
                &notifier,
                &NotificationContent::new("rest", "休憩終了", "")
            ));
            assert_eq!(notifier.schedule_count(), 0);
            assert_eq!(shared.lock().route, Some(AlertRoute::Notification));
        }

        #[test]
        fn test_stale_generation_is_not_armed() {
            let (shared, _clock, _rx) = create_shared();
            let generation = begin(&shared, 60);
            shared.lock().clear();
            let notifier = MockNotificationBackend::new();

            assert!(!shared.adopt_route(generation, AlertRoute::Alarm));
            assert!(!shared.arm_notification(
                generation,
                &notifier,
                &NotificationContent::new("rest", "休憩終了", "")
            ));
            assert_eq!(notifier.schedule_count(), 0);
        }
    }
}
