//! Alarm dispatcher: the ordered command queue between the rest timer and
//! the alarm backend.
//!
//! Commands run one at a time in the order the timer issued them. A cancel
//! that arrives while a schedule is still waiting on authorization runs
//! after that schedule resolves, so the late alarm is always cancelled.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::countdown::Shared;
use crate::alarm::{AlarmBackend, AlarmHandle};
use crate::notification::{NotificationBackend, NotificationContent};
use crate::types::{AlertRoute, AuthorizationStatus, CountdownRequest};

#[derive(Debug)]
pub(crate) enum AlarmCommand {
    Schedule {
        generation: u64,
        request: CountdownRequest,
    },
    Pause,
    Resume,
    Cancel,
}

pub(crate) struct AlarmDispatcher<A, N> {
    alarm: Arc<A>,
    notifier: Arc<N>,
    shared: Arc<Shared>,
    content: NotificationContent,
    /// The alarm armed for the current countdown, if any.
    active: Option<AlarmHandle>,
}

impl<A: AlarmBackend, N: NotificationBackend> AlarmDispatcher<A, N> {
    pub(crate) fn new(
        alarm: Arc<A>,
        notifier: Arc<N>,
        shared: Arc<Shared>,
        content: NotificationContent,
    ) -> Self {
        Self {
            alarm,
            notifier,
            shared,
            content,
            active: None,
        }
    }

    /// Processes commands until the timer is dropped.
    pub(crate) async fn run(mut self, mut commands: mpsc::UnboundedReceiver<AlarmCommand>) {
        while let Some(command) = commands.recv().await {
            self.handle(command).await;
        }
        tracing::trace!("alarm dispatcher stopped");
    }

    async fn handle(&mut self, command: AlarmCommand) {
        match command {
            AlarmCommand::Schedule {
                generation,
                request,
            } => self.arm(generation, request).await,
            AlarmCommand::Pause => {
                if let Some(handle) = self.active {
                    if let Err(e) = self.alarm.pause(&handle).await {
                        tracing::debug!(
                            %handle,
                            error = %e,
                            suggestion = e.suggestion(),
                            "alarm pause failed"
                        );
                    }
                }
            }
            AlarmCommand::Resume => {
                if let Some(handle) = self.active {
                    if let Err(e) = self.alarm.resume(&handle).await {
                        tracing::debug!(
                            %handle,
                            error = %e,
                            suggestion = e.suggestion(),
                            "alarm resume failed"
                        );
                    }
                }
            }
            AlarmCommand::Cancel => {
                if let Some(handle) = self.active.take() {
                    self.cancel_handle(handle).await;
                }
            }
        }
    }

    /// Arms the completion signal for countdown `generation`.
    ///
    /// Alarm first; a denied authorization or a failed schedule falls back
    /// to the notification at the absolute end time.
    async fn arm(&mut self, generation: u64, request: CountdownRequest) {
        let Some(request) = self.shared.alarm_request_for(generation, &request) else {
            tracing::debug!(generation, "skipping schedule for a finished countdown");
            return;
        };

        let status = self.alarm.request_authorization().await;
        if status == AuthorizationStatus::Denied {
            tracing::info!("アラームが許可されていないため、通知で代替します");
            self.fall_back(generation);
            return;
        }

        if let Some(previous) = self.active.take() {
            self.cancel_handle(previous).await;
        }

        match self.alarm.schedule(&request).await {
            Ok(handle) => {
                if self.shared.adopt_route(generation, AlertRoute::Alarm) {
                    tracing::debug!(%handle, seconds = request.duration_seconds(), "rest alarm armed");
                    self.active = Some(handle);
                } else {
                    tracing::debug!(%handle, "countdown ended while scheduling; cancelling late alarm");
                    self.cancel_handle(handle).await;
                }
            }
            Err(e) if e.is_permission_error() => {
                tracing::info!(
                    suggestion = e.suggestion(),
                    "アラームが許可されていないため、通知で代替します: {}",
                    e
                );
                self.fall_back(generation);
            }
            Err(e) => {
                tracing::warn!(
                    suggestion = e.suggestion(),
                    "アラームのスケジュールに失敗しました。通知で代替します: {}",
                    e
                );
                self.fall_back(generation);
            }
        }
    }

    fn fall_back(&self, generation: u64) {
        if !self
            .shared
            .arm_notification(generation, self.notifier.as_ref(), &self.content)
        {
            tracing::debug!(generation, "countdown ended before the fallback was armed");
        }
    }

    async fn cancel_handle(&self, handle: AlarmHandle) {
        if let Err(e) = self.alarm.cancel(&handle).await {
            tracing::debug!(
                %handle,
                error = %e,
                suggestion = e.suggestion(),
                "alarm cancel failed"
            );
        }
    }
}
