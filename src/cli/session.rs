//! Foreground rest session.
//!
//! Drives one countdown from the terminal: prints timer events, applies
//! line commands read from stdin, and cancels on Ctrl-C.

use std::time::Duration;

use anyhow::{bail, Result};
use tokio::sync::mpsc;

use super::display::Display;
use crate::alarm::AlarmBackend;
use crate::notification::{NotificationBackend, NotificationContent};
use crate::timer::{RestEvent, RestTimer};
use crate::types::AlertRoute;

/// How long to wait for the backend to signal after the countdown ends.
const COMPLETION_GRACE: Duration = Duration::from_secs(3);

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The countdown ran to zero
    Completed,
    /// The user cancelled
    Cancelled,
    /// The requested duration was not positive or too large; nothing started
    Ignored,
}

/// A line command typed during the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputCommand {
    Pause,
    Resume,
    Cancel,
    Status,
}

impl InputCommand {
    fn parse(line: &str) -> Option<Self> {
        match line.trim().to_lowercase().as_str() {
            "p" | "pause" => Some(Self::Pause),
            "r" | "resume" => Some(Self::Resume),
            "c" | "cancel" | "q" | "quit" => Some(Self::Cancel),
            "s" | "status" => Some(Self::Status),
            _ => None,
        }
    }
}

/// Output mode of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Human,
    Json,
}

/// Forwards stdin lines to a channel from a dedicated thread.
///
/// Blocking reads stay off the runtime, so an unanswered prompt never holds
/// up shutdown. The channel closes at end of input.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Runs one rest countdown of `seconds` until it completes or is cancelled.
///
/// `input` carries stdin lines; a closed channel just stops reading.
/// `delivered` carries notifications fired by the fallback backend.
///
/// # Errors
///
/// Returns an error if the event channel closes or JSON output fails.
pub async fn run_rest_session<A, N>(
    timer: &RestTimer<A, N>,
    events: &mut mpsc::UnboundedReceiver<RestEvent>,
    delivered: &mut mpsc::UnboundedReceiver<NotificationContent>,
    input: &mut mpsc::UnboundedReceiver<String>,
    seconds: i64,
    mode: OutputMode,
) -> Result<SessionOutcome>
where
    A: AlarmBackend,
    N: NotificationBackend,
{
    timer.start_rest(seconds);
    if !timer.state().is_resting {
        Display::show_ignored(seconds);
        return Ok(SessionOutcome::Ignored);
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut input_open = true;
    let mut notified = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else {
                    bail!("タイマーのイベントチャネルが閉じられました");
                };
                show_event(timer, &event, mode)?;
                match event {
                    RestEvent::Completed => {
                        finish_alert(timer, delivered, notified, mode).await;
                        return Ok(SessionOutcome::Completed);
                    }
                    RestEvent::Cancelled => return Ok(SessionOutcome::Cancelled),
                    _ => {}
                }
            }
            Some(content) = delivered.recv() => {
                notified = true;
                if mode == OutputMode::Human {
                    Display::show_notification(&content);
                }
            }
            line = input.recv(), if input_open => {
                match line {
                    Some(line) => apply_input(timer, &line, mode)?,
                    None => {
                        tracing::debug!("stdin closed; countdown continues");
                        input_open = false;
                    }
                }
            }
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    tracing::warn!("Ctrl-Cの監視に失敗しました: {}", e);
                }
                timer.cancel();
                if mode == OutputMode::Human {
                    Display::show_cancelled();
                }
                return Ok(SessionOutcome::Cancelled);
            }
        }
    }
}

fn show_event<A, N>(timer: &RestTimer<A, N>, event: &RestEvent, mode: OutputMode) -> Result<()>
where
    A: AlarmBackend,
    N: NotificationBackend,
{
    if mode == OutputMode::Json {
        Display::show_json(&timer.state())?;
        return Ok(());
    }
    match *event {
        RestEvent::Started { total_seconds } => Display::show_start(total_seconds),
        RestEvent::Tick { remaining_seconds } => Display::show_tick(remaining_seconds),
        RestEvent::Paused { remaining_seconds } => Display::show_paused(remaining_seconds),
        RestEvent::Resumed { remaining_seconds } => Display::show_resumed(remaining_seconds),
        RestEvent::Cancelled => Display::show_cancelled(),
        RestEvent::Completed => Display::show_completed(),
        RestEvent::AlertArmed { route } => Display::show_alert_armed(route),
    }
    Ok(())
}

fn apply_input<A, N>(timer: &RestTimer<A, N>, line: &str, mode: OutputMode) -> Result<()>
where
    A: AlarmBackend,
    N: NotificationBackend,
{
    if line.trim().is_empty() {
        return Ok(());
    }
    match InputCommand::parse(line) {
        Some(InputCommand::Pause) => timer.pause(),
        Some(InputCommand::Resume) => timer.resume(),
        Some(InputCommand::Cancel) => timer.cancel(),
        Some(InputCommand::Status) => {
            timer.refresh();
            match mode {
                OutputMode::Human => Display::show_status(&timer.state()),
                OutputMode::Json => Display::show_json(&timer.state())?,
            }
        }
        None => Display::show_unknown_input(line.trim()),
    }
    Ok(())
}

/// Waits briefly for the armed backend to fire, then silences the alarm.
async fn finish_alert<A, N>(
    timer: &RestTimer<A, N>,
    delivered: &mut mpsc::UnboundedReceiver<NotificationContent>,
    notified: bool,
    mode: OutputMode,
) where
    A: AlarmBackend,
    N: NotificationBackend,
{
    match timer.alert_route() {
        Some(AlertRoute::Alarm) => {
            let mut alerting = timer.watch_alerting();
            let rang = matches!(
                tokio::time::timeout(COMPLETION_GRACE, alerting.wait_for(|ringing| *ringing))
                    .await,
                Ok(Ok(_))
            );
            if rang && mode == OutputMode::Human {
                Display::show_alarm_ringing(&timer.config().alarm_title);
            } else if !rang {
                tracing::debug!("alarm did not ring within the grace period");
            }
            // The process is about to exit; stop the ringing alarm with it.
            timer.cancel();
        }
        Some(AlertRoute::Notification) if !notified => {
            match tokio::time::timeout(COMPLETION_GRACE, delivered.recv()).await {
                Ok(Some(content)) if mode == OutputMode::Human => {
                    Display::show_notification(&content)
                }
                Ok(Some(_)) => {}
                _ => tracing::debug!("notification was not delivered within the grace period"),
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod input_tests {
        use super::*;

        #[test]
        fn test_parse_short_and_long_forms() {
            assert_eq!(InputCommand::parse("p"), Some(InputCommand::Pause));
            assert_eq!(InputCommand::parse("pause"), Some(InputCommand::Pause));
            assert_eq!(InputCommand::parse("r"), Some(InputCommand::Resume));
            assert_eq!(InputCommand::parse("resume"), Some(InputCommand::Resume));
            assert_eq!(InputCommand::parse("s"), Some(InputCommand::Status));
            assert_eq!(InputCommand::parse("status"), Some(InputCommand::Status));
        }

        #[test]
        fn test_parse_cancel_aliases() {
            for line in ["c", "cancel", "q", "quit"] {
                assert_eq!(InputCommand::parse(line), Some(InputCommand::Cancel));
            }
        }

        #[test]
        fn test_parse_trims_and_ignores_case() {
            assert_eq!(InputCommand::parse("  P \n"), Some(InputCommand::Pause));
            assert_eq!(InputCommand::parse("Resume"), Some(InputCommand::Resume));
        }

        #[test]
        fn test_parse_unknown() {
            assert_eq!(InputCommand::parse("x"), None);
            assert_eq!(InputCommand::parse(""), None);
        }
    }
}
