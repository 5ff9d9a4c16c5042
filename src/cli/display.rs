//! Display utilities for the rest timer CLI.
//!
//! This module provides formatted output for:
//! - Countdown progress and transitions
//! - Error messages
//! - Status display
//! - JSON state lines for scripting

use crate::config::RestTimerConfig;
use crate::notification::NotificationContent;
use crate::types::{AlertRoute, RestPhase, RestTimerState};

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the start of a countdown and the available stdin commands.
    pub fn show_start(total_seconds: u64) {
        println!("* 休憩を開始しました");
        println!("  休憩時間: {}", Self::format_clock(total_seconds));
        println!("  操作: p=一時停止  r=再開  s=状態  c=キャンセル");
    }

    pub fn show_tick(remaining_seconds: u64) {
        println!("  残り時間: {}", Self::format_clock(remaining_seconds));
    }

    pub fn show_paused(remaining_seconds: u64) {
        println!("|| 休憩を一時停止しました");
        println!("  残り時間: {}", Self::format_clock(remaining_seconds));
    }

    pub fn show_resumed(remaining_seconds: u64) {
        println!("> 休憩を再開しました");
        println!("  残り時間: {}", Self::format_clock(remaining_seconds));
    }

    pub fn show_cancelled() {
        println!("[] 休憩をキャンセルしました");
    }

    pub fn show_completed() {
        println!("* 休憩が終了しました");
    }

    /// Shows which backend will signal the end of the rest.
    pub fn show_alert_armed(route: AlertRoute) {
        match route {
            AlertRoute::Alarm => println!("  終了時にアラームでお知らせします"),
            AlertRoute::Notification => println!("  終了時に通知でお知らせします"),
        }
    }

    /// Shows a delivered fallback notification.
    pub fn show_notification(content: &NotificationContent) {
        println!("[通知] {}", content.title());
        if !content.body().is_empty() {
            println!("  {}", content.body());
        }
    }

    pub fn show_alarm_ringing(title: &str) {
        println!("[アラーム] {}", title);
    }

    /// Notice for a start request that was ignored.
    pub fn show_ignored(seconds: i64) {
        println!("{}", Self::ignored_message(seconds));
    }

    /// A positive duration is only ignored when its end time overflows.
    fn ignored_message(seconds: i64) -> String {
        if seconds <= 0 {
            format!("休憩時間は1秒以上を指定してください（指定値: {}）", seconds)
        } else {
            format!("休憩時間が大きすぎます（指定値: {}）", seconds)
        }
    }

    /// Shows the current countdown state.
    pub fn show_status(state: &RestTimerState) {
        println!("休憩タイマー ステータス");
        println!("─────────────────────────────");
        let phase = match state.phase() {
            RestPhase::Idle => "待機中",
            RestPhase::Resting => "休憩中",
            RestPhase::Paused => "一時停止中",
        };
        println!("状態: {}", phase);

        if state.phase() != RestPhase::Idle {
            println!("残り時間: {}", Self::format_clock(state.remaining_seconds));
            println!("休憩時間: {}", Self::format_clock(state.total_seconds));
            println!("進捗: {:.0}%", state.progress() * 100.0);
        }
    }

    /// Prints a state snapshot as one JSON line.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn show_json(state: &RestTimerState) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string(state)?);
        Ok(())
    }

    /// Prints the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn show_config(config: &RestTimerConfig) -> serde_json::Result<()> {
        println!("{}", serde_json::to_string_pretty(config)?);
        Ok(())
    }

    pub fn show_unknown_input(input: &str) {
        eprintln!("不明な操作です: {}（p/r/s/c のいずれかを入力してください）", input);
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    /// Formats seconds as `m:ss`.
    pub fn format_clock(total_seconds: u64) -> String {
        let (minutes, seconds) = Self::format_time(total_seconds);
        format!("{}:{:02}", minutes, seconds)
    }

    /// Formats remaining seconds as (minutes, seconds).
    fn format_time(total_seconds: u64) -> (u64, u64) {
        let minutes = total_seconds / 60;
        let seconds = total_seconds % 60;
        (minutes, seconds)
    }
}

// ============================================================================
// Tests
// ============================================================================
