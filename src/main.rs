//! Rest Timer CLI - countdown between training sets
//!
//! Runs one rest countdown in the foreground. The end of the rest is
//! signaled by an alarm, or by a notification when alarms are unavailable.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use tokio::sync::mpsc;

use rest_timer::alarm::{AlarmPermission, LocalAlarmBackend};
use rest_timer::cli::{
    run_rest_session, spawn_stdin_reader, Cli, Commands, Display, OutputMode, StartArgs,
};
use rest_timer::clock::{Clock, SystemClock};
use rest_timer::config::RestTimerConfig;
use rest_timer::notification::LocalNotifier;
use rest_timer::timer::RestTimer;

/// Main entry point
#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Initialize logging
    init_tracing(cli.verbose);

    // Execute command
    if let Err(e) = execute(cli).await {
        Display::show_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber for logging.
///
/// `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

/// Executes the CLI command.
async fn execute(cli: Cli) -> Result<()> {
    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match cli.command {
        Some(Commands::Start(args)) => {
            let config = load_config(cli.config.as_deref())?;
            run_start(config, args).await?;
        }
        Some(Commands::Config) => {
            let config = load_config(cli.config.as_deref())?;
            Display::show_config(&config)?;
        }
        Some(Commands::Completions { shell }) => {
            generate_completions(shell);
        }
        None => {
            // No command provided, show help
            Cli::command().print_help()?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<RestTimerConfig> {
    RestTimerConfig::load_or_default(path).map_err(|e| {
        tracing::debug!(suggestion = e.suggestion(), "config load failed");
        anyhow::Error::new(e).context("設定ファイルを読み込めませんでした")
    })
}

/// Runs one countdown with the in-process backends.
async fn run_start(config: RestTimerConfig, args: StartArgs) -> Result<()> {
    let seconds = args
        .seconds
        .unwrap_or_else(|| i64::from(config.default_rest_seconds));
    let permission = if args.no_alarm {
        AlarmPermission::Deny
    } else {
        AlarmPermission::Grant
    };
    let mode = if args.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (event_tx, mut events) = mpsc::unbounded_channel();
    let (delivered_tx, mut delivered) = mpsc::unbounded_channel();
    let alarm = Arc::new(LocalAlarmBackend::with_clock(
        permission,
        config.post_alert(),
        Arc::clone(&clock),
    ));
    let notifier = Arc::new(LocalNotifier::new(Arc::clone(&clock), delivered_tx));
    let timer = RestTimer::with_clock(alarm, notifier, config, event_tx, clock);

    let mut input = spawn_stdin_reader();
    let outcome = run_rest_session(
        &timer,
        &mut events,
        &mut delivered,
        &mut input,
        seconds,
        mode,
    )
    .await
    .context("休憩セッションが異常終了しました")?;

    tracing::debug!(?outcome, "rest session finished");
    Ok(())
}

/// Generates shell completion scripts.
fn generate_completions(shell: clap_complete::Shell) {
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();
    generate(shell, &mut cmd, bin_name, &mut io::stdout());
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::parse_from(["rest-timer"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_parse_start() {
        let cli = Cli::parse_from(["rest-timer", "start", "60"]);
        match cli.command {
            Some(Commands::Start(args)) => assert_eq!(args.seconds, Some(60)),
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_load_config_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("missing.json")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"default_rest_seconds": 45}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.default_rest_seconds, 45);
    }
}
