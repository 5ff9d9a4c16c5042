//! Command definitions for the rest timer CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ============================================================================
// CLI Structure
// ============================================================================

/// Rest timer CLI - countdown between training sets
#[derive(Parser, Debug)]
#[command(
    name = "rest-timer",
    version,
    about = "セット間の休憩タイマーCLI",
    long_about = "セット間の休憩をカウントダウンするタイマー。\n\
                  終了時はアラームで知らせ、アラームが使えない場合は通知で代替します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to a JSON configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run a rest countdown in the foreground
    Start(StartArgs),

    /// Print the effective configuration as JSON
    Config,

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Start Command Arguments
// ============================================================================

/// Arguments for the start command
#[derive(Args, Debug, Clone, Default)]
pub struct StartArgs {
    /// Rest duration in seconds (defaults to the configured rest)
    #[arg(allow_negative_numbers = true)]
    pub seconds: Option<i64>,

    /// Skip the alarm and signal completion with a notification
    #[arg(long)]
    pub no_alarm: bool,

    /// Print one JSON state object per event
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Tests
// ============================================================================
