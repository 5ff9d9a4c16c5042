//! CLI module for the rest timer.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `display`: Output formatting and display logic
//! - `session`: Foreground countdown driven from the terminal

pub mod commands;
pub mod display;
pub mod session;

pub use commands::{Cli, Commands, StartArgs};
pub use display::Display;
pub use session::{run_rest_session, spawn_stdin_reader, OutputMode, SessionOutcome};
