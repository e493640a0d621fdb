//! Command-line interface for the `fltwatch` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DiffCommand, GenerateCommand, HistoryCommand, OutputFormat, SourceArg,
    TrackingCommand, WatchCommand,
};

/// fltwatch - Watch flight tables change
///
/// Polls a CSV schedule or a synthetic plane generator, labels every row as
/// existing, added or removed since the previous poll, and tracks how long
/// each flight stays on the board.
#[derive(Debug, Parser)]
#[command(name = "fltwatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Poll a source and show what changed on every tick
    Watch(WatchCommand),

    /// Diff two CSV snapshots once
    Diff(DiffCommand),

    /// Print synthetic snapshots as CSV
    Generate(GenerateCommand),

    /// Show recent ticks from the journal
    History(HistoryCommand),

    /// Show the tracking table of the latest run
    Tracking(TrackingCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
