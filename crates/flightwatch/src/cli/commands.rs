//! CLI command definitions.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::config::Config;
use crate::source::SourceKind;

/// Watch command arguments.
#[derive(Debug, Default, Args)]
pub struct WatchCommand {
    /// Where snapshots come from
    #[arg(short, long, value_enum)]
    pub source: Option<SourceArg>,

    /// CSV file to poll (csv source)
    #[arg(short, long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Column holding the record key
    #[arg(short, long, value_name = "COLUMN")]
    pub key: Option<String>,

    /// Seconds between polls
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Stop after N polls
    #[arg(short, long, value_name = "N")]
    pub ticks: Option<u64>,

    /// Seed for the synthetic source
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long)]
    pub no_color: bool,

    /// Don't write ticks to the journal
    #[arg(long)]
    pub no_journal: bool,
}

impl WatchCommand {
    /// Overlay the command-line flags on `config`.
    pub fn apply(&self, config: &mut Config) {
        if let Some(source) = self.source {
            config.source.kind = source.into();
        }
        if let Some(file) = &self.file {
            config.source.csv_path.clone_from(file);
        }
        if let Some(key) = &self.key {
            config.source.key_column.clone_from(key);
        }
        if let Some(interval) = self.interval {
            config.source.interval_secs = Some(interval);
        }
        if let Some(seed) = self.seed {
            config.synthetic.seed = Some(seed);
        }
        if self.no_color {
            config.display.color = false;
        }
        if self.no_journal {
            config.storage.journal_enabled = false;
        }
    }
}

/// Diff command arguments.
#[derive(Debug, Args)]
pub struct DiffCommand {
    /// The earlier snapshot (CSV)
    pub previous: PathBuf,

    /// The later snapshot (CSV)
    pub current: PathBuf,

    /// Column holding the record key
    #[arg(short, long, value_name = "COLUMN")]
    pub key: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long)]
    pub no_color: bool,
}

/// Generate command arguments.
#[derive(Debug, Args)]
pub struct GenerateCommand {
    /// Number of snapshots to print
    #[arg(short, long, default_value = "3")]
    pub ticks: u64,

    /// Seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,
}

/// History command arguments.
#[derive(Debug, Args)]
pub struct HistoryCommand {
    /// Maximum number of ticks to show
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Show journal totals instead of ticks
    #[arg(long)]
    pub stats: bool,
}

/// Tracking command arguments.
#[derive(Debug, Args)]
pub struct TrackingCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Source argument for `watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    /// Poll a CSV file
    Csv,
    /// Generate random plane movements
    Synthetic,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Csv => Self::Csv,
            SourceArg::Synthetic => Self::Synthetic,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Formatted table
    #[default]
    Table,
    /// JSON output
    Json,
}
