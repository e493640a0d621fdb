//! `fltwatch` - CLI for flightwatch
//!
//! Polls a snapshot source, prints each tick's labeled table and the
//! tracking table, and keeps a journal of past runs.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn};

use flightwatch::cli::{
    Cli, Command, ConfigCommand, DiffCommand, GenerateCommand, HistoryCommand, OutputFormat,
    TrackingCommand, WatchCommand,
};
use flightwatch::config::SyntheticConfig;
use flightwatch::source::{self, read_snapshot, write_snapshot};
use flightwatch::{
    diff, drive, init_logging, render, Config, DiffSummary, Journal, LoopOptions, SyntheticSource,
    TickReport, WatchHandle, Watcher,
};

type AppResult = Result<(), Box<dyn std::error::Error>>;

fn main() -> AppResult {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Watch(cmd) => handle_watch(config, &cmd),
        Command::Diff(cmd) => handle_diff(&config, &cmd),
        Command::Generate(cmd) => handle_generate(&config, &cmd),
        Command::History(cmd) => handle_history(&config, &cmd),
        Command::Tracking(cmd) => handle_tracking(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn handle_watch(mut config: Config, cmd: &WatchCommand) -> AppResult {
    cmd.apply(&mut config);
    config.validate()?;

    let mut source = source::from_config(&config);
    let mut watcher = Watcher::new(config.tracking.reentry);

    let mut journal = if config.storage.journal_enabled {
        Some(Journal::open(config.database_path())?)
    } else {
        None
    };
    let run_id = journal
        .as_ref()
        .map(|journal| journal.start_run(config.source.kind, Utc::now()))
        .transpose()?;

    let interval = config.poll_interval();
    let options = LoopOptions {
        interval,
        max_polls: cmd.ticks,
    };
    let max_ticks = config.storage.max_ticks;
    let handle = WatchHandle::new();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let summary = runtime.block_on(async {
        let stopper = handle.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping");
                stopper.stop();
            }
        });

        drive(
            source.as_mut(),
            &mut watcher,
            options,
            &handle,
            |report, watcher| {
                if let (Some(journal), Some(run_id)) = (journal.as_mut(), run_id) {
                    journal.record_tick(run_id, report, watcher.tracking())?;
                    if max_ticks > 0 {
                        journal.prune_keep_recent(max_ticks)?;
                    }
                }
                print_tick(report, watcher, &config, cmd.format, interval.as_secs())
            },
        )
        .await
    })?;

    if summary.skipped > 0 {
        warn!(skipped = summary.skipped, "some ticks were skipped");
    }
    Ok(())
}

fn print_tick(
    report: &TickReport,
    watcher: &Watcher,
    config: &Config,
    format: OutputFormat,
    interval_secs: u64,
) -> flightwatch::Result<()> {
    let key_field = watcher.previous().key_field();
    match format {
        OutputFormat::Table => {
            println!("{}", render::tick_header(report));
            print!(
                "{}",
                render::labeled_table(&report.rows, key_field, config.display.color)
            );
            if config.display.show_tracking {
                println!();
                print!("{}", render::tracking_table(watcher.tracking().records()));
            }
            println!();
            println!("{}", render::countdown_line(interval_secs));
            println!();
        }
        OutputFormat::Json => {
            let tracking = config
                .display
                .show_tracking
                .then(|| watcher.tracking().records());
            let doc = render::tick_json(report, key_field, tracking)?;
            println!("{}", serde_json::to_string(&doc)?);
        }
    }
    Ok(())
}

fn handle_diff(config: &Config, cmd: &DiffCommand) -> AppResult {
    let key = cmd.key.as_deref().unwrap_or(&config.source.key_column);

    let previous = read_snapshot(&cmd.previous, key)?;
    previous.validate()?;
    let current = read_snapshot(&cmd.current, key)?;
    current.validate()?;

    let rows = diff(&previous, &current);
    match cmd.format {
        OutputFormat::Table => {
            let color = config.display.color && !cmd.no_color;
            print!("{}", render::labeled_table(&rows, key, color));
            println!();
            println!("{}", DiffSummary::from_labeled(&rows));
        }
        OutputFormat::Json => {
            let doc = render::labeled_json(&rows, key)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(())
}

fn handle_generate(config: &Config, cmd: &GenerateCommand) -> AppResult {
    let mut generator = SyntheticSource::from_config(&SyntheticConfig {
        seed: cmd.seed.or(config.synthetic.seed),
        ..config.synthetic.clone()
    });

    for tick in 0..cmd.ticks {
        if tick > 0 {
            println!();
        }
        let snapshot = generator.next_snapshot(Utc::now());
        write_snapshot(&snapshot, io::stdout().lock())?;
    }
    Ok(())
}

fn handle_history(config: &Config, cmd: &HistoryCommand) -> AppResult {
    let Some(journal) = open_existing_journal(config)? else {
        return Ok(());
    };

    if cmd.stats {
        let stats = journal.stats()?;
        if cmd.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            print!("{}", render::stats_text(&stats));
        }
        return Ok(());
    }

    let ticks = journal.recent_ticks(cmd.limit)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&ticks)?);
        return Ok(());
    }

    if ticks.is_empty() {
        println!("No ticks recorded.");
        return Ok(());
    }

    println!(
        "{:>5}  {:>6}  {:<19}  {:>8}  {:>5}  {:>7}  digest",
        "run", "tick", "observed_at", "existing", "added", "removed"
    );
    for entry in &ticks {
        let digest = entry.digest.get(..12).unwrap_or(&entry.digest);
        println!(
            "{:>5}  {:>6}  {:<19}  {:>8}  {:>5}  {:>7}  {digest}{}",
            entry.run_id,
            entry.tick,
            entry.observed_at.format("%Y-%m-%d %H:%M:%S"),
            entry.summary.existing,
            entry.summary.additions,
            entry.summary.removals,
            if entry.unchanged { " (unchanged)" } else { "" },
        );
    }
    Ok(())
}

fn handle_tracking(config: &Config, cmd: &TrackingCommand) -> AppResult {
    let Some(journal) = open_existing_journal(config)? else {
        return Ok(());
    };

    let Some((run, records)) = journal.latest_tracking()? else {
        println!("No runs recorded.");
        return Ok(());
    };

    if cmd.json {
        let doc = serde_json::json!({
            "run": run,
            "tracking": render::tracking_json(&records)?,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        println!(
            "Run {} ({} source, started {})",
            run.id,
            run.source,
            run.started_at.format("%Y-%m-%d %H:%M:%S")
        );
        println!();
        print!("{}", render::tracking_table(&records));
    }
    Ok(())
}

/// Open the configured journal, or report that there is none yet.
fn open_existing_journal(config: &Config) -> Result<Option<Journal>, Box<dyn std::error::Error>> {
    let path = config.database_path();
    if !path.exists() {
        println!("No journal at {}", path.display());
        return Ok(None);
    }
    Ok(Some(Journal::open(path)?))
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> AppResult {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Source]");
                println!("  Kind:               {}", config.source.kind);
                println!("  CSV path:           {}", config.source.csv_path.display());
                println!("  Key column:         {}", config.source.key_column);
                println!(
                    "  Interval (secs):    {}",
                    config.poll_interval().as_secs()
                );
                println!();
                println!("[Synthetic]");
                println!(
                    "  Seed:               {}",
                    config
                        .synthetic
                        .seed
                        .map_or_else(|| "random".to_string(), |s| s.to_string())
                );
                println!("  Change rate:        {}", config.synthetic.change_rate);
                println!("  Initial minimum:    {}", config.synthetic.initial_min);
                println!();
                println!("[Tracking]");
                println!("  Re-entry:           {}", config.tracking.reentry);
                println!();
                println!("[Storage]");
                println!("  Journal:            {}", config.storage.journal_enabled);
                println!("  Database path:      {}", config.database_path().display());
                println!("  Max ticks:          {}", config.storage.max_ticks);
                println!();
                println!("[Display]");
                println!("  Color:              {}", config.display.color);
                println!("  Show tracking:      {}", config.display.show_tracking);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
