mod config;
mod render;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{debug, info};
use tracing_subscriber::filter::Directive;

use tangoview_logs::{EventStore, FilterCriteria, IngestManager, Level, MaintenanceTask};

use crate::config::Config;
use crate::render::FollowCursor;

/// tangoview - a viewer for TANGO device log streams
#[derive(Parser, Debug)]
#[command(name = "tangoview")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log files to read, one event per line ("-" for stdin; default stdin)
    #[arg(value_name = "FILE")]
    inputs: Vec<PathBuf>,

    /// Config file (default: <config dir>/tangoview/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Least severe level shown
    #[arg(long, value_name = "LEVEL")]
    min_level: Option<Level>,

    /// Only sources (devices) containing this text
    #[arg(long)]
    source: Option<String>,

    /// Only timestamps containing this text (DD/MM/YY HH:MM:SS.mmm)
    #[arg(long)]
    time: Option<String>,

    /// Only threads containing this text
    #[arg(long)]
    thread: Option<String>,

    /// Only messages containing this text
    #[arg(long)]
    message: Option<String>,

    /// Keep reading and print new rows as they arrive, until Ctrl-C
    #[arg(short, long)]
    follow: bool,

    /// How often follow mode prints new rows
    #[arg(long, default_value = "1000", value_name = "MS")]
    refresh_ms: u64,

    /// Print rows as JSON lines instead of a table
    #[arg(long)]
    json: bool,

    /// Print the details of one row of the filtered view instead
    #[arg(long, value_name = "ROW", conflicts_with_all = ["follow", "json"])]
    detail: Option<usize>,

    /// Print at most this many (newest) rows
    #[arg(long, value_name = "N")]
    limit: Option<usize>,
}

impl Args {
    /// Filter from the config file, overridden by command line flags
    fn criteria(&self, config: &Config) -> FilterCriteria {
        let mut filter = config.filter.clone();
        if let Some(level) = self.min_level {
            filter.min_level = level;
        }
        for (flag, field) in [
            (&self.source, &mut filter.source),
            (&self.time, &mut filter.timestamp),
            (&self.thread, &mut filter.thread),
            (&self.message, &mut filter.message),
        ] {
            if let Some(value) = flag {
                field.clone_from(value);
            }
        }
        filter.to_criteria()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(args.config.as_deref())?;

    let directive: Directive = config
        .log_level
        .parse()
        .with_context(|| format!("Invalid log_level '{}'", config.log_level))?;

    // Logs go to stderr; stdout carries the rows
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .with_writer(std::io::stderr)
        .init();

    let result = run_app(args, config).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args, config: Config) -> Result<()> {
    if args.follow && args.refresh_ms == 0 {
        bail!("--refresh-ms must be greater than zero");
    }

    let store = EventStore::new(config.store.clone()).context("Invalid store settings")?;
    store.set_filter(args.criteria(&config));

    let maintenance = MaintenanceTask::spawn(store.clone());
    let mut ingest = IngestManager::new(store.clone());
    open_inputs(&mut ingest, &args.inputs).await?;
    info!(sources = ?ingest.sources(), "reading inputs");

    if args.follow {
        follow(&store, &args).await?;
        ingest.stop();
        maintenance.stop().await;
    } else {
        ingest.join().await;
        maintenance.stop().await;
        // Merge whatever the last scheduled tick did not pick up
        store.set_paused(false);
        store.tick();
        print_view(&store, &args)?;
    }

    let counts = store.level_counts();
    info!(
        retained = counts.total(),
        visible = store.row_count(),
        errors = counts.error + counts.fatal,
        "done"
    );
    Ok(())
}

async fn open_inputs(ingest: &mut IngestManager, inputs: &[PathBuf]) -> Result<()> {
    if inputs.is_empty() {
        ingest.add_source("stdin", BufReader::new(tokio::io::stdin()));
        return Ok(());
    }

    for path in inputs {
        if path == Path::new("-") {
            ingest.add_source("stdin", BufReader::new(tokio::io::stdin()));
            continue;
        }
        let file = tokio::fs::File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        ingest.add_source(path.display().to_string(), BufReader::new(file));
    }
    Ok(())
}

fn print_view(store: &EventStore, args: &Args) -> Result<()> {
    let mut stdout = std::io::stdout().lock();

    if let Some(row) = args.detail {
        let event = store
            .event_at(row)
            .with_context(|| format!("No row {row} in the filtered view"))?;
        write!(stdout, "{}", render::render_detail(&event))?;
        return Ok(());
    }

    let snapshot = store.snapshot();
    let rows = &snapshot[..args.limit.unwrap_or(snapshot.len()).min(snapshot.len())];
    if args.json {
        for event in rows {
            writeln!(stdout, "{}", render::json_line(event)?)?;
        }
    } else {
        writeln!(stdout, "{}", render::render_table(rows))?;
    }
    Ok(())
}

/// Print new rows oldest first on every refresh until Ctrl-C
async fn follow(store: &EventStore, args: &Args) -> Result<()> {
    let mut cursor = FollowCursor::default();
    let mut refresh = tokio::time::interval(Duration::from_millis(args.refresh_ms));

    if !args.json {
        println!("{}", render::table_header());
    }

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                break;
            }
            _ = refresh.tick() => {
                let snapshot = store.snapshot();
                for event in cursor.take_new(&snapshot) {
                    if args.json {
                        println!("{}", render::json_line(&event)?);
                    } else {
                        println!("{}", render::table_row(&event));
                    }
                }
                debug!(
                    visible = snapshot.len(),
                    pending = store.pending_count(),
                    paused = store.is_paused(),
                    "refresh"
                );
            }
        }
    }
    Ok(())
}
