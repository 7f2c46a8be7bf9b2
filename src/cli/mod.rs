//! # CLI Module
//!
//! Command-line interface for the photo indexer.
//!
//! ## Usage
//! ```bash
//! # Scan and index everything in the config file
//! photo-index run --config ~/.config/photo-indexer/config.toml
//!
//! # Only reconcile roots with the index
//! photo-index scan --root ~/Pictures
//!
//! # Report exact duplicates as JSON
//! photo-index duplicates --output json
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_indexer::config::{IndexerConfig, RootConfig};
use photo_indexer::core::pipeline::{
    IndexReport, Indexer, ItemDuplicateGroup, RunReport, ScanReport,
};
use photo_indexer::error::Result;
use photo_indexer::events::{BatchEvent, Event, EventChannel, PipelineEvent, ScanEvent};
use serde::Serialize;
use std::path::PathBuf;
use std::thread;

/// Photo Indexer - keep a photo collection's index, metadata and thumbnails current
#[derive(Parser, Debug)]
#[command(name = "photo-index")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Additional root to index, on top of the configured ones
    #[arg(short, long = "root", global = true)]
    roots: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Reconcile roots with the index
    Scan,
    /// Extract metadata and render thumbnails for pending items
    Index,
    /// Scan, then index
    Run,
    /// Report files with identical content
    Duplicates,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => IndexerConfig::load_from(path)?,
        None => IndexerConfig::load()?,
    };
    for path in &cli.roots {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        config.roots.push(RootConfig::new(path));
    }

    let pretty = matches!(cli.output, OutputFormat::Pretty);
    let term = Term::stderr();
    if pretty {
        term.write_line(&format!(
            "{} {}",
            style("Photo Indexer").bold().cyan(),
            style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
        ))
        .ok();
    }

    let (sender, receiver) = EventChannel::new();
    let progress = pretty.then(|| {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        pb
    });

    let progress_clone = progress.clone();
    let event_thread = thread::spawn(move || {
        for event in receiver.iter() {
            let Some(pb) = &progress_clone else { continue };
            match event {
                Event::Pipeline(PipelineEvent::PhaseChanged { phase }) => {
                    pb.set_message(phase.to_string());
                }
                Event::Scan(ScanEvent::Started { root }) => {
                    pb.set_message(format!("Scanning {}", root.display()));
                }
                Event::Scan(ScanEvent::Skipped { root, reason }) => {
                    pb.println(format!(
                        "{} skipped {}: {}",
                        style("!").yellow(),
                        root.display(),
                        reason
                    ));
                }
                Event::Batch(BatchEvent::Started { total, .. }) => {
                    pb.set_length(total as u64);
                    pb.set_position(0);
                }
                Event::Batch(BatchEvent::Progress(p)) => {
                    pb.set_position(p.processed as u64);
                    if p.failed > 0 {
                        pb.set_message(format!("{} failed", p.failed));
                    }
                }
                Event::Pipeline(PipelineEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
                _ => {}
            }
        }
    });

    let outcome = execute(cli.command, config, sender);

    event_thread.join().ok();
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    let output = outcome?;
    match cli.output {
        OutputFormat::Pretty => print_pretty(&term, &output),
        OutputFormat::Json => print_json(&output),
    }
    Ok(())
}

/// What a command produced
#[derive(Serialize)]
#[serde(untagged)]
enum Output {
    Scan(ScanReport),
    Index(IndexReport),
    Run(RunReport),
    Duplicates(Vec<ItemDuplicateGroup>),
}

/// Build the indexer, run one command, and drop every event sender
fn execute(
    command: Commands,
    config: IndexerConfig,
    sender: photo_indexer::events::EventSender,
) -> Result<Output> {
    let indexer = Indexer::builder(config).events(sender).build()?;
    indexer.sync_roots()?;

    Ok(match command {
        Commands::Scan => Output::Scan(indexer.scan_all()?),
        Commands::Index => Output::Index(indexer.index_pending()?),
        Commands::Run => Output::Run(indexer.run()?),
        Commands::Duplicates => {
            indexer.scan_all()?;
            Output::Duplicates(indexer.find_duplicates()?)
        }
    })
}

fn print_json(output: &Output) {
    match serde_json::to_string_pretty(output) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize output: {}", e),
    }
}

fn print_pretty(term: &Term, output: &Output) {
    term.write_line("").ok();
    match output {
        Output::Scan(scan) => print_scan(term, scan),
        Output::Index(index) => print_index(term, index),
        Output::Run(run) => {
            print_scan(term, &run.scan);
            print_index(term, &run.index);
            term.write_line(&format!(
                "  finished in {:.1}s",
                run.duration_ms as f64 / 1000.0
            ))
            .ok();
        }
        Output::Duplicates(groups) => print_duplicates(term, groups),
    }
}

fn print_scan(term: &Term, scan: &ScanReport) {
    term.write_line(&format!(
        "{} Scanned {} roots",
        style("✓").green().bold(),
        style(scan.roots_scanned).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} new, {} changed, {} reappeared, {} missing",
        style(scan.new_items()).cyan(),
        style(scan.changed_items()).cyan(),
        style(scan.reappeared_items()).cyan(),
        style(scan.missing_items()).yellow()
    ))
    .ok();
    if scan.cancelled {
        term.write_line(&format!("  {}", style("cancelled").yellow())).ok();
    }
}

fn print_index(term: &Term, index: &IndexReport) {
    term.write_line(&format!(
        "{} Indexed {}/{} items, {} thumbnails written",
        style("✓").green().bold(),
        style(index.indexed).cyan(),
        index.pending,
        style(index.thumbnails_generated).cyan()
    ))
    .ok();
    for failure in &index.failures {
        term.write_line(&format!(
            "  {} item {}: {}",
            style("✗").red(),
            failure.item_id,
            style(&failure.message).dim()
        ))
        .ok();
    }
}

fn print_duplicates(term: &Term, groups: &[ItemDuplicateGroup]) {
    if groups.is_empty() {
        term.write_line(&format!("{} No duplicates found", style("✓").green().bold()))
            .ok();
        return;
    }

    let wasted: u64 = groups.iter().map(|g| g.wasted_bytes()).sum();
    term.write_line(&format!(
        "{} {} duplicate groups, {} reclaimable",
        style("!").yellow().bold(),
        style(groups.len()).cyan(),
        style(format_bytes(wasted)).yellow()
    ))
    .ok();
    term.write_line("").ok();

    for (i, group) in groups.iter().enumerate() {
        term.write_line(&format!(
            "  {} {} copies of {}",
            style(format!("Group {}:", i + 1)).bold(),
            group.paths.len(),
            format_bytes(group.size)
        ))
        .ok();
        for path in &group.paths {
            term.write_line(&format!("    {} {}", style("○").dim(), display_path(path)))
                .ok();
        }
    }
}

fn display_path(path: &std::path::Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(&home).ok().map(|p| p.to_path_buf())) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
