//! ═══════════════════════════════════════════════════════════════════════════════
//! FORESIGHT — Command Line
//! ═══════════════════════════════════════════════════════════════════════════════
//! Replay a recorded tick log through a monitor, or inspect a saved baseline.
//! ═══════════════════════════════════════════════════════════════════════════════

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

use foresight::baseline::{default_baseline_path, read_snapshot};
use foresight::{Channel, MonitorConfig, SelfMonitor, TickInput, TickReport};

#[derive(Parser)]
#[command(name = "foresight")]
#[command(about = "Foresight - predictive self-monitoring", long_about = None)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feed a JSON-lines tick log through the monitor
    Replay {
        /// One tick per line: {"timestamp", "hour", "ambient_temp", "light", ..., "anima", "actuator_level"}
        file: PathBuf,

        /// Baseline file (overrides config and environment)
        #[arg(short, long)]
        baseline: Option<PathBuf>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Keep the baseline in memory only
        #[arg(long)]
        no_save: bool,

        /// Print every tick report as a JSON line
        #[arg(long)]
        json: bool,

        /// Only print the final summary
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show a saved baseline
    Stats {
        /// Baseline file (defaults to the standard data location)
        #[arg(short, long)]
        baseline: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            file,
            baseline,
            config,
            no_save,
            json,
            quiet,
        } => {
            let mut config = match config {
                Some(path) => MonitorConfig::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => MonitorConfig::from_env()?,
            };
            if let Some(path) = baseline {
                config.baseline_path = Some(path);
            }
            if no_save {
                config.baseline_path = None;
            } else if config.baseline_path.is_none() {
                config.baseline_path = Some(default_baseline_path());
            }
            run_replay(&file, config, json, quiet)
        }
        Commands::Stats { baseline } => {
            let path = baseline.unwrap_or_else(default_baseline_path);
            show_baseline(&path)
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REPLAY
// ═══════════════════════════════════════════════════════════════════════════════

fn run_replay(file: &Path, config: MonitorConfig, json: bool, quiet: bool) -> Result<()> {
    let reader = BufReader::new(
        std::fs::File::open(file).with_context(|| format!("opening {}", file.display()))?,
    );
    let persistent = config.baseline_path.is_some();
    let mut monitor = SelfMonitor::new(config);

    let mut ticks = 0usize;
    let mut skipped = 0usize;
    let mut reflections = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let tick: TickInput = match serde_json::from_str(trimmed) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(line = line_no + 1, "Skipping malformed tick: {}", e);
                skipped += 1;
                continue;
            }
        };

        let report = monitor.step(&tick);
        ticks += 1;
        if report.reflection.is_some() {
            reflections += 1;
        }

        if json {
            println!("{}", serde_json::to_string(&report)?);
        } else if !quiet {
            print_events(&report);
        }
    }

    if persistent {
        monitor.save().context("saving baseline")?;
    }

    let stats = monitor.stats(100);
    println!();
    println!("═══════════════════════════════════════════════════════════════════════════════");
    println!("                              REPLAY SUMMARY");
    println!("═══════════════════════════════════════════════════════════════════════════════");
    println!("Ticks:           {} ({} skipped)", ticks, skipped);
    println!("Reflections:     {}", reflections);
    println!("Observations:    {}", stats.observation_count);
    match stats.mean_surprise {
        Some(s) => println!("Mean surprise:   {:.3}", s),
        None => println!("Mean surprise:   -"),
    }
    println!("Pending asks:    {}", stats.pending_curiosity);
    println!();
    println!("{:<14} {:>10} {:>10} {:>8}", "Channel", "Mean err", "Hit rate", "Weight");
    for &channel in Channel::all() {
        let name = channel.name();
        let (Some(err), Some(hit)) = (
            stats.channel_mean_error.get(name),
            stats.channel_hit_rate.get(name),
        ) else {
            continue;
        };
        let weight = stats.domain_weights.get(name).copied().unwrap_or(1.0);
        println!("{:<14} {:>10.3} {:>9.0}% {:>8.2}", name, err, hit * 100.0, weight);
    }
    Ok(())
}

fn print_events(report: &TickReport) {
    let ts = report.error.timestamp.format("%Y-%m-%d %H:%M:%S");
    if let Some(reflection) = &report.reflection {
        println!(
            "[{}] \x1b[33m⟡ {}\x1b[0m (surprise {:.2}) {}",
            ts, reflection.trigger, reflection.surprise, reflection.observation
        );
    }
    if let Some(question) = &report.question {
        println!("[{}]   ? {}", ts, question);
    }
    for outcome in &report.curiosity_outcomes {
        let mark = if outcome.improved {
            "\x1b[32m↑\x1b[0m"
        } else {
            "\x1b[31m↓\x1b[0m"
        };
        println!(
            "[{}]   {} {} error {:.3} → {:.3}, weight {:.2} → {:.2}",
            ts,
            mark,
            outcome.domain,
            outcome.error_then,
            outcome.error_now,
            outcome.old_weight,
            outcome.new_weight
        );
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATS
// ═══════════════════════════════════════════════════════════════════════════════

fn show_baseline(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("No baseline saved at {}", path.display());
        return Ok(());
    }
    let snapshot =
        read_snapshot(path).with_context(|| format!("reading baseline {}", path.display()))?;

    println!("═══════════════════════════════════════════════════════════════════════════════");
    println!("                              SAVED BASELINE");
    println!("═══════════════════════════════════════════════════════════════════════════════");
    println!();
    println!("File:          {}", path.display());
    println!("Observations:  {}", snapshot.observation_count);
    match snapshot.saved_at {
        Some(t) => println!("Saved at:      {}", t),
        None => println!("Saved at:      -"),
    }
    println!();
    println!("{:<14} {:>14} {:>8}", "Channel", "Baseline", "Weight");
    for &channel in Channel::all() {
        let value = snapshot
            .channel_value(channel)
            .map(|v| channel.format_value(v))
            .unwrap_or_else(|| "-".to_string());
        let weight = snapshot
            .domain_weights
            .get(channel.name())
            .copied()
            .unwrap_or(1.0);
        println!("{:<14} {:>14} {:>8.2}", channel.name(), value, weight);
    }

    if !snapshot.diurnal.is_empty() {
        println!();
        println!("Diurnal profile:");
        let mut hours: Vec<(u8, &Vec<f64>)> = snapshot
            .diurnal
            .iter()
            .filter_map(|(h, v)| h.parse::<u8>().ok().map(|h| (h, v)))
            .collect();
        hours.sort_by_key(|(h, _)| *h);
        for (hour, values) in hours {
            if values.is_empty() {
                continue;
            }
            let mean = values.iter().sum::<f64>() / values.len() as f64;
            println!("  {:02}:00  {:>8.2}  (n={})", hour, mean, values.len());
        }
    }
    Ok(())
}
