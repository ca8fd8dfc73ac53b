// Binary Prediction Market - replay entry point
// Runs a JSON script of timed operations against the engine and prints the outcome of each

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing::info;

use binary_prediction_market::app_state::AppState;
use binary_prediction_market::clock::{format_timestamp, Clock, ManualClock, SystemClock};
use binary_prediction_market::commands::parse_script;
use binary_prediction_market::config::EngineConfig;
use binary_prediction_market::params::ParameterStorage;
use binary_prediction_market::units::{format_bps, format_tokens};

#[derive(Parser)]
#[command(name = "market-replay")]
#[command(about = "Replay a script of prediction market operations")]
#[command(version)]
struct Cli {
    /// JSON array of { "at", "caller", "op" } steps
    script: PathBuf,

    /// Write a state snapshot here when the script finishes
    #[arg(short, long)]
    snapshot: Option<PathBuf>,

    /// Start from a previously saved snapshot instead of an empty engine
    #[arg(short, long)]
    resume: Option<PathBuf>,

    /// error, warn, info, debug or trace (default: MARKET_LOG or info)
    #[arg(short, long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    let level = config.effective_log_level(cli.log_level.as_deref());
    tracing_subscriber::fmt()
        .with_max_level(
            level
                .parse::<tracing::Level>()
                .with_context(|| format!("invalid log level '{}'", level))?,
        )
        .init();

    println!("\n═══════════════════════════════════════════════");
    println!("     🎲 Binary Prediction Market Replay");
    println!("═══════════════════════════════════════════════\n");

    config.log_summary();
    let clock = ManualClock::new(SystemClock.now());

    let mut state = match &cli.resume {
        Some(path) => AppState::load_from_disk(path, clock.clone())
            .with_context(|| format!("failed to resume from {}", path.display()))?,
        None => AppState::new(&config, ParameterStorage::from_env(), clock.clone()),
    };

    let raw = fs::read_to_string(&cli.script)
        .with_context(|| format!("failed to read script {}", cli.script.display()))?;
    let steps = parse_script(&raw)
        .with_context(|| format!("failed to parse script {}", cli.script.display()))?;
    info!("📜 {} steps loaded from {}", steps.len(), cli.script.display());

    let mut failures = 0;
    for (i, step) in steps.into_iter().enumerate() {
        clock.set(step.at);
        let name = step.op.name();
        match state.execute(&step.caller, step.op) {
            Ok(output) => println!(
                "✅ [{:>3}] {} {} {}: {}",
                i,
                format_timestamp(step.at),
                step.caller,
                name,
                output
            ),
            Err(e) => {
                failures += 1;
                println!(
                    "❌ [{:>3}] {} {} {}: {} ({:?})",
                    i,
                    format_timestamp(step.at),
                    step.caller,
                    name,
                    e,
                    e.class()
                );
            }
        }
    }

    println!("\n📊 Markets:");
    for market in state.markets.iter() {
        let odds = market.odds()?;
        println!(
            "   {} {} {} \"{}\" [{}]",
            market.state.emoji(),
            market.id,
            market.state,
            market.question,
            market.category
        );
        println!(
            "      {}: {}  |  {}: {}",
            market.outcomes[0],
            format_bps(odds[0]),
            market.outcomes[1],
            format_bps(odds[1])
        );
        println!(
            "      volume {}  balance {}  solvent {}",
            format_tokens(market.volume),
            format_tokens(market.balance),
            market.is_solvent()
        );
    }

    let stats = state.ledger.stats();
    println!(
        "\n📒 Ledger: {} accounts, {} transactions, {} escrowed",
        stats.accounts,
        stats.transactions,
        format_tokens(stats.total_escrowed)
    );
    println!("📣 Events: {} (chain valid: {})", state.events.len(), state.events.verify());
    println!("⚠️  Failed steps: {}", failures);

    if let Some(path) = cli.snapshot.or(config.snapshot_path) {
        state
            .save_to_disk(&path)
            .with_context(|| format!("failed to save snapshot to {}", path.display()))?;
    }

    Ok(())
}
