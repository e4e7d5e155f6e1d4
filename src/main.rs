//! Arimaa-Zoo: an Arimaa engine.
//!
//! ## Usage
//!
//! - `arimaa-zoo` - Speak AEI on stdin/stdout
//! - `arimaa-zoo aei` - Same, explicitly
//! - `arimaa-zoo search --position '<short>'` - Search one position
//!
//! Diagnostics go to stderr and are filtered with `RUST_LOG`.

use std::io;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use arimaa_zoo::aei::Aei;
use arimaa_zoo::constants::{DEFAULT_CONCURRENCY, DEFAULT_HASH_MB};
use arimaa_zoo::engine::Engine;
use arimaa_zoo::evaluator::EvaluatorKind;
use arimaa_zoo::position::Position;
use arimaa_zoo::settings::{Settings, parse_override};

/// Arimaa-Zoo: an MCTS Arimaa engine
#[derive(Parser)]
#[command(name = "arimaa-zoo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Number of search workers
    #[arg(long, global = true, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Seed for setups and the random evaluator (0 picks one)
    #[arg(long, global = true, default_value_t = 0)]
    seed: u64,

    /// Transposition table size in megabytes
    #[arg(long, global = true, default_value_t = DEFAULT_HASH_MB)]
    hash: usize,

    /// Position evaluator: dummy, random or heuristic
    #[arg(long, global = true, default_value_t = EvaluatorKind::default())]
    evaluator: EvaluatorKind,

    /// Trace every AEI line sent and received
    #[arg(long, global = true)]
    log_protocol_traffic: bool,

    /// Name reported by `id name`
    #[arg(long, global = true)]
    bot_name: Option<String>,

    /// Set an AEI option at startup, as name=value (repeatable)
    #[arg(short = 'O', long = "option", global = true, value_name = "NAME=VALUE")]
    options: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the AEI command loop on stdin/stdout
    Aei,
    /// Search a single position and print the best move
    Search {
        /// Position in short notation, e.g. "g [rrrr...RRRR]"
        #[arg(long)]
        position: String,
        /// Playout budget
        #[arg(long, default_value_t = 1000)]
        playouts: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(filter)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings {
        concurrency: cli.concurrency.max(1),
        seed: cli.seed,
        hash_mb: cli.hash,
        evaluator: cli.evaluator,
        ..Settings::default()
    };
    if let Some(name) = cli.bot_name {
        settings.bot_name = name;
    }
    for option in &cli.options {
        let (name, value) = parse_override(option)?;
        settings
            .set(&name, &value)
            .with_context(|| format!("applying option {option:?}"))?;
    }

    match cli.command.unwrap_or(Commands::Aei) {
        Commands::Aei => {
            let mut aei = Aei::new(settings, io::stdout(), cli.log_protocol_traffic);
            aei.run(io::stdin().lock()).context("AEI loop failed")?;
        }
        Commands::Search { position, playouts } => {
            settings.playouts = playouts;
            let pos = Position::from_short(&position).context("parsing --position")?;
            let mut engine = Engine::new(settings);
            engine.set_position(pos);
            let report = engine.search();
            for line in report.info_lines() {
                println!("{line}");
            }
            if report.best.is_none() {
                bail!("no legal move");
            }
            println!("bestmove {}", report.notation);
        }
    }
    Ok(())
}
