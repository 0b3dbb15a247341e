//! trecs Simulator CLI
//!
//! Run canned recommender-system scenarios from a seed.

use clap::Parser;
use std::io;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;
use trecs_env::{derive_seed, RandomSource, SeededSource};
use trecs_sim::scenarios::ScenarioId;
use trecs_sim::{ScenarioResult, ScenarioRunner};

/// trecs scenario CLI
#[derive(Parser, Debug)]
#[command(name = "trecs-sim")]
#[command(about = "Run deterministic recommender-system simulations", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (homogenization, startup_exploration, exploration_mix,
    /// viral_spread, friend_star, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Timesteps per run
    #[arg(short, long, default_value = "50")]
    timesteps: usize,

    /// Number of users
    #[arg(short, long, default_value = "100")]
    users: usize,

    /// Number of items (content filtering only)
    #[arg(short, long)]
    items: Option<usize>,

    /// Number of attributes (content filtering only)
    #[arg(short, long)]
    attributes: Option<usize>,

    /// Number of seeds to run, derived from the master seed
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output on stdout, series included
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("trecs simulator v{}", env!("CARGO_PKG_VERSION"));
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        vec![args.scenario.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!("Available scenarios:");
            for scenario in ScenarioId::all() {
                eprintln!("  {:<20} {}", scenario.name(), scenario.description());
            }
            eprintln!("  {:<20} every scenario above", "all");
            std::process::exit(1);
        })]
    };

    let base_seed = if args.seed == 0 {
        SeededSource::from_entropy().seed()
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = if seed_offset == 0 {
            base_seed
        } else {
            derive_seed(base_seed, seed_offset as u64)
        };

        let mut runner = ScenarioRunner::new(seed, args.users).with_timesteps(args.timesteps);
        if let Some(n) = args.items {
            runner = runner.with_items(n);
        }
        if let Some(n) = args.attributes {
            runner = runner.with_attributes(n);
        }

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} (seed={}) PASSED | {:?}",
                        scenario.name(),
                        seed,
                        result.metrics
                    );
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }
            all_results.push(result);
        }
    }

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "timesteps": r.timesteps,
                    "failure_reason": r.failure_reason,
                    "structural_virality": r.metrics.structural_virality,
                    "export": r.export,
                })
            }).collect::<Vec<_>>(),
        });
        if let Err(e) = serde_json::to_writer_pretty(io::stdout(), &summary) {
            eprintln!("Error: failed to write summary: {}", e);
            std::process::exit(1);
        }
        println!();
    } else if failed_count == 0 {
        info!("All {} scenario runs passed", total);
    } else {
        error!("{}/{} scenario runs failed", failed_count, total);
    }

    if failed_count > 0 {
        std::process::exit(1);
    }
}
