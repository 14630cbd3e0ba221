//! knexa-sim — synthetic contextual pair matchmaking simulation.
//!
//! Runs the LinUCB pair bandit against a random baseline and writes the
//! learning and regret curves.

use clap::Parser;
use knexa_core::config::AppConfig;
use knexa_simulation::{run_simulation, Method};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "knexa-sim")]
#[command(about = "Contextual pair matchmaking simulation (LinUCB vs random)")]
#[command(version)]
struct Cli {
    /// TOML config file, layered under KNEXA__* environment variables
    #[arg(long, env = "KNEXA_CONFIG")]
    config: Option<String>,

    /// RNG seed (overrides config)
    #[arg(long, env = "KNEXA__SIMULATION__SEED")]
    seed: Option<u64>,

    /// Number of rounds (overrides config)
    #[arg(long)]
    rounds: Option<u32>,

    /// Number of participants (overrides config)
    #[arg(long)]
    participants: Option<usize>,

    /// Per-participant feature dimension (overrides config)
    #[arg(long)]
    participant_dim: Option<usize>,

    /// Disjoint pairs per round (overrides config)
    #[arg(long)]
    pairs_per_round: Option<usize>,

    /// Reward noise standard deviation (overrides config)
    #[arg(long)]
    noise_sigma: Option<f64>,

    /// Exploration scale beta0 (overrides config)
    #[arg(long)]
    beta0: Option<f64>,

    /// Ridge regularization lambda (overrides config)
    #[arg(long)]
    lambda: Option<f64>,

    /// Output directory for curves and summary (overrides config)
    #[arg(long)]
    output_dir: Option<String>,

    /// Run without writing any files
    #[arg(long, default_value_t = false)]
    no_write: bool,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "knexa_sim=info,knexa_simulation=info,knexa_cpm=info".into());
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    info!("knexa-sim starting up");

    // Load configuration
    let mut config = AppConfig::load_from(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(seed) = cli.seed {
        config.simulation.seed = seed;
    }
    if let Some(rounds) = cli.rounds {
        config.simulation.num_rounds = rounds;
    }
    if let Some(participants) = cli.participants {
        config.simulation.num_participants = participants;
    }
    if let Some(dim) = cli.participant_dim {
        config.bandit.participant_dim = dim;
    }
    if let Some(k) = cli.pairs_per_round {
        config.simulation.pairs_per_round = k;
    }
    if let Some(sigma) = cli.noise_sigma {
        config.simulation.noise_sigma = sigma;
    }
    if let Some(beta0) = cli.beta0 {
        config.bandit.beta0 = beta0;
    }
    if let Some(lambda) = cli.lambda {
        config.bandit.lambda = lambda;
    }
    if let Some(dir) = cli.output_dir {
        config.output.dir = dir;
    }

    config.validate()?;

    info!(
        seed = config.simulation.seed,
        participants = config.simulation.num_participants,
        participant_dim = config.bandit.participant_dim,
        pairs_per_round = config.simulation.pairs_per_round,
        rounds = config.simulation.num_rounds,
        lambda = config.bandit.lambda,
        beta0 = config.bandit.beta0,
        "Configuration loaded"
    );

    let report = run_simulation(&config)?;

    if !cli.no_write {
        let written = report.write_outputs(&config.output)?;
        println!("Saved:");
        for path in written {
            println!("  - {}", path.display());
        }
    }

    println!(
        "Final cumulative regret: {} {:.4}, {} {:.4}",
        Method::LinUcb,
        report.final_regret(Method::LinUcb),
        Method::Random,
        report.final_regret(Method::Random)
    );

    Ok(())
}
