use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use karion::montecarlo::{self, DerivedMetrics, MonteCarloParams, DEFAULT_SIMULATIONS};
use karion::report;

#[derive(Parser, Debug)]
#[command(name = "karion-sim")]
#[command(about = "Offline Monte Carlo runs and strategy metrics")]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Print verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct Edge {
    /// Win rate, fraction or percent
    #[arg(short, long)]
    win_rate: f64,

    /// Average win in R
    #[arg(long, default_value = "2.0")]
    avg_win: f64,

    /// Average loss in R
    #[arg(long, default_value = "1.0")]
    avg_loss: f64,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a Monte Carlo batch and print the report
    Simulate {
        #[command(flatten)]
        edge: Edge,

        /// Trades per run
        #[arg(short = 'n', long, default_value = "10000")]
        num_trades: usize,

        /// Starting capital
        #[arg(long, default_value = "10000")]
        capital: f64,

        /// Risk per trade, fraction or percent
        #[arg(long, default_value = "0.01")]
        risk: f64,

        /// Number of runs
        #[arg(short, long, default_value_t = DEFAULT_SIMULATIONS)]
        simulations: usize,

        /// Seed for a reproducible batch
        #[arg(long)]
        seed: Option<u64>,

        /// Write the equity curves to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the text report to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print expectancy, profit factor and Kelly without simulating
    Metrics {
        #[command(flatten)]
        edge: Edge,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { "karion=debug" } else { "karion=info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.parse()?))
        .init();

    match args.command {
        Commands::Simulate {
            edge,
            num_trades,
            capital,
            risk,
            simulations,
            seed,
            csv,
            output,
        } => {
            let mut params = MonteCarloParams::new(edge.win_rate, edge.avg_win, edge.avg_loss);
            params.num_trades = num_trades;
            params.initial_capital = capital;
            params.risk_per_trade = risk;
            params.simulations = Some(simulations);
            params.seed = seed;

            info!("Running {} simulations of {} trades", simulations, num_trades);
            let result = montecarlo::simulate(&params, simulations)?;

            let title = "Karion Monte Carlo Report";
            match output {
                Some(path) => {
                    report::export_text(&result, title, &path)?;
                    info!("Report written to {}", path.display());
                }
                None => print!("{}", report::render_text(&result, title, chrono::Utc::now())),
            }

            if let Some(path) = csv {
                report::export_curves(&result, &path)?;
                info!("{} equity curves written to {}", result.equity_curves.len(), path.display());
            }
        }
        Commands::Metrics { edge } => {
            let p = MonteCarloParams::new(edge.win_rate, edge.avg_win, edge.avg_loss).normalized()?;
            let m = DerivedMetrics::compute(p.win_rate, p.avg_win, p.avg_loss);
            println!("{}", serde_json::to_string_pretty(&m)?);
        }
    }

    Ok(())
}
