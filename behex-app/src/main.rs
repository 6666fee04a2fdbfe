mod app;
pub use app::App;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "behex")]
#[command(about = "Behavioral experiment suite: run simulated sessions and inspect designs", long_about = None)]
pub struct Cli {
    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one session with a simulated participant
    Run {
        /// Task to run, overriding the config file
        #[arg(short, long)]
        task: Option<String>,

        /// JSON configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for every random draw of the session
        #[arg(long)]
        seed: Option<u64>,

        /// Data directory, overriding the config file
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Pace the session on the wall clock instead of simulated time
        #[arg(long, default_value_t = false)]
        realtime: bool,

        /// Probability that the participant answers correctly
        #[arg(long, default_value_t = 0.9)]
        accuracy: f64,
    },
    /// Print Effort digit sequences
    Sequence {
        #[arg(short, long)]
        switches: i64,

        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Digits per sequence (9 or 10)
        #[arg(short, long, default_value_t = 10)]
        length: usize,

        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print Clock reward curves as CSV
    Curves {
        /// CEV, DEV, IEV or CEVR; all four when omitted
        #[arg(short, long)]
        condition: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let app = App::new(cli.command)?;
    app.run()?;

    Ok(())
}
