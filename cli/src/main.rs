mod commands;
mod config;
mod logging;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{cmd_dashboard, cmd_invoke, cmd_seed};
use crate::config::Config;

#[derive(Parser)]
#[command(
    name = "fittrack",
    version,
    about = "Fitness tracking backend: meals, workouts, weight, activity, and a social feed"
)]
struct Cli {
    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the function over HTTP at `/` and `/api`
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Run a single function event (JSON) and print the response
    Invoke {
        /// Event file (reads stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Load demo recipes, challenges, and personal records
    Seed {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show today's dashboard
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    logging::init_tracing(cli.debug)?;
    let config = Config::load()?;
    tracing::debug!(database = %config.db_path.display(), user_id = config.user_id, "loaded config");

    match cli.command {
        Commands::Serve { port, bind } => server::start_server(&config, port, &bind).await,
        Commands::Invoke { file } => cmd_invoke(&config, file.as_deref()),
        Commands::Seed { json } => cmd_seed(&config, json),
        Commands::Dashboard { json } => cmd_dashboard(&config, json),
    }
}
