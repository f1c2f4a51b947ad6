use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod cache;
mod cli;
mod config;
mod error;
mod observe;
mod pipeline;
mod provider;
mod retry;
mod state;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - only show logs with --verbose
    let filter = if cli.verbose {
        EnvFilter::new("ragline=debug")
    } else {
        EnvFilter::new("ragline=warn")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    match cli.command {
        Commands::Ask(args) => cli::ask::execute(args).await,
        Commands::Init(args) => cli::init::execute(args),
        Commands::Schema => cli::schema::execute(),
    }
}
