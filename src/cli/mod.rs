pub mod ask;
pub mod init;
pub mod schema;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ragline")]
#[command(
    author,
    version,
    about = "Retrieval-augmented pipeline orchestrator for grounded incident reports"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline for one query and print the report
    Ask(AskArgs),

    /// Write a default config file
    Init(InitArgs),

    /// Print JSON Schema for config validation
    Schema,
}

#[derive(Parser, Clone)]
pub struct AskArgs {
    /// The monitoring/incident question
    #[arg(value_name = "QUERY")]
    pub query: String,

    /// Path to config file
    #[arg(short, long, default_value = "ragline.yaml")]
    pub config: PathBuf,

    /// Raw log/alert texts for the extraction pre-step (repeatable)
    #[arg(long = "raw-text", value_name = "TEXT")]
    pub raw_texts: Vec<String>,

    /// Thread id for in-process checkpointing; snapshots are kept in memory
    /// and do not outlive the command
    #[arg(long)]
    pub thread: Option<String>,

    /// Override the JSONL corpus backing lexical search
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Emit the full final state as JSON instead of a text report
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Clone)]
pub struct InitArgs {
    /// Where to write the config
    #[arg(short, long, default_value = "ragline.yaml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}
