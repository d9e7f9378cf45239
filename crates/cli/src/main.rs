//! Deliberate CLI — the main entry point.
//!
//! Commands:
//! - `run`       — Run the control loop on a free-form task
//! - `prospect`  — Research a sales prospect and print a three-part brief
//! - `config`    — Show the effective configuration or write the default file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "deliberate",
    about = "Deliberate — a Reason/Decide/Act/Observe/Reflect agent loop",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the agent loop on a task and print the final answer
    Run {
        /// The task description
        #[arg(short, long)]
        task: String,

        /// Override the step budget
        #[arg(long)]
        max_steps: Option<u32>,
    },

    /// Produce a prospect brief (value hypothesis, messaging angle, evidence)
    Prospect {
        /// Company name
        #[arg(long)]
        company: String,

        /// Industry
        #[arg(long)]
        industry: String,

        /// Free-text prospect profile
        #[arg(long, conflicts_with = "profile_file")]
        profile: Option<String>,

        /// Read the prospect profile from a file
        #[arg(long)]
        profile_file: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (API key redacted)
    Show,
    /// Write the default configuration file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { task, max_steps } => commands::run::run(task, max_steps).await?,
        Commands::Prospect {
            company,
            industry,
            profile,
            profile_file,
        } => commands::prospect::run(company, industry, profile, profile_file).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Init => commands::config_cmd::init().await?,
        },
    }

    Ok(())
}
