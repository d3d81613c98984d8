//! voicekit CLI - installs whisper.cpp and Kokoro-FastAPI

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    // Parse CLI
    let cli = Cli::parse();

    // Set up logging
    let filter = if cli.global.verbose {
        EnvFilter::new("voicekit=debug")
    } else {
        EnvFilter::new("voicekit=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    // Execute command
    match cli.command {
        Commands::Install(args) => commands::install::execute(args, &cli.global),
        Commands::Plan(args) => commands::plan::execute(args, &cli.global),
        Commands::Doctor(args) => commands::doctor::execute(args, &cli.global),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
