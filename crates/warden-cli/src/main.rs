//! Warden CLI - Command-line interface for the Warden runtime core.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

/// Warden module system and capability gate
#[derive(Parser)]
#[command(name = "warden")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Output format options.
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// List registered modules
    Modules(commands::modules::ModulesArgs),
    /// Show the members or documentation of a module
    Inspect(commands::inspect::InspectArgs),
    /// Resolve an import path
    Resolve(commands::resolve::ResolveArgs),
    /// Call a module function under a fresh context
    Call(commands::call::CallArgs),
    /// Print a module manifest
    Manifest(commands::manifest::ManifestArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warden={}", log_level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Modules(args) => commands::modules::execute(args, config, cli.format),
        Commands::Inspect(args) => commands::inspect::execute(args, config, cli.format),
        Commands::Resolve(args) => commands::resolve::execute(args, config, cli.format),
        Commands::Call(args) => commands::call::execute(args, config, cli.format, cli.quiet),
        Commands::Manifest(args) => commands::manifest::execute(args, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !cli.quiet {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}
