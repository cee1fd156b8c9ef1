mod commands;
mod input;
mod market_data;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::breakeven::BreakevenArgs;
use commands::stress::StressArgs;
use commands::waterfall::WaterfallArgs;

/// Structured-credit waterfall analysis
#[derive(Parser)]
#[command(
    name = "absw",
    version,
    about = "Structured-credit waterfall analysis",
    long_about = "A CLI for projecting ABS and CLO cash flows through a tranche \
                  waterfall with decimal precision. Supports built-in deal templates, \
                  OC/CNL/ARD triggers, breakeven CDR search and CDR stress ladders."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log debug detail to stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the built-in deal templates
    Templates,
    /// Project a deal through its waterfall under a scenario
    Waterfall(WaterfallArgs),
    /// Find the CDR at which a tranche first loses principal
    Breakeven(BreakevenArgs),
    /// Rerun the waterfall at multiples of the scenario CDR
    Stress(StressArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Templates => commands::templates::run_templates(),
        Commands::Waterfall(args) => commands::waterfall::run_waterfall(args),
        Commands::Breakeven(args) => commands::breakeven::run_breakeven(args),
        Commands::Stress(args) => commands::stress::run_stress(args),
        Commands::Version => {
            println!("absw {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
