use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use friction_core::storage::files::DEFAULT_OUTPUT_DIR;
use friction_core::storage::OutputDir;
use friction_core::FrictionConfig;

mod commands;
mod output;

#[derive(Parser)]
#[command(
    name = "friction",
    version,
    about = "Score friction in agent session logs and mine recurring failure patterns"
)]
struct Cli {
    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON file with weight and threshold overrides
    #[arg(long, global = true, env = "FRICTION_CONFIG")]
    config: Option<PathBuf>,

    /// Directory analysis outputs are written to
    #[arg(long, global = true, env = "FRICTION_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Console summary format
    #[arg(long, global = true, default_value = "text")]
    format: output::OutputFormat,

    #[command(subcommand)]
    command: commands::Commands,
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => FrictionConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FrictionConfig::default(),
    };
    let ctx = commands::Context {
        config,
        out: OutputDir::new(&cli.output_dir),
        format: cli.format,
    };

    match &cli.command {
        commands::Commands::Analyze(args) => commands::analyze::run(args, &ctx),
        commands::Commands::Extract(args) => commands::extract::run(args, &ctx),
        commands::Commands::Run(args) => commands::run::run(args, &ctx),
    }
}
