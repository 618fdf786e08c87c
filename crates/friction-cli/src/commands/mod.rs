pub mod analyze;
pub mod extract;
pub mod run;

use clap::Subcommand;

use friction_core::storage::OutputDir;
use friction_core::FrictionConfig;

use crate::output::OutputFormat;

#[derive(Subcommand)]
pub enum Commands {
    /// Extract signals, score sessions and write the friction report
    Analyze(analyze::AnalyzeArgs),
    /// Cluster failure context from BAD sessions (requires a prior analyze)
    Extract(extract::ExtractArgs),
    /// Analyze, then extract
    Run(run::RunArgs),
}

/// Settings resolved once from the command line and shared by every command.
pub struct Context {
    pub config: FrictionConfig,
    pub out: OutputDir,
    pub format: OutputFormat,
}
