use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use crate::engine::Operation;

/// Reclaim - A rule-driven filesystem reclamation engine
#[derive(Parser, Debug)]
#[command(name = "reclaim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the rule file (JSON, or TOML by extension)
    #[arg(short, long, global = true, value_name = "PATH", env = "RECLAIM_RULES")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report what the rules match, without touching anything
    Scan(ScanArgs),

    /// Scan, then quarantine, recycle or delete every match
    Clean(CleanArgs),

    /// Purge the pip download cache
    PurgePip(CleanArgs),

    /// Purge the npm cache
    PurgeNpm(CleanArgs),

    /// Run an operation by name (for schedulers)
    Run(RunArgs),

    /// Create or validate the rule file
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

#[derive(Args, Debug, Default)]
pub struct ScanArgs {
    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Overrides applied on top of the rule file's global config.
#[derive(Args, Debug, Default, Clone)]
pub struct CleanArgs {
    /// Simulate only, whatever the rule file says
    #[arg(short = 'n', long, conflicts_with = "commit")]
    pub dry_run: bool,

    /// Really mutate the filesystem, whatever the rule file says
    #[arg(long)]
    pub commit: bool,

    /// Send everything to the trash instead of quarantine or delete
    #[arg(long)]
    pub recycle_only: bool,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// One of: scan, clean, purge_pip, purge_npm
    #[arg(value_name = "OPERATION")]
    pub operation: Operation,

    #[command(flatten)]
    pub overrides: CleanArgs,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// Write the built-in default rules to the rule file
    Init {
        /// Overwrite an existing rule file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the rule file and list its rules
    Check,
}
