//! CLI command handlers.

pub mod clean;
mod output;
pub mod purge;
pub mod rules;
mod runner;
pub mod scan;

use crate::cli::CleanArgs;
use crate::config::GlobalConfig;

/// Apply command-line overrides to the loaded global config.
pub fn apply_overrides(config: &mut GlobalConfig, args: &CleanArgs) {
    if args.dry_run {
        config.dry_run = true;
    }
    if args.commit {
        config.dry_run = false;
    }
    if args.recycle_only {
        config.hard_recycle_only = true;
    }
}
