//! Clean command implementation

use anyhow::Result;

use super::{apply_overrides, output, runner};
use crate::cli::CleanArgs;
use crate::config::RuleSet;
use crate::engine::Operation;
use crate::worker::WorkerController;

/// Run the clean command: scan, then apply every rule's disposition.
pub fn run(rule_set: RuleSet, args: CleanArgs, quiet: bool) -> Result<()> {
    execute(rule_set, Operation::Clean, args, quiet)
}

/// Run any operation with command-line overrides applied.
pub fn execute(
    mut rule_set: RuleSet,
    operation: Operation,
    args: CleanArgs,
    quiet: bool,
) -> Result<()> {
    apply_overrides(&mut rule_set.config, &args);

    if rule_set.config.dry_run && operation.is_mutating() && !args.json && !quiet {
        println!("[DRY RUN] Simulating {} (pass --commit to apply)", operation);
    }

    let mut controller = WorkerController::new(rule_set);
    let report = runner::execute(&mut controller, operation, !quiet && !args.json)?;

    output::finish(&report, args.json)
}
