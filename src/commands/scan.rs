//! Scan command implementation

use anyhow::Result;

use super::output;
use super::runner;
use crate::cli::ScanArgs;
use crate::config::RuleSet;
use crate::engine::Operation;
use crate::worker::WorkerController;

/// Run the scan command.
pub fn run(rule_set: RuleSet, args: ScanArgs, quiet: bool) -> Result<()> {
    let enabled = rule_set.rules.iter().filter(|r| r.enabled).count();
    tracing::info!(rules = enabled, "Scanning");

    let mut controller = WorkerController::new(rule_set);
    let report = runner::execute(&mut controller, Operation::Scan, !quiet && !args.json)?;

    output::finish(&report, args.json)
}
