//! Clean pipeline: scan (unless a scan report is supplied), dispose of every
//! match, then prune empty directories under each rule root.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

use super::executor::{ActionExecutor, DispositionCounters};
use super::operation::Operation;
use super::purge::{CommandRunner, PackageCache};
use super::report::{ExternalCommand, MatchResult, Report};
use super::scan::ScanEngine;
use crate::config::{GlobalConfig, Rule};
use crate::worker::state::{Flow, RunState};

/// Applies rule dispositions to scan results.
#[derive(Clone)]
pub struct CleanEngine {
    executor: ActionExecutor,
    scanner: ScanEngine,
}

impl CleanEngine {
    /// The scanner never descends into the executor's quarantine root.
    pub fn new(executor: ActionExecutor) -> Self {
        let scanner = ScanEngine::excluding(executor.quarantine_root());
        Self { executor, scanner }
    }

    pub fn scanner(&self) -> &ScanEngine {
        &self.scanner
    }

    pub fn executor(&self) -> &ActionExecutor {
        &self.executor
    }

    /// Clean the matches of `prior`, or scan first when there is none.
    pub fn clean(
        &self,
        prior: Option<Report>,
        rules: &[Rule],
        config: &GlobalConfig,
        run: &RunState,
    ) -> Report {
        self.clean_as(Operation::Clean, prior, rules, config, run)
    }

    pub(crate) fn clean_as(
        &self,
        operation: Operation,
        prior: Option<Report>,
        rules: &[Rule],
        config: &GlobalConfig,
        run: &RunState,
    ) -> Report {
        let mut report = Report::new(operation);
        report.dry_run = config.dry_run;

        match prior {
            Some(scan) => {
                report.rules = scan.rules;
                report.matches = scan.matches;
                report.warnings = scan.warnings;
            }
            None => {
                let flow = self
                    .scanner
                    .scan_into(rules, config, run, SystemTime::now(), &mut report);
                if flow == Flow::Stop {
                    report.processed = run.snapshot().processed;
                    report.cancelled = true;
                    return report;
                }
            }
        }

        let matches = report.matches.clone();
        run.restart_progress(Some(matches.len()));
        tracing::info!(
            %operation,
            matches = matches.len(),
            dry_run = config.dry_run,
            "Applying actions"
        );

        let mut counters = DispositionCounters::new();
        let mut orphaned = HashSet::new();

        for matched in &matches {
            if run.checkpoint() == Flow::Stop {
                report.cancelled = true;
                break;
            }

            match active_rule(rules, matched) {
                Some(rule) => {
                    let outcome = self.executor.apply(matched, rule, config, &mut counters);
                    report.record_outcome(outcome, config.max_report_outcomes);
                }
                None => {
                    if orphaned.insert(matched.rule_name.clone()) {
                        report.warn(
                            &matched.rule_name,
                            "rule is no longer configured or enabled; its matches were left alone",
                        );
                    }
                }
            }
            run.item_processed(&matched.rule_name, &matched.path);
        }

        if !report.cancelled && !config.dry_run {
            for rule in rules.iter().filter(|r| r.enabled && r.remove_empty_dirs) {
                let quarantine = self.executor.quarantine_root();
                let (removed, flow) = remove_empty_dirs(&rule.root(), quarantine, run);
                if removed > 0 {
                    tracing::info!(rule = %rule.name, removed, "Removed empty directories");
                    report.summary_mut(&rule.name).empty_dirs_removed += removed;
                }
                if flow == Flow::Stop {
                    report.cancelled = true;
                    break;
                }
            }
        }

        report.processed = run.snapshot().processed;
        tracing::info!(
            %operation,
            disposed = report.total_disposed(),
            simulated = report.total_simulated(),
            skipped = report.total_skipped(),
            cancelled = report.cancelled,
            "Actions applied"
        );
        report
    }

    /// Purge a package-manager cache: the native command first (skipped in dry
    /// run), then a delete pass over `dirs`.
    pub fn purge(
        &self,
        cache: PackageCache,
        dirs: &[PathBuf],
        runner: &dyn CommandRunner,
        config: &GlobalConfig,
        run: &RunState,
    ) -> Report {
        let existing: Vec<PathBuf> = dirs
            .iter()
            .filter(|d| {
                let present = d.is_dir();
                if !present {
                    tracing::debug!(dir = %d.display(), "Cache directory not present");
                }
                present
            })
            .cloned()
            .collect();

        let (program, args) = cache.command();
        let command = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");

        let external = if config.dry_run {
            tracing::info!("Dry run: not running '{}'", command);
            None
        } else if run.checkpoint() == Flow::Stop {
            None
        } else {
            let result = runner.run(program, args);
            if let Err(ref e) = result {
                tracing::warn!("'{}' failed: {}", command, e);
            }
            Some(ExternalCommand {
                command,
                success: result.is_ok(),
                detail: result.err(),
            })
        };

        let rules = cache.rules_for(&existing);
        let mut report = self.clean_as(cache.operation(), None, &rules, config, run);
        report.external.extend(external);
        report
    }
}

fn active_rule<'a>(rules: &'a [Rule], matched: &MatchResult) -> Option<&'a Rule> {
    rules
        .iter()
        .find(|r| r.enabled && r.name == matched.rule_name)
}

/// Remove every empty directory under `root`, children before parents, so a
/// directory holding only empty directories goes too. `root` itself and
/// anything under `excluded` are kept; symlinks are never followed.
fn remove_empty_dirs(root: &Path, excluded: &Path, run: &RunState) -> (usize, Flow) {
    let mut removed = 0;

    for entry in WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
    {
        if run.checkpoint() == Flow::Stop {
            return (removed, Flow::Stop);
        }
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::trace!("Skipping during empty-dir pass: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_dir() || entry.path().starts_with(excluded) {
            continue;
        }

        // remove_dir only succeeds on an empty directory
        match fs::remove_dir(entry.path()) {
            Ok(()) => {
                tracing::debug!(dir = %entry.path().display(), "Removed empty directory");
                removed += 1;
            }
            Err(e) => tracing::trace!(dir = %entry.path().display(), "Kept directory: {}", e),
        }
    }
    (removed, Flow::Continue)
}
