//! Match results, per-item outcomes and the aggregated run report.

use serde::Serialize;
use std::path::PathBuf;

use super::operation::Operation;
use crate::config::Action;

/// An entry that passed every predicate of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub rule_name: String,
    /// Absolute path of the entry
    pub path: PathBuf,
    /// Path relative to the rule root
    pub relative_path: PathBuf,
    /// Apparent size; recursive for directories
    pub size_bytes: u64,
    pub age_days: u64,
    pub is_dir: bool,
}

/// What actually happened to a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppliedAction {
    Quarantined,
    Recycled,
    Deleted,
    SkippedCap,
    SkippedError,
    SimulatedDryRun,
}

impl AppliedAction {
    /// True for actions that removed the entry from its original location.
    pub fn is_disposal(&self) -> bool {
        matches!(
            self,
            AppliedAction::Quarantined | AppliedAction::Recycled | AppliedAction::Deleted
        )
    }
}

/// Result of applying a disposition to one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    #[serde(rename = "match")]
    pub matched: MatchResult,
    pub applied_action: AppliedAction,
    /// The disposition that was resolved for this match
    pub resolved_action: Action,
    /// Quarantine destination, when moved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when a fallback policy changed the disposition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl Outcome {
    pub fn new(matched: MatchResult, applied_action: AppliedAction, resolved_action: Action) -> Self {
        Self {
            matched,
            applied_action,
            resolved_action,
            destination: None,
            error: None,
            note: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_destination(mut self, destination: PathBuf) -> Self {
        self.destination = Some(destination);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Aggregated counts for one rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RuleSummary {
    pub rule: String,
    pub matched: usize,
    pub matched_bytes: u64,
    pub disposed: usize,
    pub disposed_bytes: u64,
    pub simulated: usize,
    pub simulated_bytes: u64,
    pub skipped_cap: usize,
    pub skipped_error: usize,
    pub empty_dirs_removed: usize,
    /// Entries that could not be read while walking
    pub scan_errors: usize,
}

/// A rule-level problem that did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleWarning {
    pub rule: String,
    pub message: String,
}

/// Result of a best-effort external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalCommand {
    pub command: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Everything a scan or clean produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub operation: Operation,
    /// Per-rule summaries in declared rule order
    pub rules: Vec<RuleSummary>,
    pub matches: Vec<MatchResult>,
    /// Ordered outcomes, bounded by `max_report_outcomes`
    pub outcomes: Vec<Outcome>,
    /// Outcomes left out of `outcomes` because of the bound
    pub outcomes_dropped: usize,
    pub warnings: Vec<RuleWarning>,
    pub external: Vec<ExternalCommand>,
    /// Items processed before the run ended
    pub processed: usize,
    pub cancelled: bool,
    /// Actions were simulated only
    pub dry_run: bool,
}

impl Report {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            rules: Vec::new(),
            matches: Vec::new(),
            outcomes: Vec::new(),
            outcomes_dropped: 0,
            warnings: Vec::new(),
            external: Vec::new(),
            processed: 0,
            cancelled: false,
            dry_run: false,
        }
    }

    /// Summary for `rule`, created on first use.
    pub fn summary_mut(&mut self, rule: &str) -> &mut RuleSummary {
        let idx = match self.rules.iter().position(|s| s.rule == rule) {
            Some(idx) => idx,
            None => {
                self.rules.push(RuleSummary {
                    rule: rule.to_string(),
                    ..Default::default()
                });
                self.rules.len() - 1
            }
        };
        &mut self.rules[idx]
    }

    pub fn rule(&self, rule: &str) -> Option<&RuleSummary> {
        self.rules.iter().find(|s| s.rule == rule)
    }

    pub fn record_match(&mut self, matched: MatchResult) {
        let summary = self.summary_mut(&matched.rule_name);
        summary.matched += 1;
        summary.matched_bytes += matched.size_bytes;
        self.matches.push(matched);
    }

    pub fn record_outcome(&mut self, outcome: Outcome, limit: usize) {
        let bytes = outcome.matched.size_bytes;
        let summary = self.summary_mut(&outcome.matched.rule_name);
        match outcome.applied_action {
            AppliedAction::Quarantined | AppliedAction::Recycled | AppliedAction::Deleted => {
                summary.disposed += 1;
                summary.disposed_bytes += bytes;
            }
            AppliedAction::SimulatedDryRun => {
                summary.simulated += 1;
                summary.simulated_bytes += bytes;
            }
            AppliedAction::SkippedCap => summary.skipped_cap += 1,
            AppliedAction::SkippedError => summary.skipped_error += 1,
        }

        if self.outcomes.len() < limit {
            self.outcomes.push(outcome);
        } else {
            self.outcomes_dropped += 1;
        }
    }

    pub fn warn(&mut self, rule: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(rule, "{}", message);
        self.warnings.push(RuleWarning {
            rule: rule.to_string(),
            message,
        });
    }

    pub fn total_matched(&self) -> usize {
        self.rules.iter().map(|s| s.matched).sum()
    }

    pub fn total_matched_bytes(&self) -> u64 {
        self.rules.iter().map(|s| s.matched_bytes).sum()
    }

    pub fn total_disposed(&self) -> usize {
        self.rules.iter().map(|s| s.disposed).sum()
    }

    pub fn total_disposed_bytes(&self) -> u64 {
        self.rules.iter().map(|s| s.disposed_bytes).sum()
    }

    pub fn total_simulated(&self) -> usize {
        self.rules.iter().map(|s| s.simulated).sum()
    }

    pub fn total_simulated_bytes(&self) -> u64 {
        self.rules.iter().map(|s| s.simulated_bytes).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.rules
            .iter()
            .map(|s| s.skipped_cap + s.skipped_error)
            .sum()
    }
}
