//! Terminal and JSON rendering of reports.

use anyhow::Result;
use humansize::{format_size, BINARY};

use crate::engine::{AppliedAction, Report};

/// Exit status used when a run was cancelled by the user.
pub const EXIT_CANCELLED: i32 = 130;

/// Print `report` and exit with [`EXIT_CANCELLED`] if the run was cancelled.
pub fn finish(report: &Report, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else if report.operation.is_mutating() {
        print_clean(report);
    } else {
        print_scan(report);
    }

    if report.cancelled {
        eprintln!("Cancelled after {} item(s).", report.processed);
        std::process::exit(EXIT_CANCELLED);
    }
    Ok(())
}

fn print_scan(report: &Report) {
    println!("\n  {:<40} {:>10} {:>12}", "RULE", "MATCHES", "SIZE");
    println!("  {}", "─".repeat(64));
    for summary in &report.rules {
        println!(
            "  {:<40} {:>10} {:>12}",
            truncate(&summary.rule, 40),
            summary.matched,
            format_size(summary.matched_bytes, BINARY),
        );
    }
    print_warnings(report);

    println!(
        "\nTotal: {} in {} match{}",
        format_size(report.total_matched_bytes(), BINARY),
        report.total_matched(),
        if report.total_matched() == 1 { "" } else { "es" }
    );
}

fn print_clean(report: &Report) {
    let dry_run = report.dry_run;
    if dry_run {
        println!("\n[DRY RUN] Nothing was changed.");
    }

    println!(
        "\n  {:<40} {:>8} {:>12} {:>8} {:>8}",
        "RULE", "DONE", "SIZE", "SKIPPED", "EMPTY"
    );
    println!("  {}", "─".repeat(80));
    for summary in &report.rules {
        let (count, bytes) = if dry_run {
            (summary.simulated, summary.simulated_bytes)
        } else {
            (summary.disposed, summary.disposed_bytes)
        };
        println!(
            "  {:<40} {:>8} {:>12} {:>8} {:>8}",
            truncate(&summary.rule, 40),
            count,
            format_size(bytes, BINARY),
            summary.skipped_cap + summary.skipped_error,
            summary.empty_dirs_removed,
        );
    }

    for outcome in &report.outcomes {
        if outcome.applied_action == AppliedAction::SkippedError {
            eprintln!(
                "  Error: {}: {}",
                outcome.matched.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        } else if let Some(note) = &outcome.note {
            println!("  Note: {}: {}", outcome.matched.path.display(), note);
        }
    }
    if report.outcomes_dropped > 0 {
        println!("  ({} more outcome(s) not listed)", report.outcomes_dropped);
    }

    for external in &report.external {
        if external.success {
            println!("  Ran '{}'", external.command);
        } else {
            eprintln!(
                "  '{}' failed: {}",
                external.command,
                external.detail.as_deref().unwrap_or("unknown error")
            );
        }
    }
    print_warnings(report);

    println!("\nResults:");
    if dry_run {
        println!(
            "  Would free: {} in {} item(s)",
            format_size(report.total_simulated_bytes(), BINARY),
            report.total_simulated()
        );
    } else {
        println!(
            "  Freed:   {} in {} item(s)",
            format_size(report.total_disposed_bytes(), BINARY),
            report.total_disposed()
        );
    }
    if report.total_skipped() > 0 {
        println!("  Skipped: {} item(s)", report.total_skipped());
    }
}

fn print_warnings(report: &Report) {
    for warning in &report.warnings {
        eprintln!("  Warning: {}: {}", warning.rule, warning.message);
    }
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let tail: String = s
            .chars()
            .rev()
            .take(width - 3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("...{}", tail)
    }
}
