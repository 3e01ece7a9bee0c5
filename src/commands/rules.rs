//! Rule file management

use anyhow::{bail, Result};
use std::path::Path;

use crate::cli::RulesCommand;
use crate::config::{LoadedRules, RuleSet};

pub fn run(command: RulesCommand, path: &Path, loaded: LoadedRules) -> Result<()> {
    match command {
        RulesCommand::Init { force } => init(path, force),
        RulesCommand::Check => check(path, &loaded),
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Rule file {} already exists (use --force to overwrite)",
            path.display()
        );
    }
    RuleSet::with_defaults().save(path)?;
    println!("Wrote default rules to {}", path.display());
    Ok(())
}

fn check(path: &Path, loaded: &LoadedRules) -> Result<()> {
    if path.exists() {
        println!("Rule file: {}", path.display());
    } else {
        println!("Rule file: {} (not found, using defaults)", path.display());
    }

    let config = &loaded.rule_set.config;
    println!(
        "  dry_run={} quarantine={} ({}) hard_recycle_only={}",
        config.dry_run,
        config.quarantine_enabled,
        config.quarantine_root().display(),
        config.hard_recycle_only
    );

    println!("\n  {:<30} {:<11} {:>6} {}", "RULE", "ACTION", "AGE", "PATH");
    println!("  {}", "─".repeat(72));
    for rule in &loaded.rule_set.rules {
        println!(
            "  {:<30} {:<11} {:>5}d {}{}",
            rule.name,
            rule.action.to_string(),
            rule.min_age_days,
            rule.root().display(),
            if rule.enabled { "" } else { " (disabled)" }
        );
    }

    if !loaded.issues.is_empty() {
        eprintln!();
        for issue in &loaded.issues {
            eprintln!("  Invalid {}", issue);
        }
        bail!("{} rule(s) failed validation", loaded.issues.len());
    }

    println!("\nAll {} rule(s) valid.", loaded.rule_set.rules.len());
    Ok(())
}
