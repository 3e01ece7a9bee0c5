//! Package cache purge commands

use anyhow::Result;

use crate::cli::CleanArgs;
use crate::config::RuleSet;
use crate::engine::PackageCache;

/// Purge one package manager's cache with the rule file's global settings.
pub fn run(rule_set: RuleSet, cache: PackageCache, args: CleanArgs, quiet: bool) -> Result<()> {
    let dirs = cache.default_dirs();
    if dirs.is_empty() {
        tracing::warn!("No {} directory known for this user", cache.label());
    }
    super::clean::execute(rule_set, cache.operation(), args, quiet)
}
