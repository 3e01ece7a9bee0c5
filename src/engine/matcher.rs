//! Path/pattern/age predicates for a single rule.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use std::time::SystemTime;

use crate::config::Rule;

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Compile shell-style globs where `*` and `?` stop at separators and `**`
/// spans them.
pub fn compile_patterns(patterns: &[String]) -> Result<GlobSet, globset::Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern).literal_separator(true).build()?;
        builder.add(glob);
    }
    builder.build()
}

/// Whole days elapsed between `modified` and `now`. Future timestamps count as 0.
pub fn age_days(modified: SystemTime, now: SystemTime) -> u64 {
    now.duration_since(modified)
        .map(|d| d.as_secs() / SECS_PER_DAY)
        .unwrap_or(0)
}

/// A filesystem entry as seen by the matcher.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Path relative to the rule root
    pub relative: &'a Path,
    pub is_symlink: bool,
    /// Modification time used for the age filter
    pub modified: SystemTime,
}

/// Compiled form of a rule's matching constraints.
#[derive(Debug, Clone)]
pub struct RuleMatcher {
    globs: GlobSet,
    min_age_days: u64,
    follow_symlinks: bool,
}

impl RuleMatcher {
    pub fn new(rule: &Rule, follow_symlinks: bool) -> Result<Self, globset::Error> {
        Ok(Self {
            globs: compile_patterns(&rule.patterns)?,
            min_age_days: rule.min_age_days,
            follow_symlinks,
        })
    }

    /// True if the relative path matches at least one pattern.
    pub fn matches_path(&self, relative: &Path) -> bool {
        self.globs.is_match(relative)
    }

    pub fn is_old_enough(&self, modified: SystemTime, now: SystemTime) -> bool {
        age_days(modified, now) >= self.min_age_days
    }

    /// Full predicate: symlink policy, pattern, then age.
    pub fn matches(&self, entry: &Candidate<'_>, now: SystemTime) -> bool {
        if entry.is_symlink && !self.follow_symlinks {
            return false;
        }
        self.matches_path(entry.relative) && self.is_old_enough(entry.modified, now)
    }
}
