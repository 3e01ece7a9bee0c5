//! Executor that applies a disposition to one matched entry.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

use super::report::{AppliedAction, MatchResult, Outcome};
use super::trash::{Trash, TrashError};
use crate::config::{Action, GlobalConfig, Rule};

/// Disposition counters for one run. Only the single active worker mutates them.
#[derive(Debug, Default, Clone)]
pub struct DispositionCounters {
    per_rule: HashMap<String, usize>,
    total: usize,
    observed: usize,
}

impl DispositionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispositions (real or simulated) counted for `rule`.
    pub fn disposed_for(&self, rule: &str) -> usize {
        self.per_rule.get(rule).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Every match handed to the executor, including skipped ones.
    pub fn observed(&self) -> usize {
        self.observed
    }

    fn has_capacity(&self, rule: &str, config: &GlobalConfig) -> bool {
        self.disposed_for(rule) < config.max_delete_per_rule && self.total < config.max_total_delete
    }

    fn record(&mut self, rule: &str) {
        *self.per_rule.entry(rule.to_string()).or_insert(0) += 1;
        self.total += 1;
    }
}

/// Applies quarantine, recycle or delete to matched entries.
#[derive(Clone)]
pub struct ActionExecutor {
    trash: Arc<dyn Trash>,
    quarantine_root: PathBuf,
}

impl ActionExecutor {
    pub fn new(trash: Arc<dyn Trash>, quarantine_root: impl Into<PathBuf>) -> Self {
        Self {
            trash,
            quarantine_root: quarantine_root.into(),
        }
    }

    pub fn quarantine_root(&self) -> &Path {
        &self.quarantine_root
    }

    /// The disposition that applies to `rule` under `config`.
    pub fn resolve_action(rule: &Rule, config: &GlobalConfig) -> Action {
        if config.hard_recycle_only {
            Action::Recycle
        } else {
            rule.action
        }
    }

    /// Apply the resolved disposition to one match.
    ///
    /// Refusals (quarantine disabled) come first, then the caps, then dry-run
    /// simulation, so a dry run reports what a real run would do. Failures
    /// never propagate: they become `SkippedError` outcomes.
    pub fn apply(
        &self,
        matched: &MatchResult,
        rule: &Rule,
        config: &GlobalConfig,
        counters: &mut DispositionCounters,
    ) -> Outcome {
        counters.observed += 1;
        let action = Self::resolve_action(rule, config);

        if action == Action::Quarantine && !config.quarantine_enabled {
            return Outcome::new(matched.clone(), AppliedAction::SkippedError, action)
                .with_error("quarantine is disabled");
        }

        if !counters.has_capacity(&rule.name, config) {
            tracing::debug!(path = %matched.path.display(), rule = %rule.name, "Cap reached");
            return Outcome::new(matched.clone(), AppliedAction::SkippedCap, action);
        }

        if config.dry_run {
            counters.record(&rule.name);
            return Outcome::new(matched.clone(), AppliedAction::SimulatedDryRun, action);
        }

        let outcome = match action {
            Action::Quarantine => self.quarantine(matched, rule, action),
            Action::Recycle => self.recycle(matched, rule, config),
            Action::Delete => self.delete(matched),
        };

        if outcome.applied_action.is_disposal() {
            counters.record(&rule.name);
            tracing::debug!(
                path = %matched.path.display(),
                action = ?outcome.applied_action,
                "Disposed"
            );
        } else if let Some(ref err) = outcome.error {
            tracing::warn!("Failed: {} -> {}", matched.path.display(), err);
        }

        outcome
    }

    /// Deterministic quarantine location before collision handling.
    pub fn quarantine_destination(&self, rule_name: &str, relative: &Path) -> PathBuf {
        self.quarantine_root
            .join(sanitize_component(rule_name))
            .join(relative)
    }

    fn quarantine(&self, matched: &MatchResult, rule: &Rule, resolved: Action) -> Outcome {
        let relative = if matched.relative_path.as_os_str().is_empty() {
            PathBuf::from(matched.path.file_name().unwrap_or_default())
        } else {
            matched.relative_path.clone()
        };
        let dest = unique_destination(&self.quarantine_destination(&rule.name, &relative));

        let result = dest
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| move_entry(&matched.path, &dest));

        match result {
            Ok(()) => Outcome::new(matched.clone(), AppliedAction::Quarantined, resolved)
                .with_destination(dest),
            Err(e) => Outcome::new(matched.clone(), AppliedAction::SkippedError, resolved)
                .with_error(e.to_string()),
        }
    }

    fn recycle(&self, matched: &MatchResult, rule: &Rule, config: &GlobalConfig) -> Outcome {
        match self.trash.send_to_trash(&matched.path) {
            Ok(()) => Outcome::new(matched.clone(), AppliedAction::Recycled, Action::Recycle),
            Err(TrashError::Unavailable(reason)) => {
                if !config.quarantine_enabled {
                    return Outcome::new(
                        matched.clone(),
                        AppliedAction::SkippedError,
                        Action::Recycle,
                    )
                    .with_error(format!("{}; quarantine is disabled", reason));
                }
                tracing::info!(
                    trash = self.trash.name(),
                    "Trash unavailable ({}), quarantining {}",
                    reason,
                    matched.path.display()
                );
                self.quarantine(matched, rule, Action::Recycle)
                    .with_note(format!("trash unavailable ({}); quarantined instead", reason))
            }
            Err(e @ TrashError::Failed { .. }) => {
                Outcome::new(matched.clone(), AppliedAction::SkippedError, Action::Recycle)
                    .with_error(e.to_string())
            }
        }
    }

    fn delete(&self, matched: &MatchResult) -> Outcome {
        match remove_entry(&matched.path) {
            Ok(()) => Outcome::new(matched.clone(), AppliedAction::Deleted, Action::Delete),
            Err(e) => Outcome::new(matched.clone(), AppliedAction::SkippedError, Action::Delete)
                .with_error(e.to_string()),
        }
    }
}

/// True if `err` is the "cross-device link" error from `rename`.
pub(crate) fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(nix::errno::Errno::EXDEV as i32)
}

fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}

/// First of `dest`, `dest.1`, `dest.2`, ... that does not exist yet.
fn unique_destination(dest: &Path) -> PathBuf {
    if fs::symlink_metadata(dest).is_err() {
        return dest.to_path_buf();
    }
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut n = 1u32;
    loop {
        let candidate = dest.with_file_name(format!("{}.{}", name, n));
        if fs::symlink_metadata(&candidate).is_err() {
            return candidate;
        }
        n += 1;
    }
}

/// Move `src` to `dest`, copying then removing when they are on different
/// filesystems.
fn move_entry(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => {
            if let Err(copy_err) = copy_recursively(src, dest) {
                let _ = remove_entry(dest);
                return Err(copy_err);
            }
            remove_entry(src)
        }
        Err(e) => Err(e),
    }
}

fn copy_recursively(src: &Path, dest: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if !meta.is_dir() {
        return copy_one(src, dest, &meta);
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let target = dest.join(relative);
        let meta = entry.path().symlink_metadata()?;
        if meta.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            copy_one(entry.path(), &target, &meta)?;
        }
    }
    Ok(())
}

fn copy_one(src: &Path, dest: &Path, meta: &fs::Metadata) -> io::Result<()> {
    if meta.file_type().is_symlink() {
        std::os::unix::fs::symlink(fs::read_link(src)?, dest)
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}

/// Permanently remove a file, symlink or directory tree.
fn remove_entry(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        if !meta.file_type().is_symlink() {
            let mut perms = meta.permissions();
            if perms.mode() & 0o200 == 0 {
                perms.set_mode(perms.mode() | 0o200);
                let _ = fs::set_permissions(path, perms);
            }
        }
        fs::remove_file(path)
    }
}
