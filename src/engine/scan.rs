//! Rule-driven directory walker. Scanning never mutates the filesystem.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use walkdir::WalkDir;

use super::matcher::{age_days, Candidate, RuleMatcher};
use super::operation::Operation;
use super::report::{MatchResult, Report};
use crate::config::{GlobalConfig, Rule};
use crate::worker::event::ProgressEvent;
use crate::worker::state::{Flow, RunState};

/// Walks each enabled rule's root and collects matches.
#[derive(Debug, Clone, Default)]
pub struct ScanEngine {
    /// Subtree never scanned (the quarantine root)
    excluded: Option<PathBuf>,
}

impl ScanEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scanner that never descends into `path`.
    pub fn excluding(path: impl Into<PathBuf>) -> Self {
        Self {
            excluded: Some(path.into()),
        }
    }

    /// Scan every enabled rule, in declared order.
    pub fn scan(&self, rules: &[Rule], config: &GlobalConfig, run: &RunState) -> Report {
        let mut report = Report::new(Operation::Scan);
        if self.scan_into(rules, config, run, SystemTime::now(), &mut report) == Flow::Stop {
            report.cancelled = true;
        }
        report.processed = run.snapshot().processed;
        report
    }

    /// Scan into an existing report. Returns `Flow::Stop` if cancelled.
    pub(crate) fn scan_into(
        &self,
        rules: &[Rule],
        config: &GlobalConfig,
        run: &RunState,
        now: SystemTime,
        report: &mut Report,
    ) -> Flow {
        run.restart_progress(None);

        for rule in rules.iter().filter(|r| r.enabled) {
            if run.checkpoint() == Flow::Stop {
                return Flow::Stop;
            }
            report.summary_mut(&rule.name);
            if self.scan_rule(rule, config, run, now, report) == Flow::Stop {
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    fn scan_rule(
        &self,
        rule: &Rule,
        config: &GlobalConfig,
        run: &RunState,
        now: SystemTime,
        report: &mut Report,
    ) -> Flow {
        let root = rule.root();

        let matcher = match RuleMatcher::new(rule, config.follow_symlinks) {
            Ok(m) => m,
            Err(e) => {
                skip_rule(run, report, rule, format!("invalid pattern: {}", e));
                return Flow::Continue;
            }
        };

        match fs::metadata(&root) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                skip_rule(run, report, rule, format!("{} is not a directory", root.display()));
                return Flow::Continue;
            }
            Err(e) => {
                skip_rule(run, report, rule, format!("cannot access {}: {}", root.display(), e));
                return Flow::Continue;
            }
        }

        tracing::info!(rule = %rule.name, root = %root.display(), "Scanning rule");
        run.emit(ProgressEvent::RuleStarted {
            rule: rule.name.clone(),
        });

        let mut subtrees = SubtreeStats::new(config.follow_symlinks);
        let mut walker = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(config.follow_symlinks)
            .sort_by_file_name()
            .into_iter();

        loop {
            if run.checkpoint() == Flow::Stop {
                return Flow::Stop;
            }

            let entry = match walker.next() {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(err)) => {
                    tracing::debug!(rule = %rule.name, "Unreadable entry: {}", err);
                    report.summary_mut(&rule.name).scan_errors += 1;
                    continue;
                }
            };

            let path = entry.path();

            if self.is_excluded(path) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            run.item_processed(&rule.name, path);

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    tracing::debug!(path = %path.display(), "Cannot stat: {}", err);
                    report.summary_mut(&rule.name).scan_errors += 1;
                    continue;
                }
            };
            let modified = match metadata.modified() {
                Ok(t) => t,
                Err(err) => {
                    tracing::debug!(path = %path.display(), "No mtime: {}", err);
                    report.summary_mut(&rule.name).scan_errors += 1;
                    continue;
                }
            };

            let relative = match path.strip_prefix(&root) {
                Ok(r) => r,
                Err(_) => continue,
            };
            let is_symlink = entry.path_is_symlink();

            if metadata.is_dir() {
                if is_symlink && !config.follow_symlinks {
                    continue;
                }
                if !matcher.matches_path(relative) {
                    continue;
                }
                // The whole subtree goes as one unit, so its newest entry decides the age.
                let (size, newest) = match subtrees.get(path, modified, run) {
                    Some(stats) => stats,
                    None => return Flow::Stop,
                };
                if matcher.is_old_enough(newest, now) {
                    report.record_match(MatchResult {
                        rule_name: rule.name.clone(),
                        path: path.to_path_buf(),
                        relative_path: relative.to_path_buf(),
                        size_bytes: size,
                        age_days: age_days(newest, now),
                        is_dir: true,
                    });
                    walker.skip_current_dir();
                }
                continue;
            }

            let candidate = Candidate {
                relative,
                is_symlink,
                modified,
            };
            if matcher.matches(&candidate, now) {
                report.record_match(MatchResult {
                    rule_name: rule.name.clone(),
                    path: path.to_path_buf(),
                    relative_path: relative.to_path_buf(),
                    size_bytes: metadata.len(),
                    age_days: age_days(modified, now),
                    is_dir: false,
                });
            }
        }

        if let Some(summary) = report.rule(&rule.name) {
            tracing::info!(
                rule = %rule.name,
                matched = summary.matched,
                bytes = summary.matched_bytes,
                "Rule scanned"
            );
        }
        Flow::Continue
    }

    fn is_excluded(&self, path: &Path) -> bool {
        self.excluded
            .as_ref()
            .map(|ex| path.starts_with(ex))
            .unwrap_or(false)
    }
}

fn skip_rule(run: &RunState, report: &mut Report, rule: &Rule, reason: String) {
    report.warn(&rule.name, format!("rule skipped: {}", reason));
    run.emit(ProgressEvent::RuleSkipped {
        rule: rule.name.clone(),
        reason,
    });
}

/// Total file size and newest modification time per directory.
///
/// One bottom-up walk fills in every directory below the one asked for, so
/// nested directories that all match are only walked once.
struct SubtreeStats {
    follow_links: bool,
    known: HashMap<PathBuf, (u64, SystemTime)>,
}

impl SubtreeStats {
    fn new(follow_links: bool) -> Self {
        Self {
            follow_links,
            known: HashMap::new(),
        }
    }

    /// `None` if the run was cancelled mid-walk.
    fn get(
        &mut self,
        dir: &Path,
        dir_modified: SystemTime,
        run: &RunState,
    ) -> Option<(u64, SystemTime)> {
        if let Some(stats) = self.known.get(dir) {
            return Some(*stats);
        }

        // Sums of the children seen so far, keyed by parent directory
        let mut pending: HashMap<PathBuf, (u64, SystemTime)> = HashMap::new();

        for entry in WalkDir::new(dir)
            .follow_links(self.follow_links)
            .contents_first(true)
        {
            if run.checkpoint() == Flow::Stop {
                return None;
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(_) => continue,
            };
            let meta = match entry.metadata() {
                Ok(meta) => meta,
                Err(_) => continue,
            };
            let own = meta.modified().unwrap_or(UNIX_EPOCH);

            let stats = if meta.is_dir() {
                let (size, newest) = pending.remove(entry.path()).unwrap_or((0, own));
                let stats = (size, newest.max(own));
                self.known.insert(entry.path().to_path_buf(), stats);
                stats
            } else if meta.is_file() {
                (meta.len(), own)
            } else {
                (0, own)
            };

            if entry.depth() > 0 {
                if let Some(parent) = entry.path().parent() {
                    let slot = pending
                        .entry(parent.to_path_buf())
                        .or_insert((0, UNIX_EPOCH));
                    slot.0 += stats.0;
                    slot.1 = slot.1.max(stats.1);
                }
            }
        }

        Some(self.known.get(dir).copied().unwrap_or((0, dir_modified)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    const DAY: u64 = 24 * 60 * 60;

    fn write_aged(path: &Path, content: &str, days: u64) {
        fs::write(path, content).unwrap();
        set_age(path, days);
    }

    fn set_age(path: &Path, days: u64) {
        let when = SystemTime::now() - Duration::from_secs(days * DAY + 60);
        File::options()
            .write(!path.is_dir())
            .read(path.is_dir())
            .open(path)
            .unwrap()
            .set_modified(when)
            .unwrap();
    }

    fn relative_matches(report: &Report) -> Vec<String> {
        report
            .matches
            .iter()
            .map(|m| m.relative_path.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_age_filter_excludes_new_files() {
        let tmp = TempDir::new().unwrap();
        write_aged(&tmp.path().join("old.log"), "old", 3);
        write_aged(&tmp.path().join("new.log"), "new", 0);

        let rules = vec![Rule::new("tmp", tmp.path()).with_min_age_days(1)];
        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        assert_eq!(relative_matches(&report), vec!["old.log"]);
        assert_eq!(report.matches[0].age_days, 3);
        assert_eq!(report.matches[0].size_bytes, 3);
    }

    #[test]
    fn test_lexical_depth_first_order() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("b/inner")).unwrap();
        fs::create_dir_all(root.join("a")).unwrap();
        fs::write(root.join("c.tmp"), "").unwrap();
        fs::write(root.join("b/inner/z.tmp"), "").unwrap();
        fs::write(root.join("b/a.tmp"), "").unwrap();
        fs::write(root.join("a/m.tmp"), "").unwrap();

        let rules = vec![Rule::new("r", root).with_patterns(["**/*.tmp"])];
        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        assert_eq!(
            relative_matches(&report),
            vec!["a/m.tmp", "b/a.tmp", "b/inner/z.tmp", "c.tmp"]
        );
    }

    #[test]
    fn test_missing_root_is_a_warning() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("x.log"), "").unwrap();
        let rules = vec![
            Rule::new("ghost", tmp.path().join("does-not-exist")),
            Rule::new("real", tmp.path()),
        ];

        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].rule, "ghost");
        assert_eq!(report.rule("real").unwrap().matched, 1);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_disabled_rules_are_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("x.log"), "").unwrap();
        let rules = vec![Rule::new("off", tmp.path()).with_enabled(false)];

        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        assert!(report.matches.is_empty());
        assert!(report.rule("off").is_none());
    }

    #[test]
    fn test_matched_directory_is_one_unit() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        fs::create_dir(&cache).unwrap();
        write_aged(&cache.join("a.bin"), "aaaa", 5);
        write_aged(&cache.join("b.bin"), "bb", 5);
        set_age(&cache, 5);

        let rules = vec![Rule::new("r", tmp.path()).with_min_age_days(2)];
        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        assert_eq!(relative_matches(&report), vec!["cache"]);
        assert!(report.matches[0].is_dir);
        assert_eq!(report.matches[0].size_bytes, 6);
    }

    #[test]
    fn test_directory_with_recent_content_is_descended() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        fs::create_dir(&cache).unwrap();
        write_aged(&cache.join("old.bin"), "x", 5);
        write_aged(&cache.join("new.bin"), "x", 0);
        set_age(&cache, 5);

        let rules = vec![Rule::new("r", tmp.path())
            .with_patterns(["*", "**/*"])
            .with_min_age_days(2)];
        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        assert_eq!(relative_matches(&report), vec!["cache/old.bin"]);
    }

    #[test]
    fn test_symlinks_skipped_by_default() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("precious.txt"), "keep").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("link")).unwrap();

        let rules = vec![Rule::new("r", tmp.path()).with_patterns(["**/*"])];
        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        assert!(report.matches.is_empty());
    }

    #[test]
    fn test_excluded_subtree_is_not_scanned() {
        let tmp = TempDir::new().unwrap();
        let quarantine = tmp.path().join("quarantine");
        fs::create_dir_all(quarantine.join("r")).unwrap();
        fs::write(quarantine.join("r/held.log"), "").unwrap();
        fs::write(tmp.path().join("loose.log"), "").unwrap();

        let rules = vec![Rule::new("r", tmp.path()).with_patterns(["**/*.log"])];
        let report = ScanEngine::excluding(&quarantine).scan(
            &rules,
            &GlobalConfig::default(),
            &RunState::new(),
        );

        assert_eq!(relative_matches(&report), vec!["loose.log"]);
    }

    #[test]
    fn test_scan_is_side_effect_free() {
        let tmp = TempDir::new().unwrap();
        write_aged(&tmp.path().join("a.log"), "a", 9);
        let rules = vec![Rule::new("r", tmp.path())];
        let config = GlobalConfig {
            dry_run: false,
            ..Default::default()
        };

        let report = ScanEngine::new().scan(&rules, &config, &RunState::new());

        assert_eq!(report.matches.len(), 1);
        assert!(tmp.path().join("a.log").exists());
    }

    #[test]
    fn test_scan_reports_processed_entries() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("a.log"), "").unwrap();
        fs::write(tmp.path().join("b.txt"), "").unwrap();
        fs::write(tmp.path().join("sub/c.log"), "").unwrap();

        let rules = vec![Rule::new("r", tmp.path()).with_patterns(["**/*.log"])];
        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        assert_eq!(report.matches.len(), 2);
        assert_eq!(report.processed, 4);
        assert!(!report.cancelled);
    }

    #[test]
    fn test_cancelled_scan_keeps_processed_count() {
        let tmp = TempDir::new().unwrap();
        for i in 0..200 {
            fs::write(tmp.path().join(format!("{:03}.log", i)), "").unwrap();
        }
        let rules = vec![Rule::new("r", tmp.path())];
        let run = RunState::new();
        let events = run.subscribe();
        run.begin(Operation::Scan).unwrap();

        let report = thread::scope(|s| {
            let scan = s.spawn(|| ScanEngine::new().scan(&rules, &GlobalConfig::default(), &run));
            loop {
                let event = events.recv_timeout(Duration::from_secs(10)).unwrap();
                if matches!(event, ProgressEvent::ItemProcessed { .. }) {
                    break;
                }
            }
            run.cancel();
            scan.join().unwrap()
        });

        assert!(report.processed >= 1);
        assert!(report.processed <= 200);
        assert_eq!(report.processed, run.snapshot().processed);
    }

    #[test]
    fn test_cancel_before_scan_stops_immediately() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.log"), "").unwrap();
        let run = RunState::new();
        run.begin(Operation::Scan).unwrap();
        run.cancel();

        let report = ScanEngine::new().scan(
            &[Rule::new("r", tmp.path())],
            &GlobalConfig::default(),
            &run,
        );

        assert!(report.cancelled);
        assert_eq!(report.processed, 0);
        assert!(report.matches.is_empty());
    }

    #[test]
    fn test_follow_symlinks_traverses_linked_directory() {
        let tmp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::create_dir(outside.path().join("deep")).unwrap();
        fs::write(outside.path().join("deep/inner.log"), "12345").unwrap();
        std::os::unix::fs::symlink(outside.path(), tmp.path().join("linked")).unwrap();

        let rules = vec![Rule::new("r", tmp.path()).with_patterns(["**/*.log"])];
        let config = GlobalConfig {
            follow_symlinks: true,
            ..Default::default()
        };
        let report = ScanEngine::new().scan(&rules, &config, &RunState::new());

        assert_eq!(relative_matches(&report), vec!["linked/deep/inner.log"]);
        assert_eq!(report.matches[0].size_bytes, 5);
    }

    #[test]
    fn test_nested_matching_directories_share_stats() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        write_aged(&root.join("a/b/c/old.bin"), "xyz", 5);
        write_aged(&root.join("a/b/old.bin"), "xy", 5);
        write_aged(&root.join("a/new.bin"), "x", 0);
        set_age(&root.join("a/b/c"), 5);
        set_age(&root.join("a/b"), 5);
        set_age(&root.join("a"), 5);

        let rules = vec![Rule::new("r", root)
            .with_patterns(["*", "**/*"])
            .with_min_age_days(2)];
        let report = ScanEngine::new().scan(&rules, &GlobalConfig::default(), &RunState::new());

        // `a` holds a new file, so the scan descends and takes `a/b` whole
        assert_eq!(relative_matches(&report), vec!["a/b"]);
        assert!(report.matches[0].is_dir);
        assert_eq!(report.matches[0].size_bytes, 5);
    }
}
