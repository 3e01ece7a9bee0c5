//! Runs one operation at a time on a background thread.

use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::event::ProgressEvent;
use super::state::{Phase, RunSnapshot, RunState};
use crate::config::RuleSet;
use crate::engine::{
    ActionExecutor, CleanEngine, CommandRunner, FreedesktopTrash, Operation, PackageCache,
    Report, SystemCommandRunner, Trash,
};
use crate::error::{ReclaimError, Result};

/// Owns the run state and the worker thread.
///
/// Only one operation may be active; `start` while another is in flight
/// fails with [`ReclaimError::AlreadyRunning`] without touching any state.
pub struct WorkerController {
    state: Arc<RunState>,
    rule_set: RuleSet,
    trash: Arc<dyn Trash>,
    runner: Arc<dyn CommandRunner>,
    /// Most recent complete scan, consumed by the next clean
    last_scan: Arc<Mutex<Option<Report>>>,
    handle: Option<JoinHandle<Report>>,
}

impl WorkerController {
    pub fn new(rule_set: RuleSet) -> Self {
        Self {
            state: Arc::new(RunState::new()),
            rule_set,
            trash: Arc::new(FreedesktopTrash::new()),
            runner: Arc::new(SystemCommandRunner),
            last_scan: Arc::new(Mutex::new(None)),
            handle: None,
        }
    }

    pub fn with_trash(mut self, trash: Arc<dyn Trash>) -> Self {
        self.trash = trash;
        self
    }

    pub fn with_command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Receive progress events for every subsequent run.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        self.state.subscribe()
    }

    pub fn rule_set(&self) -> &RuleSet {
        &self.rule_set
    }

    /// Rules may be edited between runs; a running worker keeps its own copy.
    pub fn rule_set_mut(&mut self) -> &mut RuleSet {
        &mut self.rule_set
    }

    pub fn status(&self) -> RunSnapshot {
        self.state.snapshot()
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Copy of the scan report the next clean will use.
    pub fn last_scan(&self) -> Option<Report> {
        self.last_scan
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Begin `operation` on a worker thread. Never blocks on filesystem work.
    pub fn start(&mut self, operation: Operation) -> Result<()> {
        self.state.begin(operation)?;

        let state = Arc::clone(&self.state);
        let rule_set = self.rule_set.clone();
        let trash = Arc::clone(&self.trash);
        let runner = Arc::clone(&self.runner);
        let last_scan = Arc::clone(&self.last_scan);

        let spawned = thread::Builder::new()
            .name(format!("reclaim-{}", operation))
            .spawn(move || {
                let report = run_operation(
                    operation,
                    &rule_set,
                    trash,
                    runner.as_ref(),
                    &last_scan,
                    &state,
                );
                state.finish(report.processed, report.cancelled);
                report
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.state.reset();
                Err(ReclaimError::Spawn(e))
            }
        }
    }

    pub fn pause(&self) -> bool {
        self.state.pause()
    }

    pub fn resume(&self) -> bool {
        self.state.resume()
    }

    pub fn cancel(&self) -> bool {
        self.state.cancel()
    }

    /// Wait for the worker to finish, reset to `Idle` and return its report.
    pub fn join(&mut self) -> Result<Report> {
        let handle = self.handle.take().ok_or(ReclaimError::NotStarted)?;
        let joined = handle.join();
        self.state.reset();
        joined.map_err(|_| ReclaimError::WorkerPanicked)
    }

    /// `start` followed by `join`.
    pub fn run_blocking(&mut self, operation: Operation) -> Result<Report> {
        self.start(operation)?;
        self.join()
    }
}

impl Drop for WorkerController {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.state.cancel();
            let _ = self.join();
        }
    }
}

fn run_operation(
    operation: Operation,
    rule_set: &RuleSet,
    trash: Arc<dyn Trash>,
    runner: &dyn CommandRunner,
    last_scan: &Mutex<Option<Report>>,
    state: &RunState,
) -> Report {
    let config = &rule_set.config;
    let engine = CleanEngine::new(ActionExecutor::new(trash, config.quarantine_root()));

    match operation {
        Operation::Scan => {
            let report = engine.scanner().scan(&rule_set.rules, config, state);
            let mut stored = last_scan.lock().unwrap_or_else(PoisonError::into_inner);
            *stored = if report.cancelled {
                None
            } else {
                Some(report.clone())
            };
            report
        }
        Operation::Clean => {
            let prior = last_scan
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if prior.is_some() {
                tracing::debug!("Cleaning matches of the previous scan");
            }
            engine.clean(prior, &rule_set.rules, config, state)
        }
        Operation::PurgePip | Operation::PurgeNpm => {
            let cache = match PackageCache::for_operation(operation) {
                Some(cache) => cache,
                None => return Report::new(operation),
            };
            engine.purge(cache, &cache.default_dirs(), runner, config, state)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GlobalConfig, Rule};
    use crate::engine::NoTrash;
    use std::fs;
    use tempfile::TempDir;

    fn controller(tmp: &TempDir) -> WorkerController {
        let data = tmp.path().join("data");
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("a.log"), "aaa").unwrap();
        fs::write(data.join("b.log"), "bb").unwrap();

        let config = GlobalConfig {
            quarantine_root: Some(tmp.path().join("quarantine")),
            ..Default::default()
        };
        WorkerController::new(RuleSet::new(config, vec![Rule::new("data", data)]))
            .with_trash(Arc::new(NoTrash))
    }

    #[test]
    fn test_join_without_start() {
        let tmp = TempDir::new().unwrap();
        let mut controller = controller(&tmp);
        assert!(matches!(controller.join(), Err(ReclaimError::NotStarted)));
    }

    #[test]
    fn test_scan_then_join_resets_to_idle() {
        let tmp = TempDir::new().unwrap();
        let mut controller = controller(&tmp);

        let report = controller.run_blocking(Operation::Scan).unwrap();

        assert_eq!(report.total_matched(), 2);
        assert_eq!(controller.phase(), Phase::Idle);
        assert!(controller.last_scan().is_some());
    }

    #[test]
    fn test_clean_consumes_last_scan() {
        let tmp = TempDir::new().unwrap();
        let mut controller = controller(&tmp);
        controller.run_blocking(Operation::Scan).unwrap();

        let report = controller.run_blocking(Operation::Clean).unwrap();

        assert_eq!(report.total_simulated(), 2);
        assert!(controller.last_scan().is_none());
    }

    #[test]
    fn test_events_bracket_the_run() {
        let tmp = TempDir::new().unwrap();
        let mut controller = controller(&tmp);
        let rx = controller.subscribe();

        controller.run_blocking(Operation::Scan).unwrap();

        let events: Vec<ProgressEvent> = rx.try_iter().collect();
        assert!(matches!(
            events.first(),
            Some(ProgressEvent::PhaseChanged {
                phase: Phase::Running,
                ..
            })
        ));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::Finished {
                cancelled: false,
                ..
            })
        ));
    }

    #[test]
    fn test_controls_are_noops_when_idle() {
        let tmp = TempDir::new().unwrap();
        let controller = controller(&tmp);
        assert!(!controller.pause());
        assert!(!controller.resume());
        assert!(!controller.cancel());
    }
}
