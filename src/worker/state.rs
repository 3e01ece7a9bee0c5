//! Shared run state: phase machine, progress counters and the pause/cancel
//! checkpoint the engines call between entries.

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::event::{EventSink, ProgressEvent};
use crate::engine::Operation;
use crate::error::{ReclaimError, Result};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Running,
    Paused,
    Cancelling,
    Done,
}

/// What the caller of a checkpoint should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Point-in-time view of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSnapshot {
    pub phase: Phase,
    pub operation: Option<Operation>,
    pub processed: usize,
    pub total_estimate: Option<usize>,
    pub current: Option<PathBuf>,
}

impl RunSnapshot {
    fn idle() -> Self {
        Self {
            phase: Phase::Idle,
            operation: None,
            processed: 0,
            total_estimate: None,
            current: None,
        }
    }
}

/// State shared between the controller and its worker thread.
///
/// Engines receive it by reference and call [`RunState::checkpoint`] between
/// entries; only the controller drives phase transitions.
#[derive(Debug)]
pub struct RunState {
    inner: Mutex<RunSnapshot>,
    resumed: Condvar,
    events: EventSink,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RunSnapshot::idle()),
            resumed: Condvar::new(),
            events: EventSink::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RunSnapshot> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    pub fn emit(&self, event: ProgressEvent) {
        self.events.emit(event);
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Move to a new phase if `allowed(current)`; emits on change.
    fn transition(&self, to: Phase, allowed: impl Fn(Phase) -> bool) -> bool {
        let operation = {
            let mut state = self.lock();
            if !allowed(state.phase) || state.phase == to {
                return false;
            }
            state.phase = to;
            state.operation
        };
        self.resumed.notify_all();
        if let Some(operation) = operation {
            tracing::info!(%operation, ?to, "Phase changed");
            self.emit(ProgressEvent::PhaseChanged {
                operation,
                phase: to,
            });
        }
        true
    }

    /// Idle -> Running. Fails fast without touching state otherwise.
    pub(crate) fn begin(&self, operation: Operation) -> Result<()> {
        {
            let mut state = self.lock();
            if state.phase != Phase::Idle {
                return Err(ReclaimError::AlreadyRunning);
            }
            *state = RunSnapshot {
                phase: Phase::Running,
                operation: Some(operation),
                ..RunSnapshot::idle()
            };
        }
        tracing::info!(%operation, "Run started");
        self.emit(ProgressEvent::PhaseChanged {
            operation,
            phase: Phase::Running,
        });
        Ok(())
    }

    pub(crate) fn pause(&self) -> bool {
        self.transition(Phase::Paused, |p| p == Phase::Running)
    }

    pub(crate) fn resume(&self) -> bool {
        self.transition(Phase::Running, |p| p == Phase::Paused)
    }

    pub(crate) fn cancel(&self) -> bool {
        self.transition(Phase::Cancelling, |p| {
            matches!(p, Phase::Running | Phase::Paused)
        })
    }

    pub(crate) fn finish(&self, processed: usize, cancelled: bool) {
        let operation = self.lock().operation;
        self.transition(Phase::Done, |p| p != Phase::Idle);
        if let Some(operation) = operation {
            self.emit(ProgressEvent::Finished {
                operation,
                processed,
                cancelled,
            });
        }
    }

    pub(crate) fn reset(&self) {
        *self.lock() = RunSnapshot::idle();
        self.resumed.notify_all();
    }

    /// Suspend while paused; report whether the caller should stop.
    ///
    /// Outside a controller-driven run the phase is `Idle` and this always
    /// continues.
    pub fn checkpoint(&self) -> Flow {
        let mut state = self.lock();
        while state.phase == Phase::Paused {
            state = self
                .resumed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        if state.phase == Phase::Cancelling {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }

    /// Reset the progress counter for a new stage of the run.
    pub fn restart_progress(&self, total_estimate: Option<usize>) {
        let mut state = self.lock();
        state.processed = 0;
        state.total_estimate = total_estimate;
        state.current = None;
    }

    /// Count one processed item and notify subscribers.
    pub fn item_processed(&self, rule: &str, path: &Path) {
        let (processed, total_estimate) = {
            let mut state = self.lock();
            state.processed += 1;
            state.current = Some(path.to_path_buf());
            (state.processed, state.total_estimate)
        };
        self.emit(ProgressEvent::ItemProcessed {
            rule: rule.to_string(),
            path: path.to_path_buf(),
            processed,
            total_estimate,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_idle_checkpoint_continues() {
        let state = RunState::new();
        assert_eq!(state.checkpoint(), Flow::Continue);
    }

    #[test]
    fn test_begin_twice_fails() {
        let state = RunState::new();
        state.begin(Operation::Scan).unwrap();

        let second = state.begin(Operation::Clean);

        assert!(matches!(second, Err(ReclaimError::AlreadyRunning)));
        assert_eq!(state.snapshot().operation, Some(Operation::Scan));
    }

    #[test]
    fn test_transitions_follow_state_machine() {
        let state = RunState::new();
        assert!(!state.pause());
        assert!(!state.cancel());

        state.begin(Operation::Scan).unwrap();
        assert!(!state.resume());
        assert!(state.pause());
        assert!(!state.pause());
        assert_eq!(state.phase(), Phase::Paused);
        assert!(state.resume());
        assert_eq!(state.phase(), Phase::Running);
        assert!(state.cancel());
        assert_eq!(state.phase(), Phase::Cancelling);
        assert!(!state.pause());

        state.finish(0, true);
        assert_eq!(state.phase(), Phase::Done);
        state.reset();
        assert_eq!(state.phase(), Phase::Idle);
    }

    #[test]
    fn test_checkpoint_blocks_while_paused() {
        let state = Arc::new(RunState::new());
        state.begin(Operation::Scan).unwrap();
        state.pause();

        let worker_state = Arc::clone(&state);
        let worker = thread::spawn(move || worker_state.checkpoint());

        thread::sleep(Duration::from_millis(50));
        assert!(!worker.is_finished());

        state.resume();
        assert_eq!(worker.join().unwrap(), Flow::Continue);
    }

    #[test]
    fn test_cancel_wakes_paused_checkpoint() {
        let state = Arc::new(RunState::new());
        state.begin(Operation::Clean).unwrap();
        state.pause();

        let worker_state = Arc::clone(&state);
        let worker = thread::spawn(move || worker_state.checkpoint());

        state.cancel();
        assert_eq!(worker.join().unwrap(), Flow::Stop);
    }

    #[test]
    fn test_item_processed_emits_counts() {
        let state = RunState::new();
        let rx = state.subscribe();
        state.restart_progress(Some(2));

        state.item_processed("r", Path::new("/a"));

        match rx.try_recv().unwrap() {
            ProgressEvent::ItemProcessed {
                processed,
                total_estimate,
                ..
            } => {
                assert_eq!(processed, 1);
                assert_eq!(total_estimate, Some(2));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(state.snapshot().current, Some(PathBuf::from("/a")));
    }
}
