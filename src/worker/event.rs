//! Progress events sent from the worker to subscribers.

use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Mutex, PoisonError};

use super::state::Phase;
use crate::engine::Operation;

/// Structured progress event. Subscribers format these; the engine never does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ProgressEvent {
    /// The run moved to a new phase.
    PhaseChanged { operation: Operation, phase: Phase },
    /// A rule's walk is starting.
    RuleStarted { rule: String },
    /// A rule was skipped (missing root, bad pattern, ...).
    RuleSkipped { rule: String, reason: String },
    /// One entry (scan) or match (clean) was processed.
    ItemProcessed {
        rule: String,
        path: PathBuf,
        processed: usize,
        total_estimate: Option<usize>,
    },
    /// The worker is done; the report is waiting in `join`.
    Finished {
        operation: Operation,
        processed: usize,
        cancelled: bool,
    },
}

/// Fan-out of progress events to any number of channel subscribers.
#[derive(Debug, Default)]
pub struct EventSink {
    senders: Mutex<Vec<Sender<ProgressEvent>>>,
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = channel();
        self.senders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// Deliver `event` to every live subscriber, dropping disconnected ones.
    pub fn emit(&self, event: ProgressEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
        if senders.is_empty() {
            return;
        }
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
