//! Background execution of scan, clean and purge runs.
//!
//! This module provides:
//! - The run state machine with pause/cancel checkpoints
//! - Progress events for subscribers
//! - A controller that owns the worker thread
//! - SIGINT/SIGTERM forwarding for the CLI

mod controller;
pub mod event;
mod signals;
pub mod state;

pub use controller::WorkerController;
pub use event::{EventSink, ProgressEvent};
pub use signals::{install_interrupt_handler, take_interrupt};
pub use state::{Flow, Phase, RunSnapshot, RunState};
