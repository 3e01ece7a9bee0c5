//! Reclaim - A rule-driven filesystem reclamation engine
//!
//! This crate provides functionality for:
//! - Matching files against named rules (glob patterns plus an age filter)
//! - Quarantining, recycling or deleting matches under per-rule and global caps
//! - Running scans and cleans on a pausable, cancellable worker thread

pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod logs;
pub mod worker;

// Re-export commonly used types
pub use config::{Action, GlobalConfig, Rule, RuleSet};
pub use engine::{Operation, Report};
pub use error::{ReclaimError, Result};
pub use worker::WorkerController;
