//! Rule matching, scanning and disposition.
//!
//! This module provides:
//! - Pattern and age predicates for rules
//! - A side-effect-free scanner
//! - The clean pipeline with quarantine, recycle and delete dispositions
//! - Package-manager cache purges

mod clean;
mod executor;
pub mod matcher;
mod operation;
mod purge;
mod report;
mod scan;
pub mod trash;

pub use clean::CleanEngine;
pub use executor::{ActionExecutor, DispositionCounters};
pub use matcher::{Candidate, RuleMatcher};
pub use operation::Operation;
pub use purge::{CommandRunner, PackageCache, SystemCommandRunner};
pub use report::{
    AppliedAction, ExternalCommand, MatchResult, Outcome, Report, RuleSummary, RuleWarning,
};
pub use scan::ScanEngine;
pub use trash::{FreedesktopTrash, NoTrash, Trash, TrashError};
