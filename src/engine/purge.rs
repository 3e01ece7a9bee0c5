//! Package-manager cache purges: a best-effort native command followed by a
//! delete pass over the known cache directories.

use std::io;
use std::path::PathBuf;
use std::process::Command;

use super::operation::Operation;
use crate::config::{Action, Rule};

/// A package manager whose download cache can be purged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageCache {
    Pip,
    Npm,
}

impl PackageCache {
    pub fn operation(&self) -> Operation {
        match self {
            PackageCache::Pip => Operation::PurgePip,
            PackageCache::Npm => Operation::PurgeNpm,
        }
    }

    pub fn for_operation(operation: Operation) -> Option<Self> {
        match operation {
            Operation::PurgePip => Some(PackageCache::Pip),
            Operation::PurgeNpm => Some(PackageCache::Npm),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PackageCache::Pip => "pip cache",
            PackageCache::Npm => "npm cache",
        }
    }

    /// Native purge command as (program, args).
    pub fn command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            PackageCache::Pip => ("pip", &["cache", "purge"]),
            PackageCache::Npm => ("npm", &["cache", "clean", "--force"]),
        }
    }

    /// Well-known cache locations for the current user.
    pub fn default_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        match self {
            PackageCache::Pip => {
                if let Some(cache) = dirs::cache_dir() {
                    dirs.push(cache.join("pip"));
                }
            }
            PackageCache::Npm => {
                if let Some(home) = dirs::home_dir() {
                    dirs.push(home.join(".npm"));
                }
                if let Some(cache) = dirs::cache_dir() {
                    dirs.push(cache.join("npm"));
                }
            }
        }
        dirs
    }

    /// One delete rule per cache directory, taking everything inside it.
    pub fn rules_for(&self, dirs: &[PathBuf]) -> Vec<Rule> {
        dirs.iter()
            .map(|dir| {
                Rule::new(format!("{} ({})", self.label(), dir.display()), dir.clone())
                    .with_patterns(["*"])
                    .with_action(Action::Delete)
                    .with_remove_empty_dirs(true)
            })
            .collect()
    }
}

/// Runs an external program to completion.
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`; `Err` carries a human-readable reason.
    fn run(&self, program: &str, args: &[&str]) -> Result<(), String>;
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

impl CommandRunner for SystemCommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<(), String> {
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => format!("{} not found", program),
                _ => e.to_string(),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("Command failed: {}", stderr.trim()))
        }
    }
}
