use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::ReclaimError;

/// The four operations the engine exposes to its callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Scan,
    Clean,
    PurgePip,
    PurgeNpm,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Scan => "scan",
            Operation::Clean => "clean",
            Operation::PurgePip => "purge_pip",
            Operation::PurgeNpm => "purge_npm",
        }
    }

    /// Whether the operation may mutate the filesystem.
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::Scan)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ReclaimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "scan" => Ok(Operation::Scan),
            "clean" => Ok(Operation::Clean),
            "purge_pip" => Ok(Operation::PurgePip),
            "purge_npm" => Ok(Operation::PurgeNpm),
            other => Err(ReclaimError::InvalidOperation(other.to_string())),
        }
    }
}
