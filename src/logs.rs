//! Log file location and age-off.

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{ReclaimError, Result};

pub const LOG_FILE_NAME: &str = "reclaim.log";

const SECS_PER_DAY: u64 = 24 * 60 * 60;

/// Open `<dir>/reclaim.log` for appending, creating the directory.
pub fn open_log_file(dir: &Path) -> Result<(PathBuf, File)> {
    fs::create_dir_all(dir).map_err(|source| ReclaimError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|source| ReclaimError::Io {
            path: path.clone(),
            source,
        })?;
    Ok((path, file))
}

/// Remove `*.log*` files in `dir` last modified more than `days` ago.
///
/// `days` below 1 is treated as 1. Failures are skipped. Returns the number
/// of files removed.
pub fn age_off_logs(dir: &Path, days: u32, now: SystemTime) -> usize {
    let max_age = Duration::from_secs(u64::from(days.max(1)) * SECS_PER_DAY);

    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().contains(".log") {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) if m.is_file() => m,
            _ => continue,
        };
        let expired = meta
            .modified()
            .ok()
            .and_then(|t| now.duration_since(t).ok())
            .map(|age| age > max_age)
            .unwrap_or(false);

        if expired && fs::remove_file(entry.path()).is_ok() {
            tracing::debug!(path = %entry.path().display(), "Aged off log file");
            removed += 1;
        }
    }
    removed
}
