//! OS trash capability.
//!
//! The executor only needs one operation, `send_to_trash`. The default
//! implementation follows the freedesktop.org trash layout; tests and
//! platforms without a trash inject their own.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::executor::is_cross_device;

#[derive(Error, Debug)]
pub enum TrashError {
    /// No usable trash; callers fall back to quarantine.
    #[error("trash unavailable: {0}")]
    Unavailable(String),

    /// The trash exists but this entry could not be moved into it.
    #[error("failed to trash '{path}': {source}")]
    Failed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Trait for trash backends
pub trait Trash: Send + Sync {
    /// Get the name of this backend
    fn name(&self) -> &'static str;

    /// Move `path` into the trash.
    fn send_to_trash(&self, path: &Path) -> Result<(), TrashError>;
}

/// A trash that is never available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrash;

impl Trash for NoTrash {
    fn name(&self) -> &'static str {
        "none"
    }

    fn send_to_trash(&self, _path: &Path) -> Result<(), TrashError> {
        Err(TrashError::Unavailable("no trash backend configured".into()))
    }
}

/// Home trash as described by the freedesktop.org trash specification.
#[derive(Debug, Clone)]
pub struct FreedesktopTrash {
    root: Option<PathBuf>,
}

impl FreedesktopTrash {
    /// Trash under `$XDG_DATA_HOME/Trash`.
    pub fn new() -> Self {
        Self {
            root: dirs::data_dir().map(|d| d.join("Trash")),
        }
    }

    /// Trash rooted at an explicit directory.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    fn prepare(&self) -> Result<(PathBuf, PathBuf), TrashError> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| TrashError::Unavailable("no data directory".into()))?;
        let files = root.join("files");
        let info = root.join("info");
        for dir in [&files, &info] {
            fs::create_dir_all(dir).map_err(|e| {
                TrashError::Unavailable(format!("cannot create {}: {}", dir.display(), e))
            })?;
        }
        Ok((files, info))
    }

    /// Reserve a unique name by creating its `.trashinfo` file exclusively.
    fn reserve(info_dir: &Path, base: &str, original: &Path) -> io::Result<(String, PathBuf)> {
        let mut n = 0u32;
        loop {
            let candidate = if n == 0 {
                base.to_string()
            } else {
                format!("{}.{}", base, n)
            };
            let info_path = info_dir.join(format!("{}.trashinfo", candidate));

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&info_path)
            {
                Ok(mut file) => {
                    let deleted_at = chrono::Local::now().format("%Y-%m-%dT%H:%M:%S");
                    write!(
                        file,
                        "[Trash Info]\nPath={}\nDeletionDate={}\n",
                        percent_encode(original),
                        deleted_at
                    )?;
                    return Ok((candidate, info_path));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(e),
            }
        }
    }
}

impl Default for FreedesktopTrash {
    fn default() -> Self {
        Self::new()
    }
}

impl Trash for FreedesktopTrash {
    fn name(&self) -> &'static str {
        "freedesktop"
    }

    fn send_to_trash(&self, path: &Path) -> Result<(), TrashError> {
        let (files_dir, info_dir) = self.prepare()?;

        let base = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unnamed".to_string());

        let (name, info_path) =
            Self::reserve(&info_dir, &base, path).map_err(|e| TrashError::Failed {
                path: path.to_path_buf(),
                source: e,
            })?;

        if let Err(e) = fs::rename(path, files_dir.join(&name)) {
            let _ = fs::remove_file(&info_path);
            if is_cross_device(&e) {
                return Err(TrashError::Unavailable(format!(
                    "{} is on another filesystem than the trash",
                    path.display()
                )));
            }
            return Err(TrashError::Failed {
                path: path.to_path_buf(),
                source: e,
            });
        }

        Ok(())
    }
}

/// Percent-encode a path for the `Path=` key of a `.trashinfo` file.
fn percent_encode(path: &Path) -> String {
    let mut out = String::new();
    for &b in path.as_os_str().as_bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}
