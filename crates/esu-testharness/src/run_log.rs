//! ---
//! esu_section: "02-trial-engine"
//! esu_subsection: "module"
//! esu_type: "source"
//! esu_scope: "code"
//! esu_description: "Concurrent trial engine: scheduling, verification, and reporting."
//! esu_version: "v0.1.0"
//! esu_owner: "tbd"
//! ---
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::HarnessError;

/// Human-readable run log shared by every trial of a run.
///
/// Lines are mirrored to stdout and appended to one file under a single lock.
/// The lock also covers creating the output directory, so many first writers
/// racing on a fresh output directory are safe.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    console: bool,
    file_lock: Mutex<()>,
}

impl RunLog {
    /// Log appending to `path` and mirroring to stdout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            console: true,
            file_lock: Mutex::new(()),
        }
    }

    /// Log appending to `path` only.
    pub fn file_only(path: impl Into<PathBuf>) -> Self {
        Self {
            console: false,
            ..Self::new(path)
        }
    }

    /// File backing the log.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one line to the console and append it to the log file.
    pub fn emit(&self, line: impl AsRef<str>) -> Result<(), HarnessError> {
        let line = line.as_ref();
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        // Console and file see lines in the same order.
        let _guard = self.file_lock.lock();
        let mirrored = if self.console {
            std::io::stdout().lock().write_all(record.as_bytes())
        } else {
            Ok(())
        };
        mirrored
            .and_then(|()| self.append(record.as_bytes()))
            .map_err(|source| HarnessError::RunLog {
                path: self.path.clone(),
                source,
            })
    }

    fn append(&self, record: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(record)
    }
}

/// Format and emit a line on a [`RunLog`], yielding the emit result.
#[macro_export]
macro_rules! run_log {
    ($log:expr, $($arg:tt)+) => {
        $log.emit(format!($($arg)+))
    };
}
