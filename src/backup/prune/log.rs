use crate::backup::calendar::Date;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::{convert_error_vec, Result};
use crate::backup::result_error::AddMsg;
use itertools::Itertools;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only record of what a prune pass deleted
///
/// Every line is flushed as soon as it is written so the file reflects real
/// progress even if the process dies mid-pass.
#[derive(Debug)]
pub struct PruneLog {
    path: PathBuf,
    today: Date,
    writer: BufWriter<File>,
}

impl PruneLog {
    pub fn path<P: AsRef<Path>>(logs: P, date: Date) -> PathBuf {
        logs.as_ref().join(format!("prune-{date}.log"))
    }

    pub fn open<P: AsRef<Path>>(logs: P, today: Date) -> Result<Self> {
        let path = Self::path(logs, today);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(Error::from)
            .add_msg(format!("Opening prune log {:?} failed", path))?;
        Ok(Self {
            path,
            today,
            writer: BufWriter::new(file),
        })
    }

    pub fn file_path(&self) -> &Path {
        &self.path
    }

    pub fn removed<P: AsRef<Path>>(&mut self, backup_path: P) -> Result<()> {
        let line = format!("{}: removed {}", self.today, backup_path.as_ref().display());
        self.write_line(line)
    }

    /// `reason` is folded onto one line.
    pub fn failed<P: AsRef<Path>>(&mut self, backup_path: P, reason: &Error) -> Result<()> {
        let reason = reason.to_string().lines().map(str::trim).join(" ");
        let line = format!(
            "{}: FAILED to remove {}: {}",
            self.today,
            backup_path.as_ref().display(),
            reason
        );
        self.write_line(line)
    }

    fn write_line(&mut self, line: String) -> Result<()> {
        writeln!(self.writer, "{line}")
            .and_then(|_| self.writer.flush())
            .map_err(Error::from)
            .add_msg(format!("Writing prune log {:?} failed", self.path))
    }
}

/// Deletes prune logs more than `keep_days` days older than `today`.
///
/// Every expired log is attempted; failures are returned together.
pub fn expire_prune_logs<P: AsRef<Path>>(logs: P, today: Date, keep_days: i32) -> Result<usize> {
    let logs = logs.as_ref();
    let mut errors = Vec::new();
    let mut removed = 0;
    for entry in std::fs::read_dir(logs)? {
        let path = entry?.path();
        let Some(date) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("prune-"))
            .and_then(|n| n.strip_suffix(".log"))
        else {
            continue;
        };
        let date: Date = match date.parse() {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!("Ignoring {:?}: {e}", path);
                continue;
            }
        };
        if today - date <= i64::from(keep_days) {
            continue;
        }
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Removed old prune log {:?}", path);
                removed += 1;
            }
            Err(e) => errors.push(Error::from(e).add_msg(format!("Removing {:?} failed", path))),
        }
    }
    convert_error_vec(errors).map(|_| removed)
}
