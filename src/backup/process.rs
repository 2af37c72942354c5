//! Running external programs.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use std::ffi::OsString;
use std::process::{Command, ExitStatus};

/// Runs a subprocess to completion and reports its exit status
pub trait ProcessRunner: Send + Sync {
    /// `args[0]` is the program. Returns the exit status, which is non-zero
    /// for failure and for termination by a signal.
    fn execute(&self, args: &[OsString]) -> Result<i32>;
}

/// [`ProcessRunner`] that spawns real processes
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn execute(&self, args: &[OsString]) -> Result<i32> {
        let (program, rest) = args.split_first().ok_or_else(|| {
            Error::from(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "empty command line",
            ))
        })?;
        tracing::debug!("Executing {:?}", args);
        let status = Command::new(program)
            .args(rest)
            .status()
            .map_err(Error::from)
            .add_msg(format!("Failed to run {:?}", program))?;
        Ok(exit_code(status))
    }
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Arguments for recursively removing `path`
pub fn remove_tree_command<P: Into<OsString>>(path: P) -> Vec<OsString> {
    vec!["rm".into(), "-rf".into(), path.into()]
}
