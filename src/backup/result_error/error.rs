use crate::backup::action::ActionId;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use derive_more::Display;
use itertools::Itertools;
use thiserror::Error;
use thiserror_ext::Construct;

/// Why a date string was rejected
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum InvalidDateReason {
    #[display("bad format")]
    BadFormat,
    #[display("year too small")]
    YearTooSmall,
    #[display("month out of range")]
    MonthOutOfRange,
    #[display("day out of range")]
    DayOutOfRange,
}

#[derive(Error, Debug, Construct)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    SerdeYml(#[from] serde_yml::Error),
    #[error(transparent)]
    ValidationError(#[from] validator::ValidationErrors),
    #[error(transparent)]
    ThreadPoolBuildError(#[from] rayon::ThreadPoolBuildError),
    #[error("invalid date string {input:?} - {reason}")]
    InvalidDate {
        input: String,
        reason: InvalidDateReason,
    },
    #[error("action {0} completed but is not tracked by this action list")]
    UntrackedAction(ActionId),
    #[error("{program} exited with status {status:#x}")]
    SubprocessFailed { program: String, status: i32 },
    #[error("{}:\n{}", msg, indent::indent_all_with("  ", error.to_string()))]
    WithMsg { msg: String, error: Box<Error> },
    #[error("{} failed:\n{}", fn_name, indent::indent_all_with("  ", error.to_string()))]
    WithFunctionName { fn_name: String, error: Box<Error> },
    #[error("{}", itertools::join(.0, "\n\n"))]
    LotsOfError(Vec<Error>),
}

impl<S: Into<String>> AddMsg<S> for Error {
    fn add_msg(self, msg: S) -> Self {
        Self::WithMsg {
            msg: msg.into(),
            error: Box::new(self),
        }
    }
}

impl<S: Into<String>> AddFunctionName<S> for Error {
    fn add_fn_name(self, fn_name: S) -> Self {
        Self::WithFunctionName {
            fn_name: fn_name.into(),
            error: Box::new(self),
        }
    }
}

impl From<Vec<Error>> for Error {
    fn from(errors: Vec<Error>) -> Self {
        if errors.is_empty() {
            panic!("Should not create lots of errors when error is empty")
        }
        Self::LotsOfError(errors.into_iter().flat_map(Error::into_iter).collect_vec())
    }
}

impl Error {
    pub fn into_iter(self) -> Box<dyn Iterator<Item = Error>> {
        match self {
            Error::LotsOfError(v) => Box::new(v.into_iter().flat_map(Error::into_iter)),
            e => Box::new(std::iter::once(e)),
        }
    }

    /// Contract violations and malformed input abort the run; everything
    /// else may be recovered by a caller that chooses to.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::InvalidDate { .. } | Error::UntrackedAction(_) => true,
            Error::WithMsg { error, .. } | Error::WithFunctionName { error, .. } => {
                error.is_fatal()
            }
            Error::LotsOfError(v) => v.iter().any(Error::is_fatal),
            _ => false,
        }
    }
}
