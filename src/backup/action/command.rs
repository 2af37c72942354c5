use crate::backup::action::{Action, Completer, Resource};
use crate::backup::process::ProcessRunner;
use crate::backup::result_error::result::Result;
use bon::Builder;
use rayon::ThreadPool;
use std::ffi::OsString;
use std::sync::{Arc, Mutex};

/// Exit status of a finished [`CommandAction`], shared with whoever queued it
pub type CommandOutcome = Arc<Mutex<Option<Result<i32>>>>;

/// Runs an external command on a thread pool, holding `resources` until the
/// command exits.
#[derive(Builder)]
pub struct CommandAction {
    #[builder(into)]
    args: Vec<OsString>,
    #[builder(default, into)]
    resources: Vec<Resource>,
    runner: Arc<dyn ProcessRunner>,
    pool: Arc<ThreadPool>,
    #[builder(default)]
    outcome: CommandOutcome,
}

impl CommandAction {
    /// Handle to read the exit status once the action has completed
    pub fn outcome(&self) -> CommandOutcome {
        self.outcome.clone()
    }
}

impl Action for CommandAction {
    fn resources(&self) -> Vec<Resource> {
        self.resources.clone()
    }

    fn go(&mut self, completer: Completer) -> Result<()> {
        let args = self.args.clone();
        let runner = self.runner.clone();
        let outcome = self.outcome.clone();
        tracing::info!("Starting {:?}", args);
        self.pool.spawn(move || {
            let res = runner.execute(&args);
            match &res {
                Ok(0) => tracing::info!("{:?} succeeded", args),
                Ok(status) => tracing::warn!("{:?} exited with status {status:#x}", args),
                Err(e) => tracing::warn!("{:?} could not be run: {e}", args),
            }
            if let Ok(mut slot) = outcome.lock() {
                *slot = Some(res);
            }
            completer.complete();
        });
        Ok(())
    }
}
