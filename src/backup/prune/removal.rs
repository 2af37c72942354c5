use crate::backup::action::{Action, ActionList, Completer, Resource};
use crate::backup::ledger::Backup;
use crate::backup::prune::log::PruneLog;
use crate::backup::process::{remove_tree_command, ProcessRunner};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use rayon::ThreadPool;
use std::cell::RefCell;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Deletes one backup.
///
/// The incomplete sentinel is written first, so an interrupted deletion is
/// recognised as an incomplete backup later on. Then the backup's log goes,
/// then its data tree. The sentinel is only cleared once the data is gone.
pub fn remove_backup_files(
    runner: &dyn ProcessRunner,
    backup: &Backup,
    store: &Path,
    logs: &Path,
) -> Result<()> {
    let incomplete_path = backup.incomplete_path(store);
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&incomplete_path)
        .map_err(Error::from)
        .add_msg(format!("creating {}", incomplete_path.display()))?;

    let log_path = backup.log_path(logs);
    std::fs::remove_file(&log_path)
        .map_err(Error::from)
        .add_msg(format!("removing {}", log_path.display()))?;

    let backup_path = backup.backup_path(store);
    let status = runner
        .execute(&remove_tree_command(&backup_path))
        .add_msg(format!("removing {}", backup_path.display()))?;
    if status != 0 {
        return Err(Error::subprocess_failed("rm", status)
            .add_msg(format!("removing {}", backup_path.display())));
    }

    if let Err(e) = std::fs::remove_file(&incomplete_path) {
        tracing::warn!("Removed {:?} but not its sentinel: {e}", backup_path);
    }
    Ok(())
}

/// Progress of one prune pass, shared by its removal actions
#[derive(Debug)]
pub(super) struct PruneRun {
    pub log: PruneLog,
    pub removed: Vec<Arc<Backup>>,
    pub failed: usize,
}

/// Deletes one backup on the worker pool while holding its device
pub(super) struct RemovalAction {
    pub backup: Arc<Backup>,
    pub store: PathBuf,
    pub logs: PathBuf,
    pub runner: Arc<dyn ProcessRunner>,
    pub pool: Arc<ThreadPool>,
    pub run: Rc<RefCell<PruneRun>>,
    pub outcome: Arc<Mutex<Option<Result<()>>>>,
}

impl Action for RemovalAction {
    fn resources(&self) -> Vec<Resource> {
        vec![self.backup.device().clone()]
    }

    fn go(&mut self, completer: Completer) -> Result<()> {
        let backup = self.backup.clone();
        let store = self.store.clone();
        let logs = self.logs.clone();
        let runner = self.runner.clone();
        let outcome = self.outcome.clone();
        self.pool.spawn(move || {
            let res = remove_backup_files(runner.as_ref(), &backup, &store, &logs);
            if let Ok(mut slot) = outcome.lock() {
                *slot = Some(res);
            }
            completer.complete();
        });
        Ok(())
    }

    fn done(&mut self, _actions: &mut ActionList) -> Result<()> {
        let backup_path = self.backup.backup_path(&self.store);
        let res = self
            .outcome
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .unwrap_or_else(|| {
                Err(Error::from(std::io::Error::other(
                    "removal finished without reporting an outcome",
                )))
            });
        let mut run = self.run.borrow_mut();
        let logged = match res {
            Ok(()) => {
                tracing::info!("Removed {:?}", backup_path);
                run.removed.push(self.backup.clone());
                run.log.removed(&backup_path)
            }
            Err(e) => {
                tracing::warn!("Failed to remove {:?}: {e}", backup_path);
                run.failed += 1;
                run.log.failed(&backup_path, &e)
            }
        };
        // A lost log line must not hide a finished removal from the ledger
        if let Err(e) = logged {
            tracing::warn!("{e}");
        }
        Ok(())
    }
}
