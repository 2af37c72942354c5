//! Retention: deciding which backups are obsolete and deleting them.
//!
//! A backup is obsolete once it is older than its volume's `prune_age`, as
//! long as removing it leaves at least `min_backups` completed backups on its
//! device. The minimum is enforced across the whole pass: every backup picked
//! for removal lowers the effective count seen by later ones on that device.
//!
//! Deletions run through an [`ActionList`] with the device as the resource,
//! so each device sees one deletion at a time while different devices are
//! worked on in parallel. A failed deletion is logged and the pass carries on.

pub mod log;
mod removal;

pub use removal::remove_backup_files;

use crate::backup::action::ActionList;
use crate::backup::backup_config::Config;
use crate::backup::calendar::Date;
use crate::backup::device::StoreLocator;
use crate::backup::function_path;
use crate::backup::ledger::Backup;
use crate::backup::process::ProcessRunner;
use crate::backup::prune::log::{expire_prune_logs, PruneLog};
use crate::backup::prune::removal::{PruneRun, RemovalAction};
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use crate::backup::state::BackupState;
use bon::Builder;
use function_name::named;
use getset::CopyGetters;
use rayon::ThreadPool;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Which backups a pass goes after
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PruneMode {
    /// Backups past their volume's retention policy
    #[default]
    Obsolete,
    /// Failed backup attempts, whatever their age
    Incomplete,
}

/// What one pass did
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct PruneReport {
    /// Backups selected for removal
    candidates: usize,
    removed: usize,
    failed: usize,
    /// Candidates left alone because their device is not available
    skipped: usize,
}

#[derive(Builder)]
pub struct Pruner {
    config: Arc<Config>,
    runner: Arc<dyn ProcessRunner>,
    pool: Arc<ThreadPool>,
    /// When false, candidates are only reported
    #[builder(default = true)]
    act: bool,
    #[builder(default)]
    mode: PruneMode,
    /// Overrides [`Date::today`]
    today: Option<Date>,
}

impl Pruner {
    /// Selects and deletes obsolete backups across every volume in `state`.
    ///
    /// `identify` is only called when there is something to delete.
    /// Successfully deleted backups are dropped from `state`.
    #[named]
    pub fn prune<L, F>(&self, state: &mut BackupState, identify: F) -> Result<PruneReport>
    where
        L: StoreLocator,
        F: FnOnce() -> L,
    {
        let today = match self.today {
            Some(today) => today,
            None => Date::today().add_fn_name(function_path!())?,
        };
        let obsolete = self.select(state, today);
        let mut report = PruneReport {
            candidates: obsolete.len(),
            ..PruneReport::default()
        };
        if obsolete.is_empty() {
            tracing::info!("Nothing to prune");
            return Ok(report);
        }

        let locator = identify();
        let run = if self.act {
            let log = PruneLog::open(self.config.logs(), today).add_fn_name(function_path!())?;
            Some(Rc::new(RefCell::new(PruneRun {
                log,
                removed: Vec::new(),
                failed: 0,
            })))
        } else {
            None
        };

        let mut actions = ActionList::default();
        for backup in obsolete {
            let Some(store) = locator.locate(backup.device()) else {
                tracing::debug!(
                    "Device {:?} unavailable, leaving {}:{} {}",
                    backup.device(),
                    backup.host(),
                    backup.volume(),
                    backup.date()
                );
                report.skipped += 1;
                continue;
            };
            tracing::info!("prune {:?}", backup.backup_path(store));
            if let Some(run) = &run {
                actions.add(RemovalAction {
                    backup,
                    store: store.to_path_buf(),
                    logs: self.config.logs().clone(),
                    runner: self.runner.clone(),
                    pool: self.pool.clone(),
                    run: run.clone(),
                    outcome: Default::default(),
                });
            }
        }
        actions.run().add_fn_name(function_path!())?;

        if let Some(run) = run {
            let run = run.borrow();
            for backup in &run.removed {
                state.remove_backup(backup);
            }
            report.removed = run.removed.len();
            report.failed = run.failed;

            if let Err(e) = expire_prune_logs(self.config.logs(), today, self.config.keep_prune_logs()) {
                tracing::warn!("Expiring old prune logs failed: {e}");
            }
        }
        tracing::info!("Prune finished: {:?}", report);
        Ok(report)
    }

    /// Picks the backups to delete, marking each against its device so that
    /// later picks on the same device see the reduced count.
    pub fn select(&self, state: &mut BackupState, today: Date) -> Vec<Arc<Backup>> {
        let mut obsolete = Vec::new();
        for volume in state.volumes_mut() {
            volume.ledger_mut().clear_marks();
            let backups: Vec<Arc<Backup>> = volume.ledger().backups().cloned().collect();
            for backup in backups {
                match self.mode {
                    PruneMode::Incomplete => {
                        if backup.is_complete() {
                            continue;
                        }
                    }
                    PruneMode::Obsolete => {
                        let age = today - backup.date();
                        if age <= i64::from(volume.prune_age()) {
                            continue;
                        }
                        let remaining = volume
                            .ledger()
                            .per_device(backup.device())
                            .map_or(0, |pd| pd.remaining());
                        if remaining <= volume.min_backups() {
                            continue;
                        }
                        volume.ledger_mut().mark_for_removal(backup.device());
                    }
                }
                tracing::debug!(
                    "{}:{} {} on {:?} is obsolete",
                    backup.host(),
                    backup.volume(),
                    backup.date(),
                    backup.device()
                );
                obsolete.push(backup);
            }
        }
        obsolete
    }
}
