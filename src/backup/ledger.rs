//! Per-volume record of backup attempts and the aggregates derived from it.

use crate::backup::calendar::Date;
use bon::Builder;
use getset::{CopyGetters, Getters};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Suffix appended to a backup's data path to mark it as incomplete
pub static INCOMPLETE_SUFFIX: &str = ".incomplete";

/// One backup attempt of a volume onto a device
///
/// Records are immutable once created. A record is complete when the attempt
/// exited with status 0.
#[derive(Clone, Debug, PartialEq, Eq, Builder, Getters, CopyGetters)]
pub struct Backup {
    #[builder(into)]
    #[getset(get = "pub")]
    host: Arc<str>,
    #[builder(into)]
    #[getset(get = "pub")]
    volume: Arc<str>,
    #[builder(into)]
    #[getset(get = "pub")]
    device: Arc<str>,
    #[getset(get_copy = "pub")]
    date: Date,
    #[builder(default)]
    #[getset(get_copy = "pub")]
    rc: i32,
}

impl Backup {
    pub fn is_complete(&self) -> bool {
        self.rc == 0
    }

    /// Directory holding the backup's data on the store mounted at `store`
    pub fn backup_path<P: AsRef<Path>>(&self, store: P) -> PathBuf {
        store
            .as_ref()
            .join(self.host.as_ref())
            .join(self.volume.as_ref())
            .join(self.date.to_string())
    }

    /// Sentinel file marking a backup whose data may be partial
    pub fn incomplete_path<P: AsRef<Path>>(&self, store: P) -> PathBuf {
        let mut path = OsString::from(self.backup_path(store));
        path.push(INCOMPLETE_SUFFIX);
        path.into()
    }

    pub fn log_path<P: AsRef<Path>>(&self, logs: P) -> PathBuf {
        logs.as_ref().join(self.log_file_name())
    }

    pub fn log_file_name(&self) -> String {
        format!(
            "{}-{}-{}-{}.log",
            self.date, self.device, self.host, self.volume
        )
    }

    fn key(&self) -> BackupKey {
        (self.date, self.device.clone())
    }
}

type BackupKey = (Date, Arc<str>);

/// Completed-backup figures for one device
#[derive(Clone, Debug, PartialEq, Eq, CopyGetters)]
#[getset(get_copy = "pub")]
pub struct PerDevice {
    count: usize,
    oldest: Date,
    newest: Date,
    /// Backups selected for removal during the current retention pass
    to_be_removed: usize,
}

impl PerDevice {
    fn new(date: Date) -> Self {
        Self {
            count: 1,
            oldest: date,
            newest: date,
            to_be_removed: 0,
        }
    }

    fn include(&mut self, date: Date) {
        self.count += 1;
        self.oldest = self.oldest.min(date);
        self.newest = self.newest.max(date);
    }

    /// Completed backups that would remain once the marked ones are gone
    pub fn remaining(&self) -> usize {
        self.count.saturating_sub(self.to_be_removed)
    }
}

/// The backups of one volume, keyed by (date, device), with aggregates that
/// are recomputed from scratch after every change.
#[derive(Clone, Debug, Default, CopyGetters)]
pub struct VolumeLedger {
    backups: BTreeMap<BackupKey, Arc<Backup>>,
    #[getset(get_copy = "pub")]
    completed: usize,
    #[getset(get_copy = "pub")]
    oldest: Option<Date>,
    #[getset(get_copy = "pub")]
    newest: Option<Date>,
    per_device: BTreeMap<Arc<str>, PerDevice>,
}

impl VolumeLedger {
    /// Inserts `backup` unless a record with the same date and device is
    /// already present, in which case the existing record is kept.
    pub fn add_backup<B: Into<Arc<Backup>>>(&mut self, backup: B) -> bool {
        let backup = backup.into();
        let inserted = match self.backups.entry(backup.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(backup);
                true
            }
        };
        self.calculate();
        inserted
    }

    /// Removes exactly this record, not merely one with an equal key.
    pub fn remove_backup(&mut self, backup: &Arc<Backup>) -> bool {
        let key = backup.key();
        let removed = match self.backups.get(&key) {
            Some(stored) if Arc::ptr_eq(stored, backup) => self.backups.remove(&key).is_some(),
            _ => false,
        };
        if removed {
            self.calculate();
        }
        removed
    }

    /// All records, oldest first; ties on date are ordered by device name.
    pub fn backups(&self) -> impl Iterator<Item = &Arc<Backup>> {
        self.backups.values()
    }

    pub fn len(&self) -> usize {
        self.backups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backups.is_empty()
    }

    pub fn per_device<S: AsRef<str>>(&self, device: S) -> Option<&PerDevice> {
        self.per_device.get(device.as_ref())
    }

    pub fn devices(&self) -> impl Iterator<Item = (&Arc<str>, &PerDevice)> {
        self.per_device.iter()
    }

    /// Counts one more backup on `device` as pending removal.
    pub fn mark_for_removal<S: AsRef<str>>(&mut self, device: S) {
        if let Some(pd) = self.per_device.get_mut(device.as_ref()) {
            pd.to_be_removed += 1;
        }
    }

    pub fn clear_marks(&mut self) {
        self.per_device
            .values_mut()
            .for_each(|pd| pd.to_be_removed = 0);
    }

    fn calculate(&mut self) {
        self.completed = 0;
        self.oldest = None;
        self.newest = None;
        self.per_device.clear();
        for backup in self.backups.values().filter(|b| b.is_complete()) {
            let date = backup.date;
            self.completed += 1;
            self.oldest = Some(self.oldest.map_or(date, |d| d.min(date)));
            self.newest = Some(self.newest.map_or(date, |d| d.max(date)));
            self.per_device
                .entry(backup.device.clone())
                .and_modify(|pd| pd.include(date))
                .or_insert_with(|| PerDevice::new(date));
        }
    }
}
