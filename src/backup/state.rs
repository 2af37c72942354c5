//! In-memory view of every configured volume and its backups, rebuilt from
//! the per-backup log files.

use crate::backup::backup_config::{Config, VolumeConfig};
use crate::backup::calendar::Date;
use crate::backup::function_path;
use crate::backup::ledger::{Backup, VolumeLedger};
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::{AddFunctionName, AddMsg};
use function_name::named;
use getset::{CopyGetters, Getters, MutGetters};
use std::collections::BTreeMap;
use std::fs::read_dir;
use std::path::Path;
use std::sync::Arc;

/// Prefix of the last log line of a failed backup
pub static ERROR_PREFIX: &str = "ERROR:";

/// A volume with its retention policy and backup history
#[derive(Clone, Debug, Getters, CopyGetters, MutGetters)]
pub struct Volume {
    #[getset(get = "pub")]
    host: Arc<str>,
    #[getset(get = "pub")]
    name: Arc<str>,
    #[getset(get_copy = "pub")]
    prune_age: i32,
    #[getset(get_copy = "pub")]
    min_backups: usize,
    #[getset(get = "pub", get_mut = "pub")]
    ledger: VolumeLedger,
}

impl Volume {
    pub fn new<H: Into<Arc<str>>, N: Into<Arc<str>>>(host: H, name: N, config: &VolumeConfig) -> Self {
        Self {
            host: host.into(),
            name: name.into(),
            prune_age: config.prune_age(),
            min_backups: config.min_backups(),
            ledger: VolumeLedger::default(),
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct BackupState {
    hosts: BTreeMap<Arc<str>, BTreeMap<Arc<str>, Volume>>,
}

impl BackupState {
    /// Every configured volume, with no backups yet
    pub fn from_config(config: &Config) -> Self {
        let hosts = config
            .hosts()
            .iter()
            .map(|(host_name, host)| {
                let host_name: Arc<str> = host_name.as_str().into();
                let volumes = host
                    .volumes()
                    .iter()
                    .map(|(volume_name, volume)| {
                        let volume = Volume::new(host_name.clone(), volume_name.as_str(), volume);
                        (volume.name.clone(), volume)
                    })
                    .collect();
                (host_name, volumes)
            })
            .collect();
        Self { hosts }
    }

    /// Loads every backup recorded in the log directory
    #[named]
    pub fn read_state(config: &Config) -> Result<Self> {
        let mut state = Self::from_config(config);
        let logs = config.logs();
        tracing::info!("Reading backup state from {:?}", logs);
        let entries = read_dir(logs)
            .map_err(Error::from)
            .add_msg(format!("Reading log directory {:?} failed", logs))
            .add_fn_name(function_path!())?;
        for entry in entries {
            let path = entry?.path();
            let Some((date, device, host, volume)) = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(split_log_file_name)
            else {
                tracing::trace!("Skipping {:?}, not a backup log", path);
                continue;
            };
            let date: Date = date.parse().add_fn_name(function_path!())?;
            let rc = read_outcome(&path)?;
            let backup = Backup::builder()
                .host(host)
                .volume(volume)
                .device(device)
                .date(date)
                .rc(rc)
                .build();
            if !config.has_device(device) {
                tracing::warn!("Backup log {:?} names unknown device {device:?}", path);
            }
            if state.volume(host, volume).is_none() {
                tracing::warn!("Backup log {:?} names unknown volume {host}:{volume}", path);
                continue;
            }
            if !state.add_backup(backup) {
                tracing::warn!("Ignoring duplicate backup log {:?}", path);
            }
        }
        Ok(state)
    }

    pub fn volume<H: AsRef<str>, N: AsRef<str>>(&self, host: H, name: N) -> Option<&Volume> {
        self.hosts.get(host.as_ref())?.get(name.as_ref())
    }

    pub fn volume_mut<H: AsRef<str>, N: AsRef<str>>(
        &mut self,
        host: H,
        name: N,
    ) -> Option<&mut Volume> {
        self.hosts.get_mut(host.as_ref())?.get_mut(name.as_ref())
    }

    pub fn volumes(&self) -> impl Iterator<Item = &Volume> {
        self.hosts.values().flat_map(BTreeMap::values)
    }

    pub fn volumes_mut(&mut self) -> impl Iterator<Item = &mut Volume> {
        self.hosts.values_mut().flat_map(BTreeMap::values_mut)
    }

    /// Files `backup` under its volume. Returns false if the volume is not
    /// configured or already has a backup for that date and device.
    pub fn add_backup<B: Into<Arc<Backup>>>(&mut self, backup: B) -> bool {
        let backup = backup.into();
        match self.volume_mut(backup.host(), backup.volume()) {
            Some(volume) => volume.ledger.add_backup(backup),
            None => false,
        }
    }

    pub fn remove_backup(&mut self, backup: &Arc<Backup>) -> bool {
        self.volume_mut(backup.host(), backup.volume())
            .is_some_and(|volume| volume.ledger.remove_backup(backup))
    }
}

/// Splits `<YYYY-MM-DD>-<device>-<host>-<volume>.log` into its parts.
///
/// None of the names may contain '-', so the split is unambiguous. The date
/// part is only checked for shape here.
fn split_log_file_name(name: &str) -> Option<(String, &str, &str, &str)> {
    let stem = name.strip_suffix(".log")?;
    let parts: Vec<&str> = stem.split('-').collect();
    let [y, m, d, device, host, volume] = parts.as_slice() else {
        return None;
    };
    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !(numeric(*y) && numeric(*m) && numeric(*d)) {
        return None;
    }
    if device.is_empty() || host.is_empty() || volume.is_empty() {
        return None;
    }
    Some((format!("{y}-{m}-{d}"), *device, *host, *volume))
}

/// Exit status recorded in a backup log: failed if the last non-empty line is
/// an error report.
fn read_outcome(path: &Path) -> Result<i32> {
    let content = std::fs::read_to_string(path)
        .map_err(Error::from)
        .add_msg(format!("Reading backup log {:?} failed", path))?;
    let failed = content
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .is_some_and(|l| l.starts_with(ERROR_PREFIX));
    Ok(if failed { 1 } else { 0 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::backup_config::HostConfig;
    use tempfile::TempDir;

    fn config(logs: &Path) -> Config {
        let mut volumes = BTreeMap::new();
        volumes.insert(
            "root".to_string(),
            VolumeConfig::builder().path("/").prune_age(10).build(),
        );
        let mut hosts = BTreeMap::new();
        hosts.insert("host1".to_string(), HostConfig::builder().volumes(volumes).build());
        Config::builder()
            .logs(logs)
            .devices(vec!["dev0".to_string()])
            .hosts(hosts)
            .build()
    }

    #[test]
    fn test_split_log_file_name() {
        assert_eq!(
            split_log_file_name("2024-02-29-dev0-host.example-root.log"),
            Some(("2024-02-29".to_string(), "dev0", "host.example", "root"))
        );
        assert_eq!(split_log_file_name("prune-2024-02-29.log"), None);
        assert_eq!(split_log_file_name("2024-02-29-dev0-host-root.txt"), None);
        assert_eq!(split_log_file_name("2024-02-29-dev0-host.log"), None);
        assert_eq!(split_log_file_name("2024-02-29-dev0--root.log"), None);
    }

    #[test]
    fn test_read_state() {
        let temp_dir = TempDir::new().unwrap();
        let logs = temp_dir.path();
        std::fs::write(logs.join("2024-01-01-dev0-host1-root.log"), "ok\n").unwrap();
        std::fs::write(
            logs.join("2024-01-02-dev0-host1-root.log"),
            "copying\nERROR: rsync exited with status 23\n\n",
        )
        .unwrap();
        std::fs::write(logs.join("2024-01-03-dev0-host1-other.log"), "").unwrap();
        std::fs::write(logs.join("prune-2024-01-03.log"), "").unwrap();

        let state = BackupState::read_state(&config(logs)).unwrap();
        let volume = state.volume("host1", "root").unwrap();
        assert_eq!(volume.prune_age(), 10);
        assert_eq!(volume.ledger().len(), 2);
        assert_eq!(volume.ledger().completed(), 1);
        let rcs: Vec<_> = volume.ledger().backups().map(|b| b.rc()).collect();
        assert_eq!(rcs, [0, 1]);
        assert!(state.volume("host1", "other").is_none());
    }

    #[test]
    fn test_read_state_rejects_invalid_date() {
        let temp_dir = TempDir::new().unwrap();
        let logs = temp_dir.path();
        std::fs::write(logs.join("2023-02-29-dev0-host1-root.log"), "").unwrap();

        let err = BackupState::read_state(&config(logs)).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("day out of range"));
    }

    #[test]
    fn test_remove_backup() {
        let temp_dir = TempDir::new().unwrap();
        let mut state = BackupState::from_config(&config(temp_dir.path()));
        let backup = Arc::new(
            Backup::builder()
                .host("host1")
                .volume("root")
                .device("dev0")
                .date("2024-01-01".parse().unwrap())
                .build(),
        );
        assert!(state.add_backup(backup.clone()));
        assert!(state.remove_backup(&backup));
        assert!(!state.remove_backup(&backup));
        assert!(state.volume("host1", "root").unwrap().ledger().is_empty());
    }
}
