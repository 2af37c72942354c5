//! YAML configuration describing hosts, volumes, devices and stores.

use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddMsg;
use crate::backup::validate::{
    validate_device_names, validate_dir_exist_or_created, validate_host_name,
    validate_volume_name,
};
use bon::Builder;
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use validator::{Validate, ValidationError};

pub static DEFAULT_LOGS: &str = "/var/log/backup";
pub static DEFAULT_PRUNE_AGE: i32 = 366;
pub static DEFAULT_MIN_BACKUPS: usize = 1;
pub static DEFAULT_KEEP_PRUNE_LOGS: i32 = 31;

fn default_logs() -> PathBuf {
    PathBuf::from(DEFAULT_LOGS)
}

fn default_prune_age() -> i32 {
    DEFAULT_PRUNE_AGE
}

fn default_min_backups() -> usize {
    DEFAULT_MIN_BACKUPS
}

fn default_keep_prune_logs() -> i32 {
    DEFAULT_KEEP_PRUNE_LOGS
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Per-backup logs and prune logs live here
    #[serde(default = "default_logs")]
    #[validate(custom(function = validate_dir_exist_or_created))]
    #[builder(default = default_logs(), into)]
    #[getset(get = "pub")]
    logs: PathBuf,
    /// Directories where devices may be mounted
    #[serde(default)]
    #[builder(default, into)]
    #[getset(get = "pub")]
    stores: Vec<PathBuf>,
    #[serde(default)]
    #[validate(custom(function = validate_device_names))]
    #[builder(default, into)]
    #[getset(get = "pub")]
    devices: Vec<String>,
    #[serde(default)]
    #[validate(custom(function = validate_hosts))]
    #[builder(default, into)]
    #[getset(get = "pub")]
    hosts: BTreeMap<String, HostConfig>,
    /// Prune logs older than this many days are deleted
    #[serde(default = "default_keep_prune_logs")]
    #[validate(range(min = 0))]
    #[builder(default = default_keep_prune_logs())]
    #[getset(get_copy = "pub")]
    keep_prune_logs: i32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, Builder, Getters)]
#[serde(deny_unknown_fields)]
#[getset(get = "pub")]
pub struct HostConfig {
    #[serde(default)]
    #[builder(default, into)]
    volumes: BTreeMap<String, VolumeConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate, Builder, Getters, CopyGetters)]
#[serde(deny_unknown_fields)]
pub struct VolumeConfig {
    /// Source path on the host
    #[builder(into)]
    #[getset(get = "pub")]
    path: PathBuf,
    /// Backups younger than this many days are never pruned
    #[serde(default = "default_prune_age")]
    #[validate(range(min = 0))]
    #[builder(default = default_prune_age())]
    #[getset(get_copy = "pub")]
    prune_age: i32,
    /// Completed backups to keep on each device regardless of age
    #[serde(default = "default_min_backups")]
    #[builder(default = default_min_backups())]
    #[getset(get_copy = "pub")]
    min_backups: usize,
}

fn validate_hosts(hosts: &BTreeMap<String, HostConfig>) -> std::result::Result<(), ValidationError> {
    for (host_name, host) in hosts {
        validate_host_name(host_name)?;
        for (volume_name, volume) in &host.volumes {
            validate_volume_name(volume_name)?;
            volume.validate().map_err(|e| {
                ValidationError::new("InvalidVolume")
                    .with_message(format!("{host_name}:{volume_name}: {e}").into())
            })?;
        }
    }
    Ok(())
}

impl Config {
    /// Reads and validates a YAML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
        let path = path.as_ref();
        let config = File::open(path)
            .map_err(Error::from)
            .and_then(|f| serde_yml::from_reader::<_, Config>(f).map_err(Error::from))
            .add_msg(format!("Parse YAML config failed: {:?}", path))?;
        config
            .validate()
            .map_err(Error::from)
            .add_msg(format!("Config validation failed: {:?}", path))?;
        Ok(config)
    }

    pub fn has_device<S: AsRef<str>>(&self, device: S) -> bool {
        self.devices.iter().any(|d| d == device.as_ref())
    }
}
