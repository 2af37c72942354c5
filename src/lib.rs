//! # backup-orchestrator
//!
//! Retention and scheduling core for unattended backups of many hosts and
//! volumes onto removable storage devices.
//!
//! ## Features
//!
//! - **Resource scheduling**: Long-running actions run concurrently unless they
//!   share a resource label such as a device name
//! - **Retention**: Per-volume age and minimum-count-per-device policies
//! - **Crash-safe deletion**: Backups are marked incomplete before removal and
//!   every outcome is recorded in a dated prune log
//! - **State from logs**: Backup history is rebuilt from per-backup log files
//!
//! ## Quick Start
//!
//! ```no_run
//! use backup_orchestrator::backup::backup_config::Config;
//! use backup_orchestrator::backup::device::DeviceMap;
//! use backup_orchestrator::backup::process::SystemRunner;
//! use backup_orchestrator::backup::prune::Pruner;
//! use backup_orchestrator::backup::state::BackupState;
//! use std::sync::Arc;
//!
//! let config = Arc::new(Config::load("/etc/backup/config.yml")?);
//! let mut state = BackupState::read_state(&config)?;
//! let pruner = Pruner::builder()
//!     .config(config.clone())
//!     .runner(Arc::new(SystemRunner))
//!     .pool(Arc::new(rayon::ThreadPoolBuilder::new().build()?))
//!     .build();
//! let report = pruner.prune(&mut state, || DeviceMap::identify(&config))?;
//! println!("removed {} backups", report.removed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod backup;
