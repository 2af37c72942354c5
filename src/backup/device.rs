//! Finding where each device is currently mounted.

use crate::backup::backup_config::Config;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File at the root of a store naming the device mounted there
pub static DEVICE_ID_FILE: &str = "device-id";

/// Maps a device name to the store it is currently available at
pub trait StoreLocator {
    /// `None` means the device is not available right now, which is not an error.
    fn locate(&self, device: &str) -> Option<&Path>;
}

/// Devices found in the configured stores
#[derive(Clone, Debug, Default)]
pub struct DeviceMap {
    stores: BTreeMap<Arc<str>, PathBuf>,
}

impl DeviceMap {
    /// Looks in every configured store for a device id.
    ///
    /// Unavailable stores and unknown or duplicate devices are warned about
    /// and left out.
    pub fn identify(config: &Config) -> Self {
        let mut map = DeviceMap::default();
        for store in config.stores() {
            let id_path = store.join(DEVICE_ID_FILE);
            let device = match std::fs::read_to_string(&id_path) {
                Ok(content) => content.lines().next().unwrap_or("").trim().to_string(),
                Err(e) => {
                    tracing::warn!("Store {:?} unavailable: {e}", store);
                    continue;
                }
            };
            if !config.has_device(&device) {
                tracing::warn!("Store {:?} has unknown device {device:?}", store);
                continue;
            }
            if let Some(existing) = map.stores.get(device.as_str()) {
                tracing::warn!(
                    "Device {device:?} found in both {:?} and {:?}, using the first",
                    existing,
                    store
                );
                continue;
            }
            tracing::info!("Found device {device:?} at {:?}", store);
            map.insert(device, store.clone());
        }
        map
    }

    pub fn insert<D: Into<Arc<str>>, P: Into<PathBuf>>(&mut self, device: D, store: P) {
        self.stores.insert(device.into(), store.into());
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl StoreLocator for DeviceMap {
    fn locate(&self, device: &str) -> Option<&Path> {
        self.stores.get(device).map(PathBuf::as_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_identify() {
        let temp_dir = TempDir::new().unwrap();
        let store = |name: &str, id: Option<&str>| {
            let path = temp_dir.path().join(name);
            std::fs::create_dir(&path).unwrap();
            if let Some(id) = id {
                std::fs::write(path.join(DEVICE_ID_FILE), format!("{id}\n")).unwrap();
            }
            path
        };
        let stores = vec![
            store("a", Some("dev0")),
            store("b", None),
            store("c", Some("stranger")),
            store("d", Some("dev0")),
            store("e", Some("dev1")),
            temp_dir.path().join("missing"),
        ];
        let config = Config::builder()
            .logs(temp_dir.path())
            .stores(stores)
            .devices(vec!["dev0".to_string(), "dev1".to_string()])
            .build();

        let map = DeviceMap::identify(&config);
        assert_eq!(map.len(), 2);
        assert_eq!(map.locate("dev0"), Some(temp_dir.path().join("a").as_path()));
        assert_eq!(map.locate("dev1"), Some(temp_dir.path().join("e").as_path()));
        assert_eq!(map.locate("stranger"), None);
    }
}
