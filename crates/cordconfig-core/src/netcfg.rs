// # Network Config Documents
//
// JSON documents describing the configs to hold in a `MemoryConfigRegistry`,
// grouped by subject class, then subject, then config key.
//
// ## File Format
//
// ```json
// {
//   "devices": {
//     "of:0000000000000001": {
//       "accessDevice": { "uplink": "2", "vlan": "222", "defaultVlan": "1" },
//       "accessAgent": {
//         "olts": [{ "port": "of:0000000000000001/1", "mac": "00:00:00:00:00:01" }],
//         "mac": "00:00:00:00:00:02",
//         "vtn-location": "of:0000000000000002/5"
//       }
//     }
//   }
// }
// ```
//
// Payloads are not validated here; the consumer of each config key decides
// what a valid payload is.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::model::{ACCESS_AGENT_CONFIG_KEY, ACCESS_DEVICE_CONFIG_KEY, DeviceId};
use crate::registry::MemoryConfigRegistry;

/// A parsed network config document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfigDocument {
    #[serde(default)]
    devices: BTreeMap<DeviceId, BTreeMap<String, Value>>,
}

/// Outcome of [`NetworkConfigDocument::sync`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// Configs applied from the document
    pub applied: usize,
    /// Stored configs removed because the document no longer has them
    pub removed: usize,
}

impl NetworkConfigDocument {
    /// Read and parse the document at `path`
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read network config {}: {}",
                path.display(),
                e
            ))
        })?;

        let document: Self = content.parse()?;
        debug!(
            "Loaded {} config(s) for {} device(s) from {}",
            document.len(),
            document.devices.len(),
            path.display()
        );
        Ok(document)
    }

    /// Payload stored for `subject` under `config_key`
    pub fn config(&self, subject: &DeviceId, config_key: &str) -> Option<&Value> {
        self.devices.get(subject)?.get(config_key)
    }

    /// Subjects present in the document
    pub fn subjects(&self) -> impl Iterator<Item = &DeviceId> {
        self.devices.keys()
    }

    /// Total number of configs across all subjects
    pub fn len(&self) -> usize {
        self.devices.values().map(BTreeMap::len).sum()
    }

    /// Whether the document holds no configs
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply every config of the document, returning how many were applied
    pub fn apply_to(&self, registry: &MemoryConfigRegistry) -> usize {
        let mut applied = 0;
        for (subject, configs) in &self.devices {
            for (config_key, node) in configs {
                registry.apply_config(subject, config_key, node.clone());
                applied += 1;
            }
        }
        applied
    }

    /// Make `registry` match the document
    ///
    /// Applies every config, then removes stored configs the document no
    /// longer has. Only config keys that appear in the document, plus the
    /// access device and access agent keys, are considered for removal.
    pub fn sync(&self, registry: &MemoryConfigRegistry) -> SyncSummary {
        let applied = self.apply_to(registry);

        let mut removed = 0;
        for config_key in self.managed_keys() {
            for subject in registry.stored_subjects(&config_key) {
                if self.config(&subject, &config_key).is_none()
                    && registry.remove_config(&subject, &config_key).is_some()
                {
                    removed += 1;
                }
            }
        }

        info!(
            "Synchronized network config: {} applied, {} removed",
            applied, removed
        );
        SyncSummary { applied, removed }
    }

    fn managed_keys(&self) -> BTreeSet<String> {
        let mut keys: BTreeSet<String> = self
            .devices
            .values()
            .flat_map(|configs| configs.keys().cloned())
            .collect();
        keys.insert(ACCESS_DEVICE_CONFIG_KEY.to_string());
        keys.insert(ACCESS_AGENT_CONFIG_KEY.to_string());
        keys
    }
}

impl FromStr for NetworkConfigDocument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AccessConfigFactory;
    use crate::traits::NetworkConfigRegistry;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    const DOCUMENT: &str = r#"{
        "devices": {
            "of:1": {
                "accessDevice": { "uplink": "2", "vlan": "222" },
                "basic": { "name": "olt-1" }
            },
            "of:2": {
                "accessAgent": { "mac": "00:00:00:00:00:02" }
            }
        }
    }"#;

    #[test]
    fn test_parse() {
        let document: NetworkConfigDocument = DOCUMENT.parse().unwrap();

        assert_eq!(document.len(), 3);
        assert_eq!(document.subjects().count(), 2);
        assert_eq!(
            document.config(&DeviceId::new("of:1"), ACCESS_DEVICE_CONFIG_KEY),
            Some(&json!({ "uplink": "2", "vlan": "222" }))
        );
        assert!(document.config(&DeviceId::new("of:2"), ACCESS_DEVICE_CONFIG_KEY).is_none());
    }

    #[test]
    fn test_parse_rejects_bad_device_id() {
        let result = r#"{"devices": {"nocolon": {}}}"#.parse::<NetworkConfigDocument>();
        assert!(matches!(result, Err(Error::Json(_))));
    }

    #[test]
    fn test_empty_document() {
        let document: NetworkConfigDocument = "{}".parse().unwrap();
        assert!(document.is_empty());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("netcfg.json");
        tokio::fs::write(&path, DOCUMENT).await.unwrap();

        let document = NetworkConfigDocument::load(&path).await.unwrap();
        assert_eq!(document.len(), 3);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = NetworkConfigDocument::load(dir.path().join("missing.json")).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_sync_removes_stale_configs() {
        let registry = MemoryConfigRegistry::new();
        registry
            .register_config_factory(Arc::new(AccessConfigFactory::access_device()))
            .unwrap();

        let stale = DeviceId::new("of:9");
        registry.apply_config(&stale, ACCESS_DEVICE_CONFIG_KEY, json!({ "uplink": 1, "vlan": 1 }));
        registry.apply_config(&stale, "other", json!({}));

        let document: NetworkConfigDocument = DOCUMENT.parse().unwrap();
        let summary = document.sync(&registry);

        assert_eq!(summary, SyncSummary { applied: 3, removed: 1 });
        assert_eq!(
            registry.subjects(ACCESS_DEVICE_CONFIG_KEY),
            vec![DeviceId::new("of:1")]
        );
        // Keys the document never mentions are left alone
        assert_eq!(registry.stored_subjects("other"), vec![stale]);
    }
}
