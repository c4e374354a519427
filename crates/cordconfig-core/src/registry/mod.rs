//! In-memory network config registry
//!
//! [`MemoryConfigRegistry`] is a complete [`NetworkConfigRegistry`] that
//! keeps every config in process memory. The daemon feeds it from a netcfg
//! document; tests drive it directly.
//!
//! ## Usage
//!
//! ```rust
//! use cordconfig_core::registry::MemoryConfigRegistry;
//! use cordconfig_core::model::{AccessConfigFactory, DeviceId};
//! use cordconfig_core::traits::NetworkConfigRegistry;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let registry = MemoryConfigRegistry::new();
//! let device = DeviceId::new("of:1");
//!
//! // Held back until a factory for the key exists
//! registry.apply_config(&device, "accessDevice", json!({ "uplink": 1, "vlan": 10 }));
//! assert!(registry.subjects("accessDevice").is_empty());
//!
//! registry
//!     .register_config_factory(Arc::new(AccessConfigFactory::access_device()))
//!     .unwrap();
//! assert_eq!(registry.subjects("accessDevice"), vec![device]);
//! ```
//!
//! ## Pending Configs
//!
//! A config applied for a key with no registered factory is stored but not
//! visible: `subjects()` and `get_config()` skip it and no notification is
//! sent. Registering the factory makes it visible, again without an ADDED
//! notification. Consumers that register a schema are expected to look up
//! what already exists.
//!
//! ## Notifications
//!
//! Changes are applied and announced one at a time under a dispatch lock,
//! and listeners are called synchronously on the thread making the change.
//! Listeners may read from the registry but must not change it.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::model::DeviceId;
use crate::traits::{
    ConfigEventType, ConfigFactory, NetworkConfig, NetworkConfigEvent, NetworkConfigListener,
    NetworkConfigRegistry, same_listener,
};
use serde_json::Value;

#[derive(Default)]
struct Inner {
    /// Registered factories by config key
    factories: HashMap<String, Arc<dyn ConfigFactory>>,

    /// Stored configs by config key, then subject
    configs: HashMap<String, BTreeMap<DeviceId, NetworkConfig>>,
}

impl Inner {
    fn is_visible(&self, config_key: &str) -> bool {
        self.factories.contains_key(config_key)
    }
}

/// Network config registry held entirely in memory
///
/// ## Thread Safety
///
/// Reads take a shared lock; changes are serialized by the dispatch lock so
/// notifications for the same subject and key arrive in application order.
#[derive(Default)]
pub struct MemoryConfigRegistry {
    inner: RwLock<Inner>,

    listeners: RwLock<Vec<Arc<dyn NetworkConfigListener>>>,

    /// Held for the whole apply-then-notify sequence of a change
    dispatch: Mutex<()>,
}

impl MemoryConfigRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `node` as the `config_key` config of `subject`
    ///
    /// Sends CONFIG_ADDED for a new config and CONFIG_UPDATED when it
    /// replaces a different one. Re-applying an identical config is silent,
    /// as is applying a config whose factory is not registered.
    pub fn apply_config(&self, subject: &DeviceId, config_key: &str, node: Value) -> NetworkConfig {
        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let (config, prev, visible) = {
            let mut inner = self.write();
            let config = match inner.factories.get(config_key) {
                Some(factory) => factory.create_config(subject).with_node(node),
                None => NetworkConfig::new(subject.clone(), config_key, node),
            };
            let prev = inner
                .configs
                .entry(config_key.to_string())
                .or_default()
                .insert(subject.clone(), config.clone());
            (config, prev, inner.is_visible(config_key))
        };

        if !visible {
            debug!(
                "Holding {} config for {} until its factory is registered",
                config_key, subject
            );
            return config;
        }

        match prev {
            None => self.notify(&NetworkConfigEvent::added(config.clone())),
            Some(prev) if prev == config => {
                trace!("{} config for {} unchanged", config_key, subject);
            }
            Some(prev) => self.notify(&NetworkConfigEvent::updated(config.clone(), prev)),
        }

        config
    }

    /// Remove the `config_key` config of `subject`
    ///
    /// Sends CONFIG_REMOVED if the config existed and was visible.
    pub fn remove_config(&self, subject: &DeviceId, config_key: &str) -> Option<NetworkConfig> {
        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);

        let (prev, visible) = {
            let mut inner = self.write();
            let prev = inner
                .configs
                .get_mut(config_key)
                .and_then(|configs| configs.remove(subject));
            (prev, inner.is_visible(config_key))
        };

        match &prev {
            Some(prev) if visible => self.notify(&NetworkConfigEvent::removed(prev.clone())),
            Some(_) => debug!("Dropped pending {} config for {}", config_key, subject),
            None => trace!("No {} config for {} to remove", config_key, subject),
        }

        prev
    }

    /// Every subject holding a `config_key` config, pending or not
    pub fn stored_subjects(&self, config_key: &str) -> Vec<DeviceId> {
        self.read()
            .configs
            .get(config_key)
            .map(|configs| configs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether a factory is registered for `config_key`
    pub fn has_factory(&self, config_key: &str) -> bool {
        self.read().is_visible(config_key)
    }

    /// Number of attached listeners
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn notify(&self, event: &NetworkConfigEvent) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        trace!(
            "Notifying {} listener(s) of {:?} for '{}'",
            listeners.len(),
            event.event_type,
            event.config_key
        );

        for listener in listeners.iter().filter(|l| l.is_relevant(event)) {
            listener.event(event);
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl NetworkConfigRegistry for MemoryConfigRegistry {
    fn register_config_factory(&self, factory: Arc<dyn ConfigFactory>) -> Result<()> {
        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        let config_key = factory.config_key().to_string();

        {
            let mut inner = self.write();
            if inner.factories.contains_key(&config_key) {
                return Err(Error::registration(format!(
                    "Config factory for '{}' is already registered",
                    config_key
                )));
            }

            let pending = inner.configs.get(&config_key).map_or(0, BTreeMap::len);
            debug!(
                "Registered {} config factory '{}' ({} stored config(s))",
                factory.subject_class().key(),
                config_key,
                pending
            );
            inner.factories.insert(config_key.clone(), factory);
        }

        self.notify(&NetworkConfigEvent::factory(
            ConfigEventType::ConfigRegistered,
            config_key,
        ));
        Ok(())
    }

    fn unregister_config_factory(&self, config_key: &str) -> bool {
        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);

        if self.write().factories.remove(config_key).is_none() {
            return false;
        }

        debug!("Unregistered config factory '{}'", config_key);
        self.notify(&NetworkConfigEvent::factory(
            ConfigEventType::ConfigUnregistered,
            config_key,
        ));
        true
    }

    fn add_listener(&self, listener: Arc<dyn NetworkConfigListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn NetworkConfigListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        listeners.len() != before
    }

    fn subjects(&self, config_key: &str) -> Vec<DeviceId> {
        let inner = self.read();
        if !inner.is_visible(config_key) {
            return Vec::new();
        }
        inner
            .configs
            .get(config_key)
            .map(|configs| configs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn get_config(&self, subject: &DeviceId, config_key: &str) -> Option<NetworkConfig> {
        let inner = self.read();
        if !inner.is_visible(config_key) {
            return None;
        }
        inner.configs.get(config_key)?.get(subject).cloned()
    }
}
