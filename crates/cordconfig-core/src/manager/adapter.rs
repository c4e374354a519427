//! Upstream notification → store mutation → CORD config event
//!
//! ```text
//! NetworkConfigEvent ──► ConfigSyncListener ──► RecordStore (put/remove)
//!                                   │
//!                                   └──────────► ListenerRegistry::publish
//! ```
//!
//! The store is always mutated before the event is published, so a
//! subscriber querying the view from inside its handler sees the change.
//!
//! ## Ordering
//!
//! Live notifications and reconciliation lookups run one at a time under
//! the adapter's dispatch lock. Upstream applies a change before notifying
//! about it, so a lookup made under the lock either sees a change whose
//! notification comes after it, or one whose notification was already
//! handled. Either way the last write to the store matches upstream.
//!
//! ## Undecodable Configs
//!
//! A config that cannot be decoded counts as "no usable config" for its
//! subject: any record stored for that subject is dropped and a removal is
//! published. A previous config that cannot be decoded never blocks the
//! change that replaces it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace, warn};

use crate::event::CordConfigEvent;
use crate::listener::ListenerRegistry;
use crate::model::{ACCESS_AGENT_CONFIG_KEY, ACCESS_DEVICE_CONFIG_KEY, AccessRecord, DeviceId};
use crate::store::{AccessStores, RecordStore};
use crate::traits::{
    ConfigEventType, NetworkConfig, NetworkConfigEvent, NetworkConfigListener,
    NetworkConfigRegistry,
};

/// Config families owned by this adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigKind {
    AccessDevice,
    AccessAgent,
}

impl ConfigKind {
    fn from_key(config_key: &str) -> Option<Self> {
        match config_key {
            ACCESS_DEVICE_CONFIG_KEY => Some(ConfigKind::AccessDevice),
            ACCESS_AGENT_CONFIG_KEY => Some(ConfigKind::AccessAgent),
            _ => None,
        }
    }
}

/// Listener attached to the upstream registry
pub(crate) struct ConfigSyncListener {
    stores: Arc<AccessStores>,
    listeners: Arc<ListenerRegistry>,

    /// Held while a notification or reconciliation lookup is applied
    dispatch: Mutex<()>,
}

impl ConfigSyncListener {
    pub(crate) fn new(stores: Arc<AccessStores>, listeners: Arc<ListenerRegistry>) -> Self {
        Self {
            stores,
            listeners,
            dispatch: Mutex::new(()),
        }
    }

    /// Look up the current `config_key` config of `subject` and apply it as
    /// an addition
    ///
    /// The lookup happens under the dispatch lock, so `registry` must not
    /// deliver notifications to this adapter from inside `get_config`.
    /// Returns `false` if the registry no longer holds the config.
    pub(crate) fn reconcile_subject(
        &self,
        registry: &dyn NetworkConfigRegistry,
        subject: &DeviceId,
        config_key: &str,
    ) -> bool {
        let _dispatch = self.lock();
        match registry.get_config(subject, config_key) {
            Some(config) => {
                self.dispatch(&NetworkConfigEvent::added(config));
                true
            }
            None => {
                debug!("{} config for {} disappeared before lookup", config_key, subject);
                false
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.dispatch.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, event: &NetworkConfigEvent) {
        let devices = &self.stores.devices;
        let agents = &self.stores.agents;

        match (ConfigKind::from_key(&event.config_key), event.event_type) {
            (Some(ConfigKind::AccessDevice), ConfigEventType::ConfigAdded) => {
                self.add(devices, event)
            }
            (Some(ConfigKind::AccessDevice), ConfigEventType::ConfigUpdated) => {
                self.update(devices, event)
            }
            (Some(ConfigKind::AccessDevice), ConfigEventType::ConfigRemoved) => {
                self.remove(devices, event)
            }
            (Some(ConfigKind::AccessAgent), ConfigEventType::ConfigAdded) => {
                self.add(agents, event)
            }
            (Some(ConfigKind::AccessAgent), ConfigEventType::ConfigUpdated) => {
                self.update(agents, event)
            }
            (Some(ConfigKind::AccessAgent), ConfigEventType::ConfigRemoved) => {
                self.remove(agents, event)
            }
            _ => trace!(
                "Ignoring {:?} for config key '{}' (subject {:?}, at {})",
                event.event_type, event.config_key, event.subject, event.time
            ),
        }
    }

    fn add<R: AccessRecord>(&self, store: &RecordStore<R>, event: &NetworkConfigEvent) {
        let Some(config) = required(event, event.config.as_ref(), "config") else {
            return;
        };
        let Some(record) = decode::<R>(event, config) else {
            self.discard(store, config.subject());
            return;
        };

        debug!("Adding {} for {}", R::CONFIG_KEY, record.device_id());
        store.put(record.device_id().clone(), record.clone());
        self.listeners.publish(&CordConfigEvent::added(record));
    }

    fn update<R: AccessRecord>(&self, store: &RecordStore<R>, event: &NetworkConfigEvent) {
        let Some(prev_subject) = prev_subject(event) else {
            return;
        };
        let Some(config) = required(event, event.config.as_ref(), "config") else {
            return;
        };

        let Some(record) = decode::<R>(event, config) else {
            self.discard(store, prev_subject);
            return;
        };

        // The previous subject is the key to drop; the new record may live
        // under a different one.
        store.remove(prev_subject);
        store.put(record.device_id().clone(), record.clone());

        // Subscribers never saw a record for an undecodable previous config.
        match event.prev_config.as_ref().and_then(decode_quietly::<R>) {
            Some(prev_record) => {
                debug!(
                    "Updating {} for {} (was {})",
                    R::CONFIG_KEY,
                    record.device_id(),
                    prev_record.device_id()
                );
                self.listeners.publish(&CordConfigEvent::updated(record, prev_record));
            }
            None => {
                debug!(
                    "Adding {} for {} (previous config unusable)",
                    R::CONFIG_KEY,
                    record.device_id()
                );
                self.listeners.publish(&CordConfigEvent::added(record));
            }
        }
    }

    fn remove<R: AccessRecord>(&self, store: &RecordStore<R>, event: &NetworkConfigEvent) {
        let Some(prev_subject) = prev_subject(event) else {
            return;
        };

        let stored = store.remove(prev_subject);
        match event.prev_config.as_ref().and_then(decode_quietly::<R>).or(stored) {
            Some(prev_record) => {
                debug!("Removing {} for {}", R::CONFIG_KEY, prev_record.device_id());
                self.listeners.publish(&CordConfigEvent::removed(prev_record));
            }
            None => trace!(
                "Nothing to remove for unusable {} config of {}",
                R::CONFIG_KEY,
                prev_subject
            ),
        }
    }

    /// Drop the record stored for `subject`, publishing its removal
    fn discard<R: AccessRecord>(&self, store: &RecordStore<R>, subject: &DeviceId) {
        if let Some(stale) = store.remove(subject) {
            debug!("Dropping {} for {}: upstream config unusable", R::CONFIG_KEY, subject);
            self.listeners.publish(&CordConfigEvent::removed(stale));
        }
    }
}

fn required<'a>(
    event: &NetworkConfigEvent,
    config: Option<&'a NetworkConfig>,
    field: &str,
) -> Option<&'a NetworkConfig> {
    if config.is_none() {
        warn!(
            "Skipping {:?} for '{}': notification has no {}",
            event.event_type, event.config_key, field
        );
    }
    config
}

/// Subject whose stored record a change replaces, falling back to the
/// notification's own subject when it carries no previous config
fn prev_subject(event: &NetworkConfigEvent) -> Option<&DeviceId> {
    let subject = event
        .prev_config
        .as_ref()
        .map(NetworkConfig::subject)
        .or(event.subject.as_ref());
    if subject.is_none() {
        warn!(
            "Skipping {:?} for '{}': notification names no subject",
            event.event_type, event.config_key
        );
    }
    subject
}

fn decode<R: AccessRecord>(event: &NetworkConfigEvent, config: &NetworkConfig) -> Option<R> {
    match R::from_config(config) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(
                "Rejecting {:?} applied at {}: {}",
                event.event_type, event.time, e
            );
            None
        }
    }
}

// Previous configs were already reported when they arrived.
fn decode_quietly<R: AccessRecord>(config: &NetworkConfig) -> Option<R> {
    R::from_config(config).ok()
}

impl NetworkConfigListener for ConfigSyncListener {
    fn event(&self, event: &NetworkConfigEvent) {
        let _dispatch = self.lock();
        self.dispatch(event);
    }

    fn is_relevant(&self, event: &NetworkConfigEvent) -> bool {
        ConfigKind::from_key(&event.config_key).is_some()
    }
}
