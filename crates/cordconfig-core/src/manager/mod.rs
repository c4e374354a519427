//! CORD config manager
//!
//! The CordConfigManager is responsible for:
//! - Registering the access device / access agent schemas upstream
//! - Keeping the in-memory view in sync with upstream notifications
//! - Answering queries against that view
//! - Broadcasting a [`CordConfigEvent`] for every change it applies
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────┐
//! │ NetworkConfigRegistry │─── NetworkConfigEvent ───┐
//! └───────────────────────┘                          │
//!            ▲                                       ▼
//!            │ subjects / get_config       ┌───────────────────┐
//!            │ (reconciliation)            │ ConfigSyncListener│
//!            │                             └───────────────────┘
//!            │                                       │
//! ┌───────────────────────┐          ┌───────────────┴──────────────┐
//! │  CordConfigManager    │          ▼                              ▼
//! │  (lifecycle, queries) │   ┌──────────────┐            ┌──────────────────┐
//! └───────────────────────┘   │ AccessStores │            │ ListenerRegistry │
//!                             │ (put/remove) │            │ (publish)        │
//!                             └──────────────┘            └──────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. Create with [`CordConfigManager::new()`]
//! 2. [`CordConfigManager::activate()`] registers the schemas, attaches to
//!    the registry and replays configs that already exist upstream
//! 3. [`CordConfigManager::deactivate()`] unregisters and detaches; the view
//!    is then kept or cleared according to [`DeactivationPolicy`]
//!
//! A deactivated manager can be activated again.

mod adapter;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};
use tracing::{debug, info};

use crate::config::{DeactivationPolicy, ManagerConfig};
use crate::error::{Error, Result};
use crate::event::CordConfigEvent;
use crate::listener::ListenerRegistry;
use crate::model::{
    ACCESS_AGENT_CONFIG_KEY, ACCESS_DEVICE_CONFIG_KEY, AccessAgentData, AccessConfigFactory,
    AccessDeviceData, DeviceId,
};
use crate::store::AccessStores;
use crate::traits::{
    CordConfigListener, CordConfigService, NetworkConfigListener, NetworkConfigRegistry,
};

use adapter::ConfigSyncListener;

/// Synchronizer between the network config registry and the CORD access view
///
/// ## Threading
///
/// Every method takes `&self`. Queries never block on lifecycle transitions;
/// `activate()` and `deactivate()` are serialized against each other.
///
/// Both publish events while the transition is in progress (reconciliation,
/// [`DeactivationPolicy::ClearAndNotify`]). A listener that calls either of
/// them from its handler gets `Error::Lifecycle` back.
pub struct CordConfigManager {
    /// Upstream registry
    registry: Arc<dyn NetworkConfigRegistry>,

    /// Access device / access agent records
    stores: Arc<AccessStores>,

    /// Downstream subscribers
    listeners: Arc<ListenerRegistry>,

    /// Listener attached to `registry` while active
    adapter: Arc<ConfigSyncListener>,

    /// Serializes activate/deactivate
    transition: Mutex<()>,

    /// Thread holding `transition`
    transition_owner: Mutex<Option<ThreadId>>,

    active: AtomicBool,

    config: ManagerConfig,
}

impl CordConfigManager {
    /// Create an inactive manager with its own subscriber registry
    pub fn new(registry: Arc<dyn NetworkConfigRegistry>, config: ManagerConfig) -> Self {
        Self::with_listener_registry(registry, config, Arc::new(ListenerRegistry::new()))
    }

    /// Create an inactive manager publishing through `listeners`
    pub fn with_listener_registry(
        registry: Arc<dyn NetworkConfigRegistry>,
        config: ManagerConfig,
        listeners: Arc<ListenerRegistry>,
    ) -> Self {
        let stores = Arc::new(AccessStores::new());
        let adapter = Arc::new(ConfigSyncListener::new(stores.clone(), listeners.clone()));

        Self {
            registry,
            stores,
            listeners,
            adapter,
            transition: Mutex::new(()),
            transition_owner: Mutex::new(None),
            active: AtomicBool::new(false),
            config,
        }
    }

    /// Whether the manager is attached to the registry
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Start synchronizing
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Schemas registered, listener attached, existing configs applied
    /// - `Err(Error::Registration)`: The registry rejected a schema; nothing
    ///   registered by this call is left behind
    /// - `Err(Error::Lifecycle)`: Already active, or called from a listener
    ///   during a transition
    pub fn activate(&self) -> Result<()> {
        let _transition = self.begin_transition()?;
        if self.is_active() {
            return Err(Error::lifecycle("CORD config manager is already active"));
        }

        self.register_factories()?;
        self.registry.add_listener(self.adapter.clone());
        self.active.store(true, Ordering::SeqCst);

        if self.config.reconcile_on_activate {
            let devices = self.reconcile(ACCESS_DEVICE_CONFIG_KEY);
            let agents = self.reconcile(ACCESS_AGENT_CONFIG_KEY);
            info!(
                "Reconciled {} access device(s) and {} access agent(s)",
                devices, agents
            );
        }

        info!("CORD config manager started");
        Ok(())
    }

    /// Stop synchronizing
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Detached; the view was handled per [`DeactivationPolicy`]
    /// - `Err(Error::Lifecycle)`: Not active, or called from a listener
    ///   during a transition
    pub fn deactivate(&self) -> Result<()> {
        let _transition = self.begin_transition()?;
        if !self.is_active() {
            return Err(Error::lifecycle("CORD config manager is not active"));
        }

        let adapter: Arc<dyn NetworkConfigListener> = self.adapter.clone();
        self.registry.remove_listener(&adapter);
        self.registry.unregister_config_factory(ACCESS_DEVICE_CONFIG_KEY);
        self.registry.unregister_config_factory(ACCESS_AGENT_CONFIG_KEY);
        self.active.store(false, Ordering::SeqCst);

        match self.config.deactivation {
            DeactivationPolicy::Retain => {
                debug!(
                    "Retaining {} access device(s) and {} access agent(s)",
                    self.stores.devices.len(),
                    self.stores.agents.len()
                );
            }
            DeactivationPolicy::ClearAndNotify => self.clear_and_notify(),
        }

        info!("CORD config manager stopped");
        Ok(())
    }

    fn begin_transition(&self) -> Result<Transition<'_>> {
        let current = thread::current().id();
        if *lock(&self.transition_owner) == Some(current) {
            return Err(Error::lifecycle(
                "CORD config manager lifecycle changed from inside a lifecycle change",
            ));
        }

        let guard = lock(&self.transition);
        *lock(&self.transition_owner) = Some(current);
        Ok(Transition {
            _guard: guard,
            owner: &self.transition_owner,
        })
    }

    fn register_factories(&self) -> Result<()> {
        self.registry
            .register_config_factory(Arc::new(AccessConfigFactory::access_device()))?;

        if let Err(e) = self
            .registry
            .register_config_factory(Arc::new(AccessConfigFactory::access_agent()))
        {
            self.registry.unregister_config_factory(ACCESS_DEVICE_CONFIG_KEY);
            return Err(e);
        }

        Ok(())
    }

    /// Feed every config already stored under `config_key` through the
    /// adapter as if it had just been added
    fn reconcile(&self, config_key: &str) -> usize {
        self.registry
            .subjects(config_key)
            .iter()
            .filter(|subject| {
                self.adapter
                    .reconcile_subject(self.registry.as_ref(), subject, config_key)
            })
            .count()
    }

    fn clear_and_notify(&self) {
        let devices = self.stores.devices.drain();
        let agents = self.stores.agents.drain();
        info!(
            "Clearing {} access device(s) and {} access agent(s)",
            devices.len(),
            agents.len()
        );

        for device in devices {
            self.listeners.publish(&CordConfigEvent::removed(device));
        }
        for agent in agents {
            self.listeners.publish(&CordConfigEvent::removed(agent));
        }
    }
}

/// Held for the duration of activate/deactivate
struct Transition<'a> {
    _guard: MutexGuard<'a, ()>,
    owner: &'a Mutex<Option<ThreadId>>,
}

impl Drop for Transition<'_> {
    fn drop(&mut self) {
        // Runs before `_guard` is released
        *lock(self.owner) = None;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn check_device_id(device_id: &DeviceId) -> Result<()> {
    if device_id.is_unset() {
        return Err(Error::invalid_input("Device ID cannot be empty"));
    }
    Ok(())
}

impl CordConfigService for CordConfigManager {
    fn access_devices(&self) -> HashSet<AccessDeviceData> {
        self.stores.devices.all_values()
    }

    fn access_device(&self, device_id: &DeviceId) -> Result<Option<AccessDeviceData>> {
        check_device_id(device_id)?;
        Ok(self.stores.devices.get(device_id))
    }

    fn access_agents(&self) -> HashSet<AccessAgentData> {
        self.stores.agents.all_values()
    }

    fn access_agent(&self, device_id: &DeviceId) -> Result<Option<AccessAgentData>> {
        check_device_id(device_id)?;
        Ok(self.stores.agents.get(device_id))
    }

    fn add_listener(&self, listener: Arc<dyn CordConfigListener>) {
        self.listeners.add_listener(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn CordConfigListener>) -> bool {
        self.listeners.remove_listener(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MemoryConfigRegistry;
    use serde_json::json;

    fn setup(config: ManagerConfig) -> (Arc<MemoryConfigRegistry>, CordConfigManager) {
        let registry = Arc::new(MemoryConfigRegistry::new());
        let manager = CordConfigManager::new(registry.clone(), config);
        (registry, manager)
    }

    #[test]
    fn test_activate_twice_is_rejected() {
        let (_, manager) = setup(ManagerConfig::default());

        manager.activate().unwrap();
        assert!(manager.is_active());
        assert!(matches!(manager.activate(), Err(Error::Lifecycle(_))));
    }

    #[test]
    fn test_deactivate_inactive_is_rejected() {
        let (_, manager) = setup(ManagerConfig::default());
        assert!(matches!(manager.deactivate(), Err(Error::Lifecycle(_))));
    }

    #[test]
    fn test_activate_registers_and_attaches() {
        let (registry, manager) = setup(ManagerConfig::default());

        manager.activate().unwrap();
        assert!(registry.has_factory(ACCESS_DEVICE_CONFIG_KEY));
        assert!(registry.has_factory(ACCESS_AGENT_CONFIG_KEY));
        assert_eq!(registry.listener_count(), 1);

        manager.deactivate().unwrap();
        assert!(!registry.has_factory(ACCESS_DEVICE_CONFIG_KEY));
        assert!(!registry.has_factory(ACCESS_AGENT_CONFIG_KEY));
        assert_eq!(registry.listener_count(), 0);
    }

    #[test]
    fn test_reconcile_can_be_disabled() {
        let (registry, manager) =
            setup(ManagerConfig::default().with_reconcile_on_activate(false));
        registry.apply_config(
            &DeviceId::new("of:1"),
            ACCESS_DEVICE_CONFIG_KEY,
            json!({ "uplink": 1, "vlan": 10 }),
        );

        manager.activate().unwrap();
        assert!(manager.access_devices().is_empty());
    }

    #[test]
    fn test_reactivation_after_deactivate() {
        let (registry, manager) = setup(ManagerConfig::default());
        let device = DeviceId::new("of:1");

        manager.activate().unwrap();
        manager.deactivate().unwrap();
        registry.apply_config(&device, ACCESS_DEVICE_CONFIG_KEY, json!({ "uplink": 2, "vlan": 20 }));
        manager.activate().unwrap();

        let data = manager.access_device(&device).unwrap().unwrap();
        assert_eq!(data.vlan().get(), 20);
    }

    #[test]
    fn test_unset_device_id_is_rejected() {
        let (_, manager) = setup(ManagerConfig::default());

        let err = manager.access_device(&DeviceId::default()).unwrap_err();
        assert_eq!(err.to_string(), "Invalid input: Device ID cannot be empty");
        assert!(manager.access_agent(&DeviceId::new("")).is_err());
    }
}
