//! Test doubles and common utilities for contract tests
//!
//! This module provides listeners that record or misbehave on purpose, a
//! registry whose notifications are scripted by the test, and builders for
//! access config payloads.

#![allow(dead_code)]

use cordconfig_core::error::Result;
use cordconfig_core::model::{ACCESS_AGENT_CONFIG_KEY, ACCESS_DEVICE_CONFIG_KEY, DeviceId};
use cordconfig_core::traits::{
    ConfigFactory, NetworkConfig, NetworkConfigEvent, NetworkConfigListener,
    NetworkConfigRegistry,
};
use cordconfig_core::{
    CordConfigEvent, CordConfigEventType, CordConfigListener, CordConfigManager,
    CordConfigService, ManagerConfig, MemoryConfigRegistry,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Listener that records every event it receives
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<CordConfigEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every event received so far
    pub fn events(&self) -> Vec<CordConfigEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Types of every event received so far
    pub fn kinds(&self) -> Vec<CordConfigEventType> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.kind())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl CordConfigListener for RecordingListener {
    fn event(&self, event: &CordConfigEvent) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Listener that fails on every event
#[derive(Default)]
pub struct FailingListener {
    calls: AtomicUsize,
}

impl FailingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CordConfigListener for FailingListener {
    fn event(&self, event: &CordConfigEvent) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("refusing {}", event.kind())
    }
}

/// Listener that panics on every event
#[derive(Default)]
pub struct PanickingListener {
    calls: AtomicUsize,
}

impl PanickingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CordConfigListener for PanickingListener {
    fn event(&self, event: &CordConfigEvent) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        panic!("listener blew up on {}", event.kind());
    }
}

/// Registry whose notifications are pushed by the test
///
/// Unlike [`MemoryConfigRegistry`] it lets a test deliver any notification
/// shape, including updates that move a record to another subject.
#[derive(Default)]
pub struct ScriptedRegistry {
    factories: Mutex<Vec<String>>,
    listeners: Mutex<Vec<Arc<dyn NetworkConfigListener>>>,
    configs: Mutex<HashMap<(String, DeviceId), NetworkConfig>>,
}

impl ScriptedRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver `event` to every attached listener
    pub fn emit(&self, event: NetworkConfigEvent) {
        let listeners = self.listeners.lock().unwrap().clone();
        for listener in listeners.iter().filter(|l| l.is_relevant(&event)) {
            listener.event(&event);
        }
    }

    /// Make `config` visible to lookups without notifying anyone
    pub fn seed(&self, config: NetworkConfig) {
        self.configs.lock().unwrap().insert(
            (config.config_key().to_string(), config.subject().clone()),
            config,
        );
    }

    pub fn factory_keys(&self) -> Vec<String> {
        self.factories.lock().unwrap().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().unwrap().len()
    }
}

impl NetworkConfigRegistry for ScriptedRegistry {
    fn register_config_factory(&self, factory: Arc<dyn ConfigFactory>) -> Result<()> {
        self.factories
            .lock()
            .unwrap()
            .push(factory.config_key().to_string());
        Ok(())
    }

    fn unregister_config_factory(&self, config_key: &str) -> bool {
        let mut factories = self.factories.lock().unwrap();
        let before = factories.len();
        factories.retain(|key| key != config_key);
        factories.len() != before
    }

    fn add_listener(&self, listener: Arc<dyn NetworkConfigListener>) {
        self.listeners.lock().unwrap().push(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn NetworkConfigListener>) -> bool {
        let mut listeners = self.listeners.lock().unwrap();
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }

    fn subjects(&self, config_key: &str) -> Vec<DeviceId> {
        self.configs
            .lock()
            .unwrap()
            .keys()
            .filter(|(key, _)| key == config_key)
            .map(|(_, subject)| subject.clone())
            .collect()
    }

    fn get_config(&self, subject: &DeviceId, config_key: &str) -> Option<NetworkConfig> {
        self.configs
            .lock()
            .unwrap()
            .get(&(config_key.to_string(), subject.clone()))
            .cloned()
    }
}

/// A manager on top of a [`MemoryConfigRegistry`] plus a recording subscriber
pub struct Harness {
    pub registry: Arc<MemoryConfigRegistry>,
    pub manager: Arc<CordConfigManager>,
    pub recorder: Arc<RecordingListener>,
}

impl Harness {
    /// Build an inactive harness
    pub fn new(config: ManagerConfig) -> Self {
        let registry = Arc::new(MemoryConfigRegistry::new());
        let manager = Arc::new(CordConfigManager::new(registry.clone(), config));
        let recorder = RecordingListener::new();
        manager.add_listener(recorder.clone());

        Self {
            registry,
            manager,
            recorder,
        }
    }

    /// Build and activate a harness with the default configuration
    pub fn active() -> Self {
        let harness = Self::new(ManagerConfig::default());
        harness.manager.activate().expect("activation succeeds");
        harness
    }

    pub fn apply_device(&self, id: &str, uplink: u64, vlan: u16) {
        self.registry
            .apply_config(&device(id), ACCESS_DEVICE_CONFIG_KEY, device_node(uplink, vlan));
    }

    pub fn apply_agent(&self, id: &str, agent_mac: &str) {
        self.registry
            .apply_config(&device(id), ACCESS_AGENT_CONFIG_KEY, agent_node(id, agent_mac));
    }
}

pub fn device(id: &str) -> DeviceId {
    DeviceId::new(id)
}

/// Access device payload
pub fn device_node(uplink: u64, vlan: u16) -> Value {
    json!({ "uplink": uplink, "vlan": vlan })
}

/// Access agent payload with one OLT on port 1 of `id`
pub fn agent_node(id: &str, agent_mac: &str) -> Value {
    json!({
        "olts": [{ "port": format!("{}/1", id), "mac": "00:00:00:00:00:01" }],
        "mac": agent_mac,
        "vtn-location": "of:ffff/5",
    })
}

pub fn device_config(id: &str, uplink: u64, vlan: u16) -> NetworkConfig {
    NetworkConfig::new(device(id), ACCESS_DEVICE_CONFIG_KEY, device_node(uplink, vlan))
}

pub fn agent_config(id: &str, agent_mac: &str) -> NetworkConfig {
    NetworkConfig::new(device(id), ACCESS_AGENT_CONFIG_KEY, agent_node(id, agent_mac))
}
