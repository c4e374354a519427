// # Network Config Registry Contract
//
// Defines the upstream side of the synchronizer: the registry that owns
// network configs, the notifications it emits, and the schema factories
// components register with it.
//
// ## Implementations
//
// - In-memory: `crate::registry::MemoryConfigRegistry`
// - Anything else that can emit add/update/remove notifications and answer
//   point lookups by subject
//
// ## Notification Ordering
//
// Implementations must deliver notifications for the same subject and key
// one at a time, in the order the changes were applied. Consumers do not
// reorder or deduplicate.

use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use crate::error::Result;
use crate::model::DeviceId;

/// Kind of subject a config schema applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectClass {
    /// Configs keyed by device id
    Devices,
}

impl SubjectClass {
    /// Name of the subject class in network config documents
    pub fn key(self) -> &'static str {
        match self {
            SubjectClass::Devices => "devices",
        }
    }
}

/// A single network config: the JSON node stored under `config_key` for
/// one subject
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    subject: DeviceId,
    config_key: String,
    node: Value,
}

impl NetworkConfig {
    /// Create a config holding `node`
    pub fn new(subject: DeviceId, config_key: impl Into<String>, node: Value) -> Self {
        Self {
            subject,
            config_key: config_key.into(),
            node,
        }
    }

    /// Create a config with an empty JSON object as its node
    pub fn empty(subject: DeviceId, config_key: impl Into<String>) -> Self {
        Self::new(subject, config_key, Value::Object(Default::default()))
    }

    /// Replace the JSON node
    pub fn with_node(mut self, node: Value) -> Self {
        self.node = node;
        self
    }

    /// Subject this config belongs to
    pub fn subject(&self) -> &DeviceId {
        &self.subject
    }

    /// Schema key of this config
    pub fn config_key(&self) -> &str {
        &self.config_key
    }

    /// Raw JSON node
    pub fn node(&self) -> &Value {
        &self.node
    }
}

/// Type of an upstream config notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigEventType {
    /// A config was added for a subject
    ConfigAdded,
    /// A subject's config was replaced
    ConfigUpdated,
    /// A subject's config was removed
    ConfigRemoved,
    /// A config factory was registered
    ConfigRegistered,
    /// A config factory was unregistered
    ConfigUnregistered,
}

/// Notification emitted by a [`NetworkConfigRegistry`]
///
/// Fields are public so that registries and tests can build any shape of
/// notification, including ones a consumer must tolerate (a missing config,
/// an unknown key).
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfigEvent {
    /// What happened
    pub event_type: ConfigEventType,
    /// Schema key the notification is about
    pub config_key: String,
    /// Subject affected (absent for factory registration events)
    pub subject: Option<DeviceId>,
    /// Config after the change
    pub config: Option<NetworkConfig>,
    /// Config before the change
    pub prev_config: Option<NetworkConfig>,
    /// When the change was applied
    pub time: DateTime<Utc>,
}

impl NetworkConfigEvent {
    /// A config was added
    pub fn added(config: NetworkConfig) -> Self {
        Self {
            event_type: ConfigEventType::ConfigAdded,
            config_key: config.config_key().to_string(),
            subject: Some(config.subject().clone()),
            config: Some(config),
            prev_config: None,
            time: Utc::now(),
        }
    }

    /// `prev_config` was replaced by `config`
    pub fn updated(config: NetworkConfig, prev_config: NetworkConfig) -> Self {
        Self {
            event_type: ConfigEventType::ConfigUpdated,
            config_key: config.config_key().to_string(),
            subject: Some(config.subject().clone()),
            config: Some(config),
            prev_config: Some(prev_config),
            time: Utc::now(),
        }
    }

    /// `prev_config` was removed
    pub fn removed(prev_config: NetworkConfig) -> Self {
        Self {
            event_type: ConfigEventType::ConfigRemoved,
            config_key: prev_config.config_key().to_string(),
            subject: Some(prev_config.subject().clone()),
            config: None,
            prev_config: Some(prev_config),
            time: Utc::now(),
        }
    }

    /// A factory for `config_key` was registered or unregistered
    pub fn factory(event_type: ConfigEventType, config_key: impl Into<String>) -> Self {
        Self {
            event_type,
            config_key: config_key.into(),
            subject: None,
            config: None,
            prev_config: None,
            time: Utc::now(),
        }
    }
}

/// Schema descriptor registered with a [`NetworkConfigRegistry`]
///
/// A factory names a config key, says which subjects it applies to, and
/// produces an empty config instance for a subject.
pub trait ConfigFactory: Send + Sync {
    /// Subject class configs of this schema are keyed by
    fn subject_class(&self) -> SubjectClass;

    /// Schema key, unique within a registry
    fn config_key(&self) -> &str;

    /// Create an empty config for `subject`
    fn create_config(&self, subject: &DeviceId) -> NetworkConfig;
}

/// Receiver of upstream config notifications
pub trait NetworkConfigListener: Send + Sync {
    /// Handle a notification
    ///
    /// Called on the registry's notification thread; must not block.
    fn event(&self, event: &NetworkConfigEvent);

    /// Whether this listener wants `event` at all
    fn is_relevant(&self, _event: &NetworkConfigEvent) -> bool {
        true
    }
}

/// The upstream network config registry
///
/// # Thread Safety
///
/// All methods take `&self` and must be safe to call from any thread.
pub trait NetworkConfigRegistry: Send + Sync {
    /// Register a schema factory
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Factory registered
    /// - `Err(Error::Registration)`: A factory with the same key is already registered
    fn register_config_factory(&self, factory: Arc<dyn ConfigFactory>) -> Result<()>;

    /// Unregister the factory for `config_key`
    ///
    /// Returns `true` if a factory was registered under that key.
    fn unregister_config_factory(&self, config_key: &str) -> bool;

    /// Attach a notification listener
    fn add_listener(&self, listener: Arc<dyn NetworkConfigListener>);

    /// Detach a previously attached listener (compared by pointer identity)
    ///
    /// Returns `true` if the listener was attached.
    fn remove_listener(&self, listener: &Arc<dyn NetworkConfigListener>) -> bool;

    /// All subjects holding a config under `config_key`
    fn subjects(&self, config_key: &str) -> Vec<DeviceId>;

    /// Point lookup of the config stored for `subject` under `config_key`
    fn get_config(&self, subject: &DeviceId, config_key: &str) -> Option<NetworkConfig>;
}
