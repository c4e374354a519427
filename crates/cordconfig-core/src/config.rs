//! Configuration types for the CORD config synchronizer
//!
//! This module defines the settings of [`crate::CordConfigManager`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Load configs already present upstream when activating
    ///
    /// When disabled, the view only fills up from notifications received
    /// after activation.
    #[serde(default = "default_reconcile_on_activate")]
    pub reconcile_on_activate: bool,

    /// What happens to the view when the manager is deactivated
    #[serde(default)]
    pub deactivation: DeactivationPolicy,
}

impl ManagerConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            reconcile_on_activate: default_reconcile_on_activate(),
            deactivation: DeactivationPolicy::default(),
        }
    }

    /// Set the reconciliation flag
    pub fn with_reconcile_on_activate(mut self, reconcile: bool) -> Self {
        self.reconcile_on_activate = reconcile;
        self
    }

    /// Set the deactivation policy
    pub fn with_deactivation(mut self, policy: DeactivationPolicy) -> Self {
        self.deactivation = policy;
        self
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Deactivation behavior for the in-memory view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeactivationPolicy {
    /// Keep every record and publish nothing
    ///
    /// Queries keep answering from the last synchronized state.
    #[default]
    Retain,

    /// Remove every record and publish a removal event for each
    ClearAndNotify,
}

impl FromStr for DeactivationPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "retain" => Ok(DeactivationPolicy::Retain),
            "clear_and_notify" => Ok(DeactivationPolicy::ClearAndNotify),
            other => Err(crate::Error::config(format!(
                "Unknown deactivation policy '{}'. Valid: retain, clear_and_notify",
                other
            ))),
        }
    }
}

impl fmt::Display for DeactivationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeactivationPolicy::Retain => f.write_str("retain"),
            DeactivationPolicy::ClearAndNotify => f.write_str("clear_and_notify"),
        }
    }
}

fn default_reconcile_on_activate() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: ManagerConfig = serde_json::from_str("{}").unwrap();
        assert!(config.reconcile_on_activate);
        assert_eq!(config.deactivation, DeactivationPolicy::Retain);
        assert_eq!(config, ManagerConfig::default());
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "clear_and_notify".parse::<DeactivationPolicy>().unwrap(),
            DeactivationPolicy::ClearAndNotify
        );
        assert_eq!(" Retain ".parse::<DeactivationPolicy>().unwrap(), DeactivationPolicy::Retain);
        assert!("wipe".parse::<DeactivationPolicy>().is_err());

        let config: ManagerConfig =
            serde_json::from_str(r#"{"deactivation": "clear_and_notify"}"#).unwrap();
        assert_eq!(config.deactivation, DeactivationPolicy::ClearAndNotify);
    }
}
