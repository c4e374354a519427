//! Core traits for the CORD config synchronizer
//!
//! This module defines the abstract interfaces on both sides of the core.
//!
//! - [`NetworkConfigRegistry`]: The upstream config registry and its notifications
//! - [`CordConfigService`]: Queries and subscriptions offered downstream

pub mod cord_config;
pub mod network_config;

pub use cord_config::{CordConfigListener, CordConfigService};
pub use network_config::{
    ConfigEventType, ConfigFactory, NetworkConfig, NetworkConfigEvent, NetworkConfigListener,
    NetworkConfigRegistry, SubjectClass,
};

use std::sync::Arc;

/// Pointer identity of two listener handles
pub(crate) fn same_listener<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
