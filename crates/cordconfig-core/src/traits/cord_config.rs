// # CORD Config Service
//
// Defines what the synchronizer offers to the rest of the system: read
// access to the access device / access agent view, and subscription to the
// events describing how that view changes.
//
// ## Usage
//
// ```rust,ignore
// use cordconfig_core::CordConfigService;
//
// fn uplink_of(service: &dyn CordConfigService, device: &DeviceId) -> Option<PortNumber> {
//     service.access_device(device).ok()?.map(|d| d.uplink())
// }
// ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::error::Result;
use crate::event::CordConfigEvent;
use crate::model::{AccessAgentData, AccessDeviceData, DeviceId};

/// Subscriber to CORD config events
///
/// # Delivery
///
/// `event()` runs synchronously on the thread that applied the upstream
/// change, after the change is visible through [`CordConfigService`].
/// A slow listener stalls every later notification, so listeners with real
/// work to do should hand it off (see [`crate::listener::ChannelListener`]).
///
/// An `Err` or a panic from one listener is logged and does not affect
/// delivery to the others.
///
/// Handlers may query the service. They must not change the upstream
/// registry, which includes starting or stopping the manager. While
/// `activate()` or `deactivate()` is publishing, such a call fails with
/// `Error::Lifecycle`.
pub trait CordConfigListener: Send + Sync {
    /// Handle an event
    fn event(&self, event: &CordConfigEvent) -> anyhow::Result<()>;

    /// Whether this listener wants `event` at all
    fn is_relevant(&self, _event: &CordConfigEvent) -> bool {
        true
    }
}

/// Read access to the CORD access configuration plus event subscription
pub trait CordConfigService: Send + Sync {
    /// Snapshot of all access devices
    fn access_devices(&self) -> HashSet<AccessDeviceData>;

    /// The access device configured for `device_id`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(data))`: Device is configured
    /// - `Ok(None)`: No access device config for this device
    /// - `Err(Error::InvalidInput)`: `device_id` is unset
    fn access_device(&self, device_id: &DeviceId) -> Result<Option<AccessDeviceData>>;

    /// Snapshot of all access agents
    fn access_agents(&self) -> HashSet<AccessAgentData>;

    /// The access agent configured for `device_id`
    ///
    /// Same contract as [`CordConfigService::access_device`].
    fn access_agent(&self, device_id: &DeviceId) -> Result<Option<AccessAgentData>>;

    /// Subscribe to events
    fn add_listener(&self, listener: Arc<dyn CordConfigListener>);

    /// Unsubscribe (compared by pointer identity)
    ///
    /// Returns `true` if the listener was subscribed.
    fn remove_listener(&self, listener: &Arc<dyn CordConfigListener>) -> bool;
}
