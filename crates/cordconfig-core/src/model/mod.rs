//! Data model for CORD access configuration
//!
//! - [`identity`]: device ids and the other network value types
//! - [`access`]: access device / access agent records and their schemas

pub mod access;
pub mod identity;

pub use access::{
    ACCESS_AGENT_CONFIG_KEY, ACCESS_DEVICE_CONFIG_KEY, AccessAgentData, AccessConfigFactory,
    AccessDeviceData, AccessRecord,
};
pub use identity::{ConnectPoint, DeviceId, MacAddress, PortNumber, VlanId};
