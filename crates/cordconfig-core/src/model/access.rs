//! Access device and access agent records
//!
//! Both records are decoded from the JSON node of a network config whose
//! subject is the owning device. The config keys double as the schema names
//! registered with the upstream registry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::identity::{ConnectPoint, DeviceId, MacAddress, PortNumber, VlanId};
use crate::error::{Error, Result};
use crate::event::{CordConfigEventType, CordConfigSubject};
use crate::traits::{ConfigFactory, NetworkConfig, SubjectClass};

/// Config key of the access device schema
pub const ACCESS_DEVICE_CONFIG_KEY: &str = "accessDevice";

/// Config key of the access agent schema
pub const ACCESS_AGENT_CONFIG_KEY: &str = "accessAgent";

/// A record family kept in its own store and published under its own
/// event types
pub trait AccessRecord: Clone + Eq + std::hash::Hash + Send + Sync + 'static {
    /// Config key this record is decoded from
    const CONFIG_KEY: &'static str;
    /// Event type for a newly added record
    const ADDED: CordConfigEventType;
    /// Event type for an updated record
    const UPDATED: CordConfigEventType;
    /// Event type for a removed record
    const REMOVED: CordConfigEventType;

    /// Device owning this record (the store key)
    fn device_id(&self) -> &DeviceId;

    /// Decode the record from a network config
    fn from_config(config: &NetworkConfig) -> Result<Self>;

    /// Wrap the record as an event subject
    fn into_subject(self) -> CordConfigSubject;
}

/// Access device configuration for one device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessDeviceData {
    device_id: DeviceId,
    uplink: PortNumber,
    vlan: VlanId,
    default_vlan: Option<VlanId>,
}

impl AccessDeviceData {
    /// Create an access device record
    pub fn new(
        device_id: DeviceId,
        uplink: PortNumber,
        vlan: VlanId,
        default_vlan: Option<VlanId>,
    ) -> Self {
        Self {
            device_id,
            uplink,
            vlan,
            default_vlan,
        }
    }

    /// Device this record belongs to
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Uplink port of the device
    pub fn uplink(&self) -> PortNumber {
        self.uplink
    }

    /// VLAN assigned to the device
    pub fn vlan(&self) -> VlanId {
        self.vlan
    }

    /// Default VLAN, if one is configured
    pub fn default_vlan(&self) -> Option<VlanId> {
        self.default_vlan
    }
}

/// Access agent configuration for one device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessAgentData {
    device_id: DeviceId,
    olts: BTreeMap<ConnectPoint, MacAddress>,
    agent_mac: MacAddress,
    vtn_location: Option<ConnectPoint>,
}

impl AccessAgentData {
    /// Create an access agent record
    pub fn new(
        device_id: DeviceId,
        olts: BTreeMap<ConnectPoint, MacAddress>,
        agent_mac: MacAddress,
        vtn_location: Option<ConnectPoint>,
    ) -> Self {
        Self {
            device_id,
            olts,
            agent_mac,
            vtn_location,
        }
    }

    /// Device this record belongs to
    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// OLT connect points served by the agent, with their MAC addresses
    pub fn olts(&self) -> &BTreeMap<ConnectPoint, MacAddress> {
        &self.olts
    }

    /// MAC address of the agent
    pub fn agent_mac(&self) -> MacAddress {
        self.agent_mac
    }

    /// Where the agent attaches to the VTN, if known
    pub fn vtn_location(&self) -> Option<&ConnectPoint> {
        self.vtn_location.as_ref()
    }
}

// Config documents carry numbers either as JSON numbers or as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Number(u64),
    Text(String),
}

impl Scalar {
    fn parse<T: FromStr<Err = Error>>(&self) -> Result<T> {
        match self {
            Scalar::Number(n) => n.to_string().parse(),
            Scalar::Text(s) => s.parse(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccessDeviceNode {
    uplink: Scalar,
    vlan: Scalar,
    #[serde(default)]
    default_vlan: Option<Scalar>,
}

#[derive(Deserialize)]
struct OltNode {
    port: String,
    mac: String,
}

#[derive(Deserialize)]
struct AccessAgentNode {
    #[serde(default)]
    olts: Vec<OltNode>,
    mac: String,
    #[serde(rename = "vtn-location", default)]
    vtn_location: Option<String>,
}

fn decode_node<T: serde::de::DeserializeOwned>(config: &NetworkConfig) -> Result<T> {
    serde_json::from_value(config.node().clone()).map_err(|e| {
        Error::decode(config.config_key(), config.subject().as_str(), e.to_string())
    })
}

fn decode_field<T>(config: &NetworkConfig, parsed: Result<T>) -> Result<T> {
    parsed.map_err(|e| {
        Error::decode(config.config_key(), config.subject().as_str(), e.to_string())
    })
}

impl AccessRecord for AccessDeviceData {
    const CONFIG_KEY: &'static str = ACCESS_DEVICE_CONFIG_KEY;
    const ADDED: CordConfigEventType = CordConfigEventType::AccessDeviceAdded;
    const UPDATED: CordConfigEventType = CordConfigEventType::AccessDeviceUpdated;
    const REMOVED: CordConfigEventType = CordConfigEventType::AccessDeviceRemoved;

    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn from_config(config: &NetworkConfig) -> Result<Self> {
        let node: AccessDeviceNode = decode_node(config)?;

        let default_vlan = match &node.default_vlan {
            Some(vlan) => Some(decode_field(config, vlan.parse())?),
            None => None,
        };

        Ok(Self {
            device_id: config.subject().clone(),
            uplink: decode_field(config, node.uplink.parse())?,
            vlan: decode_field(config, node.vlan.parse())?,
            default_vlan,
        })
    }

    fn into_subject(self) -> CordConfigSubject {
        CordConfigSubject::AccessDevice(self)
    }
}

impl AccessRecord for AccessAgentData {
    const CONFIG_KEY: &'static str = ACCESS_AGENT_CONFIG_KEY;
    const ADDED: CordConfigEventType = CordConfigEventType::AccessAgentAdded;
    const UPDATED: CordConfigEventType = CordConfigEventType::AccessAgentUpdated;
    const REMOVED: CordConfigEventType = CordConfigEventType::AccessAgentRemoved;

    fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    fn from_config(config: &NetworkConfig) -> Result<Self> {
        let node: AccessAgentNode = decode_node(config)?;

        let mut olts = BTreeMap::new();
        for olt in &node.olts {
            olts.insert(
                decode_field(config, olt.port.parse())?,
                decode_field(config, olt.mac.parse())?,
            );
        }

        let vtn_location = match &node.vtn_location {
            Some(location) => Some(decode_field(config, location.parse())?),
            None => None,
        };

        Ok(Self {
            device_id: config.subject().clone(),
            olts,
            agent_mac: decode_field(config, node.mac.parse())?,
            vtn_location,
        })
    }

    fn into_subject(self) -> CordConfigSubject {
        CordConfigSubject::AccessAgent(self)
    }
}

impl fmt::Display for AccessDeviceData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AccessDevice{{deviceId={}, uplink={}, vlan={}",
            self.device_id, self.uplink, self.vlan
        )?;
        if let Some(vlan) = self.default_vlan {
            write!(f, ", defaultVlan={}", vlan)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for AccessAgentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AccessAgent{{deviceId={}, mac={}, olts={}",
            self.device_id,
            self.agent_mac,
            self.olts.len()
        )?;
        if let Some(location) = &self.vtn_location {
            write!(f, ", vtnLocation={}", location)?;
        }
        f.write_str("}")
    }
}

/// Schema descriptor for the two access config families
///
/// Registering one of these with a [`crate::traits::NetworkConfigRegistry`]
/// tells the registry that configs under its key belong to device subjects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessConfigFactory {
    config_key: &'static str,
}

impl AccessConfigFactory {
    /// Factory for `accessDevice` configs
    pub fn access_device() -> Self {
        Self {
            config_key: ACCESS_DEVICE_CONFIG_KEY,
        }
    }

    /// Factory for `accessAgent` configs
    pub fn access_agent() -> Self {
        Self {
            config_key: ACCESS_AGENT_CONFIG_KEY,
        }
    }
}

impl ConfigFactory for AccessConfigFactory {
    fn subject_class(&self) -> SubjectClass {
        SubjectClass::Devices
    }

    fn config_key(&self) -> &str {
        self.config_key
    }

    fn create_config(&self, subject: &DeviceId) -> NetworkConfig {
        NetworkConfig::empty(subject.clone(), self.config_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device() -> DeviceId {
        "of:0000000000000001".parse().unwrap()
    }

    #[test]
    fn test_decode_access_device() {
        let config = NetworkConfig::new(
            device(),
            ACCESS_DEVICE_CONFIG_KEY,
            json!({ "uplink": "2", "vlan": 100, "defaultVlan": "4000" }),
        );

        let data = AccessDeviceData::from_config(&config).unwrap();
        assert_eq!(data.device_id(), &device());
        assert_eq!(data.uplink(), PortNumber(2));
        assert_eq!(data.vlan().get(), 100);
        assert_eq!(data.default_vlan().map(VlanId::get), Some(4000));
    }

    #[test]
    fn test_decode_access_device_rejects_bad_vlan() {
        let config = NetworkConfig::new(
            device(),
            ACCESS_DEVICE_CONFIG_KEY,
            json!({ "uplink": "2", "vlan": "not-a-vlan" }),
        );

        let err = AccessDeviceData::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::Decode { ref key, .. } if key == ACCESS_DEVICE_CONFIG_KEY));
    }

    #[test]
    fn test_decode_access_agent() {
        let config = NetworkConfig::new(
            device(),
            ACCESS_AGENT_CONFIG_KEY,
            json!({
                "olts": [
                    { "port": "of:0000000000000001/1", "mac": "00:00:00:00:00:01" },
                    { "port": "of:0000000000000001/2", "mac": "00:00:00:00:00:02" }
                ],
                "mac": "00:00:00:00:00:ff",
                "vtn-location": "of:0000000000000009/5"
            }),
        );

        let data = AccessAgentData::from_config(&config).unwrap();
        assert_eq!(data.olts().len(), 2);
        assert_eq!(data.agent_mac().to_string(), "00:00:00:00:00:ff");
        assert_eq!(
            data.vtn_location().map(ToString::to_string),
            Some("of:0000000000000009/5".to_string())
        );
    }

    #[test]
    fn test_decode_access_agent_requires_mac() {
        let config = NetworkConfig::new(device(), ACCESS_AGENT_CONFIG_KEY, json!({ "olts": [] }));
        assert!(AccessAgentData::from_config(&config).is_err());
    }

    #[test]
    fn test_factory_creates_empty_config() {
        let factory = AccessConfigFactory::access_agent();
        let config = factory.create_config(&device());

        assert_eq!(factory.subject_class(), SubjectClass::Devices);
        assert_eq!(config.config_key(), ACCESS_AGENT_CONFIG_KEY);
        assert_eq!(config.subject(), &device());
        assert_eq!(config.node(), &json!({}));
    }
}
