//! Network identity value types
//!
//! Small value types shared by the access records: device identifiers,
//! port numbers, VLAN ids, MAC addresses and connect points. Each one parses
//! from the textual form used in network config documents and displays back
//! to it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifier of a network device, e.g. `of:0000000000000001`
///
/// `DeviceId::default()` is the *unset* identity. It can be built in code
/// but never parsed from text, and the query API rejects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId(String);

impl DeviceId {
    /// Wrap a raw identifier without validating it
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier as text
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the unset identity
    pub fn is_unset(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl FromStr for DeviceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once(':') {
            Some((scheme, value)) if !scheme.is_empty() && !value.is_empty() => {
                Ok(Self(s.to_string()))
            }
            _ => Err(Error::invalid_input(format!(
                "Device ID must look like 'scheme:value', got '{}'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for DeviceId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Port number on a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortNumber(pub u64);

impl FromStr for PortNumber {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<u64>()
            .map(PortNumber)
            .map_err(|_| Error::invalid_input(format!("Invalid port number: '{}'", s)))
    }
}

impl fmt::Display for PortNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 802.1Q VLAN identifier (0..=4095)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct VlanId(u16);

impl VlanId {
    /// Highest valid VLAN id
    pub const MAX: u16 = 4095;

    /// Create a VLAN id, rejecting values above [`VlanId::MAX`]
    pub fn new(id: u16) -> Result<Self> {
        if id > Self::MAX {
            return Err(Error::invalid_input(format!(
                "VLAN id {} out of range (max {})",
                id,
                Self::MAX
            )));
        }
        Ok(Self(id))
    }

    /// The raw VLAN id
    pub fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for VlanId {
    type Error = Error;

    fn try_from(value: u16) -> Result<Self> {
        Self::new(value)
    }
}

impl From<VlanId> for u16 {
    fn from(vlan: VlanId) -> Self {
        vlan.0
    }
}

impl FromStr for VlanId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let id = s
            .trim()
            .parse::<u16>()
            .map_err(|_| Error::invalid_input(format!("Invalid VLAN id: '{}'", s)))?;
        Self::new(id)
    }
}

impl fmt::Display for VlanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 48-bit MAC address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    /// Create a MAC address from raw octets
    pub fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Raw octets
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl FromStr for MacAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::invalid_input(format!("Invalid MAC address: '{}'", s));

        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(invalid());
        }

        let mut octets = [0u8; 6];
        for (octet, part) in octets.iter_mut().zip(parts) {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(invalid());
            }
            *octet = u8::from_str_radix(part, 16).map_err(|_| invalid())?;
        }

        Ok(Self(octets))
    }
}

impl TryFrom<String> for MacAddress {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.to_string()
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}", a, b, c, d, e, g)
    }
}

/// A port on a specific device, written `<device-id>/<port>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConnectPoint {
    /// Device owning the port
    pub device_id: DeviceId,
    /// Port on that device
    pub port: PortNumber,
}

impl ConnectPoint {
    /// Create a connect point
    pub fn new(device_id: DeviceId, port: PortNumber) -> Self {
        Self { device_id, port }
    }
}

impl FromStr for ConnectPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (device, port) = s.trim().rsplit_once('/').ok_or_else(|| {
            Error::invalid_input(format!(
                "Connect point must look like '<device-id>/<port>', got '{}'",
                s
            ))
        })?;

        Ok(Self {
            device_id: device.parse()?,
            port: port.parse()?,
        })
    }
}

impl TryFrom<String> for ConnectPoint {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ConnectPoint> for String {
    fn from(cp: ConnectPoint) -> Self {
        cp.to_string()
    }
}

impl fmt::Display for ConnectPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_id, self.port)
    }
}
