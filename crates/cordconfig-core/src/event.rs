//! CORD config events
//!
//! Every change to the access device / access agent view is published as a
//! [`CordConfigEvent`]. Which of `subject` and `prev_subject` is present
//! follows from the event type and is fixed by the constructors:
//!
//! | change  | `subject` | `prev_subject` |
//! |---------|-----------|----------------|
//! | added   | new       | -              |
//! | updated | new       | previous       |
//! | removed | -         | previous       |

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::model::{AccessAgentData, AccessDeviceData, AccessRecord, DeviceId};

/// Type of a CORD config event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CordConfigEventType {
    /// A new access agent has been added
    AccessAgentAdded,
    /// An access agent has been updated
    AccessAgentUpdated,
    /// An access agent has been removed
    AccessAgentRemoved,
    /// A new access device has been added
    AccessDeviceAdded,
    /// An access device has been updated
    AccessDeviceUpdated,
    /// An access device has been removed
    AccessDeviceRemoved,
}

impl fmt::Display for CordConfigEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CordConfigEventType::AccessAgentAdded => "ACCESS_AGENT_ADDED",
            CordConfigEventType::AccessAgentUpdated => "ACCESS_AGENT_UPDATED",
            CordConfigEventType::AccessAgentRemoved => "ACCESS_AGENT_REMOVED",
            CordConfigEventType::AccessDeviceAdded => "ACCESS_DEVICE_ADDED",
            CordConfigEventType::AccessDeviceUpdated => "ACCESS_DEVICE_UPDATED",
            CordConfigEventType::AccessDeviceRemoved => "ACCESS_DEVICE_REMOVED",
        };
        f.write_str(name)
    }
}

/// Record carried by an event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum CordConfigSubject {
    /// Access device record
    AccessDevice(AccessDeviceData),
    /// Access agent record
    AccessAgent(AccessAgentData),
}

impl CordConfigSubject {
    /// Device owning the record
    pub fn device_id(&self) -> &DeviceId {
        match self {
            CordConfigSubject::AccessDevice(data) => data.device_id(),
            CordConfigSubject::AccessAgent(data) => data.device_id(),
        }
    }

    /// The access device record, if this is one
    pub fn as_access_device(&self) -> Option<&AccessDeviceData> {
        match self {
            CordConfigSubject::AccessDevice(data) => Some(data),
            CordConfigSubject::AccessAgent(_) => None,
        }
    }

    /// The access agent record, if this is one
    pub fn as_access_agent(&self) -> Option<&AccessAgentData> {
        match self {
            CordConfigSubject::AccessAgent(data) => Some(data),
            CordConfigSubject::AccessDevice(_) => None,
        }
    }
}

impl fmt::Display for CordConfigSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CordConfigSubject::AccessDevice(data) => fmt::Display::fmt(data, f),
            CordConfigSubject::AccessAgent(data) => fmt::Display::fmt(data, f),
        }
    }
}

/// An immutable CORD config event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CordConfigEvent {
    #[serde(rename = "type")]
    kind: CordConfigEventType,
    subject: Option<CordConfigSubject>,
    prev_subject: Option<CordConfigSubject>,
    time: DateTime<Utc>,
}

impl CordConfigEvent {
    /// `subject` was added
    pub fn added<R: AccessRecord>(subject: R) -> Self {
        Self::build(R::ADDED, Some(subject.into_subject()), None)
    }

    /// `prev_subject` was replaced by `subject`
    pub fn updated<R: AccessRecord>(subject: R, prev_subject: R) -> Self {
        Self::build(
            R::UPDATED,
            Some(subject.into_subject()),
            Some(prev_subject.into_subject()),
        )
    }

    /// `prev_subject` was removed
    pub fn removed<R: AccessRecord>(prev_subject: R) -> Self {
        Self::build(R::REMOVED, None, Some(prev_subject.into_subject()))
    }

    fn build(
        kind: CordConfigEventType,
        subject: Option<CordConfigSubject>,
        prev_subject: Option<CordConfigSubject>,
    ) -> Self {
        Self {
            kind,
            subject,
            prev_subject,
            time: Utc::now(),
        }
    }

    /// Event type
    pub fn kind(&self) -> CordConfigEventType {
        self.kind
    }

    /// The record after the change (absent for removals)
    pub fn subject(&self) -> Option<&CordConfigSubject> {
        self.subject.as_ref()
    }

    /// The record before the change (absent for additions)
    pub fn prev_subject(&self) -> Option<&CordConfigSubject> {
        self.prev_subject.as_ref()
    }

    /// When the event was created
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    /// Device the event is about
    pub fn device_id(&self) -> &DeviceId {
        // Constructors always set at least one of the two.
        match (&self.subject, &self.prev_subject) {
            (Some(subject), _) | (None, Some(subject)) => subject.device_id(),
            (None, None) => unreachable!("CordConfigEvent without subject"),
        }
    }
}

impl fmt::Display for CordConfigEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CordConfigEvent{{time={}, type={}",
            self.time.format("%Y-%m-%dT%H:%M:%S%.3f"),
            self.kind
        )?;
        if let Some(subject) = &self.subject {
            write!(f, ", subject={}", subject)?;
        }
        if let Some(prev) = &self.prev_subject {
            write!(f, ", prevSubject={}", prev)?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PortNumber, VlanId};

    fn device(vlan: u16) -> AccessDeviceData {
        AccessDeviceData::new(
            "of:1".parse().unwrap(),
            PortNumber(1),
            VlanId::new(vlan).unwrap(),
            None,
        )
    }

    #[test]
    fn test_added_has_no_prev_subject() {
        let event = CordConfigEvent::added(device(10));
        assert_eq!(event.kind(), CordConfigEventType::AccessDeviceAdded);
        assert!(event.subject().is_some());
        assert!(event.prev_subject().is_none());
    }

    #[test]
    fn test_updated_has_both() {
        let event = CordConfigEvent::updated(device(20), device(10));
        assert_eq!(event.kind(), CordConfigEventType::AccessDeviceUpdated);
        assert_eq!(
            event.subject().and_then(|s| s.as_access_device()).map(|d| d.vlan().get()),
            Some(20)
        );
        assert_eq!(
            event.prev_subject().and_then(|s| s.as_access_device()).map(|d| d.vlan().get()),
            Some(10)
        );
    }

    #[test]
    fn test_removed_has_no_subject() {
        let event = CordConfigEvent::removed(device(10));
        assert_eq!(event.kind(), CordConfigEventType::AccessDeviceRemoved);
        assert!(event.subject().is_none());
        assert_eq!(event.device_id().as_str(), "of:1");
    }

    #[test]
    fn test_display_includes_prev_subject() {
        let text = CordConfigEvent::updated(device(20), device(10)).to_string();
        assert!(text.contains("type=ACCESS_DEVICE_UPDATED"));
        assert!(text.contains("prevSubject=AccessDevice{deviceId=of:1"));
    }
}
