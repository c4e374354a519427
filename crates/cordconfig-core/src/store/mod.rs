// # Record Stores
//
// In-memory stores backing the access device / access agent view. Nothing
// here survives a restart; the view is rebuilt from the upstream registry on
// activation.

pub mod record_store;

pub use record_store::RecordStore;

use crate::model::{AccessAgentData, AccessDeviceData};

/// The two independent record stores, one per record family
#[derive(Debug, Default)]
pub struct AccessStores {
    /// Access device records
    pub devices: RecordStore<AccessDeviceData>,
    /// Access agent records
    pub agents: RecordStore<AccessAgentData>,
}

impl AccessStores {
    /// Create empty stores
    pub fn new() -> Self {
        Self::default()
    }
}
