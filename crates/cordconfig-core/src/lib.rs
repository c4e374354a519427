// # cordconfig-core
//
// Core library keeping the CORD access configuration in sync with the
// network config registry.
//
// ## Architecture Overview
//
// - **NetworkConfigRegistry**: Upstream registry of network configs and its notifications
// - **CordConfigManager**: Registers the access schemas, mirrors their configs
//   into memory and answers queries
// - **CordConfigService**: Query and subscription interface offered downstream
// - **ListenerRegistry**: Synchronous, failure-isolated event broadcast
// - **MemoryConfigRegistry**: In-memory upstream registry for embedding and tests
//
// ## Design Principles
//
// 1. **Store before publish**: A subscriber sees a change through queries as
//    soon as it is told about it
// 2. **Last value wins**: Each device holds at most one record per family
// 3. **Isolated subscribers**: A failing or panicking listener never affects
//    the others or the upstream feed
// 4. **Library-First**: The daemon is a thin shell around this crate

pub mod config;
pub mod error;
pub mod event;
pub mod listener;
pub mod manager;
pub mod model;
pub mod netcfg;
pub mod registry;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use config::{DeactivationPolicy, ManagerConfig};
pub use error::{Error, Result};
pub use event::{CordConfigEvent, CordConfigEventType, CordConfigSubject};
pub use listener::{ChannelListener, EventStream, ListenerRegistry};
pub use manager::CordConfigManager;
pub use model::{AccessAgentData, AccessDeviceData, DeviceId};
pub use netcfg::{NetworkConfigDocument, SyncSummary};
pub use registry::MemoryConfigRegistry;
pub use traits::{CordConfigListener, CordConfigService, NetworkConfigRegistry};
