//! Shared-arena plumbing: the state store, snapshot reconciliation, and
//! the external agent service.

pub mod agents;
pub mod store;
pub mod sync;

pub use agents::{AgentBridge, AgentError, AgentService, NullAgentService};
pub use store::{GameObjectRecord, MemoryStore, ObjectKind, StateStore, StoreError, StoreEvent};
pub use sync::{bootstrap, publish_events, CellSnapshot, PlayerSnapshot};
