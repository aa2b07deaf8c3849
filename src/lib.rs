//! Entity and interaction core for a mass-absorption arena.
//!
//! Circular cells owned by players steer toward a target point, absorb
//! food and smaller cells, split, merge, and get popped by viruses. The
//! crate owns the entity lifecycle, collision resolution, bot AI and
//! remote-state reconciliation; physics integration sits behind the
//! boundary in [`physics`].

pub mod ai;
pub mod collision;
pub mod config;
pub mod entity;
pub mod physics;
pub mod remote;
pub mod simulation;
pub mod util;
pub mod world;

// Re-export commonly used types
pub use config::Config;
pub use entity::{Cell, CellKind, Player};
pub use simulation::{Simulation, SimMode, OutboundEvent};
pub use world::World;
