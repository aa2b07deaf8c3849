//! The cell: one circular physical unit wrapping one physics body.

use super::{CellId, PlayerId};
use crate::physics::{BodyId, CollisionFilter, PhysicsWorld};
use crate::util::{self, Color};
use tracing::warn;

/// Radius deltas below this skip the physics-body resize, avoiding churn
/// from floating-point noise.
pub const RESIZE_EPSILON: f32 = 0.1;

/// Cell bodies carry a hundredth of the game mass so impulses stay in a
/// sane range.
const BODY_MASS_DIVISOR: f32 = 100.0;

/// What a cell is. Each variant carries only the fields it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellKind {
    /// A cell steered by a player.
    Player { owner: PlayerId },
    /// A static food pellet.
    Food,
    /// A static virus obstacle that pops oversized player cells.
    Virus,
    /// Mass ejected by a player; unowned when synced from a peer that
    /// did not report an owner.
    Ejected { owner: Option<PlayerId> },
}

impl CellKind {
    /// Classification priority used to canonicalize collision pairs.
    #[inline]
    pub fn priority(&self) -> u8 {
        match self {
            CellKind::Food => 0,
            CellKind::Ejected { .. } => 1,
            CellKind::Virus => 2,
            CellKind::Player { .. } => 3,
        }
    }

    #[inline]
    pub fn owner(&self) -> Option<&str> {
        match self {
            CellKind::Player { owner } => Some(owner),
            CellKind::Ejected { owner } => owner.as_deref(),
            _ => None,
        }
    }

    #[inline]
    pub fn is_player(&self) -> bool {
        matches!(self, CellKind::Player { .. })
    }

    pub fn filter(&self) -> CollisionFilter {
        match self {
            CellKind::Player { .. } => CollisionFilter::player(),
            CellKind::Food => CollisionFilter::food(),
            CellKind::Virus => CollisionFilter::virus(),
            CellKind::Ejected { .. } => CollisionFilter::ejected(),
        }
    }

    pub fn is_static(&self) -> bool {
        matches!(self, CellKind::Food | CellKind::Virus)
    }

    pub fn friction_air(&self) -> f32 {
        match self {
            CellKind::Player { .. } => 0.05,
            CellKind::Ejected { .. } => 0.02,
            CellKind::Food | CellKind::Virus => 0.1,
        }
    }
}

/// One circular unit. Mass is the single source of truth; radius is
/// always derived from it and the physics body is resized to match.
#[derive(Debug, Clone)]
pub struct Cell {
    pub id: CellId,
    pub kind: CellKind,
    pub mass: f32,
    pub color: Color,
    /// The exclusively owned physics body.
    pub body: BodyId,
    pub can_merge: bool,
    /// Tick at which this cell becomes mergeable again.
    pub merge_ready_tick: u64,
    pub spawn_tick: u64,
    pub last_split_tick: u64,
}

impl Cell {
    pub fn new(id: CellId, kind: CellKind, mass: f32, color: Color, body: BodyId, tick: u64) -> Self {
        Self {
            id,
            kind,
            mass,
            color,
            body,
            can_merge: false,
            merge_ready_tick: 0,
            spawn_tick: tick,
            last_split_tick: tick,
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        util::mass_to_radius(self.mass)
    }

    /// Set the cell mass, re-derive the radius and resize the physics
    /// body proportionally. A cell whose body no longer exists is left
    /// untouched; invalid masses are clamped to a minimal valid value.
    pub fn set_mass(&mut self, physics: &mut PhysicsWorld, new_mass: f32) {
        let Some(old_radius) = physics.body(self.body).map(|b| b.radius) else {
            return;
        };
        let new_mass = if new_mass.is_finite() && new_mass > 0.0 {
            new_mass
        } else {
            warn!(cell = %self.id, new_mass, "invalid cell mass, clamping to unit radius");
            util::radius_to_mass(1.0)
        };
        self.mass = new_mass;
        let new_radius = self.radius();
        if (new_radius - old_radius).abs() > RESIZE_EPSILON {
            physics.scale_body(self.body, new_radius / old_radius);
        }
        physics.set_mass(self.body, self.mass / BODY_MASS_DIVISOR);
    }

    /// Restart the merge cooldown: the cell becomes mergeable again after
    /// `base + mass * per_mass` ticks.
    pub fn start_merge_cooldown(&mut self, tick: u64, base: f32, per_mass: f32) {
        self.can_merge = false;
        let duration = (base + self.mass * per_mass).max(0.0) as u64;
        self.merge_ready_tick = tick + duration;
    }

    /// Refresh the `can_merge` flag from the simulation clock. Food-like
    /// cells never merge.
    pub fn update_merge(&mut self, tick: u64) {
        if self.kind.is_player() {
            self.can_merge = tick >= self.merge_ready_tick;
        }
    }
}
