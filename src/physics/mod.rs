//! Physics boundary.
//!
//! The interaction core treats physics as a black box: circular bodies
//! with position/velocity/mass, category+mask collision filtering, and a
//! collision start/end event stream produced once per step. This module
//! is a minimal stand-in implementing exactly that surface; broad-phase
//! sophistication is deliberately out of scope.
//!
//! Velocity is expressed in world units per tick. Forces accumulate
//! between steps and are applied as `dv = force / mass` at the start of
//! the next step, then cleared.

use glam::Vec2;
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Collision category bits.
pub const CATEGORY_PLAYER: u16 = 0x0001;
pub const CATEGORY_FOOD: u16 = 0x0002;
pub const CATEGORY_VIRUS: u16 = 0x0004;
pub const CATEGORY_EJECTED: u16 = 0x0008;

/// Category + mask pair; two bodies interact only when each one's
/// category is present in the other's mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionFilter {
    pub category: u16,
    pub mask: u16,
}

impl CollisionFilter {
    pub const fn new(category: u16, mask: u16) -> Self {
        Self { category, mask }
    }

    /// Player cells collide with everything.
    pub const fn player() -> Self {
        Self::new(CATEGORY_PLAYER, 0xFFFF)
    }

    /// Food only collides with player cells.
    pub const fn food() -> Self {
        Self::new(CATEGORY_FOOD, CATEGORY_PLAYER)
    }

    /// Viruses collide with player cells and ejected mass.
    pub const fn virus() -> Self {
        Self::new(CATEGORY_VIRUS, CATEGORY_PLAYER | CATEGORY_EJECTED)
    }

    /// Ejected mass collides with player cells and viruses.
    pub const fn ejected() -> Self {
        Self::new(CATEGORY_EJECTED, CATEGORY_PLAYER | CATEGORY_VIRUS)
    }

    #[inline]
    pub fn collides_with(self, other: Self) -> bool {
        (self.mask & other.category) != 0 && (other.mask & self.category) != 0
    }
}

/// Opaque handle to a body in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(u64);

#[cfg(test)]
impl BodyId {
    /// Fabricate a handle that resolves to nothing, for tests that only
    /// exercise entity bookkeeping.
    pub fn dangling(n: u64) -> Self {
        Self(u64::MAX - n)
    }
}

/// Parameters for creating a body.
#[derive(Debug, Clone)]
pub struct BodyDef {
    pub position: Vec2,
    pub radius: f32,
    pub mass: f32,
    pub is_static: bool,
    pub friction_air: f32,
    pub filter: CollisionFilter,
    /// Back-reference to the owning entity, if any.
    pub entity: Option<String>,
}

/// A circular rigid body.
#[derive(Debug, Clone)]
pub struct Body {
    pub position: Vec2,
    pub velocity: Vec2,
    pub force: Vec2,
    pub mass: f32,
    pub radius: f32,
    pub is_static: bool,
    pub friction_air: f32,
    pub filter: CollisionFilter,
    pub entity: Option<String>,
}

/// A collision pair transition reported by [`PhysicsWorld::step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionEvent {
    /// Two bodies started overlapping this step.
    Start(BodyId, BodyId),
    /// Two previously overlapping bodies separated (or one was removed).
    End(BodyId, BodyId),
}

/// The physics world: body storage, integration, and pair events.
#[derive(Debug, Default)]
pub struct PhysicsWorld {
    bodies: HashMap<BodyId, Body>,
    next_id: u64,
    touching: HashSet<(BodyId, BodyId)>,
}

impl PhysicsWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_body(&mut self, def: BodyDef) -> BodyId {
        self.next_id += 1;
        let id = BodyId(self.next_id);
        self.bodies.insert(
            id,
            Body {
                position: def.position,
                velocity: Vec2::ZERO,
                force: Vec2::ZERO,
                mass: def.mass.max(0.001),
                radius: def.radius.max(0.1),
                is_static: def.is_static,
                friction_air: def.friction_air,
                filter: def.filter,
                entity: def.entity,
            },
        );
        id
    }

    /// Remove a body. Touching pairs involving it are dropped without
    /// emitting end events; removal happens between steps.
    pub fn remove_body(&mut self, id: BodyId) -> bool {
        let existed = self.bodies.remove(&id).is_some();
        if existed {
            self.touching.retain(|&(a, b)| a != id && b != id);
        }
        existed
    }

    #[inline]
    pub fn contains(&self, id: BodyId) -> bool {
        self.bodies.contains_key(&id)
    }

    #[inline]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(&id)
    }

    #[inline]
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(&id)
    }

    /// The entity back-reference attached to a body, if any.
    pub fn entity_of(&self, id: BodyId) -> Option<&str> {
        self.bodies.get(&id).and_then(|b| b.entity.as_deref())
    }

    /// Detach the entity back-reference (used when the entity is queued
    /// for destruction so later pairs this step see no owner).
    pub fn clear_entity(&mut self, id: BodyId) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.entity = None;
        }
    }

    pub fn set_position(&mut self, id: BodyId, position: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.position = position;
        }
    }

    pub fn set_velocity(&mut self, id: BodyId, velocity: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.velocity = velocity;
        }
    }

    /// Set the body mass, clamped to a minimal positive value.
    pub fn set_mass(&mut self, id: BodyId, mass: f32) {
        if let Some(body) = self.bodies.get_mut(&id) {
            if !mass.is_finite() || mass <= 0.0 {
                warn!(?id, mass, "invalid body mass, clamping");
                body.mass = 0.001;
            } else {
                body.mass = mass;
            }
        }
    }

    pub fn apply_force(&mut self, id: BodyId, force: Vec2) {
        if let Some(body) = self.bodies.get_mut(&id) {
            body.force += force;
        }
    }

    /// Scale the body radius by `factor`. Non-finite or non-positive
    /// factors are rejected with a warning instead of corrupting state.
    pub fn scale_body(&mut self, id: BodyId, factor: f32) -> bool {
        let Some(body) = self.bodies.get_mut(&id) else {
            return false;
        };
        if !factor.is_finite() || factor <= 0.0 {
            warn!(?id, factor, "invalid scale factor, skipping resize");
            return false;
        }
        body.radius *= factor;
        true
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Advance one tick: integrate dynamic bodies, then diff the set of
    /// overlapping filter-compatible pairs against the previous step to
    /// produce start/end events. Pairs are scanned in id order so the
    /// event stream is deterministic for a given world state.
    pub fn step(&mut self) -> Vec<CollisionEvent> {
        for body in self.bodies.values_mut() {
            if body.is_static {
                body.force = Vec2::ZERO;
                continue;
            }
            if body.mass > 0.0 {
                body.velocity += body.force / body.mass;
            }
            body.force = Vec2::ZERO;
            body.velocity *= 1.0 - body.friction_air;
            let v = body.velocity;
            body.position += v;
        }

        let mut ids: Vec<BodyId> = self.bodies.keys().copied().collect();
        ids.sort_unstable();

        let mut current: HashSet<(BodyId, BodyId)> = HashSet::new();
        for (i, &a) in ids.iter().enumerate() {
            let body_a = &self.bodies[&a];
            for &b in &ids[i + 1..] {
                let body_b = &self.bodies[&b];
                if !body_a.filter.collides_with(body_b.filter) {
                    continue;
                }
                let r = body_a.radius + body_b.radius;
                if body_a.position.distance_squared(body_b.position) < r * r {
                    current.insert((a, b));
                }
            }
        }

        let mut events = Vec::new();
        let mut started: Vec<(BodyId, BodyId)> = current.difference(&self.touching).copied().collect();
        started.sort_unstable();
        for (a, b) in started {
            events.push(CollisionEvent::Start(a, b));
        }
        let mut ended: Vec<(BodyId, BodyId)> = self.touching.difference(&current).copied().collect();
        ended.sort_unstable();
        for (a, b) in ended {
            events.push(CollisionEvent::End(a, b));
        }

        self.touching = current;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dynamic_body(position: Vec2, radius: f32) -> BodyDef {
        BodyDef {
            position,
            radius,
            mass: 1.0,
            is_static: false,
            friction_air: 0.0,
            filter: CollisionFilter::player(),
            entity: None,
        }
    }

    #[test]
    fn test_collision_start_and_end() {
        let mut world = PhysicsWorld::new();
        let a = world.create_body(dynamic_body(Vec2::ZERO, 5.0));
        let b = world.create_body(dynamic_body(Vec2::new(100.0, 0.0), 5.0));

        assert!(world.step().is_empty());

        world.set_position(b, Vec2::new(8.0, 0.0));
        let events = world.step();
        assert_eq!(events, vec![CollisionEvent::Start(a, b)]);

        // Still touching: no repeated start.
        assert!(world.step().is_empty());

        world.set_position(b, Vec2::new(100.0, 0.0));
        let events = world.step();
        assert_eq!(events, vec![CollisionEvent::End(a, b)]);
    }

    #[test]
    fn test_filter_masks_respected() {
        let mut world = PhysicsWorld::new();
        let mut food = dynamic_body(Vec2::ZERO, 2.0);
        food.filter = CollisionFilter::food();
        let mut virus = dynamic_body(Vec2::new(1.0, 0.0), 2.0);
        virus.filter = CollisionFilter::virus();
        world.create_body(food);
        world.create_body(virus);

        // Food and virus overlap but neither masks the other.
        assert!(world.step().is_empty());
    }

    #[test]
    fn test_static_bodies_do_not_integrate() {
        let mut world = PhysicsWorld::new();
        let mut def = dynamic_body(Vec2::new(3.0, 4.0), 2.0);
        def.is_static = true;
        let id = world.create_body(def);
        world.set_velocity(id, Vec2::new(10.0, 0.0));
        world.apply_force(id, Vec2::new(5.0, 0.0));
        world.step();
        assert_eq!(world.body(id).unwrap().position, Vec2::new(3.0, 4.0));
    }

    #[test]
    fn test_force_becomes_velocity_once() {
        let mut world = PhysicsWorld::new();
        let id = world.create_body(dynamic_body(Vec2::ZERO, 1.0));
        world.apply_force(id, Vec2::new(2.0, 0.0));
        world.step();
        let v1 = world.body(id).unwrap().velocity;
        assert!((v1.x - 2.0).abs() < 1e-6);
        world.step();
        let v2 = world.body(id).unwrap().velocity;
        // Force cleared after the first step; velocity persists.
        assert!((v2.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let mut world = PhysicsWorld::new();
        let id = world.create_body(dynamic_body(Vec2::ZERO, 4.0));
        assert!(!world.scale_body(id, f32::NAN));
        assert!(!world.scale_body(id, 0.0));
        assert_eq!(world.body(id).unwrap().radius, 4.0);
        assert!(world.scale_body(id, 2.0));
        assert_eq!(world.body(id).unwrap().radius, 8.0);
    }

    #[test]
    fn test_removed_body_drops_touch_state() {
        let mut world = PhysicsWorld::new();
        let a = world.create_body(dynamic_body(Vec2::ZERO, 5.0));
        let b = world.create_body(dynamic_body(Vec2::new(3.0, 0.0), 5.0));
        world.step();
        assert!(world.remove_body(b));
        assert!(!world.contains(b));
        // No phantom end event referencing the removed body's pair state.
        assert!(world.step().is_empty());
        assert!(world.contains(a));
    }
}
