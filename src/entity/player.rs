//! The player: an owner of one or more cells.

use super::{CellId, PlayerId};
use crate::physics::PhysicsWorld;
use crate::util::Color;
use crate::world::World;
use glam::Vec2;

/// Axis-aligned bounding box over a player's cells.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// An owner of cells. Aggregate mass is always recomputed from the
/// current cell set, never incrementally adjusted.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: Color,
    /// Ids of owned cells; order is irrelevant.
    pub cells: Vec<CellId>,
    /// Sum of current cell masses.
    pub total_mass: f32,
    /// Historical maximum total mass ever achieved.
    pub max_mass: f32,
    /// Movement target point all cells steer toward.
    pub target: Vec2,
    pub is_local: bool,
    pub is_bot: bool,
    /// Driven by the external autonomous-agent service rather than the
    /// local bot engine.
    pub external_agent: bool,
    /// Wall-clock ms of the last remote snapshot applied (remote players
    /// only; used for dead-reckoning staleness).
    pub last_update_ms: u64,
}

impl Player {
    pub fn new(id: PlayerId, name: String, color: Color) -> Self {
        Self {
            id,
            name,
            color,
            cells: Vec::new(),
            total_mass: 0.0,
            max_mass: 0.0,
            target: Vec2::ZERO,
            is_local: false,
            is_bot: false,
            external_agent: false,
            last_update_ms: 0,
        }
    }

    /// Recompute the aggregate mass from the owned cells and update the
    /// historical maximum.
    pub fn recompute_total_mass(&mut self, cells: &std::collections::HashMap<CellId, super::Cell>) {
        self.total_mass = self
            .cells
            .iter()
            .filter_map(|id| cells.get(id))
            .map(|c| c.mass)
            .sum();
        if self.total_mass > self.max_mass {
            self.max_mass = self.total_mass;
        }
    }

    /// Mass-weighted centroid of the cell positions; the world center
    /// when the player has no cells (or no live bodies).
    pub fn center_of_mass(&self, world: &World, physics: &PhysicsWorld) -> Vec2 {
        let mut weighted = Vec2::ZERO;
        let mut mass = 0.0;
        for id in &self.cells {
            let Some(cell) = world.cells.get(id) else { continue };
            let Some(body) = physics.body(cell.body) else { continue };
            weighted += body.position * cell.mass;
            mass += cell.mass;
        }
        if mass <= 0.0 {
            world.center()
        } else {
            weighted / mass
        }
    }

    /// Bounding box over all cells; the zero box when empty.
    pub fn bounding_box(&self, world: &World, physics: &PhysicsWorld) -> Aabb {
        let mut bb: Option<Aabb> = None;
        for id in &self.cells {
            let Some(cell) = world.cells.get(id) else { continue };
            let Some(body) = physics.body(cell.body) else { continue };
            let r = cell.radius();
            let min = body.position - Vec2::splat(r);
            let max = body.position + Vec2::splat(r);
            bb = Some(match bb {
                None => Aabb { min, max },
                Some(prev) => Aabb {
                    min: prev.min.min(min),
                    max: prev.max.max(max),
                },
            });
        }
        bb.unwrap_or_default()
    }

    /// Radius of the player's largest cell, 0.0 when empty.
    pub fn largest_radius(&self, world: &World) -> f32 {
        self.cells
            .iter()
            .filter_map(|id| world.cells.get(id))
            .map(|c| c.radius())
            .fold(0.0, f32::max)
    }

    /// Mean cell radius, if the player has any cells.
    pub fn average_radius(&self, world: &World) -> Option<f32> {
        if self.cells.is_empty() {
            return None;
        }
        let sum: f32 = self
            .cells
            .iter()
            .filter_map(|id| world.cells.get(id))
            .map(|c| c.radius())
            .sum();
        Some(sum / self.cells.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Cell, CellKind};
    use crate::physics::{BodyDef, CollisionFilter};
    use crate::util;

    fn world_with_player(cells: &[(f32, f32, f32)]) -> (World, PhysicsWorld, Player) {
        let mut world = World::new(1000.0, 1000.0);
        let mut physics = PhysicsWorld::new();
        let mut player = Player::new("p1".into(), "P1".into(), Color::default());
        for (i, &(x, y, mass)) in cells.iter().enumerate() {
            let id = format!("c{i}");
            let radius = util::mass_to_radius(mass);
            let body = physics.create_body(BodyDef {
                position: Vec2::new(x, y),
                radius,
                mass: mass / 100.0,
                is_static: false,
                friction_air: 0.05,
                filter: CollisionFilter::player(),
                entity: Some(id.clone()),
            });
            let kind = CellKind::Player { owner: "p1".into() };
            let mut cell = Cell::new(id.clone(), kind, mass, Color::default(), body, 0);
            cell.set_mass(&mut physics, mass);
            world.insert_cell(cell);
            player.cells.push(id);
        }
        player.recompute_total_mass(&world.cells);
        (world, physics, player)
    }

    #[test]
    fn test_center_of_mass_weights_by_mass() {
        let (world, physics, player) =
            world_with_player(&[(0.0, 0.0, 300.0), (100.0, 0.0, 100.0)]);
        let center = player.center_of_mass(&world, &physics);
        assert!((center.x - 25.0).abs() < 1e-3);
        assert_eq!(center.y, 0.0);
    }

    #[test]
    fn test_empty_player_centers_on_world() {
        let (world, physics, player) = world_with_player(&[]);
        assert_eq!(player.center_of_mass(&world, &physics), world.center());
        assert_eq!(player.bounding_box(&world, &physics), Aabb::default());
        assert!(player.average_radius(&world).is_none());
    }

    #[test]
    fn test_bounding_box_spans_all_cells() {
        let (world, physics, player) =
            world_with_player(&[(100.0, 100.0, 100.0), (300.0, 200.0, 100.0)]);
        let r = util::mass_to_radius(100.0);
        let bb = player.bounding_box(&world, &physics);
        assert!((bb.min.x - (100.0 - r)).abs() < 1e-3);
        assert!((bb.max.x - (300.0 + r)).abs() < 1e-3);
        assert!((bb.width() - (200.0 + 2.0 * r)).abs() < 1e-3);
        assert!((bb.height() - (100.0 + 2.0 * r)).abs() < 1e-3);
    }

    #[test]
    fn test_max_mass_tracks_peak() {
        let (mut world, mut physics, mut player) = world_with_player(&[(0.0, 0.0, 200.0)]);
        assert_eq!(player.max_mass, 200.0);
        if let Some(cell) = world.cells.get_mut("c0") {
            cell.set_mass(&mut physics, 50.0);
        }
        player.recompute_total_mass(&world.cells);
        assert_eq!(player.total_mass, 50.0);
        assert_eq!(player.max_mass, 200.0, "peak never decreases");
        assert!((player.average_radius(&world).unwrap() - util::mass_to_radius(50.0)).abs() < 1e-3);
    }
}
