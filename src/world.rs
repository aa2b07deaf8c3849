//! World state: the entity maps.
//!
//! All cells live in one map keyed by id; food/virus/ejected ids are
//! indexed per kind for iteration. Players refer to their cells by id.

use crate::entity::{Cell, CellId, CellKind, Player, PlayerId};
use glam::Vec2;
use std::collections::{HashMap, HashSet};

/// The entity maps for one simulation session.
#[derive(Debug)]
pub struct World {
    pub width: f32,
    pub height: f32,

    /// Every cell, regardless of kind.
    pub cells: HashMap<CellId, Cell>,
    /// Every player (local, remote, bot).
    pub players: HashMap<PlayerId, Player>,

    /// Per-kind id indexes.
    pub food: HashSet<CellId>,
    pub viruses: HashSet<CellId>,
    pub ejected: HashSet<CellId>,
}

impl World {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            cells: HashMap::new(),
            players: HashMap::new(),
            food: HashSet::new(),
            viruses: HashSet::new(),
            ejected: HashSet::new(),
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Clamp a point into the world bounds.
    pub fn clamp_point(&self, p: Vec2) -> Vec2 {
        Vec2::new(p.x.clamp(0.0, self.width), p.y.clamp(0.0, self.height))
    }

    /// Register a cell in the map and its kind index. Player-kind cells
    /// are additionally appended to the owning player's list by the
    /// caller, which knows whether the owner exists.
    pub fn insert_cell(&mut self, cell: Cell) {
        match &cell.kind {
            CellKind::Food => {
                self.food.insert(cell.id.clone());
            }
            CellKind::Virus => {
                self.viruses.insert(cell.id.clone());
            }
            CellKind::Ejected { .. } => {
                self.ejected.insert(cell.id.clone());
            }
            CellKind::Player { .. } => {}
        }
        self.cells.insert(cell.id.clone(), cell);
    }

    /// Deregister a cell from the map and its kind index. Physics-body
    /// teardown is the simulation's job, not the world's.
    pub fn remove_cell(&mut self, id: &str) -> Option<Cell> {
        let cell = self.cells.remove(id)?;
        match &cell.kind {
            CellKind::Food => {
                self.food.remove(id);
            }
            CellKind::Virus => {
                self.viruses.remove(id);
            }
            CellKind::Ejected { .. } => {
                self.ejected.remove(id);
            }
            CellKind::Player { .. } => {}
        }
        Some(cell)
    }

    #[inline]
    pub fn cell(&self, id: &str) -> Option<&Cell> {
        self.cells.get(id)
    }

    #[inline]
    pub fn cell_mut(&mut self, id: &str) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    #[inline]
    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    #[inline]
    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Recompute a player's aggregate mass from its current cells.
    pub fn refresh_player_mass(&mut self, player_id: &str) {
        // Split borrow: the player list and the cell map are disjoint.
        if let Some(mut player) = self.players.remove(player_id) {
            player.recompute_total_mass(&self.cells);
            self.players.insert(player_id.to_string(), player);
        }
    }

    /// Alive players ranked by total mass, heaviest first.
    pub fn leaderboard(&self) -> Vec<(String, f32)> {
        let mut rows: Vec<(String, f32)> = self
            .players
            .values()
            .filter(|p| !p.cells.is_empty() && p.total_mass > 0.0)
            .map(|p| (p.name.clone(), p.total_mass))
            .collect();
        rows.sort_by(|a, b| b.1.total_cmp(&a.1));
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::BodyId;
    use crate::util::Color;

    fn food_cell(id: &str, mass: f32) -> Cell {
        // Kind indexes do not care whether the body id resolves.
        let body = BodyId::dangling(1);
        Cell::new(id.to_string(), CellKind::Food, mass, Color::default(), body, 0)
    }

    #[test]
    fn test_kind_index_tracks_insert_remove() {
        let mut world = World::new(1000.0, 1000.0);
        world.insert_cell(food_cell("food_a", 7.0));
        assert!(world.food.contains("food_a"));
        assert!(world.cell("food_a").is_some());

        let removed = world.remove_cell("food_a").unwrap();
        assert_eq!(removed.mass, 7.0);
        assert!(!world.food.contains("food_a"));
        assert!(world.remove_cell("food_a").is_none());
    }

    #[test]
    fn test_leaderboard_orders_by_mass() {
        let mut world = World::new(1000.0, 1000.0);
        for (pid, cid, mass) in [("p1", "c1", 50.0), ("p2", "c2", 200.0)] {
            let mut player = Player::new(pid.into(), pid.to_uppercase(), Color::default());
            let body = BodyId::dangling(7);
            let kind = CellKind::Player { owner: pid.into() };
            world.insert_cell(Cell::new(cid.into(), kind, mass, Color::default(), body, 0));
            player.cells.push(cid.into());
            world.players.insert(pid.into(), player);
            world.refresh_player_mass(pid);
        }
        let rows = world.leaderboard();
        assert_eq!(rows[0], ("P2".into(), 200.0));
        assert_eq!(rows[1], ("P1".into(), 50.0));
    }
}
