//! Collision classification and resolution.
//!
//! Consumes collision-start events from the physics boundary, classifies
//! the entity pair and applies exactly one rule: eat food-like, eat an
//! opposing player cell, merge same-owner cells, or burst on a virus.
//! A failure while resolving one pair is logged and never aborts the
//! remaining pairs of the step. Side effects are limited to mass/radius
//! mutation, structural changes and destruction-queue enqueues.

use crate::entity::{CellId, CellKind};
use crate::physics::{BodyId, CollisionEvent};
use crate::simulation::{OutboundEvent, SimMode, Simulation};
use crate::util;
use glam::Vec2;
use rand::Rng;
use thiserror::Error;
use tracing::warn;

/// A player cell eats food-like cells down to 80% of its own radius.
pub const FOOD_EAT_FACTOR: f32 = 0.8;
/// A player cell must be 10% larger to eat an opposing cell.
pub const PLAYER_EAT_FACTOR: f32 = 1.1;
/// Same-owner cells merge when closer than 75% of their combined radii.
pub const MERGE_OVERLAP_FACTOR: f32 = 0.75;
/// A player cell pops on a virus once it reaches 90% of the virus radius.
pub const VIRUS_POP_FACTOR: f32 = 0.9;
/// A virus burst never produces more than this many fragments.
pub const MAX_VIRUS_FRAGMENTS: usize = 7;

/// A single pair's resolution failure.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A body carries an entity back-reference the world cannot resolve.
    #[error("body refers to unknown cell {0}")]
    StaleEntity(CellId),
}

impl Simulation {
    /// Resolve every collision-start event of the step. Errors are
    /// per-pair: logged and skipped.
    pub fn resolve_collisions(&mut self, events: &[CollisionEvent]) {
        for event in events {
            let CollisionEvent::Start(a, b) = *event else {
                continue;
            };
            if let Err(err) = self.resolve_pair(a, b) {
                warn!(error = %err, "skipping collision pair");
            }
        }
    }

    /// Classify one colliding pair and apply at most one rule.
    pub fn resolve_pair(&mut self, body_a: BodyId, body_b: BodyId) -> Result<(), ResolveError> {
        // Bodies without an entity back-reference (or already detached
        // this step) take no part in resolution.
        let Some(id_a) = self.physics.entity_of(body_a).map(str::to_string) else {
            return Ok(());
        };
        let Some(id_b) = self.physics.entity_of(body_b).map(str::to_string) else {
            return Ok(());
        };

        let prio_a = self
            .world
            .cell(&id_a)
            .map(|c| c.kind.priority())
            .ok_or_else(|| ResolveError::StaleEntity(id_a.clone()))?;
        let prio_b = self
            .world
            .cell(&id_b)
            .map(|c| c.kind.priority())
            .ok_or_else(|| ResolveError::StaleEntity(id_b.clone()))?;

        // Canonicalize: higher-priority cell first, so rule dispatch is
        // independent of event order.
        let (first, second) = if prio_a >= prio_b {
            (id_a, id_b)
        } else {
            (id_b, id_a)
        };

        let first_kind = match self.world.cell(&first) {
            Some(c) => c.kind.clone(),
            None => return Ok(()),
        };
        let second_kind = match self.world.cell(&second) {
            Some(c) => c.kind.clone(),
            None => return Ok(()),
        };

        match (&first_kind, &second_kind) {
            (CellKind::Player { owner }, CellKind::Food | CellKind::Ejected { .. })
                if self.world.player(owner).is_some() =>
            {
                let owner = owner.clone();
                self.eat_food_like(&owner, &first, &second);
            }
            (CellKind::Player { owner: owner_a }, CellKind::Player { owner: owner_b })
                if self.world.player(owner_a).is_some() && self.world.player(owner_b).is_some() =>
            {
                if owner_a != owner_b {
                    let (oa, ob) = (owner_a.clone(), owner_b.clone());
                    self.eat_player_cell(&oa, &first, &ob, &second);
                } else if first != second {
                    let owner = owner_a.clone();
                    self.merge_own_cells(&owner, &first, &second);
                }
            }
            (CellKind::Player { owner }, CellKind::Virus)
                if self.world.player(owner).is_some() =>
            {
                let owner = owner.clone();
                self.burst_on_virus(&owner, &first, &second);
            }
            _ => {}
        }
        Ok(())
    }

    /// Rule 1: a player cell absorbs food or ejected mass.
    fn eat_food_like(&mut self, owner: &str, eater_id: &str, eaten_id: &str) {
        let Some(eaten) = self.world.cell(eaten_id) else {
            return;
        };
        // Freshly self-ejected mass is immune to its own owner.
        if let CellKind::Ejected {
            owner: Some(ejector),
        } = &eaten.kind
        {
            if ejector == owner
                && self.tick.saturating_sub(eaten.spawn_tick) < self.config.eject.self_eat_cooldown
            {
                return;
            }
        }
        let eaten_mass = eaten.mass;
        let eaten_radius = eaten.radius();
        let was_food = matches!(eaten.kind, CellKind::Food);

        let Some(eater) = self.world.cells.get_mut(eater_id) else {
            return;
        };
        if eater.radius() <= eaten_radius * FOOD_EAT_FACTOR {
            return;
        }
        let new_mass = eater.mass + eaten_mass;
        eater.set_mass(&mut self.physics, new_mass);
        self.world.refresh_player_mass(owner);

        self.destroy_cell(eaten_id);
        match self.mode {
            SimMode::Networked => self.push_outbound(OutboundEvent::ObjectConsumed {
                id: eaten_id.to_string(),
            }),
            SimMode::Standalone if was_food => {
                self.spawn_food(None, None);
            }
            SimMode::Standalone => {}
        }
    }

    /// Rule 2: opposing player cells — the clearly bigger, sufficiently
    /// engulfing cell wins.
    fn eat_player_cell(&mut self, owner_a: &str, id_a: &str, owner_b: &str, id_b: &str) {
        let (Some(cell_a), Some(cell_b)) = (self.world.cell(id_a), self.world.cell(id_b)) else {
            return;
        };
        let (Some(pos_a), Some(pos_b)) = (
            self.physics.body(cell_a.body).map(|b| b.position),
            self.physics.body(cell_b.body).map(|b| b.position),
        ) else {
            return;
        };
        let dist = pos_a.distance(pos_b);
        let (ra, rb) = (cell_a.radius(), cell_b.radius());
        let (mass_a, mass_b) = (cell_a.mass, cell_b.mass);

        // Touching is not enough: the smaller cell must be mostly inside.
        let a_eats_b = ra > rb * PLAYER_EAT_FACTOR && dist < ra - rb * 0.5;
        let b_eats_a = rb > ra * PLAYER_EAT_FACTOR && dist < rb - ra * 0.5;

        let (winner_owner, winner_id, loser_owner, loser_id, gained) = if a_eats_b {
            (owner_a, id_a, owner_b, id_b, mass_b)
        } else if b_eats_a {
            (owner_b, id_b, owner_a, id_a, mass_a)
        } else {
            return;
        };

        if let Some(winner) = self.world.cells.get_mut(winner_id) {
            let new_mass = winner.mass + gained;
            winner.set_mass(&mut self.physics, new_mass);
        }
        self.world.refresh_player_mass(winner_owner);
        self.destroy_cell(loser_id);
        self.check_elimination(loser_owner);
    }

    /// Rule 3: same-owner cells merge when both are cooldown-cleared and
    /// sufficiently overlapping.
    fn merge_own_cells(&mut self, owner: &str, id_a: &str, id_b: &str) {
        let Some(player) = self.world.player(owner) else {
            return;
        };
        if player.cells.len() <= 1 {
            return;
        }
        let (Some(cell_a), Some(cell_b)) = (self.world.cell(id_a), self.world.cell(id_b)) else {
            return;
        };
        if !cell_a.can_merge || !cell_b.can_merge {
            return;
        }
        let (Some(pos_a), Some(pos_b)) = (
            self.physics.body(cell_a.body).map(|b| b.position),
            self.physics.body(cell_b.body).map(|b| b.position),
        ) else {
            return;
        };
        let dist = pos_a.distance(pos_b);
        if dist >= (cell_a.radius() + cell_b.radius()) * MERGE_OVERLAP_FACTOR {
            return;
        }

        let (smaller_id, larger_id, smaller_mass) = if cell_a.mass < cell_b.mass {
            (id_a, id_b, cell_a.mass)
        } else {
            (id_b, id_a, cell_b.mass)
        };

        let tick = self.tick;
        let (base, per_mass) = (
            self.config.player.merge_cooldown_base,
            self.config.player.merge_cooldown_per_mass,
        );
        if let Some(larger) = self.world.cells.get_mut(larger_id) {
            let new_mass = larger.mass + smaller_mass;
            larger.set_mass(&mut self.physics, new_mass);
            larger.start_merge_cooldown(tick, base, per_mass);
        }
        self.destroy_cell(smaller_id);
        self.world.refresh_player_mass(owner);
    }

    /// Rule 4: a sufficiently large player cell bursts on a virus into a
    /// ring of equal-mass fragments; the virus is consumed.
    fn burst_on_virus(&mut self, owner: &str, cell_id: &str, virus_id: &str) {
        let (Some(cell), Some(virus)) = (self.world.cell(cell_id), self.world.cell(virus_id))
        else {
            return;
        };
        if cell.radius() < virus.radius() * VIRUS_POP_FACTOR {
            return;
        }
        let Some(virus_pos) = self.physics.body(virus.body).map(|b| b.position) else {
            return;
        };
        let virus_radius = virus.radius();
        let cell_mass = cell.mass;

        let Some(player) = self.world.player(owner) else {
            return;
        };
        let budget = self
            .config
            .player
            .max_cells
            .saturating_sub(player.cells.len())
            + 1;
        let fragment_unit = util::radius_to_mass(self.config.player.initial_radius / 2.0);
        let by_mass = (cell_mass / fragment_unit).floor() as usize;
        let count = budget.min(MAX_VIRUS_FRAGMENTS.min(by_mass));
        if count <= 1 {
            // Too small to pop: the virus absorbs nothing.
            return;
        }

        let mass_per_fragment = cell_mass / count as f32;
        let fragment_radius = util::mass_to_radius(mass_per_fragment);
        let tick = self.tick;
        let (base, per_mass) = (
            self.config.player.merge_cooldown_base,
            self.config.player.merge_cooldown_per_mass,
        );
        let impulse_factor = self.config.virus.impulse_factor;

        self.destroy_cell(cell_id);

        let mut rng = rand::rng();
        for i in 0..count {
            if self.world.player(owner).is_none() {
                break;
            }
            let angle = (i as f32 / count as f32) * std::f32::consts::TAU
                + (rng.random::<f32>() - 0.5) * 0.5;
            let direction = Vec2::new(angle.cos(), angle.sin());
            let offset = virus_radius * 0.5 + fragment_radius;
            let position = virus_pos + direction * offset;

            if let Some(new_id) =
                self.spawn_player_cell(owner, None, position, fragment_radius)
            {
                if let Some(fragment) = self.world.cells.get_mut(&new_id) {
                    // The radius conversion is lossy; fragments carry the
                    // exact share.
                    fragment.set_mass(&mut self.physics, mass_per_fragment);
                    fragment.last_split_tick = tick;
                    fragment.start_merge_cooldown(tick, base, per_mass);
                    let body = fragment.body;
                    // Impulse scales with the body mass, not the cell mass.
                    let body_mass = self.physics.body(body).map(|b| b.mass).unwrap_or_default();
                    let magnitude = impulse_factor * body_mass * 2.0;
                    self.physics.apply_force(body, direction * magnitude);
                }
            }
        }
        self.world.refresh_player_mass(owner);
        self.check_elimination(owner);

        self.destroy_cell(virus_id);
        match self.mode {
            SimMode::Networked => self.push_outbound(OutboundEvent::ObjectConsumed {
                id: virus_id.to_string(),
            }),
            SimMode::Standalone => {
                self.spawn_virus(None, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::Player;
    use crate::util::Color;

    fn new_sim() -> Simulation {
        Simulation::new(Config::default(), SimMode::Standalone)
    }

    fn add_player(sim: &mut Simulation, id: &str) {
        let mut player = Player::new(id.to_string(), id.to_uppercase(), Color::random());
        player.is_local = false;
        sim.add_player(player);
    }

    fn add_player_cell(sim: &mut Simulation, player: &str, pos: Vec2, mass: f32) -> CellId {
        let radius = util::mass_to_radius(mass);
        let id = sim.spawn_player_cell(player, None, pos, radius).unwrap();
        // The radius conversion is lossy; pin the exact mass.
        if let Some(cell) = sim.world.cells.get_mut(&id) {
            cell.set_mass(&mut sim.physics, mass);
        }
        sim.world.refresh_player_mass(player);
        id
    }

    #[test]
    fn test_eat_food_conserves_mass() {
        let mut sim = new_sim();
        add_player(&mut sim, "p1");
        let cell = add_player_cell(&mut sim, "p1", Vec2::new(100.0, 100.0), 100.0);
        let food = sim.spawn_food(None, Some(Vec2::new(100.0, 100.0)));
        let food_mass = sim.world.cell(&food).unwrap().mass;
        let before = sim.world.cell(&cell).unwrap().mass;

        let events = sim.physics.step();
        sim.resolve_collisions(&events);

        let after = sim.world.cell(&cell).unwrap().mass;
        assert_eq!(after, before + food_mass);
        assert!(sim.world.cell(&food).is_none());
        assert_eq!(sim.world.player("p1").unwrap().total_mass, after);
    }

    #[test]
    fn test_pair_order_is_canonicalized() {
        // Same setup twice, but hand the resolver the pair in both
        // orders; the food must be eaten either way.
        for flip in [false, true] {
            let mut sim = new_sim();
            add_player(&mut sim, "p1");
            let cell = add_player_cell(&mut sim, "p1", Vec2::new(50.0, 50.0), 100.0);
            let food = sim.spawn_food(None, Some(Vec2::new(50.0, 50.0)));
            let cell_body = sim.world.cell(&cell).unwrap().body;
            let food_body = sim.world.cell(&food).unwrap().body;
            let (a, b) = if flip {
                (food_body, cell_body)
            } else {
                (cell_body, food_body)
            };
            sim.resolve_pair(a, b).unwrap();
            assert!(sim.world.cell(&food).is_none(), "flip={flip}");
        }
    }

    #[test]
    fn test_self_ejected_mass_is_immune_briefly() {
        let mut sim = new_sim();
        add_player(&mut sim, "p1");
        let cell = add_player_cell(&mut sim, "p1", Vec2::new(50.0, 50.0), 200.0);
        let pellet = sim.spawn_ejected(
            None,
            Vec2::new(50.0, 50.0),
            Color::default(),
            Some("p1".to_string()),
        );
        let cell_body = sim.world.cell(&cell).unwrap().body;
        let pellet_body = sim.world.cell(&pellet).unwrap().body;

        sim.resolve_pair(cell_body, pellet_body).unwrap();
        assert!(sim.world.cell(&pellet).is_some(), "immune inside cooldown");

        sim.tick += sim.config.eject.self_eat_cooldown;
        sim.resolve_pair(cell_body, pellet_body).unwrap();
        assert!(sim.world.cell(&pellet).is_none(), "edible after cooldown");
    }

    #[test]
    fn test_player_eats_engulfed_smaller_cell() {
        let mut sim = new_sim();
        add_player(&mut sim, "big");
        add_player(&mut sim, "small");
        let big = add_player_cell(&mut sim, "big", Vec2::new(100.0, 100.0), 400.0);
        // Barely offset: engulfed well within `r_big - r_small * 0.5`.
        let small = add_player_cell(&mut sim, "small", Vec2::new(101.0, 100.0), 100.0);
        let big_body = sim.world.cell(&big).unwrap().body;
        let small_body = sim.world.cell(&small).unwrap().body;

        sim.resolve_pair(big_body, small_body).unwrap();

        assert_eq!(sim.world.cell(&big).unwrap().mass, 500.0);
        assert!(sim.world.cell(&small).is_none());
        // The loser was a non-local player with no cells left: reported,
        // not removed.
        assert!(sim.world.player("small").is_some());
        let events = sim.take_outbound();
        assert!(events.iter().any(|e| matches!(
            e,
            OutboundEvent::PlayerEliminated { id, .. } if id == "small"
        )));
    }

    #[test]
    fn test_touching_without_engulfment_is_no_eat() {
        let mut sim = new_sim();
        add_player(&mut sim, "big");
        add_player(&mut sim, "small");
        let r_big = util::mass_to_radius(400.0);
        let r_small = util::mass_to_radius(300.0);
        // Overlapping but size ratio below 1.1: nobody eats.
        let big = add_player_cell(&mut sim, "big", Vec2::new(100.0, 100.0), 400.0);
        let small = add_player_cell(
            &mut sim,
            "small",
            Vec2::new(100.0 + (r_big + r_small) * 0.5, 100.0),
            300.0,
        );
        let big_body = sim.world.cell(&big).unwrap().body;
        let small_body = sim.world.cell(&small).unwrap().body;
        sim.resolve_pair(big_body, small_body).unwrap();
        assert!(sim.world.cell(&big).is_some());
        assert!(sim.world.cell(&small).is_some());
    }

    #[test]
    fn test_same_owner_merge_requires_cooldown() {
        let mut sim = new_sim();
        add_player(&mut sim, "p1");
        let a = add_player_cell(&mut sim, "p1", Vec2::new(100.0, 100.0), 100.0);
        let b = add_player_cell(&mut sim, "p1", Vec2::new(101.0, 100.0), 60.0);
        let body_a = sim.world.cell(&a).unwrap().body;
        let body_b = sim.world.cell(&b).unwrap().body;

        // Both cells are fresh: cooldown blocks the merge.
        sim.resolve_pair(body_a, body_b).unwrap();
        assert_eq!(sim.world.player("p1").unwrap().cells.len(), 2);

        sim.world.cell_mut(&a).unwrap().can_merge = true;
        sim.world.cell_mut(&b).unwrap().can_merge = true;
        sim.resolve_pair(body_a, body_b).unwrap();

        let player = sim.world.player("p1").unwrap();
        assert_eq!(player.cells.len(), 1);
        let survivor = sim.world.cell(&a).unwrap();
        assert_eq!(survivor.mass, 160.0);
        assert!(!survivor.can_merge, "survivor cooldown restarts");
        assert_eq!(player.total_mass, 160.0);
    }

    #[test]
    fn test_virus_burst_fragment_ring() {
        let mut sim = new_sim();
        add_player(&mut sim, "p1");
        let mass = 800.0;
        let cell = add_player_cell(&mut sim, "p1", Vec2::new(200.0, 200.0), mass);
        let virus = sim.spawn_virus(None, Some(Vec2::new(200.0, 200.0)));
        let cell_body = sim.world.cell(&cell).unwrap().body;
        let virus_body = sim.world.cell(&virus).unwrap().body;

        let fragment_unit = util::radius_to_mass(sim.config.player.initial_radius / 2.0);
        let expected = (sim.config.player.max_cells - 1 + 1)
            .min(MAX_VIRUS_FRAGMENTS.min((mass / fragment_unit).floor() as usize));
        assert!(expected > 1);

        sim.resolve_pair(cell_body, virus_body).unwrap();

        let player = sim.world.player("p1").unwrap();
        assert_eq!(player.cells.len(), expected);
        let total: f32 = player
            .cells
            .iter()
            .map(|id| sim.world.cell(id).unwrap().mass)
            .sum();
        assert!((total - mass).abs() < 1e-2);

        // Fragments sit on a ring around the virus center.
        let virus_pos = Vec2::new(200.0, 200.0);
        let expected_offset = sim.config.virus.radius * 0.5
            + util::mass_to_radius(mass / expected as f32);
        for id in &sim.world.player("p1").unwrap().cells {
            let body = sim.world.cell(id).unwrap().body;
            let pos = sim.physics.body(body).unwrap().position;
            assert!((pos.distance(virus_pos) - expected_offset).abs() < 1e-2);
            assert!(!sim.world.cell(id).unwrap().can_merge);
        }

        assert!(sim.world.cell(&cell).is_none());
        assert!(sim.world.cell(&virus).is_none());
        // Standalone mode scheduled a replacement virus.
        assert_eq!(sim.world.viruses.len(), 1);
    }

    #[test]
    fn test_small_cell_bounces_off_virus() {
        let mut sim = new_sim();
        add_player(&mut sim, "p1");
        let cell = add_player_cell(&mut sim, "p1", Vec2::new(200.0, 200.0), 100.0);
        let virus = sim.spawn_virus(None, Some(Vec2::new(200.0, 200.0)));
        let cell_body = sim.world.cell(&cell).unwrap().body;
        let virus_body = sim.world.cell(&virus).unwrap().body;

        sim.resolve_pair(cell_body, virus_body).unwrap();

        assert!(sim.world.cell(&cell).is_some());
        assert!(sim.world.cell(&virus).is_some());
        assert_eq!(sim.world.player("p1").unwrap().cells.len(), 1);
    }

    #[test]
    fn test_bad_pair_does_not_abort_batch() {
        let mut sim = new_sim();
        add_player(&mut sim, "p1");
        let cell = add_player_cell(&mut sim, "p1", Vec2::new(100.0, 100.0), 100.0);
        let food = sim.spawn_food(None, Some(Vec2::new(100.0, 100.0)));
        let cell_body = sim.world.cell(&cell).unwrap().body;
        let food_body = sim.world.cell(&food).unwrap().body;

        // A body claiming an entity the world has never seen.
        let ghost = sim.physics.create_body(crate::physics::BodyDef {
            position: Vec2::new(100.0, 100.0),
            radius: 2.0,
            mass: 0.1,
            is_static: false,
            friction_air: 0.0,
            filter: crate::physics::CollisionFilter::player(),
            entity: Some("cell_ghost".to_string()),
        });

        sim.resolve_collisions(&[
            CollisionEvent::Start(ghost, cell_body),
            CollisionEvent::Start(cell_body, food_body),
        ]);
        assert!(sim.world.cell(&food).is_none(), "good pair still resolved");
    }
}
