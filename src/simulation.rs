//! The simulation session.
//!
//! Owns the physics world, the entity maps, the deferred-destruction
//! queue and the scheduled-event list, and advances everything one tick
//! at a time. Components receive the session explicitly; there is no
//! process-wide registry.

use crate::ai::BotManager;
use crate::config::Config;
use crate::entity::{Cell, CellId, CellKind, Player, PlayerId};
use crate::physics::{BodyDef, BodyId, PhysicsWorld};
use crate::remote::store::ObjectKind;
use crate::util::{self, Color};
use crate::world::World;
use glam::Vec2;
use rand::Rng;
use std::collections::HashSet;
use tracing::{debug, info};

/// Whether this session is the sole authority or shares state through a
/// remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    /// Single-machine play: consumed food/viruses are replenished locally.
    Standalone,
    /// Shared-arena play: consumption and spawning of shared objects are
    /// surfaced as outbound events for the store session.
    Networked,
}

/// Events the core surfaces for the asynchronous shell. Draining and
/// acting on these must never be required for the next step to proceed.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    /// A store-backed object was consumed locally; its record should be
    /// deleted.
    ObjectConsumed { id: CellId },
    /// A shared object originated locally; its record should be inserted.
    ObjectSpawned {
        id: CellId,
        kind: ObjectKind,
        position: Vec2,
        radius: f32,
        color: Color,
        owner: Option<PlayerId>,
    },
    /// A player lost its last cell.
    PlayerEliminated {
        id: PlayerId,
        name: String,
        max_mass: f32,
        external_agent: bool,
        /// Whether this session simulated the player (own player or bot).
        local: bool,
    },
}

#[derive(Debug, Clone)]
enum ScheduledEvent {
    ExpireEjected(CellId),
}

#[derive(Debug, Clone)]
struct Scheduled {
    due: u64,
    event: ScheduledEvent,
}

/// One simulation session.
pub struct Simulation {
    pub config: Config,
    pub mode: SimMode,
    pub tick: u64,
    pub physics: PhysicsWorld,
    pub world: World,
    pub bots: BotManager,
    /// Id of the locally controlled player, if any.
    pub local_player: Option<PlayerId>,

    destruction_queue: HashSet<BodyId>,
    scheduled: Vec<Scheduled>,
    outbound: Vec<OutboundEvent>,
}

impl Simulation {
    pub fn new(config: Config, mode: SimMode) -> Self {
        let world = World::new(config.world.width, config.world.height);
        Self {
            config,
            mode,
            tick: 0,
            physics: PhysicsWorld::new(),
            world,
            bots: BotManager::new(),
            local_player: None,
            destruction_queue: HashSet::new(),
            scheduled: Vec::new(),
            outbound: Vec::new(),
        }
    }

    /// Advance one step: scheduled events, merge-cooldown refresh, bot
    /// and movement passes, physics integration, collision resolution,
    /// and finally the destruction-queue flush. All resolutions for the
    /// step complete before any body is actually removed.
    pub fn step(&mut self) {
        self.tick += 1;
        self.process_scheduled();

        let tick = self.tick;
        for cell in self.world.cells.values_mut() {
            cell.update_merge(tick);
        }

        self.run_bots();
        self.move_players();
        if self.mode == SimMode::Standalone {
            self.replenish();
        }

        let events = self.physics.step();
        self.clamp_bodies();
        self.resolve_collisions(&events);
        self.flush_destruction_queue();
    }

    /// Drain events destined for the asynchronous shell.
    pub fn take_outbound(&mut self) -> Vec<OutboundEvent> {
        std::mem::take(&mut self.outbound)
    }

    pub(crate) fn push_outbound(&mut self, event: OutboundEvent) {
        self.outbound.push(event);
    }

    // ---- entity factory -------------------------------------------------

    /// Create a cell and its physics body, register both, and start the
    /// merge cooldown for player-owned cells.
    pub fn spawn_cell(
        &mut self,
        id: Option<CellId>,
        kind: CellKind,
        position: Vec2,
        radius: f32,
        color: Color,
    ) -> CellId {
        let id = id.unwrap_or_else(|| util::unique_id("cell_"));
        let mass = util::radius_to_mass(radius);
        let body = self.physics.create_body(BodyDef {
            position,
            radius,
            mass: mass / 100.0,
            is_static: kind.is_static(),
            friction_air: kind.friction_air(),
            filter: kind.filter(),
            entity: Some(id.clone()),
        });
        let mut cell = Cell::new(id.clone(), kind, mass, color, body, self.tick);
        if cell.kind.is_player() {
            cell.start_merge_cooldown(
                self.tick,
                self.config.player.merge_cooldown_base,
                self.config.player.merge_cooldown_per_mass,
            );
        }
        self.world.insert_cell(cell);
        id
    }

    /// Spawn a food pellet. Provide `id`/`position` when materializing a
    /// record that already exists remotely; otherwise a fresh pellet is
    /// placed randomly and, in networked mode, announced.
    pub fn spawn_food(&mut self, id: Option<CellId>, position: Option<Vec2>) -> CellId {
        let announce = id.is_none() && self.mode == SimMode::Networked;
        let position = position
            .unwrap_or_else(|| util::random_position(self.world.width, self.world.height, 50.0));
        let radius = self.config.food.radius;
        let color = Color::random();
        let id = self.spawn_food_colored(id, position, radius, color);
        if announce {
            self.outbound.push(OutboundEvent::ObjectSpawned {
                id: id.clone(),
                kind: ObjectKind::Food,
                position,
                radius,
                color,
                owner: None,
            });
        }
        id
    }

    pub fn spawn_food_colored(
        &mut self,
        id: Option<CellId>,
        position: Vec2,
        radius: f32,
        color: Color,
    ) -> CellId {
        let id = id.unwrap_or_else(|| util::unique_id("food_"));
        self.spawn_cell(Some(id), CellKind::Food, position, radius, color)
    }

    /// Spawn a virus obstacle.
    pub fn spawn_virus(&mut self, id: Option<CellId>, position: Option<Vec2>) -> CellId {
        let announce = id.is_none() && self.mode == SimMode::Networked;
        let position = position
            .unwrap_or_else(|| util::random_position(self.world.width, self.world.height, 100.0));
        let radius = self.config.virus.radius;
        let color = Color::new(0x33, 0xdd, 0x33);
        let id = id.unwrap_or_else(|| util::unique_id("virus_"));
        let id = self.spawn_cell(Some(id), CellKind::Virus, position, radius, color);
        if announce {
            self.outbound.push(OutboundEvent::ObjectSpawned {
                id: id.clone(),
                kind: ObjectKind::Virus,
                position,
                radius,
                color,
                owner: None,
            });
        }
        id
    }

    /// Spawn an ejected-mass pellet and schedule its expiry.
    pub fn spawn_ejected(
        &mut self,
        id: Option<CellId>,
        position: Vec2,
        color: Color,
        owner: Option<PlayerId>,
    ) -> CellId {
        let announce = id.is_none() && self.mode == SimMode::Networked;
        let radius = self.config.eject.radius;
        let id = id.unwrap_or_else(|| util::unique_id("eject_"));
        let kind = CellKind::Ejected {
            owner: owner.clone(),
        };
        let id = self.spawn_cell(Some(id), kind, position, radius, color);
        self.schedule(
            self.config.eject.lifespan,
            ScheduledEvent::ExpireEjected(id.clone()),
        );
        if announce {
            self.outbound.push(OutboundEvent::ObjectSpawned {
                id: id.clone(),
                kind: ObjectKind::Ejected,
                position,
                radius,
                color,
                owner,
            });
        }
        id
    }

    /// Register a player (does not spawn any cells).
    pub fn add_player(&mut self, player: Player) {
        self.world.players.insert(player.id.clone(), player);
    }

    /// Spawn a cell owned by `player_id`. Returns `None` when the player
    /// does not exist.
    pub fn spawn_player_cell(
        &mut self,
        player_id: &str,
        id: Option<CellId>,
        position: Vec2,
        radius: f32,
    ) -> Option<CellId> {
        let color = self.world.player(player_id)?.color;
        let kind = CellKind::Player {
            owner: player_id.to_string(),
        };
        let cell_id = self.spawn_cell(id, kind, position, radius, color);
        let player = self.world.player_mut(player_id)?;
        player.cells.push(cell_id.clone());
        self.world.refresh_player_mass(player_id);
        Some(cell_id)
    }

    /// Spawn the starting cell for a freshly added player at a random
    /// position.
    pub fn spawn_starting_cell(&mut self, player_id: &str) -> Option<CellId> {
        let position = util::random_position(
            self.world.width,
            self.world.height,
            self.config.world.spawn_padding,
        );
        let radius = self.config.player.initial_radius;
        self.spawn_player_cell(player_id, None, position, radius)
    }

    // ---- destruction ----------------------------------------------------

    /// Destroy a cell: deregister it, detach it from its owner, and
    /// queue its body for removal at the end of the step. Both
    /// postconditions are enforced here, never left to call sites.
    /// Elimination of an emptied owner is checked separately so
    /// replace-style operations (virus burst) can refill first.
    pub fn destroy_cell(&mut self, id: &str) -> bool {
        let Some(cell) = self.world.remove_cell(id) else {
            return false;
        };
        self.physics.clear_entity(cell.body);
        self.destruction_queue.insert(cell.body);
        if let Some(owner) = cell.kind.owner().map(str::to_string) {
            if let Some(player) = self.world.player_mut(&owner) {
                player.cells.retain(|c| c != id);
            }
            self.world.refresh_player_mass(&owner);
        }
        true
    }

    /// Handle a player that may have just lost its last cell: local
    /// humans leave the active set, bots are reported eliminated and go
    /// idle. Fires at most once per player life since a later call finds
    /// either no player or a refilled cell list.
    pub(crate) fn check_elimination(&mut self, player_id: &str) {
        let Some(player) = self.world.player(player_id) else {
            return;
        };
        if !player.cells.is_empty() {
            return;
        }
        let event = OutboundEvent::PlayerEliminated {
            id: player.id.clone(),
            name: player.name.clone(),
            max_mass: player.max_mass,
            external_agent: player.external_agent,
            local: player.is_local,
        };
        let remove = player.is_local && !player.is_bot;
        info!(player = %player_id, max_mass = player.max_mass, "player eliminated");
        if remove {
            self.world.players.remove(player_id);
            if self.local_player.as_deref() == Some(player_id) {
                self.local_player = None;
            }
        }
        self.outbound.push(event);
    }

    /// Queue a body for removal at the end of the current step.
    /// Idempotent; safe to call repeatedly within a step.
    pub fn queue_body_destruction(&mut self, body: BodyId) {
        self.physics.clear_entity(body);
        self.destruction_queue.insert(body);
    }

    /// Remove every queued body from the physics world. Runs once per
    /// step, after all collision resolution.
    pub fn flush_destruction_queue(&mut self) {
        if self.destruction_queue.is_empty() {
            return;
        }
        let mut bodies: Vec<BodyId> = self.destruction_queue.drain().collect();
        bodies.sort_unstable();
        for body in bodies {
            self.physics.remove_body(body);
        }
    }

    #[cfg(test)]
    pub(crate) fn destruction_queue_len(&self) -> usize {
        self.destruction_queue.len()
    }

    /// Tear down the session: flush pending destructions and release
    /// every remaining body before the surrounding session goes away.
    pub fn shutdown(&mut self) {
        self.flush_destruction_queue();
        let bodies: Vec<BodyId> = self.world.cells.values().map(|c| c.body).collect();
        for body in bodies {
            self.physics.remove_body(body);
        }
        self.world.cells.clear();
        self.world.players.clear();
        self.world.food.clear();
        self.world.viruses.clear();
        self.world.ejected.clear();
        self.scheduled.clear();
        info!("simulation shut down");
    }

    // ---- scheduled events -----------------------------------------------

    fn schedule(&mut self, after_ticks: u64, event: ScheduledEvent) {
        self.scheduled.push(Scheduled {
            due: self.tick + after_ticks,
            event,
        });
    }

    fn process_scheduled(&mut self) {
        let tick = self.tick;
        let mut due = Vec::new();
        self.scheduled.retain(|s| {
            if s.due <= tick {
                due.push(s.event.clone());
                false
            } else {
                true
            }
        });
        for event in due {
            match event {
                ScheduledEvent::ExpireEjected(id) => {
                    if self.destroy_cell(&id) {
                        debug!(cell = %id, "ejected mass expired");
                        if self.mode == SimMode::Networked {
                            self.outbound.push(OutboundEvent::ObjectConsumed { id });
                        }
                    }
                }
            }
        }
    }

    /// Top the world back up in standalone mode, at the original's
    /// per-tick probabilities.
    fn replenish(&mut self) {
        let mut rng = rand::rng();
        if self.world.food.len() < self.config.food.max_amount && rng.random::<f32>() < 0.15 {
            self.spawn_food(None, None);
        }
        if self.world.viruses.len() < self.config.virus.max_amount && rng.random::<f32>() < 0.02 {
            self.spawn_virus(None, None);
        }
    }

    // ---- movement / split / eject ---------------------------------------

    /// Steer every player cell toward its owner's target point.
    fn move_players(&mut self) {
        let base = self.config.player.base_speed;
        let factor = self.config.player.speed_factor;

        let mut steering: Vec<(BodyId, Vec2)> = Vec::new();
        for player in self.world.players.values() {
            for cell_id in &player.cells {
                let Some(cell) = self.world.cells.get(cell_id) else {
                    continue;
                };
                let Some(body) = self.physics.body(cell.body) else {
                    continue;
                };
                let to_target = player.target - body.position;
                let distance = to_target.length();
                let radius = cell.radius();
                // Anti-jitter: park when essentially on top of the target.
                if distance < radius * 0.1 {
                    steering.push((cell.body, Vec2::ZERO));
                } else {
                    let speed = util::speed_for_size(radius, base, factor);
                    steering.push((cell.body, to_target / distance * speed));
                }
            }
        }
        for (body, velocity) in steering {
            self.physics.set_velocity(body, velocity);
        }
    }

    /// Keep all cell bodies inside the world bounds.
    fn clamp_bodies(&mut self) {
        let (w, h) = (self.world.width, self.world.height);
        let mut moves: Vec<(BodyId, Vec2)> = Vec::new();
        for cell in self.world.cells.values() {
            let Some(body) = self.physics.body(cell.body) else {
                continue;
            };
            let r = cell.radius().min(w / 2.0).min(h / 2.0);
            let clamped = Vec2::new(
                body.position.x.clamp(r, w - r),
                body.position.y.clamp(r, h - r),
            );
            if clamped != body.position {
                moves.push((cell.body, clamped));
            }
        }
        for (body, position) in moves {
            self.physics.set_position(body, position);
        }
    }

    /// Split every eligible cell of the player in half toward its target.
    pub fn split(&mut self, player_id: &str) {
        let Some(player) = self.world.player(player_id) else {
            return;
        };
        if player.cells.len() >= self.config.player.max_cells {
            return;
        }
        let target = player.target;
        let cell_ids: Vec<CellId> = player.cells.clone();
        let min_radius = self.config.player.min_split_radius;
        let min_mass = util::radius_to_mass(min_radius) * 1.8;
        let impulse = self.config.player.split_impulse;

        for cell_id in cell_ids {
            let Some(player) = self.world.player(player_id) else {
                return;
            };
            if player.cells.len() >= self.config.player.max_cells {
                break;
            }
            let Some(cell) = self.world.cells.get(&cell_id) else {
                continue;
            };
            if cell.radius() < min_radius || cell.mass < min_mass {
                continue;
            }
            let Some(body) = self.physics.body(cell.body) else {
                continue;
            };
            let position = body.position;
            let parent_velocity = body.velocity;
            let new_mass = cell.mass / 2.0;
            if !new_mass.is_finite() || new_mass <= 0.0 {
                continue;
            }

            let tick = self.tick;
            let (base, per_mass) = (
                self.config.player.merge_cooldown_base,
                self.config.player.merge_cooldown_per_mass,
            );
            if let Some(cell) = self.world.cells.get_mut(&cell_id) {
                cell.set_mass(&mut self.physics, new_mass);
                cell.last_split_tick = tick;
                cell.start_merge_cooldown(tick, base, per_mass);
            }

            let new_radius = util::mass_to_radius(new_mass);
            let direction = (target - position).try_normalize().unwrap_or(Vec2::X);
            // Parent has shrunk to the same half, so the gap is symmetric.
            let offset = new_radius + new_radius + 2.0;
            let spawn_pos = position + direction * offset;

            if let Some(new_id) = self.spawn_player_cell(player_id, None, spawn_pos, new_radius) {
                if let Some(new_cell) = self.world.cells.get_mut(&new_id) {
                    // The radius conversion is lossy; both halves carry the
                    // exact half mass.
                    new_cell.set_mass(&mut self.physics, new_mass);
                    new_cell.last_split_tick = tick;
                    new_cell.start_merge_cooldown(tick, base, per_mass);
                    let body = new_cell.body;
                    self.physics
                        .set_velocity(body, parent_velocity + direction * impulse);
                }
            }
        }
        self.world.refresh_player_mass(player_id);
    }

    /// Eject a fixed blob of mass from up to two of the player's cells
    /// toward its target.
    pub fn eject(&mut self, player_id: &str) {
        let Some(player) = self.world.player(player_id) else {
            return;
        };
        let target = player.target;
        let color = player.color;
        let cell_ids: Vec<CellId> = player.cells.clone();
        let eject_radius = self.config.eject.radius;
        let ejected_mass = util::radius_to_mass(eject_radius);
        let min_radius = self.config.player.min_eject_radius;
        let min_mass = util::radius_to_mass(min_radius) + ejected_mass;
        let eject_speed = self.config.eject.speed;

        let mut ejected_count = 0;
        for cell_id in cell_ids {
            let cell_count = self
                .world
                .player(player_id)
                .map(|p| p.cells.len())
                .unwrap_or(0);
            if ejected_count >= 2 && cell_count > 1 {
                break;
            }
            let Some(cell) = self.world.cells.get(&cell_id) else {
                continue;
            };
            if cell.radius() < min_radius || cell.mass < min_mass {
                continue;
            }
            let Some(body) = self.physics.body(cell.body) else {
                continue;
            };
            let position = body.position;
            let source_body = cell.body;
            let remaining = cell.mass - ejected_mass;

            if let Some(cell) = self.world.cells.get_mut(&cell_id) {
                cell.set_mass(&mut self.physics, remaining);
            }

            let direction = (target - position).try_normalize().unwrap_or(Vec2::X);
            let source_radius = util::mass_to_radius(remaining);
            let spawn_pos = position + direction * (source_radius + eject_radius + 2.0);
            let velocity = direction * eject_speed;

            let pellet =
                self.spawn_ejected(None, spawn_pos, color, Some(player_id.to_string()));
            if let Some(pellet_cell) = self.world.cells.get(&pellet) {
                self.physics.set_velocity(pellet_cell.body, velocity);
            }
            // Recoil on the source, weaker than the pellet's kick.
            self.physics
                .apply_force(source_body, -(velocity * ejected_mass / 15.0));
            ejected_count += 1;
        }
        if ejected_count > 0 {
            self.world.refresh_player_mass(player_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_sim() -> Simulation {
        let mut config = Config::default();
        config.bot.count = 0;
        config.food.max_amount = 0;
        config.virus.max_amount = 0;
        Simulation::new(config, SimMode::Standalone)
    }

    fn add_player_with_cell(sim: &mut Simulation, id: &str, mass: f32) -> CellId {
        let position = Vec2::new(500.0, 500.0);
        let mut player = Player::new(id.to_string(), id.to_uppercase(), Color::random());
        player.target = position;
        sim.add_player(player);
        let cell_id = sim
            .spawn_player_cell(id, None, position, util::mass_to_radius(mass))
            .unwrap();
        // The radius conversion is lossy; pin the exact mass.
        if let Some(cell) = sim.world.cells.get_mut(&cell_id) {
            cell.set_mass(&mut sim.physics, mass);
        }
        sim.world.refresh_player_mass(id);
        cell_id
    }

    #[test]
    fn test_split_requires_minimum_size() {
        let mut sim = new_sim();
        add_player_with_cell(&mut sim, "p1", 100.0);
        sim.split("p1");
        assert_eq!(sim.world.player("p1").unwrap().cells.len(), 1);
    }

    #[test]
    fn test_split_halves_and_kicks_the_new_cell() {
        let mut sim = new_sim();
        let cell = add_player_with_cell(&mut sim, "p1", 800.0);
        if let Some(p) = sim.world.player_mut("p1") {
            p.target = Vec2::new(1000.0, 500.0);
        }
        sim.split("p1");

        let player = sim.world.player("p1").unwrap();
        assert_eq!(player.cells.len(), 2);
        assert_eq!(player.total_mass, 800.0);
        let new_id = player.cells.iter().find(|c| **c != cell).unwrap().clone();
        let new_body = sim.world.cell(&new_id).unwrap().body;
        let velocity = sim.physics.body(new_body).unwrap().velocity;
        assert!(velocity.x >= sim.config.player.split_impulse - 1e-3);
    }

    #[test]
    fn test_split_respects_cell_cap() {
        let mut sim = new_sim();
        sim.config.player.max_cells = 2;
        add_player_with_cell(&mut sim, "p1", 3200.0);
        sim.split("p1");
        sim.split("p1");
        assert_eq!(sim.world.player("p1").unwrap().cells.len(), 2);
    }

    #[test]
    fn test_eject_moves_mass_into_pellets() {
        let mut sim = new_sim();
        add_player_with_cell(&mut sim, "p1", 800.0);
        if let Some(p) = sim.world.player_mut("p1") {
            p.target = Vec2::new(1000.0, 500.0);
        }
        sim.eject("p1");

        let pellet_mass = util::radius_to_mass(sim.config.eject.radius);
        assert_eq!(sim.world.ejected.len(), 1);
        let player = sim.world.player("p1").unwrap();
        assert!((player.total_mass - (800.0 - pellet_mass)).abs() < 1e-3);
        let pellet_id = sim.world.ejected.iter().next().unwrap().clone();
        let pellet = sim.world.cell(&pellet_id).unwrap();
        assert!(matches!(&pellet.kind, CellKind::Ejected { owner: Some(o) } if o == "p1"));
    }

    #[test]
    fn test_eject_below_minimum_is_refused() {
        let mut sim = new_sim();
        add_player_with_cell(&mut sim, "p1", 50.0);
        sim.eject("p1");
        assert!(sim.world.ejected.is_empty());
        assert_eq!(sim.world.player("p1").unwrap().total_mass, 50.0);
    }

    #[test]
    fn test_destroy_is_queued_and_idempotent() {
        let mut sim = new_sim();
        let cell = add_player_with_cell(&mut sim, "p1", 100.0);
        let body = sim.world.cell(&cell).unwrap().body;

        assert!(sim.destroy_cell(&cell));
        assert!(!sim.destroy_cell(&cell), "second destroy is a no-op");
        assert_eq!(sim.destruction_queue_len(), 1);
        assert!(sim.physics.contains(body));
        assert!(sim.world.player("p1").unwrap().cells.is_empty());

        sim.flush_destruction_queue();
        assert!(!sim.physics.contains(body));
        assert_eq!(sim.destruction_queue_len(), 0);
    }

    #[test]
    fn test_local_human_elimination_leaves_the_session() {
        let mut sim = new_sim();
        let cell = add_player_with_cell(&mut sim, "me", 100.0);
        if let Some(p) = sim.world.player_mut("me") {
            p.is_local = true;
        }
        sim.local_player = Some("me".to_string());

        sim.destroy_cell(&cell);
        sim.check_elimination("me");

        assert!(sim.world.player("me").is_none());
        assert!(sim.local_player.is_none());
        // Nothing left to eliminate; a second check emits nothing.
        sim.check_elimination("me");
        let eliminated = sim
            .take_outbound()
            .iter()
            .filter(|e| matches!(e, OutboundEvent::PlayerEliminated { .. }))
            .count();
        assert_eq!(eliminated, 1);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut sim = new_sim();
        add_player_with_cell(&mut sim, "p1", 100.0);
        sim.spawn_food(None, None);
        sim.spawn_virus(None, None);

        sim.shutdown();

        assert_eq!(sim.physics.body_count(), 0);
        assert!(sim.world.cells.is_empty());
        assert!(sim.world.players.is_empty());
    }

    #[test]
    fn test_cells_stay_inside_the_world() {
        let mut sim = new_sim();
        let cell = add_player_with_cell(&mut sim, "p1", 100.0);
        let body = sim.world.cell(&cell).unwrap().body;
        sim.physics.set_position(body, Vec2::new(-50.0, 9999.0));

        sim.step();

        let position = sim.physics.body(body).unwrap().position;
        let radius = sim.world.cell(&cell).unwrap().radius();
        assert!(position.x >= radius);
        assert!(position.y <= sim.world.height - radius);
    }
}
