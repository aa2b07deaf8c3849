//! The bot decision engine.
//!
//! Each bot re-evaluates its situation on a randomized interval and
//! transitions between a handful of states; between decisions it keeps
//! steering toward whatever its current state points at. Bots act purely
//! through the same operations a player has: a target point, split, and
//! eject.

use crate::entity::{CellId, PlayerId, Player};
use crate::simulation::Simulation;
use crate::util::{self, Color};
use glam::Vec2;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

/// Largest-cell radius advantage before another player counts as prey
/// or threat.
const SIZE_ADVANTAGE: f32 = 1.15;
/// Prey is only chased within this many largest-cell radii.
const PREY_RANGE_FACTOR: f32 = 8.0;
/// Threats are noticed within this many largest-cell radii.
const THREAT_RANGE_FACTOR: f32 = 4.0;

/// A virus that would pop the bot's largest cell counts as a threat
/// inside this many largest-cell radii.
const VIRUS_AVOID_RANGE_FACTOR: f32 = 3.0;
/// A cell bigger than this fraction of a virus's radius gets popped.
const VIRUS_POP_FACTOR: f32 = 0.9;

/// Aggressive split while hunting: mass advantage, range, and per-tick
/// chance.
const HUNT_SPLIT_ADVANTAGE: f32 = 1.5;
const HUNT_SPLIT_RANGE_FACTOR: f32 = 3.0;
const HUNT_SPLIT_CHANCE: f32 = 0.02;

/// Harassing eject while hunting: mass advantage, range, and per-tick
/// chance.
const HUNT_EJECT_ADVANTAGE: f32 = 1.2;
const HUNT_EJECT_RANGE_FACTOR: f32 = 5.0;
const HUNT_EJECT_CHANCE: f32 = 0.01;

const BOT_NAMES: &[&str] = &[
    "Mito", "Vacuole", "Golgi", "Ribo", "Lyso", "Plasmid", "Flagella", "Cilia", "Spore", "Amoeba",
];

/// What a bot is currently doing.
#[derive(Debug, Clone, PartialEq)]
pub enum BotState {
    Idle,
    Wandering { point: Vec2 },
    SeekingFood { target: CellId },
    Hunting { prey: PlayerId },
    Fleeing { threat: PlayerId },
    AvoidingVirus { virus: CellId },
}

/// Per-bot decision state.
#[derive(Debug, Clone)]
pub struct BotBrain {
    pub state: BotState,
    next_decision_tick: u64,
}

impl BotBrain {
    pub fn new() -> Self {
        Self {
            state: BotState::Idle,
            next_decision_tick: 0,
        }
    }

    /// Advance this bot one tick: respawn if dead, re-decide when the
    /// interval elapsed, then steer per the current state.
    fn drive(&mut self, sim: &mut Simulation, bot_id: &str) {
        let Some(player) = sim.world.player(bot_id) else {
            return;
        };
        if player.cells.is_empty() {
            sim.spawn_starting_cell(bot_id);
            self.state = BotState::Idle;
            self.schedule_next_decision(sim);
            return;
        }
        if sim.tick >= self.next_decision_tick {
            self.decide(sim, bot_id);
            self.schedule_next_decision(sim);
        }
        self.steer(sim, bot_id);
    }

    fn schedule_next_decision(&mut self, sim: &Simulation) {
        let (min, max) = (
            sim.config.bot.decision_min_ticks,
            sim.config.bot.decision_max_ticks.max(sim.config.bot.decision_min_ticks + 1),
        );
        self.next_decision_tick = sim.tick + rand::rng().random_range(min..max);
    }

    /// Survey the arena and pick a new state. Threats dominate viruses,
    /// viruses dominate prey, prey dominates food, food dominates
    /// wandering. Size comparisons use the largest-cell radius; a bot
    /// split into many small cells is not a threat to anyone.
    fn decide(&mut self, sim: &Simulation, bot_id: &str) {
        let Some(me) = sim.world.player(bot_id) else {
            return;
        };
        let my_center = me.center_of_mass(&sim.world, &sim.physics);
        let my_radius = me.largest_radius(&sim.world).max(1.0);

        let mut threat: Option<(PlayerId, f32)> = None;
        let mut prey: Option<(PlayerId, f32)> = None;
        for other in sim.world.players.values() {
            if other.id == bot_id || other.cells.is_empty() {
                continue;
            }
            let center = other.center_of_mass(&sim.world, &sim.physics);
            let dist = my_center.distance(center);
            let other_radius = other.largest_radius(&sim.world);
            if other_radius > my_radius * SIZE_ADVANTAGE
                && dist < my_radius * THREAT_RANGE_FACTOR
                && threat.as_ref().is_none_or(|(_, d)| dist < *d)
            {
                threat = Some((other.id.clone(), dist));
            }
            if my_radius > other_radius * SIZE_ADVANTAGE
                && dist < my_radius * PREY_RANGE_FACTOR
                && prey.as_ref().is_none_or(|(_, d)| dist < *d)
            {
                prey = Some((other.id.clone(), dist));
            }
        }

        if let Some((threat_id, _)) = threat {
            debug!(bot = %bot_id, threat = %threat_id, "bot fleeing");
            self.state = BotState::Fleeing { threat: threat_id };
            return;
        }

        // A virus big enough to pop the largest cell is dangerous too,
        // but only once the bot is nearly on top of it.
        let mut virus: Option<(CellId, f32)> = None;
        for id in &sim.world.viruses {
            let Some(cell) = sim.world.cell(id) else {
                continue;
            };
            let Some(body) = sim.physics.body(cell.body) else {
                continue;
            };
            if my_radius <= cell.radius() * VIRUS_POP_FACTOR {
                continue;
            }
            let dist = my_center.distance(body.position);
            if dist < my_radius * VIRUS_AVOID_RANGE_FACTOR
                && virus.as_ref().is_none_or(|(_, d)| dist < *d)
            {
                virus = Some((id.clone(), dist));
            }
        }
        if let Some((virus_id, _)) = virus {
            debug!(bot = %bot_id, virus = %virus_id, "bot avoiding virus");
            self.state = BotState::AvoidingVirus { virus: virus_id };
            return;
        }

        if let Some((prey_id, _)) = prey {
            debug!(bot = %bot_id, prey = %prey_id, "bot hunting");
            self.state = BotState::Hunting { prey: prey_id };
            return;
        }

        if let Some(food_id) = nearest_food(sim, my_center) {
            self.state = BotState::SeekingFood { target: food_id };
            return;
        }

        self.state = BotState::Wandering {
            point: util::random_position(sim.world.width, sim.world.height, 50.0),
        };
    }

    /// Point the player target where the current state says to go, and
    /// while hunting press the advantage with a split or a feed. States
    /// whose subject has disappeared fall back to idle and force an early
    /// re-decision.
    fn steer(&mut self, sim: &mut Simulation, bot_id: &str) {
        enum HuntAction {
            Split,
            Eject,
        }

        let Some(me) = sim.world.player(bot_id) else {
            return;
        };
        let my_center = me.center_of_mass(&sim.world, &sim.physics);
        let my_mass = me.total_mass;
        let my_radius = me.largest_radius(&sim.world).max(1.0);

        let mut action: Option<HuntAction> = None;
        let target = match &self.state {
            BotState::Idle => my_center,
            BotState::Wandering { point } => {
                if my_center.distance(*point) < sim.config.bot.wander_reach {
                    let fresh =
                        util::random_position(sim.world.width, sim.world.height, 50.0);
                    self.state = BotState::Wandering { point: fresh };
                    fresh
                } else {
                    *point
                }
            }
            BotState::SeekingFood { target } => {
                match sim
                    .world
                    .cell(target)
                    .and_then(|c| sim.physics.body(c.body))
                {
                    Some(body) => body.position,
                    None => {
                        // Someone else got it.
                        self.state = BotState::Idle;
                        self.next_decision_tick = sim.tick;
                        my_center
                    }
                }
            }
            BotState::Hunting { prey } => match sim.world.player(prey) {
                Some(p)
                    if !p.cells.is_empty()
                        && my_radius > p.largest_radius(&sim.world) * SIZE_ADVANTAGE =>
                {
                    let center = p.center_of_mass(&sim.world, &sim.physics);
                    let dist = my_center.distance(center);
                    let prey_mass = p.total_mass;
                    // Split-kill when close and far ahead; otherwise
                    // occasionally throw mass at the chase.
                    if my_mass > prey_mass * HUNT_SPLIT_ADVANTAGE
                        && dist < my_radius * HUNT_SPLIT_RANGE_FACTOR
                        && rand::rng().random::<f32>() < HUNT_SPLIT_CHANCE
                    {
                        action = Some(HuntAction::Split);
                    } else if my_mass > prey_mass * HUNT_EJECT_ADVANTAGE
                        && dist < my_radius * HUNT_EJECT_RANGE_FACTOR
                        && rand::rng().random::<f32>() < HUNT_EJECT_CHANCE
                    {
                        action = Some(HuntAction::Eject);
                    }
                    center
                }
                _ => {
                    self.state = BotState::Idle;
                    self.next_decision_tick = sim.tick;
                    my_center
                }
            },
            BotState::Fleeing { threat } => match sim.world.player(threat) {
                Some(t) if !t.cells.is_empty() => {
                    let away = (my_center
                        - t.center_of_mass(&sim.world, &sim.physics))
                    .try_normalize()
                    .unwrap_or(Vec2::X);
                    sim.world
                        .clamp_point(my_center + away * sim.config.bot.flee_offset)
                }
                _ => {
                    self.state = BotState::Idle;
                    self.next_decision_tick = sim.tick;
                    my_center
                }
            },
            BotState::AvoidingVirus { virus } => {
                match sim.world.cell(virus).and_then(|c| sim.physics.body(c.body)) {
                    Some(body) => {
                        let away = (my_center - body.position)
                            .try_normalize()
                            .unwrap_or(Vec2::X);
                        sim.world
                            .clamp_point(my_center + away * sim.config.bot.flee_offset)
                    }
                    None => {
                        self.state = BotState::Idle;
                        self.next_decision_tick = sim.tick;
                        my_center
                    }
                }
            }
        };

        if let Some(me) = sim.world.player_mut(bot_id) {
            me.target = target;
        }
        match action {
            Some(HuntAction::Split) => {
                sim.split(bot_id);
            }
            Some(HuntAction::Eject) => {
                sim.eject(bot_id);
            }
            None => {}
        }
    }
}

impl Default for BotBrain {
    fn default() -> Self {
        Self::new()
    }
}

fn nearest_food(sim: &Simulation, from: Vec2) -> Option<CellId> {
    let mut best: Option<(CellId, f32)> = None;
    for id in &sim.world.food {
        let Some(cell) = sim.world.cell(id) else {
            continue;
        };
        let Some(body) = sim.physics.body(cell.body) else {
            continue;
        };
        let dist = from.distance_squared(body.position);
        if best.as_ref().is_none_or(|(_, d)| dist < *d) {
            best = Some((id.clone(), dist));
        }
    }
    best.map(|(id, _)| id)
}

/// Owns the brains of all locally simulated bots.
#[derive(Debug, Default)]
pub struct BotManager {
    brains: HashMap<PlayerId, BotBrain>,
}

impl BotManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh brain for a bot player.
    pub fn register(&mut self, id: PlayerId) {
        self.brains.insert(id, BotBrain::new());
    }

    pub fn remove(&mut self, id: &str) -> Option<BotBrain> {
        self.brains.remove(id)
    }

    pub fn ids(&self) -> Vec<PlayerId> {
        self.brains.keys().cloned().collect()
    }

    pub fn take(&mut self, id: &str) -> Option<BotBrain> {
        self.brains.remove(id)
    }

    pub fn put(&mut self, id: PlayerId, brain: BotBrain) {
        self.brains.insert(id, brain);
    }

    pub fn len(&self) -> usize {
        self.brains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brains.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn state_of(&self, id: &str) -> Option<&BotState> {
        self.brains.get(id).map(|b| &b.state)
    }
}

impl Simulation {
    /// Spawn one bot: player record, starting cell, and a brain.
    pub fn spawn_bot(&mut self) -> PlayerId {
        let id = util::unique_id("bot_");
        let name = {
            let mut rng = rand::rng();
            let base = BOT_NAMES[rng.random_range(0..BOT_NAMES.len())];
            format!("{base}-{}", rng.random_range(10..100))
        };
        let mut player = Player::new(id.clone(), name, Color::random());
        player.is_bot = true;
        player.is_local = true;
        self.add_player(player);
        self.spawn_starting_cell(&id);
        self.bots.register(id.clone());
        id
    }

    /// Spawn the configured bot population.
    pub fn spawn_bots(&mut self) {
        for _ in 0..self.config.bot.count {
            self.spawn_bot();
        }
    }

    /// Drive every bot one tick. Each brain is taken out of the manager
    /// while it runs so it can mutate the session freely.
    pub(crate) fn run_bots(&mut self) {
        for id in self.bots.ids() {
            let Some(mut brain) = self.bots.take(&id) else {
                continue;
            };
            brain.drive(self, &id);
            self.bots.put(id, brain);
        }
    }
}
