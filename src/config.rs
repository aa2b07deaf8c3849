//! Simulation configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub world: WorldConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub food: FoodConfig,
    #[serde(default)]
    pub virus: VirusConfig,
    #[serde(default)]
    pub eject: EjectConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Load configuration from `config.toml` or use defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = Path::new("config.toml");
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&contents)?)
        } else {
            info!("No config.toml found, creating default config");
            let default_config = Self::default();
            std::fs::write(path, toml::to_string_pretty(&default_config)?)?;
            Ok(default_config)
        }
    }
}

/// World bounds and tick cadence.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorldConfig {
    #[serde(default = "default_world_size")]
    pub width: f32,
    #[serde(default = "default_world_size")]
    pub height: f32,
    /// Simulation ticks per second.
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    /// Edge padding for random spawn positions.
    #[serde(default = "default_spawn_padding")]
    pub spawn_padding: f32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_world_size(),
            height: default_world_size(),
            tick_rate: default_tick_rate(),
            spawn_padding: default_spawn_padding(),
        }
    }
}

fn default_world_size() -> f32 {
    4000.0
}
fn default_tick_rate() -> u32 {
    60
}
fn default_spawn_padding() -> f32 {
    200.0
}

/// Player cell tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlayerConfig {
    /// Radius of a freshly spawned player cell.
    #[serde(default = "default_initial_radius")]
    pub initial_radius: f32,
    /// Minimum radius a cell needs before it may split.
    #[serde(default = "default_min_split_radius")]
    pub min_split_radius: f32,
    /// Minimum radius a cell needs before it may eject mass.
    #[serde(default = "default_min_eject_radius")]
    pub min_eject_radius: f32,
    #[serde(default = "default_max_cells")]
    pub max_cells: usize,
    #[serde(default = "default_base_speed")]
    pub base_speed: f32,
    /// Divisor in the speed curve `base / (1 + size / factor)`.
    #[serde(default = "default_speed_factor")]
    pub speed_factor: f32,
    /// Merge cooldown in ticks: `base + mass * per_mass`.
    #[serde(default = "default_merge_cooldown_base")]
    pub merge_cooldown_base: f32,
    #[serde(default = "default_merge_cooldown_per_mass")]
    pub merge_cooldown_per_mass: f32,
    /// Outward velocity given to the new half on a manual split.
    #[serde(default = "default_split_impulse")]
    pub split_impulse: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            initial_radius: default_initial_radius(),
            min_split_radius: default_min_split_radius(),
            min_eject_radius: default_min_eject_radius(),
            max_cells: default_max_cells(),
            base_speed: default_base_speed(),
            speed_factor: default_speed_factor(),
            merge_cooldown_base: default_merge_cooldown_base(),
            merge_cooldown_per_mass: default_merge_cooldown_per_mass(),
            split_impulse: default_split_impulse(),
        }
    }
}

fn default_initial_radius() -> f32 {
    6.0
}
fn default_min_split_radius() -> f32 {
    9.0
}
fn default_min_eject_radius() -> f32 {
    9.0
}
fn default_max_cells() -> usize {
    8
}
fn default_base_speed() -> f32 {
    6.0
}
fn default_speed_factor() -> f32 {
    20.0
}
fn default_merge_cooldown_base() -> f32 {
    600.0
}
fn default_merge_cooldown_per_mass() -> f32 {
    0.5
}
fn default_split_impulse() -> f32 {
    12.0
}

/// Food pellet tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FoodConfig {
    #[serde(default = "default_food_radius")]
    pub radius: f32,
    #[serde(default = "default_food_max_amount")]
    pub max_amount: usize,
}

impl Default for FoodConfig {
    fn default() -> Self {
        Self {
            radius: default_food_radius(),
            max_amount: default_food_max_amount(),
        }
    }
}

fn default_food_radius() -> f32 {
    1.5
}
fn default_food_max_amount() -> usize {
    150
}

/// Virus tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VirusConfig {
    #[serde(default = "default_virus_radius")]
    pub radius: f32,
    #[serde(default = "default_virus_max_amount")]
    pub max_amount: usize,
    /// Force factor for the outward push on burst fragments.
    #[serde(default = "default_virus_impulse_factor")]
    pub impulse_factor: f32,
}

impl Default for VirusConfig {
    fn default() -> Self {
        Self {
            radius: default_virus_radius(),
            max_amount: default_virus_max_amount(),
            impulse_factor: default_virus_impulse_factor(),
        }
    }
}

fn default_virus_radius() -> f32 {
    12.0
}
fn default_virus_max_amount() -> usize {
    8
}
fn default_virus_impulse_factor() -> f32 {
    2.5
}

/// Ejected mass tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EjectConfig {
    #[serde(default = "default_eject_radius")]
    pub radius: f32,
    #[serde(default = "default_eject_speed")]
    pub speed: f32,
    /// Ticks during which the ejecting player cannot re-absorb its own pellet.
    #[serde(default = "default_eject_self_cooldown")]
    pub self_eat_cooldown: u64,
    /// Ticks until an ejected pellet expires on its own.
    #[serde(default = "default_eject_lifespan")]
    pub lifespan: u64,
}

impl Default for EjectConfig {
    fn default() -> Self {
        Self {
            radius: default_eject_radius(),
            speed: default_eject_speed(),
            self_eat_cooldown: default_eject_self_cooldown(),
            lifespan: default_eject_lifespan(),
        }
    }
}

fn default_eject_radius() -> f32 {
    1.8
}
fn default_eject_speed() -> f32 {
    10.0
}
fn default_eject_self_cooldown() -> u64 {
    60
}
fn default_eject_lifespan() -> u64 {
    1800
}

/// Bot decision engine tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotConfig {
    #[serde(default = "default_bot_count")]
    pub count: usize,
    /// Decision re-evaluation interval bounds in ticks (randomized per
    /// decision to desynchronize bots).
    #[serde(default = "default_decision_min")]
    pub decision_min_ticks: u64,
    #[serde(default = "default_decision_max")]
    pub decision_max_ticks: u64,
    /// Distance of the flee point past the bot's center of mass.
    #[serde(default = "default_flee_offset")]
    pub flee_offset: f32,
    /// Distance at which a wander point counts as reached.
    #[serde(default = "default_wander_reach")]
    pub wander_reach: f32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            count: default_bot_count(),
            decision_min_ticks: default_decision_min(),
            decision_max_ticks: default_decision_max(),
            flee_offset: default_flee_offset(),
            wander_reach: default_wander_reach(),
        }
    }
}

fn default_bot_count() -> usize {
    5
}
fn default_decision_min() -> u64 {
    30
}
fn default_decision_max() -> u64 {
    120
}
fn default_flee_offset() -> f32 {
    300.0
}
fn default_wander_reach() -> f32 {
    50.0
}

/// Remote synchronization tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyncConfig {
    /// Snapshots older than this are placed directly instead of predicted.
    #[serde(default = "default_dead_reckoning_ms")]
    pub dead_reckoning_threshold_ms: u64,
    /// Remote players unseen for this long are dropped by cleanup.
    #[serde(default = "default_stale_player_ms")]
    pub stale_player_ms: u64,
    /// Ticks between local-player snapshot publishes.
    #[serde(default = "default_publish_interval")]
    pub publish_interval_ticks: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            dead_reckoning_threshold_ms: default_dead_reckoning_ms(),
            stale_player_ms: default_stale_player_ms(),
            publish_interval_ticks: default_publish_interval(),
        }
    }
}

fn default_dead_reckoning_ms() -> u64 {
    3000
}
fn default_stale_player_ms() -> u64 {
    30_000
}
fn default_publish_interval() -> u64 {
    6
}
