//! Remote-player reconciliation.
//!
//! Every peer publishes snapshots of its own player and materializes the
//! others from the store. A snapshot is never applied verbatim while it
//! is fresh: the cell is led from its current local position toward the
//! owner's target, scaled by the snapshot's age, and the local body is
//! blended toward that prediction, which hides snapshot cadence without
//! teleporting cells. Old snapshots, first sightings, and externally
//! driven agents are placed directly.

use crate::entity::{CellId, Player, PlayerId};
use crate::remote::store::{GameObjectRecord, ObjectKind, StateStore, StoreEvent};
use crate::simulation::{OutboundEvent, Simulation};
use crate::util::{self, Color};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Extrapolation gain per elapsed snapshot interval.
const EXTRAPOLATION_RATE: f32 = 0.01;
/// Nominal ms between peer snapshots, used to scale extrapolation.
const SNAPSHOT_INTERVAL_MS: f32 = 16.0;
/// Fraction of the position error corrected per applied snapshot.
const POSITION_BLEND: f32 = 0.2;
/// Fraction of the velocity error corrected per applied snapshot.
const VELOCITY_BLEND: f32 = 0.1;
/// Mass differences below this are snapshot noise and skipped.
const MASS_EPSILON: f32 = 1.0;

/// One cell as published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellSnapshot {
    pub id: CellId,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub mass: f32,
}

impl CellSnapshot {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn velocity(&self) -> Vec2 {
        Vec2::new(self.vx, self.vy)
    }
}

/// One player as published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    /// Hex color string.
    pub color: String,
    pub cells: Vec<CellSnapshot>,
    pub total_mass: f32,
    pub max_mass: f32,
    pub target_x: f32,
    pub target_y: f32,
    pub external_agent: bool,
    /// Wall-clock ms at which the publishing peer took the snapshot.
    pub updated_at_ms: u64,
}

impl Simulation {
    /// Whether this tick is a publish tick for local snapshots.
    pub fn should_publish(&self) -> bool {
        let interval = self.config.sync.publish_interval_ticks.max(1);
        self.tick % interval == 0
    }

    /// Snapshot a locally simulated player for publishing.
    pub fn snapshot_player(&self, player_id: &str, now_ms: u64) -> Option<PlayerSnapshot> {
        let player = self.world.player(player_id)?;
        let mut cells = Vec::with_capacity(player.cells.len());
        for cell_id in &player.cells {
            let Some(cell) = self.world.cell(cell_id) else {
                continue;
            };
            let Some(body) = self.physics.body(cell.body) else {
                continue;
            };
            cells.push(CellSnapshot {
                id: cell_id.clone(),
                x: body.position.x,
                y: body.position.y,
                vx: body.velocity.x,
                vy: body.velocity.y,
                mass: cell.mass,
            });
        }
        Some(PlayerSnapshot {
            id: player.id.clone(),
            name: player.name.clone(),
            color: player.color.to_hex(),
            cells,
            total_mass: player.total_mass,
            max_mass: player.max_mass,
            target_x: player.target.x,
            target_y: player.target.y,
            external_agent: player.external_agent,
            updated_at_ms: now_ms,
        })
    }

    /// Apply a peer's snapshot. Snapshots for locally simulated players
    /// are ignored; the local session is the authority for those.
    pub fn apply_player_snapshot(&mut self, snapshot: PlayerSnapshot, now_ms: u64) {
        if self.local_player.as_deref() == Some(snapshot.id.as_str()) {
            return;
        }
        if self
            .world
            .player(&snapshot.id)
            .is_some_and(|p| p.is_local)
        {
            return;
        }

        let elapsed_ms = now_ms.saturating_sub(snapshot.updated_at_ms);
        // Predicting from a snapshot this old does more harm than good,
        // and agent-service state is authoritative as published.
        let place_directly = snapshot.external_agent
            || elapsed_ms > self.config.sync.dead_reckoning_threshold_ms;

        let color = Color::from_hex(&snapshot.color).unwrap_or_default();
        if self.world.player(&snapshot.id).is_none() {
            let mut player =
                Player::new(snapshot.id.clone(), snapshot.name.clone(), color);
            player.external_agent = snapshot.external_agent;
            self.add_player(player);
        }
        if let Some(player) = self.world.player_mut(&snapshot.id) {
            player.name = snapshot.name.clone();
            player.color = color;
            player.target = Vec2::new(snapshot.target_x, snapshot.target_y);
            if snapshot.max_mass > player.max_mass {
                player.max_mass = snapshot.max_mass;
            }
            player.last_update_ms = now_ms;
        }

        let target = Vec2::new(snapshot.target_x, snapshot.target_y);
        let mut seen: HashSet<CellId> = HashSet::new();
        for cell_snapshot in &snapshot.cells {
            seen.insert(cell_snapshot.id.clone());
            match self.world.cell(&cell_snapshot.id) {
                Some(_) => {
                    self.reconcile_cell(cell_snapshot, target, elapsed_ms, place_directly);
                }
                None => {
                    let radius = util::mass_to_radius(cell_snapshot.mass);
                    let created = self.spawn_player_cell(
                        &snapshot.id,
                        Some(cell_snapshot.id.clone()),
                        cell_snapshot.position(),
                        radius,
                    );
                    if created.is_some() {
                        if let Some(cell) = self.world.cell(&cell_snapshot.id) {
                            self.physics
                                .set_velocity(cell.body, cell_snapshot.velocity());
                        }
                        // Radius round-trips lossily; keep the reported mass.
                        if let Some(cell) = self.world.cells.get_mut(&cell_snapshot.id) {
                            cell.set_mass(&mut self.physics, cell_snapshot.mass);
                        }
                    }
                }
            }
        }

        // Cells the owner no longer reports are gone on the owning peer.
        let stale: Vec<CellId> = self
            .world
            .player(&snapshot.id)
            .map(|p| {
                p.cells
                    .iter()
                    .filter(|id| !seen.contains(*id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        for cell_id in stale {
            self.destroy_cell(&cell_id);
        }

        self.world.refresh_player_mass(&snapshot.id);
    }

    fn reconcile_cell(
        &mut self,
        snapshot: &CellSnapshot,
        target: Vec2,
        elapsed_ms: u64,
        place_directly: bool,
    ) {
        let Some(cell) = self.world.cell(&snapshot.id) else {
            return;
        };
        let body_id = cell.body;
        let radius = cell.radius();
        let snap_pos = snapshot.position();
        let snap_vel = snapshot.velocity();

        if place_directly {
            self.physics.set_position(body_id, snap_pos);
            self.physics.set_velocity(body_id, snap_vel);
        } else if let Some(body) = self.physics.body(body_id) {
            // The cell keeps moving toward the owner's target during the
            // snapshot gap: lead the local position that way, scaled by
            // the snapshot's age, and correct a fraction of the error.
            let lead = EXTRAPOLATION_RATE * elapsed_ms as f32 / SNAPSHOT_INTERVAL_MS;
            let predicted = body.position + (target - body.position) * lead;
            let position = body.position + (predicted - body.position) * POSITION_BLEND;
            let speed = util::speed_for_size(
                radius,
                self.config.player.base_speed,
                self.config.player.speed_factor,
            );
            let implied = (target - body.position)
                .try_normalize()
                .unwrap_or(Vec2::ZERO)
                * speed;
            let velocity = body.velocity.lerp(implied, VELOCITY_BLEND);
            self.physics.set_position(body_id, position);
            self.physics.set_velocity(body_id, velocity);
        }

        let current_mass = self.world.cell(&snapshot.id).map(|c| c.mass);
        if let Some(mass) = current_mass {
            if (mass - snapshot.mass).abs() > MASS_EPSILON {
                if let Some(cell) = self.world.cells.get_mut(&snapshot.id) {
                    cell.set_mass(&mut self.physics, snapshot.mass);
                }
            }
        }
    }

    /// Remove a remote player and every cell it still owns.
    pub fn remove_remote_player(&mut self, player_id: &str) {
        let Some(player) = self.world.player(player_id) else {
            return;
        };
        if player.is_local {
            return;
        }
        let cells = player.cells.clone();
        for cell_id in cells {
            self.destroy_cell(&cell_id);
        }
        self.world.players.remove(player_id);
        debug!(player = %player_id, "remote player removed");
    }

    /// Drop remote players whose snapshots stopped arriving. Returns the
    /// removed ids so the session can also clear their store records.
    pub fn cleanup_stale_players(&mut self, now_ms: u64) -> Vec<PlayerId> {
        let ttl = self.config.sync.stale_player_ms;
        let stale: Vec<PlayerId> = self
            .world
            .players
            .values()
            .filter(|p| !p.is_local && now_ms.saturating_sub(p.last_update_ms) > ttl)
            .map(|p| p.id.clone())
            .collect();
        for player_id in &stale {
            warn!(player = %player_id, "dropping stale remote player");
            self.remove_remote_player(player_id);
        }
        stale
    }

    /// Fold one store change event into the session.
    pub fn apply_store_event(&mut self, event: StoreEvent, now_ms: u64) {
        match event {
            StoreEvent::ObjectInserted(record) => self.materialize_object(record),
            StoreEvent::ObjectRemoved(id) => {
                self.destroy_cell(&id);
            }
            StoreEvent::PlayerUpserted(snapshot) => {
                self.apply_player_snapshot(snapshot, now_ms);
            }
            StoreEvent::PlayerRemoved(id) => self.remove_remote_player(&id),
            StoreEvent::HighScore { name, score } => {
                debug!(%name, score, "high score recorded");
            }
        }
    }

    /// Create the local entity for a shared object record. Records the
    /// session already has (its own announcement echoed back, or a race
    /// with another peer) are ignored.
    pub fn materialize_object(&mut self, record: GameObjectRecord) {
        if self.world.cell(&record.id).is_some() {
            return;
        }
        let color = Color::from_hex(&record.color).unwrap_or_default();
        let position = record.position();
        match record.kind {
            ObjectKind::Food => {
                self.spawn_food_colored(Some(record.id), position, record.radius, color);
            }
            ObjectKind::Virus => {
                self.spawn_virus(Some(record.id), Some(position));
            }
            ObjectKind::Ejected => {
                self.spawn_ejected(Some(record.id), position, color, record.owner);
            }
        }
    }
}

/// Join a shared arena: open the change subscription first, then load
/// the full object and player tables. Applying the snapshot under an
/// already-open subscription means no change slips between fetch and
/// subscribe; event application is idempotent, so a change seen twice is
/// harmless.
pub async fn bootstrap<S: StateStore>(
    sim: &mut Simulation,
    store: &S,
    now_ms: u64,
) -> Result<tokio::sync::broadcast::Receiver<StoreEvent>, crate::remote::store::StoreError> {
    let receiver = store.subscribe();
    for record in store.list_objects().await? {
        sim.materialize_object(record);
    }
    for snapshot in store.list_players().await? {
        sim.apply_player_snapshot(snapshot, now_ms);
    }
    Ok(receiver)
}

/// Push a batch of outbound events to the store. Benign failures
/// (duplicate inserts, already-removed records) are expected in a
/// multi-peer arena and ignored.
pub async fn publish_events<S: StateStore>(store: &S, events: Vec<OutboundEvent>) {
    for event in events {
        let result = match event {
            OutboundEvent::ObjectSpawned {
                id,
                kind,
                position,
                radius,
                color,
                owner,
            } => {
                store
                    .insert_object(GameObjectRecord {
                        id,
                        kind,
                        x: position.x,
                        y: position.y,
                        radius,
                        color: color.to_hex(),
                        owner,
                    })
                    .await
            }
            OutboundEvent::ObjectConsumed { id } => store.remove_object(&id).await,
            OutboundEvent::PlayerEliminated {
                id,
                name,
                max_mass,
                local,
                ..
            } => {
                // Peers observe remote deaths too; only the owning
                // session writes them.
                if !local {
                    continue;
                }
                if let Err(err) = store.remove_player(&id).await {
                    if !err.is_benign() {
                        warn!(error = %err, player = %id, "failed to remove player record");
                    }
                }
                store.submit_high_score(&name, max_mass).await
            }
        };
        if let Err(err) = result {
            if !err.is_benign() {
                warn!(error = %err, "store publish failed");
            }
        }
    }
}
