//! Shared-state store boundary.
//!
//! In a shared arena every peer runs its own full simulation and
//! converges through a store of object records and player snapshots.
//! The store is a trait so sessions can run against the in-memory
//! implementation in tests and a real backend in production.

use crate::entity::{CellId, PlayerId};
use crate::remote::sync::PlayerSnapshot;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};

/// Kind tag for shared non-player objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Food,
    Virus,
    Ejected,
}

/// One shared object as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObjectRecord {
    pub id: CellId,
    pub kind: ObjectKind,
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Hex color string, e.g. `#ff8800`.
    pub color: String,
    pub owner: Option<PlayerId>,
}

impl GameObjectRecord {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Store failures. `AlreadyExists` is benign: concurrent peers racing to
/// insert the same record is expected, and callers treat it as success.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record {0} already exists")]
    AlreadyExists(String),
    #[error("record {0} not found")]
    NotFound(String),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the error leaves the store in the state the caller wanted
    /// anyway.
    pub fn is_benign(&self) -> bool {
        matches!(self, StoreError::AlreadyExists(_) | StoreError::NotFound(_))
    }
}

/// Change notifications fanned out to subscribed sessions.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    ObjectInserted(GameObjectRecord),
    ObjectRemoved(CellId),
    PlayerUpserted(PlayerSnapshot),
    PlayerRemoved(PlayerId),
    HighScore { name: String, score: f32 },
}

/// The shared-state store surface.
pub trait StateStore: Send + Sync + 'static {
    fn insert_object(
        &self,
        record: GameObjectRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove_object(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_objects(&self) -> impl Future<Output = Result<Vec<GameObjectRecord>, StoreError>> + Send;

    fn upsert_player(
        &self,
        snapshot: PlayerSnapshot,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn remove_player(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn list_players(&self) -> impl Future<Output = Result<Vec<PlayerSnapshot>, StoreError>> + Send;

    /// Record a final score; the store keeps whatever notion of "best"
    /// it wants.
    fn submit_high_score(
        &self,
        name: &str,
        score: f32,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Subscribe to change events. Slow receivers may observe lag.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

#[derive(Debug, Default)]
struct MemoryState {
    objects: HashMap<CellId, GameObjectRecord>,
    players: HashMap<PlayerId, PlayerSnapshot>,
    high_scores: Vec<(String, f32)>,
}

/// In-process store used by tests and standalone-with-store setups.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            state: Mutex::new(MemoryState::default()),
            events,
        }
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Best recorded scores, highest first.
    pub async fn high_scores(&self) -> Vec<(String, f32)> {
        let state = self.state.lock().await;
        let mut rows = state.high_scores.clone();
        rows.sort_by(|a, b| b.1.total_cmp(&a.1));
        rows
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for MemoryStore {
    async fn insert_object(&self, record: GameObjectRecord) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.objects.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        state.objects.insert(record.id.clone(), record.clone());
        drop(state);
        self.emit(StoreEvent::ObjectInserted(record));
        Ok(())
    }

    async fn remove_object(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.objects.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        drop(state);
        self.emit(StoreEvent::ObjectRemoved(id.to_string()));
        Ok(())
    }

    async fn list_objects(&self) -> Result<Vec<GameObjectRecord>, StoreError> {
        Ok(self.state.lock().await.objects.values().cloned().collect())
    }

    async fn upsert_player(&self, snapshot: PlayerSnapshot) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.players.insert(snapshot.id.clone(), snapshot.clone());
        drop(state);
        self.emit(StoreEvent::PlayerUpserted(snapshot));
        Ok(())
    }

    async fn remove_player(&self, id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.players.remove(id).is_none() {
            return Err(StoreError::NotFound(id.to_string()));
        }
        drop(state);
        self.emit(StoreEvent::PlayerRemoved(id.to_string()));
        Ok(())
    }

    async fn list_players(&self) -> Result<Vec<PlayerSnapshot>, StoreError> {
        Ok(self.state.lock().await.players.values().cloned().collect())
    }

    async fn submit_high_score(&self, name: &str, score: f32) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.high_scores.push((name.to_string(), score));
        drop(state);
        self.emit(StoreEvent::HighScore {
            name: name.to_string(),
            score,
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}
