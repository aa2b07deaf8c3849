//! External autonomous-agent service boundary.
//!
//! An arena can be populated by agents driven from a separate service
//! instead of the in-process bot engine. The bridge keeps the arena at
//! its configured population: it requests external agents while the
//! service is healthy and falls back to local bots when it is not.
//! Externally driven players reach the session the same way remote
//! humans do, through store snapshots.

use crate::entity::PlayerId;
use crate::remote::sync::PlayerSnapshot;
use crate::simulation::{OutboundEvent, Simulation};
use crate::util;
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent service unavailable")]
    Unavailable,
    #[error("agent request failed: {0}")]
    Request(String),
}

/// The external agent service surface.
pub trait AgentService: Send + Sync + 'static {
    /// Ask the service to drive a new agent in the given arena.
    fn acquire(
        &self,
        arena: &str,
        player_id: &str,
    ) -> impl Future<Output = Result<(), AgentError>> + Send;

    /// Return an agent to the service.
    fn release(&self, player_id: &str) -> impl Future<Output = Result<(), AgentError>> + Send;

    /// Put an eliminated agent back into a fresh state so it can rejoin.
    fn reset(&self, player_id: &str) -> impl Future<Output = Result<(), AgentError>> + Send;

    /// Current state of every agent the service drives, in the same
    /// snapshot shape remote players use.
    fn fetch_agents(&self)
    -> impl Future<Output = Result<Vec<PlayerSnapshot>, AgentError>> + Send;

    fn healthy(&self) -> impl Future<Output = bool> + Send;
}

/// A service that is never available. Sessions built on it run purely
/// on local bots.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullAgentService;

impl AgentService for NullAgentService {
    async fn acquire(&self, _arena: &str, _player_id: &str) -> Result<(), AgentError> {
        Err(AgentError::Unavailable)
    }

    async fn release(&self, _player_id: &str) -> Result<(), AgentError> {
        Err(AgentError::Unavailable)
    }

    async fn reset(&self, _player_id: &str) -> Result<(), AgentError> {
        Err(AgentError::Unavailable)
    }

    async fn fetch_agents(&self) -> Result<Vec<PlayerSnapshot>, AgentError> {
        Err(AgentError::Unavailable)
    }

    async fn healthy(&self) -> bool {
        false
    }
}

/// Keeps the arena populated, preferring external agents over local
/// bots.
pub struct AgentBridge<S: AgentService> {
    service: Arc<S>,
    arena: String,
    agents: HashSet<PlayerId>,
}

impl<S: AgentService> AgentBridge<S> {
    pub fn new(service: Arc<S>, arena: impl Into<String>) -> Self {
        Self {
            service,
            arena: arena.into(),
            agents: HashSet::new(),
        }
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    /// Top the population back up to the configured bot count. A request
    /// that fails mid-batch degrades to a local bot for that slot.
    pub async fn ensure_population(&mut self, sim: &mut Simulation) {
        let desired = sim.config.bot.count;
        let current = sim.bots.len() + self.agents.len();
        if current >= desired {
            return;
        }
        let missing = desired - current;

        if !self.service.healthy().await {
            debug!(missing, "agent service unavailable, filling with local bots");
            for _ in 0..missing {
                sim.spawn_bot();
            }
            return;
        }

        for _ in 0..missing {
            let player_id = util::unique_id("agent_");
            match self.service.acquire(&self.arena, &player_id).await {
                Ok(()) => {
                    self.agents.insert(player_id);
                }
                Err(err) => {
                    warn!(error = %err, "agent acquisition failed, spawning local bot");
                    sim.spawn_bot();
                }
            }
        }
    }

    /// Pull the agents' latest state and fold it into the session. Agent
    /// snapshots reconcile the same way remote-player snapshots do.
    pub async fn sync_agents(&self, sim: &mut Simulation, now_ms: u64) {
        let snapshots = match self.service.fetch_agents().await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                debug!(error = %err, "agent state fetch failed");
                return;
            }
        };
        for snapshot in snapshots {
            if !self.agents.contains(&snapshot.id) {
                continue;
            }
            sim.apply_player_snapshot(snapshot, now_ms);
        }
    }

    /// React to an elimination: externally driven agents are reset so the
    /// service can respawn them; anything else is not ours.
    pub async fn handle_elimination(&mut self, event: &OutboundEvent) {
        let OutboundEvent::PlayerEliminated {
            id,
            external_agent: true,
            ..
        } = event
        else {
            return;
        };
        if !self.agents.contains(id) {
            return;
        }
        if let Err(err) = self.service.reset(id).await {
            warn!(error = %err, agent = %id, "agent reset failed, releasing");
            if let Err(err) = self.service.release(id).await {
                debug!(error = %err, agent = %id, "agent release failed");
            }
            self.agents.remove(id);
        }
    }

    /// Release every held agent.
    pub async fn shutdown(&mut self) {
        let agents: Vec<PlayerId> = self.agents.drain().collect();
        for id in agents {
            if let Err(err) = self.service.release(&id).await {
                debug!(error = %err, agent = %id, "agent release failed during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::simulation::SimMode;
    use std::sync::Mutex;

    #[derive(Debug, Default)]
    struct RecordingService {
        healthy: bool,
        calls: Mutex<Vec<String>>,
        fail_reset: bool,
        snapshots: Mutex<Vec<PlayerSnapshot>>,
    }

    impl RecordingService {
        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl AgentService for RecordingService {
        async fn acquire(&self, arena: &str, player_id: &str) -> Result<(), AgentError> {
            self.log(format!("acquire {arena} {player_id}"));
            Ok(())
        }

        async fn release(&self, player_id: &str) -> Result<(), AgentError> {
            self.log(format!("release {player_id}"));
            Ok(())
        }

        async fn reset(&self, player_id: &str) -> Result<(), AgentError> {
            self.log(format!("reset {player_id}"));
            if self.fail_reset {
                Err(AgentError::Request("boom".to_string()))
            } else {
                Ok(())
            }
        }

        async fn fetch_agents(&self) -> Result<Vec<PlayerSnapshot>, AgentError> {
            self.log("fetch_agents".to_string());
            Ok(self.snapshots.lock().unwrap().clone())
        }

        async fn healthy(&self) -> bool {
            self.healthy
        }
    }

    fn new_sim(bot_count: usize) -> Simulation {
        let mut config = Config::default();
        config.bot.count = bot_count;
        Simulation::new(config, SimMode::Networked)
    }

    #[tokio::test]
    async fn test_healthy_service_gets_the_agents() {
        let service = Arc::new(RecordingService {
            healthy: true,
            ..Default::default()
        });
        let mut bridge = AgentBridge::new(service.clone(), "arena-1");
        let mut sim = new_sim(3);

        bridge.ensure_population(&mut sim).await;

        assert_eq!(bridge.agent_count(), 3);
        assert!(sim.bots.is_empty());
        assert_eq!(service.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_unhealthy_service_falls_back_to_bots() {
        let mut bridge = AgentBridge::new(Arc::new(NullAgentService), "arena-1");
        let mut sim = new_sim(3);

        bridge.ensure_population(&mut sim).await;

        assert_eq!(bridge.agent_count(), 0);
        assert_eq!(sim.bots.len(), 3);
        // Population holds: a second call adds nothing.
        bridge.ensure_population(&mut sim).await;
        assert_eq!(sim.bots.len(), 3);
    }

    #[tokio::test]
    async fn test_eliminated_agent_is_reset() {
        let service = Arc::new(RecordingService {
            healthy: true,
            ..Default::default()
        });
        let mut bridge = AgentBridge::new(service.clone(), "arena-1");
        let mut sim = new_sim(1);
        bridge.ensure_population(&mut sim).await;
        let agent_id = bridge.agents.iter().next().unwrap().clone();

        bridge
            .handle_elimination(&OutboundEvent::PlayerEliminated {
                id: agent_id.clone(),
                name: "Agent".to_string(),
                max_mass: 42.0,
                external_agent: true,
                local: false,
            })
            .await;

        assert!(service.calls().contains(&format!("reset {agent_id}")));
        assert_eq!(bridge.agent_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_applies_only_held_agents() {
        use crate::remote::sync::CellSnapshot;

        let service = Arc::new(RecordingService {
            healthy: true,
            ..Default::default()
        });
        let mut bridge = AgentBridge::new(service.clone(), "arena-1");
        let mut sim = new_sim(1);
        bridge.ensure_population(&mut sim).await;
        let agent_id = bridge.agents.iter().next().unwrap().clone();

        let snapshot_for = |id: &str| PlayerSnapshot {
            id: id.to_string(),
            name: "Agent".to_string(),
            color: "#aabbcc".to_string(),
            cells: vec![CellSnapshot {
                id: format!("{id}_cell"),
                x: 400.0,
                y: 400.0,
                vx: 0.0,
                vy: 0.0,
                mass: 150.0,
            }],
            total_mass: 150.0,
            max_mass: 150.0,
            target_x: 500.0,
            target_y: 500.0,
            external_agent: true,
            updated_at_ms: 1000,
        };
        *service.snapshots.lock().unwrap() =
            vec![snapshot_for(&agent_id), snapshot_for("stranger")];

        bridge.sync_agents(&mut sim, 1000).await;

        assert!(sim.world.player(&agent_id).is_some());
        assert!(sim.world.player("stranger").is_none());
    }

    #[tokio::test]
    async fn test_failed_reset_releases_the_agent() {
        let service = Arc::new(RecordingService {
            healthy: true,
            fail_reset: true,
            ..Default::default()
        });
        let mut bridge = AgentBridge::new(service.clone(), "arena-1");
        let mut sim = new_sim(1);
        bridge.ensure_population(&mut sim).await;
        let agent_id = bridge.agents.iter().next().unwrap().clone();

        bridge
            .handle_elimination(&OutboundEvent::PlayerEliminated {
                id: agent_id.clone(),
                name: "Agent".to_string(),
                max_mass: 42.0,
                external_agent: true,
                local: false,
            })
            .await;

        assert_eq!(bridge.agent_count(), 0);
        assert!(service.calls().contains(&format!("release {agent_id}")));
    }
}
