//! # Skirmish Match Server
//!
//! Headless host for authoritative matches.
//!
//! Each match runs on its own tokio task with a fixed-rate interval. Clients
//! (or a transport layer acting for them) send commands over an mpsc channel
//! and read per-player snapshots from watch channels. A match task ends when
//! the simulation reports an outcome, when it hits the configured tick limit,
//! or when every command sender has been dropped.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use skirmish_core::commands::Command;
use skirmish_core::components::PlayerId;
use skirmish_core::config::MatchConfig;
use skirmish_core::error::GameError;
use skirmish_core::simulation::{MatchOutcome, Simulation, TICK_RATE};
use skirmish_core::snapshot::PlayerSnapshot;

/// Buffered commands per match before senders wait.
const COMMAND_BUFFER: usize = 256;

/// Server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Ticks per second.
    pub tick_rate: u32,
    /// Stop a match after this many ticks without a winner.
    pub max_ticks: Option<u64>,
    /// Publish snapshots every this many ticks.
    pub snapshot_interval: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            max_ticks: None,
            snapshot_interval: 1,
        }
    }
}

impl ServerConfig {
    /// Set the tick rate.
    #[must_use]
    pub const fn with_tick_rate(mut self, tick_rate: u32) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Set the tick limit.
    #[must_use]
    pub const fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = Some(max_ticks);
        self
    }

    /// Reject settings the tick loop cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.tick_rate == 0 || self.tick_rate > 1000 {
            return Err(ServerError::InvalidConfig(format!(
                "tick_rate must be within 1..=1000, got {}",
                self.tick_rate
            )));
        }
        if self.snapshot_interval == 0 {
            return Err(ServerError::InvalidConfig(
                "snapshot_interval must be positive".into(),
            ));
        }
        Ok(())
    }

    fn tick_duration(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate
    }
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The match could not be set up.
    #[error("match setup failed: {0}")]
    Setup(#[from] GameError),
    /// Server settings are invalid.
    #[error("invalid server configuration: {0}")]
    InvalidConfig(String),
    /// No running match has this id.
    #[error("unknown match {0}")]
    UnknownMatch(MatchId),
    /// The match task has stopped accepting commands.
    #[error("match {0} is no longer running")]
    MatchClosed(MatchId),
    /// The match task panicked or was cancelled.
    #[error("match task failed: {0}")]
    TaskFailed(String),
}

/// Identifier of a hosted match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MatchId(pub u64);

impl std::fmt::Display for MatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A connection's identity: which seat in which match it controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// The match.
    pub match_id: MatchId,
    /// The seat.
    pub player: PlayerId,
}

/// A command tagged with its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerCommand {
    /// Issuing player.
    pub player: PlayerId,
    /// The command.
    pub command: Command,
}

/// Why a match task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EndReason {
    /// A winner (or draw) was decided.
    Decided,
    /// The tick limit was reached.
    TickLimit,
    /// Every command sender went away.
    Disconnected,
}

/// Summary returned when a match task finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchReport {
    /// The match.
    pub match_id: MatchId,
    /// Ticks completed.
    pub ticks: u64,
    /// Why it stopped.
    pub reason: EndReason,
    /// Result, when decided.
    pub outcome: Option<MatchOutcome>,
    /// Final state hash.
    pub state_hash: u64,
}

/// Channels and task for one running match.
#[derive(Debug)]
pub struct MatchHandle {
    id: MatchId,
    commands: mpsc::Sender<PlayerCommand>,
    snapshots: Vec<watch::Receiver<Option<PlayerSnapshot>>>,
    outcome: watch::Receiver<Option<MatchOutcome>>,
    task: JoinHandle<MatchReport>,
}

impl MatchHandle {
    /// Match id.
    #[must_use]
    pub const fn id(&self) -> MatchId {
        self.id
    }

    /// A sender for this match's command channel.
    #[must_use]
    pub fn commands(&self) -> mpsc::Sender<PlayerCommand> {
        self.commands.clone()
    }

    /// Latest snapshot for `player`.
    #[must_use]
    pub fn snapshot(&self, player: PlayerId) -> Option<PlayerSnapshot> {
        self.snapshots
            .get(player.index())
            .and_then(|rx| rx.borrow().clone())
    }

    /// A receiver that changes whenever `player`'s snapshot is republished.
    #[must_use]
    pub fn subscribe(&self, player: PlayerId) -> Option<watch::Receiver<Option<PlayerSnapshot>>> {
        self.snapshots.get(player.index()).cloned()
    }

    /// A receiver for the match outcome, set once.
    #[must_use]
    pub fn outcome(&self) -> watch::Receiver<Option<MatchOutcome>> {
        self.outcome.clone()
    }

    /// Whether the match task has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Queue a command for the next tick.
    pub async fn submit(&self, player: PlayerId, command: Command) -> Result<(), ServerError> {
        self.commands
            .send(PlayerCommand { player, command })
            .await
            .map_err(|_| ServerError::MatchClosed(self.id))
    }

    /// Drop this handle's command sender and wait for the task to finish.
    pub async fn finish(self) -> Result<MatchReport, ServerError> {
        let Self { commands, task, .. } = self;
        drop(commands);
        task.await
            .map_err(|e| ServerError::TaskFailed(e.to_string()))
    }

    /// Wait for the task without giving up the command sender.
    pub async fn join(self) -> Result<MatchReport, ServerError> {
        let Self { commands, task, .. } = self;
        let report = task.await;
        drop(commands);
        report.map_err(|e| ServerError::TaskFailed(e.to_string()))
    }
}

/// Start `sim` on a new tokio task.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`ServerError::InvalidConfig`] if `config` cannot drive a tick
/// loop; nothing is spawned in that case.
pub fn spawn_match(
    id: MatchId,
    sim: Simulation,
    config: &ServerConfig,
) -> Result<MatchHandle, ServerError> {
    config.validate()?;

    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (outcome_tx, outcome_rx) = watch::channel(None);

    let (snapshot_txs, snapshot_rxs): (Vec<_>, Vec<_>) = sim
        .world()
        .player_ids()
        .map(|player| watch::channel(sim.snapshot(player)))
        .unzip();

    let task = tokio::spawn(run_match(
        id,
        sim,
        config.clone(),
        command_rx,
        snapshot_txs,
        outcome_tx,
    ));

    Ok(MatchHandle {
        id,
        commands: command_tx,
        snapshots: snapshot_rxs,
        outcome: outcome_rx,
        task,
    })
}

async fn run_match(
    id: MatchId,
    mut sim: Simulation,
    config: ServerConfig,
    mut commands: mpsc::Receiver<PlayerCommand>,
    snapshots: Vec<watch::Sender<Option<PlayerSnapshot>>>,
    outcome_tx: watch::Sender<Option<MatchOutcome>>,
) -> MatchReport {
    let mut interval = tokio::time::interval(config.tick_duration());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(match_id = id.0, tick_rate = config.tick_rate, "match started");

    let reason = loop {
        tokio::select! {
            _ = interval.tick() => {
                let events = sim.tick();

                if events.tick % config.snapshot_interval == 0 || events.outcome.is_some() {
                    for (player, tx) in sim.world().player_ids().zip(&snapshots) {
                        tx.send_replace(sim.snapshot(player));
                    }
                }

                if let Some(outcome) = events.outcome {
                    outcome_tx.send_replace(Some(outcome));
                    break EndReason::Decided;
                }
                if config.max_ticks.is_some_and(|limit| events.tick >= limit) {
                    break EndReason::TickLimit;
                }
            }
            received = commands.recv() => match received {
                Some(PlayerCommand { player, command }) => {
                    tracing::trace!(match_id = id.0, player = player.0, command = command.name(), "command received");
                    sim.submit(player, command);
                }
                None => break EndReason::Disconnected,
            },
        }
    };

    let report = MatchReport {
        match_id: id,
        ticks: sim.current_tick(),
        reason,
        outcome: sim.outcome(),
        state_hash: sim.state_hash(),
    };
    tracing::info!(
        match_id = id.0,
        ticks = report.ticks,
        reason = ?report.reason,
        winner = ?report.outcome.and_then(|o| o.winner).map(|p| p.0),
        "match finished"
    );
    report
}

/// Hosts any number of independent matches.
///
/// A match that ends on its own keeps its handle (and report) until it is
/// collected with [`MatchServer::wait`], [`MatchServer::close`] or
/// [`MatchServer::reap_finished`]. Long-running hosts should call
/// `reap_finished` periodically.
#[derive(Debug, Default)]
pub struct MatchServer {
    config: ServerConfig,
    next_id: u64,
    matches: HashMap<MatchId, MatchHandle>,
}

impl MatchServer {
    /// Create a server.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        Ok(Self {
            config,
            next_id: 0,
            matches: HashMap::new(),
        })
    }

    /// Server settings.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Build a match from `config` and start it.
    pub fn create_match(&mut self, config: &MatchConfig) -> Result<MatchId, ServerError> {
        let sim = Simulation::new(config)?;
        let id = MatchId(self.next_id);
        self.next_id += 1;

        let handle = spawn_match(id, sim, &self.config)?;
        self.matches.insert(id, handle);
        Ok(id)
    }

    /// Ids of matches that have not been finished.
    pub fn match_ids(&self) -> impl Iterator<Item = MatchId> + '_ {
        self.matches.keys().copied()
    }

    /// The running match `id`.
    #[must_use]
    pub fn get(&self, id: MatchId) -> Option<&MatchHandle> {
        self.matches.get(&id)
    }

    /// Forward a command from a connection to its match.
    pub async fn submit(&self, session: Session, command: Command) -> Result<(), ServerError> {
        let handle = self
            .matches
            .get(&session.match_id)
            .ok_or(ServerError::UnknownMatch(session.match_id))?;
        handle.submit(session.player, command).await
    }

    /// Latest snapshot for a connection.
    #[must_use]
    pub fn snapshot(&self, session: Session) -> Option<PlayerSnapshot> {
        self.matches
            .get(&session.match_id)?
            .snapshot(session.player)
    }

    /// Wait for match `id` to end on its own and remove it.
    pub async fn wait(&mut self, id: MatchId) -> Result<MatchReport, ServerError> {
        let handle = self
            .matches
            .remove(&id)
            .ok_or(ServerError::UnknownMatch(id))?;
        handle.join().await
    }

    /// Remove every match whose task has stopped and return their reports.
    ///
    /// Reports come back in match id order. A task that panicked is logged
    /// and dropped.
    pub async fn reap_finished(&mut self) -> Vec<MatchReport> {
        let mut finished: Vec<MatchId> = self
            .matches
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        finished.sort_unstable();

        let mut reports = Vec::with_capacity(finished.len());
        for id in finished {
            let Some(handle) = self.matches.remove(&id) else {
                continue;
            };
            match handle.join().await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::warn!(match_id = id.0, "dropping failed match: {e}"),
            }
        }
        reports
    }

    /// Tear down match `id` by closing its command channel.
    pub async fn close(&mut self, id: MatchId) -> Result<MatchReport, ServerError> {
        let handle = self
            .matches
            .remove(&id)
            .ok_or(ServerError::UnknownMatch(id))?;
        handle.finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::ai::Difficulty;
    use skirmish_core::components::EntityId;
    use skirmish_core::data::BuildingKind;
    use skirmish_test_utils::fixtures::{duel_world, town_hall, BLUE, RED};

    fn fast() -> ServerConfig {
        ServerConfig::default().with_tick_rate(1000)
    }

    #[test]
    fn test_config_validation() {
        assert!(ServerConfig::default().validate().is_ok());
        assert!(fast().with_tick_rate(0).validate().is_err());
        assert_eq!(ServerConfig::default().tick_duration(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_tick_limit_ends_match() {
        let handle = spawn_match(
            MatchId(1),
            Simulation::from_world(duel_world()),
            &fast().with_max_ticks(20),
        ).unwrap();
        let report = handle.join().await.unwrap();
        assert_eq!(report.reason, EndReason::TickLimit);
        assert_eq!(report.ticks, 20);
        assert!(report.outcome.is_none());
    }

    #[tokio::test]
    async fn test_dropping_senders_disconnects() {
        let handle = spawn_match(MatchId(2), Simulation::from_world(duel_world()), &fast()).unwrap();
        let report = handle.finish().await.unwrap();
        assert_eq!(report.reason, EndReason::Disconnected);
    }

    #[tokio::test]
    async fn test_decided_match_publishes_outcome() {
        let mut world = duel_world();
        let hall = town_hall(&world, RED).unwrap();
        world.buildings.get_mut(hall).unwrap().hp = 8;
        let footman = world.spawn_unit(
            BLUE,
            skirmish_core::data::UnitKind::Footman,
            skirmish_core::math::Coord::new(34, 35),
        );

        let handle = spawn_match(MatchId(3), Simulation::from_world(world), &fast().with_max_ticks(500)).unwrap();
        handle
            .submit(
                BLUE,
                Command::Attack {
                    unit_ids: vec![footman],
                    target_id: EntityId::Building(hall),
                },
            )
            .await
            .unwrap();
        let outcome = handle.outcome();

        let report = handle.join().await.unwrap();
        assert_eq!(report.reason, EndReason::Decided);
        assert_eq!(report.outcome.unwrap().winner, Some(BLUE));
        assert_eq!(*outcome.borrow(), report.outcome);
    }

    #[tokio::test]
    async fn test_snapshots_are_per_player() {
        let handle = spawn_match(MatchId(4), Simulation::from_world(duel_world()), &fast().with_max_ticks(5)).unwrap();
        let blue = handle.snapshot(BLUE).unwrap();
        assert_eq!(blue.player.id, BLUE);
        assert_eq!(blue.buildings.len(), 1);
        assert!(blue.buildings.iter().all(|b| b.kind == BuildingKind::TownHall && b.owner == BLUE));
        assert!(handle.snapshot(PlayerId(9)).is_none());
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_server_hosts_matches() {
        let mut server = MatchServer::new(fast().with_max_ticks(50)).unwrap();
        let config = MatchConfig::ai_vs_ai(Difficulty::Easy, Difficulty::Easy);
        let a = server.create_match(&config).unwrap();
        let b = server.create_match(&config.clone().with_seed(4)).unwrap();
        assert_ne!(a, b);
        assert_eq!(server.match_ids().count(), 2);

        let session = Session { match_id: a, player: BLUE };
        assert!(server.snapshot(session).is_some());

        let report = server.wait(a).await.unwrap();
        assert_eq!(report.ticks, 50);
        assert!(matches!(
            server.submit(session, Command::Move { unit_ids: vec![], x: 0, y: 0 }).await,
            Err(ServerError::UnknownMatch(_))
        ));
        server.close(b).await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_match_config_rejected() {
        let mut server = MatchServer::new(fast()).unwrap();
        let bad = MatchConfig::default().with_ai(PlayerId(7), Difficulty::Hard);
        assert!(matches!(
            server.create_match(&bad),
            Err(ServerError::Setup(GameError::InvalidConfig(_)))
        ));
        assert_eq!(server.match_ids().count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_rejects_unusable_config() {
        let no_snapshots = ServerConfig {
            snapshot_interval: 0,
            ..fast()
        };
        assert!(matches!(
            spawn_match(MatchId(5), Simulation::from_world(duel_world()), &no_snapshots),
            Err(ServerError::InvalidConfig(_))
        ));
        assert!(matches!(
            spawn_match(
                MatchId(6),
                Simulation::from_world(duel_world()),
                &fast().with_tick_rate(0)
            ),
            Err(ServerError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_reap_collects_ended_matches() {
        let mut server = MatchServer::new(fast().with_max_ticks(10)).unwrap();
        let config = MatchConfig::ai_vs_ai(Difficulty::Easy, Difficulty::Easy);
        let id = server.create_match(&config).unwrap();

        let mut outcome = server.get(id).unwrap().outcome();
        // Tick limit, not a decision: the channel closes without a value.
        assert!(outcome.changed().await.is_err());
        while !server.get(id).unwrap().is_finished() {
            tokio::task::yield_now().await;
        }

        let reports = server.reap_finished().await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].match_id, id);
        assert_eq!(reports[0].reason, EndReason::TickLimit);
        assert_eq!(server.match_ids().count(), 0);
        assert!(server.reap_finished().await.is_empty());
    }
}
