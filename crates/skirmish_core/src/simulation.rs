//! Core simulation loop.
//!
//! [`Simulation`] owns the world, the commands waiting for the next tick and
//! the AI controllers. Each call to [`Simulation::tick`] runs the phases in a
//! fixed order with no interleaving:
//!
//! 1. Apply queued commands, oldest first
//! 2. Construction
//! 3. Movement
//! 4. Gathering
//! 5. Combat
//! 6. Production
//! 7. Remove dead units, destroyed buildings and depleted resources
//! 8. Win check
//! 9. AI decisions, whose commands wait for the next tick
//!
//! # Example
//!
//! ```
//! use skirmish_core::config::MatchConfig;
//! use skirmish_core::simulation::Simulation;
//!
//! let mut sim = Simulation::new(&MatchConfig::default()).unwrap();
//! let events = sim.tick();
//! assert_eq!(events.tick, 1);
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ai::AiController;
use crate::buildings::{advance_construction, advance_production, ConstructionEvent, ProductionEvent};
use crate::commands::{apply, Command, CommandPort, CommandQueue};
use crate::components::{BuildingId, PlayerId, UnitId};
use crate::config::MatchConfig;
use crate::error::Result;
use crate::map::Tile;
use crate::map_generation::generate_map;
use crate::math::Coord;
use crate::snapshot::PlayerSnapshot;
use crate::units::{advance_gathering, advance_movement, resolve_combat, Deposit, Hit};
use crate::world::WorldState;

/// Ticks per second for the simulation.
pub const TICK_RATE: u32 = 10;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// How a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOutcome {
    /// The last player with buildings, or `None` if nobody has any.
    pub winner: Option<PlayerId>,
    /// Tick on which the match ended.
    pub tick: u64,
}

/// Events generated during a tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Tick counter after this tick.
    pub tick: u64,
    /// Commands that changed the world.
    pub commands_applied: usize,
    /// Commands rejected as invalid.
    pub commands_rejected: usize,
    /// Construction progress and completions.
    pub construction: Vec<ConstructionEvent>,
    /// Units that finished training.
    pub production: Vec<ProductionEvent>,
    /// Cargo dropped at town halls.
    pub deposits: Vec<Deposit>,
    /// Attacks that landed.
    pub hits: Vec<Hit>,
    /// Units removed at the end of the tick.
    pub dead_units: Vec<UnitId>,
    /// Buildings removed at the end of the tick.
    pub destroyed_buildings: Vec<BuildingId>,
    /// Resource nodes that ran out.
    pub depleted: Vec<Coord>,
    /// Set on the tick the match ends.
    pub outcome: Option<MatchOutcome>,
}

/// An authoritative match.
#[derive(Debug, Clone)]
pub struct Simulation {
    world: WorldState,
    commands: CommandQueue,
    ai: Vec<AiController>,
    outcome: Option<MatchOutcome>,
}

impl Simulation {
    /// Generate the map and seat the AI players described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or no map can be generated.
    pub fn new(config: &MatchConfig) -> Result<Self> {
        config.validate()?;
        let world = generate_map(&config.map)?.into_world();

        let mut sim = Self::from_world(world);
        for slot in &config.ai {
            sim.add_ai(AiController::new(
                slot.player,
                slot.resolved_profile(),
                config.seed,
            ));
        }

        info!(
            seed = config.seed,
            width = config.map.width,
            height = config.map.height,
            ai_players = config.ai.len(),
            "match created"
        );
        Ok(sim)
    }

    /// Wrap an existing world with no AI players.
    #[must_use]
    pub fn from_world(world: WorldState) -> Self {
        Self {
            world,
            commands: CommandQueue::new(),
            ai: Vec::new(),
            outcome: None,
        }
    }

    /// Seat a computer player.
    pub fn add_ai(&mut self, controller: AiController) {
        self.ai.push(controller);
    }

    /// Players driven by the computer.
    pub fn ai_players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.ai.iter().map(AiController::player)
    }

    /// Read-only access to the world.
    #[must_use]
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// Mutable access to the world, for scenario setup.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// Ticks completed.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.world.tick
    }

    /// The result, once the match has ended.
    #[must_use]
    pub const fn outcome(&self) -> Option<MatchOutcome> {
        self.outcome
    }

    /// Commands waiting for the next tick.
    #[must_use]
    pub const fn pending_commands(&self) -> &CommandQueue {
        &self.commands
    }

    /// Queue a command for the next tick.
    pub fn submit(&mut self, player: PlayerId, command: Command) {
        self.commands.submit(player, command);
    }

    /// Advance the match by one tick. Does nothing once the match has ended.
    pub fn tick(&mut self) -> TickEvents {
        if self.outcome.is_some() {
            return TickEvents {
                tick: self.world.tick,
                ..TickEvents::default()
            };
        }

        let mut events = TickEvents::default();

        let pending: Vec<(PlayerId, Command)> = self.commands.drain().collect();
        for (player, command) in &pending {
            if apply(&mut self.world, *player, command) {
                events.commands_applied += 1;
            } else {
                events.commands_rejected += 1;
            }
        }

        events.construction = advance_construction(&mut self.world);
        advance_movement(&mut self.world);
        events.deposits = advance_gathering(&mut self.world);
        events.hits = resolve_combat(&mut self.world);
        events.production = advance_production(&mut self.world);
        self.prune(&mut events);

        self.world.tick += 1;
        events.tick = self.world.tick;

        if let Some(outcome) = self.check_outcome() {
            info!(
                tick = outcome.tick,
                winner = ?outcome.winner.map(|p| p.0),
                "match over"
            );
            self.outcome = Some(outcome);
            events.outcome = Some(outcome);
            return events;
        }

        for controller in &mut self.ai {
            controller.update(&self.world, &mut self.commands);
        }

        events
    }

    /// Tick until the match ends or `max_ticks` more ticks have run.
    pub fn run_until(&mut self, max_ticks: u64) -> Option<MatchOutcome> {
        for _ in 0..max_ticks {
            if self.outcome.is_some() {
                break;
            }
            self.tick();
        }
        self.outcome
    }

    /// What `player` is allowed to see right now.
    #[must_use]
    pub fn snapshot(&self, player: PlayerId) -> Option<PlayerSnapshot> {
        PlayerSnapshot::capture(&self.world, player)
    }

    fn prune(&mut self, events: &mut TickEvents) {
        events.dead_units = self
            .world
            .units
            .retain(|u| u.is_alive())
            .into_iter()
            .map(|(id, _)| id)
            .collect();

        events.destroyed_buildings = self
            .world
            .buildings
            .retain(|b| b.is_alive())
            .into_iter()
            .map(|(id, b)| {
                info!(building = %id, owner = b.owner.0, kind = ?b.kind, "building destroyed");
                id
            })
            .collect();

        for (c, _) in self.world.resources.remove_depleted() {
            if self.world.tiles.get(c) == Some(Tile::Tree) {
                self.world.tiles.set(c, Tile::Grass);
            }
            events.depleted.push(c);
        }
    }

    /// A player without buildings is out. The match ends when at most one
    /// player is left standing.
    fn check_outcome(&self) -> Option<MatchOutcome> {
        let total = self.world.players.len();
        let standing: Vec<PlayerId> = self
            .world
            .player_ids()
            .filter(|&p| self.world.buildings_of(p).next().is_some())
            .collect();

        (standing.len() < total && standing.len() <= 1).then(|| MatchOutcome {
            winner: standing.first().copied(),
            tick: self.world.tick,
        })
    }

    /// Hash of the full match state for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.world.tick.hash(&mut hasher);
        self.world.players.hash(&mut hasher);
        self.world.tiles.tiles().hash(&mut hasher);

        for (id, unit) in self.world.units.iter() {
            id.hash(&mut hasher);
            unit.hash(&mut hasher);
        }
        for (id, building) in self.world.buildings.iter() {
            id.hash(&mut hasher);
            building.hash(&mut hasher);
        }
        for (c, node) in self.world.resources.iter() {
            c.hash(&mut hasher);
            node.hash(&mut hasher);
        }
        self.commands.len().hash(&mut hasher);

        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::Difficulty;
    use crate::components::EntityId;
    use crate::data::{BuildingKind, ResourceKind, UnitKind};
    use crate::map::{ResourceField, ResourceNode, TileGrid};

    fn duel() -> Simulation {
        let mut world = WorldState::new(TileGrid::new(40, 40), ResourceField::new(), 2);
        world.place_building(PlayerId(0), BuildingKind::TownHall, Coord::new(2, 2), true);
        world.place_building(PlayerId(1), BuildingKind::TownHall, Coord::new(35, 35), true);
        Simulation::from_world(world)
    }

    #[test]
    fn test_tick_advances_counter() {
        let mut sim = duel();
        let events = sim.tick();
        assert_eq!(events.tick, 1);
        assert_eq!(sim.current_tick(), 1);
        assert!(sim.outcome().is_none());
    }

    #[test]
    fn test_commands_apply_next_tick() {
        let mut sim = duel();
        let unit = sim
            .world_mut()
            .spawn_unit(PlayerId(0), UnitKind::Footman, Coord::new(10, 10));

        sim.submit(
            PlayerId(0),
            Command::Move {
                unit_ids: vec![unit],
                x: 15,
                y: 10,
            },
        );
        assert_eq!(sim.pending_commands().len(), 1);
        assert!(sim.world().units.get(unit).unwrap().path.is_empty());

        let events = sim.tick();
        assert_eq!(events.commands_applied, 1);
        assert!(sim.pending_commands().is_empty());
        assert!(!sim.world().units.get(unit).unwrap().path.is_empty());
    }

    #[test]
    fn test_rejected_commands_counted() {
        let mut sim = duel();
        let enemy = sim
            .world_mut()
            .spawn_unit(PlayerId(1), UnitKind::Footman, Coord::new(10, 10));
        sim.submit(
            PlayerId(0),
            Command::Move {
                unit_ids: vec![enemy],
                x: 15,
                y: 10,
            },
        );
        let events = sim.tick();
        assert_eq!(events.commands_rejected, 1);
        assert_eq!(sim.world().units.get(enemy).unwrap().position, Coord::new(10, 10));
    }

    #[test]
    fn test_last_building_destroyed_ends_match_same_tick() {
        let mut sim = duel();
        let hall = sim
            .world()
            .buildings_of(PlayerId(1))
            .map(|(id, _)| id)
            .next()
            .unwrap();
        sim.world_mut().buildings.get_mut(hall).unwrap().hp = 8;
        let attacker = sim
            .world_mut()
            .spawn_unit(PlayerId(0), UnitKind::Footman, Coord::new(34, 35));
        sim.submit(
            PlayerId(0),
            Command::Attack {
                unit_ids: vec![attacker],
                target_id: EntityId::Building(hall),
            },
        );

        let mut ended = None;
        for _ in 0..20 {
            let events = sim.tick();
            if let Some(outcome) = events.outcome {
                assert_eq!(events.destroyed_buildings, vec![hall]);
                ended = Some(outcome);
                break;
            }
        }

        let outcome = ended.unwrap();
        assert_eq!(outcome.winner, Some(PlayerId(0)));
        assert_eq!(outcome.tick, 10);
        assert_eq!(sim.outcome(), Some(outcome));
    }

    #[test]
    fn test_ticks_after_outcome_are_noops() {
        let mut world = WorldState::new(TileGrid::new(20, 20), ResourceField::new(), 2);
        world.place_building(PlayerId(0), BuildingKind::TownHall, Coord::new(2, 2), true);
        let mut sim = Simulation::from_world(world);

        let first = sim.tick();
        assert_eq!(
            first.outcome,
            Some(MatchOutcome {
                winner: Some(PlayerId(0)),
                tick: 1,
            })
        );
        let hash = sim.state_hash();
        let after = sim.tick();
        assert_eq!(after.tick, 1);
        assert!(after.outcome.is_none());
        assert_eq!(sim.state_hash(), hash);
    }

    #[test]
    fn test_nobody_standing_is_a_draw() {
        let world = WorldState::new(TileGrid::new(20, 20), ResourceField::new(), 2);
        let mut sim = Simulation::from_world(world);
        assert_eq!(sim.tick().outcome.unwrap().winner, None);
    }

    #[test]
    fn test_depleted_tree_becomes_grass() {
        let mut sim = duel();
        let c = Coord::new(20, 20);
        sim.world_mut().tiles.set(c, Tile::Tree);
        sim.world_mut()
            .resources
            .insert(c, ResourceNode::new(ResourceKind::Wood, 0));

        let events = sim.tick();
        assert_eq!(events.depleted, vec![c]);
        assert_eq!(sim.world().tiles.get(c), Some(Tile::Grass));
        assert!(sim.world().resources.get(c).is_none());
    }

    #[test]
    fn test_dead_units_pruned() {
        let mut sim = duel();
        let unit = sim
            .world_mut()
            .spawn_unit(PlayerId(0), UnitKind::Peasant, Coord::new(10, 10));
        sim.world_mut().units.get_mut(unit).unwrap().hp = 0;

        let events = sim.tick();
        assert_eq!(events.dead_units, vec![unit]);
        assert!(sim.world().units.get(unit).is_none());
    }

    #[test]
    fn test_ai_commands_wait_for_next_tick() {
        let mut sim = duel();
        sim.add_ai(AiController::new(
            PlayerId(0),
            Difficulty::Hard.profile(),
            1,
        ));

        sim.tick();
        // The hall queue is filled by commands issued at the end of tick 1.
        assert!(!sim.pending_commands().is_empty());
        let hall = sim
            .world()
            .buildings_of(PlayerId(0))
            .map(|(_, b)| b.queue.len())
            .sum::<usize>();
        assert_eq!(hall, 0);

        sim.tick();
        let queued = sim
            .world()
            .buildings_of(PlayerId(0))
            .map(|(_, b)| b.queue.len())
            .sum::<usize>();
        assert!(queued > 0);
    }

    #[test]
    fn test_generated_match_is_deterministic() {
        let config = MatchConfig::ai_vs_ai(Difficulty::Hard, Difficulty::Medium).with_seed(11);
        let mut a = Simulation::new(&config).unwrap();
        let mut b = Simulation::new(&config).unwrap();
        for _ in 0..300 {
            a.tick();
            b.tick();
        }
        assert_eq!(a.state_hash(), b.state_hash());
        assert_eq!(a.ai_players().count(), 2);
    }

    #[test]
    fn test_snapshot_for_each_player() {
        let sim = Simulation::new(&MatchConfig::default()).unwrap();
        assert!(sim.snapshot(PlayerId(0)).is_some());
        assert!(sim.snapshot(PlayerId(1)).is_some());
        assert!(sim.snapshot(PlayerId(2)).is_none());
    }
}
