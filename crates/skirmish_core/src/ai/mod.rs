//! Computer opponent.
//!
//! An [`AiController`] looks at the world once every `decision_interval`
//! ticks and issues ordinary [`Command`]s through a [`CommandPort`], the same
//! path a remote client uses. A decision cycle runs five phases in order:
//!
//! 1. Economy: put idle peasants to work on the scarcer resource.
//! 2. Build orders: at most one farm or barracks per cycle.
//! 3. Production: keep town hall and barracks queues topped up.
//! 4. Military: launch a group attack once enough troops are waiting.
//! 5. Defense: answer the first building that has enemies close by.
//!
//! Commands take effect on the next tick, so the controller keeps a local
//! spending ledger for the cycle instead of trusting the player's balance
//! twice.

mod placement;
pub mod profile;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::commands::{Command, CommandPort};
use crate::components::{Building, BuildingId, EntityId, PlayerId, Unit, UnitId, UnitState};
use crate::data::{BuildingKind, Cost, ResourceKind, UnitKind};
use crate::math::Coord;
use crate::world::WorldState;

pub use placement::{find_build_site, MAX_SEARCH_RADIUS, MIN_SEARCH_RADIUS};
pub use profile::{Difficulty, DifficultyProfile};

/// Maximum entries the AI keeps in any production queue.
pub const MAX_QUEUE_DEPTH: usize = 2;

/// Farms the AI builds for long-term growth before relying on `farm_ahead`
/// alone.
pub const GROWTH_FARMS: usize = 4;

/// Gold below which the AI always prefers mining.
pub const GOLD_FLOOR: u32 = 200;

/// Resources the AI believes it has left this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ledger {
    gold: u32,
    wood: u32,
}

impl Ledger {
    const fn can_afford(&self, cost: Cost) -> bool {
        self.gold >= cost.gold && self.wood >= cost.wood
    }

    fn try_spend(&mut self, cost: Cost) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.gold -= cost.gold;
        self.wood -= cost.wood;
        true
    }
}

/// Per-cycle view shared by the phases.
struct Cycle<'w> {
    world: &'w WorldState,
    player: PlayerId,
    ledger: Ledger,
    population: u32,
    pop_cap: u32,
}

impl<'w> Cycle<'w> {
    fn own_units(&self) -> impl Iterator<Item = (UnitId, &'w Unit)> + '_ {
        self.world
            .units_of(self.player)
            .filter(|(_, u)| u.is_alive())
    }

    fn queued(&self, pred: impl Fn(UnitKind) -> bool) -> u32 {
        self.world
            .buildings_of(self.player)
            .flat_map(|(_, b)| b.queue.iter())
            .filter(|&&kind| pred(kind))
            .count() as u32
    }

    fn count_buildings(&self, kind: BuildingKind) -> usize {
        self.world
            .buildings_of(self.player)
            .filter(|(_, b)| b.kind == kind && b.is_alive())
            .count()
    }
}

/// Whether `unit` is chasing something that still stands.
fn has_live_target(world: &WorldState, unit: &Unit) -> bool {
    unit.attack_target
        .and_then(|t| world.hp_of(t))
        .is_some_and(|hp| hp > 0)
}

/// Bernoulli trial that tolerates out-of-range probabilities.
fn chance(rng: &mut ChaCha8Rng, p: f64) -> bool {
    p >= 1.0 || (p > 0.0 && rng.gen::<f64>() < p)
}

/// Decision loop for one computer-controlled player.
#[derive(Debug, Clone)]
pub struct AiController {
    player: PlayerId,
    profile: DifficultyProfile,
    rng: ChaCha8Rng,
    next_decision: u64,
}

impl AiController {
    /// Create a controller. `seed` fixes every random choice it will make.
    #[must_use]
    pub fn new(player: PlayerId, profile: DifficultyProfile, seed: u64) -> Self {
        Self {
            player,
            profile,
            rng: ChaCha8Rng::seed_from_u64(seed ^ u64::from(player.0).wrapping_mul(0x9E37_79B9)),
            next_decision: 0,
        }
    }

    /// Controlled player.
    #[must_use]
    pub const fn player(&self) -> PlayerId {
        self.player
    }

    /// Active profile.
    #[must_use]
    pub const fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    /// Run a decision cycle if one is due. Returns whether it ran.
    pub fn update(&mut self, world: &WorldState, port: &mut dyn CommandPort) -> bool {
        if world.tick < self.next_decision {
            return false;
        }
        self.next_decision = world.tick + self.profile.decision_interval.max(1);
        self.decide(world, port);
        true
    }

    /// Run all five phases now, ignoring the interval.
    pub fn decide(&mut self, world: &WorldState, port: &mut dyn CommandPort) {
        let Some(player) = world.player(self.player) else {
            return;
        };

        let mut cx = Cycle {
            world,
            player: self.player,
            ledger: Ledger {
                gold: player.gold,
                wood: player.wood,
            },
            population: world.population(self.player),
            pop_cap: world.pop_cap(self.player),
        };

        self.economy(&cx, port);
        self.build_orders(&mut cx, port);
        self.production(&mut cx, port);
        self.military(&cx, port);
        self.defense(&cx, port);
    }

    fn economy(&mut self, cx: &Cycle<'_>, port: &mut dyn CommandPort) {
        let idle: Vec<(UnitId, Coord)> = cx
            .own_units()
            .filter(|(_, u)| {
                u.kind == UnitKind::Peasant && u.state == UnitState::Idle && u.build_target.is_none()
            })
            .map(|(id, u)| (id, u.position))
            .collect();

        let preferred = if cx.ledger.gold < cx.ledger.wood || cx.ledger.gold < GOLD_FLOOR {
            ResourceKind::Gold
        } else {
            ResourceKind::Wood
        };

        for (id, position) in idle {
            if !chance(&mut self.rng, self.profile.gather_efficiency) {
                continue;
            }
            let node = cx
                .world
                .nearest_resource(preferred, position)
                .or_else(|| cx.world.nearest_resource(preferred.other(), position));
            let Some(node) = node else {
                continue;
            };

            debug!(player = self.player.0, unit = %id, ?node, "ai: gather");
            port.submit(
                self.player,
                Command::Gather {
                    unit_ids: vec![id],
                    x: node.x,
                    y: node.y,
                },
            );
        }
    }

    fn choose_building(&self, cx: &Cycle<'_>) -> Option<BuildingKind> {
        let farms = cx.count_buildings(BuildingKind::Farm);
        let barracks = cx.count_buildings(BuildingKind::Barracks) as u32;
        let farm_pending = cx
            .world
            .buildings_of(cx.player)
            .any(|(_, b)| b.kind == BuildingKind::Farm && !b.complete);
        let afford = |kind: BuildingKind| cx.ledger.can_afford(kind.stats().cost);

        if cx.population + self.profile.farm_ahead >= cx.pop_cap
            && !farm_pending
            && afford(BuildingKind::Farm)
        {
            Some(BuildingKind::Farm)
        } else if barracks == 0 && afford(BuildingKind::Barracks) {
            Some(BuildingKind::Barracks)
        } else if barracks > 0
            && barracks < self.profile.max_barracks
            && afford(BuildingKind::Barracks)
        {
            Some(BuildingKind::Barracks)
        } else if farms < GROWTH_FARMS
            && !farm_pending
            && cx.population + 3 >= cx.pop_cap
            && afford(BuildingKind::Farm)
        {
            Some(BuildingKind::Farm)
        } else {
            None
        }
    }

    fn build_orders(&mut self, cx: &mut Cycle<'_>, port: &mut dyn CommandPort) {
        if cx.world.tick < self.profile.build_delay {
            return;
        }
        let Some(kind) = self.choose_building(cx) else {
            return;
        };

        let hall = cx
            .world
            .buildings_of(cx.player)
            .filter(|(_, b)| b.kind == BuildingKind::TownHall && b.is_alive())
            .min_by_key(|(_, b)| !b.complete)
            .map(|(_, b)| b.footprint().center());
        let Some(hall) = hall else {
            return;
        };

        // Idle peasants first, then gatherers that are not carrying cargo home.
        let builder = cx
            .own_units()
            .filter(|(_, u)| u.kind == UnitKind::Peasant)
            .filter(|(_, u)| matches!(u.state, UnitState::Idle | UnitState::Gathering))
            .min_by_key(|(_, u)| u.state != UnitState::Idle)
            .map(|(id, _)| id);
        let Some(builder) = builder else {
            return;
        };

        let Some(site) = find_build_site(cx.world, hall, kind) else {
            debug!(player = self.player.0, ?kind, "ai: no room to build");
            return;
        };

        if !cx.ledger.try_spend(kind.stats().cost) {
            return;
        }
        debug!(player = self.player.0, ?kind, ?site, unit = %builder, "ai: build");
        port.submit(
            self.player,
            Command::Build {
                unit_id: builder,
                building_type: kind,
                x: site.x,
                y: site.y,
            },
        );
    }

    fn production(&mut self, cx: &mut Cycle<'_>, port: &mut dyn CommandPort) {
        let mut planned_pop = cx.population + cx.queued(|_| true);
        let mut peasants = cx
            .own_units()
            .filter(|(_, u)| u.kind == UnitKind::Peasant)
            .count() as u32
            + cx.queued(|k| k == UnitKind::Peasant);
        let mut military = cx
            .own_units()
            .filter(|(_, u)| u.kind.is_military())
            .count() as u32
            + cx.queued(UnitKind::is_military);

        let producers: Vec<(BuildingId, BuildingKind, usize)> = cx
            .world
            .buildings_of(cx.player)
            .filter(|(_, b)| b.complete && b.is_alive())
            .filter(|(_, b)| matches!(b.kind, BuildingKind::TownHall | BuildingKind::Barracks))
            .map(|(id, b)| (id, b.kind, b.queue.len()))
            .collect();

        for (id, kind, mut depth) in producers {
            while depth < MAX_QUEUE_DEPTH && planned_pop < cx.pop_cap {
                let unit = match kind {
                    BuildingKind::TownHall if peasants < self.profile.max_peasants => {
                        UnitKind::Peasant
                    }
                    BuildingKind::Barracks if military < self.profile.max_military => {
                        if chance(&mut self.rng, self.profile.footman_share) {
                            UnitKind::Footman
                        } else {
                            UnitKind::Archer
                        }
                    }
                    _ => break,
                };
                if !cx.ledger.try_spend(unit.stats().cost) {
                    break;
                }

                debug!(player = self.player.0, building = %id, ?unit, "ai: train");
                port.submit(
                    self.player,
                    Command::TrainUnit {
                        building_id: id,
                        unit_type: unit,
                    },
                );
                depth += 1;
                planned_pop += 1;
                if unit == UnitKind::Peasant {
                    peasants += 1;
                } else {
                    military += 1;
                }
            }
        }
    }

    fn military(&self, cx: &Cycle<'_>, port: &mut dyn CommandPort) {
        let waiting: Vec<(UnitId, &Unit)> = cx
            .own_units()
            .filter(|(_, u)| u.kind.is_military())
            .filter(|(_, u)| matches!(u.state, UnitState::Idle | UnitState::Moving))
            .collect();
        if (waiting.len() as u32) < self.profile.attack_threshold {
            return;
        }

        let recruits: Vec<(UnitId, Coord)> = waiting
            .iter()
            .filter(|(_, u)| !has_live_target(cx.world, u))
            .map(|(id, u)| (*id, u.position))
            .collect();
        if recruits.is_empty() {
            return;
        }

        let n = recruits.len() as i64;
        let (sx, sy) = recruits.iter().fold((0i64, 0i64), |(sx, sy), (_, p)| {
            (sx + i64::from(p.x), sy + i64::from(p.y))
        });
        let centroid = Coord::new((sx / n) as i32, (sy / n) as i32);

        let Some(target) = self.pick_target(cx, centroid) else {
            return;
        };

        info!(
            player = self.player.0,
            units = recruits.len(),
            ?target,
            "ai: attack"
        );
        port.submit(
            self.player,
            Command::Attack {
                unit_ids: recruits.into_iter().map(|(id, _)| id).collect(),
                target_id: target,
            },
        );
    }

    /// Enemy town hall if the profile goes for it, else the enemy building
    /// nearest `centroid`, else the nearest enemy unit.
    fn pick_target(&self, cx: &Cycle<'_>, centroid: Coord) -> Option<EntityId> {
        let enemy_buildings = || {
            cx.world
                .buildings
                .iter()
                .filter(|(_, b)| b.owner != cx.player && b.is_alive())
        };
        let distance = |b: &Building| centroid.distance_squared(b.footprint().clamp(centroid));

        if self.profile.target_town_hall {
            let hall = enemy_buildings()
                .filter(|(_, b)| b.kind == BuildingKind::TownHall)
                .min_by_key(|(_, b)| distance(*b));
            if let Some((id, _)) = hall {
                return Some(EntityId::Building(id));
            }
        }

        if let Some((id, _)) = enemy_buildings().min_by_key(|(_, b)| distance(*b)) {
            return Some(EntityId::Building(id));
        }

        cx.world
            .units
            .iter()
            .filter(|(_, u)| u.owner != cx.player && u.is_alive())
            .min_by_key(|(_, u)| centroid.distance_squared(u.position))
            .map(|(id, _)| EntityId::Unit(id))
    }

    fn defense(&self, cx: &Cycle<'_>, port: &mut dyn CommandPort) {
        for (building_id, building) in cx.world.buildings_of(cx.player) {
            if !building.is_alive() {
                continue;
            }
            let area = building.footprint();

            let intruder = cx
                .world
                .units
                .iter()
                .filter(|(_, u)| u.owner != cx.player && u.is_alive())
                .map(|(id, u)| (id, area.chebyshev_to(u.position)))
                .filter(|&(_, d)| d <= self.profile.defense_alert_radius)
                .min_by_key(|&(_, d)| d)
                .map(|(id, _)| id);
            let Some(intruder) = intruder else {
                continue;
            };

            let defenders: Vec<UnitId> = cx
                .own_units()
                .filter(|(_, u)| u.kind.is_military() && u.state == UnitState::Idle)
                .filter(|(_, u)| !has_live_target(cx.world, u))
                .filter(|(_, u)| area.chebyshev_to(u.position) <= self.profile.defense_rally_radius)
                .map(|(id, _)| id)
                .collect();

            if !defenders.is_empty() {
                info!(
                    player = self.player.0,
                    building = %building_id,
                    intruder = %intruder,
                    defenders = defenders.len(),
                    "ai: defend"
                );
                port.submit(
                    self.player,
                    Command::Attack {
                        unit_ids: defenders,
                        target_id: EntityId::Unit(intruder),
                    },
                );
            }
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandQueue;
    use crate::map::{ResourceField, ResourceNode, TileGrid};

    const AI: PlayerId = PlayerId(0);
    const ENEMY: PlayerId = PlayerId(1);

    fn world() -> WorldState {
        WorldState::new(TileGrid::new(60, 60), ResourceField::new(), 2)
    }

    fn run(controller: &mut AiController, world: &WorldState) -> Vec<Command> {
        let mut queue = CommandQueue::new();
        controller.decide(world, &mut queue);
        queue
            .drain()
            .map(|(player, cmd)| {
                assert_eq!(player, AI);
                cmd
            })
            .collect()
    }

    fn hard() -> AiController {
        AiController::new(AI, Difficulty::Hard.profile(), 7)
    }

    #[test]
    fn test_update_respects_interval() {
        let mut world = world();
        let mut ai = AiController::new(AI, Difficulty::Easy.profile(), 1);
        let mut queue = CommandQueue::new();

        assert!(ai.update(&world, &mut queue));
        world.tick = 29;
        assert!(!ai.update(&world, &mut queue));
        world.tick = 30;
        assert!(ai.update(&world, &mut queue));
    }

    #[test]
    fn test_economy_prefers_gold_when_poor() {
        let mut world = world();
        world.resources.insert(Coord::new(20, 10), ResourceNode::new(ResourceKind::Gold, 1500));
        world.resources.insert(Coord::new(11, 10), ResourceNode::new(ResourceKind::Wood, 100));
        world.player_mut(AI).unwrap().gold = 100;
        let peasant = world.spawn_unit(AI, UnitKind::Peasant, Coord::new(10, 10));

        let commands = run(&mut hard(), &world);
        assert!(commands.contains(&Command::Gather {
            unit_ids: vec![peasant],
            x: 20,
            y: 10,
        }));
    }

    #[test]
    fn test_economy_falls_back_to_other_kind() {
        // Enough gold to prefer wood, but only a mine exists.
        let mut world = world();
        world.resources.insert(Coord::new(11, 10), ResourceNode::new(ResourceKind::Gold, 1500));
        let peasant = world.spawn_unit(AI, UnitKind::Peasant, Coord::new(10, 10));

        let commands = run(&mut hard(), &world);
        assert!(commands.contains(&Command::Gather {
            unit_ids: vec![peasant],
            x: 11,
            y: 10,
        }));
    }

    #[test]
    fn test_zero_efficiency_leaves_peasants_idle() {
        let mut world = world();
        world.resources.insert(Coord::new(11, 10), ResourceNode::new(ResourceKind::Gold, 100));
        world.spawn_unit(AI, UnitKind::Peasant, Coord::new(10, 10));
        let mut profile = Difficulty::Hard.profile();
        profile.gather_efficiency = 0.0;

        let commands = run(&mut AiController::new(AI, profile, 3), &world);
        assert!(!commands.iter().any(|c| matches!(c, Command::Gather { .. })));
    }

    #[test]
    fn test_hard_ai_targets_town_hall() {
        let mut world = world();
        let hall = world.place_building(ENEMY, BuildingKind::TownHall, Coord::new(50, 50), true);
        world.place_building(ENEMY, BuildingKind::Farm, Coord::new(15, 15), true);
        let footmen: Vec<UnitId> = (0..3)
            .map(|i| world.spawn_unit(AI, UnitKind::Footman, Coord::new(10 + i, 10)))
            .collect();

        let commands = run(&mut hard(), &world);
        assert!(commands.contains(&Command::Attack {
            unit_ids: footmen,
            target_id: EntityId::Building(hall),
        }));
    }

    #[test]
    fn test_medium_ai_targets_nearest_building() {
        let mut world = world();
        world.place_building(ENEMY, BuildingKind::TownHall, Coord::new(50, 50), true);
        let farm = world.place_building(ENEMY, BuildingKind::Farm, Coord::new(15, 15), true);
        for i in 0..5 {
            world.spawn_unit(AI, UnitKind::Footman, Coord::new(10 + i, 10));
        }

        let commands = run(&mut AiController::new(AI, Difficulty::Medium.profile(), 7), &world);
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::Attack { target_id, .. } if *target_id == EntityId::Building(farm)
        )));
    }

    #[test]
    fn test_no_attack_below_threshold() {
        let mut world = world();
        world.place_building(ENEMY, BuildingKind::TownHall, Coord::new(50, 50), true);
        world.spawn_unit(AI, UnitKind::Footman, Coord::new(10, 10));
        world.spawn_unit(AI, UnitKind::Footman, Coord::new(11, 10));

        let commands = run(&mut hard(), &world);
        assert!(!commands.iter().any(|c| matches!(c, Command::Attack { .. })));
    }

    #[test]
    fn test_attack_falls_back_to_units() {
        let mut world = world();
        let enemy = world.spawn_unit(ENEMY, UnitKind::Peasant, Coord::new(40, 40));
        for i in 0..3 {
            world.spawn_unit(AI, UnitKind::Footman, Coord::new(10 + i, 10));
        }

        let commands = run(&mut hard(), &world);
        assert!(commands.iter().any(|c| matches!(
            c,
            Command::Attack { target_id, .. } if *target_id == EntityId::Unit(enemy)
        )));
    }

    #[test]
    fn test_production_fills_queue_to_depth() {
        let mut world = world();
        let hall = world.place_building(AI, BuildingKind::TownHall, Coord::new(10, 10), true);

        let commands = run(&mut hard(), &world);
        let trains: Vec<&Command> = commands
            .iter()
            .filter(|c| matches!(c, Command::TrainUnit { building_id, .. } if *building_id == hall))
            .collect();
        assert_eq!(trains.len(), MAX_QUEUE_DEPTH);
    }

    #[test]
    fn test_production_limited_by_ledger() {
        let mut world = world();
        world.place_building(AI, BuildingKind::TownHall, Coord::new(10, 10), true);
        world.player_mut(AI).unwrap().gold = 60;

        let commands = run(&mut hard(), &world);
        let trains = commands
            .iter()
            .filter(|c| matches!(c, Command::TrainUnit { .. }))
            .count();
        assert_eq!(trains, 1);
    }

    #[test]
    fn test_production_stops_at_pop_cap() {
        let mut world = world();
        world.place_building(AI, BuildingKind::TownHall, Coord::new(10, 10), true);
        for i in 0..5 {
            world.spawn_unit(AI, UnitKind::Peasant, Coord::new(20 + i, 20));
        }
        let mut profile = Difficulty::Hard.profile();
        profile.gather_efficiency = 0.0;

        let commands = run(&mut AiController::new(AI, profile, 1), &world);
        assert!(!commands.iter().any(|c| matches!(c, Command::TrainUnit { .. })));
    }

    #[test]
    fn test_build_waits_for_delay_then_builds_farm() {
        let mut world = world();
        world.place_building(AI, BuildingKind::TownHall, Coord::new(20, 20), true);
        for i in 0..4 {
            world.spawn_unit(AI, UnitKind::Peasant, Coord::new(30 + i, 30));
        }
        let profile = Difficulty::Hard.profile().with_build_delay(50);
        let mut ai = AiController::new(AI, profile, 1);

        world.tick = 10;
        let early = run(&mut ai, &world);
        assert!(!early.iter().any(|c| matches!(c, Command::Build { .. })));

        world.tick = 50;
        let later = run(&mut ai, &world);
        let build = later
            .iter()
            .find(|c| matches!(c, Command::Build { .. }))
            .unwrap();
        let Command::Build { building_type, x, y, .. } = build else {
            unreachable!()
        };
        assert_eq!(*building_type, BuildingKind::Farm);
        // Hall center is (21, 21); the site lies on a ring at least 4 out.
        assert!(Coord::new(*x, *y).chebyshev(Coord::new(21, 21)) >= 4);
    }

    #[test]
    fn test_one_farm_at_a_time() {
        let mut world = world();
        world.place_building(AI, BuildingKind::TownHall, Coord::new(20, 20), true);
        world.place_building(AI, BuildingKind::Farm, Coord::new(30, 20), false);
        world.place_building(AI, BuildingKind::Barracks, Coord::new(30, 30), true);
        for i in 0..4 {
            world.spawn_unit(AI, UnitKind::Peasant, Coord::new(10 + i, 40));
        }
        let profile = Difficulty::Easy.profile().with_build_delay(0);

        let commands = run(&mut AiController::new(AI, profile, 1), &world);
        assert!(!commands.iter().any(|c| matches!(c, Command::Build { .. })));
    }

    #[test]
    fn test_defense_sends_idle_military() {
        let mut world = world();
        world.place_building(AI, BuildingKind::TownHall, Coord::new(20, 20), true);
        let guard = world.spawn_unit(AI, UnitKind::Footman, Coord::new(25, 20));
        let raider = world.spawn_unit(ENEMY, UnitKind::Footman, Coord::new(27, 22));
        let profile = Difficulty::Easy.profile();

        let commands = run(&mut AiController::new(AI, profile, 1), &world);
        assert!(commands.contains(&Command::Attack {
            unit_ids: vec![guard],
            target_id: EntityId::Unit(raider),
        }));
    }

    #[test]
    fn test_same_seed_same_commands() {
        let mut world = world();
        world.place_building(AI, BuildingKind::TownHall, Coord::new(20, 20), true);
        world.resources.insert(Coord::new(30, 30), ResourceNode::new(ResourceKind::Gold, 500));
        for i in 0..3 {
            world.spawn_unit(AI, UnitKind::Peasant, Coord::new(10 + i, 10));
        }
        let profile = Difficulty::Medium.profile();

        let a = run(&mut AiController::new(AI, profile, 99), &world);
        let b = run(&mut AiController::new(AI, profile, 99), &world);
        assert_eq!(a, b);
    }
}
