//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a match produces identical results
//! given identical inputs.
//!
//! # Testing Strategy
//!
//! The same seed and the same command stream must always lead to the same
//! world. Sources of divergence include:
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Entities live in slot-ordered arenas and resources in a `BTreeMap`.
//!
//! - **Unseeded randomness**: the AI and map generator only draw from
//!   seeded `ChaCha8Rng` instances.
//!
//! - **Floating-point path costs**: path costs use fixed-point arithmetic.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: each system in isolation
//! 2. **Property tests**: random inputs must still produce repeatable outputs
//! 3. **Integration tests**: full matches are reproducible
//! 4. **Parallel tests**: running N matches on threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use skirmish_core::simulation::Simulation;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic match).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that every run matched, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Simulation is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a state machine multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run
/// * `ticks` - Number of steps per run
/// * `setup` - Function to create the initial state
/// * `step` - Function to advance the state by one tick
/// * `hash` - Function to compute the state hash
///
/// # Example
///
/// ```
/// use skirmish_test_utils::determinism::verify_determinism;
/// use skirmish_test_utils::fixtures::battle_scenario;
///
/// let result = verify_determinism(
///     3,
///     50,
///     battle_scenario,
///     |sim| {
///         sim.tick();
///     },
///     |sim| sim.state_hash(),
/// );
/// result.assert_deterministic();
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a [`Simulation`] twice from the same setup and compare final hashes.
pub fn verify_simulation_determinism<F>(setup_fn: F, num_ticks: u64) -> bool
where
    F: Fn() -> Simulation,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |sim| {
            sim.tick();
        },
        Simulation::state_hash,
    )
    .is_deterministic
}

/// Run `num_sims` matches on scoped threads and collect their final hashes.
///
/// Catches divergence that only shows up under different scheduling or
/// memory layout.
///
/// # Panics
///
/// Panics if a simulation thread panics.
pub fn run_parallel_simulations<F>(setup_fn: F, num_sims: usize, num_ticks: u64) -> DeterminismResult
where
    F: Fn() -> Simulation + Sync,
{
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut sim = setup_fn();
                    for _ in 0..num_ticks {
                        sim.tick();
                    }
                    sim.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("simulation thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks: num_ticks,
    }
}

/// Compare two runs tick by tick, returning the first tick whose hashes
/// differ, or `None` if they never do.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64) -> Option<u64>
where
    F: Fn() -> Simulation,
{
    let mut sim1 = setup_fn();
    let mut sim2 = setup_fn();

    if sim1.state_hash() != sim2.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        sim1.tick();
        sim2.tick();

        if sim1.state_hash() != sim2.state_hash() {
            tracing::warn!(tick, "simulations diverged");
            return Some(tick);
        }
    }

    None
}

/// Compute a simple hash for any hashable value.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Proptest strategies for simulation inputs.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::commands::Command;
    use skirmish_core::components::{BuildingId, EntityId, UnitId};
    use skirmish_core::data::{BuildingKind, UnitKind};
    use skirmish_core::math::Coord;

    /// A tile inside a `width` x `height` map.
    pub fn arb_coord(width: i32, height: i32) -> impl Strategy<Value = Coord> {
        (0..width, 0..height).prop_map(|(x, y)| Coord::new(x, y))
    }

    /// Up to `max` obstacle tiles inside the map.
    pub fn arb_obstacles(width: i32, height: i32, max: usize) -> impl Strategy<Value = Vec<Coord>> {
        prop::collection::vec(arb_coord(width, height), 0..=max)
    }

    /// Any unit type.
    pub fn arb_unit_kind() -> impl Strategy<Value = UnitKind> {
        prop::sample::select(UnitKind::ALL.to_vec())
    }

    /// Any building type.
    pub fn arb_building_kind() -> impl Strategy<Value = BuildingKind> {
        prop::sample::select(BuildingKind::ALL.to_vec())
    }

    /// A unit id from the first `slots` slots of a fresh arena.
    pub fn arb_unit_id(slots: u64) -> impl Strategy<Value = UnitId> {
        (0..slots).prop_map(UnitId::from)
    }

    /// A building id from the first `slots` slots of a fresh arena.
    pub fn arb_building_id(slots: u64) -> impl Strategy<Value = BuildingId> {
        (0..slots).prop_map(BuildingId::from)
    }

    /// Any command aimed at ids and tiles in range. Many will be invalid,
    /// which is the point: invalid commands must be harmless.
    pub fn arb_command(width: i32, height: i32, slots: u64) -> impl Strategy<Value = Command> {
        let units = || prop::collection::vec(arb_unit_id(slots), 1..4);
        prop_oneof![
            (units(), arb_coord(width, height))
                .prop_map(|(unit_ids, c)| Command::Move { unit_ids, x: c.x, y: c.y }),
            (units(), arb_unit_id(slots)).prop_map(|(unit_ids, target)| Command::Attack {
                unit_ids,
                target_id: EntityId::Unit(target),
            }),
            (units(), arb_building_id(slots)).prop_map(|(unit_ids, target)| Command::Attack {
                unit_ids,
                target_id: EntityId::Building(target),
            }),
            (units(), arb_coord(width, height))
                .prop_map(|(unit_ids, c)| Command::Gather { unit_ids, x: c.x, y: c.y }),
            (arb_unit_id(slots), arb_building_kind(), arb_coord(width, height)).prop_map(
                |(unit_id, building_type, c)| Command::Build {
                    unit_id,
                    building_type,
                    x: c.x,
                    y: c.y,
                }
            ),
            (arb_building_id(slots), arb_unit_kind()).prop_map(|(building_id, unit_type)| {
                Command::TrainUnit {
                    building_id,
                    unit_type,
                }
            }),
        ]
    }

    /// Commands paired with the index of the issuing player (0 or 1).
    pub fn arb_command_sequence(
        width: i32,
        height: i32,
        slots: u64,
        max_len: usize,
    ) -> impl Strategy<Value = Vec<(u8, Command)>> {
        prop::collection::vec((0u8..2, arb_command(width, height, slots)), 0..max_len)
    }
}
