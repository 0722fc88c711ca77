//! Procedural two-player maps.
//!
//! Generates fair maps with:
//! - Mirrored or rotated terrain so both bases see the same layout
//! - Cleared spawn areas with a gold mine and a tree line at each base
//! - Tree clusters, a central lake and scattered rocks
//!
//! Every `TREE` tile becomes a wood node and every `GOLD_MINE` tile a gold
//! node. The same config always yields the same map.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::components::{footprint, PlayerId};
use crate::data::{BuildingKind, ResourceKind, UnitKind, STARTING_PEASANTS};
use crate::error::{GameError, Result};
use crate::map::{ResourceField, ResourceNode, Tile, TileGrid};
use crate::math::{Coord, Rect};
use crate::world::{ring, WorldState};

/// Wood in a tree tile.
pub const TREE_WOOD: u32 = 100;

/// Gold in a mine tile.
pub const MINE_GOLD: u32 = 1500;

/// Smallest accepted map side.
pub const MIN_MAP_SIZE: u32 = 32;

/// Largest accepted map side.
pub const MAX_MAP_SIZE: u32 = 256;

/// Distance from the map edge to a town hall.
const BASE_PADDING: i32 = 6;

/// Tiles around a base kept free of random features.
const SAFE_RADIUS: i32 = 7;

/// Seeds tried before giving up on a connected layout.
const MAX_ATTEMPTS: u64 = 16;

/// Map configuration for procedural generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Map width in tiles.
    pub width: u32,
    /// Map height in tiles.
    pub height: u32,
    /// Symmetry between the two halves.
    pub symmetry: SymmetryMode,
    /// Rock density (0.0 = open, 1.0 = very dense).
    pub obstacle_density: f32,
    /// Number of random tree clusters.
    pub tree_clusters: u32,
    /// Whether to flood the middle of the map.
    pub central_lake: bool,
    /// Random seed for deterministic generation.
    pub seed: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            symmetry: SymmetryMode::Rotational,
            obstacle_density: 0.15,
            tree_clusters: 10,
            central_lake: true,
            seed: 12345,
        }
    }
}

impl MapConfig {
    /// A 48x48 map.
    #[must_use]
    pub fn small() -> Self {
        Self {
            width: 48,
            height: 48,
            tree_clusters: 6,
            ..Default::default()
        }
    }

    /// A 64x64 map.
    #[must_use]
    pub fn medium() -> Self {
        Self::default()
    }

    /// A 96x96 map.
    #[must_use]
    pub fn large() -> Self {
        Self {
            width: 96,
            height: 96,
            tree_clusters: 18,
            ..Default::default()
        }
    }

    /// Set the random seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set the symmetry mode.
    #[must_use]
    pub const fn with_symmetry(mut self, symmetry: SymmetryMode) -> Self {
        self.symmetry = symmetry;
        self
    }

    /// Set obstacle density.
    #[must_use]
    pub fn with_obstacle_density(mut self, density: f32) -> Self {
        self.obstacle_density = density.clamp(0.0, 1.0);
        self
    }

    /// Check dimensions and densities.
    pub fn validate(&self) -> Result<()> {
        for (name, side) in [("width", self.width), ("height", self.height)] {
            if !(MIN_MAP_SIZE..=MAX_MAP_SIZE).contains(&side) {
                return Err(GameError::InvalidConfig(format!(
                    "map {name} must be within {MIN_MAP_SIZE}..={MAX_MAP_SIZE}, got {side}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&self.obstacle_density) {
            return Err(GameError::InvalidConfig(format!(
                "obstacle_density must be within 0..=1, got {}",
                self.obstacle_density
            )));
        }
        Ok(())
    }

    fn mirror(&self, c: Coord) -> Coord {
        let (w, h) = (self.width as i32, self.height as i32);
        match self.symmetry {
            SymmetryMode::Rotational => Coord::new(w - 1 - c.x, h - 1 - c.y),
            SymmetryMode::Horizontal => Coord::new(w - 1 - c.x, c.y),
            SymmetryMode::Vertical => Coord::new(c.x, h - 1 - c.y),
        }
    }

    fn mirror_rect(&self, rect: Rect) -> Rect {
        let a = self.mirror(rect.origin);
        let b = self.mirror(rect.origin.offset(rect.width as i32 - 1, rect.height as i32 - 1));
        Rect::new(Coord::new(a.x.min(b.x), a.y.min(b.y)), rect.width, rect.height)
    }

    /// Whether `c` lies in the half that is generated and then copied.
    fn is_primary(&self, c: Coord) -> bool {
        match self.symmetry {
            SymmetryMode::Rotational | SymmetryMode::Vertical => {
                c.y < (self.height as i32 + 1) / 2
            }
            SymmetryMode::Horizontal => c.x < (self.width as i32 + 1) / 2,
        }
    }
}

/// How the second half of the map relates to the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SymmetryMode {
    /// 180-degree rotation; bases in opposite corners.
    #[default]
    Rotational,
    /// Left-right mirror; bases on the west and east edges.
    Horizontal,
    /// Top-bottom mirror; bases on the north and south edges.
    Vertical,
}

/// A starting base on the generated map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnPoint {
    /// Owner of the base.
    pub player: PlayerId,
    /// Origin of the town hall footprint.
    pub town_hall: Coord,
    /// The base's gold mine.
    pub gold_mine: Coord,
}

/// Generated map data.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedMap {
    /// Map configuration used.
    pub config: MapConfig,
    /// Terrain.
    pub tiles: TileGrid,
    /// Wood and gold nodes.
    pub resources: ResourceField,
    /// One base per player.
    pub spawn_points: Vec<SpawnPoint>,
}

impl GeneratedMap {
    /// Build the starting world: a complete town hall and
    /// [`STARTING_PEASANTS`] peasants per base.
    #[must_use]
    pub fn into_world(self) -> WorldState {
        let mut world = WorldState::new(self.tiles, self.resources, self.spawn_points.len() as u8);

        for spawn in &self.spawn_points {
            world.place_building(spawn.player, BuildingKind::TownHall, spawn.town_hall, true);

            let center = footprint(BuildingKind::TownHall, spawn.town_hall).center();
            let slots: Vec<Coord> = ring(center, 2)
                .filter(|c| !world.is_blocked(*c))
                .take(STARTING_PEASANTS as usize)
                .collect();
            for position in slots {
                world.spawn_unit(spawn.player, UnitKind::Peasant, position);
            }
        }

        world
    }
}

/// Generate a map with the given configuration.
///
/// Layouts whose bases are not connected by walkable ground are rerolled with
/// the next seed; after a bounded number of tries this gives up with
/// [`GameError::MapGeneration`].
pub fn generate_map(config: &MapConfig) -> Result<GeneratedMap> {
    config.validate()?;

    for attempt in 0..MAX_ATTEMPTS {
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed.wrapping_add(attempt));
        let (tiles, spawn_points) = generate_terrain(config, &mut rng);

        let [first, second] = [spawn_points[0], spawn_points[1]].map(|s| s.town_hall.offset(-1, -1));
        if !connected(&tiles, first, second) {
            tracing::debug!(seed = config.seed, attempt, "map rejected: bases not connected");
            continue;
        }

        let resources = collect_resources(&tiles);
        tracing::debug!(
            seed = config.seed,
            attempt,
            nodes = resources.len(),
            "map generated"
        );
        return Ok(GeneratedMap {
            config: config.clone(),
            tiles,
            resources,
            spawn_points,
        });
    }

    Err(GameError::MapGeneration(format!(
        "no connected layout for seed {} after {MAX_ATTEMPTS} attempts",
        config.seed
    )))
}

fn generate_terrain(config: &MapConfig, rng: &mut ChaCha8Rng) -> (TileGrid, Vec<SpawnPoint>) {
    let mut tiles = TileGrid::new(config.width, config.height);
    let (w, h) = (config.width as i32, config.height as i32);

    let first_hall = match config.symmetry {
        SymmetryMode::Rotational => Coord::new(BASE_PADDING, BASE_PADDING),
        SymmetryMode::Horizontal => Coord::new(BASE_PADDING, h / 2 - 1),
        SymmetryMode::Vertical => Coord::new(w / 2 - 1, BASE_PADDING),
    };
    let hall_rect = footprint(BuildingKind::TownHall, first_hall);
    let second_hall = config.mirror_rect(hall_rect).origin;
    let safe = |c: Coord| {
        let near = |r: Rect| r.chebyshev_to(c) <= SAFE_RADIUS as u32;
        near(hall_rect) || near(footprint(BuildingKind::TownHall, second_hall))
    };

    if config.central_lake {
        let radius = (w.min(h) / 12).max(2);
        let center = Coord::new(w / 2, h / 2);
        paint_disc(&mut tiles, center, radius, Tile::Water, &safe);
    }

    for _ in 0..config.tree_clusters {
        let center = Coord::new(rng.gen_range(2..w - 2), rng.gen_range(2..h - 2));
        let radius = rng.gen_range(1..=3);
        paint_disc(&mut tiles, center, radius, Tile::Tree, &safe);
    }

    let rocks = (f64::from(config.width * config.height) * f64::from(config.obstacle_density) * 0.05)
        .round() as u32;
    for _ in 0..rocks {
        let origin = Coord::new(rng.gen_range(2..w - 2), rng.gen_range(2..h - 2));
        let size = rng.gen_range(1..=2);
        for c in Rect::new(origin, size, size).tiles() {
            if !safe(c) && tiles.get(c) == Some(Tile::Grass) {
                tiles.set(c, Tile::Rock);
            }
        }
    }

    // Base resources for the first player; symmetry copies them to the second.
    let (gold_mine, tree_line) = base_layout(config, hall_rect);
    tiles.set(gold_mine, Tile::GoldMine);
    for c in tree_line {
        tiles.set(c, Tile::Tree);
    }

    apply_symmetry(config, &mut tiles);

    let spawn_points = vec![
        SpawnPoint {
            player: PlayerId(0),
            town_hall: first_hall,
            gold_mine,
        },
        SpawnPoint {
            player: PlayerId(1),
            town_hall: second_hall,
            gold_mine: config.mirror(gold_mine),
        },
    ];
    (tiles, spawn_points)
}

/// Gold mine and tree line positions for a base, placed toward the map's
/// interior so they stay in the generated half.
fn base_layout(config: &MapConfig, hall: Rect) -> (Coord, Vec<Coord>) {
    let c = hall.center();
    match config.symmetry {
        SymmetryMode::Rotational => (c.offset(6, 0), (-2..=2).map(|d| c.offset(d, 6)).collect()),
        SymmetryMode::Horizontal => (c.offset(6, 0), (-2..=2).map(|d| c.offset(d, -6)).collect()),
        SymmetryMode::Vertical => (c.offset(0, 6), (-2..=2).map(|d| c.offset(6, d)).collect()),
    }
}

fn paint_disc(
    tiles: &mut TileGrid,
    center: Coord,
    radius: i32,
    tile: Tile,
    safe: &impl Fn(Coord) -> bool,
) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let c = center.offset(dx, dy);
            if dx * dx + dy * dy <= radius * radius && !safe(c) && tiles.get(c) == Some(Tile::Grass)
            {
                tiles.set(c, tile);
            }
        }
    }
}

/// Copy the primary half onto the other half.
fn apply_symmetry(config: &MapConfig, tiles: &mut TileGrid) {
    let (w, h) = (config.width as i32, config.height as i32);
    for y in 0..h {
        for x in 0..w {
            let c = Coord::new(x, y);
            if !config.is_primary(c) {
                continue;
            }
            let mirrored = config.mirror(c);
            if mirrored != c {
                if let Some(tile) = tiles.get(c) {
                    tiles.set(mirrored, tile);
                }
            }
        }
    }
}

/// Flood fill over walkable tiles, 8-connected.
fn connected(tiles: &TileGrid, from: Coord, to: Coord) -> bool {
    if !tiles.is_walkable(from) || !tiles.is_walkable(to) {
        return false;
    }

    let mut seen = vec![false; tiles.tiles().len()];
    let index = |c: Coord| (c.y as usize) * (tiles.width() as usize) + (c.x as usize);
    let mut frontier = VecDeque::from([from]);
    seen[index(from)] = true;

    while let Some(c) = frontier.pop_front() {
        if c == to {
            return true;
        }
        for next in ring(c, 1) {
            if tiles.is_walkable(next) && !seen[index(next)] {
                seen[index(next)] = true;
                frontier.push_back(next);
            }
        }
    }
    false
}

fn collect_resources(tiles: &TileGrid) -> ResourceField {
    let mut resources = ResourceField::new();
    for y in 0..tiles.height() as i32 {
        for x in 0..tiles.width() as i32 {
            let c = Coord::new(x, y);
            let node = match tiles.get(c) {
                Some(Tile::Tree) => ResourceNode::new(ResourceKind::Wood, TREE_WOOD),
                Some(Tile::GoldMine) => ResourceNode::new(ResourceKind::Gold, MINE_GOLD),
                _ => continue,
            };
            resources.insert(c, node);
        }
    }
    resources
}
