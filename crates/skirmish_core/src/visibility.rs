//! Per-player fog of war.
//!
//! Visibility is recomputed from scratch on every request: start all hidden,
//! then reveal a disc of `sight` tiles around each of the player's live units
//! and buildings. Buildings see from their footprint center.

use serde::{Deserialize, Serialize};

use crate::components::{Building, PlayerId, Unit};
use crate::math::Coord;
use crate::world::WorldState;

/// Revealed tiles for one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityGrid {
    width: u32,
    height: u32,
    revealed: Vec<bool>,
}

impl VisibilityGrid {
    /// An all-hidden grid.
    #[must_use]
    pub fn hidden(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            revealed: vec![false; (width as usize) * (height as usize)],
        }
    }

    /// Grid width in tiles.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in tiles.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, c: Coord) -> Option<usize> {
        let in_bounds =
            c.x >= 0 && c.y >= 0 && (c.x as u32) < self.width && (c.y as u32) < self.height;
        in_bounds.then(|| (c.y as usize) * (self.width as usize) + (c.x as usize))
    }

    /// Whether `c` is revealed. Out-of-bounds tiles are never visible.
    #[must_use]
    pub fn is_visible(&self, c: Coord) -> bool {
        self.index(c).is_some_and(|i| self.revealed[i])
    }

    /// Reveal every tile with `dx² + dy² ≤ radius²` around `center`, clipped
    /// to the grid.
    pub fn reveal_circle(&mut self, center: Coord, radius: u32) {
        let r = radius as i32;
        let r_squared = i64::from(r) * i64::from(r);

        for dy in -r..=r {
            for dx in -r..=r {
                if i64::from(dx * dx + dy * dy) > r_squared {
                    continue;
                }
                if let Some(i) = self.index(center.offset(dx, dy)) {
                    self.revealed[i] = true;
                }
            }
        }
    }

    /// Number of revealed tiles.
    #[must_use]
    pub fn revealed_count(&self) -> usize {
        self.revealed.iter().filter(|&&v| v).count()
    }

    /// Rows of visibility flags, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.revealed.chunks(self.width as usize)
    }
}

/// Compute what `player` can currently see.
#[must_use]
pub fn compute_visibility(world: &WorldState, player: PlayerId) -> VisibilityGrid {
    let mut grid = VisibilityGrid::hidden(world.tiles.width(), world.tiles.height());

    for unit in world.units.values() {
        if unit.owner == player && unit.is_alive() {
            grid.reveal_circle(unit.position, unit.stats().sight);
        }
    }

    for building in world.buildings.values() {
        if building.owner == player && building.is_alive() {
            grid.reveal_circle(building.footprint().center(), building.stats().sight);
        }
    }

    grid
}

/// Whether `viewer` should see `unit` given its visibility grid.
#[must_use]
pub fn unit_visible(grid: &VisibilityGrid, viewer: PlayerId, unit: &Unit) -> bool {
    unit.owner == viewer || grid.is_visible(unit.position)
}

/// Whether `viewer` should see `building`: own buildings always, enemy
/// buildings when any footprint tile is revealed.
#[must_use]
pub fn building_visible(grid: &VisibilityGrid, viewer: PlayerId, building: &Building) -> bool {
    building.owner == viewer || building.footprint().tiles().any(|c| grid.is_visible(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{BuildingKind, UnitKind};
    use crate::map::{ResourceField, TileGrid};

    fn world() -> WorldState {
        WorldState::new(TileGrid::new(40, 40), ResourceField::new(), 2)
    }

    #[test]
    fn test_circle_reveal_uses_squared_distance() {
        let mut grid = VisibilityGrid::hidden(20, 20);
        grid.reveal_circle(Coord::new(10, 10), 3);

        assert!(grid.is_visible(Coord::new(13, 10)));
        assert!(grid.is_visible(Coord::new(12, 12)));
        assert!(!grid.is_visible(Coord::new(13, 12)));
        assert!(!grid.is_visible(Coord::new(14, 10)));
        // Lattice points inside a radius-3 disc.
        assert_eq!(grid.revealed_count(), 29);
    }

    #[test]
    fn test_reveal_clipped_to_bounds() {
        let mut grid = VisibilityGrid::hidden(5, 5);
        grid.reveal_circle(Coord::new(0, 0), 2);
        assert!(grid.is_visible(Coord::new(2, 0)));
        assert!(!grid.is_visible(Coord::new(-1, 0)));
        assert_eq!(grid.revealed_count(), 6);
    }

    #[test]
    fn test_compute_only_reveals_own_vision() {
        let mut world = world();
        world.spawn_unit(PlayerId(0), UnitKind::Peasant, Coord::new(5, 5));
        world.spawn_unit(PlayerId(1), UnitKind::Footman, Coord::new(30, 30));

        let grid = compute_visibility(&world, PlayerId(0));
        assert!(grid.is_visible(Coord::new(5, 10)));
        assert!(!grid.is_visible(Coord::new(30, 30)));
    }

    #[test]
    fn test_enemy_filtering() {
        let mut world = world();
        world.spawn_unit(PlayerId(0), UnitKind::Archer, Coord::new(10, 10));
        let near = world.spawn_unit(PlayerId(1), UnitKind::Footman, Coord::new(14, 14));
        let far = world.spawn_unit(PlayerId(1), UnitKind::Footman, Coord::new(30, 10));
        // Footprint (17..19, 10..12): corner (17, 10) is 7 tiles away.
        let edge = world.place_building(PlayerId(1), BuildingKind::TownHall, Coord::new(17, 10), true);

        let viewer = PlayerId(0);
        let grid = compute_visibility(&world, viewer);

        assert!(unit_visible(&grid, viewer, world.units.get(near).unwrap()));
        assert!(!unit_visible(&grid, viewer, world.units.get(far).unwrap()));
        assert!(building_visible(&grid, viewer, world.buildings.get(edge).unwrap()));
        assert!(unit_visible(&grid, PlayerId(1), world.units.get(far).unwrap()));
    }
}
