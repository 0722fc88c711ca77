//! Terrain tiles and harvestable resource nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::ResourceKind;
use crate::math::Coord;

/// Terrain type of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tile {
    /// Open ground. The only walkable and buildable tile.
    #[default]
    Grass,
    /// Impassable water.
    Water,
    /// A tree; harvestable for wood.
    Tree,
    /// A gold mine; harvestable for gold.
    GoldMine,
    /// Impassable rock.
    Rock,
}

impl Tile {
    /// Returns true if units may stand on this tile.
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Grass)
    }
}

/// Fixed-size terrain grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileGrid {
    /// Grid width in tiles.
    width: u32,
    /// Grid height in tiles.
    height: u32,
    /// Tiles stored in row-major order.
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// Create a new grid filled with grass.
    ///
    /// # Panics
    ///
    /// Panics if `width` or `height` is zero.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        assert!(width > 0, "TileGrid width must be positive");
        assert!(height > 0, "TileGrid height must be positive");

        Self {
            width,
            height,
            tiles: vec![Tile::Grass; (width as usize) * (height as usize)],
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

    #[inline]
    fn index(&self, c: Coord) -> Option<usize> {
        self.in_bounds(c)
            .then(|| (c.y as usize) * (self.width as usize) + (c.x as usize))
    }

    /// Check if coordinates are within grid bounds.
    #[must_use]
    pub fn in_bounds(&self, c: Coord) -> bool {
        c.x >= 0 && c.y >= 0 && (c.x as u32) < self.width && (c.y as u32) < self.height
    }

    /// Get the tile at `c`, or `None` out of bounds.
    #[must_use]
    pub fn get(&self, c: Coord) -> Option<Tile> {
        self.index(c).map(|i| self.tiles[i])
    }

    /// Set the tile at `c`. Returns `false` if out of bounds.
    pub fn set(&mut self, c: Coord, tile: Tile) -> bool {
        match self.index(c) {
            Some(i) => {
                self.tiles[i] = tile;
                true
            }
            None => false,
        }
    }

    /// Check if a tile is in bounds and walkable terrain.
    #[must_use]
    pub fn is_walkable(&self, c: Coord) -> bool {
        self.get(c).is_some_and(Tile::is_walkable)
    }

    /// Rows of tiles, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[Tile]> {
        self.tiles.chunks(self.width as usize)
    }

    /// All tiles in row-major order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
}

/// A harvestable stock of gold or wood sitting on one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceNode {
    /// What this node yields.
    pub kind: ResourceKind,
    /// Amount left. Never increases.
    pub amount: u32,
}

impl ResourceNode {
    /// Create a new resource node.
    #[must_use]
    pub const fn new(kind: ResourceKind, amount: u32) -> Self {
        Self { kind, amount }
    }

    /// Check if this node is depleted.
    #[must_use]
    pub const fn is_depleted(&self) -> bool {
        self.amount == 0
    }

    /// Extract up to `requested`, returning the amount actually taken.
    pub fn extract(&mut self, requested: u32) -> u32 {
        let extracted = requested.min(self.amount);
        self.amount -= extracted;
        extracted
    }
}

/// Resource nodes keyed by tile.
///
/// Ordered by row-major coordinate so nearest-node searches break ties the
/// same way every run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceField {
    nodes: BTreeMap<Coord, ResourceNode>,
}

impl ResourceField {
    /// Create an empty field.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the node at `c`.
    pub fn insert(&mut self, c: Coord, node: ResourceNode) {
        self.nodes.insert(c, node);
    }

    /// Node at `c`.
    #[must_use]
    pub fn get(&self, c: Coord) -> Option<&ResourceNode> {
        self.nodes.get(&c)
    }

    /// Mutable node at `c`.
    pub fn get_mut(&mut self, c: Coord) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(&c)
    }

    /// Remove the node at `c`.
    pub fn remove(&mut self, c: Coord) -> Option<ResourceNode> {
        self.nodes.remove(&c)
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the field is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over nodes in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &ResourceNode)> {
        self.nodes.iter().map(|(c, node)| (*c, node))
    }

    /// Nearest non-depleted node of `kind` by squared distance.
    #[must_use]
    pub fn nearest(&self, kind: ResourceKind, from: Coord) -> Option<Coord> {
        self.iter()
            .filter(|(_, node)| node.kind == kind && !node.is_depleted())
            .min_by_key(|(c, _)| from.distance_squared(*c))
            .map(|(c, _)| c)
    }

    /// Remove depleted nodes, returning their tiles.
    pub fn remove_depleted(&mut self) -> Vec<(Coord, ResourceNode)> {
        let depleted: Vec<Coord> = self
            .iter()
            .filter(|(_, node)| node.is_depleted())
            .map(|(c, _)| c)
            .collect();

        depleted
            .into_iter()
            .filter_map(|c| self.nodes.remove(&c).map(|node| (c, node)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_grass_is_walkable() {
        assert!(Tile::Grass.is_walkable());
        assert!(!Tile::Water.is_walkable());
        assert!(!Tile::Tree.is_walkable());
        assert!(!Tile::GoldMine.is_walkable());
        assert!(!Tile::Rock.is_walkable());
    }

    #[test]
    fn test_tile_grid_bounds() {
        let mut grid = TileGrid::new(4, 3);
        assert!(grid.in_bounds(Coord::new(3, 2)));
        assert!(!grid.in_bounds(Coord::new(4, 0)));
        assert!(!grid.in_bounds(Coord::new(-1, 0)));
        assert_eq!(grid.get(Coord::new(0, 3)), None);

        assert!(grid.set(Coord::new(1, 1), Tile::Rock));
        assert!(!grid.is_walkable(Coord::new(1, 1)));
        assert!(!grid.set(Coord::new(9, 9), Tile::Rock));
        assert_eq!(grid.rows().count(), 3);
    }

    #[test]
    fn test_resource_extraction_never_underflows() {
        let mut node = ResourceNode::new(ResourceKind::Gold, 3);
        assert_eq!(node.extract(2), 2);
        assert_eq!(node.extract(2), 1);
        assert_eq!(node.extract(2), 0);
        assert!(node.is_depleted());
    }

    #[test]
    fn test_nearest_node_by_kind() {
        let mut field = ResourceField::new();
        field.insert(Coord::new(10, 10), ResourceNode::new(ResourceKind::Gold, 100));
        field.insert(Coord::new(2, 2), ResourceNode::new(ResourceKind::Wood, 100));
        field.insert(Coord::new(3, 3), ResourceNode::new(ResourceKind::Gold, 0));

        let from = Coord::new(0, 0);
        assert_eq!(
            field.nearest(ResourceKind::Gold, from),
            Some(Coord::new(10, 10))
        );
        assert_eq!(field.nearest(ResourceKind::Wood, from), Some(Coord::new(2, 2)));
    }

    #[test]
    fn test_remove_depleted() {
        let mut field = ResourceField::new();
        field.insert(Coord::new(1, 1), ResourceNode::new(ResourceKind::Wood, 0));
        field.insert(Coord::new(2, 1), ResourceNode::new(ResourceKind::Wood, 5));
        let removed = field.remove_depleted();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, Coord::new(1, 1));
        assert_eq!(field.len(), 1);
    }
}
