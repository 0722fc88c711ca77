//! Build-site search for the AI.

use crate::components::footprint;
use crate::data::BuildingKind;
use crate::math::Coord;
use crate::world::{ring, WorldState};

/// Closest ring to the town hall that is searched.
pub const MIN_SEARCH_RADIUS: i32 = 4;

/// Farthest ring to the town hall that is searched.
pub const MAX_SEARCH_RADIUS: i32 = 14;

/// Find an origin for a `kind` footprint by walking square rings outward
/// from `center`, radius 4 through 14. Within a ring, tiles are tried in
/// row-major order.
#[must_use]
pub fn find_build_site(world: &WorldState, center: Coord, kind: BuildingKind) -> Option<Coord> {
    (MIN_SEARCH_RADIUS..=MAX_SEARCH_RADIUS)
        .flat_map(|radius| ring(center, radius))
        .find(|&origin| world.footprint_is_clear(&footprint(kind, origin)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PlayerId;
    use crate::map::{ResourceField, Tile, TileGrid};

    #[test]
    fn test_site_found_on_first_clear_ring() {
        let mut world = WorldState::new(TileGrid::new(40, 40), ResourceField::new(), 2);
        world.place_building(PlayerId(0), BuildingKind::TownHall, Coord::new(19, 19), true);

        let site = find_build_site(&world, Coord::new(20, 20), BuildingKind::Farm).unwrap();
        assert_eq!(site.chebyshev(Coord::new(20, 20)), 4);
        assert_eq!(site, Coord::new(16, 16));
    }

    #[test]
    fn test_site_skips_blocked_ring() {
        let mut world = WorldState::new(TileGrid::new(40, 40), ResourceField::new(), 2);
        for c in ring(Coord::new(20, 20), 4) {
            world.tiles.set(c, Tile::Rock);
        }

        let site = find_build_site(&world, Coord::new(20, 20), BuildingKind::Farm).unwrap();
        assert!(site.chebyshev(Coord::new(20, 20)) > 4);
        assert!(world.footprint_is_clear(&footprint(BuildingKind::Farm, site)));
    }

    #[test]
    fn test_no_site_on_tiny_map() {
        let world = WorldState::new(TileGrid::new(6, 6), ResourceField::new(), 2);
        assert_eq!(find_build_site(&world, Coord::new(3, 3), BuildingKind::Barracks), None);
    }
}
