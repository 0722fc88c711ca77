//! Grid pathfinding using the A* algorithm.
//!
//! Moves are 8-directional: orthogonal steps cost 1 and diagonal steps √2,
//! both in fixed-point so ties resolve the same way on every run. The
//! heuristic is Manhattan distance.
//!
//! A tile is blocked if it is not grass or lies under a building footprint.
//! The destination itself may be blocked, so a unit can be routed up to an
//! enemy building or a resource tile. When the target cannot be reached
//! within the step budget the search returns the best partial path it found.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::map::TileGrid;
use crate::math::{Coord, Fixed, SQRT_2};
use crate::world::{is_blocked, Buildings};

/// Default number of node expansions before the search gives up.
pub const DEFAULT_MAX_STEPS: usize = 200;

/// Direction offsets for 8-directional movement.
const DIRECTIONS: [(i32, i32); 8] = [
    (1, 0),   // East
    (1, 1),   // Southeast
    (0, 1),   // South
    (-1, 1),  // Southwest
    (-1, 0),  // West
    (-1, -1), // Northwest
    (0, -1),  // North
    (1, -1),  // Northeast
];

/// A node in the A* open set priority queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AStarNode {
    coord: Coord,
    /// Cost from the start when this entry was pushed.
    g_score: Fixed,
    /// Heuristic distance to the target.
    h_score: Fixed,
}

impl AStarNode {
    fn f_score(&self) -> Fixed {
        self.g_score + self.h_score
    }
}

impl Ord for AStarNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse every comparison so the lowest
        // f-score pops first, then the lowest heuristic, then row-major order.
        other
            .f_score()
            .cmp(&self.f_score())
            .then_with(|| other.h_score.cmp(&self.h_score))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for AStarNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Manhattan distance heuristic.
#[inline]
fn heuristic(from: Coord, to: Coord) -> Fixed {
    Fixed::from_num(from.manhattan(to))
}

/// Cost of a single step between adjacent tiles.
#[inline]
fn step_cost(from: Coord, to: Coord) -> Fixed {
    if from.x != to.x && from.y != to.y {
        SQRT_2
    } else {
        Fixed::ONE
    }
}

/// Find a path from `start` to `target`.
///
/// Returns the sequence of tiles from `start` to `target` inclusive. If the
/// target is not reached within `max_steps` expansions, returns the path to
/// the explored tile closest to the target by heuristic instead, or `None`
/// when no tile closer than the start was found.
///
/// `start == target` yields the single-point path. A target outside the map
/// yields `None`.
#[must_use]
pub fn find_path(
    tiles: &TileGrid,
    buildings: &Buildings,
    start: Coord,
    target: Coord,
    max_steps: usize,
) -> Option<Vec<Coord>> {
    if start == target {
        return Some(vec![start]);
    }
    if !tiles.in_bounds(start) || !tiles.in_bounds(target) {
        return None;
    }

    let mut open_set = BinaryHeap::new();
    let mut came_from: HashMap<Coord, Coord> = HashMap::new();
    let mut g_score: HashMap<Coord, Fixed> = HashMap::new();

    let start_h = heuristic(start, target);
    let mut best = (start_h, start);

    g_score.insert(start, Fixed::ZERO);
    open_set.push(AStarNode {
        coord: start,
        g_score: Fixed::ZERO,
        h_score: start_h,
    });

    let mut expansions = 0;

    while let Some(current) = open_set.pop() {
        if current.coord == target {
            return Some(reconstruct_path(&came_from, target));
        }

        // Skip entries superseded by a cheaper route.
        if g_score
            .get(&current.coord)
            .is_some_and(|&g| current.g_score > g)
        {
            continue;
        }

        expansions += 1;
        if expansions > max_steps {
            break;
        }

        if current.h_score < best.0 {
            best = (current.h_score, current.coord);
        }

        for &(dx, dy) in &DIRECTIONS {
            let neighbor = current.coord.offset(dx, dy);

            if !tiles.in_bounds(neighbor) {
                continue;
            }
            if neighbor != target && is_blocked(tiles, buildings, neighbor) {
                continue;
            }

            let tentative_g = current.g_score + step_cost(current.coord, neighbor);
            let neighbor_g = g_score.get(&neighbor).copied().unwrap_or(Fixed::MAX);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.coord);
                g_score.insert(neighbor, tentative_g);
                open_set.push(AStarNode {
                    coord: neighbor,
                    g_score: tentative_g,
                    h_score: heuristic(neighbor, target),
                });
            }
        }
    }

    let (_, closest) = best;
    if closest == start {
        tracing::trace!(%start, %target, "no progress possible toward target");
        return None;
    }
    Some(reconstruct_path(&came_from, closest))
}

/// Reconstruct a path from the `came_from` map, start first.
fn reconstruct_path(came_from: &HashMap<Coord, Coord>, end: Coord) -> Vec<Coord> {
    let mut path = vec![end];
    let mut current = end;

    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }

    path.reverse();
    path
}

/// Total step cost of a path under the 8-directional cost model.
#[must_use]
pub fn path_cost(path: &[Coord]) -> Fixed {
    path.windows(2)
        .map(|pair| step_cost(pair[0], pair[1]))
        .fold(Fixed::ZERO, |acc, cost| acc + cost)
}
