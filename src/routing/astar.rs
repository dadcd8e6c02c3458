//! A* search over a uniform cell grid.

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap};

use serde::{Deserialize, Serialize};

/// Costs are kept as integers, one orthogonal step being this many units.
const COST_SCALE: f64 = 1000.0;
/// Extra cost, in steps, of changing direction when direction changes are punished.
const DIRECTION_CHANGE_PENALTY: f64 = 20.0;
const HEAVY_DIAGONAL_FACTOR: f64 = 2.41;
const TIE_BREAKER_WEIGHT: f64 = 0.001;

const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];
const WITH_DIAGONALS: [(i32, i32); 8] = [
    (0, -1),
    (1, 0),
    (0, 1),
    (-1, 0),
    (1, -1),
    (1, 1),
    (-1, 1),
    (-1, -1),
];

/// Distance estimate used to order the open set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Heuristic {
    #[default]
    Manhattan,
    /// Chebyshev distance.
    MaxDxDy,
    /// Diagonal steps for the shared part, straight steps for the rest.
    DiagonalShortCut,
    Euclidean,
    /// Squared Euclidean distance.
    EuclideanNoSqr,
    Custom1,
}

impl Heuristic {
    fn estimate(self, dx: f64, dy: f64) -> f64 {
        let (dx, dy) = (dx.abs(), dy.abs());
        match self {
            Heuristic::Manhattan => dx + dy,
            Heuristic::MaxDxDy => dx.max(dy),
            Heuristic::DiagonalShortCut => {
                let diagonal = dx.min(dy);
                let straight = dx + dy;
                2.0 * diagonal + (straight - 2.0 * diagonal)
            }
            Heuristic::Euclidean => (dx * dx + dy * dy).sqrt(),
            Heuristic::EuclideanNoSqr => dx * dx + dy * dy,
            Heuristic::Custom1 => {
                let orthogonal = (dx - dy).abs();
                let diagonal = ((dx + dy - orthogonal) / 2.0).abs();
                diagonal + orthogonal + dx + dy
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(super) struct SearchOptions {
    pub diagonals: bool,
    pub heuristic: Heuristic,
    /// Multiplier on the heuristic; values above one trade optimality for speed.
    pub heuristic_level: f64,
    pub punish_change_direction: bool,
    pub heavy_diagonals: bool,
    pub tie_breaker: bool,
    /// Maximum number of expanded states before giving up.
    pub search_limit: usize,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct GridState {
    x: i32,
    y: i32,
    dir: u8,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct GridEntry {
    est: u32,
    cost: u32,
    state: GridState,
}

impl Ord for GridEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .est
            .cmp(&self.est)
            .then_with(|| other.cost.cmp(&self.cost))
            .then_with(|| self.state.y.cmp(&other.state.y))
            .then_with(|| self.state.x.cmp(&other.state.x))
            .then_with(|| self.state.dir.cmp(&other.state.dir))
    }
}

impl PartialOrd for GridEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn scaled(cost: f64) -> u32 {
    (cost * COST_SCALE).round().clamp(0.0, u32::MAX as f64) as u32
}

/// Shortest cell path from `start` to `end` inclusive, or `None` when the
/// cells are disconnected or `search_limit` states were expanded first.
/// Memory grows with the states reached, not with the grid size.
///
/// `start` and `end` are always passable. A diagonal step is only taken when
/// both cells it cuts past are free.
pub(super) fn find_path(
    cols: i32,
    rows: i32,
    blocked: impl Fn(i32, i32) -> bool,
    start: (i32, i32),
    end: (i32, i32),
    options: &SearchOptions,
) -> Option<Vec<(i32, i32)>> {
    let inside = |x: i32, y: i32| x >= 0 && y >= 0 && x < cols && y < rows;
    if !inside(start.0, start.1) || !inside(end.0, end.1) {
        return None;
    }
    if start == end {
        return Some(vec![start]);
    }
    let passable = |x: i32, y: i32| {
        inside(x, y) && ((x, y) == start || (x, y) == end || !blocked(x, y))
    };

    let dirs: &[(i32, i32)] = if options.diagonals {
        &WITH_DIAGONALS
    } else {
        &ORTHOGONAL
    };
    let step_cost = scaled(1.0);
    let diagonal_cost = if options.heavy_diagonals {
        scaled(HEAVY_DIAGONAL_FACTOR)
    } else {
        step_cost
    };
    let turn_penalty = if options.punish_change_direction {
        scaled(DIRECTION_CHANGE_PENALTY)
    } else {
        0
    };
    let estimate = |x: i32, y: i32| -> u32 {
        let (dx, dy) = ((x - end.0) as f64, (y - end.1) as f64);
        let mut h = options.heuristic_level * options.heuristic.estimate(dx, dy);
        if options.tie_breaker {
            let (sx, sy) = ((start.0 - end.0) as f64, (start.1 - end.1) as f64);
            h += (dx * sy - sx * dy).abs() * TIE_BREAKER_WEIGHT;
        }
        scaled(h)
    };

    // Best known cost of each reached state and the state it was reached from.
    let mut visited: HashMap<GridState, (u32, Option<GridState>)> = HashMap::new();
    let mut heap = BinaryHeap::new();

    for dir in 0..dirs.len() as u8 {
        let state = GridState {
            x: start.0,
            y: start.1,
            dir,
        };
        visited.insert(state, (0, None));
        heap.push(GridEntry {
            est: estimate(start.0, start.1),
            cost: 0,
            state,
        });
    }

    let mut end_state = None;
    let mut steps = 0usize;
    while let Some(GridEntry { cost, state, .. }) = heap.pop() {
        steps += 1;
        if steps > options.search_limit {
            break;
        }
        if visited.get(&state).is_some_and(|&(best, _)| cost != best) {
            continue;
        }
        if (state.x, state.y) == end {
            end_state = Some(state);
            break;
        }
        for (dir_idx, &(dx, dy)) in dirs.iter().enumerate() {
            let (nx, ny) = (state.x + dx, state.y + dy);
            if !passable(nx, ny) {
                continue;
            }
            let diagonal = dx != 0 && dy != 0;
            if diagonal && (!passable(state.x + dx, state.y) || !passable(state.x, state.y + dy)) {
                continue;
            }
            let step = if diagonal { diagonal_cost } else { step_cost };
            let mut next_cost = cost.saturating_add(step);
            if state.dir != dir_idx as u8 {
                next_cost = next_cost.saturating_add(turn_penalty);
            }
            let next = GridState {
                x: nx,
                y: ny,
                dir: dir_idx as u8,
            };
            match visited.entry(next) {
                Entry::Occupied(mut seen) => {
                    if next_cost >= seen.get().0 {
                        continue;
                    }
                    seen.insert((next_cost, Some(state)));
                }
                Entry::Vacant(slot) => {
                    slot.insert((next_cost, Some(state)));
                }
            }
            heap.push(GridEntry {
                est: next_cost.saturating_add(estimate(nx, ny)),
                cost: next_cost,
                state: next,
            });
        }
    }

    let mut cur = end_state?;
    let mut cells = vec![(cur.x, cur.y)];
    while let Some(&(_, Some(previous))) = visited.get(&cur) {
        cur = previous;
        cells.push((cur.x, cur.y));
    }
    cells.reverse();
    Some(cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(diagonals: bool) -> SearchOptions {
        SearchOptions {
            diagonals,
            heuristic: Heuristic::Manhattan,
            heuristic_level: 1.0,
            punish_change_direction: false,
            heavy_diagonals: false,
            tie_breaker: false,
            search_limit: 10_000,
        }
    }

    fn assert_connected(path: &[(i32, i32)], diagonals: bool) {
        for pair in path.windows(2) {
            let dx = (pair[1].0 - pair[0].0).abs();
            let dy = (pair[1].1 - pair[0].1).abs();
            if diagonals {
                assert!(dx <= 1 && dy <= 1 && dx + dy > 0, "{pair:?}");
            } else {
                assert_eq!(dx + dy, 1, "{pair:?}");
            }
        }
    }

    #[test]
    fn goes_around_a_wall() {
        // Wall on x = 5 from y = 0 to y = 7.
        let wall = |x: i32, y: i32| x == 5 && y <= 7;
        for diagonals in [false, true] {
            let path = find_path(10, 10, wall, (0, 0), (9, 0), &options(diagonals)).unwrap();
            assert_eq!(path.first(), Some(&(0, 0)));
            assert_eq!(path.last(), Some(&(9, 0)));
            assert_connected(&path, diagonals);
            assert!(path.iter().all(|&(x, y)| !wall(x, y)));
        }
    }

    #[test]
    fn orthogonal_path_is_shortest() {
        let path = find_path(8, 8, |_, _| false, (1, 1), (5, 3), &options(false)).unwrap();
        assert_eq!(path.len(), 7);
    }

    #[test]
    fn enclosed_target_has_no_path() {
        let ring =
            |x: i32, y: i32| (3..=5).contains(&x) && (3..=5).contains(&y) && (x, y) != (4, 4);
        assert!(find_path(10, 10, ring, (0, 0), (4, 4), &options(true)).is_none());
    }

    #[test]
    fn search_limit_gives_up() {
        let tight = SearchOptions {
            search_limit: 3,
            ..options(false)
        };
        assert!(find_path(50, 50, |_, _| false, (0, 0), (49, 49), &tight).is_none());
    }

    #[test]
    fn huge_grid_costs_only_what_is_expanded() {
        let tight = SearchOptions {
            search_limit: 10,
            ..options(true)
        };
        let path = find_path(200_000, 200_000, |_, _| false, (5, 5), (6, 5), &tight).unwrap();
        assert_eq!(path, vec![(5, 5), (6, 5)]);
        assert!(find_path(200_000, 200_000, |_, _| false, (0, 0), (900, 900), &tight).is_none());
    }

    #[test]
    fn heuristics_measure_distance() {
        assert_eq!(Heuristic::Manhattan.estimate(3.0, -4.0), 7.0);
        assert_eq!(Heuristic::MaxDxDy.estimate(3.0, -4.0), 4.0);
        assert_eq!(Heuristic::Euclidean.estimate(3.0, -4.0), 5.0);
        assert_eq!(Heuristic::EuclideanNoSqr.estimate(3.0, -4.0), 25.0);
        assert_eq!(Heuristic::DiagonalShortCut.estimate(3.0, 4.0), 7.0);
        assert_eq!(Heuristic::Custom1.estimate(3.0, 4.0), 11.0);
    }

    #[test]
    fn punished_turns_prefer_straight_runs() {
        let opts = SearchOptions {
            punish_change_direction: true,
            ..options(false)
        };
        let path = find_path(10, 10, |_, _| false, (0, 0), (4, 4), &opts).unwrap();
        let turns = path
            .windows(3)
            .filter(|w| (w[1].0 - w[0].0, w[1].1 - w[0].1) != (w[2].0 - w[1].0, w[2].1 - w[1].1))
            .count();
        assert_eq!(turns, 1);
    }
}
