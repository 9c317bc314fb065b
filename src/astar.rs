//! Layer 4 - the A* search itself: priority-ordered exploration of the implicit grid graph, cost
//! shaped by the heuristic oracle, bounded by a wall-clock timeout.
//!
//! The open set's min-heap wrapper follows the `mdeck` diagram router's `PqEntry` idiom
//! (`routing/search.rs`): `BinaryHeap` is a max-heap, so the `Ord` impl reverses the comparison.
//! The cost function itself is a direct port of the original `AStar.get_path_to`.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::time::{Duration, Instant};

use crate::error::{Result, RouteError};
use crate::grid::{self, WorldBorder};
use crate::heuristic::{HeuristicCache, HeuristicOracle};
use crate::map::{ConnectionIndex, Map, Position};

/// Tunables from §9's open question: when the heuristic pull applies it overrides even the
/// train discount at that step.
#[derive(Debug, Clone, Copy)]
pub struct SearchTuning {
    pub heuristic_distance_threshold: i64,
    pub heuristic_pull_cost: i64,
}

impl Default for SearchTuning {
    fn default() -> Self {
        SearchTuning { heuristic_distance_threshold: 2000, heuristic_pull_cost: 10 }
    }
}

/// One step of a resolved path. `arriving_connection` is the connection used to leave `pos` for
/// the *next* node in the chain (`None` for a pure grid step) — a consequence of how the
/// predecessor map is walked during reconstruction, not of how `pos` itself was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AStarNode {
    pub pos: Position,
    pub arriving_connection: Option<ConnectionIndex>,
}

/// The outcome of a search that did not time out. `NotReachable` is a normal result, not an
/// error.
#[derive(Debug)]
pub enum SearchOutcome {
    Found { chain: Vec<AStarNode>, cost: HashMap<Position, i64> },
    NotReachable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapEntry {
    priority: i64,
    pos: Position,
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap, we want the lowest priority popped first.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Runs A* from `start` to `end`. Consults `map`/`border` for adjacency, `oracle`/`cache` for
/// cost shaping, and enforces `timeout_ms` by polling wall-clock time at the top of each pop.
pub fn search(
    map: &Map,
    border: &WorldBorder,
    oracle: &mut HeuristicOracle,
    cache: &HeuristicCache,
    tuning: SearchTuning,
    start: Position,
    end: Position,
    timeout_ms: Option<u64>,
) -> Result<SearchOutcome> {
    let deadline = timeout_ms.map(|ms| (Instant::now(), Duration::from_millis(ms)));

    let mut open = BinaryHeap::new();
    open.push(HeapEntry { priority: 0, pos: start });

    let mut cost: HashMap<Position, i64> = HashMap::new();
    cost.insert(start, 0);

    // prev[pos] = (predecessor, arriving_connection); the start is absent (sentinel).
    let mut prev: HashMap<Position, (Position, Option<ConnectionIndex>)> = HashMap::new();

    while let Some(HeapEntry { pos: current, .. }) = open.pop() {
        if let Some((begin, budget)) = deadline {
            if begin.elapsed() > budget {
                return Err(RouteError::Timeout);
            }
        }

        if current == end {
            return Ok(SearchOutcome::Found { chain: reconstruct(start, end, &prev)?, cost });
        }

        let current_cost = *cost
            .get(&current)
            .ok_or_else(|| RouteError::Fatal(format!("popped node {} missing from cost map", current)))?;

        for neighbour in grid::neighbours(map, border, current) {
            let d_grid = current.manhattan(neighbour.pos);
            let h_transit = oracle.estimate(map, cache, current);

            let w = edge_cost(map, tuning, d_grid, h_transit, neighbour.connection);

            let tentative = current_cost + w;
            let improves = cost.get(&neighbour.pos).map_or(true, |&existing| tentative < existing);
            if improves {
                cost.insert(neighbour.pos, tentative);
                prev.insert(neighbour.pos, (current, neighbour.connection));
                let priority = tentative + neighbour.pos.manhattan(end);
                open.push(HeapEntry { priority, pos: neighbour.pos });
            }
        }
    }

    if prev.contains_key(&end) || start == end {
        Ok(SearchOutcome::Found { chain: reconstruct(start, end, &prev)?, cost })
    } else {
        Ok(SearchOutcome::NotReachable)
    }
}

/// Edge-cost rule from §4.4: the heuristic pull, when it applies, overrides even the train
/// discount. The `d_grid / 1000` integer division for train edges is intentional — do not
/// change to floating point.
fn edge_cost(
    map: &Map,
    tuning: SearchTuning,
    d_grid: i64,
    h_transit: Option<i64>,
    connection: Option<ConnectionIndex>,
) -> i64 {
    if h_transit.map_or(false, |h| h < tuning.heuristic_distance_threshold) {
        return tuning.heuristic_pull_cost;
    }
    match connection.and_then(|idx| map.connection(idx)) {
        Some(conn) if conn.is_train => d_grid / 1000 + conn.weight as i64,
        Some(conn) => d_grid + conn.weight as i64,
        None => d_grid,
    }
}

/// Walks `prev` from `end` back to `start`, emitting one `AStarNode` per predecessor link, then
/// reverses. Each emitted node carries the *predecessor's* position paired with the connection
/// that was used to leave it — so the chain starts at `start` and ends one hop short of `end`
/// (the final hop is recovered by the segmenter, which is handed `end` separately).
fn reconstruct(
    start: Position,
    end: Position,
    prev: &HashMap<Position, (Position, Option<ConnectionIndex>)>,
) -> Result<Vec<AStarNode>> {
    if start == end {
        return Ok(Vec::new());
    }
    let mut chain = Vec::new();
    let mut current = end;
    loop {
        let (predecessor, connection) = *prev
            .get(&current)
            .ok_or_else(|| RouteError::Fatal(format!("no predecessor recorded for {}", current)))?;
        chain.push(AStarNode { pos: predecessor, arriving_connection: connection });
        if predecessor == start {
            break;
        }
        current = predecessor;
    }
    chain.reverse();
    Ok(chain)
}
