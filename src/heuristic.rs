//! Layer 3 - the heuristic oracle: a cheap, intentionally non-admissible estimate of how close a
//! grid cell is to transit, plus the cache that makes repeated queries free and the worker-pool
//! precompute that fills it ahead of time.
//!
//! Grounded on the original `StorageProvider.get_heuristic_distance_to_locations` (random sample,
//! minimum distance among stations sampled) for the online path, and on the `mdeck` diagram
//! router's `rayon`-based parallel fan-out (`routing/search.rs`'s
//! `Direction::ALL.par_iter().map(...)`) for the offline precompute worker pool.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::map::{Map, Position};

/// Namespace this cache is persisted under in the keyed store (§6).
pub const CACHE_NAMESPACE: &str = "heuristic";

/// Chunk size for cache-build work partitioning (§4.3).
pub const BUILD_CHUNK_SIZE: i64 = 1_000_000;

/// In-memory heuristic cache: `Position -> Option<distance>`. A missing entry means "not cached",
/// distinct from a cached `None` meaning "no station found".
#[derive(Debug, Default, Clone)]
pub struct HeuristicCache {
    values: HashMap<Position, Option<i64>>,
}

impl HeuristicCache {
    pub fn new() -> Self {
        HeuristicCache::default()
    }

    pub fn get(&self, pos: Position) -> Option<Option<i64>> {
        self.values.get(&pos).copied()
    }

    pub fn set(&mut self, pos: Position, value: Option<i64>) {
        self.values.insert(pos, value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Position, Option<i64>)> + '_ {
        self.values.iter().map(|(&pos, &v)| (pos, v))
    }
}

/// Estimates distance-to-transit for grid cells. Sampling is probabilistic and non-admissible: it
/// is a bias toward transit corridors, not a lower bound.
pub struct HeuristicOracle {
    rng: StdRng,
}

impl HeuristicOracle {
    /// A production oracle seeded from the OS entropy source.
    pub fn new() -> Self {
        HeuristicOracle { rng: StdRng::from_entropy() }
    }

    /// A deterministic oracle for tests: same seed, same sampled locations, same result.
    pub fn with_seed(seed: u64) -> Self {
        HeuristicOracle { rng: StdRng::seed_from_u64(seed) }
    }

    /// Estimated Manhattan distance from `pos` to the nearest station, consulting `cache` first.
    /// On a cache miss, samples `ceil(N/8)` locations without replacement and returns the minimum
    /// distance among the sampled ones that are stations (`None` if none sampled is a station).
    pub fn estimate(&mut self, map: &Map, cache: &HeuristicCache, pos: Position) -> Option<i64> {
        if let Some(cached) = cache.get(pos) {
            return cached;
        }
        self.sample_estimate(map, pos)
    }

    fn sample_estimate(&mut self, map: &Map, pos: Position) -> Option<i64> {
        let locations: Vec<_> = map.locations().collect();
        if locations.is_empty() {
            return None;
        }
        let sample_count = (locations.len() as f64 / 8.0).ceil() as usize;
        let sample_count = sample_count.min(locations.len()).max(1);

        let mut drawn = HashSet::new();
        while drawn.len() < sample_count {
            drawn.insert(self.rng.gen_range(0..locations.len()));
        }

        drawn
            .into_iter()
            .filter_map(|i| {
                let (_, loc) = locations[i];
                loc.is_station().then(|| pos.manhattan(loc.pos))
            })
            .min()
    }

    /// Exact distance-to-nearest-station over the *full* Location set, used by the precompute
    /// path (§4.3) rather than the sampled online path.
    pub fn exact_distance(map: &Map, pos: Position) -> Option<i64> {
        map.locations()
            .filter(|(_, loc)| loc.is_station())
            .map(|(_, loc)| pos.manhattan(loc.pos))
            .min()
    }
}

impl Default for HeuristicOracle {
    fn default() -> Self {
        HeuristicOracle::new()
    }
}

/// A bounded rectangle of grid cells to precompute the heuristic over.
#[derive(Debug, Clone, Copy)]
pub struct PrecomputeRect {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl PrecomputeRect {
    fn positions(&self) -> Vec<Position> {
        let mut out = Vec::new();
        for y in self.min_y..=self.max_y {
            for x in self.min_x..=self.max_x {
                out.push(Position::new(x, y));
            }
        }
        out
    }
}

/// Precomputes the heuristic cache over `rect` against the full Location set, dispatching work in
/// chunks of [`BUILD_CHUNK_SIZE`] positions to a `rayon` worker pool sized `thread_count` (clamped
/// to `1..=num_cpus`). `progress` is invoked after each chunk with `(completed, total)`; it must
/// not block substantially.
pub fn build_cache(
    map: &Map,
    rect: PrecomputeRect,
    thread_count: usize,
    mut progress: impl FnMut(usize, usize),
) -> HeuristicCache {
    let positions = rect.positions();
    let total = positions.len();
    let thread_count = thread_count.clamp(1, num_cpus());

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .expect("failed to build heuristic precompute thread pool");

    let mut cache = HeuristicCache::new();
    let mut completed = 0usize;
    for chunk in positions.chunks(BUILD_CHUNK_SIZE as usize) {
        let results: Vec<(Position, Option<i64>)> = pool.install(|| {
            chunk
                .par_iter()
                .map(|&pos| (pos, HeuristicOracle::exact_distance(map, pos)))
                .collect()
        });
        for (pos, value) in results {
            cache.set(pos, value);
        }
        // memory-reclamation hint between chunks (§4.3, §5)
        drop(chunk);
        completed += chunk.len().min(total - completed);
        progress(completed, total);
    }

    cache
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Location;

    fn map_with_one_station(pos: Position) -> Map {
        let mut map = Map::new();
        let a = map.add_location(Location::new("a".into(), "A".into(), pos, "".into())).unwrap();
        let b = map
            .add_location(Location::new("b".into(), "B".into(), Position::new(pos.x + 1, pos.y), "".into()))
            .unwrap();
        map.add_connection(0, true, "L1".into(), "".into(), a, b).unwrap();
        map
    }

    #[test]
    fn cached_value_short_circuits_sampling() {
        let map = map_with_one_station(Position::new(0, 0));
        let mut cache = HeuristicCache::new();
        cache.set(Position::new(100, 100), Some(42));
        let mut oracle = HeuristicOracle::with_seed(1);
        assert_eq!(oracle.estimate(&map, &cache, Position::new(100, 100)), Some(42));
    }

    #[test]
    fn missing_cache_entry_triggers_sampling_not_none() {
        let map = map_with_one_station(Position::new(0, 0));
        let cache = HeuristicCache::new();
        let mut oracle = HeuristicOracle::with_seed(7);
        // with a single station and forced full sampling (tiny map), we should find it
        let estimate = oracle.estimate(&map, &cache, Position::new(10, 0));
        assert!(estimate.is_some());
    }

    #[test]
    fn exact_distance_ignores_non_station_locations() {
        let mut map = Map::new();
        map.add_location(Location::new("a".into(), "A".into(), Position::new(5, 5), "".into())).unwrap();
        assert_eq!(HeuristicOracle::exact_distance(&map, Position::new(0, 0)), None);
    }

    #[test]
    fn build_cache_covers_whole_rect_and_matches_exact() {
        let map = map_with_one_station(Position::new(0, 0));
        let rect = PrecomputeRect { min_x: -1, max_x: 1, min_y: -1, max_y: 1 };
        let mut progress_calls = Vec::new();
        let cache = build_cache(&map, rect, 2, |done, total| progress_calls.push((done, total)));
        assert_eq!(cache.len(), 9);
        for y in -1..=1 {
            for x in -1..=1 {
                let pos = Position::new(x, y);
                assert_eq!(cache.get(pos).unwrap(), HeuristicOracle::exact_distance(&map, pos));
            }
        }
        assert_eq!(progress_calls.last(), Some(&(9, 9)));
    }

    #[test]
    fn build_cache_is_deterministic() {
        let map = map_with_one_station(Position::new(2, 2));
        let rect = PrecomputeRect { min_x: 0, max_x: 3, min_y: 0, max_y: 3 };
        let a = build_cache(&map, rect, 1, |_, _| {});
        let b = build_cache(&map, rect, 4, |_, _| {});
        for (pos, v) in a.iter() {
            assert_eq!(b.get(pos).unwrap(), v);
        }
    }
}
