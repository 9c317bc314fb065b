//! The core's two exposed operations (§4.6): `plan_route` and `build_cache`, wired together from
//! the layers in `map`, `grid`, `heuristic`, `astar` and `itinerary`. Everything above this module
//! (the network surface in `server`, the `ctl` binary) talks to the core only through
//! [`Planner`].

use log::{error, info, warn};

use crate::astar::{self, SearchOutcome, SearchTuning};
use crate::config::Config;
use crate::error::{Result, RouteError};
use crate::grid::WorldBorder;
use crate::heuristic::{HeuristicCache, HeuristicOracle, PrecomputeRect};
use crate::itinerary::{self, Itinerary};
use crate::map::{Map, Position};

/// Bundles everything one search needs: the map, the world border it's bounded by, the heuristic
/// oracle and its cache, and the tunables from §9. Owned by the long-lived process (the `server`
/// binary wraps one in a mutex; `ctl` builds one per invocation) rather than reconstructed per
/// request, so the cache and RNG state persist across searches.
pub struct Planner {
    pub map: Map,
    pub border: WorldBorder,
    pub oracle: HeuristicOracle,
    pub cache: HeuristicCache,
    pub tuning: SearchTuning,
}

impl Planner {
    pub fn new(map: Map, config: &Config, cache: HeuristicCache) -> Self {
        Planner {
            map,
            border: config.world_border_dimensions,
            oracle: HeuristicOracle::new(),
            cache,
            tuning: SearchTuning {
                heuristic_distance_threshold: config.heuristic_distance_threshold,
                heuristic_pull_cost: config.heuristic_pull_cost,
            },
        }
    }

    /// Runs A* from `from` to `to` and segments the result. `NotReachable` is a successful
    /// [`Itinerary::NotReachable`], not an `Err`; only `Timeout`/`Fatal`/`InvalidRequest` surface
    /// as errors.
    pub fn plan_route(&mut self, from: Position, to: Position, timeout_ms: Option<u64>) -> Result<Itinerary> {
        if !self.border.contains(from) || !self.border.contains(to) {
            return Err(RouteError::InvalidRequest(format!(
                "{} or {} lies outside the configured world border",
                from, to
            )));
        }

        info!("planning route from {} to {} (timeout={:?}ms)", from, to, timeout_ms);
        let outcome = astar::search(
            &self.map,
            &self.border,
            &mut self.oracle,
            &self.cache,
            self.tuning,
            from,
            to,
            timeout_ms,
        );

        match outcome {
            Ok(SearchOutcome::Found { chain, .. }) => {
                let legs = itinerary::segment(&self.map, from, to, &chain);
                Ok(Itinerary::Legs(legs))
            }
            Ok(SearchOutcome::NotReachable) => {
                warn!("no route found from {} to {}", from, to);
                Ok(Itinerary::NotReachable)
            }
            Err(RouteError::Timeout) => {
                warn!("route search from {} to {} timed out", from, to);
                Err(RouteError::Timeout)
            }
            Err(RouteError::Fatal(msg)) => {
                error!("route search from {} to {} failed: {} fatal=true", from, to, msg);
                Err(RouteError::Fatal(msg))
            }
            Err(err) => {
                error!("route search from {} to {} failed: {}", from, to, err);
                Err(err)
            }
        }
    }

    /// Precomputes the heuristic cache over `rect` (§4.3) and replaces the in-memory cache with
    /// the result. Does not persist — call `cache_store::save` separately.
    pub fn build_cache(&mut self, rect: PrecomputeRect, thread_count: usize, progress: impl FnMut(usize, usize)) {
        info!("building heuristic cache over {:?} with {} threads", rect, thread_count);
        self.cache = crate::heuristic::build_cache(&self.map, rect, thread_count, progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Location;

    fn planner_with(map: Map) -> Planner {
        Planner::new(map, &Config::default(), HeuristicCache::new())
    }

    #[test]
    fn plan_route_on_empty_grid_is_one_walk_leg() {
        let mut planner = planner_with(Map::new());
        let itinerary = planner.plan_route(Position::new(0, 0), Position::new(3, 0), None).unwrap();
        match itinerary {
            Itinerary::Legs(legs) => {
                assert_eq!(legs.len(), 1);
                assert_eq!(legs[0].distance, 3);
            }
            Itinerary::NotReachable => panic!("expected a path"),
        }
    }

    #[test]
    fn plan_route_rejects_out_of_border_positions() {
        let mut config = Config::default();
        config.world_border_dimensions = WorldBorder { min_x: 0, max_x: 10, min_y: 0, max_y: 10 };
        let mut planner = Planner::new(Map::new(), &config, HeuristicCache::new());
        let result = planner.plan_route(Position::new(0, 0), Position::new(100, 100), None);
        assert!(matches!(result, Err(RouteError::InvalidRequest(_))));
    }

    #[test]
    fn plan_route_reports_not_reachable_without_erroring() {
        let mut config = Config::default();
        config.world_border_dimensions = WorldBorder { min_x: 0, max_x: 0, min_y: 0, max_y: 0 };
        let mut planner = Planner::new(Map::new(), &config, HeuristicCache::new());
        let itinerary = planner.plan_route(Position::new(0, 0), Position::new(0, 0), None).unwrap();
        // start == end always succeeds trivially with an empty leg list, even on a 1-cell world.
        assert!(matches!(itinerary, Itinerary::Legs(ref legs) if legs.is_empty()));
    }

    #[test]
    fn build_cache_fills_in_memory_cache_from_current_map() {
        let mut map = Map::new();
        let a = map.add_location(Location::new("a".into(), "A".into(), Position::new(0, 0), "".into())).unwrap();
        let b = map.add_location(Location::new("b".into(), "B".into(), Position::new(1, 0), "".into())).unwrap();
        map.add_connection(0, true, "L1".into(), "".into(), a, b).unwrap();

        let mut planner = planner_with(map);
        let rect = PrecomputeRect { min_x: 0, max_x: 2, min_y: 0, max_y: 0 };
        planner.build_cache(rect, 1, |_, _| {});
        assert_eq!(planner.cache.len(), 3);
    }
}
