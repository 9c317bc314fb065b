//! Layer 2 - the grid expander: produces the neighbours of any grid position by combining the
//! four cardinal grid steps with whatever Connections are incident to a Location anchored at that
//! position.
//!
//! Grounded on the original `StorageProvider.get_pos_neighbours` (which additionally emitted
//! diagonals); this spec drops diagonals, so only N/S/E/W grid steps are produced.

use serde::{Deserialize, Serialize};

use crate::map::{ConnectionIndex, Map, Position};

/// World bounds used to filter out-of-world grid steps. Inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldBorder {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl WorldBorder {
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.min_x && pos.x <= self.max_x && pos.y >= self.min_y && pos.y <= self.max_y
    }
}

impl Default for WorldBorder {
    fn default() -> Self {
        WorldBorder {
            min_x: -10_000_000,
            max_x: 10_000_000,
            min_y: -10_000_000,
            max_y: 10_000_000,
        }
    }
}

/// One possible next step from a grid position: either a pure cardinal grid move
/// (`connection = None`) or a hop across a Connection anchored at the current position.
#[derive(Debug, Clone, Copy)]
pub struct Neighbour {
    pub pos: Position,
    pub connection: Option<ConnectionIndex>,
}

/// Produces the neighbours of `pos`: the four cardinal grid cells within `border`, plus one
/// Neighbour per Connection incident to the Location (if any) anchored at `pos`. Not
/// deduplicated: a train edge landing on a grid-adjacent cell yields both variants.
pub fn neighbours(map: &Map, border: &WorldBorder, pos: Position) -> Vec<Neighbour> {
    let mut result = Vec::new();

    for candidate in [pos.north(), pos.south(), pos.east(), pos.west()] {
        if border.contains(candidate) {
            result.push(Neighbour { pos: candidate, connection: None });
        }
    }

    if let Some((loc_idx, loc)) = map.location_at(pos) {
        for &conn_idx in loc.connections() {
            let conn = map.connection(conn_idx).expect("dangling connection index");
            if let Some(other) = conn.other_side(loc_idx) {
                let other_pos = map.location(other).expect("dangling endpoint index").pos;
                result.push(Neighbour { pos: other_pos, connection: Some(conn_idx) });
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::Location;

    #[test]
    fn pure_grid_cell_has_four_cardinal_neighbours() {
        let map = Map::new();
        let border = WorldBorder::default();
        let ns = neighbours(&map, &border, Position::new(0, 0));
        assert_eq!(ns.len(), 4);
        assert!(ns.iter().all(|n| n.connection.is_none()));
    }

    #[test]
    fn out_of_world_cells_are_filtered() {
        let map = Map::new();
        let border = WorldBorder { min_x: 0, max_x: 10, min_y: 0, max_y: 10 };
        let ns = neighbours(&map, &border, Position::new(0, 0));
        // west and north fall outside the border
        assert_eq!(ns.len(), 2);
    }

    #[test]
    fn connection_neighbour_added_alongside_grid_steps() {
        let mut map = Map::new();
        let a = map.add_location(Location::new("a".into(), "A".into(), Position::new(0, 0), "".into())).unwrap();
        let b = map.add_location(Location::new("b".into(), "B".into(), Position::new(50, 50), "".into())).unwrap();
        map.add_connection(3, true, "L1".into(), "".into(), a, b).unwrap();

        let border = WorldBorder::default();
        let ns = neighbours(&map, &border, Position::new(0, 0));
        // 4 cardinal + 1 connection hop, not deduplicated against each other
        assert_eq!(ns.len(), 5);
        assert!(ns.iter().any(|n| n.pos == Position::new(50, 50) && n.connection.is_some()));
    }
}
