use serde::{Deserialize, Serialize};

use super::connection::ConnectionIndex;
use super::position::Position;

/// Index of a [`Location`] inside a [`super::Map`]'s location arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LocationIndex(pub usize);

/// A named point of interest on the map. `is_station` is derived: it is recomputed whenever an
/// incident connection is added, removed, or has its `is_train` flag flipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub label: String,
    pub pos: Position,
    pub description: String,
    pub(super) connections: Vec<ConnectionIndex>,
    is_station: bool,
}

impl Location {
    pub fn new(id: String, label: String, pos: Position, description: String) -> Self {
        Location {
            id,
            label,
            pos,
            description,
            connections: Vec::new(),
            is_station: false,
        }
    }

    pub fn connections(&self) -> &[ConnectionIndex] {
        &self.connections
    }

    pub fn is_station(&self) -> bool {
        self.is_station
    }

    /// Recompute `is_station` from the current incident-connection set.
    pub(super) fn recompute_is_station(&mut self, incident_is_train: impl Fn(ConnectionIndex) -> bool) {
        self.is_station = self.connections.iter().any(|&c| incident_is_train(c));
    }
}
