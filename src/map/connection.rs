use serde::{Deserialize, Serialize};

use super::location::LocationIndex;

/// Index of a [`Connection`] inside a [`super::Map`]'s connection arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionIndex(pub usize);

/// An edge joining exactly two [`super::Location`]s. Logically one bidirectional edge: both
/// endpoints carry a reference to it, and it carries references to both endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub weight: u32,
    pub is_train: bool,
    pub label: String,
    pub description: String,
    pub(super) endpoints: [LocationIndex; 2],
}

impl Connection {
    pub fn new(weight: u32, is_train: bool, label: String, description: String, a: LocationIndex, b: LocationIndex) -> Self {
        Connection {
            weight,
            is_train,
            label,
            description,
            endpoints: [a, b],
        }
    }

    pub fn endpoints(&self) -> [LocationIndex; 2] {
        self.endpoints
    }

    /// The endpoint that is not `from`. Returns `None` if `from` is not one of this connection's
    /// endpoints; never returns `from` itself.
    pub fn other_side(&self, from: LocationIndex) -> Option<LocationIndex> {
        if self.endpoints[0] == from {
            Some(self.endpoints[1])
        } else if self.endpoints[1] == from {
            Some(self.endpoints[0])
        } else {
            None
        }
    }
}
