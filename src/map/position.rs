use serde::{Deserialize, Serialize};
use std::fmt;

/// An integer grid coordinate. Used as both graph node identity and map key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

impl Position {
    pub const fn new(x: i64, y: i64) -> Self {
        Position { x, y }
    }

    /// Manhattan distance between two positions.
    pub fn manhattan(self, other: Position) -> i64 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    pub fn north(self) -> Position {
        Position::new(self.x, self.y - 1)
    }

    pub fn south(self) -> Position {
        Position::new(self.x, self.y + 1)
    }

    pub fn east(self) -> Position {
        Position::new(self.x + 1, self.y)
    }

    pub fn west(self) -> Position {
        Position::new(self.x - 1, self.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
