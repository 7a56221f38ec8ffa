//! Geometry primitives shared by the map, the collision detector and the
//! wire/state serializers.

use serde::{Deserialize, Serialize};

/// Round a coordinate to 6 decimal places for wire output and snapshots.
pub fn round6(v: f64) -> f64 {
    (v * 1_000_000.0).round() / 1_000_000.0
}

/// A point in continuous map space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared distance to another point.
    pub fn sq_distance_to(&self, other: Position) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }
}

/// Velocity in map units per second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Speed {
    pub vx: f64,
    pub vy: f64,
}

impl Speed {
    pub const ZERO: Speed = Speed { vx: 0.0, vy: 0.0 };

    pub fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    /// True when either component is non-zero.
    pub fn is_nonzero(&self) -> bool {
        self.vx != 0.0 || self.vy != 0.0
    }
}

/// Offset of an office sign relative to its anchor position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rectangle {
    pub position: Position,
    pub size: Size,
}

/// Result of a constrained movement step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveResult {
    pub position: Position,
    pub hit_boundary: bool,
}

/// Cardinal facing of a dog. North is negative y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    West,
    East,
}

impl Direction {
    /// Single-letter form used by the game-state endpoint and move actions.
    pub fn as_wire(&self) -> &'static str {
        match self {
            Direction::North => "U",
            Direction::South => "D",
            Direction::West => "L",
            Direction::East => "R",
        }
    }
}

impl Default for Direction {
    fn default() -> Self {
        Direction::North
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round6_snaps_to_micro_precision() {
        assert_eq!(round6(1.234_567_89), 1.234_568);
        assert_eq!(round6(-0.000_000_4), 0.0);
        assert_eq!(round6(2.5), 2.5);
    }

    #[test]
    fn speed_nonzero_checks_either_component() {
        assert!(Speed::new(0.0, -4.0).is_nonzero());
        assert!(Speed::new(3.0, 0.0).is_nonzero());
        assert!(!Speed::ZERO.is_nonzero());
    }

    #[test]
    fn direction_wire_letters() {
        assert_eq!(Direction::North.as_wire(), "U");
        assert_eq!(Direction::South.as_wire(), "D");
        assert_eq!(Direction::West.as_wire(), "L");
        assert_eq!(Direction::East.as_wire(), "R");
    }
}
