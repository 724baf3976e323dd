//! Planar geometry in world units.
//!
//! Positions are `f64` world coordinates. Determinism comes from the fixed
//! tick order and ordered iteration, not from the number format.

use serde::{Deserialize, Serialize};

/// 2D vector / position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Vec2 {
    /// Origin.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Squared distance, for comparisons.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Linear interpolation; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Straight-segment journey with a known route length.
///
/// The route length may be longer than the straight segment (a path found
/// around obstacles); the reported position is interpolated along the segment
/// in proportion to the distance covered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Travel {
    /// Departure point.
    pub from: Vec2,
    /// Destination.
    pub to: Vec2,
    /// Route length in world units.
    pub length: f64,
    /// Distance covered so far.
    pub covered: f64,
}

impl Travel {
    /// Straight-line journey.
    #[must_use]
    pub fn straight(from: Vec2, to: Vec2) -> Self {
        Self::with_length(from, to, from.distance(to))
    }

    /// Journey over a route of the given length.
    #[must_use]
    pub fn with_length(from: Vec2, to: Vec2, length: f64) -> Self {
        Self {
            from,
            to,
            length: length.max(0.0),
            covered: 0.0,
        }
    }

    /// Advance by `speed * dt`. Returns `true` once the destination is reached.
    ///
    /// Arrival is exact: the covered distance never overshoots the length.
    pub fn advance(&mut self, speed: f64, dt: f64) -> bool {
        self.covered = (self.covered + speed * dt).min(self.length);
        self.is_arrived()
    }

    /// Whether the destination has been reached.
    #[must_use]
    pub fn is_arrived(&self) -> bool {
        self.covered >= self.length
    }

    /// Current interpolated position.
    #[must_use]
    pub fn position(&self) -> Vec2 {
        if self.is_arrived() || self.length <= 0.0 {
            return self.to;
        }
        self.from.lerp(self.to, self.covered / self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(3.0, 4.0);
        assert_eq!(a.distance(b), 5.0);
        assert_eq!(a.distance_squared(b), 25.0);
    }

    #[test]
    fn test_travel_exact_arrival() {
        let mut travel = Travel::straight(Vec2::ZERO, Vec2::new(100.0, 0.0));
        assert!(!travel.advance(40.0, 1.0));
        assert_eq!(travel.position(), Vec2::new(40.0, 0.0));
        assert!(!travel.advance(40.0, 1.0));
        assert!(travel.advance(40.0, 1.0));
        assert_eq!(travel.position(), Vec2::new(100.0, 0.0));
        assert_eq!(travel.covered, 100.0);
    }

    #[test]
    fn test_travel_zero_length_arrives_immediately() {
        let p = Vec2::new(5.0, 5.0);
        let mut travel = Travel::straight(p, p);
        assert!(travel.advance(10.0, 1.0));
        assert_eq!(travel.position(), p);
    }

    #[test]
    fn test_travel_longer_route_takes_longer() {
        let mut travel = Travel::with_length(Vec2::ZERO, Vec2::new(100.0, 0.0), 200.0);
        assert!(!travel.advance(100.0, 1.0));
        assert_eq!(travel.position(), Vec2::new(50.0, 0.0));
        assert!(travel.advance(100.0, 1.0));
    }
}
