//! Grid geometry: positions, directions, distances and lines
//!
//! Coordinates are `(y, x)` with `y` growing downwards. Angles are whole
//! degrees in `0..360`, measured counter-clockwise from east as seen on
//! screen, so 90 points north (towards smaller `y`).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

/// A cell on the dungeon grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Pos {
    pub y: i32,
    pub x: i32,
}

impl Pos {
    /// Position from row `y` and column `x`
    pub const fn new(y: i32, x: i32) -> Self {
        Self { y, x }
    }

    /// Shift by `(dx, dy)`
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            y: self.y + dy,
            x: self.x + dx,
        }
    }

    /// Adjacent cell in the given direction
    pub const fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        self.offset(dx, dy)
    }

    /// The eight adjacent cells, in [`Direction`] order
    pub fn neighbors(self) -> impl Iterator<Item = Pos> {
        Direction::iter().map(move |dir| self.step(dir))
    }

    /// Dungeon distance: the long leg plus half the short leg
    pub fn distance(self, other: Pos) -> i32 {
        let dy = (self.y - other.y).abs();
        let dx = (self.x - other.x).abs();
        if dy > dx { dy + dx / 2 } else { dx + dy / 2 }
    }

    /// King-move distance
    pub fn chebyshev(self, other: Pos) -> i32 {
        (self.y - other.y).abs().max((self.x - other.x).abs())
    }

    /// Bearing from this cell to `other` in degrees
    pub fn angle_to(self, other: Pos) -> u16 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(self.y - other.y);
        if dx == 0.0 && dy == 0.0 {
            return 0;
        }
        normalize_angle(dy.atan2(dx).to_degrees().round() as i32)
    }
}

/// Planar movement directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum Direction {
    North,
    South,
    East,
    West,
    NorthEast,
    NorthWest,
    SouthEast,
    SouthWest,
}

impl Direction {
    /// Get the delta (dx, dy) for this direction
    pub const fn delta(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::NorthWest => (-1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
        }
    }

    /// Direction matching the sign of the given deltas, `None` for (0, 0)
    pub fn from_delta(dx: i32, dy: i32) -> Option<Direction> {
        match (dx.signum(), dy.signum()) {
            (0, -1) => Some(Direction::North),
            (0, 1) => Some(Direction::South),
            (1, 0) => Some(Direction::East),
            (-1, 0) => Some(Direction::West),
            (1, -1) => Some(Direction::NorthEast),
            (-1, -1) => Some(Direction::NorthWest),
            (1, 1) => Some(Direction::SouthEast),
            (-1, 1) => Some(Direction::SouthWest),
            _ => None,
        }
    }

    /// Single step that closes the distance from `from` to `to`
    pub fn toward(from: Pos, to: Pos) -> Option<Direction> {
        Self::from_delta(to.x - from.x, to.y - from.y)
    }

    /// Orthogonal step along the major axis from `from` to `to`
    pub fn major_axis(from: Pos, to: Pos) -> Option<Direction> {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        if dx == 0 && dy == 0 {
            None
        } else if dx.abs() >= dy.abs() {
            Self::from_delta(dx, 0)
        } else {
            Self::from_delta(0, dy)
        }
    }
}

/// Wrap any angle into `0..360`
pub fn normalize_angle(degrees: i32) -> u16 {
    degrees.rem_euclid(360) as u16
}

/// Smallest separation between two bearings, `0..=180`
pub fn angle_between(a: u16, b: u16) -> u16 {
    let diff = (i32::from(a) - i32::from(b)).rem_euclid(360);
    diff.min(360 - diff) as u16
}

/// Cell `dist` away from `origin` along the bearing `angle`
pub fn point_at(origin: Pos, angle: u16, dist: i32) -> Pos {
    let rad = f64::from(angle).to_radians();
    let dx = (rad.cos() * f64::from(dist)).round() as i32;
    let dy = (rad.sin() * f64::from(dist)).round() as i32;
    Pos::new(origin.y - dy, origin.x + dx)
}

/// Bresenham line from `from` through `to`, `range` cells long.
///
/// The origin is not included; the line keeps going past `to` with the
/// same slope until `range` cells have been produced. Empty when the two
/// ends coincide.
pub fn line_path(from: Pos, to: Pos, range: usize) -> Vec<Pos> {
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    if dx == 0 && dy == 0 {
        return Vec::new();
    }
    let sx = if to.x >= from.x { 1 } else { -1 };
    let sy = if to.y >= from.y { 1 } else { -1 };

    let mut err = dx + dy;
    let (mut x, mut y) = (from.x, from.y);
    let mut path = Vec::with_capacity(range);
    while path.len() < range {
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
        path.push(Pos::new(y, x));
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_long_plus_half_short() {
        let a = Pos::new(0, 0);
        assert_eq!(a.distance(Pos::new(0, 5)), 5);
        assert_eq!(a.distance(Pos::new(4, 4)), 6);
        assert_eq!(a.distance(Pos::new(3, 1)), 3);
        assert_eq!(a.chebyshev(Pos::new(4, -7)), 7);
    }

    #[test]
    fn test_angle_to_cardinals() {
        let o = Pos::new(10, 10);
        assert_eq!(o.angle_to(Pos::new(10, 15)), 0);
        assert_eq!(o.angle_to(Pos::new(5, 10)), 90);
        assert_eq!(o.angle_to(Pos::new(10, 5)), 180);
        assert_eq!(o.angle_to(Pos::new(15, 10)), 270);
        assert_eq!(o.angle_to(Pos::new(5, 15)), 45);
    }

    #[test]
    fn test_point_at_roundtrip() {
        let o = Pos::new(10, 10);
        assert_eq!(point_at(o, 0, 3), Pos::new(10, 13));
        assert_eq!(point_at(o, 90, 3), Pos::new(7, 10));
        assert_eq!(point_at(o, 180, 2), Pos::new(10, 8));
        assert_eq!(point_at(o, 270, 4), Pos::new(14, 10));
    }

    #[test]
    fn test_angle_between_wraps() {
        assert_eq!(angle_between(350, 10), 20);
        assert_eq!(angle_between(10, 350), 20);
        assert_eq!(angle_between(0, 180), 180);
        assert_eq!(normalize_angle(-45), 315);
    }

    #[test]
    fn test_line_path_straight_and_extended() {
        let path = line_path(Pos::new(0, 0), Pos::new(0, 3), 5);
        assert_eq!(
            path,
            vec![
                Pos::new(0, 1),
                Pos::new(0, 2),
                Pos::new(0, 3),
                Pos::new(0, 4),
                Pos::new(0, 5)
            ]
        );
        let diag = line_path(Pos::new(5, 5), Pos::new(3, 3), 3);
        assert_eq!(diag, vec![Pos::new(4, 4), Pos::new(3, 3), Pos::new(2, 2)]);
        assert!(line_path(Pos::new(1, 1), Pos::new(1, 1), 4).is_empty());
    }

    #[test]
    fn test_direction_toward_and_axis() {
        let from = Pos::new(5, 5);
        assert_eq!(Direction::toward(from, Pos::new(2, 9)), Some(Direction::NorthEast));
        assert_eq!(Direction::toward(from, from), None);
        assert_eq!(Direction::major_axis(from, Pos::new(6, 12)), Some(Direction::East));
        assert_eq!(Direction::major_axis(from, Pos::new(0, 7)), Some(Direction::North));
        assert_eq!(from.neighbors().count(), 8);
    }
}
