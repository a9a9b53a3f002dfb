use std::ops::Add;

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn lerp(self, to: Vec2, t: f32) -> Vec2 {
        let t = t.clamp(0.0, 1.0);
        Vec2 {
            x: self.x + (to.x - self.x) * t,
            y: self.y + (to.y - self.y) * t,
        }
    }

    pub fn distance(self, other: Vec2) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Integer grid coordinate. `y` grows upward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(self, offset: CellOffset) -> Cell {
        Cell {
            x: self.x.saturating_add(offset.dx),
            y: self.y.saturating_add(offset.dy),
        }
    }

    pub fn step(self, direction: Direction) -> Cell {
        self.offset(direction.offset())
    }
}

impl Add<CellOffset> for Cell {
    type Output = Cell;

    fn add(self, rhs: CellOffset) -> Cell {
        self.offset(rhs)
    }
}

/// Raw step vector before it is validated as a cardinal direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct CellOffset {
    pub dx: i32,
    pub dy: i32,
}

impl CellOffset {
    pub const ZERO: CellOffset = CellOffset { dx: 0, dy: 0 };

    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }

    /// Clamps each axis to {-1, 0, 1}.
    pub fn clamped(self) -> CellOffset {
        CellOffset {
            dx: self.dx.signum(),
            dy: self.dy.signum(),
        }
    }

    pub fn is_zero(self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    pub const fn offset(self) -> CellOffset {
        match self {
            Direction::Up => CellOffset::new(0, 1),
            Direction::Down => CellOffset::new(0, -1),
            Direction::Left => CellOffset::new(-1, 0),
            Direction::Right => CellOffset::new(1, 0),
        }
    }

    /// Accepts only unit cardinal offsets. Diagonal, zero and longer vectors are rejected.
    pub fn from_offset(offset: CellOffset) -> Option<Direction> {
        match (offset.dx, offset.dy) {
            (0, 1) => Some(Direction::Up),
            (0, -1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }

    /// Reduces an analog input vector to its dominant axis. Ties resolve to the vertical axis.
    pub fn from_input_vector(input: Vec2) -> Option<Direction> {
        if !input.x.is_finite() || !input.y.is_finite() {
            return None;
        }
        if input.x == 0.0 && input.y == 0.0 {
            return None;
        }
        if input.x.abs() > input.y.abs() {
            if input.x > 0.0 {
                Some(Direction::Right)
            } else {
                Some(Direction::Left)
            }
        } else if input.y > 0.0 {
            Some(Direction::Up)
        } else {
            Some(Direction::Down)
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_offset_rejects_diagonal_and_zero() {
        assert_eq!(Direction::from_offset(CellOffset::new(1, 1)), None);
        assert_eq!(Direction::from_offset(CellOffset::new(-1, 1)), None);
        assert_eq!(Direction::from_offset(CellOffset::ZERO), None);
        assert_eq!(Direction::from_offset(CellOffset::new(2, 0)), None);
        assert_eq!(
            Direction::from_offset(CellOffset::new(0, -1)),
            Some(Direction::Down)
        );
    }

    #[test]
    fn input_vector_uses_dominant_axis() {
        assert_eq!(
            Direction::from_input_vector(Vec2::new(0.8, -0.3)),
            Some(Direction::Right)
        );
        assert_eq!(
            Direction::from_input_vector(Vec2::new(-0.2, -0.9)),
            Some(Direction::Down)
        );
        assert_eq!(
            Direction::from_input_vector(Vec2::new(1.0, 1.0)),
            Some(Direction::Up)
        );
        assert_eq!(Direction::from_input_vector(Vec2::ZERO), None);
    }

    #[test]
    fn clamped_offset_limits_each_axis() {
        assert_eq!(CellOffset::new(5, -3).clamped(), CellOffset::new(1, -1));
        assert_eq!(CellOffset::new(0, 2).clamped(), CellOffset::new(0, 1));
    }

    #[test]
    fn lerp_clamps_parameter() {
        let from = Vec2::new(0.0, 0.0);
        let to = Vec2::new(2.0, 0.0);
        assert!((from.lerp(to, 0.5).x - 1.0).abs() < 0.0001);
        assert!((from.lerp(to, 3.0).x - 2.0).abs() < 0.0001);
    }
}
