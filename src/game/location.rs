//! Directions and map locations.

use super::ordinal_enum;

/// One of the eight compass directions, or no movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// (0, 1)
    North,
    /// (1, 1)
    Northeast,
    /// (1, 0)
    East,
    /// (1, -1)
    Southeast,
    /// (0, -1)
    South,
    /// (-1, -1)
    Southwest,
    /// (-1, 0)
    West,
    /// (-1, 1)
    Northwest,
    /// (0, 0)
    Center,
}

ordinal_enum!(Direction {
    North => "NORTH",
    Northeast => "NORTHEAST",
    East => "EAST",
    Southeast => "SOUTHEAST",
    South => "SOUTH",
    Southwest => "SOUTHWEST",
    West => "WEST",
    Northwest => "NORTHWEST",
    Center => "CENTER",
});

impl Direction {
    /// The four axis-aligned directions.
    pub const CARDINAL: [Self; 4] = [Self::North, Self::East, Self::South, Self::West];

    /// Horizontal component.
    #[must_use]
    pub const fn dx(self) -> i32 {
        match self {
            Self::Northeast | Self::East | Self::Southeast => 1,
            Self::Southwest | Self::West | Self::Northwest => -1,
            Self::North | Self::South | Self::Center => 0,
        }
    }

    /// Vertical component.
    #[must_use]
    pub const fn dy(self) -> i32 {
        match self {
            Self::North | Self::Northeast | Self::Northwest => 1,
            Self::Southeast | Self::South | Self::Southwest => -1,
            Self::East | Self::West | Self::Center => 0,
        }
    }

    /// Rotate by `steps` eighths of a turn clockwise. `Center` is fixed.
    fn rotate(self, steps: usize) -> Self {
        if self == Self::Center {
            return self;
        }
        Self::ALL[(self.ordinal() + steps) % 8]
    }

    /// The direction pointing the other way.
    #[must_use]
    pub fn opposite(self) -> Self {
        self.rotate(4)
    }

    /// One eighth of a turn counter-clockwise.
    #[must_use]
    pub fn rotate_left(self) -> Self {
        self.rotate(7)
    }

    /// One eighth of a turn clockwise.
    #[must_use]
    pub fn rotate_right(self) -> Self {
        self.rotate(1)
    }
}

/// A 2-D integer map location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapLocation {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl MapLocation {
    /// Create a location.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring location in `dir`.
    #[must_use]
    pub const fn add(self, dir: Direction) -> Self {
        Self::new(self.x + dir.dx(), self.y + dir.dy())
    }

    /// The neighbouring location against `dir`.
    #[must_use]
    pub const fn subtract(self, dir: Direction) -> Self {
        Self::new(self.x - dir.dx(), self.y - dir.dy())
    }

    /// Offset by an arbitrary delta.
    #[must_use]
    pub const fn translate(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

impl std::fmt::Display for MapLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.x, self.y)
    }
}
