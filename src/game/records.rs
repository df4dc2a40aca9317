//! Sensing records returned by capability calls.

use super::{Direction, MapLocation, Team, TrapType, UnitType};

/// What a program can learn about a robot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RobotInfo {
    /// Entity id.
    pub id: i64,
    /// Owning team.
    pub team: Team,
    /// Unit type.
    pub unit_type: UnitType,
    /// Current health.
    pub health: i64,
    /// Current location.
    pub location: MapLocation,
    /// Facing.
    pub direction: Direction,
    /// Chirality flag as sent by the authority.
    pub chirality: i64,
    /// Cheese carried.
    pub cheese_amount: i64,
    /// Robot being carried, if any.
    pub carrying_robot: Option<Box<RobotInfo>>,
}

/// What a program can learn about a map tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapInfo {
    /// Tile location.
    pub location: MapLocation,
    /// Whether units can enter.
    pub is_passable: bool,
    /// Robot mid-throw above the tile, if any.
    pub flying_robot: Option<Box<RobotInfo>>,
    /// Wall tile.
    pub is_wall: bool,
    /// Dirt tile.
    pub is_dirt: bool,
    /// Cheese lying on the tile.
    pub cheese_amount: i64,
    /// Trap on the tile.
    pub trap: TrapType,
    /// Whether a cheese mine is present.
    pub has_cheese_mine: bool,
}

/// A squeak received from another robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    /// Payload.
    pub bytes: i64,
    /// Sender entity id.
    pub sender_id: i64,
    /// Round it was sent.
    pub round: i64,
    /// Where it was sent from.
    pub source_loc: MapLocation,
}

impl std::fmt::Display for Message {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Message with value {} sent from robot with ID {} during round {} from location {}.",
            self.bytes, self.sender_id, self.round, self.source_loc
        )
    }
}
