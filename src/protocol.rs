//! Wire vocabulary shared with the remote authority.
//!
//! Three kinds of document cross the link:
//! - [`Request`]: a capability call or a lifecycle reply, `{method, params}`
//! - tagged values (see [`ObjectType`] and [`crate::codec`])
//! - [`Event`]: a lifecycle event pushed by the authority, keyed by a string
//!   `type` field rather than an integer tag

use serde::{Deserialize, Serialize};

macro_rules! methods {
    ($($variant:ident = $id:literal => $name:literal),+ $(,)?) => {
        /// Remote method identifiers.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Method {
            $(
                #[doc = $name]
                $variant = $id
            ),+
        }

        impl Method {
            /// Every method in id order.
            pub const ALL: &'static [Method] = &[$(Method::$variant),+];

            /// Wire id.
            #[must_use]
            pub const fn id(self) -> u8 {
                self as u8
            }

            /// Method with the given wire id.
            #[must_use]
            pub fn from_id(id: u8) -> Option<Self> {
                Self::ALL.get(usize::from(id)).copied()
            }

            /// Upper-case name used in diagnostics.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $(Method::$variant => $name),+
                }
            }
        }
    };
}

methods! {
    Invalid = 0 => "INVALID",
    EndTurn = 1 => "END_TURN",
    MlDistanceSquaredTo = 2 => "ML_DISTANCE_SQUARED_TO",
    MlBottomLeftDistanceSquaredTo = 3 => "ML_BOTTOM_LEFT_DISTANCE_SQUARED_TO",
    MlIsWithinDistanceSquared = 4 => "ML_IS_WITHIN_DISTANCE_SQUARED",
    MlIsWithinDistanceSquaredLocIntDirDouble = 5 => "ML_IS_WITHIN_DISTANCE_SQUARED__LOC_INT_DIR_DOUBLE",
    MlIsWithinDistanceSquaredLocIntDirDoubleBoolean = 6 => "ML_IS_WITHIN_DISTANCE_SQUARED__LOC_INT_DIR_DOUBLE_BOOLEAN",
    MlIsAdjacentTo = 7 => "ML_IS_ADJACENT_TO",
    MlDirectionTo = 8 => "ML_DIRECTION_TO",
    UtGetAllTypeLocations = 9 => "UT_GET_ALL_TYPE_LOCATIONS",
    Log = 10 => "LOG",
    ThrowGameActionException = 11 => "THROW_GAME_ACTION_EXCEPTION",
    ThrowException = 12 => "THROW_EXCEPTION",
    RcGetRoundNum = 13 => "RC_GET_ROUND_NUM",
    RcGetMapWidth = 14 => "RC_GET_MAP_WIDTH",
    RcGetMapHeight = 15 => "RC_GET_MAP_HEIGHT",
    RcIsCooperation = 16 => "RC_IS_COOPERATION",
    RcGetId = 17 => "RC_GET_ID",
    RcGetTeam = 18 => "RC_GET_TEAM",
    RcGetLocation = 19 => "RC_GET_LOCATION",
    RcGetAllPartLocations = 20 => "RC_GET_ALL_PART_LOCATIONS",
    RcGetDirection = 21 => "RC_GET_DIRECTION",
    RcGetHealth = 22 => "RC_GET_HEALTH",
    RcGetRawCheese = 23 => "RC_GET_RAW_CHEESE",
    RcGetGlobalCheese = 24 => "RC_GET_GLOBAL_CHEESE",
    RcGetAllCheese = 25 => "RC_GET_ALL_CHEESE",
    RcGetDirt = 26 => "RC_GET_DIRT",
    RcGetType = 27 => "RC_GET_TYPE",
    RcGetCarrying = 28 => "RC_GET_CARRYING",
    RcIsBeingThrown = 29 => "RC_IS_BEING_THROWN",
    RcIsBeingCarried = 30 => "RC_IS_BEING_CARRIED",
    RcOnTheMap = 31 => "RC_ON_THE_MAP",
    RcCanSenseLocation = 32 => "RC_CAN_SENSE_LOCATION",
    RcIsLocationOccupied = 33 => "RC_IS_LOCATION_OCCUPIED",
    RcCanSenseRobotAtLocation = 34 => "RC_CAN_SENSE_ROBOT_AT_LOCATION",
    RcSenseRobotAtLocation = 35 => "RC_SENSE_ROBOT_AT_LOCATION",
    RcCanSenseRobot = 36 => "RC_CAN_SENSE_ROBOT",
    RcSenseRobot = 37 => "RC_SENSE_ROBOT",
    RcSenseNearbyRobots = 38 => "RC_SENSE_NEARBY_ROBOTS",
    RcSenseNearbyRobotsInt = 39 => "RC_SENSE_NEARBY_ROBOTS__INT",
    RcSenseNearbyRobotsIntTeam = 40 => "RC_SENSE_NEARBY_ROBOTS__INT_TEAM",
    RcSenseNearbyRobotsLocIntTeam = 41 => "RC_SENSE_NEARBY_ROBOTS__LOC_INT_TEAM",
    RcSensePassability = 42 => "RC_SENSE_PASSABILITY",
    RcSenseMapInfo = 43 => "RC_SENSE_MAP_INFO",
    RcSenseNearbyMapInfos = 44 => "RC_SENSE_NEARBY_MAP_INFOS",
    RcSenseNearbyMapInfosInt = 45 => "RC_SENSE_NEARBY_MAP_INFOS__INT",
    RcSenseNearbyMapInfosLoc = 46 => "RC_SENSE_NEARBY_MAP_INFOS__LOC",
    RcSenseNearbyMapInfosLocInt = 47 => "RC_SENSE_NEARBY_MAP_INFOS__LOC_INT",
    RcAdjacentLocation = 48 => "RC_ADJACENT_LOCATION",
    RcGetAllLocationsWithinRadiusSquared = 49 => "RC_GET_ALL_LOCATIONS_WITHIN_RADIUS_SQUARED",
    RcIsActionReady = 50 => "RC_IS_ACTION_READY",
    RcGetActionCooldownTurns = 51 => "RC_GET_ACTION_COOLDOWN_TURNS",
    RcIsMovementReady = 52 => "RC_IS_MOVEMENT_READY",
    RcIsTurningReady = 53 => "RC_IS_TURNING_READY",
    RcGetMovementCooldownTurns = 54 => "RC_GET_MOVEMENT_COOLDOWN_TURNS",
    RcGetTurningCooldownTurns = 55 => "RC_GET_TURNING_COOLDOWN_TURNS",
    RcCanMoveForward = 56 => "RC_CAN_MOVE_FORWARD",
    RcCanMove = 57 => "RC_CAN_MOVE",
    RcMoveForward = 58 => "RC_MOVE_FORWARD",
    RcMove = 59 => "RC_MOVE",
    RcCanTurn = 60 => "RC_CAN_TURN",
    RcTurn = 61 => "RC_TURN",
    RcGetCurrentRatCost = 62 => "RC_GET_CURRENT_RAT_COST",
    RcCanBuildRat = 63 => "RC_CAN_BUILD_RAT",
    RcBuildRat = 64 => "RC_BUILD_RAT",
    RcCanBecomeRatKing = 65 => "RC_CAN_BECOME_RAT_KING",
    RcBecomeRatKing = 66 => "RC_BECOME_RAT_KING",
    RcCanPlaceDirt = 67 => "RC_CAN_PLACE_DIRT",
    RcPlaceDirt = 68 => "RC_PLACE_DIRT",
    RcCanRemoveDirt = 69 => "RC_CAN_REMOVE_DIRT",
    RcRemoveDirt = 70 => "RC_REMOVE_DIRT",
    RcCanPlaceRatTrap = 71 => "RC_CAN_PLACE_RAT_TRAP",
    RcPlaceRatTrap = 72 => "RC_PLACE_RAT_TRAP",
    RcCanRemoveRatTrap = 73 => "RC_CAN_REMOVE_RAT_TRAP",
    RcRemoveRatTrap = 74 => "RC_REMOVE_RAT_TRAP",
    RcCanPlaceCatTrap = 75 => "RC_CAN_PLACE_CAT_TRAP",
    RcPlaceCatTrap = 76 => "RC_PLACE_CAT_TRAP",
    RcCanRemoveCatTrap = 77 => "RC_CAN_REMOVE_CAT_TRAP",
    RcRemoveCatTrap = 78 => "RC_REMOVE_CAT_TRAP",
    RcCanPickUpCheese = 79 => "RC_CAN_PICK_UP_CHEESE",
    RcPickUpCheese = 80 => "RC_PICK_UP_CHEESE",
    RcPickUpCheeseLocInt = 81 => "RC_PICK_UP_CHEESE__LOC_INT",
    RcCanAttack = 82 => "RC_CAN_ATTACK",
    RcCanAttackLocInt = 83 => "RC_CAN_ATTACK__LOC_INT",
    RcAttack = 84 => "RC_ATTACK",
    RcAttackLocInt = 85 => "RC_ATTACK__LOC_INT",
    RcSqueak = 86 => "RC_SQUEAK",
    RcReadSqueaks = 87 => "RC_READ_SQUEAKS",
    RcWriteSharedArray = 88 => "RC_WRITE_SHARED_ARRAY",
    RcReadSharedArray = 89 => "RC_READ_SHARED_ARRAY",
    RcCanTransferCheese = 90 => "RC_CAN_TRANSFER_CHEESE",
    RcTransferCheese = 91 => "RC_TRANSFER_CHEESE",
    RcThrowRat = 92 => "RC_THROW_RAT",
    RcCanThrowRat = 93 => "RC_CAN_THROW_RAT",
    RcDropRat = 94 => "RC_DROP_RAT",
    RcCanDropRat = 95 => "RC_CAN_DROP_RAT",
    RcCanCarryRat = 96 => "RC_CAN_CARRY_RAT",
    RcCarryRat = 97 => "RC_CARRY_RAT",
    RcDisintegrate = 98 => "RC_DISINTEGRATE",
    RcResign = 99 => "RC_RESIGN",
    RcSetIndicatorString = 100 => "RC_SET_INDICATOR_STRING",
    RcSetIndicatorDot = 101 => "RC_SET_INDICATOR_DOT",
    RcSetIndicatorLine = 102 => "RC_SET_INDICATOR_LINE",
    RcSetTimelineMarker = 103 => "RC_SET_TIMELINE_MARKER",
    RcCanTurnDir = 104 => "RC_CAN_TURN__DIR",
    RcGetBackstabbingTeam = 105 => "RC_GET_BACKSTABBING_TEAM",
    RcGetNumberRatTraps = 106 => "RC_GET_NUMBER_RAT_TRAPS",
    RcGetNumberCatTraps = 107 => "RC_GET_NUMBER_CAT_TRAPS",
}

/// Integer tags of tagged wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    /// Untagged payload.
    Other = 0,
    /// `{type, val}` with a direction ordinal.
    Direction = 1,
    /// `{type, x, y}`.
    MapLocation = 2,
    /// Sensed robot record.
    RobotInfo = 3,
    /// Sensed tile record.
    MapInfo = 4,
    /// Received squeak.
    Message = 5,
    /// `{type, val}` with a unit type ordinal.
    UnitType = 6,
    /// `{type, val}` with a trap type ordinal.
    TrapType = 7,
    /// `{type, val}` with a team ordinal.
    Team = 8,
    /// `{type, etype, msg}`: raise instead of returning.
    ThrownGameActionException = 9,
}

impl ObjectType {
    const ALL: [Self; 10] = [
        Self::Other,
        Self::Direction,
        Self::MapLocation,
        Self::RobotInfo,
        Self::MapInfo,
        Self::Message,
        Self::UnitType,
        Self::TrapType,
        Self::Team,
        Self::ThrownGameActionException,
    ];

    /// Wire tag.
    #[must_use]
    pub const fn tag(self) -> u64 {
        self as u64
    }

    /// Object type for a wire tag.
    #[must_use]
    pub fn from_tag(tag: u64) -> Option<Self> {
        usize::try_from(tag).ok().and_then(|i| Self::ALL.get(i)).copied()
    }
}

/// Outbound call or lifecycle reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Method id.
    pub method: u8,
    /// Encoded parameters.
    pub params: Vec<serde_json::Value>,
}

impl Request {
    /// Build a request.
    #[must_use]
    pub fn new(method: Method, params: Vec<serde_json::Value>) -> Self {
        Self {
            method: method.id(),
            params,
        }
    }
}

/// Lifecycle event pushed by the authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Create a program instance for a new entity.
    SpawnBot {
        /// Team ordinal.
        team: usize,
        /// Entity id.
        id: i64,
    },
    /// Tear down an instance.
    DestroyBot {
        /// Entity id.
        id: i64,
    },
    /// Run one turn of an instance.
    StartTurn {
        /// Current round.
        round: i64,
        /// Entity id.
        id: i64,
    },
    /// The game is over.
    EndGame,
}

/// Event type string of the destroy notification, which may also arrive
/// in place of a capability call response.
pub const DESTROY_BOT: &str = "destroy_bot";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_ids_are_dense() {
        assert_eq!(Method::ALL.len(), 108);
        for (i, method) in Method::ALL.iter().enumerate() {
            assert_eq!(usize::from(method.id()), i);
        }
        assert_eq!(Method::from_id(98), Some(Method::RcDisintegrate));
        assert_eq!(Method::from_id(108), None);
        assert_eq!(Method::RcCanTurnDir.name(), "RC_CAN_TURN__DIR");
    }

    #[test]
    fn test_request_serialization() {
        let request = Request::new(Method::EndTurn, vec![serde_json::json!(42)]);
        let text = serde_json::to_string(&request).unwrap();
        assert_eq!(text, r#"{"method":1,"params":[42]}"#);
    }

    #[test]
    fn test_event_parsing() {
        let spawn: Event = serde_json::from_str(r#"{"type":"spawn_bot","team":0,"id":7}"#).unwrap();
        assert_eq!(spawn, Event::SpawnBot { team: 0, id: 7 });
        let end: Event = serde_json::from_str(r#"{"type":"end_game"}"#).unwrap();
        assert_eq!(end, Event::EndGame);
        assert!(serde_json::from_str::<Event>(r#"{"type":"reboot"}"#).is_err());
    }

    #[test]
    fn test_object_tags() {
        assert_eq!(ObjectType::from_tag(9), Some(ObjectType::ThrownGameActionException));
        assert_eq!(ObjectType::from_tag(10), None);
        assert_eq!(ObjectType::Team.tag(), 8);
    }
}
