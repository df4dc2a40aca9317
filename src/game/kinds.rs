//! Enumerations with a fixed wire ordering.

use super::ordinal_enum;

/// Team affiliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Team {
    /// Team A.
    A,
    /// Team B.
    B,
    /// Neither team (neutral units).
    Neutral,
}

ordinal_enum!(Team {
    A => "A",
    B => "B",
    Neutral => "NEUTRAL",
});

impl Team {
    /// The opposing team. Neutral has no opponent.
    #[must_use]
    pub const fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
            Self::Neutral => Self::Neutral,
        }
    }

    /// Short label used in diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::Neutral => "N",
        }
    }
}

/// Static statistics of a unit type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitStats {
    /// Starting health.
    pub health: i64,
    /// Footprint side length.
    pub size: i64,
    /// Vision radius, squared.
    pub vision_cone_radius_squared: i64,
    /// Vision cone angle in degrees.
    pub vision_cone_angle: i64,
    /// Action cooldown.
    pub action_cooldown: i64,
    /// Movement cooldown.
    pub movement_cooldown: i64,
    /// Per-turn bytecode budget.
    pub bytecode_limit: i64,
}

/// Kind of unit a program controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitType {
    /// Baby rat.
    BabyRat,
    /// Rat king.
    RatKing,
    /// Cat.
    Cat,
}

ordinal_enum!(UnitType {
    BabyRat => "BABY_RAT",
    RatKing => "RAT_KING",
    Cat => "CAT",
});

impl UnitType {
    /// Static statistics for this unit type.
    #[must_use]
    pub const fn stats(self) -> UnitStats {
        let (health, size, radius, angle, action, movement, bytecode) = match self {
            Self::BabyRat => (100, 1, 20, 90, 10, 10, 17_500),
            Self::RatKing => (500, 3, 25, 360, 10, 40, 20_000),
            Self::Cat => (10_000, 2, 17, 180, 15, 20, 17_500),
        };
        UnitStats {
            health,
            size,
            vision_cone_radius_squared: radius,
            vision_cone_angle: angle,
            action_cooldown: action,
            movement_cooldown: movement,
            bytecode_limit: bytecode,
        }
    }
}

/// Static statistics of a trap type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapStats {
    /// Cheese cost to build.
    pub build_cost: i64,
    /// Damage dealt on trigger.
    pub damage: i64,
    /// Turns the victim is stunned.
    pub stun_time: i64,
    /// Cooldown for placing.
    pub action_cooldown: i64,
    /// Maximum simultaneous traps per team.
    pub max_count: i64,
    /// Trigger radius, squared.
    pub trigger_radius_squared: i64,
}

/// Kind of trap on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrapType {
    /// Trap for rats.
    RatTrap,
    /// Trap for cats.
    CatTrap,
    /// No trap.
    None,
}

ordinal_enum!(TrapType {
    RatTrap => "RAT_TRAP",
    CatTrap => "CAT_TRAP",
    None => "NONE",
});

impl TrapType {
    /// Static statistics for this trap type.
    #[must_use]
    pub const fn stats(self) -> TrapStats {
        let (build_cost, damage, stun_time, action_cooldown, max_count, radius) = match self {
            Self::RatTrap => (30, 50, 20, 15, 25, 2),
            Self::CatTrap => (10, 100, 20, 10, 10, 2),
            Self::None => (0, 0, 0, 0, 0, 0),
        };
        TrapStats {
            build_cost,
            damage,
            stun_time,
            action_cooldown,
            max_count,
            trigger_radius_squared: radius,
        }
    }
}

/// Why the remote authority rejected a game action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameActionKind {
    /// Invariant violation inside the authority.
    InternalError,
    /// Not enough cheese or other resource.
    NotEnoughResource,
    /// Destination blocked or off the map.
    CantMoveThere,
    /// Cooldown has not expired.
    IsNotReady,
    /// Target outside the sensing area.
    CantSenseThat,
    /// Target too far away.
    OutOfRange,
    /// Action not allowed for this unit.
    CantDoThat,
    /// No robot at the target.
    NoRobotThere,
    /// Round reference outside the permitted window.
    RoundOutOfRange,
}

ordinal_enum!(GameActionKind {
    InternalError => "INTERNAL_ERROR",
    NotEnoughResource => "NOT_ENOUGH_RESOURCE",
    CantMoveThere => "CANT_MOVE_THERE",
    IsNotReady => "IS_NOT_READY",
    CantSenseThat => "CANT_SENSE_THAT",
    OutOfRange => "OUT_OF_RANGE",
    CantDoThat => "CANT_DO_THAT",
    NoRobotThere => "NO_ROBOT_THERE",
    RoundOutOfRange => "ROUND_OUT_OF_RANGE",
});
