//! Declarative capability tables.

use crate::error::ProgramError;
use crate::protocol::Method;
use crate::vm::{Args, Value};

/// Constant default for a parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Literal {
    /// Integer default.
    Int(i64),
    /// Float default.
    Float(f64),
    /// Boolean default.
    Bool(bool),
}

impl Literal {
    fn value(self) -> Value {
        match self {
            Self::Int(i) => Value::Int(i),
            Self::Float(f) => Value::Float(f),
            Self::Bool(b) => Value::Bool(b),
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Param {
    /// Must be supplied.
    Required(&'static str),
    /// Filled with a constant when omitted.
    Default(&'static str, Literal),
    /// May be omitted; which optionals are present selects the overload.
    Optional(&'static str),
}

impl Param {
    const fn name(self) -> &'static str {
        match self {
            Self::Required(name) | Self::Default(name, _) | Self::Optional(name) => name,
        }
    }
}

/// A callable capability.
#[derive(Debug, Clone, PartialEq)]
pub struct Capability {
    /// Name visible to programs.
    pub name: &'static str,
    params: Vec<Param>,
    overloads: Vec<(Method, Vec<&'static str>)>,
    /// Budget charged before the call runs.
    pub cost: i64,
}

impl Capability {
    /// Bind arguments and pick the method id.
    ///
    /// Returns the method and the parameters in the order it expects them.
    ///
    /// # Errors
    ///
    /// `TypeError` for arguments that do not bind, `ValueError` when the
    /// supplied parameters match no overload.
    pub fn resolve(&self, args: Args) -> Result<(Method, Vec<Value>), ProgramError> {
        let names: Vec<&str> = self.params.iter().map(|p| p.name()).collect();
        let required = self
            .params
            .iter()
            .filter(|p| matches!(p, Param::Required(_)))
            .count();
        let mut slots = args.bind(self.name, &names, required)?;
        for (slot, param) in slots.iter_mut().zip(&self.params) {
            if let (None, Param::Default(_, literal)) = (&slot, param) {
                *slot = Some(literal.value());
            }
        }

        let supplied: Vec<&str> = names
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_some())
            .map(|(name, _)| *name)
            .collect();
        let (method, order) = self
            .overloads
            .iter()
            .find(|(_, wanted)| {
                wanted.len() == supplied.len() && wanted.iter().all(|w| supplied.contains(w))
            })
            .ok_or_else(|| {
                ProgramError::value_error(format!(
                    "Invalid combination of parameters for {}. See docstring for valid combinations.",
                    self.name
                ))
            })?;

        let values = order
            .iter()
            .map(|wanted| {
                names
                    .iter()
                    .position(|name| name == wanted)
                    .and_then(|i| slots[i].take())
                    .unwrap_or_default()
            })
            .collect();
        Ok((*method, values))
    }
}

/// One entry of an overload list.
#[must_use]
pub const fn overload(
    method: Method,
    supplied: &'static [&'static str],
) -> (Method, &'static [&'static str]) {
    (method, supplied)
}

/// Builds a capability table.
#[derive(Debug, Default)]
pub struct TableBuilder {
    capabilities: Vec<Capability>,
}

impl TableBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Capability whose parameters are all required.
    #[must_use]
    pub fn call(self, name: &'static str, method: Method, params: &[&'static str]) -> Self {
        let declared: Vec<Param> = params.iter().copied().map(Param::Required).collect();
        self.overloaded(name, &declared, &[(method, params)])
    }

    /// Capability with defaults or optional parameters.
    #[must_use]
    pub fn overloaded(
        mut self,
        name: &'static str,
        params: &[Param],
        overloads: &[(Method, &[&'static str])],
    ) -> Self {
        self.capabilities.push(Capability {
            name,
            params: params.to_vec(),
            overloads: overloads
                .iter()
                .map(|(method, supplied)| (*method, supplied.to_vec()))
                .collect(),
            cost: 0,
        });
        self
    }

    /// Set the cost of an already declared capability.
    #[must_use]
    pub fn cost(mut self, name: &str, cost: i64) -> Self {
        if let Some(capability) = self.capabilities.iter_mut().find(|c| c.name == name) {
            capability.cost = cost;
        }
        self
    }

    /// The finished table.
    #[must_use]
    pub fn build(self) -> Vec<Capability> {
        self.capabilities
    }
}

/// Methods of the robot controller, exposed to programs as `rc`.
#[must_use]
#[allow(clippy::too_many_lines)]
pub fn controller() -> Vec<Capability> {
    use Method as M;
    use Param::{Default, Optional, Required};

    let loc: &'static [&'static str] = &["loc"];
    let dir: &'static [&'static str] = &["dir"];
    TableBuilder::new()
        // State
        .call("get_round_num", M::RcGetRoundNum, &[])
        .call("get_map_width", M::RcGetMapWidth, &[])
        .call("get_map_height", M::RcGetMapHeight, &[])
        .call("is_cooperation", M::RcIsCooperation, &[])
        .call("get_id", M::RcGetId, &[])
        .call("get_team", M::RcGetTeam, &[])
        .call("get_location", M::RcGetLocation, &[])
        .call("get_all_part_locations", M::RcGetAllPartLocations, &[])
        .call("get_direction", M::RcGetDirection, &[])
        .call("get_health", M::RcGetHealth, &[])
        .call("get_raw_cheese", M::RcGetRawCheese, &[])
        .call("get_global_cheese", M::RcGetGlobalCheese, &[])
        .call("get_all_cheese", M::RcGetAllCheese, &[])
        .call("get_dirt", M::RcGetDirt, &[])
        .call("get_type", M::RcGetType, &[])
        .call("get_carrying", M::RcGetCarrying, &[])
        .call("is_being_thrown", M::RcIsBeingThrown, &[])
        .call("is_being_carried", M::RcIsBeingCarried, &[])
        .call("get_backstabbing_team", M::RcGetBackstabbingTeam, &[])
        .call("get_number_rat_traps", M::RcGetNumberRatTraps, &[])
        .call("get_number_cat_traps", M::RcGetNumberCatTraps, &[])
        // Sensing
        .call("on_the_map", M::RcOnTheMap, loc)
        .call("can_sense_location", M::RcCanSenseLocation, loc)
        .call("is_location_occupied", M::RcIsLocationOccupied, loc)
        .call("can_sense_robot_at_location", M::RcCanSenseRobotAtLocation, loc)
        .call("sense_robot_at_location", M::RcSenseRobotAtLocation, loc)
        .call("can_sense_robot", M::RcCanSenseRobot, &["id"])
        .call("sense_robot", M::RcSenseRobot, &["id"])
        .overloaded(
            "sense_nearby_robots",
            &[Optional("center"), Optional("radius_squared"), Optional("team")],
            &[
                overload(M::RcSenseNearbyRobots, &[]),
                overload(M::RcSenseNearbyRobotsInt, &["radius_squared"]),
                overload(M::RcSenseNearbyRobotsIntTeam, &["radius_squared", "team"]),
                overload(M::RcSenseNearbyRobotsLocIntTeam, &["center", "radius_squared", "team"]),
            ],
        )
        .call("sense_passability", M::RcSensePassability, loc)
        .call("sense_map_info", M::RcSenseMapInfo, loc)
        .overloaded(
            "sense_nearby_map_infos",
            &[Optional("center"), Optional("radius_squared")],
            &[
                overload(M::RcSenseNearbyMapInfos, &[]),
                overload(M::RcSenseNearbyMapInfosLoc, &["center"]),
                overload(M::RcSenseNearbyMapInfosInt, &["radius_squared"]),
                overload(M::RcSenseNearbyMapInfosLocInt, &["center", "radius_squared"]),
            ],
        )
        .call("adjacent_location", M::RcAdjacentLocation, dir)
        .call(
            "get_all_locations_within_radius_squared",
            M::RcGetAllLocationsWithinRadiusSquared,
            &["center", "radius_squared"],
        )
        // Readiness
        .call("is_action_ready", M::RcIsActionReady, &[])
        .call("get_action_cooldown_turns", M::RcGetActionCooldownTurns, &[])
        .call("is_movement_ready", M::RcIsMovementReady, &[])
        .call("is_turning_ready", M::RcIsTurningReady, &[])
        .call("get_movement_cooldown_turns", M::RcGetMovementCooldownTurns, &[])
        .call("get_turning_cooldown_turns", M::RcGetTurningCooldownTurns, &[])
        // Movement
        .call("can_move_forward", M::RcCanMoveForward, &[])
        .call("can_move", M::RcCanMove, dir)
        .call("move_forward", M::RcMoveForward, &[])
        .call("move", M::RcMove, dir)
        .overloaded(
            "can_turn",
            &[Optional("dir")],
            &[overload(M::RcCanTurn, &[]), overload(M::RcCanTurnDir, &["dir"])],
        )
        .call("turn", M::RcTurn, dir)
        // Building
        .call("get_current_rat_cost", M::RcGetCurrentRatCost, &[])
        .call("can_build_rat", M::RcCanBuildRat, loc)
        .call("build_rat", M::RcBuildRat, loc)
        .call("can_become_rat_king", M::RcCanBecomeRatKing, &[])
        .call("become_rat_king", M::RcBecomeRatKing, &[])
        .call("can_place_dirt", M::RcCanPlaceDirt, loc)
        .call("place_dirt", M::RcPlaceDirt, loc)
        .call("can_remove_dirt", M::RcCanRemoveDirt, loc)
        .call("remove_dirt", M::RcRemoveDirt, loc)
        .call("can_place_rat_trap", M::RcCanPlaceRatTrap, loc)
        .call("place_rat_trap", M::RcPlaceRatTrap, loc)
        .call("can_remove_rat_trap", M::RcCanRemoveRatTrap, loc)
        .call("remove_rat_trap", M::RcRemoveRatTrap, loc)
        .call("can_place_cat_trap", M::RcCanPlaceCatTrap, loc)
        .call("place_cat_trap", M::RcPlaceCatTrap, loc)
        .call("can_remove_cat_trap", M::RcCanRemoveCatTrap, loc)
        .call("remove_cat_trap", M::RcRemoveCatTrap, loc)
        // Cheese and combat
        .call("can_pick_up_cheese", M::RcCanPickUpCheese, loc)
        .overloaded(
            "pick_up_cheese",
            &[Required("loc"), Optional("amount")],
            &[
                overload(M::RcPickUpCheese, loc),
                overload(M::RcPickUpCheeseLocInt, &["loc", "amount"]),
            ],
        )
        .overloaded(
            "can_attack",
            &[Required("loc"), Default("cheese_amount", Literal::Int(0))],
            &[overload(M::RcCanAttackLocInt, &["loc", "cheese_amount"])],
        )
        .overloaded(
            "attack",
            &[Required("loc"), Default("cheese_amount", Literal::Int(0))],
            &[overload(M::RcAttackLocInt, &["loc", "cheese_amount"])],
        )
        .call("can_transfer_cheese", M::RcCanTransferCheese, &["loc", "cheese_amount"])
        .call("transfer_cheese", M::RcTransferCheese, &["loc", "cheese_amount"])
        // Communication
        .call("squeak", M::RcSqueak, &["squeak"])
        .call("read_squeaks", M::RcReadSqueaks, &["roundNum"])
        .call("write_shared_array", M::RcWriteSharedArray, &["index", "value"])
        .call("read_shared_array", M::RcReadSharedArray, &["index"])
        // Carrying
        .call("can_throw_rat", M::RcCanThrowRat, &[])
        .call("throw_rat", M::RcThrowRat, &[])
        .call("can_drop_rat", M::RcCanDropRat, dir)
        .call("drop_rat", M::RcDropRat, dir)
        .call("can_carry_rat", M::RcCanCarryRat, loc)
        .call("carry_rat", M::RcCarryRat, loc)
        // Other
        .call("disintegrate", M::RcDisintegrate, &[])
        .call("resign", M::RcResign, &[])
        .call("set_indicator_string", M::RcSetIndicatorString, &["text"])
        .call("set_indicator_dot", M::RcSetIndicatorDot, &["loc", "r", "g", "b"])
        .call(
            "set_indicator_line",
            M::RcSetIndicatorLine,
            &["startLoc", "endLoc", "r", "g", "b"],
        )
        .call("set_timeline_marker", M::RcSetTimelineMarker, &["text", "r", "g", "b"])
        .build()
}

/// Location helpers exposed as free functions. `log` is bound separately.
#[must_use]
pub fn free_functions() -> Vec<Capability> {
    use Method as M;
    use Param::{Default, Required};

    let pair: &'static [&'static str] = &["loc1", "loc2"];
    TableBuilder::new()
        .call("distance_squared_to", M::MlDistanceSquaredTo, pair)
        .call("bottom_left_distance_squared_to", M::MlBottomLeftDistanceSquaredTo, pair)
        .call("direction_to", M::MlDirectionTo, pair)
        .call("is_adjacent_to", M::MlIsAdjacentTo, pair)
        .overloaded(
            "is_within_distance_squared",
            &[
                Required("loc1"),
                Required("loc2"),
                Required("distance_squared"),
                Default("theta", Literal::Int(360)),
                Default("use_bottom_left", Literal::Bool(false)),
            ],
            &[overload(
                M::MlIsWithinDistanceSquaredLocIntDirDoubleBoolean,
                &["loc1", "loc2", "distance_squared", "theta", "use_bottom_left"],
            )],
        )
        .call("get_all_type_locations", M::UtGetAllTypeLocations, &["unit_type", "center"])
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let all: Vec<Capability> = controller().into_iter().chain(free_functions()).collect();
        let names: HashSet<&str> = all.iter().map(|c| c.name).collect();
        assert_eq!(names.len(), all.len());
    }

    #[test]
    fn test_every_rc_method_is_reachable() {
        use Method as M;
        let used: HashSet<Method> = controller()
            .iter()
            .flat_map(|c| c.overloads.iter().map(|(m, _)| *m))
            .collect();
        // Overloads without a wrapper in the controller surface.
        let unused = [M::RcCanAttack, M::RcAttack];
        for method in Method::ALL.iter().filter(|m| m.name().starts_with("RC_")) {
            assert!(
                used.contains(method) || unused.contains(method),
                "{} has no capability",
                method.name()
            );
        }
    }

    #[test]
    fn test_optional_selects_overload() {
        let cap = controller().into_iter().find(|c| c.name == "pick_up_cheese").unwrap();
        let loc = Value::Location(crate::game::MapLocation::new(0, 0));
        let (method, values) = cap.resolve(Args::positional(vec![loc.clone()])).unwrap();
        assert_eq!(method, Method::RcPickUpCheese);
        assert_eq!(values.len(), 1);
        let (method, values) = cap.resolve(Args::positional(vec![loc, Value::Int(5)])).unwrap();
        assert_eq!(method, Method::RcPickUpCheeseLocInt);
        assert!(matches!(values[1], Value::Int(5)));
    }

    #[test]
    fn test_missing_required_is_type_error() {
        let cap = controller().into_iter().find(|c| c.name == "move").unwrap();
        let err = cap.resolve(Args::default()).unwrap_err();
        assert_eq!(err.message(), "move() missing required argument 'dir'");
    }
}
