//! Attribute access, methods and game type constructors.
//!
//! Reading a method produces a [`Bound`] value; the method body runs when the
//! bound value is called. Attribute names are checked against the sandbox
//! before any of this runs, so nothing here has to worry about `_` names.

use std::rc::Rc;

use crate::error::{ErrorKind, ProgramError};
use crate::game::{Direction, GameActionKind, MapLocation, Team, TrapType, UnitType};

use super::builtins::sort_values;
use super::value::{Args, Bound, Dict, TypeObject, Value};
use super::{Interp, Unwind, ops};

const STR_METHODS: &[&str] = &[
    "upper", "lower", "strip", "split", "join", "startswith", "endswith", "replace", "find",
    "count",
];
const LIST_METHODS: &[&str] = &[
    "append", "extend", "insert", "pop", "remove", "index", "count", "clear", "reverse", "sort",
    "copy",
];
const TUPLE_METHODS: &[&str] = &["index", "count"];
const DICT_METHODS: &[&str] = &[
    "get", "keys", "values", "items", "pop", "setdefault", "update", "clear", "copy",
];
const DIRECTION_METHODS: &[&str] = &[
    "opposite", "rotate_left", "rotate_right", "get_delta_x", "get_delta_y", "ordinal",
];
const LOCATION_METHODS: &[&str] = &["add", "subtract", "translate"];
const UNIT_TYPE_METHODS: &[&str] = &[
    "uses_bottom_left_location_for_distance",
    "is_robot_type",
    "is_throwable_type",
    "is_throwing_type",
    "is_baby_rat_type",
    "is_rat_king_type",
    "is_cat_type",
    "ordinal",
];

fn no_attribute(value: &Value, name: &str) -> ProgramError {
    ProgramError::new(
        ErrorKind::Attribute,
        format!("'{}' object has no attribute '{name}'", value.type_name()),
    )
}

fn bound(receiver: &Value, name: &str) -> Value {
    Value::Bound(Rc::new(Bound {
        receiver: receiver.clone(),
        name: Rc::from(name),
    }))
}

fn opt<T>(value: Option<&T>, f: impl Fn(&T) -> Value) -> Value {
    value.map_or(Value::None, f)
}

fn methods_of(value: &Value) -> &'static [&'static str] {
    match value {
        Value::Str(_) => STR_METHODS,
        Value::List(_) => LIST_METHODS,
        Value::Tuple(_) => TUPLE_METHODS,
        Value::Dict(_) => DICT_METHODS,
        Value::Direction(_) => DIRECTION_METHODS,
        Value::Location(_) => LOCATION_METHODS,
        Value::UnitType(_) => UNIT_TYPE_METHODS,
        Value::Team(_) => &["opponent", "ordinal"],
        Value::TrapType(_) => &["ordinal"],
        Value::Type(TypeObject::Direction) => &["all_directions", "cardinal_directions"],
        _ => &[],
    }
}

fn enum_member(ty: TypeObject, name: &str) -> Option<Value> {
    match ty {
        TypeObject::Direction => Direction::from_name(name).map(Value::Direction),
        TypeObject::Team => Team::from_name(name).map(Value::Team),
        TypeObject::UnitType => UnitType::from_name(name).map(Value::UnitType),
        TypeObject::TrapType => TrapType::from_name(name).map(Value::TrapType),
        TypeObject::GameActionExceptionType => {
            GameActionKind::from_name(name).map(Value::ActionKind)
        }
        TypeObject::MapLocation => None,
    }
}

fn unit_stat(unit: UnitType, name: &str) -> Option<i64> {
    let stats = unit.stats();
    Some(match name {
        "health" => stats.health,
        "size" => stats.size,
        "vision_cone_radius_squared" => stats.vision_cone_radius_squared,
        "vision_cone_angle" => stats.vision_cone_angle,
        "action_cooldown" => stats.action_cooldown,
        "movement_cooldown" => stats.movement_cooldown,
        "bytecode_limit" => stats.bytecode_limit,
        _ => return None,
    })
}

fn trap_stat(trap: TrapType, name: &str) -> Option<i64> {
    let stats = trap.stats();
    Some(match name {
        "build_cost" => stats.build_cost,
        "damage" => stats.damage,
        "stun_time" => stats.stun_time,
        "action_cooldown" => stats.action_cooldown,
        "max_count" => stats.max_count,
        "trigger_radius_squared" => stats.trigger_radius_squared,
        _ => return None,
    })
}

fn ordinal(index: usize) -> Value {
    Value::Int(i64::try_from(index).unwrap_or(i64::MAX))
}

fn property(value: &Value, name: &str) -> Option<Value> {
    match (value, name) {
        (Value::Module(module), _) => module.ns.get(name),
        (Value::Type(ty), _) => enum_member(*ty, name),
        (Value::Exception(error), "type") => Some(match error.kind() {
            ErrorKind::GameAction(kind) => Value::ActionKind(kind),
            _ => Value::None,
        }),
        (Value::Exception(error), "message") => Some(Value::str(error.message())),
        (Value::Exception(error), "args") => Some(Value::tuple(vec![Value::str(error.message())])),
        (Value::Direction(dir), "dx") => Some(Value::Int(i64::from(dir.dx()))),
        (Value::Direction(dir), "dy") => Some(Value::Int(i64::from(dir.dy()))),
        (Value::Direction(dir), "value") => Some(Value::tuple(vec![
            Value::Int(i64::from(dir.dx())),
            Value::Int(i64::from(dir.dy())),
        ])),
        (Value::Direction(dir), "name") => Some(Value::str(dir.name())),
        (Value::Team(team), "name") => Some(Value::str(team.name())),
        (Value::Team(team), "value") => Some(ordinal(team.ordinal())),
        (Value::ActionKind(kind), "name") => Some(Value::str(kind.name())),
        (Value::ActionKind(kind), "value") => Some(ordinal(kind.ordinal())),
        (Value::UnitType(unit), "name") => Some(Value::str(unit.name())),
        (Value::UnitType(unit), _) => unit_stat(*unit, name).map(Value::Int),
        (Value::TrapType(trap), "name") => Some(Value::str(trap.name())),
        (Value::TrapType(trap), _) => trap_stat(*trap, name).map(Value::Int),
        (Value::Location(loc), "x") => Some(Value::Int(i64::from(loc.x))),
        (Value::Location(loc), "y") => Some(Value::Int(i64::from(loc.y))),
        (Value::Robot(robot), _) => Some(match name {
            "id" => Value::Int(robot.id),
            "team" => Value::Team(robot.team),
            "type" => Value::UnitType(robot.unit_type),
            "health" => Value::Int(robot.health),
            "location" => Value::Location(robot.location),
            "direction" => Value::Direction(robot.direction),
            "chirality" => Value::Int(robot.chirality),
            "cheese_amount" => Value::Int(robot.cheese_amount),
            "carrying_robot" => opt(robot.carrying_robot.as_deref(), |r| {
                Value::Robot(Rc::new(r.clone()))
            }),
            _ => return None,
        }),
        (Value::Tile(tile), _) => Some(match name {
            "location" => Value::Location(tile.location),
            "is_passable" => Value::Bool(tile.is_passable),
            "flying_robot" => opt(tile.flying_robot.as_deref(), |r| {
                Value::Robot(Rc::new(r.clone()))
            }),
            "is_wall" => Value::Bool(tile.is_wall),
            "is_dirt" => Value::Bool(tile.is_dirt),
            "cheese_amount" => Value::Int(tile.cheese_amount),
            "trap" => Value::TrapType(tile.trap),
            "has_cheese_mine" => Value::Bool(tile.has_cheese_mine),
            _ => return None,
        }),
        (Value::Message(message), _) => Some(match name {
            "bytes" => Value::Int(message.bytes),
            "sender_id" => Value::Int(message.sender_id),
            "round" => Value::Int(message.round),
            "source_loc" => Value::Location(message.source_loc),
            _ => return None,
        }),
        _ => None,
    }
}

/// Read `value.name`.
///
/// # Errors
///
/// Returns an `AttributeError` if the value has no such attribute.
pub(super) fn load_attr(value: &Value, name: &str) -> Result<Value, ProgramError> {
    if methods_of(value).contains(&name) {
        return Ok(bound(value, name));
    }
    if let Some(found) = property(value, name) {
        return Ok(found);
    }
    Err(match value {
        Value::Module(module) => ProgramError::new(
            ErrorKind::Attribute,
            format!("module '{}' has no attribute '{name}'", module.name),
        ),
        Value::Type(ty) => ProgramError::new(
            ErrorKind::Attribute,
            format!("type object '{}' has no attribute '{name}'", ty.name()),
        ),
        other => no_attribute(other, name),
    })
}

/// Write `target.name = value`.
///
/// Only module attributes are writable; every game value is immutable.
///
/// # Errors
///
/// Returns an `AttributeError` for read-only targets.
pub(super) fn store_attr(target: &Value, name: &str, value: Value) -> Result<(), ProgramError> {
    match target {
        Value::Module(module) => {
            module.ns.set(name, value);
            Ok(())
        }
        other => Err(ProgramError::new(
            ErrorKind::Attribute,
            format!("'{}' object attribute '{name}' is read-only", other.type_name()),
        )),
    }
}

/// Call a game type object, e.g. `MapLocation(3, 4)` or `Team(0)`.
///
/// # Errors
///
/// Returns a `TypeError` or `ValueError` for bad arguments.
pub(super) fn construct(ty: TypeObject, args: Args) -> Result<Value, ProgramError> {
    if ty == TypeObject::MapLocation {
        let [x, y] = args.exact("MapLocation", ["x", "y"])?;
        return Ok(Value::Location(MapLocation::new(
            x.as_coord("x")?,
            y.as_coord("y")?,
        )));
    }
    let [value] = args.exact(ty.name(), ["value"])?;
    let invalid = || {
        ProgramError::value_error(format!("{} is not a valid {}", ops::repr(&value), ty.name()))
    };
    let by_ordinal = |value: &Value| -> Option<usize> {
        value.as_int("value").ok().and_then(|i| usize::try_from(i).ok())
    };
    match (ty, &value) {
        (TypeObject::Direction, Value::Direction(_))
        | (TypeObject::Team, Value::Team(_))
        | (TypeObject::UnitType, Value::UnitType(_))
        | (TypeObject::TrapType, Value::TrapType(_))
        | (TypeObject::GameActionExceptionType, Value::ActionKind(_)) => Ok(value.clone()),
        (TypeObject::Direction, Value::Tuple(delta)) if delta.len() == 2 => {
            let dx = delta[0].as_int("dx").ok();
            let dy = delta[1].as_int("dy").ok();
            Direction::ALL
                .iter()
                .find(|d| Some(i64::from(d.dx())) == dx && Some(i64::from(d.dy())) == dy)
                .map(|d| Value::Direction(*d))
                .ok_or_else(invalid)
        }
        (TypeObject::Team, _) => by_ordinal(&value)
            .and_then(Team::from_ordinal)
            .map(Value::Team)
            .ok_or_else(invalid),
        (TypeObject::UnitType, _) => by_ordinal(&value)
            .and_then(UnitType::from_ordinal)
            .map(Value::UnitType)
            .ok_or_else(invalid),
        (TypeObject::TrapType, _) => by_ordinal(&value)
            .and_then(TrapType::from_ordinal)
            .map(Value::TrapType)
            .ok_or_else(invalid),
        (TypeObject::GameActionExceptionType, _) => by_ordinal(&value)
            .and_then(GameActionKind::from_ordinal)
            .map(Value::ActionKind)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn no_args(args: &Args, method: &str) -> Result<(), ProgramError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(ProgramError::type_error(format!("{method}() takes no arguments")))
    }
}

fn index_of(items: &[Value], needle: &Value, what: &str) -> Result<Value, ProgramError> {
    items
        .iter()
        .position(|item| ops::equals(item, needle))
        .map(ordinal)
        .ok_or_else(|| ProgramError::value_error(format!("{} is not in {what}", ops::repr(needle))))
}

fn count_of(items: &[Value], needle: &Value) -> Value {
    ordinal(items.iter().filter(|item| ops::equals(item, needle)).count())
}

/// Run `receiver.name(*args)`.
///
/// # Errors
///
/// Returns whatever the method raises.
pub(super) fn call_method(
    interp: &mut Interp,
    receiver: &Value,
    name: &str,
    args: Args,
) -> Result<Value, Unwind> {
    match receiver {
        Value::Str(text) => Ok(str_method(text, name, args)?),
        Value::List(_) => list_method(interp, receiver, name, args),
        Value::Tuple(items) => {
            let [needle] = args.exact(name, ["value"])?;
            Ok(match name {
                "index" => index_of(items, &needle, "tuple")?,
                _ => count_of(items, &needle),
            })
        }
        Value::Dict(_) => Ok(dict_method(receiver, name, args)?),
        Value::Direction(dir) => {
            no_args(&args, name)?;
            Ok(match name {
                "opposite" => Value::Direction(dir.opposite()),
                "rotate_left" => Value::Direction(dir.rotate_left()),
                "rotate_right" => Value::Direction(dir.rotate_right()),
                "get_delta_x" => Value::Int(i64::from(dir.dx())),
                "get_delta_y" => Value::Int(i64::from(dir.dy())),
                _ => ordinal(dir.ordinal()),
            })
        }
        Value::Location(loc) => Ok(match name {
            "translate" => {
                let [dx, dy] = args.exact("translate", ["dx", "dy"])?;
                Value::Location(loc.translate(dx.as_coord("dx")?, dy.as_coord("dy")?))
            }
            _ => {
                let [dir] = args.exact(name, ["dir"])?;
                let dir = dir.as_direction("dir")?;
                Value::Location(if name == "add" { loc.add(dir) } else { loc.subtract(dir) })
            }
        }),
        Value::Team(team) => {
            no_args(&args, name)?;
            Ok(match name {
                "opponent" => Value::Team(team.opponent()),
                _ => ordinal(team.ordinal()),
            })
        }
        Value::UnitType(unit) => {
            no_args(&args, name)?;
            Ok(match name {
                "ordinal" => ordinal(unit.ordinal()),
                "uses_bottom_left_location_for_distance" | "is_cat_type" => {
                    Value::Bool(*unit == UnitType::Cat)
                }
                "is_robot_type" => Value::Bool(true),
                "is_rat_king_type" => Value::Bool(*unit == UnitType::RatKing),
                _ => Value::Bool(*unit == UnitType::BabyRat),
            })
        }
        Value::TrapType(trap) => {
            no_args(&args, name)?;
            Ok(ordinal(trap.ordinal()))
        }
        Value::Type(TypeObject::Direction) => {
            no_args(&args, name)?;
            let dirs: &[Direction] = if name == "all_directions" {
                Direction::ALL
            } else {
                &Direction::CARDINAL
            };
            Ok(Value::list(dirs.iter().map(|d| Value::Direction(*d)).collect()))
        }
        other => Err(no_attribute(other, name).into()),
    }
}

fn str_method(text: &Rc<str>, name: &str, args: Args) -> Result<Value, ProgramError> {
    match name {
        "upper" | "lower" | "strip" => {
            no_args(&args, name)?;
            Ok(Value::str(match name {
                "upper" => text.to_uppercase(),
                "lower" => text.to_lowercase(),
                _ => text.trim().to_string(),
            }))
        }
        "split" => {
            let slots = args.bind("split", &["sep"], 0)?;
            let parts: Vec<Value> = match slots.into_iter().next().flatten() {
                None | Some(Value::None) => text.split_whitespace().map(Value::str).collect(),
                Some(sep) => {
                    let sep = sep.as_str("separator")?;
                    if sep.is_empty() {
                        return Err(ProgramError::value_error("empty separator"));
                    }
                    text.split(&*sep).map(Value::str).collect()
                }
            };
            Ok(Value::list(parts))
        }
        "join" => {
            let [items] = args.exact("join", ["iterable"])?;
            let parts = ops::collect(&items)?
                .iter()
                .map(|item| item.as_str("sequence item").map(|s| s.to_string()))
                .collect::<Result<Vec<_>, _>>()?;
            let joined = parts.iter().map(String::len).fold(0usize, usize::saturating_add);
            ops::check_size(joined.saturating_add(text.len().saturating_mul(parts.len())))?;
            Ok(Value::str(parts.join(&**text)))
        }
        "startswith" | "endswith" => {
            let [affix] = args.exact(name, ["affix"])?;
            let affix = affix.as_str(name)?;
            Ok(Value::Bool(if name == "startswith" {
                text.starts_with(&*affix)
            } else {
                text.ends_with(&*affix)
            }))
        }
        "replace" => {
            let [old, new] = args.exact("replace", ["old", "new"])?;
            let (old, new) = (old.as_str("old")?, new.as_str("new")?);
            if new.len() > old.len() {
                let hits = if old.is_empty() {
                    text.chars().count() + 1
                } else {
                    text.matches(&*old).count()
                };
                let growth = hits.saturating_mul(new.len() - old.len());
                ops::check_size(text.len().saturating_add(growth))?;
            }
            Ok(Value::str(text.replace(&*old, &new)))
        }
        "find" => {
            let [needle] = args.exact("find", ["sub"])?;
            let needle = needle.as_str("sub")?;
            Ok(match text.find(&*needle) {
                Some(byte) => ordinal(text[..byte].chars().count()),
                None => Value::Int(-1),
            })
        }
        _ => {
            let [needle] = args.exact("count", ["sub"])?;
            let needle = needle.as_str("sub")?;
            if needle.is_empty() {
                return Ok(ordinal(text.chars().count() + 1));
            }
            Ok(ordinal(text.matches(&*needle).count()))
        }
    }
}

fn list_method(
    interp: &mut Interp,
    receiver: &Value,
    name: &str,
    args: Args,
) -> Result<Value, Unwind> {
    let Value::List(items) = receiver else {
        return Err(no_attribute(receiver, name).into());
    };
    match name {
        "append" => {
            let [item] = args.exact("append", ["object"])?;
            items.borrow_mut().push(item);
        }
        "extend" => {
            let [iterable] = args.exact("extend", ["iterable"])?;
            let extra = ops::collect(&iterable)?;
            ops::check_size(items.borrow().len().saturating_add(extra.len()))?;
            items.borrow_mut().extend(extra);
        }
        "insert" => {
            let [index, item] = args.exact("insert", ["index", "object"])?;
            let mut items = items.borrow_mut();
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let index = index.as_int("index")?;
            let at = if index < 0 { (index + len).max(0) } else { index.min(len) };
            items.insert(usize::try_from(at).unwrap_or(0), item);
        }
        "pop" => {
            let slots = args.bind("pop", &["index"], 0)?;
            let mut items = items.borrow_mut();
            if items.is_empty() {
                return Err(ProgramError::new(ErrorKind::Index, "pop from empty list").into());
            }
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let index = match slots.into_iter().next().flatten() {
                Some(index) => index.as_int("index")?,
                None => -1,
            };
            let resolved = if index < 0 { index + len } else { index };
            let at = usize::try_from(resolved)
                .ok()
                .filter(|i| *i < items.len())
                .ok_or_else(|| ProgramError::new(ErrorKind::Index, "pop index out of range"))?;
            return Ok(items.remove(at));
        }
        "remove" => {
            let [needle] = args.exact("remove", ["value"])?;
            let mut items = items.borrow_mut();
            let at = items
                .iter()
                .position(|item| ops::equals(item, &needle))
                .ok_or_else(|| ProgramError::value_error("list.remove(x): x not in list"))?;
            items.remove(at);
        }
        "index" => {
            let [needle] = args.exact("index", ["value"])?;
            return Ok(index_of(&items.borrow(), &needle, "list")?);
        }
        "count" => {
            let [needle] = args.exact("count", ["value"])?;
            return Ok(count_of(&items.borrow(), &needle));
        }
        "clear" => {
            no_args(&args, name)?;
            items.borrow_mut().clear();
        }
        "reverse" => {
            no_args(&args, name)?;
            items.borrow_mut().reverse();
        }
        "copy" => {
            no_args(&args, name)?;
            return Ok(Value::list(items.borrow().clone()));
        }
        _ => {
            let slots = args.bind("sort", &["key", "reverse"], 0)?;
            let mut slots = slots.into_iter();
            let key = slots.next().flatten().filter(|k| !matches!(k, Value::None));
            let reverse = slots.next().flatten().is_some_and(|r| ops::truthy(&r));
            let snapshot = items.borrow().clone();
            let sorted = sort_values(interp, snapshot, key, reverse)?;
            *items.borrow_mut() = sorted;
        }
    }
    Ok(Value::None)
}

fn dict_method(receiver: &Value, name: &str, args: Args) -> Result<Value, ProgramError> {
    let Value::Dict(dict) = receiver else {
        return Err(no_attribute(receiver, name));
    };
    match name {
        "get" => {
            let slots = args.bind("get", &["key", "default"], 1)?;
            let mut slots = slots.into_iter();
            let key = slots.next().flatten().unwrap_or_default();
            let default = slots.next().flatten().unwrap_or_default();
            Ok(dict.borrow().get(&key).unwrap_or(default))
        }
        "keys" | "values" | "items" => {
            no_args(&args, name)?;
            let dict = dict.borrow();
            let items = dict
                .entries()
                .iter()
                .map(|(k, v)| match name {
                    "keys" => k.clone(),
                    "values" => v.clone(),
                    _ => Value::tuple(vec![k.clone(), v.clone()]),
                })
                .collect();
            Ok(Value::list(items))
        }
        "pop" => {
            let slots = args.bind("pop", &["key", "default"], 1)?;
            let mut slots = slots.into_iter();
            let key = slots.next().flatten().unwrap_or_default();
            let default = slots.next().flatten();
            match (dict.borrow_mut().remove(&key), default) {
                (Some(value), _) | (None, Some(value)) => Ok(value),
                (None, None) => Err(ProgramError::new(ErrorKind::Key, ops::repr(&key))),
            }
        }
        "setdefault" => {
            let slots = args.bind("setdefault", &["key", "default"], 1)?;
            let mut slots = slots.into_iter();
            let key = slots.next().flatten().unwrap_or_default();
            let default = slots.next().flatten().unwrap_or_default();
            let mut dict = dict.borrow_mut();
            if let Some(existing) = dict.get(&key) {
                return Ok(existing);
            }
            dict.insert(key, default.clone())?;
            Ok(default)
        }
        "update" => {
            let [other] = args.exact("update", ["other"])?;
            let Value::Dict(other) = other else {
                return Err(ProgramError::type_error("update() expects a dict"));
            };
            let entries = other.borrow().entries().to_vec();
            let mut dict = dict.borrow_mut();
            for (k, v) in entries {
                dict.insert(k, v)?;
            }
            Ok(Value::None)
        }
        "clear" => {
            no_args(&args, name)?;
            dict.borrow_mut().clear();
            Ok(Value::None)
        }
        _ => {
            no_args(&args, name)?;
            let mut copy = Dict::new();
            for (k, v) in dict.borrow().entries() {
                copy.insert(k.clone(), v.clone())?;
            }
            Ok(Value::Dict(Rc::new(std::cell::RefCell::new(copy))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_attributes() {
        let north = Value::Direction(Direction::North);
        assert!(matches!(load_attr(&north, "dx"), Ok(Value::Int(0))));
        assert!(matches!(load_attr(&north, "dy"), Ok(Value::Int(1))));
        assert!(matches!(load_attr(&north, "opposite"), Ok(Value::Bound(_))));
        let err = load_attr(&north, "bogus").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Attribute);
    }

    #[test]
    fn test_type_members_and_constructors() {
        let dir = load_attr(&Value::Type(TypeObject::Direction), "WEST").unwrap();
        assert!(matches!(dir, Value::Direction(Direction::West)));
        let loc = construct(
            TypeObject::MapLocation,
            Args::positional(vec![Value::Int(2), Value::Int(5)]),
        )
        .unwrap();
        assert!(matches!(loc, Value::Location(l) if l == MapLocation::new(2, 5)));
        let team = construct(TypeObject::Team, Args::positional(vec![Value::Int(1)])).unwrap();
        assert!(matches!(team, Value::Team(Team::B)));
        assert!(construct(TypeObject::Team, Args::positional(vec![Value::Int(9)])).is_err());
    }

    #[test]
    fn test_stat_attributes() {
        let king = Value::UnitType(UnitType::RatKing);
        assert!(matches!(load_attr(&king, "size"), Ok(Value::Int(3))));
        let trap = Value::TrapType(TrapType::CatTrap);
        assert!(matches!(load_attr(&trap, "damage"), Ok(Value::Int(100))));
    }

    #[test]
    fn test_store_attr_only_on_modules() {
        let err = store_attr(&Value::Location(MapLocation::new(0, 0)), "x", Value::Int(1));
        assert_eq!(err.unwrap_err().kind(), ErrorKind::Attribute);
    }

    #[test]
    fn test_string_methods() {
        let text: Rc<str> = Rc::from("a b  c");
        let parts = str_method(&text, "split", Args::default()).unwrap();
        assert_eq!(ops::length(&parts).unwrap(), 3);
        let joined = str_method(
            &Rc::from("-"),
            "join",
            Args::positional(vec![Value::list(vec![Value::str("x"), Value::str("y")])]),
        )
        .unwrap();
        assert_eq!(ops::to_str(&joined), "x-y");
    }
}
