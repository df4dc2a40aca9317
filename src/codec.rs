//! Tagged value encoding between program values and wire JSON.
//!
//! Encoding accepts primitives and the enumerated game kinds only; anything
//! else is refused before a byte is sent. Decoding also builds the sensing
//! records and turns a thrown-exception marker into [`CodecError::Thrown`].

use std::rc::Rc;

use serde_json::{Map, Number, json};

use crate::game::{
    Direction, GameActionKind, MapInfo, MapLocation, Message, RobotInfo, Team, TrapType, UnitType,
};
use crate::protocol::ObjectType;
use crate::vm::Value;

/// Encoding or decoding failure.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The value kind never crosses the wire.
    Unsupported(&'static str),
    /// The wire document has an unexpected shape.
    Malformed(String),
    /// The authority rejected the call with a game action exception.
    Thrown {
        /// Exception kind.
        kind: GameActionKind,
        /// Message from the authority.
        message: String,
    },
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unsupported(type_name) => write!(
                f,
                "Cannot pass an object of type {type_name} into a game function. No game \
                 functions accept objects of this type."
            ),
            Self::Malformed(msg) => write!(f, "malformed value: {msg}"),
            Self::Thrown { kind, message } => {
                write!(f, "GameActionException of type {}: {message}", kind.name())
            }
        }
    }
}

impl std::error::Error for CodecError {}

fn malformed(msg: impl Into<String>) -> CodecError {
    CodecError::Malformed(msg.into())
}

fn tagged(kind: ObjectType, val: usize) -> serde_json::Value {
    json!({ "type": kind.tag(), "val": val })
}

/// Encode one call parameter.
///
/// # Errors
///
/// Returns [`CodecError::Unsupported`] for every kind outside the fixed set.
pub fn encode(value: &Value) -> Result<serde_json::Value, CodecError> {
    Ok(match value {
        Value::None => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => json!(i),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or(CodecError::Unsupported("non-finite float"))?,
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::Direction(d) => tagged(ObjectType::Direction, d.ordinal()),
        Value::Team(t) => tagged(ObjectType::Team, t.ordinal()),
        Value::UnitType(u) => tagged(ObjectType::UnitType, u.ordinal()),
        Value::TrapType(t) => tagged(ObjectType::TrapType, t.ordinal()),
        Value::Location(loc) => encode_location(*loc),
        other => return Err(CodecError::Unsupported(other.type_name())),
    })
}

fn encode_location(loc: MapLocation) -> serde_json::Value {
    json!({ "type": ObjectType::MapLocation.tag(), "x": loc.x, "y": loc.y })
}

/// Decode one response value.
///
/// # Errors
///
/// Returns [`CodecError::Thrown`] for an exception marker and
/// [`CodecError::Malformed`] for anything the wire format does not allow.
pub fn decode(json: &serde_json::Value) -> Result<Value, CodecError> {
    match json {
        serde_json::Value::Null => Ok(Value::None),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(Value::Int(i)),
            None => n
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| malformed(format!("number out of range: {n}"))),
        },
        serde_json::Value::String(s) => Ok(Value::str(s)),
        serde_json::Value::Array(items) => {
            Ok(Value::list(items.iter().map(decode).collect::<Result<_, _>>()?))
        }
        serde_json::Value::Object(fields) => decode_object(fields),
    }
}

fn field<'a>(
    fields: &'a Map<String, serde_json::Value>,
    name: &str,
) -> Result<&'a serde_json::Value, CodecError> {
    fields
        .get(name)
        .ok_or_else(|| malformed(format!("missing field '{name}'")))
}

fn int_field(fields: &Map<String, serde_json::Value>, name: &str) -> Result<i64, CodecError> {
    field(fields, name)?
        .as_i64()
        .ok_or_else(|| malformed(format!("field '{name}' is not an integer")))
}

fn bool_field(fields: &Map<String, serde_json::Value>, name: &str) -> Result<bool, CodecError> {
    field(fields, name)?
        .as_bool()
        .ok_or_else(|| malformed(format!("field '{name}' is not a boolean")))
}

fn coord_field(fields: &Map<String, serde_json::Value>, name: &str) -> Result<i32, CodecError> {
    i32::try_from(int_field(fields, name)?)
        .map_err(|_| malformed(format!("field '{name}' out of range")))
}

fn ordinal<T>(
    fields: &Map<String, serde_json::Value>,
    name: &str,
    lookup: fn(usize) -> Option<T>,
) -> Result<T, CodecError> {
    let raw = int_field(fields, name)?;
    usize::try_from(raw)
        .ok()
        .and_then(lookup)
        .ok_or_else(|| malformed(format!("ordinal {raw} out of range for '{name}'")))
}

fn nested<T>(
    fields: &Map<String, serde_json::Value>,
    name: &str,
    extract: fn(Value) -> Option<T>,
) -> Result<T, CodecError> {
    let value = decode(field(fields, name)?)?;
    let type_name = value.type_name();
    extract(value).ok_or_else(|| malformed(format!("field '{name}' has unexpected {type_name}")))
}

fn nested_robot(
    fields: &Map<String, serde_json::Value>,
    name: &str,
) -> Result<Option<Box<RobotInfo>>, CodecError> {
    match field(fields, name)? {
        serde_json::Value::Null => Ok(None),
        _ => nested(fields, name, |v| match v {
            Value::Robot(r) => Some(Box::new((*r).clone())),
            _ => None,
        })
        .map(Some),
    }
}

fn decode_object(fields: &Map<String, serde_json::Value>) -> Result<Value, CodecError> {
    let tag = field(fields, "type")?;
    let kind = tag
        .as_u64()
        .and_then(ObjectType::from_tag)
        .ok_or_else(|| malformed(format!("unknown object type {tag}")))?;
    Ok(match kind {
        ObjectType::ThrownGameActionException => {
            let kind = ordinal(fields, "etype", GameActionKind::from_ordinal)?;
            let message = field(fields, "msg")?.as_str().unwrap_or_default().to_string();
            return Err(CodecError::Thrown { kind, message });
        }
        ObjectType::Direction => Value::Direction(ordinal(fields, "val", Direction::from_ordinal)?),
        ObjectType::Team => Value::Team(ordinal(fields, "val", Team::from_ordinal)?),
        ObjectType::UnitType => Value::UnitType(ordinal(fields, "val", UnitType::from_ordinal)?),
        ObjectType::TrapType => Value::TrapType(ordinal(fields, "val", TrapType::from_ordinal)?),
        ObjectType::MapLocation => {
            Value::Location(MapLocation::new(coord_field(fields, "x")?, coord_field(fields, "y")?))
        }
        ObjectType::Message => Value::Message(Rc::new(Message {
            bytes: int_field(fields, "bytes")?,
            sender_id: int_field(fields, "sid")?,
            round: int_field(fields, "round")?,
            source_loc: nested(fields, "loc", |v| match v {
                Value::Location(loc) => Some(loc),
                _ => None,
            })?,
        })),
        ObjectType::RobotInfo => Value::Robot(Rc::new(decode_robot(fields)?)),
        ObjectType::MapInfo => Value::Tile(Rc::new(MapInfo {
            location: nested(fields, "loc", |v| match v {
                Value::Location(loc) => Some(loc),
                _ => None,
            })?,
            is_passable: bool_field(fields, "pass")?,
            flying_robot: nested_robot(fields, "fly")?,
            is_wall: bool_field(fields, "wall")?,
            is_dirt: bool_field(fields, "dirt")?,
            cheese_amount: int_field(fields, "ch")?,
            trap: nested(fields, "trap", |v| match v {
                Value::TrapType(t) => Some(t),
                _ => None,
            })?,
            has_cheese_mine: bool_field(fields, "cm")?,
        })),
        ObjectType::Other => return Err(malformed("untagged object")),
    })
}

fn decode_robot(fields: &Map<String, serde_json::Value>) -> Result<RobotInfo, CodecError> {
    Ok(RobotInfo {
        id: int_field(fields, "id")?,
        team: nested(fields, "team", |v| match v {
            Value::Team(t) => Some(t),
            _ => None,
        })?,
        unit_type: nested(fields, "ut", |v| match v {
            Value::UnitType(u) => Some(u),
            _ => None,
        })?,
        health: int_field(fields, "hp")?,
        location: nested(fields, "loc", |v| match v {
            Value::Location(loc) => Some(loc),
            _ => None,
        })?,
        direction: nested(fields, "dir", |v| match v {
            Value::Direction(d) => Some(d),
            _ => None,
        })?,
        chirality: int_field(fields, "chir")?,
        cheese_amount: int_field(fields, "ch")?,
        carrying_robot: nested_robot(fields, "carry")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::ops;
    use proptest::prelude::*;

    fn game_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            (0..Direction::ALL.len()).prop_map(|i| Value::Direction(Direction::ALL[i])),
            (0..Team::ALL.len()).prop_map(|i| Value::Team(Team::ALL[i])),
            (0..UnitType::ALL.len()).prop_map(|i| Value::UnitType(UnitType::ALL[i])),
            (0..TrapType::ALL.len()).prop_map(|i| Value::TrapType(TrapType::ALL[i])),
            (any::<i32>(), any::<i32>()).prop_map(|(x, y)| Value::Location(MapLocation::new(x, y))),
            any::<i64>().prop_map(Value::Int),
            any::<bool>().prop_map(Value::Bool),
            "[a-z ]{0,12}".prop_map(Value::str),
        ]
    }

    proptest! {
        #[test]
        fn prop_supported_values_survive_the_wire(value in game_value()) {
            let decoded = decode(&encode(&value).unwrap()).unwrap();
            prop_assert!(ops::equals(&decoded, &value), "{} != {}", ops::repr(&decoded), ops::repr(&value));
        }
    }

    #[test]
    fn test_unsupported_values_are_refused() {
        let err = encode(&Value::list(vec![Value::Int(1)])).unwrap_err();
        assert_eq!(err, CodecError::Unsupported("list"));
        assert!(encode(&Value::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_thrown_marker_decodes_to_error() {
        let wire = json!({"type": 9, "etype": 2, "msg": "blocked"});
        assert_eq!(
            decode(&wire).unwrap_err(),
            CodecError::Thrown {
                kind: GameActionKind::CantMoveThere,
                message: "blocked".to_string(),
            }
        );
    }

    #[test]
    fn test_robot_record_with_carried_robot() {
        let loc = json!({"type": 2, "x": 3, "y": 4});
        let inner = json!({
            "type": 3, "id": 2, "team": {"type": 8, "val": 1}, "ut": {"type": 6, "val": 0},
            "hp": 100, "loc": loc, "dir": {"type": 1, "val": 8}, "chir": 0, "ch": 0,
            "carry": null
        });
        let outer = json!({
            "type": 3, "id": 1, "team": {"type": 8, "val": 0}, "ut": {"type": 6, "val": 1},
            "hp": 500, "loc": loc, "dir": {"type": 1, "val": 0}, "chir": 1, "ch": 40,
            "carry": inner
        });
        let Value::Robot(robot) = decode(&outer).unwrap() else {
            panic!("expected a robot");
        };
        assert_eq!(robot.unit_type, UnitType::RatKing);
        assert_eq!(robot.cheese_amount, 40);
        let carried = robot.carrying_robot.as_ref().unwrap();
        assert_eq!(carried.team, Team::B);
        assert_eq!(carried.direction, Direction::Center);
    }

    #[test]
    fn test_map_info_and_message_records() {
        let tile = json!({
            "type": 4, "loc": {"type": 2, "x": 0, "y": 1}, "pass": true, "fly": null,
            "wall": false, "dirt": false, "trap": {"type": 7, "val": 2}, "cm": true, "ch": 5
        });
        let Value::Tile(info) = decode(&tile).unwrap() else {
            panic!("expected a tile");
        };
        assert!(info.has_cheese_mine);
        assert_eq!(info.trap, TrapType::None);

        let squeak = json!({"type": 5, "sid": 9, "round": 3, "loc": {"type": 2, "x": 1, "y": 1}, "bytes": 77});
        let decoded = decode(&json!([squeak])).unwrap();
        assert_eq!(ops::length(&decoded).unwrap(), 1);
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(decode(&json!({"type": 42})), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(&json!({"type": 1, "val": 9})), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(&json!({"type": 2, "x": 1})), Err(CodecError::Malformed(_))));
        assert!(matches!(decode(&json!({"type": 0})), Err(CodecError::Malformed(_))));
    }
}
