//! Operators, comparisons, conversions and iteration.
//!
//! Integer arithmetic is checked: leaving the 64-bit range raises an
//! `OverflowError` instead of wrapping. Floor division and modulo round toward
//! negative infinity.

// Integer/float conversions follow the language's numeric tower.
#![allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::float_cmp
)]

use std::cell::RefCell;
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::rc::Rc;
use std::sync::Arc;

use crate::bytecode::{BinOp, CmpOp};
use crate::error::{ErrorKind, ProgramError};

use super::value::{IterState, Value};

/// Most items a list or tuple may hold, and most bytes a string may hold.
pub const MAX_SEQUENCE: usize = 1 << 24;

/// Fail unless a sequence of `len` items fits under [`MAX_SEQUENCE`].
///
/// # Errors
///
/// Returns a `MemoryError` for oversized sequences.
pub fn check_size(len: usize) -> Result<(), ProgramError> {
    if len > MAX_SEQUENCE {
        return Err(ProgramError::new(
            ErrorKind::Memory,
            format!("sequence of {len} items exceeds the limit of {MAX_SEQUENCE}"),
        ));
    }
    Ok(())
}

fn overflow() -> ProgramError {
    ProgramError::new(ErrorKind::Overflow, "integer overflow")
}

fn zero_division(message: &str) -> ProgramError {
    ProgramError::new(ErrorKind::ZeroDivision, message)
}

fn unsupported(op: &str, a: &Value, b: &Value) -> ProgramError {
    ProgramError::type_error(format!(
        "unsupported operand type(s) for {op}: '{}' and '{}'",
        a.type_name(),
        b.type_name()
    ))
}

/// Truth value.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::None => false,
        Value::Bool(b) => *b,
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        Value::Str(s) => !s.is_empty(),
        Value::List(items) => !items.borrow().is_empty(),
        Value::Tuple(items) => !items.is_empty(),
        Value::Dict(dict) => !dict.borrow().is_empty(),
        Value::Range(start, stop, step) => range_len(*start, *stop, *step) > 0,
        _ => true,
    }
}

fn as_number(value: &Value) -> Option<Result<i64, f64>> {
    match value {
        Value::Int(i) => Some(Ok(*i)),
        Value::Bool(b) => Some(Ok(i64::from(*b))),
        Value::Float(f) => Some(Err(*f)),
        _ => None,
    }
}

/// Value equality.
#[must_use]
pub fn equals(a: &Value, b: &Value) -> bool {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return match (x, y) {
            (Ok(x), Ok(y)) => x == y,
            (Ok(x), Err(y)) | (Err(y), Ok(x)) => x as f64 == y,
            (Err(x), Err(y)) => x == y,
        };
    }
    match (a, b) {
        (Value::None, Value::None) => true,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            Rc::ptr_eq(x, y) || seq_equals(&x.borrow(), &y.borrow())
        }
        (Value::Tuple(x), Value::Tuple(y)) => seq_equals(x, y),
        (Value::Dict(x), Value::Dict(y)) => {
            if Rc::ptr_eq(x, y) {
                return true;
            }
            let (x, y) = (x.borrow(), y.borrow());
            x.len() == y.len()
                && x.entries()
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| equals(v, &w)))
        }
        (Value::Range(a0, a1, a2), Value::Range(b0, b1, b2)) => (a0, a1, a2) == (b0, b1, b2),
        (Value::Iter(x), Value::Iter(y)) => Rc::ptr_eq(x, y),
        (Value::Code(x), Value::Code(y)) => Arc::ptr_eq(x, y),
        (Value::Function(x), Value::Function(y)) => Rc::ptr_eq(x, y),
        (Value::Native(x), Value::Native(y)) => Rc::ptr_eq(x, y),
        (Value::Bound(x), Value::Bound(y)) => {
            x.name == y.name && identical(&x.receiver, &y.receiver)
        }
        (Value::Module(x), Value::Module(y)) => Rc::ptr_eq(x, y),
        (Value::Exception(x), Value::Exception(y)) => Rc::ptr_eq(x, y),
        (Value::ExcClass(x), Value::ExcClass(y)) => x == y,
        (Value::Type(x), Value::Type(y)) => x == y,
        (Value::Direction(x), Value::Direction(y)) => x == y,
        (Value::Team(x), Value::Team(y)) => x == y,
        (Value::Location(x), Value::Location(y)) => x == y,
        (Value::UnitType(x), Value::UnitType(y)) => x == y,
        (Value::TrapType(x), Value::TrapType(y)) => x == y,
        (Value::ActionKind(x), Value::ActionKind(y)) => x == y,
        (Value::Robot(x), Value::Robot(y)) => x == y,
        (Value::Tile(x), Value::Tile(y)) => x == y,
        (Value::Message(x), Value::Message(y)) => x == y,
        _ => false,
    }
}

fn seq_equals(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| equals(x, y))
}

/// Identity (`is`): shared objects compare by pointer, scalars by value.
#[must_use]
pub fn identical(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::List(x), Value::List(y)) => Rc::ptr_eq(x, y),
        (Value::Tuple(x), Value::Tuple(y)) => Rc::ptr_eq(x, y),
        (Value::Dict(x), Value::Dict(y)) => Rc::ptr_eq(x, y),
        (Value::Str(x), Value::Str(y)) => Rc::ptr_eq(x, y) || x == y,
        (Value::Robot(x), Value::Robot(y)) => Rc::ptr_eq(x, y),
        (Value::Tile(x), Value::Tile(y)) => Rc::ptr_eq(x, y),
        (Value::Message(x), Value::Message(y)) => Rc::ptr_eq(x, y),
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Int(_) | Value::Bool(_) | Value::Float(_), _)
        | (_, Value::Int(_) | Value::Bool(_) | Value::Float(_)) => false,
        _ => equals(a, b),
    }
}

/// Ordering for `<`, `<=`, `>`, `>=`, `min`, `max` and `sorted`.
///
/// # Errors
///
/// Returns a `TypeError` when the values are not mutually ordered.
pub fn order(a: &Value, b: &Value) -> Result<Ordering, ProgramError> {
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        let ordering = match (x, y) {
            (Ok(x), Ok(y)) => Some(x.cmp(&y)),
            (Ok(x), Err(y)) => (x as f64).partial_cmp(&y),
            (Err(x), Ok(y)) => x.partial_cmp(&(y as f64)),
            (Err(x), Err(y)) => x.partial_cmp(&y),
        };
        // NaN compares false both ways; treat it as equal so sorting is total.
        return Ok(ordering.unwrap_or(Ordering::Equal));
    }
    match (a, b) {
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::List(x), Value::List(y)) => seq_order(&x.borrow(), &y.borrow()),
        (Value::Tuple(x), Value::Tuple(y)) => seq_order(x, y),
        _ => Err(ProgramError::type_error(format!(
            "'<' not supported between instances of '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn seq_order(a: &[Value], b: &[Value]) -> Result<Ordering, ProgramError> {
    for (x, y) in a.iter().zip(b) {
        if !equals(x, y) {
            return order(x, y);
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Evaluate a `compare_op` other than `exc_match`.
///
/// # Errors
///
/// Returns a `TypeError` for unordered operands or unsupported containers.
pub fn compare(op: CmpOp, a: &Value, b: &Value) -> Result<Value, ProgramError> {
    let result = match op {
        CmpOp::Eq => equals(a, b),
        CmpOp::Ne => !equals(a, b),
        CmpOp::Lt => order(a, b)? == Ordering::Less,
        CmpOp::Le => order(a, b)? != Ordering::Greater,
        CmpOp::Gt => order(a, b)? == Ordering::Greater,
        CmpOp::Ge => order(a, b)? != Ordering::Less,
        CmpOp::In => contains(b, a)?,
        CmpOp::NotIn => !contains(b, a)?,
        CmpOp::Is => identical(a, b),
        CmpOp::IsNot => !identical(a, b),
        CmpOp::ExcMatch => {
            return Err(ProgramError::runtime("exc_match evaluated as a comparison"));
        }
    };
    Ok(Value::Bool(result))
}

/// Membership test (`item in container`).
///
/// # Errors
///
/// Returns a `TypeError` for containers that do not support membership.
pub fn contains(container: &Value, item: &Value) -> Result<bool, ProgramError> {
    match container {
        Value::List(items) => Ok(items.borrow().iter().any(|x| equals(x, item))),
        Value::Tuple(items) => Ok(items.iter().any(|x| equals(x, item))),
        Value::Dict(dict) => Ok(dict.borrow().contains(item)),
        Value::Str(text) => {
            let needle = item.as_str("'in <string>' operand")?;
            Ok(text.contains(&*needle))
        }
        Value::Range(start, stop, step) => Ok(match item {
            Value::Int(i) => {
                let inside = if *step > 0 {
                    *start <= *i && *i < *stop
                } else {
                    *stop < *i && *i <= *start
                };
                inside && (i128::from(*i) - i128::from(*start)) % i128::from(*step) == 0
            }
            _ => false,
        }),
        other => Err(ProgramError::type_error(format!(
            "argument of type '{}' is not iterable",
            other.type_name()
        ))),
    }
}

fn floor_div(a: i64, b: i64) -> Result<i64, ProgramError> {
    if b == 0 {
        return Err(zero_division("integer division or modulo by zero"));
    }
    let q = a.checked_div(b).ok_or_else(overflow)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

fn floor_mod(a: i64, b: i64) -> Result<i64, ProgramError> {
    if b == 0 {
        return Err(zero_division("integer division or modulo by zero"));
    }
    let r = a.checked_rem(b).unwrap_or(0);
    if r != 0 && ((r < 0) != (b < 0)) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

fn int_pow(base: i64, exp: i64) -> Result<Value, ProgramError> {
    if exp < 0 {
        return Ok(Value::Float((base as f64).powf(exp as f64)));
    }
    let exp = u32::try_from(exp).map_err(|_| overflow())?;
    base.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
}

fn shift(a: i64, b: i64, left: bool) -> Result<i64, ProgramError> {
    if b < 0 {
        return Err(ProgramError::value_error("negative shift count"));
    }
    if left {
        if a == 0 {
            return Ok(0);
        }
        let b = u32::try_from(b).ok().filter(|b| *b < 64).ok_or_else(overflow)?;
        let shifted = a << b;
        if shifted >> b == a { Ok(shifted) } else { Err(overflow()) }
    } else if b >= 64 {
        Ok(if a < 0 { -1 } else { 0 })
    } else {
        Ok(a >> b)
    }
}

/// Length of `len` items repeated `times` times, bounded by [`MAX_SEQUENCE`].
fn repeated_len(len: usize, times: i64) -> Result<usize, ProgramError> {
    let times = usize::try_from(times).unwrap_or(0);
    let total = len.checked_mul(times).unwrap_or(usize::MAX);
    check_size(total)?;
    Ok(total)
}

fn repeat(items: &[Value], times: i64) -> Result<Vec<Value>, ProgramError> {
    let total = repeated_len(items.len(), times)?;
    let mut out = Vec::with_capacity(total);
    while out.len() < total {
        out.extend(items.iter().cloned());
    }
    Ok(out)
}

/// Evaluate a binary operator.
///
/// # Errors
///
/// Returns `TypeError`, `ZeroDivisionError`, `OverflowError` or `ValueError`
/// as the operator dictates.
pub fn binary(op: BinOp, a: &Value, b: &Value) -> Result<Value, ProgramError> {
    if let (Value::Bool(x), Value::Bool(y)) = (a, b) {
        match op {
            BinOp::And => return Ok(Value::Bool(*x & *y)),
            BinOp::Or => return Ok(Value::Bool(*x | *y)),
            BinOp::Xor => return Ok(Value::Bool(*x ^ *y)),
            _ => {}
        }
    }
    if let (Some(x), Some(y)) = (as_number(a), as_number(b)) {
        return match (x, y) {
            (Ok(x), Ok(y)) => int_binary(op, x, y),
            (Ok(x), Err(y)) => float_binary(op, x as f64, y, a, b),
            (Err(x), Ok(y)) => float_binary(op, x, y as f64, a, b),
            (Err(x), Err(y)) => float_binary(op, x, y, a, b),
        };
    }
    match (op, a, b) {
        (BinOp::Add, Value::Str(x), Value::Str(y)) => {
            check_size(x.len().saturating_add(y.len()))?;
            Ok(Value::str(format!("{x}{y}")))
        }
        (BinOp::Add, Value::List(x), Value::List(y)) => {
            let mut items = x.borrow().clone();
            check_size(items.len().saturating_add(y.borrow().len()))?;
            items.extend(y.borrow().iter().cloned());
            Ok(Value::list(items))
        }
        (BinOp::Add, Value::Tuple(x), Value::Tuple(y)) => {
            check_size(x.len().saturating_add(y.len()))?;
            Ok(Value::tuple(x.iter().chain(y.iter()).cloned().collect()))
        }
        (BinOp::Mul, Value::Str(s), n) | (BinOp::Mul, n, Value::Str(s))
            if as_number(n).is_some_and(|n| n.is_ok()) =>
        {
            let total = repeated_len(s.len(), n.as_int("repeat count")?)?;
            Ok(Value::str(if total == 0 { String::new() } else { s.repeat(total / s.len()) }))
        }
        (BinOp::Mul, Value::List(items), n) | (BinOp::Mul, n, Value::List(items))
            if as_number(n).is_some_and(|n| n.is_ok()) =>
        {
            Ok(Value::list(repeat(&items.borrow(), n.as_int("repeat count")?)?))
        }
        (BinOp::Mul, Value::Tuple(items), n) | (BinOp::Mul, n, Value::Tuple(items))
            if as_number(n).is_some_and(|n| n.is_ok()) =>
        {
            Ok(Value::tuple(repeat(items, n.as_int("repeat count")?)?))
        }
        _ => Err(unsupported(op.symbol(), a, b)),
    }
}

fn int_binary(op: BinOp, x: i64, y: i64) -> Result<Value, ProgramError> {
    let int = |r: Option<i64>| r.map(Value::Int).ok_or_else(overflow);
    match op {
        BinOp::Add => int(x.checked_add(y)),
        BinOp::Sub => int(x.checked_sub(y)),
        BinOp::Mul => int(x.checked_mul(y)),
        BinOp::TrueDiv => {
            if y == 0 {
                Err(zero_division("division by zero"))
            } else {
                Ok(Value::Float(x as f64 / y as f64))
            }
        }
        BinOp::FloorDiv => floor_div(x, y).map(Value::Int),
        BinOp::Mod => floor_mod(x, y).map(Value::Int),
        BinOp::Pow => int_pow(x, y),
        BinOp::And => Ok(Value::Int(x & y)),
        BinOp::Or => Ok(Value::Int(x | y)),
        BinOp::Xor => Ok(Value::Int(x ^ y)),
        BinOp::Shl => shift(x, y, true).map(Value::Int),
        BinOp::Shr => shift(x, y, false).map(Value::Int),
    }
}

fn float_binary(op: BinOp, x: f64, y: f64, a: &Value, b: &Value) -> Result<Value, ProgramError> {
    let value = match op {
        BinOp::Add => x + y,
        BinOp::Sub => x - y,
        BinOp::Mul => x * y,
        BinOp::TrueDiv => {
            if y == 0.0 {
                return Err(zero_division("float division by zero"));
            }
            x / y
        }
        BinOp::FloorDiv => {
            if y == 0.0 {
                return Err(zero_division("float floor division by zero"));
            }
            (x / y).floor()
        }
        BinOp::Mod => {
            if y == 0.0 {
                return Err(zero_division("float modulo"));
            }
            x - y * (x / y).floor()
        }
        BinOp::Pow => x.powf(y),
        BinOp::And | BinOp::Or | BinOp::Xor | BinOp::Shl | BinOp::Shr => {
            return Err(unsupported(op.symbol(), a, b));
        }
    };
    Ok(Value::Float(value))
}

/// Unary minus.
///
/// # Errors
///
/// Returns a `TypeError` for non-numbers and an `OverflowError` for
/// `-i64::MIN`.
pub fn negate(value: &Value) -> Result<Value, ProgramError> {
    match value {
        Value::Int(i) => i.checked_neg().map(Value::Int).ok_or_else(overflow),
        Value::Bool(b) => Ok(Value::Int(-i64::from(*b))),
        Value::Float(f) => Ok(Value::Float(-f)),
        other => Err(ProgramError::type_error(format!(
            "bad operand type for unary -: '{}'",
            other.type_name()
        ))),
    }
}

fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    let (lo, hi, step) = if step > 0 {
        (start, stop, step)
    } else {
        (stop, start, -step)
    };
    if lo >= hi {
        0
    } else {
        let len = (i128::from(hi) - i128::from(lo) - 1) / i128::from(step) + 1;
        i64::try_from(len).unwrap_or(i64::MAX)
    }
}

/// `len(value)`.
///
/// # Errors
///
/// Returns a `TypeError` for values without a length.
pub fn length(value: &Value) -> Result<i64, ProgramError> {
    let len = match value {
        Value::Str(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Tuple(items) => items.len(),
        Value::Dict(dict) => dict.borrow().len(),
        Value::Range(start, stop, step) => return Ok(range_len(*start, *stop, *step)),
        other => {
            return Err(ProgramError::type_error(format!(
                "object of type '{}' has no len()",
                other.type_name()
            )));
        }
    };
    i64::try_from(len).map_err(|_| overflow())
}

fn resolve_index(index: i64, len: usize, what: &str) -> Result<usize, ProgramError> {
    let len_i = i64::try_from(len).map_err(|_| overflow())?;
    let resolved = if index < 0 { index + len_i } else { index };
    usize::try_from(resolved)
        .ok()
        .filter(|i| *i < len)
        .ok_or_else(|| ProgramError::new(ErrorKind::Index, format!("{what} index out of range")))
}

/// `container[key]`.
///
/// # Errors
///
/// Returns `IndexError`, `KeyError` or `TypeError`.
pub fn get_item(container: &Value, key: &Value) -> Result<Value, ProgramError> {
    match container {
        Value::List(items) => {
            let items = items.borrow();
            let i = resolve_index(key.as_int("list indices")?, items.len(), "list")?;
            Ok(items[i].clone())
        }
        Value::Tuple(items) => {
            let i = resolve_index(key.as_int("tuple indices")?, items.len(), "tuple")?;
            Ok(items[i].clone())
        }
        Value::Str(text) => {
            let chars: Vec<char> = text.chars().collect();
            let i = resolve_index(key.as_int("string indices")?, chars.len(), "string")?;
            Ok(Value::str(chars[i].to_string()))
        }
        Value::Dict(dict) => dict
            .borrow()
            .get(key)
            .ok_or_else(|| ProgramError::new(ErrorKind::Key, repr(key))),
        Value::Range(start, stop, step) => {
            let len = usize::try_from(range_len(*start, *stop, *step)).unwrap_or(0);
            let i = resolve_index(key.as_int("range indices")?, len, "range")?;
            let offset = i64::try_from(i).map_err(|_| overflow())?;
            offset
                .checked_mul(*step)
                .and_then(|o| start.checked_add(o))
                .map(Value::Int)
                .ok_or_else(overflow)
        }
        other => Err(ProgramError::type_error(format!(
            "'{}' object is not subscriptable",
            other.type_name()
        ))),
    }
}

/// `container[key] = value`.
///
/// # Errors
///
/// Returns `IndexError` or `TypeError`.
pub fn set_item(container: &Value, key: Value, value: Value) -> Result<(), ProgramError> {
    match container {
        Value::List(items) => {
            let mut items = items.borrow_mut();
            let i = resolve_index(key.as_int("list indices")?, items.len(), "list assignment")?;
            items[i] = value;
            Ok(())
        }
        Value::Dict(dict) => dict.borrow_mut().insert(key, value),
        other => Err(ProgramError::type_error(format!(
            "'{}' object does not support item assignment",
            other.type_name()
        ))),
    }
}

/// `iter(value)`.
///
/// # Errors
///
/// Returns a `TypeError` for values that cannot be iterated.
pub fn iterate(value: &Value) -> Result<Value, ProgramError> {
    let state = match value {
        Value::Iter(_) => return Ok(value.clone()),
        Value::List(items) => IterState::List(Rc::clone(items), 0),
        Value::Tuple(items) => IterState::Items(Rc::clone(items), 0),
        Value::Str(text) => IterState::Items(
            text.chars().map(|c| Value::str(c.to_string())).collect(),
            0,
        ),
        Value::Dict(dict) => IterState::Items(
            dict.borrow().entries().iter().map(|(k, _)| k.clone()).collect(),
            0,
        ),
        Value::Range(start, stop, step) => IterState::Range {
            next: *start,
            stop: *stop,
            step: *step,
        },
        other => {
            return Err(ProgramError::type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            )));
        }
    };
    Ok(Value::Iter(Rc::new(RefCell::new(state))))
}

/// Drain an iterable into a vector.
///
/// # Errors
///
/// Returns a `TypeError` for values that cannot be iterated and a
/// `MemoryError` for iterables longer than [`MAX_SEQUENCE`].
pub fn collect(value: &Value) -> Result<Vec<Value>, ProgramError> {
    match value {
        Value::List(items) => Ok(items.borrow().clone()),
        Value::Tuple(items) => Ok(items.to_vec()),
        _ => {
            if let Value::Range(start, stop, step) = value {
                check_size(usize::try_from(range_len(*start, *stop, *step)).unwrap_or(usize::MAX))?;
            }
            let Value::Iter(state) = iterate(value)? else {
                return Err(ProgramError::runtime("iterator expected"));
            };
            let mut state = state.borrow_mut();
            let items: Vec<Value> =
                std::iter::from_fn(|| state.next_item()).take(MAX_SEQUENCE + 1).collect();
            check_size(items.len())?;
            Ok(items)
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "inf" } else { "-inf" }.to_string()
    } else if f == f.trunc() && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

fn join(items: &[Value], open: &str, close: &str, trailing_single: bool) -> String {
    let mut out = String::from(open);
    for (i, item) in items.iter().enumerate() {
        if out.len() > MAX_SEQUENCE {
            out.push_str(", ...");
            break;
        }
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&repr(item));
    }
    if trailing_single && items.len() == 1 {
        out.push(',');
    }
    out.push_str(close);
    out
}

/// `str(value)`.
#[must_use]
pub fn to_str(value: &Value) -> String {
    match value {
        Value::Str(s) => s.to_string(),
        Value::Exception(e) => match e.kind() {
            ErrorKind::GameAction(kind) => {
                format!("GameActionException of type {}: {}", kind.name(), e.message())
            }
            _ => e.message().to_string(),
        },
        Value::Direction(d) => d.name().to_string(),
        Value::Team(t) => t.name().to_string(),
        Value::UnitType(u) => u.name().to_string(),
        Value::TrapType(t) => t.name().to_string(),
        Value::ActionKind(k) => k.name().to_string(),
        Value::Location(loc) => loc.to_string(),
        Value::Message(m) => m.to_string(),
        other => repr(other),
    }
}

/// `repr(value)`.
#[must_use]
pub fn repr(value: &Value) -> String {
    match value {
        Value::None => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Str(s) => {
            let mut out = String::from("'");
            for c in s.chars() {
                match c {
                    '\'' => out.push_str("\\'"),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    '\t' => out.push_str("\\t"),
                    c => out.push(c),
                }
            }
            out.push('\'');
            out
        }
        Value::List(items) => join(&items.borrow(), "[", "]", false),
        Value::Tuple(items) => join(items, "(", ")", true),
        Value::Dict(dict) => {
            let mut out = String::from("{");
            for (i, (k, v)) in dict.borrow().entries().iter().enumerate() {
                if out.len() > MAX_SEQUENCE {
                    out.push_str(", ...");
                    break;
                }
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}: {}", repr(k), repr(v));
            }
            out.push('}');
            out
        }
        Value::Range(start, stop, 1) => format!("range({start}, {stop})"),
        Value::Range(start, stop, step) => format!("range({start}, {stop}, {step})"),
        Value::Iter(_) => "<iterator>".to_string(),
        Value::Code(code) => format!("<code object {}>", code.name),
        Value::Function(f) => format!("<function {}>", f.code.name),
        Value::Native(n) => format!("<built-in function {}>", n.name),
        Value::Bound(b) => format!("<bound method {} of {}>", b.name, repr(&b.receiver)),
        Value::Module(m) => format!("<module '{}'>", m.name),
        Value::Exception(e) => format!("{}({})", e.kind().name(), repr(&Value::str(e.message()))),
        Value::ExcClass(c) => format!("<class '{}'>", c.name()),
        Value::Type(t) => format!("<class '{}'>", t.name()),
        Value::Direction(d) => format!("Direction.{}", d.name()),
        Value::Team(t) => format!("Team.{}", t.name()),
        Value::Location(loc) => format!("MapLocation({}, {})", loc.x, loc.y),
        Value::UnitType(u) => format!("UnitType.{}", u.name()),
        Value::TrapType(t) => format!("TrapType.{}", t.name()),
        Value::ActionKind(k) => format!("GameActionExceptionType.{}", k.name()),
        Value::Robot(r) => format!(
            "RobotInfo(id={}, team={}, type={}, location={})",
            r.id,
            r.team.name(),
            r.unit_type.name(),
            r.location
        ),
        Value::Tile(t) => format!("MapInfo(location={})", t.location),
        Value::Message(m) => format!("Message(sender_id={}, round={})", m.sender_id, m.round),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{Direction, MapLocation};

    fn int(v: i64) -> Value {
        Value::Int(v)
    }

    #[test]
    fn test_floor_semantics() {
        assert!(matches!(binary(BinOp::FloorDiv, &int(-7), &int(2)), Ok(Value::Int(-4))));
        assert!(matches!(binary(BinOp::Mod, &int(-7), &int(2)), Ok(Value::Int(1))));
        assert!(matches!(binary(BinOp::Mod, &int(7), &int(-2)), Ok(Value::Int(-1))));
        assert!(matches!(binary(BinOp::TrueDiv, &int(7), &int(2)), Ok(Value::Float(f)) if f == 3.5));
        let err = binary(BinOp::FloorDiv, &int(1), &int(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ZeroDivision);
    }

    #[test]
    fn test_checked_integers() {
        let err = binary(BinOp::Mul, &int(i64::MAX), &int(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Overflow);
        assert!(matches!(binary(BinOp::Pow, &int(2), &int(10)), Ok(Value::Int(1024))));
        assert!(matches!(binary(BinOp::Shl, &int(1), &int(62)), Ok(Value::Int(_))));
        assert!(binary(BinOp::Shl, &int(1), &int(63)).is_err());
        assert!(matches!(negate(&int(i64::MIN)), Err(_)));
    }

    #[test]
    fn test_sequences() {
        let a = Value::list(vec![int(1)]);
        let b = binary(BinOp::Mul, &a, &int(3)).unwrap();
        assert_eq!(length(&b).unwrap(), 3);
        assert_eq!(repr(&Value::tuple(vec![int(1)])), "(1,)");
        assert_eq!(
            to_str(&binary(BinOp::Add, &Value::str("ab"), &Value::str("c")).unwrap()),
            "abc"
        );
        assert!(binary(BinOp::Add, &Value::str("a"), &int(1)).is_err());
    }

    #[test]
    fn test_sequence_growth_is_bounded() {
        let memory = |r: Result<Value, ProgramError>| r.unwrap_err().kind() == ErrorKind::Memory;
        let pair = Value::list(vec![int(1), int(2)]);
        assert!(memory(binary(BinOp::Mul, &pair, &int(1 << 62))));
        assert!(memory(binary(BinOp::Mul, &Value::str("x"), &int(1 << 44))));
        assert!(memory(binary(BinOp::Mul, &int(i64::MAX), &Value::tuple(vec![int(0)]))));
        let empty = binary(BinOp::Mul, &Value::str(""), &int(i64::MAX)).unwrap();
        assert_eq!(length(&empty).unwrap(), 0);
        let none = binary(BinOp::Mul, &Value::list(Vec::new()), &int(i64::MAX)).unwrap();
        assert_eq!(length(&none).unwrap(), 0);

        let half = Value::str("y".repeat(MAX_SEQUENCE / 2 + 1));
        assert!(memory(binary(BinOp::Add, &half, &half)));
        let huge = collect(&Value::Range(0, 1_000_000_000_000, 1)).unwrap_err();
        assert_eq!(huge.kind(), ErrorKind::Memory);
        assert_eq!(collect(&Value::Range(0, 1_000_000_000_000, 1 << 38)).unwrap().len(), 4);
    }

    #[test]
    fn test_comparisons_and_membership() {
        assert!(equals(&int(1), &Value::Float(1.0)));
        assert!(!identical(&int(1), &Value::Float(1.0)));
        assert_eq!(order(&Value::str("a"), &Value::str("b")).unwrap(), Ordering::Less);
        assert!(order(&Value::str("a"), &int(1)).is_err());
        assert!(contains(&Value::Range(0, 10, 3), &int(9)).unwrap());
        assert!(!contains(&Value::Range(0, 10, 3), &int(8)).unwrap());
        assert!(contains(&Value::str("hello"), &Value::str("ell")).unwrap());
    }

    #[test]
    fn test_indexing() {
        let items = Value::list(vec![int(1), int(2), int(3)]);
        assert!(matches!(get_item(&items, &int(-1)), Ok(Value::Int(3))));
        let err = get_item(&items, &int(3)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Index);
        assert!(matches!(get_item(&Value::Range(10, 0, -2), &int(2)), Ok(Value::Int(6))));
        assert_eq!(length(&Value::Range(10, 0, -3)).unwrap(), 4);
    }

    #[test]
    fn test_game_value_strings() {
        assert_eq!(to_str(&Value::Direction(Direction::North)), "NORTH");
        assert_eq!(to_str(&Value::Location(MapLocation::new(3, -1))), "[3, -1]");
        assert_eq!(repr(&Value::Location(MapLocation::new(3, -1))), "MapLocation(3, -1)");
        assert_eq!(repr(&Value::Float(2.0)), "2.0");
        assert_eq!(repr(&Value::Float(0.1)), "0.1");
    }
}
