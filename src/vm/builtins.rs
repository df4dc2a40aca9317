//! Builtin functions and exception classes.
//!
//! [`BuiltinsBuilder::standard`] returns the names every program sees. The
//! sandbox layers its own entries (`log`, the capability module's game
//! types) on top with [`BuiltinsBuilder::value`] and
//! [`BuiltinsBuilder::function`].

// Sort cost and `round` move between integers and floats.
#![allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use crate::bytecode::BinOp;
use crate::error::{ErrorKind, ProgramError};
use crate::instrument::METER_NAME;

use super::value::{Args, Dict, ExcClass, Namespace, Native, Value};
use super::{Interp, Unwind, ops};

/// Budget charged by each injected metering call.
pub const METER_COST: i64 = 1;

/// Assembles a builtins namespace.
#[derive(Debug, Default)]
pub struct BuiltinsBuilder {
    ns: Namespace,
}

impl BuiltinsBuilder {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard builtins, including the metering entry point.
    #[must_use]
    pub fn standard() -> Self {
        let mut builder = Self::new()
            .function(METER_NAME, |interp, _| {
                interp.meter.charge(METER_COST)?;
                Ok(Value::None)
            })
            .value("Exception", Value::ExcClass(ExcClass::Base));
        for kind in ErrorKind::NAMED {
            builder = builder.value(kind.name(), Value::ExcClass(ExcClass::of(kind)));
        }
        builder
            .function("len", |_, args| {
                let [value] = args.exact("len", ["obj"])?;
                Ok(Value::Int(ops::length(&value)?))
            })
            .function("range", |_, args| Ok(range(args)?))
            .function("abs", |_, args| {
                let [value] = args.exact("abs", ["x"])?;
                Ok(match value {
                    Value::Float(f) => Value::Float(f.abs()),
                    Value::Int(i) => Value::Int(
                        i.checked_abs()
                            .ok_or_else(|| ProgramError::new(ErrorKind::Overflow, "integer overflow"))?,
                    ),
                    other => Value::Int(other.as_int("abs() argument")?.abs()),
                })
            })
            .function("min", |interp, args| extreme(interp, args, "min", Ordering::Less))
            .function("max", |interp, args| extreme(interp, args, "max", Ordering::Greater))
            .function("int", |_, args| Ok(to_int(args)?))
            .function("float", |_, args| Ok(to_float(args)?))
            .function("str", |_, args| {
                let slots = args.bind("str", &["object"], 0)?;
                Ok(Value::str(
                    slots.into_iter().next().flatten().map(|v| ops::to_str(&v)).unwrap_or_default(),
                ))
            })
            .function("repr", |_, args| {
                let [value] = args.exact("repr", ["obj"])?;
                Ok(Value::str(ops::repr(&value)))
            })
            .function("bool", |_, args| {
                let slots = args.bind("bool", &["x"], 0)?;
                Ok(Value::Bool(slots.into_iter().next().flatten().is_some_and(|v| ops::truthy(&v))))
            })
            .function("list", |interp, args| {
                let slots = args.bind("list", &["iterable"], 0)?;
                Ok(Value::list(match slots.into_iter().next().flatten() {
                    Some(iterable) => gather(interp, &iterable)?,
                    None => Vec::new(),
                }))
            })
            .function("tuple", |interp, args| {
                let slots = args.bind("tuple", &["iterable"], 0)?;
                Ok(Value::tuple(match slots.into_iter().next().flatten() {
                    Some(iterable) => gather(interp, &iterable)?,
                    None => Vec::new(),
                }))
            })
            .function("dict", |_, args| Ok(to_dict(args)?))
            .function("enumerate", |interp, args| {
                let slots = args.bind("enumerate", &["iterable", "start"], 1)?;
                let mut slots = slots.into_iter();
                let items = gather(interp, &slots.next().flatten().unwrap_or_default())?;
                let start = match slots.next().flatten() {
                    Some(start) => start.as_int("start")?,
                    None => 0,
                };
                let pairs = (start..)
                    .zip(items)
                    .map(|(i, item)| Value::tuple(vec![Value::Int(i), item]))
                    .collect();
                Ok(Value::iter_over(pairs))
            })
            .function("zip", |interp, args| {
                if !args.keywords.is_empty() {
                    return Err(ProgramError::type_error("zip() takes no keyword arguments").into());
                }
                let columns = args
                    .positional
                    .iter()
                    .map(|iterable| gather(interp, iterable))
                    .collect::<Result<Vec<_>, _>>()?;
                let rows = columns.iter().map(Vec::len).min().unwrap_or(0);
                let zipped = (0..rows)
                    .map(|row| Value::tuple(columns.iter().map(|c| c[row].clone()).collect()))
                    .collect();
                Ok(Value::iter_over(zipped))
            })
            .function("reversed", |interp, args| {
                let [seq] = args.exact("reversed", ["sequence"])?;
                let mut items = gather(interp, &seq)?;
                items.reverse();
                Ok(Value::iter_over(items))
            })
            .function("sorted", |interp, args| {
                let slots = args.bind("sorted", &["iterable", "key", "reverse"], 1)?;
                let mut slots = slots.into_iter();
                let items = ops::collect(&slots.next().flatten().unwrap_or_default())?;
                let key = slots.next().flatten().filter(|k| !matches!(k, Value::None));
                let reverse = slots.next().flatten().is_some_and(|r| ops::truthy(&r));
                Ok(Value::list(sort_values(interp, items, key, reverse)?))
            })
            .function("sum", |interp, args| {
                let slots = args.bind("sum", &["iterable", "start"], 1)?;
                let mut slots = slots.into_iter();
                let iterable = slots.next().flatten().unwrap_or_default();
                let mut total = slots.next().flatten().unwrap_or(Value::Int(0));
                each(interp, &iterable, |_, item| {
                    total = ops::binary(BinOp::Add, &total, &item)?;
                    Ok(true)
                })?;
                Ok(total)
            })
            .function("any", |interp, args| {
                let [iterable] = args.exact("any", ["iterable"])?;
                let mut found = false;
                each(interp, &iterable, |_, item| {
                    found = ops::truthy(&item);
                    Ok(!found)
                })?;
                Ok(Value::Bool(found))
            })
            .function("all", |interp, args| {
                let [iterable] = args.exact("all", ["iterable"])?;
                let mut holds = true;
                each(interp, &iterable, |_, item| {
                    holds = ops::truthy(&item);
                    Ok(holds)
                })?;
                Ok(Value::Bool(holds))
            })
            .function("round", |_, args| Ok(round(args)?))
            .function("divmod", |_, args| {
                let [a, b] = args.exact("divmod", ["a", "b"])?;
                Ok(Value::tuple(vec![
                    ops::binary(BinOp::FloorDiv, &a, &b)?,
                    ops::binary(BinOp::Mod, &a, &b)?,
                ]))
            })
            .function("isinstance", |_, args| {
                let [value, class] = args.exact("isinstance", ["obj", "class_or_tuple"])?;
                Ok(Value::Bool(is_instance(&value, &class)?))
            })
            .function("iter", |_, args| {
                let [value] = args.exact("iter", ["object"])?;
                Ok(ops::iterate(&value)?)
            })
            .function("next", |_, args| {
                let slots = args.bind("next", &["iterator", "default"], 1)?;
                let mut slots = slots.into_iter();
                let iterator = slots.next().flatten().unwrap_or_default();
                let default = slots.next().flatten();
                let Value::Iter(state) = &iterator else {
                    return Err(ProgramError::type_error(format!(
                        "'{}' object is not an iterator",
                        iterator.type_name()
                    ))
                    .into());
                };
                let item = state.borrow_mut().next_item();
                item.or(default)
                    .ok_or_else(|| ProgramError::new(ErrorKind::Index, "iterator is exhausted").into())
            })
    }

    /// Add a native function.
    #[must_use]
    pub fn function(
        self,
        name: &str,
        func: impl Fn(&mut Interp, Args) -> Result<Value, Unwind> + 'static,
    ) -> Self {
        self.value(name, Native::value(name, func))
    }

    /// Add or replace a binding.
    #[must_use]
    pub fn value(self, name: &str, value: Value) -> Self {
        self.ns.set(name, value);
        self
    }

    /// Finish the namespace.
    #[must_use]
    pub fn build(self) -> Namespace {
        self.ns
    }
}

/// Instantiate an exception class with call arguments.
///
/// `GameActionException(type, message)` takes a kind and a message; every
/// other class takes an optional message.
///
/// # Errors
///
/// Returns a `TypeError` if the arguments do not fit the class.
pub fn build_exception(class: ExcClass, args: Args) -> Result<ProgramError, ProgramError> {
    match class {
        ExcClass::GameAction => {
            let [kind, message] = args.exact("GameActionException", ["type", "message"])?;
            let Value::ActionKind(kind) = kind else {
                return Err(ProgramError::type_error(format!(
                    "GameActionException type must be a GameActionExceptionType, not '{}'",
                    kind.type_name()
                )));
            };
            Ok(ProgramError::new(ErrorKind::GameAction(kind), ops::to_str(&message)))
        }
        ExcClass::Base | ExcClass::Kind(_) => {
            let kind = match class {
                ExcClass::Kind(kind) => kind,
                _ => ErrorKind::Exception,
            };
            let slots = args.bind(class.name(), &["message"], 0)?;
            let message = slots
                .into_iter()
                .next()
                .flatten()
                .map(|m| ops::to_str(&m))
                .unwrap_or_default();
            Ok(ProgramError::new(kind, message))
        }
    }
}

/// Visit the items of `iterable` one at a time, charging [`METER_COST`] per
/// item, until `visit` returns `false`.
///
/// # Errors
///
/// Returns a `TypeError` for non-iterables, or whatever `visit` or the meter
/// raise.
pub fn each(
    interp: &mut Interp,
    iterable: &Value,
    mut visit: impl FnMut(&mut Interp, Value) -> Result<bool, Unwind>,
) -> Result<(), Unwind> {
    let Value::Iter(state) = ops::iterate(iterable)? else {
        return Err(ProgramError::runtime("iterator expected").into());
    };
    loop {
        let item = state.borrow_mut().next_item();
        let Some(item) = item else {
            return Ok(());
        };
        interp.meter.charge(METER_COST)?;
        if !visit(interp, item)? {
            return Ok(());
        }
    }
}

/// Drain `iterable` through [`each`], failing past [`ops::MAX_SEQUENCE`] items.
///
/// # Errors
///
/// As [`each`], plus a `MemoryError` for oversized iterables.
pub fn gather(interp: &mut Interp, iterable: &Value) -> Result<Vec<Value>, Unwind> {
    if let Value::Range(..) = iterable {
        ops::check_size(usize::try_from(ops::length(iterable)?).unwrap_or(usize::MAX))?;
    }
    let mut items = Vec::new();
    each(interp, iterable, |_, item| {
        ops::check_size(items.len() + 1)?;
        items.push(item);
        Ok(true)
    })?;
    Ok(items)
}

/// Budget charged for sorting `n` items: `n * floor(ln n)`.
#[must_use]
pub fn sort_cost(n: usize) -> i64 {
    if n < 2 {
        return 0;
    }
    let n = n as f64;
    (n * n.ln().floor()) as i64
}

/// Sort `items` by value or by `key(item)`, charging [`sort_cost`] first.
///
/// The sort is stable; `reverse` keeps equal items in their original order.
///
/// # Errors
///
/// Returns a `TypeError` for unorderable items, or whatever `key` raises.
pub fn sort_values(
    interp: &mut Interp,
    items: Vec<Value>,
    key: Option<Value>,
    reverse: bool,
) -> Result<Vec<Value>, Unwind> {
    interp.meter.charge(sort_cost(items.len()))?;
    let keys = match &key {
        Some(func) => items
            .iter()
            .map(|item| interp.call(func, Args::positional(vec![item.clone()])))
            .collect::<Result<Vec<_>, _>>()?,
        None => items.clone(),
    };
    let mut order: Vec<usize> = (0..items.len()).collect();
    let failure = RefCell::new(None);
    order.sort_by(|&a, &b| {
        let (a, b) = if reverse { (b, a) } else { (a, b) };
        ops::order(&keys[a], &keys[b]).unwrap_or_else(|error| {
            failure.borrow_mut().get_or_insert(error);
            Ordering::Equal
        })
    });
    if let Some(error) = failure.into_inner() {
        return Err(error.into());
    }
    let mut slots: Vec<Option<Value>> = items.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

fn range(args: Args) -> Result<Value, ProgramError> {
    let slots = args.bind("range", &["start", "stop", "step"], 1)?;
    let ints = slots
        .into_iter()
        .flatten()
        .map(|v| v.as_int("range() argument"))
        .collect::<Result<Vec<_>, _>>()?;
    let (start, stop, step) = match ints[..] {
        [stop] => (0, stop, 1),
        [start, stop] => (start, stop, 1),
        [start, stop, step] => (start, stop, step),
        _ => return Err(ProgramError::type_error("range expected at most 3 arguments")),
    };
    if step == 0 {
        return Err(ProgramError::value_error("range() arg 3 must not be zero"));
    }
    Ok(Value::Range(start, stop, step))
}

fn extreme(interp: &mut Interp, args: Args, name: &str, wanted: Ordering) -> Result<Value, Unwind> {
    let mut key = None;
    let mut default = None;
    for (kw, value) in args.keywords {
        match kw.as_str() {
            "key" => key = Some(value).filter(|k| !matches!(k, Value::None)),
            "default" => default = Some(value),
            other => {
                return Err(ProgramError::type_error(format!(
                    "{name}() got an unexpected keyword argument '{other}'"
                ))
                .into());
            }
        }
    }
    let mut best: Option<(Value, Value)> = None;
    let mut consider = |interp: &mut Interp, item: Value| -> Result<bool, Unwind> {
        let rank = match &key {
            Some(func) => interp.call(func, Args::positional(vec![item.clone()]))?,
            None => item.clone(),
        };
        let replace = match &best {
            None => true,
            Some((best_rank, _)) => ops::order(&rank, best_rank)? == wanted,
        };
        if replace {
            best = Some((rank, item));
        }
        Ok(true)
    };
    match &args.positional[..] {
        [] => {
            return Err(ProgramError::type_error(format!(
                "{name} expected at least 1 argument, got 0"
            ))
            .into());
        }
        [iterable] => each(interp, iterable, &mut consider)?,
        many => {
            for item in many {
                consider(interp, item.clone())?;
            }
        }
    }
    match (best, default) {
        (Some((_, item)), _) => Ok(item),
        (None, Some(default)) => Ok(default),
        (None, None) => {
            Err(ProgramError::value_error(format!("{name}() arg is an empty sequence")).into())
        }
    }
}

fn to_int(args: Args) -> Result<Value, ProgramError> {
    let slots = args.bind("int", &["x"], 0)?;
    let Some(value) = slots.into_iter().next().flatten() else {
        return Ok(Value::Int(0));
    };
    match value {
        Value::Int(i) => Ok(Value::Int(i)),
        Value::Bool(b) => Ok(Value::Int(i64::from(b))),
        Value::Float(f) => {
            if !f.is_finite() {
                return Err(ProgramError::new(
                    ErrorKind::Overflow,
                    "cannot convert float infinity or NaN to integer",
                ));
            }
            let truncated = f.trunc();
            if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
                return Err(ProgramError::new(ErrorKind::Overflow, "integer overflow"));
            }
            Ok(Value::Int(truncated as i64))
        }
        Value::Str(s) => s.trim().replace('_', "").parse::<i64>().map(Value::Int).map_err(|_| {
            ProgramError::value_error(format!(
                "invalid literal for int() with base 10: {}",
                ops::repr(&Value::Str(Rc::clone(&s)))
            ))
        }),
        other => Err(ProgramError::type_error(format!(
            "int() argument must be a string or a number, not '{}'",
            other.type_name()
        ))),
    }
}

fn to_float(args: Args) -> Result<Value, ProgramError> {
    let slots = args.bind("float", &["x"], 0)?;
    let Some(value) = slots.into_iter().next().flatten() else {
        return Ok(Value::Float(0.0));
    };
    match value {
        Value::Str(s) => {
            let text = s.trim().to_ascii_lowercase();
            let parsed = match text.as_str() {
                "inf" | "+inf" | "infinity" => Ok(f64::INFINITY),
                "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
                _ => text.parse::<f64>(),
            };
            parsed.map(Value::Float).map_err(|_| {
                ProgramError::value_error(format!(
                    "could not convert string to float: {}",
                    ops::repr(&Value::Str(Rc::clone(&s)))
                ))
            })
        }
        other => Ok(Value::Float(other.as_float("float() argument")?)),
    }
}

fn to_dict(args: Args) -> Result<Value, ProgramError> {
    let mut dict = Dict::new();
    if let Some(source) = args.positional.first() {
        if let Value::Dict(other) = source {
            for (k, v) in other.borrow().entries() {
                dict.insert(k.clone(), v.clone())?;
            }
        } else {
            for pair in ops::collect(source)? {
                let [k, v]: [Value; 2] = ops::collect(&pair)?.try_into().map_err(|_| {
                    ProgramError::value_error("dictionary update sequence element has wrong length")
                })?;
                dict.insert(k, v)?;
            }
        }
    }
    for (name, value) in args.keywords {
        dict.insert(Value::str(name), value)?;
    }
    Ok(Value::Dict(Rc::new(RefCell::new(dict))))
}

fn round(args: Args) -> Result<Value, ProgramError> {
    let slots = args.bind("round", &["number", "ndigits"], 1)?;
    let mut slots = slots.into_iter();
    let number = slots.next().flatten().unwrap_or_default();
    let digits = slots.next().flatten().filter(|d| !matches!(d, Value::None));
    if let Value::Int(i) = number
        && digits.is_none()
    {
        return Ok(Value::Int(i));
    }
    let x = number.as_float("round() argument")?;
    match digits {
        None => to_int(Args::positional(vec![Value::Float(x.round_ties_even())])),
        Some(digits) => {
            let digits = i32::try_from(digits.as_int("ndigits")?)
                .map_err(|_| ProgramError::new(ErrorKind::Overflow, "ndigits out of range"))?;
            let scale = 10f64.powi(digits);
            Ok(Value::Float((x * scale).round_ties_even() / scale))
        }
    }
}

fn is_instance(value: &Value, class: &Value) -> Result<bool, ProgramError> {
    match class {
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if is_instance(value, class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::ExcClass(class) => Ok(matches!(value, Value::Exception(e) if class.matches(e))),
        Value::Type(ty) => Ok(value.type_name() == ty.name()),
        Value::Native(native) => Ok(match native.name.as_str() {
            "int" => matches!(value, Value::Int(_) | Value::Bool(_)),
            "float" => matches!(value, Value::Float(_)),
            "str" => matches!(value, Value::Str(_)),
            "bool" => matches!(value, Value::Bool(_)),
            "list" => matches!(value, Value::List(_)),
            "tuple" => matches!(value, Value::Tuple(_)),
            "dict" => matches!(value, Value::Dict(_)),
            "range" => matches!(value, Value::Range(..)),
            _ => false,
        }),
        other => Err(ProgramError::type_error(format!(
            "isinstance() arg 2 must be a type or tuple of types, not '{}'",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{Bare, Meter};

    fn interp(limit: i64) -> Interp {
        let builtins = Rc::new(BuiltinsBuilder::standard().build());
        Interp::new(Meter::new(limit), builtins, Rc::new(Bare), 20)
    }

    fn call(interp: &mut Interp, name: &str, args: Vec<Value>) -> Result<Value, Unwind> {
        let func = interp.builtins().get(name).unwrap();
        interp.call(&func, Args::positional(args))
    }

    fn ints(value: &Value) -> Vec<i64> {
        ops::collect(value)
            .unwrap()
            .iter()
            .map(|v| v.as_int("item").unwrap())
            .collect()
    }

    #[test]
    fn test_sort_cost() {
        assert_eq!(sort_cost(0), 0);
        assert_eq!(sort_cost(1), 0);
        assert_eq!(sort_cost(2), 0);
        assert_eq!(sort_cost(3), 3);
        assert_eq!(sort_cost(100), 400);
    }

    #[test]
    fn test_sorted_charges_the_meter() {
        let mut interp = interp(10_000);
        let items = Value::list((0..100).rev().map(Value::Int).collect());
        let sorted = call(&mut interp, "sorted", vec![items]).unwrap();
        assert_eq!(ints(&sorted), (0..100).collect::<Vec<_>>());
        assert_eq!(interp.meter.used(), 400);
    }

    #[test]
    fn test_sorted_reverse_is_stable() {
        let mut interp = interp(10_000);
        let pairs = Value::list(vec![
            Value::tuple(vec![Value::Int(1), Value::str("a")]),
            Value::tuple(vec![Value::Int(2), Value::str("b")]),
            Value::tuple(vec![Value::Int(1), Value::str("c")]),
        ]);
        let first = Native::value("first", |_, args| {
            let [pair] = args.exact("first", ["pair"])?;
            Ok(ops::get_item(&pair, &Value::Int(0))?)
        });
        let sorted_fn = interp.builtins().get("sorted").unwrap();
        let sorted = interp
            .call(
                &sorted_fn,
                Args {
                    positional: vec![pairs],
                    keywords: vec![
                        ("key".to_string(), first),
                        ("reverse".to_string(), Value::Bool(true)),
                    ],
                },
            )
            .unwrap();
        assert_eq!(ops::repr(&sorted), "[(2, 'b'), (1, 'a'), (1, 'c')]");
    }

    #[test]
    fn test_sorting_mixed_types_fails() {
        let mut interp = interp(10_000);
        let items = Value::list(vec![Value::Int(1), Value::str("x")]);
        let Err(Unwind::Raise(error)) = call(&mut interp, "sorted", vec![items]) else {
            panic!("expected a TypeError");
        };
        assert_eq!(error.kind(), ErrorKind::Type);
    }

    #[test]
    fn test_min_max_and_conversions() {
        let mut interp = interp(100);
        let max = call(&mut interp, "max", vec![Value::Int(3), Value::Int(9), Value::Int(4)]);
        assert!(matches!(max, Ok(Value::Int(9))));
        let empty = call(&mut interp, "min", vec![Value::list(Vec::new())]);
        assert!(matches!(empty, Err(Unwind::Raise(e)) if e.kind() == ErrorKind::Value));
        assert!(matches!(
            call(&mut interp, "int", vec![Value::Float(-2.7)]),
            Ok(Value::Int(-2))
        ));
        assert!(matches!(
            call(&mut interp, "round", vec![Value::Float(2.5)]),
            Ok(Value::Int(2))
        ));
        assert!(matches!(
            call(&mut interp, "int", vec![Value::str("x1")]),
            Err(Unwind::Raise(e)) if e.kind() == ErrorKind::Value
        ));
    }

    #[test]
    fn test_exception_construction() {
        let error = build_exception(
            ExcClass::Kind(ErrorKind::Value),
            Args::positional(vec![Value::str("bad")]),
        )
        .unwrap();
        assert_eq!(error.kind(), ErrorKind::Value);
        assert_eq!(error.message(), "bad");
        assert!(build_exception(ExcClass::GameAction, Args::default()).is_err());
    }
}
