//! Runtime values.
//!
//! Values live on a single worker thread, so shared containers use `Rc` and
//! `RefCell`. Nothing here crosses threads; results that must leave the worker
//! are converted at the boundary.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::bytecode::CodeObject;
use crate::error::{ErrorKind, ProgramError};
use crate::game::{
    Direction, GameActionKind, MapInfo, MapLocation, Message, RobotInfo, Team, TrapType, UnitType,
};

use super::{Interp, Unwind, ops};

/// Signature of a native callable.
pub type NativeFn = dyn Fn(&mut Interp, Args) -> Result<Value, Unwind>;

/// Mutable name → value mapping backing module and frame scopes.
#[derive(Debug, Default)]
pub struct Namespace {
    slots: RefCell<HashMap<String, Value>>,
}

impl Namespace {
    /// Empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a binding.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Value> {
        self.slots.borrow().get(name).cloned()
    }

    /// Bind or rebind a name.
    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.slots.borrow_mut().insert(name.into(), value);
    }

    /// Remove a binding.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.slots.borrow_mut().remove(name)
    }

    /// Whether a name is bound.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.slots.borrow().contains_key(name)
    }

    /// Bound names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.slots.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of bindings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Whether nothing is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }
}

/// A function created by `make_function`.
pub struct Function {
    /// Body.
    pub code: Arc<CodeObject>,
    /// Module namespace the function was defined in.
    pub globals: Rc<Namespace>,
    /// Defaults for the trailing positional parameters.
    pub defaults: Vec<Value>,
}

// Globals usually hold the function itself.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.code.name)
            .field("defaults", &self.defaults.len())
            .finish_non_exhaustive()
    }
}

/// A callable implemented in Rust.
pub struct Native {
    /// Name shown in reprs and tracebacks.
    pub name: String,
    func: Box<NativeFn>,
}

impl Native {
    /// Wrap a closure as a callable value.
    pub fn value(
        name: impl Into<String>,
        func: impl Fn(&mut Interp, Args) -> Result<Value, Unwind> + 'static,
    ) -> Value {
        Value::Native(Rc::new(Self {
            name: name.into(),
            func: Box::new(func),
        }))
    }

    /// Invoke the callable.
    ///
    /// # Errors
    ///
    /// Whatever the wrapped closure returns.
    pub fn call(&self, interp: &mut Interp, args: Args) -> Result<Value, Unwind> {
        (self.func)(interp, args)
    }
}

impl fmt::Debug for Native {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Native").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A method looked up on a receiver, dispatched when called.
#[derive(Debug)]
pub struct Bound {
    /// Object the method was read from.
    pub receiver: Value,
    /// Method name.
    pub name: Rc<str>,
}

/// An imported module.
#[derive(Debug)]
pub struct Module {
    /// Import name.
    pub name: String,
    /// Module-level bindings.
    pub ns: Rc<Namespace>,
}

/// Exception classes visible to programs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExcClass {
    /// `Exception`: matches every program error.
    Base,
    /// `GameActionException`: matches every rejected game action.
    GameAction,
    /// One built-in error kind.
    Kind(ErrorKind),
}

impl ExcClass {
    /// Class name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Base => "Exception",
            Self::GameAction => "GameActionException",
            Self::Kind(kind) => kind.name(),
        }
    }

    /// Class of an error kind.
    #[must_use]
    pub const fn of(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::GameAction(_) => Self::GameAction,
            ErrorKind::Exception => Self::Base,
            other => Self::Kind(other),
        }
    }

    /// Whether an error is an instance of this class.
    #[must_use]
    pub fn matches(self, error: &ProgramError) -> bool {
        match self {
            Self::Base => true,
            Self::GameAction => matches!(error.kind(), ErrorKind::GameAction(_)),
            Self::Kind(kind) => error.kind() == kind,
        }
    }
}

/// Game types that can be called or have class-level attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeObject {
    /// `Direction`
    Direction,
    /// `Team`
    Team,
    /// `MapLocation`
    MapLocation,
    /// `UnitType`
    UnitType,
    /// `TrapType`
    TrapType,
    /// `GameActionExceptionType`
    GameActionExceptionType,
}

impl TypeObject {
    /// Class name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Direction => "Direction",
            Self::Team => "Team",
            Self::MapLocation => "MapLocation",
            Self::UnitType => "UnitType",
            Self::TrapType => "TrapType",
            Self::GameActionExceptionType => "GameActionExceptionType",
        }
    }
}

/// Iterator state behind an `Iter` value.
#[derive(Debug)]
pub enum IterState {
    /// Live view of a list; sees appends made during iteration.
    List(Rc<RefCell<Vec<Value>>>, usize),
    /// Snapshot of items.
    Items(Rc<[Value]>, usize),
    /// Arithmetic progression.
    Range {
        /// Next value.
        next: i64,
        /// Exclusive bound.
        stop: i64,
        /// Non-zero step.
        step: i64,
    },
}

impl IterState {
    /// Advance the iterator.
    pub fn next_item(&mut self) -> Option<Value> {
        match self {
            Self::List(items, index) => {
                let item = items.borrow().get(*index).cloned();
                *index += 1;
                item
            }
            Self::Items(items, index) => {
                let item = items.get(*index).cloned();
                *index += 1;
                item
            }
            Self::Range { next, stop, step } => {
                let live = if *step > 0 { *next < *stop } else { *next > *stop };
                if !live {
                    return None;
                }
                let item = *next;
                match next.checked_add(*step) {
                    Some(n) => *next = n,
                    None => *next = *stop,
                }
                Some(Value::Int(item))
            }
        }
    }
}

/// Insertion-ordered dictionary keyed by value equality.
#[derive(Debug, Default)]
pub struct Dict {
    entries: Vec<(Value, Value)>,
}

impl Dict {
    /// Empty dictionary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &Value) -> Option<usize> {
        self.entries.iter().position(|(k, _)| ops::equals(k, key))
    }

    /// Value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.entries[i].1.clone())
    }

    /// Insert or replace.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` for keys that cannot be hashed.
    pub fn insert(&mut self, key: Value, value: Value) -> Result<(), ProgramError> {
        if !key.is_hashable() {
            return Err(ProgramError::type_error(format!(
                "unhashable type: '{}'",
                key.type_name()
            )));
        }
        match self.position(&key) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((key, value)),
        }
        Ok(())
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &Value) -> Option<Value> {
        self.position(key).map(|i| self.entries.remove(i).1)
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains(&self, key: &Value) -> bool {
        self.position(key).is_some()
    }

    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[(Value, Value)] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// A program value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `None`
    #[default]
    None,
    /// `True` / `False`
    Bool(bool),
    /// 64-bit integer.
    Int(i64),
    /// Double.
    Float(f64),
    /// Immutable string.
    Str(Rc<str>),
    /// Mutable list.
    List(Rc<RefCell<Vec<Value>>>),
    /// Immutable tuple.
    Tuple(Rc<[Value]>),
    /// Mutable dictionary.
    Dict(Rc<RefCell<Dict>>),
    /// `range(start, stop, step)`
    Range(i64, i64, i64),
    /// Iterator.
    Iter(Rc<RefCell<IterState>>),
    /// Compiled unit loaded from a constant pool.
    Code(Arc<CodeObject>),
    /// Compiled function.
    Function(Rc<Function>),
    /// Native callable.
    Native(Rc<Native>),
    /// Method bound to a receiver.
    Bound(Rc<Bound>),
    /// Module.
    Module(Rc<Module>),
    /// Raised or constructed exception.
    Exception(Rc<ProgramError>),
    /// Exception class.
    ExcClass(ExcClass),
    /// Game type object.
    Type(TypeObject),
    /// Direction member.
    Direction(Direction),
    /// Team member.
    Team(Team),
    /// Map location.
    Location(MapLocation),
    /// Unit type member.
    UnitType(UnitType),
    /// Trap type member.
    TrapType(TrapType),
    /// Game action exception kind.
    ActionKind(GameActionKind),
    /// Sensed robot.
    Robot(Rc<RobotInfo>),
    /// Sensed tile.
    Tile(Rc<MapInfo>),
    /// Received message.
    Message(Rc<Message>),
}

impl Value {
    /// Build a string value.
    pub fn str(text: impl AsRef<str>) -> Self {
        Self::Str(Rc::from(text.as_ref()))
    }

    /// Build a list value.
    #[must_use]
    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    /// Build a tuple value.
    #[must_use]
    pub fn tuple(items: Vec<Value>) -> Self {
        Self::Tuple(Rc::from(items))
    }

    /// Build an iterator over a snapshot of items.
    #[must_use]
    pub fn iter_over(items: Vec<Value>) -> Self {
        Self::Iter(Rc::new(RefCell::new(IterState::Items(Rc::from(items), 0))))
    }

    /// Wrap an error as an exception value.
    #[must_use]
    pub fn exception(error: ProgramError) -> Self {
        Self::Exception(Rc::new(error))
    }

    /// Type name used in error messages.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Range(..) => "range",
            Self::Iter(_) => "iterator",
            Self::Code(_) => "code",
            Self::Function(_) => "function",
            Self::Native(_) => "builtin_function_or_method",
            Self::Bound(_) => "method",
            Self::Module(_) => "module",
            Self::Exception(e) => e.kind().name(),
            Self::ExcClass(_) | Self::Type(_) => "type",
            Self::Direction(_) => "Direction",
            Self::Team(_) => "Team",
            Self::Location(_) => "MapLocation",
            Self::UnitType(_) => "UnitType",
            Self::TrapType(_) => "TrapType",
            Self::ActionKind(_) => "GameActionExceptionType",
            Self::Robot(_) => "RobotInfo",
            Self::Tile(_) => "MapInfo",
            Self::Message(_) => "Message",
        }
    }

    /// Whether the value may be used as a dictionary key.
    #[must_use]
    pub fn is_hashable(&self) -> bool {
        match self {
            Self::List(_) | Self::Dict(_) | Self::Iter(_) | Self::Code(_) => false,
            Self::Tuple(items) => items.iter().all(Self::is_hashable),
            _ => true,
        }
    }

    /// Whether the value can be called.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Self::Function(_) | Self::Native(_) | Self::Bound(_) | Self::ExcClass(_) | Self::Type(_)
        )
    }

    /// Integer view; booleans count as integers.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` naming `what` for other values.
    pub fn as_int(&self, what: &str) -> Result<i64, ProgramError> {
        match self {
            Self::Int(i) => Ok(*i),
            Self::Bool(b) => Ok(i64::from(*b)),
            other => Err(ProgramError::type_error(format!(
                "{what} must be an int, not '{}'",
                other.type_name()
            ))),
        }
    }

    /// Float view of a number.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` naming `what` for non-numbers.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_float(&self, what: &str) -> Result<f64, ProgramError> {
        match self {
            Self::Float(f) => Ok(*f),
            Self::Int(i) => Ok(*i as f64),
            Self::Bool(b) => Ok(f64::from(u8::from(*b))),
            other => Err(ProgramError::type_error(format!(
                "{what} must be a number, not '{}'",
                other.type_name()
            ))),
        }
    }

    /// String view.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` naming `what` for non-strings.
    pub fn as_str(&self, what: &str) -> Result<Rc<str>, ProgramError> {
        match self {
            Self::Str(s) => Ok(Rc::clone(s)),
            other => Err(ProgramError::type_error(format!(
                "{what} must be a str, not '{}'",
                other.type_name()
            ))),
        }
    }

    /// Location view.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` naming `what` for other values.
    pub fn as_location(&self, what: &str) -> Result<MapLocation, ProgramError> {
        match self {
            Self::Location(loc) => Ok(*loc),
            other => Err(ProgramError::type_error(format!(
                "{what} must be a MapLocation, not '{}'",
                other.type_name()
            ))),
        }
    }

    /// Direction view.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` naming `what` for other values.
    pub fn as_direction(&self, what: &str) -> Result<Direction, ProgramError> {
        match self {
            Self::Direction(dir) => Ok(*dir),
            other => Err(ProgramError::type_error(format!(
                "{what} must be a Direction, not '{}'",
                other.type_name()
            ))),
        }
    }

    /// Coordinate view; locations are stored with `i32` components.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` for non-integers and an `OverflowError` when the
    /// value does not fit.
    pub fn as_coord(&self, what: &str) -> Result<i32, ProgramError> {
        let wide = self.as_int(what)?;
        i32::try_from(wide).map_err(|_| {
            ProgramError::new(ErrorKind::Overflow, format!("{what} out of range: {wide}"))
        })
    }
}

/// Arguments passed to a call.
#[derive(Debug, Default, Clone)]
pub struct Args {
    /// Positional arguments in order.
    pub positional: Vec<Value>,
    /// Keyword arguments in call order.
    pub keywords: Vec<(String, Value)>,
}

impl Args {
    /// Positional-only arguments.
    #[must_use]
    pub fn positional(values: Vec<Value>) -> Self {
        Self {
            positional: values,
            keywords: Vec::new(),
        }
    }

    /// Total number of arguments supplied.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    /// Whether no arguments were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bind arguments to named parameters.
    ///
    /// Positional arguments fill `params` in order, keywords by name. The
    /// first `required` parameters must be supplied.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` for surplus arguments, unknown or duplicate
    /// keywords, and missing required parameters.
    pub fn bind(
        self,
        func: &str,
        params: &[&str],
        required: usize,
    ) -> Result<Vec<Option<Value>>, ProgramError> {
        if self.positional.len() > params.len() {
            return Err(ProgramError::type_error(format!(
                "{func}() takes at most {} arguments ({} given)",
                params.len(),
                self.positional.len()
            )));
        }
        let mut slots: Vec<Option<Value>> = vec![None; params.len()];
        for (slot, value) in slots.iter_mut().zip(self.positional) {
            *slot = Some(value);
        }
        for (name, value) in self.keywords {
            let index = params.iter().position(|p| *p == name).ok_or_else(|| {
                ProgramError::type_error(format!(
                    "{func}() got an unexpected keyword argument '{name}'"
                ))
            })?;
            if slots[index].is_some() {
                return Err(ProgramError::type_error(format!(
                    "{func}() got multiple values for argument '{name}'"
                )));
            }
            slots[index] = Some(value);
        }
        if let Some(missing) = slots.iter().take(required).position(Option::is_none) {
            return Err(ProgramError::type_error(format!(
                "{func}() missing required argument '{}'",
                params[missing]
            )));
        }
        Ok(slots)
    }

    /// Bind exactly `N` required positional-or-keyword parameters.
    ///
    /// # Errors
    ///
    /// As [`Args::bind`].
    pub fn exact<const N: usize>(
        self,
        func: &str,
        params: [&str; N],
    ) -> Result<[Value; N], ProgramError> {
        let slots = self.bind(func, &params, N)?;
        let values: Vec<Value> = slots.into_iter().map(Option::unwrap_or_default).collect();
        values
            .try_into()
            .map_err(|_| ProgramError::runtime(format!("{func}(): argument binding failed")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_positional_and_keywords() {
        let args = Args {
            positional: vec![Value::Int(1)],
            keywords: vec![("c".to_string(), Value::Int(3))],
        };
        let slots = args.bind("f", &["a", "b", "c"], 1).unwrap();
        assert!(matches!(slots[0], Some(Value::Int(1))));
        assert!(slots[1].is_none());
        assert!(matches!(slots[2], Some(Value::Int(3))));
    }

    #[test]
    fn test_bind_rejects_bad_calls() {
        let err = Args::positional(vec![Value::None; 3])
            .bind("f", &["a"], 0)
            .unwrap_err();
        assert!(err.message().contains("at most 1"));

        let args = Args {
            positional: vec![Value::Int(1)],
            keywords: vec![("a".to_string(), Value::Int(2))],
        };
        assert!(args.bind("f", &["a"], 1).unwrap_err().message().contains("multiple"));

        let err = Args::default().bind("f", &["a"], 1).unwrap_err();
        assert_eq!(err.message(), "f() missing required argument 'a'");
    }

    #[test]
    fn test_dict_keys_by_value() {
        let mut dict = Dict::new();
        dict.insert(Value::Int(1), Value::str("one")).unwrap();
        dict.insert(Value::Float(1.0), Value::str("uno")).unwrap();
        assert_eq!(dict.len(), 1);
        assert!(matches!(dict.get(&Value::Bool(true)), Some(Value::Str(s)) if &*s == "uno"));
        assert!(dict.insert(Value::list(vec![]), Value::None).is_err());
        assert!(dict.remove(&Value::Int(1)).is_some());
        assert!(dict.is_empty());
    }

    #[test]
    fn test_range_iteration_steps() {
        let mut up = IterState::Range { next: 0, stop: 5, step: 2 };
        let mut seen = Vec::new();
        while let Some(Value::Int(i)) = up.next_item() {
            seen.push(i);
        }
        assert_eq!(seen, vec![0, 2, 4]);

        let mut down = IterState::Range { next: 3, stop: 0, step: -1 };
        assert_eq!(std::iter::from_fn(|| down.next_item()).count(), 3);
    }

    #[test]
    fn test_exception_class_matching() {
        let moved = ProgramError::new(
            ErrorKind::GameAction(GameActionKind::CantMoveThere),
            "blocked",
        );
        assert!(ExcClass::Base.matches(&moved));
        assert!(ExcClass::GameAction.matches(&moved));
        assert!(!ExcClass::Kind(ErrorKind::Value).matches(&moved));
    }
}
