//! Interpreter for compiled units.
//!
//! The interpreter executes wordcode directly from [`CodeObject`]s. It knows
//! nothing about sandboxing or the remote authority: policy enters through the
//! [`Host`] trait and budget exhaustion through the [`Suspend`] hook on the
//! [`Meter`]. A suspended program simply blocks inside the metering call, so
//! its whole call stack is preserved by the worker thread that runs it.
//!
//! [`CodeObject`]: crate::bytecode::CodeObject

mod attrs;
pub mod builtins;
mod interp;
mod modules;
pub mod ops;
mod value;

pub use builtins::BuiltinsBuilder;
pub use interp::Interp;
pub use modules::{enum_module, math_module, random_module};
pub use value::{
    Args, Bound, Dict, ExcClass, Function, IterState, Module, Namespace, Native, NativeFn,
    TypeObject, Value,
};

use crate::bytecode::BinOp;
use crate::error::ProgramError;
use crate::transport::TransportError;

/// Why execution stopped early.
#[derive(Debug)]
pub enum Unwind {
    /// A program-level error; `setup_except` handlers may catch it.
    Raise(ProgramError),
    /// The scheduler killed the program while it was suspended.
    Killed,
    /// A capability call lost its connection to the remote authority.
    Transport(TransportError),
}

impl From<ProgramError> for Unwind {
    fn from(error: ProgramError) -> Self {
        Self::Raise(error)
    }
}

impl From<TransportError> for Unwind {
    fn from(error: TransportError) -> Self {
        Self::Transport(error)
    }
}

/// Policy hooks consulted by the interpreter.
///
/// Every method has a permissive default; [`Bare`] uses them all.
pub trait Host {
    /// Called before an attribute is read or written, and by `import_from`.
    ///
    /// # Errors
    ///
    /// Returns the error to raise in the program.
    fn check_attr(&self, _name: &str) -> Result<(), ProgramError> {
        Ok(())
    }

    /// Called before a subscript is read or written.
    ///
    /// # Errors
    ///
    /// Returns the error to raise in the program.
    fn check_item(&self, _key: &Value) -> Result<(), ProgramError> {
        Ok(())
    }

    /// Called with the object about to receive an attribute or item store.
    ///
    /// # Errors
    ///
    /// Returns the error to raise in the program.
    fn check_store(&self, _target: &Value) -> Result<(), ProgramError> {
        Ok(())
    }

    /// Called before a name is read with `load_name` or `load_global`, and
    /// with each local of a function being created.
    ///
    /// # Errors
    ///
    /// Returns the error to raise in the program.
    fn check_name(&self, _name: &str) -> Result<(), ProgramError> {
        Ok(())
    }

    /// Called before a name is bound with `store_name` or `store_global`.
    ///
    /// # Errors
    ///
    /// Returns the error to raise in the program.
    fn check_binding(&self, _name: &str) -> Result<(), ProgramError> {
        Ok(())
    }

    /// Called before an `inplace_op`.
    ///
    /// # Errors
    ///
    /// Returns the error to raise in the program.
    fn check_inplace(&self, _op: BinOp) -> Result<(), ProgramError> {
        Ok(())
    }

    /// Resolve `import_name`. `importer` is the bundle module doing the import.
    ///
    /// # Errors
    ///
    /// Returns an `ImportError` or whatever running the imported module raised.
    fn import(&self, _interp: &mut Interp, _importer: &str, name: &str) -> Result<Value, Unwind> {
        Err(ProgramError::import(format!("Module \"{name}\" does not exist.")).into())
    }
}

/// Host with no restrictions and no importable modules.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bare;

impl Host for Bare {}

/// Hook invoked when the meter runs out.
pub trait Suspend {
    /// Park the program until it may continue.
    ///
    /// Returns the budget to continue with.
    ///
    /// # Errors
    ///
    /// Returns [`Unwind::Killed`] if the program must stop instead.
    fn suspend(&mut self, remaining: i64) -> Result<i64, Unwind>;
}

/// Per-instance budget counter.
pub struct Meter {
    remaining: i64,
    limit: i64,
    suspender: Option<Box<dyn Suspend>>,
}

impl std::fmt::Debug for Meter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Meter")
            .field("remaining", &self.remaining)
            .field("limit", &self.limit)
            .field("suspends", &self.suspender.is_some())
            .finish()
    }
}

impl Meter {
    /// Meter that only counts; running out never suspends.
    #[must_use]
    pub fn new(limit: i64) -> Self {
        Self {
            remaining: limit,
            limit,
            suspender: None,
        }
    }

    /// Meter that calls `suspender` whenever the budget reaches zero.
    #[must_use]
    pub fn suspending(limit: i64, suspender: Box<dyn Suspend>) -> Self {
        Self {
            remaining: limit,
            limit,
            suspender: Some(suspender),
        }
    }

    /// Start a new turn with a fresh budget.
    pub fn reset(&mut self, limit: i64) {
        self.remaining = limit;
        self.limit = limit;
    }

    /// Budget left this turn. Negative after an expensive call overshoots.
    #[must_use]
    pub const fn remaining(&self) -> i64 {
        self.remaining
    }

    /// Budget the current turn started with.
    #[must_use]
    pub const fn limit(&self) -> i64 {
        self.limit
    }

    /// Budget consumed this turn.
    #[must_use]
    pub const fn used(&self) -> i64 {
        self.limit.saturating_sub(self.remaining)
    }

    /// Charge `cost` units, suspending if the budget is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates [`Unwind::Killed`] from the suspend hook.
    pub fn charge(&mut self, cost: i64) -> Result<(), Unwind> {
        self.remaining = self.remaining.saturating_sub(cost);
        if self.remaining <= 0
            && let Some(suspender) = self.suspender.as_mut()
        {
            let limit = suspender.suspend(self.remaining)?;
            self.reset(limit);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Refill(Vec<i64>);

    impl Suspend for Refill {
        fn suspend(&mut self, remaining: i64) -> Result<i64, Unwind> {
            self.0.push(remaining);
            if self.0.len() > 1 { Err(Unwind::Killed) } else { Ok(5) }
        }
    }

    #[test]
    fn test_counting_meter_goes_negative() {
        let mut meter = Meter::new(2);
        for _ in 0..3 {
            meter.charge(1).unwrap();
        }
        assert_eq!(meter.remaining(), -1);
        assert_eq!(meter.used(), 3);
    }

    #[test]
    fn test_suspending_meter_refills() {
        let mut meter = Meter::suspending(3, Box::new(Refill(Vec::new())));
        meter.charge(2).unwrap();
        meter.charge(4).unwrap();
        assert_eq!(meter.limit(), 5);
        assert_eq!(meter.remaining(), 5);
        assert!(matches!(meter.charge(5), Err(Unwind::Killed)));
    }
}
