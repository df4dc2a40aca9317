//! Standard modules a program may import: `math`, `random` and `enum`.
//!
//! Each call builds a fresh module, so two programs never share state such
//! as the random generator.

// Float results convert to integers for floor/ceil and index selection.
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

use std::cell::Cell;
use std::f64::consts;
use std::rc::Rc;

use crate::error::{ErrorKind, ProgramError};

use super::value::{Args, Module, Namespace, Native, Value};
use super::{Unwind, ops};

fn module(name: &str, ns: Namespace) -> Value {
    Value::Module(Rc::new(Module {
        name: name.to_string(),
        ns: Rc::new(ns),
    }))
}

fn unary(ns: &Namespace, name: &'static str, f: fn(f64) -> f64) {
    ns.set(
        name,
        Native::value(name, move |_, args| {
            let [x] = args.exact(name, ["x"])?;
            Ok(Value::Float(f(x.as_float("x")?)))
        }),
    );
}

fn float_to_int(x: f64) -> Result<Value, ProgramError> {
    if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(ProgramError::new(
            ErrorKind::Overflow,
            "cannot convert float to integer",
        ));
    }
    Ok(Value::Int(x as i64))
}

/// The `math` module.
#[must_use]
pub fn math_module() -> Value {
    let ns = Namespace::new();
    ns.set("pi", Value::Float(consts::PI));
    ns.set("e", Value::Float(consts::E));
    ns.set("tau", Value::Float(consts::TAU));
    ns.set("inf", Value::Float(f64::INFINITY));
    unary(&ns, "sin", f64::sin);
    unary(&ns, "cos", f64::cos);
    unary(&ns, "tan", f64::tan);
    unary(&ns, "atan", f64::atan);
    unary(&ns, "exp", f64::exp);
    unary(&ns, "fabs", f64::abs);
    ns.set(
        "sqrt",
        Native::value("sqrt", |_, args| {
            let [x] = args.exact("sqrt", ["x"])?;
            let x = x.as_float("x")?;
            if x < 0.0 {
                return Err(ProgramError::value_error("math domain error").into());
            }
            Ok(Value::Float(x.sqrt()))
        }),
    );
    ns.set(
        "floor",
        Native::value("floor", |_, args| match args.exact("floor", ["x"])? {
            [Value::Int(i)] => Ok(Value::Int(i)),
            [x] => Ok(float_to_int(x.as_float("x")?.floor())?),
        }),
    );
    ns.set(
        "ceil",
        Native::value("ceil", |_, args| match args.exact("ceil", ["x"])? {
            [Value::Int(i)] => Ok(Value::Int(i)),
            [x] => Ok(float_to_int(x.as_float("x")?.ceil())?),
        }),
    );
    ns.set(
        "atan2",
        Native::value("atan2", |_, args| {
            let [y, x] = args.exact("atan2", ["y", "x"])?;
            Ok(Value::Float(y.as_float("y")?.atan2(x.as_float("x")?)))
        }),
    );
    ns.set(
        "hypot",
        Native::value("hypot", |_, args| {
            let [x, y] = args.exact("hypot", ["x", "y"])?;
            Ok(Value::Float(x.as_float("x")?.hypot(y.as_float("y")?)))
        }),
    );
    ns.set(
        "log",
        Native::value("log", |_, args| {
            let slots = args.bind("log", &["x", "base"], 1)?;
            let mut slots = slots.into_iter();
            let x = slots.next().flatten().unwrap_or_default().as_float("x")?;
            if x <= 0.0 {
                return Err(ProgramError::value_error("math domain error").into());
            }
            Ok(Value::Float(match slots.next().flatten() {
                Some(base) => x.ln() / base.as_float("base")?.ln(),
                None => x.ln(),
            }))
        }),
    );
    ns.set(
        "isqrt",
        Native::value("isqrt", |_, args| {
            let [n] = args.exact("isqrt", ["n"])?;
            let n = n.as_int("n")?;
            if n < 0 {
                return Err(
                    ProgramError::value_error("isqrt() argument must be nonnegative").into(),
                );
            }
            let mut root = (n as f64).sqrt() as i64;
            while root.saturating_mul(root) > n {
                root -= 1;
            }
            while (root + 1).saturating_mul(root + 1) <= n {
                root += 1;
            }
            Ok(Value::Int(root))
        }),
    );
    module("math", ns)
}

/// Deterministic xorshift64 generator behind the `random` module.
#[derive(Debug, Clone, Copy)]
struct Rng {
    state: u64,
}

impl Rng {
    const fn new(seed: u64) -> Self {
        // xorshift never leaves the zero state
        let state = if seed == 0 { 0x5555_5555_5555_5555 } else { seed };
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Uniform float in [0, 1).
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform integer in [0, span).
    fn below(&mut self, span: u64) -> u64 {
        if span == 0 { 0 } else { self.next_u64() % span }
    }
}

type SharedRng = Rc<Cell<Rng>>;

fn draw<T>(rng: &SharedRng, f: impl FnOnce(&mut Rng) -> T) -> T {
    let mut state = rng.get();
    let out = f(&mut state);
    rng.set(state);
    out
}

/// Uniform integer in `[low, high]`.
fn pick_between(rng: &SharedRng, low: i64, high: i64) -> Result<i64, ProgramError> {
    if high < low {
        return Err(ProgramError::value_error(format!(
            "empty range in randint({low}, {high})"
        )));
    }
    let span = (i128::from(high) - i128::from(low) + 1) as u64;
    let offset = draw(rng, |r| r.below(span));
    Ok((i128::from(low) + i128::from(offset)) as i64)
}

fn rng_native(
    rng: &SharedRng,
    name: &'static str,
    f: impl Fn(&SharedRng, Args) -> Result<Value, Unwind> + 'static,
) -> Value {
    let rng = Rc::clone(rng);
    Native::value(name, move |_, args| f(&rng, args))
}

/// The `random` module, seeded with `seed`.
#[must_use]
pub fn random_module(seed: u64) -> Value {
    let rng: SharedRng = Rc::new(Cell::new(Rng::new(seed)));
    let ns = Namespace::new();
    ns.set(
        "random",
        rng_native(&rng, "random", |rng, args| {
            if !args.is_empty() {
                return Err(ProgramError::type_error("random() takes no arguments").into());
            }
            Ok(Value::Float(draw(rng, Rng::next_f64)))
        }),
    );
    ns.set(
        "uniform",
        rng_native(&rng, "uniform", |rng, args| {
            let [a, b] = args.exact("uniform", ["a", "b"])?;
            let (a, b) = (a.as_float("a")?, b.as_float("b")?);
            Ok(Value::Float(a + (b - a) * draw(rng, Rng::next_f64)))
        }),
    );
    ns.set(
        "randint",
        rng_native(&rng, "randint", |rng, args| {
            let [a, b] = args.exact("randint", ["a", "b"])?;
            Ok(Value::Int(pick_between(rng, a.as_int("a")?, b.as_int("b")?)?))
        }),
    );
    ns.set(
        "randrange",
        rng_native(&rng, "randrange", |rng, args| {
            let slots = args.bind("randrange", &["start", "stop"], 1)?;
            let bounds = slots
                .into_iter()
                .flatten()
                .map(|v| v.as_int("randrange() argument"))
                .collect::<Result<Vec<_>, _>>()?;
            let (start, stop) = match bounds[..] {
                [stop] => (0, stop),
                [start, stop] => (start, stop),
                _ => (0, 0),
            };
            if stop <= start {
                return Err(ProgramError::value_error(format!(
                    "empty range in randrange({start}, {stop})"
                ))
                .into());
            }
            Ok(Value::Int(pick_between(rng, start, stop - 1)?))
        }),
    );
    ns.set(
        "choice",
        rng_native(&rng, "choice", |rng, args| {
            let [seq] = args.exact("choice", ["seq"])?;
            let items = ops::collect(&seq)?;
            if items.is_empty() {
                return Err(ProgramError::new(
                    ErrorKind::Index,
                    "Cannot choose from an empty sequence",
                )
                .into());
            }
            let index = draw(rng, |r| r.below(items.len() as u64)) as usize;
            Ok(items[index].clone())
        }),
    );
    ns.set(
        "shuffle",
        rng_native(&rng, "shuffle", |rng, args| {
            let [list] = args.exact("shuffle", ["x"])?;
            let Value::List(items) = list else {
                return Err(ProgramError::type_error(format!(
                    "shuffle() argument must be a list, not '{}'",
                    list.type_name()
                ))
                .into());
            };
            let mut items = items.borrow_mut();
            for i in (1..items.len()).rev() {
                let j = draw(rng, |r| r.below(i as u64 + 1)) as usize;
                items.swap(i, j);
            }
            Ok(Value::None)
        }),
    );
    ns.set(
        "seed",
        rng_native(&rng, "seed", |rng, args| {
            let slots = args.bind("seed", &["a"], 0)?;
            let seed = match slots.into_iter().next().flatten() {
                Some(a) => a.as_int("a")? as u64,
                None => 0,
            };
            rng.set(Rng::new(seed));
            Ok(Value::None)
        }),
    );
    module("random", ns)
}

/// The `enum` module. `auto()` hands out 1, 2, 3, ... per module instance.
#[must_use]
pub fn enum_module() -> Value {
    let counter = Rc::new(Cell::new(0_i64));
    let ns = Namespace::new();
    ns.set(
        "auto",
        Native::value("auto", move |_, args| {
            if !args.is_empty() {
                return Err(ProgramError::type_error("auto() takes no arguments").into());
            }
            counter.set(counter.get() + 1);
            Ok(Value::Int(counter.get()))
        }),
    );
    module("enum", ns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{Bare, BuiltinsBuilder, Interp, Meter};

    fn call(module: &Value, name: &str, args: Vec<Value>) -> Result<Value, Unwind> {
        let Value::Module(module) = module else {
            panic!("not a module");
        };
        let func = module.ns.get(name).unwrap();
        let builtins = Rc::new(BuiltinsBuilder::new().build());
        let mut interp = Interp::new(Meter::new(100), builtins, Rc::new(Bare), 10);
        interp.call(&func, Args::positional(args))
    }

    #[test]
    fn test_math_functions() {
        let math = math_module();
        assert!(matches!(call(&math, "floor", vec![Value::Float(-1.5)]), Ok(Value::Int(-2))));
        assert!(matches!(call(&math, "ceil", vec![Value::Float(1.2)]), Ok(Value::Int(2))));
        assert!(matches!(call(&math, "isqrt", vec![Value::Int(17)]), Ok(Value::Int(4))));
        assert!(matches!(
            call(&math, "sqrt", vec![Value::Int(-1)]),
            Err(Unwind::Raise(e)) if e.kind() == ErrorKind::Value
        ));
    }

    #[test]
    fn test_random_is_seeded() {
        let draws = |seed| {
            let random = random_module(seed);
            (0..5)
                .map(|_| match call(&random, "randint", vec![Value::Int(1), Value::Int(6)]) {
                    Ok(Value::Int(i)) => i,
                    other => panic!("unexpected {other:?}"),
                })
                .collect::<Vec<_>>()
        };
        let first = draws(7);
        assert_eq!(first, draws(7));
        assert!(first.iter().all(|i| (1..=6).contains(i)));
    }

    #[test]
    fn test_random_choice_on_empty_sequence() {
        let random = random_module(1);
        let result = call(&random, "choice", vec![Value::list(Vec::new())]);
        assert!(matches!(result, Err(Unwind::Raise(e)) if e.kind() == ErrorKind::Index));
    }

    #[test]
    fn test_enum_auto_counts_from_one() {
        let module = enum_module();
        assert!(matches!(call(&module, "auto", vec![]), Ok(Value::Int(1))));
        assert!(matches!(call(&module, "auto", vec![]), Ok(Value::Int(2))));
    }
}
