//! Instrumented programs compute what the originals compute, and pay for it.
//!
//! Run with: cargo test --release metering

#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::rc::Rc;
use std::sync::Arc;

use proptest::prelude::*;

use ratchet::bytecode::{CodeObject, assemble};
use ratchet::instrument::{instrument, meter_sites};
use ratchet::vm::{Bare, BuiltinsBuilder, Interp, Meter, Namespace, Value, ops};

const BUDGET: i64 = 10_000_000;

/// Run a unit with the standard builtins; return its value and the budget used.
fn run(code: &CodeObject) -> (Value, i64) {
    let builtins = Rc::new(BuiltinsBuilder::standard().build());
    let mut interp = Interp::new(Meter::new(BUDGET), builtins, Rc::new(Bare), 100);
    let ns = Rc::new(Namespace::new());
    let value = interp.exec(&Arc::new(code.clone()), &ns).unwrap();
    (value, interp.meter.used())
}

/// Run `source` plain and instrumented and check both agree.
fn both(source: &str) -> (Value, i64) {
    let plain = assemble("bot", source).unwrap();
    let metered = instrument(&plain).unwrap();
    let (expected, unmetered_cost) = run(&plain);
    let (actual, cost) = run(&metered);
    assert_eq!(unmetered_cost, 0);
    assert!(
        ops::equals(&expected, &actual),
        "{} != {}",
        ops::repr(&expected),
        ops::repr(&actual)
    );
    (actual, cost)
}

fn while_sum(n: i64) -> String {
    format!(
        "\
load_const 0
store_name i
load_const 0
store_name acc
top:
load_name i
load_const {n}
compare_op <
pop_jump_if_false done
load_name acc
load_name i
binary_op +
store_name acc
load_name i
load_const 1
binary_op +
store_name i
jump top
done:
load_name acc
return_value
"
    )
}

const FOR_RANGE: &str = "\
load_const @total
make_function
store_name total
load_name total
load_const 25
call_function 1
return_value
.func total n
    load_const 0
    store_fast acc
    load_global range
    load_fast n
    call_function 1
    get_iter
next:
    for_iter done
    load_fast acc
    binary_op +
    store_fast acc
    jump next
done:
    load_fast acc
    return_value
.end
";

const HANDLER: &str = "\
load_const 0
store_name hits
load_global range
load_const 4
call_function 1
get_iter
next:
for_iter finished
store_name d
setup_except handler
load_const 12
load_name d
binary_op //
pop_top
pop_block
jump next
handler:
copy 1
load_global ZeroDivisionError
compare_op exc_match
pop_jump_if_false again
pop_top
load_name hits
load_const 1
binary_op +
store_name hits
jump next
again:
reraise
finished:
load_name hits
return_value
";

const KEYWORDS: &str = "\
load_const 2
build_tuple 1
load_const @f
make_function defaults
store_name f
load_name f
load_const 1
load_const 10
kw_names b
call_function 2
load_name f
load_const 3
load_const 4
load_const 5
call_function 3
build_list 2
return_value
.func f a b c
    load_fast a
    load_fast b
    binary_op -
    load_fast c
    binary_op *
    return_value
.end
";

const CONTAINERS: &str = "\
load_const 1
load_const 2
load_const 3
build_list 3
store_name xs
load_const 30
load_name xs
load_const 0
store_subscr
load_const \"k\"
load_name xs
build_map 1
store_name m
load_name m
load_const \"k\"
binary_subscr
load_const -1
binary_subscr
load_name xs
load_const 0
binary_subscr
binary_op +
return_value
";

#[test]
fn test_straight_line_cost_is_one_per_site() {
    let source = "load_const 1\nstore_name a\nload_const 2\nstore_name b\nload_name a\nload_name b\nbinary_op +\nreturn_value\n";
    let metered = instrument(&assemble("bot", source).unwrap()).unwrap();
    let sites = meter_sites(&metered).unwrap();
    assert!(sites > 0);
    let (value, cost) = run(&metered);
    assert!(matches!(value, Value::Int(3)));
    assert_eq!(cost, i64::try_from(sites).unwrap());
}

#[test]
fn test_for_loop_over_range() {
    let (value, cost) = both(FOR_RANGE);
    assert!(matches!(value, Value::Int(300)));
    assert!(cost > 25);
}

#[test]
fn test_handler_catches_inside_loop() {
    let (value, _) = both(HANDLER);
    assert!(matches!(value, Value::Int(1)));
}

#[test]
fn test_keyword_and_default_calls() {
    let (value, _) = both(KEYWORDS);
    assert_eq!(ops::repr(&value), "[-18, -5]");
}

#[test]
fn test_container_stores_and_subscripts() {
    let (value, _) = both(CONTAINERS);
    assert!(matches!(value, Value::Int(33)));
}

#[test]
fn test_nested_units_are_metered() {
    let plain = assemble("bot", FOR_RANGE).unwrap();
    let metered = instrument(&plain).unwrap();
    let inner = metered.find_nested("total").unwrap();
    assert!(meter_sites(inner).unwrap() > 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Loops compute the same sum and pay the same amount per iteration.
    #[test]
    fn prop_loop_cost_is_linear(n in 0i64..60) {
        let (value, cost) = both(&while_sum(n));
        prop_assert!(matches!(value, Value::Int(v) if v == n * (n - 1) / 2));

        let (_, base) = both(&while_sum(0));
        let (_, one) = both(&while_sum(1));
        prop_assert_eq!(cost - base, n * (one - base));
    }
}
