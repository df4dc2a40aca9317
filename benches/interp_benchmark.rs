//! Benchmarks for the interpreter, plain and metered.

#![allow(missing_docs)] // Benchmark macros generate undocumented functions

use std::hint::black_box;
use std::rc::Rc;
use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use ratchet::bytecode::{CodeObject, assemble};
use ratchet::instrument::instrument;
use ratchet::vm::{Bare, BuiltinsBuilder, Interp, Meter, Namespace};

const LOOP: &str = "\
load_const 0
store_name i
top:
load_name i
load_const 10000
compare_op <
pop_jump_if_false done
load_name i
load_const 1
binary_op +
store_name i
jump top
done:
load_name i
return_value
";

fn bench_loop(c: &mut Criterion, name: &str, code: &Arc<CodeObject>) {
    let builtins = Rc::new(BuiltinsBuilder::standard().build());

    c.bench_function(name, |b| {
        b.iter(|| {
            let mut interp = Interp::new(
                Meter::new(i64::MAX),
                Rc::clone(&builtins),
                Rc::new(Bare),
                100,
            );
            let ns = Rc::new(Namespace::new());
            black_box(interp.exec(code, &ns)).is_ok()
        });
    });
}

fn bench_plain(c: &mut Criterion) {
    let code = Arc::new(assemble("bot", LOOP).unwrap_or_else(|e| panic!("{e}")));
    bench_loop(c, "loop_10k_plain", &code);
}

fn bench_metered(c: &mut Criterion) {
    let plain = assemble("bot", LOOP).unwrap_or_else(|e| panic!("{e}"));
    let code = Arc::new(instrument(&plain).unwrap_or_else(|e| panic!("{e}")));
    bench_loop(c, "loop_10k_metered", &code);
}

criterion_group!(benches, bench_plain, bench_metered);
criterion_main!(benches);
