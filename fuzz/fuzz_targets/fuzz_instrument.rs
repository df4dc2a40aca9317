#![no_main]

use std::fmt::Write;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ratchet::bytecode::{assemble, decode, disassemble};
use ratchet::instrument::{instrument, meter_sites};

/// One line of a generated module body.
#[derive(Arbitrary, Debug)]
enum Line {
    LoadConst(i16),
    LoadName(u8),
    StoreName(u8),
    Binary(u8),
    Compare(u8),
    Jump(u8),
    JumpIfFalse(u8),
    Label(u8),
    Copy(u8),
    PopTop,
    Nop,
    Return,
}

const OPS: [&str; 6] = ["+", "-", "*", "//", "%", "&"];
const CMPS: [&str; 6] = ["<", "<=", "==", "!=", ">", ">="];

fn render(lines: &[Line]) -> String {
    let mut src = String::new();
    for line in lines {
        let _ = match line {
            Line::LoadConst(v) => writeln!(src, "load_const {v}"),
            Line::LoadName(n) => writeln!(src, "load_name n{}", n % 4),
            Line::StoreName(n) => writeln!(src, "store_name n{}", n % 4),
            Line::Binary(op) => writeln!(src, "binary_op {}", OPS[usize::from(*op) % OPS.len()]),
            Line::Compare(op) => writeln!(src, "compare_op {}", CMPS[usize::from(*op) % CMPS.len()]),
            Line::Jump(l) => writeln!(src, "jump l{}", l % 4),
            Line::JumpIfFalse(l) => writeln!(src, "pop_jump_if_false l{}", l % 4),
            Line::Label(l) => writeln!(src, "l{}:", l % 4),
            Line::Copy(d) => writeln!(src, "copy {}", d % 3 + 1),
            Line::PopTop => writeln!(src, "pop_top"),
            Line::Nop => writeln!(src, "nop"),
            Line::Return => writeln!(src, "return_value"),
        };
    }
    src
}

fuzz_target!(|lines: Vec<Line>| {
    let src = render(&lines);
    let Ok(code) = assemble("bot", &src) else {
        return;
    };
    let Ok(metered) = instrument(&code) else {
        return;
    };
    let plain = decode(&code).expect("assembled code decodes");
    let rewritten = decode(&metered).expect("instrumented code decodes");
    let sites = meter_sites(&metered).expect("instrumented code decodes");
    assert_eq!(rewritten.len(), plain.len() + 3 * sites);
    assert!(disassemble(&metered).is_ok());
});
