//! Bytecode instrumenter.
//!
//! Rewrites a compiled unit so that executing it charges the budget meter.
//! Before (almost) every instruction the rewrite injects
//!
//! ```text
//! load_name __meter__
//! call_function 0
//! pop_top
//! ```
//!
//! The first instruction of a unit is never metered, and neither is an
//! instruction whose predecessor is on the exclusion list: those
//! predecessors either hand a value or pending state straight to the next
//! instruction (`kw_names` arms the following call) or mark a position the
//! interpreter expects to be immediately followed by its consumer. A
//! backward branch is always metered unless it follows `kw_names`, so every
//! loop charges at least once per iteration.
//!
//! The rewrite works on the structured [`Instruction`] list: jumps keep
//! pointing at the same instruction, and [`encode`] recomputes their operands
//! and `EXTENDED_ARG` prefixes. Source lines are carried by original
//! instructions only; injected words inherit the line of the original
//! instruction before them.

use std::fmt;
use std::sync::Arc;

use crate::bytecode::{
    CodeFlags, CodeObject, Const, DecodeError, Instruction, LayoutError, Opcode, decode, encode,
    linetable, lines_by_word,
};

/// Name the injected sequence loads. Resolved from the builtins at runtime.
pub const METER_NAME: &str = "__meter__";

/// Extra operand stack slots reserved for the metering call.
pub const METER_STACK_HEADROOM: u32 = 2;

/// Predecessors after which no metering call is injected.
pub const EXCLUDED_PREDECESSORS: [Opcode; 11] = [
    Opcode::Cache,
    Opcode::JumpForward,
    Opcode::PopJumpIfFalse,
    Opcode::PopJumpIfTrue,
    Opcode::LoadGlobal,
    Opcode::Copy,
    Opcode::LoadFast,
    Opcode::StoreFast,
    Opcode::KwNames,
    Opcode::ExtendedArg,
    Opcode::Resume,
];

/// Reasons a unit cannot be instrumented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstrumentError {
    /// An instruction jumps to itself.
    SelfJump {
        /// Unit name.
        unit: String,
        /// Source line of the jump.
        line: Option<u32>,
    },
    /// The unit has already been instrumented.
    AlreadyMetered {
        /// Unit name.
        unit: String,
    },
    /// The wordcode could not be decoded.
    Decode {
        /// Unit name.
        unit: String,
        /// Underlying error.
        source: DecodeError,
    },
    /// The rewritten list could not be laid out.
    Layout {
        /// Unit name.
        unit: String,
        /// Underlying error.
        source: LayoutError,
    },
    /// The name table would overflow the operand range.
    TooManyNames {
        /// Unit name.
        unit: String,
    },
}

impl fmt::Display for InstrumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SelfJump { unit, line: Some(line) } => {
                write!(f, "{unit}: instruction on line {line} jumps to itself")
            }
            Self::SelfJump { unit, line: None } => {
                write!(f, "{unit}: instruction jumps to itself")
            }
            Self::AlreadyMetered { unit } => write!(f, "{unit}: already instrumented"),
            Self::Decode { unit, source } => write!(f, "{unit}: {source}"),
            Self::Layout { unit, source } => write!(f, "{unit}: {source}"),
            Self::TooManyNames { unit } => write!(f, "{unit}: name table too large"),
        }
    }
}

impl std::error::Error for InstrumentError {}

fn needs_meter(index: usize, list: &[Instruction]) -> bool {
    if index == 0 {
        return false;
    }
    let ins = &list[index];
    if matches!(ins.op, Opcode::Cache | Opcode::ExtendedArg) {
        return false;
    }
    let previous = list[index - 1].op;
    if previous == Opcode::KwNames {
        return false;
    }
    if !EXCLUDED_PREDECESSORS.contains(&previous) {
        return true;
    }
    ins.target.is_some_and(|target| target <= index)
}

/// Instrument a unit and, first, every unit nested in its constant pool.
///
/// # Errors
///
/// Returns an error if any unit contains a self-jump, is already metered,
/// fails to decode, or cannot be laid out again.
pub fn instrument(code: &CodeObject) -> Result<CodeObject, InstrumentError> {
    if code.flags.contains(CodeFlags::METERED) {
        return Err(InstrumentError::AlreadyMetered {
            unit: code.name.clone(),
        });
    }

    let consts = code
        .consts
        .iter()
        .map(|c| match c {
            Const::Code(nested) => instrument(nested).map(|n| Const::Code(Arc::new(n))),
            other => Ok(other.clone()),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let original = decode(code).map_err(|source| InstrumentError::Decode {
        unit: code.name.clone(),
        source,
    })?;
    if let Some(ins) = original
        .iter()
        .enumerate()
        .find_map(|(i, ins)| (ins.target == Some(i)).then_some(ins))
    {
        return Err(InstrumentError::SelfJump {
            unit: code.name.clone(),
            line: ins.line,
        });
    }

    let mut names = code.names.clone();
    let meter = match names.iter().position(|n| n == METER_NAME) {
        Some(i) => i,
        None => {
            names.push(METER_NAME.to_string());
            names.len() - 1
        }
    };
    let meter = u32::try_from(meter).map_err(|_| InstrumentError::TooManyNames {
        unit: code.name.clone(),
    })?;

    let mut rewritten = Vec::with_capacity(original.len() * 4);
    let mut moved_to = Vec::with_capacity(original.len());
    for (index, ins) in original.iter().enumerate() {
        if needs_meter(index, &original) {
            let line = original[index - 1].line;
            for (op, arg) in [
                (Opcode::LoadName, meter),
                (Opcode::CallFunction, 0),
                (Opcode::PopTop, 0),
            ] {
                let mut injected = Instruction::new(op, arg);
                injected.original = false;
                injected.line = line;
                rewritten.push(injected);
            }
        }
        moved_to.push(rewritten.len());
        rewritten.push(ins.clone());
    }
    for ins in &mut rewritten {
        if let Some(target) = ins.target {
            ins.target = Some(moved_to[target]);
        }
    }

    let (words, _) = encode(&mut rewritten).map_err(|source| InstrumentError::Layout {
        unit: code.name.clone(),
        source,
    })?;
    let linetable = linetable::encode(code.first_line, &lines_by_word(&rewritten));

    Ok(CodeObject {
        name: code.name.clone(),
        filename: code.filename.clone(),
        first_line: code.first_line,
        argcount: code.argcount,
        varnames: code.varnames.clone(),
        names,
        consts,
        code: words,
        linetable,
        stacksize: code.stacksize + METER_STACK_HEADROOM,
        flags: code
            .flags
            .without(CodeFlags::OPTIMIZED)
            .with(CodeFlags::METERED),
    })
}

/// Number of metering sequences in a unit, excluding nested units.
///
/// # Errors
///
/// Returns an error if the unit fails to decode.
pub fn meter_sites(code: &CodeObject) -> Result<usize, DecodeError> {
    let Some(meter) = code.names.iter().position(|n| n == METER_NAME) else {
        return Ok(0);
    };
    let meter = u32::try_from(meter).unwrap_or(u32::MAX);
    Ok(decode(code)?
        .iter()
        .filter(|i| i.op == Opcode::LoadName && i.arg == meter)
        .count())
}
