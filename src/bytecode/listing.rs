//! Structured instruction lists.
//!
//! [`decode`] turns wordcode into one [`Instruction`] per logical instruction,
//! folding `EXTENDED_ARG` prefixes and inline caches into their owner and
//! resolving every jump to the index of its target. [`encode`] lays a list
//! back out, recomputing jump operands until no operand needs a wider prefix.

use std::fmt::Write as _;

use super::linetable;
use super::opcode::{BinOp, CmpOp, JumpKind, Opcode};
use super::{CodeObject, Const, DecodeError};

/// One logical instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    /// Opcode.
    pub op: Opcode,
    /// Full-width operand. For jumps this is recomputed on encode.
    pub arg: u32,
    /// Index of the jump target within the same list.
    pub target: Option<usize>,
    /// Present in the input unit rather than injected.
    pub original: bool,
    /// Number of `EXTENDED_ARG` words emitted before the instruction.
    pub prefix: u8,
    /// Source line.
    pub line: Option<u32>,
}

impl Instruction {
    /// A non-jump instruction.
    #[must_use]
    pub const fn new(op: Opcode, arg: u32) -> Self {
        Self {
            op,
            arg,
            target: None,
            original: true,
            prefix: 0,
            line: None,
        }
    }

    /// A jump to the instruction at `target`.
    #[must_use]
    pub const fn jump(op: Opcode, target: usize) -> Self {
        Self {
            op,
            arg: 0,
            target: Some(target),
            original: true,
            prefix: 0,
            line: None,
        }
    }

    /// Words occupied, including prefixes and caches.
    #[must_use]
    pub fn size(&self) -> usize {
        usize::from(self.prefix) + 1 + self.op.caches()
    }
}

/// Number of `EXTENDED_ARG` prefixes needed to carry `arg`.
#[must_use]
pub const fn prefix_for(arg: u32) -> u8 {
    match arg {
        0..=0xFF => 0,
        0x100..=0xFFFF => 1,
        0x1_0000..=0xFF_FFFF => 2,
        _ => 3,
    }
}

/// Decode a unit's wordcode.
///
/// # Errors
///
/// Returns an error for unknown opcodes, missing cache words, dangling
/// prefixes, jumps that do not land on an instruction boundary, or a
/// malformed line table.
pub fn decode(code: &CodeObject) -> Result<Vec<Instruction>, DecodeError> {
    if code.code.len() % 2 != 0 {
        return Err(DecodeError::OddLength);
    }
    let words: Vec<(u8, u8)> = code.code.chunks_exact(2).map(|w| (w[0], w[1])).collect();
    let lines = linetable::decode(code.first_line, &code.linetable)?;

    let mut instructions = Vec::new();
    let mut starts = Vec::new();
    let mut ends = Vec::new();
    let mut index_of_word = vec![None; words.len()];

    let mut i = 0;
    while i < words.len() {
        let start = i;
        let mut arg = 0u32;
        let mut prefix = 0u8;
        let op = loop {
            let &(byte, operand) = words.get(i).ok_or(DecodeError::DanglingPrefix)?;
            let op = Opcode::from_byte(byte).ok_or(DecodeError::UnknownOpcode { word: i, byte })?;
            arg = (arg << 8) | u32::from(operand);
            i += 1;
            if op != Opcode::ExtendedArg {
                break op;
            }
            prefix = prefix.saturating_add(1);
        };
        let line = lines.get(i - 1).copied().flatten();
        for _ in 0..op.caches() {
            match words.get(i) {
                Some(&(byte, _)) if byte == Opcode::Cache.byte() => i += 1,
                _ => return Err(DecodeError::MissingCache { word: start }),
            }
        }
        index_of_word[start] = Some(instructions.len());
        starts.push(start);
        ends.push(i);
        instructions.push(Instruction {
            op,
            arg: if op.has_arg() { arg } else { 0 },
            target: None,
            original: true,
            prefix,
            line,
        });
    }

    for (idx, ins) in instructions.iter_mut().enumerate() {
        let Some(kind) = ins.op.jump_kind() else {
            continue;
        };
        let end = i64::try_from(ends[idx]).unwrap_or(i64::MAX);
        let target = match kind {
            JumpKind::Absolute => i64::from(ins.arg),
            JumpKind::Forward => end + i64::from(ins.arg),
            JumpKind::Backward => end - i64::from(ins.arg),
        };
        let resolved = usize::try_from(target)
            .ok()
            .and_then(|t| index_of_word.get(t).copied().flatten());
        match resolved {
            Some(t) => ins.target = Some(t),
            None => {
                return Err(DecodeError::BadJumpTarget {
                    word: starts[idx],
                    target,
                });
            }
        }
    }

    Ok(instructions)
}

/// Errors laying out an instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutError {
    /// A jump has no resolved target.
    MissingTarget {
        /// Instruction index.
        index: usize,
    },
    /// A jump target is past the end of the list.
    TargetOutOfRange {
        /// Instruction index.
        index: usize,
    },
    /// A relative jump points the wrong way for its opcode.
    WrongDirection {
        /// Instruction index.
        index: usize,
    },
}

impl std::fmt::Display for LayoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingTarget { index } => write!(f, "jump {index} has no target"),
            Self::TargetOutOfRange { index } => write!(f, "jump {index} targets past the end"),
            Self::WrongDirection { index } => {
                write!(f, "jump {index} points the wrong way for its opcode")
            }
        }
    }
}

impl std::error::Error for LayoutError {}

fn offsets(instructions: &[Instruction]) -> Vec<usize> {
    let mut out = Vec::with_capacity(instructions.len() + 1);
    let mut pos = 0;
    for ins in instructions {
        out.push(pos);
        pos += ins.size();
    }
    out.push(pos);
    out
}

fn jump_operand(
    index: usize,
    ins: &Instruction,
    positions: &[usize],
) -> Result<u32, LayoutError> {
    let kind = ins.op.jump_kind().ok_or(LayoutError::MissingTarget { index })?;
    let target = ins.target.ok_or(LayoutError::MissingTarget { index })?;
    if target + 1 >= positions.len() {
        return Err(LayoutError::TargetOutOfRange { index });
    }
    let end = positions[index] + ins.size();
    let dest = positions[target];
    let distance = match kind {
        JumpKind::Absolute => Some(dest),
        JumpKind::Forward => dest.checked_sub(end),
        JumpKind::Backward => end.checked_sub(dest),
    };
    distance
        .and_then(|d| u32::try_from(d).ok())
        .ok_or(LayoutError::WrongDirection { index })
}

/// Lay out an instruction list and emit its wordcode.
///
/// Jump operands are recomputed from target positions. Growing one operand's
/// prefix moves everything after it, so the pass repeats until no operand
/// needs a wider prefix. Prefixes only ever grow, so this terminates.
/// Returns the code bytes and the starting word of every instruction.
///
/// # Errors
///
/// Returns an error if a jump lacks a valid target or a relative jump points
/// against its opcode's direction.
pub fn encode(instructions: &mut [Instruction]) -> Result<(Vec<u8>, Vec<usize>), LayoutError> {
    for ins in instructions.iter_mut() {
        if ins.op.jump_kind().is_none() {
            ins.prefix = ins.prefix.max(prefix_for(ins.arg));
        }
    }

    let positions = loop {
        let positions = offsets(instructions);
        let mut grew = false;
        for index in 0..instructions.len() {
            if instructions[index].op.jump_kind().is_none() {
                continue;
            }
            let arg = jump_operand(index, &instructions[index], &positions)?;
            let ins = &mut instructions[index];
            ins.arg = arg;
            let needed = prefix_for(arg);
            if needed > ins.prefix {
                ins.prefix = needed;
                grew = true;
            }
        }
        if !grew {
            break positions;
        }
    };

    let mut code = Vec::with_capacity(positions.last().copied().unwrap_or(0) * 2);
    for ins in instructions.iter() {
        let bytes = ins.arg.to_be_bytes();
        for k in (1..=usize::from(ins.prefix)).rev() {
            let byte = if k < 4 { bytes[3 - k] } else { 0 };
            code.extend([Opcode::ExtendedArg.byte(), byte]);
        }
        code.extend([ins.op.byte(), bytes[3]]);
        for _ in 0..ins.op.caches() {
            code.extend([Opcode::Cache.byte(), 0]);
        }
    }
    let mut starts = positions;
    starts.pop();
    Ok((code, starts))
}

/// Spread each instruction's line over every word it occupies.
#[must_use]
pub fn lines_by_word(instructions: &[Instruction]) -> Vec<Option<u32>> {
    let mut lines = Vec::new();
    for ins in instructions {
        lines.extend(std::iter::repeat_n(ins.line, ins.size()));
    }
    lines
}

fn describe_const(c: &Const) -> String {
    match c {
        Const::None => "none".to_string(),
        Const::Bool(b) => b.to_string(),
        Const::Int(i) => i.to_string(),
        Const::Float(x) => format!("{x:?}"),
        Const::Str(s) => format!("{s:?}"),
        Const::Code(code) => format!("@{}", code.name),
        Const::Tuple(items) => {
            let parts: Vec<String> = items.iter().map(describe_const).collect();
            format!("({})", parts.join(", "))
        }
    }
}

fn describe(code: &CodeObject, ins: &Instruction, starts: &[usize]) -> String {
    let index = usize::try_from(ins.arg).unwrap_or(usize::MAX);
    let lookup = |table: &[String]| table.get(index).cloned().unwrap_or_else(|| "?".to_string());
    if let Some(target) = ins.target {
        return format!("to {}", starts.get(target).copied().unwrap_or_default());
    }
    match ins.op {
        Opcode::LoadConst | Opcode::KwNames => code
            .consts
            .get(index)
            .map_or_else(|| "?".to_string(), describe_const),
        Opcode::LoadName
        | Opcode::StoreName
        | Opcode::LoadGlobal
        | Opcode::StoreGlobal
        | Opcode::LoadAttr
        | Opcode::StoreAttr
        | Opcode::ImportName
        | Opcode::ImportFrom => lookup(&code.names),
        Opcode::LoadFast | Opcode::StoreFast => lookup(&code.varnames),
        Opcode::BinaryOp | Opcode::InplaceOp => BinOp::from_arg(ins.arg)
            .map_or_else(|| "?".to_string(), |op| op.symbol().to_string()),
        Opcode::CompareOp => CmpOp::from_arg(ins.arg)
            .map_or_else(|| "?".to_string(), |op| op.symbol().to_string()),
        _ => String::new(),
    }
}

/// Render a human-readable listing of a unit and its nested units.
///
/// # Errors
///
/// Returns an error if any unit fails to decode.
pub fn disassemble(code: &CodeObject) -> Result<String, DecodeError> {
    let mut out = String::new();
    disassemble_into(code, &mut out)?;
    Ok(out)
}

fn disassemble_into(code: &CodeObject, out: &mut String) -> Result<(), DecodeError> {
    let instructions = decode(code)?;
    let mut starts = Vec::with_capacity(instructions.len());
    let mut pos = 0;
    for ins in &instructions {
        starts.push(pos);
        pos += ins.size();
    }
    let targets: Vec<usize> = instructions.iter().filter_map(|i| i.target).collect();

    let _ = writeln!(
        out,
        "Disassembly of {} ({}, stacksize {}, flags {:#04x}):",
        code.name,
        code.filename,
        code.stacksize,
        code.flags.bits()
    );
    let mut last_line = None;
    for (idx, ins) in instructions.iter().enumerate() {
        let line = if ins.line != last_line && ins.line.is_some() {
            last_line = ins.line;
            ins.line.map(|l| l.to_string()).unwrap_or_default()
        } else {
            String::new()
        };
        let marker = if targets.contains(&idx) { ">>" } else { "  " };
        let detail = describe(code, ins, &starts);
        let arg = if ins.op.has_arg() { ins.arg.to_string() } else { String::new() };
        let _ = write!(out, "{line:>5} {marker} {:>5} {:<20} {arg:>5}", starts[idx], ins.op.mnemonic());
        if detail.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, " ({detail})");
        }
    }
    for nested in code.nested() {
        out.push('\n');
        disassemble_into(nested, out)?;
    }
    Ok(())
}
