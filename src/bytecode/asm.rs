//! Textual assembler for `.rasm` sources.
//!
//! ```text
//! # module body
//! load_const @turn
//! make_function 0
//! store_name turn
//!
//! .func turn
//!     load_global rc
//!     load_attr get_id
//!     call_function 0
//!     store_fast me
//! loop:
//!     load_fast me
//!     pop_jump_if_false done
//!     jump loop
//! done:
//! .end
//! ```
//!
//! Every unit starts with an implicit `resume` and ends with an implicit
//! `load_const none; return_value` unless its last instruction already leaves
//! the unit. `jump` picks `jump_forward` or `jump_backward` from the label's
//! position. Instruction lines are the source lines they appear on.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::linetable;
use super::listing::{Instruction, encode, lines_by_word};
use super::opcode::{BinOp, CmpOp, MAKE_FUNCTION_DEFAULTS, Opcode};
use super::{CodeFlags, CodeObject, Const};

/// Name of the unit holding a module body.
pub const MODULE_UNIT: &str = "<module>";

/// A syntax or layout error in an assembler source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembleError {
    /// Source file.
    pub file: String,
    /// 1-based source line.
    pub line: u32,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.file, self.line, self.message)
    }
}

impl std::error::Error for AssembleError {}

#[derive(Debug)]
enum Operand {
    Value(u32),
    Label(String),
}

#[derive(Debug)]
struct Pending {
    op: Opcode,
    /// `jump` without a direction; resolved from the label position.
    auto_jump: bool,
    operand: Operand,
    line: u32,
}

#[derive(Debug)]
struct UnitBuilder {
    name: String,
    first_line: u32,
    argcount: u32,
    is_function: bool,
    pending: Vec<Pending>,
    labels: HashMap<String, usize>,
    consts: Vec<Const>,
    names: Vec<String>,
    varnames: Vec<String>,
    nested: HashMap<String, Arc<CodeObject>>,
    code_refs: Vec<(usize, String, u32)>,
}

impl UnitBuilder {
    fn new(name: &str, first_line: u32, params: Vec<String>, is_function: bool) -> Self {
        Self {
            name: name.to_string(),
            first_line,
            argcount: u32::try_from(params.len()).unwrap_or(u32::MAX),
            is_function,
            pending: Vec::new(),
            labels: HashMap::new(),
            consts: Vec::new(),
            names: Vec::new(),
            varnames: params,
            nested: HashMap::new(),
            code_refs: Vec::new(),
        }
    }

    fn add_const(&mut self, value: Const) -> u32 {
        let index = match self.consts.iter().position(|c| c.same(&value)) {
            Some(i) => i,
            None => {
                self.consts.push(value);
                self.consts.len() - 1
            }
        };
        u32::try_from(index).unwrap_or(u32::MAX)
    }

    fn add_code_ref(&mut self, name: &str, line: u32) -> u32 {
        if let Some((index, _, _)) = self.code_refs.iter().find(|(_, n, _)| n == name) {
            return u32::try_from(*index).unwrap_or(u32::MAX);
        }
        self.consts.push(Const::None);
        let index = self.consts.len() - 1;
        self.code_refs.push((index, name.to_string(), line));
        u32::try_from(index).unwrap_or(u32::MAX)
    }

    fn add_name(table: &mut Vec<String>, name: &str) -> u32 {
        let index = match table.iter().position(|n| n == name) {
            Some(i) => i,
            None => {
                table.push(name.to_string());
                table.len() - 1
            }
        };
        u32::try_from(index).unwrap_or(u32::MAX)
    }
}

struct Assembler<'a> {
    file: &'a str,
}

impl Assembler<'_> {
    fn error(&self, line: u32, message: impl Into<String>) -> AssembleError {
        AssembleError {
            file: self.file.to_string(),
            line,
            message: message.into(),
        }
    }

    fn instruction(
        &self,
        unit: &mut UnitBuilder,
        mnemonic: &str,
        operand: &str,
        line: u32,
    ) -> Result<(), AssembleError> {
        let (op, auto_jump) = if mnemonic == "jump" {
            (Opcode::JumpForward, true)
        } else {
            let op = Opcode::from_mnemonic(mnemonic)
                .ok_or_else(|| self.error(line, format!("unknown instruction `{mnemonic}`")))?;
            (op, false)
        };

        let needs_operand = op.has_arg() && op != Opcode::MakeFunction;
        if needs_operand && operand.is_empty() {
            return Err(self.error(line, format!("`{mnemonic}` needs an operand")));
        }
        if !op.has_arg() && !operand.is_empty() {
            return Err(self.error(line, format!("`{mnemonic}` takes no operand")));
        }

        let operand = match op {
            Opcode::Resume | Opcode::Cache | Opcode::ExtendedArg => {
                return Err(self.error(line, format!("`{mnemonic}` is emitted automatically")));
            }
            _ if op.jump_kind().is_some() => {
                if !is_identifier(operand) {
                    return Err(self.error(line, format!("bad label `{operand}`")));
                }
                Operand::Label(operand.to_string())
            }
            Opcode::LoadConst => {
                if let Some(name) = operand.strip_prefix('@') {
                    Operand::Value(unit.add_code_ref(name, line))
                } else {
                    let value = parse_literal(operand)
                        .ok_or_else(|| self.error(line, format!("bad literal `{operand}`")))?;
                    Operand::Value(unit.add_const(value))
                }
            }
            Opcode::LoadName
            | Opcode::StoreName
            | Opcode::LoadGlobal
            | Opcode::StoreGlobal
            | Opcode::LoadAttr
            | Opcode::StoreAttr
            | Opcode::ImportName
            | Opcode::ImportFrom => {
                if !is_identifier(operand) {
                    return Err(self.error(line, format!("bad name `{operand}`")));
                }
                Operand::Value(UnitBuilder::add_name(&mut unit.names, operand))
            }
            Opcode::LoadFast | Opcode::StoreFast => {
                if !is_identifier(operand) {
                    return Err(self.error(line, format!("bad local `{operand}`")));
                }
                Operand::Value(UnitBuilder::add_name(&mut unit.varnames, operand))
            }
            Opcode::BinaryOp | Opcode::InplaceOp => {
                let op = BinOp::from_symbol(operand)
                    .ok_or_else(|| self.error(line, format!("unknown operator `{operand}`")))?;
                Operand::Value(op.arg())
            }
            Opcode::CompareOp => {
                let op = CmpOp::from_symbol(operand)
                    .ok_or_else(|| self.error(line, format!("unknown comparison `{operand}`")))?;
                Operand::Value(op.arg())
            }
            Opcode::KwNames => {
                let names: Vec<&str> = operand.split(',').map(str::trim).collect();
                if names.iter().any(|n| !is_identifier(n)) {
                    return Err(self.error(line, format!("bad keyword list `{operand}`")));
                }
                let tuple = Const::Tuple(names.iter().map(|n| Const::Str((*n).to_string())).collect());
                Operand::Value(unit.add_const(tuple))
            }
            Opcode::MakeFunction => match operand {
                "" | "0" => Operand::Value(0),
                "defaults" | "1" => Operand::Value(MAKE_FUNCTION_DEFAULTS),
                _ => return Err(self.error(line, format!("bad make_function flags `{operand}`"))),
            },
            _ if op.has_arg() => {
                let n = operand
                    .parse::<u32>()
                    .map_err(|_| self.error(line, format!("expected a count, found `{operand}`")))?;
                if matches!(op, Opcode::Copy | Opcode::Swap) && n == 0 {
                    return Err(self.error(line, format!("`{mnemonic}` needs a positive depth")));
                }
                Operand::Value(n)
            }
            _ => Operand::Value(0),
        };

        unit.pending.push(Pending {
            op,
            auto_jump,
            operand,
            line,
        });
        Ok(())
    }

    fn finish(&self, mut unit: UnitBuilder, end_line: u32) -> Result<CodeObject, AssembleError> {
        for (index, name, line) in std::mem::take(&mut unit.code_refs) {
            let code = unit
                .nested
                .get(&name)
                .ok_or_else(|| self.error(line, format!("no function `{name}` in this unit")))?;
            unit.consts[index] = Const::Code(Arc::clone(code));
        }

        let ends_cleanly = unit.pending.last().is_some_and(|p| p.op.is_terminator());
        let label_at_end = unit.labels.values().any(|&at| at == unit.pending.len());
        if !ends_cleanly || label_at_end {
            let none = unit.add_const(Const::None);
            unit.pending.push(Pending {
                op: Opcode::LoadConst,
                auto_jump: false,
                operand: Operand::Value(none),
                line: end_line,
            });
            unit.pending.push(Pending {
                op: Opcode::ReturnValue,
                auto_jump: false,
                operand: Operand::Value(0),
                line: end_line,
            });
        }

        let mut resume = Instruction::new(Opcode::Resume, 0);
        resume.line = Some(unit.first_line);
        let mut instructions = vec![resume];
        for (index, pending) in unit.pending.iter().enumerate() {
            let own = index + 1;
            let mut ins = match &pending.operand {
                Operand::Value(arg) => Instruction::new(pending.op, *arg),
                Operand::Label(label) => {
                    let target = unit.labels.get(label).map(|t| t + 1).ok_or_else(|| {
                        self.error(pending.line, format!("undefined label `{label}`"))
                    })?;
                    if target == own {
                        return Err(self.error(pending.line, "instruction jumps to itself"));
                    }
                    let op = if pending.auto_jump {
                        if target < own { Opcode::JumpBackward } else { Opcode::JumpForward }
                    } else {
                        pending.op
                    };
                    let backward_op = op == Opcode::JumpBackward;
                    let relative = !matches!(
                        op,
                        Opcode::PopJumpIfFalse | Opcode::PopJumpIfTrue | Opcode::JumpAbsolute
                    );
                    if relative && backward_op != (target < own) {
                        return Err(self.error(
                            pending.line,
                            format!("`{}` cannot reach `{label}` in that direction", op.mnemonic()),
                        ));
                    }
                    Instruction::jump(op, target)
                }
            };
            ins.line = Some(pending.line);
            instructions.push(ins);
        }

        let stacksize = max_stack_depth(&instructions)
            .map_err(|(index, message)| self.error(instructions[index].line.unwrap_or(end_line), message))?;

        let (code, _) = encode(&mut instructions)
            .map_err(|e| self.error(end_line, e.to_string()))?;
        let linetable = linetable::encode(unit.first_line, &lines_by_word(&instructions));

        let flags = if unit.is_function {
            CodeFlags::OPTIMIZED.with(CodeFlags::NEWLOCALS)
        } else {
            CodeFlags::empty()
        };

        Ok(CodeObject {
            name: unit.name,
            filename: self.file.to_string(),
            first_line: unit.first_line,
            argcount: unit.argcount,
            varnames: unit.varnames,
            names: unit.names,
            consts: unit.consts,
            code,
            linetable,
            stacksize,
            flags,
        })
    }
}

/// Walk every path through the unit and return the deepest operand stack.
fn max_stack_depth(instructions: &[Instruction]) -> Result<u32, (usize, String)> {
    let mut seen: Vec<Option<i64>> = vec![None; instructions.len()];
    let mut work = vec![(0usize, 0i64)];
    let mut max = 0i64;
    while let Some((index, depth)) = work.pop() {
        let Some(ins) = instructions.get(index) else {
            return Err((instructions.len() - 1, "execution falls off the end".to_string()));
        };
        match seen[index] {
            Some(d) if d == depth => continue,
            Some(d) => {
                return Err((index, format!("stack depth {depth} conflicts with {d} on another path")));
            }
            None => seen[index] = Some(depth),
        }
        if let Some(target) = ins.target {
            let after = depth + ins.op.stack_effect(ins.arg, true);
            if after < 0 {
                return Err((index, "stack underflow".to_string()));
            }
            max = max.max(after);
            work.push((target, after));
        }
        if !ins.op.is_terminator() {
            let after = depth + ins.op.stack_effect(ins.arg, false);
            if after < 0 {
                return Err((index, "stack underflow".to_string()));
            }
            max = max.max(after);
            work.push((index + 1, after));
        }
    }
    Ok(u32::try_from(max.max(1)).unwrap_or(u32::MAX))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_string(text: &str) -> Option<String> {
    let inner = text.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next()? {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                '"' => out.push('"'),
                '\\' => out.push('\\'),
                _ => return None,
            }
        } else if c == '"' {
            return None;
        } else {
            out.push(c);
        }
    }
    Some(out)
}

fn parse_literal(text: &str) -> Option<Const> {
    match text {
        "none" => return Some(Const::None),
        "true" => return Some(Const::Bool(true)),
        "false" => return Some(Const::Bool(false)),
        _ => {}
    }
    if text.starts_with('"') {
        return parse_string(text).map(Const::Str);
    }
    if let Ok(i) = text.parse::<i64>() {
        return Some(Const::Int(i));
    }
    let numeric = text
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '.');
    if numeric || matches!(text, "inf" | "-inf") {
        return text.parse::<f64>().ok().map(Const::Float);
    }
    None
}

/// Strip a trailing `#` comment, ignoring `#` inside string literals.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Assemble a source file into a module unit.
///
/// `file` names the bundle module and is recorded in every unit for
/// tracebacks.
///
/// # Errors
///
/// Returns the first syntax error, undefined label or function reference,
/// inconsistent stack depth, or unbalanced `.func`/`.end`.
pub fn assemble(file: &str, source: &str) -> Result<CodeObject, AssembleError> {
    let asm = Assembler { file };
    let mut stack = vec![UnitBuilder::new(MODULE_UNIT, 1, Vec::new(), false)];
    let mut last_line = 1u32;

    for (index, raw) in source.lines().enumerate() {
        let line = u32::try_from(index + 1).unwrap_or(u32::MAX);
        last_line = line;
        let text = strip_comment(raw).trim();
        if text.is_empty() {
            continue;
        }

        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };

        match head {
            ".func" => {
                let mut parts = rest.split_whitespace();
                let name = parts
                    .next()
                    .filter(|n| is_identifier(n))
                    .ok_or_else(|| asm.error(line, "`.func` needs a name"))?;
                let params: Vec<String> = parts.map(str::to_string).collect();
                if let Some(bad) = params.iter().find(|p| !is_identifier(p)) {
                    return Err(asm.error(line, format!("bad parameter `{bad}`")));
                }
                stack.push(UnitBuilder::new(name, line, params, true));
            }
            ".end" => {
                if stack.len() < 2 {
                    return Err(asm.error(line, "`.end` without `.func`"));
                }
                let unit = stack.pop().ok_or_else(|| asm.error(line, "`.end` without `.func`"))?;
                let name = unit.name.clone();
                let code = asm.finish(unit, line)?;
                let parent = stack.last_mut().ok_or_else(|| asm.error(line, "`.end` without `.func`"))?;
                if parent.nested.insert(name.clone(), Arc::new(code)).is_some() {
                    return Err(asm.error(line, format!("function `{name}` defined twice")));
                }
            }
            _ if rest.is_empty() && head.ends_with(':') => {
                let label = &head[..head.len() - 1];
                if !is_identifier(label) {
                    return Err(asm.error(line, format!("bad label `{label}`")));
                }
                let unit = stack.last_mut().ok_or_else(|| asm.error(line, "no open unit"))?;
                let at = unit.pending.len();
                if unit.labels.insert(label.to_string(), at).is_some() {
                    return Err(asm.error(line, format!("label `{label}` defined twice")));
                }
            }
            _ => {
                let unit = stack.last_mut().ok_or_else(|| asm.error(line, "no open unit"))?;
                asm.instruction(unit, head, rest, line)?;
            }
        }
    }

    if stack.len() != 1 {
        return Err(asm.error(last_line, "unterminated `.func`"));
    }
    let module = stack.pop().ok_or_else(|| asm.error(last_line, "no module unit"))?;
    asm.finish(module, last_line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::decode;

    #[test]
    fn test_module_gets_resume_and_return() {
        let code = assemble("bot", "load_const 1\nstore_name x\n").unwrap();
        let ins = decode(&code).unwrap();
        let ops: Vec<Opcode> = ins.iter().map(|i| i.op).collect();
        assert_eq!(
            ops,
            vec![
                Opcode::Resume,
                Opcode::LoadConst,
                Opcode::StoreName,
                Opcode::LoadConst,
                Opcode::ReturnValue
            ]
        );
        assert_eq!(ins[2].line, Some(2));
        assert_eq!(code.names, vec!["x".to_string()]);
        assert!(!code.flags.contains(CodeFlags::OPTIMIZED));
    }

    #[test]
    fn test_functions_nest_and_resolve() {
        let src = "\
load_const @f
make_function
store_name f
.func f a b
    load_fast a
    load_fast b
    binary_op +
    return_value
.end
";
        let code = assemble("bot", src).unwrap();
        let f = code.find_nested("f").unwrap();
        assert_eq!(f.argcount, 2);
        assert_eq!(f.varnames, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(f.first_line, 4);
        assert!(f.flags.contains(CodeFlags::OPTIMIZED));
        assert_eq!(f.stacksize, 2);
    }

    #[test]
    fn test_auto_jump_direction() {
        let src = "\
top:
load_const true
pop_jump_if_false out
jump top
out:
";
        let code = assemble("bot", src).unwrap();
        let ins = decode(&code).unwrap();
        assert_eq!(ins[3].op, Opcode::JumpBackward);
        assert_eq!(ins[3].target, Some(1));
        assert_eq!(ins[2].target, Some(4));
    }

    #[test]
    fn test_errors_carry_lines() {
        let err = assemble("bot", "nop\nfrobnicate 3\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.to_string(), "bot:2: unknown instruction `frobnicate`");

        let err = assemble("bot", "jump nowhere\n").unwrap_err();
        assert!(err.message.contains("undefined label"));

        let err = assemble("bot", "here:\njump_forward here\n").unwrap_err();
        assert!(err.message.contains("itself"));

        let err = assemble("bot", "pop_top\n").unwrap_err();
        assert!(err.message.contains("underflow"));

        let err = assemble("bot", ".func f\nnop\n").unwrap_err();
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_literals_and_comments() {
        let src = "load_const \"a # b\\n\" # trailing\nload_const -2.5\nload_const @g\n.func g\n.end\n";
        let code = assemble("bot", src).unwrap();
        assert!(matches!(&code.consts[0], Const::Str(s) if s == "a # b\n"));
        assert!(matches!(code.consts[1], Const::Float(x) if x < -2.0));
        assert!(matches!(&code.consts[2], Const::Code(c) if c.name == "g"));
    }

    #[test]
    fn test_inconsistent_depth_rejected() {
        let src = "\
load_const true
pop_jump_if_false skip
load_const 1
skip:
load_const none
return_value
";
        let err = assemble("bot", src).unwrap_err();
        assert!(err.message.contains("conflicts"));
    }
}
