//! The evaluation loop.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use crate::bytecode::{
    BinOp, CmpOp, CodeFlags, CodeObject, Const, Instruction, MAKE_FUNCTION_DEFAULTS, Opcode,
    decode,
};
use crate::error::{ErrorKind, ProgramError, TraceEntry};

use super::value::{Args, Function, Namespace, Value};
use super::{Host, Meter, Unwind, attrs, builtins, ops};

/// A unit decoded once and cached for every frame that runs it.
#[derive(Debug)]
struct Program {
    code: Arc<CodeObject>,
    instructions: Vec<Instruction>,
    consts: Vec<Value>,
}

#[derive(Debug, Clone, Copy)]
struct Handler {
    target: usize,
    depth: usize,
}

#[derive(Debug)]
struct Frame {
    program: Rc<Program>,
    globals: Rc<Namespace>,
    /// `None` for optimized function frames.
    locals: Option<Rc<Namespace>>,
    fast: Vec<Option<Value>>,
    stack: Vec<Value>,
    handlers: Vec<Handler>,
    kw_names: Option<Vec<String>>,
    pc: usize,
}

impl Frame {
    fn push(&mut self, value: Value) -> Result<(), ProgramError> {
        if self.stack.len() >= self.program.code.stacksize as usize {
            return Err(ProgramError::runtime("operand stack overflow"));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value, ProgramError> {
        self.stack
            .pop()
            .ok_or_else(|| ProgramError::runtime("operand stack underflow"))
    }

    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>, ProgramError> {
        let at = self
            .stack
            .len()
            .checked_sub(n)
            .ok_or_else(|| ProgramError::runtime("operand stack underflow"))?;
        Ok(self.stack.split_off(at))
    }

    fn peek(&self, depth: usize) -> Result<&Value, ProgramError> {
        self.stack
            .len()
            .checked_sub(depth)
            .and_then(|i| self.stack.get(i))
            .ok_or_else(|| ProgramError::runtime("operand stack underflow"))
    }

    fn name(&self, arg: u32) -> Result<&str, ProgramError> {
        self.program
            .code
            .names
            .get(arg as usize)
            .map(String::as_str)
            .ok_or_else(|| ProgramError::runtime(format!("name index {arg} out of range")))
    }

    fn locals(&self) -> Result<&Rc<Namespace>, ProgramError> {
        self.locals
            .as_ref()
            .ok_or_else(|| ProgramError::runtime("no locals mapping in an optimized frame"))
    }
}

fn to_value(constant: &Const) -> Value {
    match constant {
        Const::None => Value::None,
        Const::Bool(b) => Value::Bool(*b),
        Const::Int(i) => Value::Int(*i),
        Const::Float(f) => Value::Float(*f),
        Const::Str(s) => Value::str(s),
        Const::Code(code) => Value::Code(Arc::clone(code)),
        Const::Tuple(items) => Value::tuple(items.iter().map(to_value).collect()),
    }
}

/// Executes compiled units against namespaces.
pub struct Interp {
    /// Budget counter charged by `__meter__` and costed calls.
    pub meter: Meter,
    builtins: Rc<Namespace>,
    host: Rc<dyn Host>,
    depth: usize,
    max_depth: usize,
    programs: HashMap<usize, Rc<Program>>,
}

impl std::fmt::Debug for Interp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interp")
            .field("meter", &self.meter)
            .field("depth", &self.depth)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl Interp {
    /// Create an interpreter.
    #[must_use]
    pub fn new(meter: Meter, builtins: Rc<Namespace>, host: Rc<dyn Host>, max_depth: usize) -> Self {
        Self {
            meter,
            builtins,
            host,
            depth: 0,
            max_depth,
            programs: HashMap::new(),
        }
    }

    /// The shared builtins namespace.
    #[must_use]
    pub fn builtins(&self) -> &Rc<Namespace> {
        &self.builtins
    }

    /// Run a unit with `globals` as both its global and local scope.
    ///
    /// Module bodies run this way, and so does the per-turn entry point, which
    /// therefore reads and writes module-level names directly.
    ///
    /// # Errors
    ///
    /// Returns whatever the unit raises, or a non-program unwind.
    pub fn exec(&mut self, code: &Arc<CodeObject>, globals: &Rc<Namespace>) -> Result<Value, Unwind> {
        let program = self.program(code)?;
        let frame = Frame {
            fast: vec![None; program.code.varnames.len()],
            program,
            globals: Rc::clone(globals),
            locals: Some(Rc::clone(globals)),
            stack: Vec::new(),
            handlers: Vec::new(),
            kw_names: None,
            pc: 0,
        };
        self.enter()?;
        let result = self.run(frame);
        self.depth -= 1;
        result
    }

    /// Call any callable value.
    ///
    /// # Errors
    ///
    /// Returns a `TypeError` for non-callables, or whatever the callee raises.
    pub fn call(&mut self, callee: &Value, args: Args) -> Result<Value, Unwind> {
        match callee {
            Value::Function(func) => self.call_function(func, args),
            Value::Native(native) => native.call(self, args),
            Value::Bound(bound) => attrs::call_method(self, &bound.receiver, &bound.name, args),
            Value::ExcClass(class) => Ok(Value::exception(builtins::build_exception(*class, args)?)),
            Value::Type(ty) => Ok(attrs::construct(*ty, args)?),
            other => Err(ProgramError::type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))
            .into()),
        }
    }

    fn enter(&mut self) -> Result<(), ProgramError> {
        if self.depth >= self.max_depth {
            return Err(ProgramError::new(
                ErrorKind::Recursion,
                "maximum recursion depth exceeded",
            ));
        }
        self.depth += 1;
        Ok(())
    }

    fn program(&mut self, code: &Arc<CodeObject>) -> Result<Rc<Program>, ProgramError> {
        let key = Arc::as_ptr(code) as usize;
        if let Some(program) = self.programs.get(&key) {
            return Ok(Rc::clone(program));
        }
        let instructions = decode(code).map_err(|e| {
            ProgramError::runtime(format!("cannot execute {}: {e}", code.name))
        })?;
        let program = Rc::new(Program {
            code: Arc::clone(code),
            instructions,
            consts: code.consts.iter().map(to_value).collect(),
        });
        // The cached Arc keeps the address from being reused.
        self.programs.insert(key, Rc::clone(&program));
        Ok(program)
    }

    fn call_function(&mut self, func: &Rc<Function>, args: Args) -> Result<Value, Unwind> {
        let code = &func.code;
        let argcount = code.argcount as usize;
        let params: Vec<&str> = code.varnames.iter().take(argcount).map(String::as_str).collect();
        let required = argcount.saturating_sub(func.defaults.len());
        let mut slots = args.bind(&code.name, &params, required)?;
        let skip = func.defaults.len().saturating_sub(argcount);
        for (slot, default) in slots[required..].iter_mut().zip(func.defaults.iter().skip(skip)) {
            if slot.is_none() {
                *slot = Some(default.clone());
            }
        }

        let program = self.program(code)?;
        let mut fast = vec![None; code.varnames.len()];
        for (target, value) in fast.iter_mut().zip(slots) {
            *target = value;
        }
        let locals = if code.flags.contains(CodeFlags::OPTIMIZED) {
            None
        } else if code.flags.contains(CodeFlags::NEWLOCALS) {
            Some(Rc::new(Namespace::new()))
        } else {
            Some(Rc::clone(&func.globals))
        };
        let frame = Frame {
            program,
            globals: Rc::clone(&func.globals),
            locals,
            fast,
            stack: Vec::with_capacity(code.stacksize as usize),
            handlers: Vec::new(),
            kw_names: None,
            pc: 0,
        };
        self.enter()?;
        let result = self.run(frame);
        self.depth -= 1;
        result
    }

    fn run(&mut self, mut frame: Frame) -> Result<Value, Unwind> {
        let program = Rc::clone(&frame.program);
        loop {
            let Some(ins) = program.instructions.get(frame.pc) else {
                return Err(ProgramError::runtime("execution ran past the end of the code").into());
            };
            frame.pc += 1;
            match self.step(&mut frame, ins) {
                Ok(None) => {}
                Ok(Some(value)) => return Ok(value),
                Err(Unwind::Raise(error)) => {
                    if let Some(handler) = frame.handlers.pop() {
                        frame.stack.truncate(handler.depth);
                        frame.stack.push(Value::exception(error));
                        frame.pc = handler.target;
                    } else {
                        let mut error = error;
                        error.push_frame(TraceEntry {
                            file: program.code.filename.clone(),
                            line: ins.line,
                            scope: program.code.name.clone(),
                        });
                        return Err(Unwind::Raise(error));
                    }
                }
                Err(other) => return Err(other),
            }
        }
    }

    fn load_global(&self, frame: &Frame, name: &str) -> Result<Value, ProgramError> {
        frame
            .globals
            .get(name)
            .or_else(|| self.builtins.get(name))
            .ok_or_else(|| ProgramError::new(ErrorKind::Name, format!("name '{name}' is not defined")))
    }

    fn jump(frame: &mut Frame, ins: &Instruction) -> Result<(), ProgramError> {
        frame.pc = ins
            .target
            .ok_or_else(|| ProgramError::runtime("jump without a target"))?;
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn step(&mut self, frame: &mut Frame, ins: &Instruction) -> Result<Option<Value>, Unwind> {
        let arg = ins.arg;
        match ins.op {
            Opcode::Cache | Opcode::Nop | Opcode::Resume | Opcode::ExtendedArg => {}
            Opcode::PopTop => {
                frame.pop()?;
            }
            Opcode::UnaryNeg => {
                let value = frame.pop()?;
                frame.push(ops::negate(&value)?)?;
            }
            Opcode::UnaryNot => {
                let value = frame.pop()?;
                frame.push(Value::Bool(!ops::truthy(&value)))?;
            }
            Opcode::GetIter => {
                let value = frame.pop()?;
                frame.push(ops::iterate(&value)?)?;
            }
            Opcode::BinarySubscr => {
                let key = frame.pop()?;
                let container = frame.pop()?;
                self.host.check_item(&key)?;
                frame.push(ops::get_item(&container, &key)?)?;
            }
            Opcode::StoreSubscr => {
                let key = frame.pop()?;
                let container = frame.pop()?;
                let value = frame.pop()?;
                self.host.check_store(&container)?;
                self.host.check_item(&key)?;
                ops::set_item(&container, key, value)?;
            }
            Opcode::ReturnValue => return Ok(Some(frame.pop()?)),
            Opcode::ImportStar => {
                let module = frame.pop()?;
                let Value::Module(module) = module else {
                    return Err(ProgramError::type_error("import * expects a module").into());
                };
                let locals = Rc::clone(frame.locals()?);
                for name in module.ns.names() {
                    if name.starts_with('_') {
                        continue;
                    }
                    if let Some(value) = module.ns.get(&name) {
                        self.host.check_binding(&name)?;
                        locals.set(name, value);
                    }
                }
            }
            Opcode::PopBlock => {
                frame
                    .handlers
                    .pop()
                    .ok_or_else(|| ProgramError::runtime("pop_block without a handler"))?;
            }
            Opcode::Raise => {
                let value = frame.pop()?;
                return Err(match value {
                    Value::Exception(error) => Unwind::Raise((*error).clone()),
                    Value::ExcClass(class) => {
                        Unwind::Raise(builtins::build_exception(class, Args::default())?)
                    }
                    other => Unwind::Raise(ProgramError::type_error(format!(
                        "exceptions must derive from Exception, not '{}'",
                        other.type_name()
                    ))),
                });
            }
            Opcode::Reraise => {
                let value = frame.pop()?;
                let Value::Exception(error) = value else {
                    return Err(ProgramError::runtime("reraise without an exception").into());
                };
                return Err(Unwind::Raise((*error).clone()));
            }
            Opcode::Copy => {
                let value = frame.peek(arg as usize)?.clone();
                frame.push(value)?;
            }
            Opcode::Swap => {
                let len = frame.stack.len();
                let other = len
                    .checked_sub(arg as usize)
                    .filter(|i| *i < len)
                    .ok_or_else(|| ProgramError::runtime("operand stack underflow"))?;
                frame.stack.swap(len - 1, other);
            }
            Opcode::StoreName => {
                let name = frame.name(arg)?.to_string();
                let value = frame.pop()?;
                self.host.check_binding(&name)?;
                frame.locals()?.set(name, value);
            }
            Opcode::StoreGlobal => {
                let name = frame.name(arg)?.to_string();
                let value = frame.pop()?;
                self.host.check_binding(&name)?;
                frame.globals.set(name, value);
            }
            Opcode::StoreAttr => {
                let name = frame.name(arg)?.to_string();
                let target = frame.pop()?;
                let value = frame.pop()?;
                self.host.check_store(&target)?;
                self.host.check_attr(&name)?;
                attrs::store_attr(&target, &name, value)?;
            }
            Opcode::LoadConst => {
                let value = frame
                    .program
                    .consts
                    .get(arg as usize)
                    .cloned()
                    .ok_or_else(|| ProgramError::runtime(format!("constant {arg} out of range")))?;
                frame.push(value)?;
            }
            Opcode::LoadName => {
                let name = frame.name(arg)?;
                self.host.check_name(name)?;
                // Optimized frames have no locals mapping; metering calls
                // injected into function bodies resolve through globals.
                let value = match frame.locals.as_ref().and_then(|l| l.get(name)) {
                    Some(value) => value,
                    None => self.load_global(frame, name)?,
                };
                frame.push(value)?;
            }
            Opcode::LoadGlobal => {
                let name = frame.name(arg)?;
                self.host.check_name(name)?;
                let value = self.load_global(frame, name)?;
                frame.push(value)?;
            }
            Opcode::LoadFast => {
                let value = frame.fast.get(arg as usize).cloned().flatten().ok_or_else(|| {
                    let name = frame
                        .program
                        .code
                        .varnames
                        .get(arg as usize)
                        .map_or("?", String::as_str);
                    ProgramError::new(
                        ErrorKind::Name,
                        format!("local variable '{name}' referenced before assignment"),
                    )
                })?;
                frame.push(value)?;
            }
            Opcode::StoreFast => {
                let value = frame.pop()?;
                let slot = frame
                    .fast
                    .get_mut(arg as usize)
                    .ok_or_else(|| ProgramError::runtime(format!("local slot {arg} out of range")))?;
                *slot = Some(value);
            }
            Opcode::LoadAttr => {
                let name = frame.name(arg)?.to_string();
                let target = frame.pop()?;
                self.host.check_attr(&name)?;
                frame.push(attrs::load_attr(&target, &name)?)?;
            }
            Opcode::BuildTuple => {
                let items = frame.pop_n(arg as usize)?;
                frame.push(Value::tuple(items))?;
            }
            Opcode::BuildList => {
                let items = frame.pop_n(arg as usize)?;
                frame.push(Value::list(items))?;
            }
            Opcode::BuildMap => {
                let items = frame.pop_n(2 * arg as usize)?;
                let mut dict = super::Dict::new();
                let mut items = items.into_iter();
                while let (Some(key), Some(value)) = (items.next(), items.next()) {
                    dict.insert(key, value)?;
                }
                frame.push(Value::Dict(Rc::new(std::cell::RefCell::new(dict))))?;
            }
            Opcode::CompareOp => {
                let op = CmpOp::from_arg(arg)
                    .ok_or_else(|| ProgramError::runtime(format!("bad comparison {arg}")))?;
                let right = frame.pop()?;
                let left = frame.pop()?;
                let result = if op == CmpOp::ExcMatch {
                    Value::Bool(exception_matches(&left, &right)?)
                } else {
                    ops::compare(op, &left, &right)?
                };
                frame.push(result)?;
            }
            Opcode::ImportName => {
                let name = frame.name(arg)?.to_string();
                let importer = frame.program.code.filename.clone();
                let host = Rc::clone(&self.host);
                let module = host.import(self, &importer, &name)?;
                frame.push(module)?;
            }
            Opcode::ImportFrom => {
                let name = frame.name(arg)?.to_string();
                self.host.check_attr(&name)?;
                let module = frame.peek(1)?.clone();
                let value = attrs::load_attr(&module, &name).map_err(|_| {
                    ProgramError::import(format!("cannot import name '{name}'"))
                })?;
                frame.push(value)?;
            }
            Opcode::JumpForward | Opcode::JumpBackward | Opcode::JumpAbsolute => {
                Self::jump(frame, ins)?;
            }
            Opcode::PopJumpIfFalse | Opcode::PopJumpIfTrue => {
                let value = frame.pop()?;
                if ops::truthy(&value) == (ins.op == Opcode::PopJumpIfTrue) {
                    Self::jump(frame, ins)?;
                }
            }
            Opcode::ForIter => {
                let Value::Iter(state) = frame.peek(1)?.clone() else {
                    return Err(ProgramError::runtime("for_iter without an iterator").into());
                };
                let next = state.borrow_mut().next_item();
                match next {
                    Some(item) => frame.push(item)?,
                    None => {
                        frame.pop()?;
                        Self::jump(frame, ins)?;
                    }
                }
            }
            Opcode::SetupExcept => {
                let target = ins
                    .target
                    .ok_or_else(|| ProgramError::runtime("setup_except without a target"))?;
                frame.handlers.push(Handler {
                    target,
                    depth: frame.stack.len(),
                });
            }
            Opcode::CallFunction => {
                let argc = arg as usize;
                let keywords = frame.kw_names.take().unwrap_or_default();
                let mut values = frame.pop_n(argc)?;
                let callee = frame.pop()?;
                let positional_count = argc
                    .checked_sub(keywords.len())
                    .ok_or_else(|| ProgramError::runtime("more keyword names than arguments"))?;
                let keyword_values = values.split_off(positional_count);
                let args = Args {
                    positional: values,
                    keywords: keywords.into_iter().zip(keyword_values).collect(),
                };
                let result = self.call(&callee, args)?;
                frame.push(result)?;
            }
            Opcode::MakeFunction => {
                let Value::Code(code) = frame.pop()? else {
                    return Err(ProgramError::runtime("make_function expects a code object").into());
                };
                for name in &code.varnames {
                    self.host.check_name(name)?;
                }
                let defaults = if arg & MAKE_FUNCTION_DEFAULTS == 0 {
                    Vec::new()
                } else {
                    ops::collect(&frame.pop()?)?
                };
                frame.push(Value::Function(Rc::new(Function {
                    code,
                    globals: Rc::clone(&frame.globals),
                    defaults,
                })))?;
            }
            Opcode::BinaryOp => {
                let op = BinOp::from_arg(arg)
                    .ok_or_else(|| ProgramError::runtime(format!("bad operator {arg}")))?;
                let right = frame.pop()?;
                let left = frame.pop()?;
                frame.push(ops::binary(op, &left, &right)?)?;
            }
            Opcode::InplaceOp => {
                let op = BinOp::from_arg(arg)
                    .ok_or_else(|| ProgramError::runtime(format!("bad operator {arg}")))?;
                self.host.check_inplace(op)?;
                let right = frame.pop()?;
                let left = frame.pop()?;
                let result = match (&left, op) {
                    (Value::List(items), BinOp::Add) => {
                        let extra = ops::collect(&right)?;
                        items.borrow_mut().extend(extra);
                        left
                    }
                    _ => ops::binary(op, &left, &right)?,
                };
                frame.push(result)?;
            }
            Opcode::UnpackSequence => {
                let expected = arg as usize;
                let items = ops::collect(&frame.pop()?)?;
                if items.len() != expected {
                    let message = if items.len() < expected {
                        format!(
                            "not enough values to unpack (expected {expected}, got {})",
                            items.len()
                        )
                    } else {
                        format!("too many values to unpack (expected {expected})")
                    };
                    return Err(ProgramError::value_error(message).into());
                }
                for item in items.into_iter().rev() {
                    frame.push(item)?;
                }
            }
            Opcode::KwNames => {
                let Some(Value::Tuple(names)) = frame.program.consts.get(arg as usize) else {
                    return Err(ProgramError::runtime("kw_names expects a tuple constant").into());
                };
                let names = names
                    .iter()
                    .map(|n| n.as_str("keyword name").map(|s| s.to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                frame.kw_names = Some(names);
            }
        }
        Ok(None)
    }
}

fn exception_matches(error: &Value, class: &Value) -> Result<bool, ProgramError> {
    let Value::Exception(error) = error else {
        return Err(ProgramError::runtime("exc_match without an exception"));
    };
    match class {
        Value::ExcClass(class) => Ok(class.matches(error)),
        Value::Tuple(classes) => {
            for class in classes.iter() {
                if exception_matches(&Value::Exception(Rc::clone(error)), class)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => Err(ProgramError::type_error(format!(
            "catching '{}' that does not inherit from Exception is not allowed",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytecode::assemble;
    use crate::vm::{Bare, BuiltinsBuilder};

    fn run(source: &str) -> Result<Value, Unwind> {
        let code = Arc::new(assemble("bot", source).unwrap());
        let builtins = Rc::new(BuiltinsBuilder::standard().build());
        let mut interp = Interp::new(Meter::new(1_000), builtins, Rc::new(Bare), 50);
        let ns = Rc::new(Namespace::new());
        interp.exec(&code, &ns)
    }

    fn run_int(source: &str) -> i64 {
        match run(source) {
            Ok(Value::Int(i)) => i,
            other => panic!("expected an int, got {other:?}"),
        }
    }

    #[test]
    fn test_arithmetic_and_return() {
        assert_eq!(run_int("load_const 6\nload_const 7\nbinary_op *\nreturn_value\n"), 42);
    }

    #[test]
    fn test_loop_with_fast_locals() {
        let src = "\
load_const @total
make_function
store_name total
load_name total
load_const 10
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
        assert_eq!(run_int(src), 45);
    }

    #[test]
    fn test_keywords_and_defaults() {
        let src = "\
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
        assert_eq!(run_int(src), -18);
    }

    #[test]
    fn test_exception_caught_by_handler() {
        let src = "\
setup_except handler
load_const 1
load_const 0
binary_op //
pop_block
return_value
handler:
copy 1
load_global ZeroDivisionError
compare_op exc_match
pop_jump_if_false again
pop_top
load_const -1
return_value
again:
reraise
";
        assert_eq!(run_int(src), -1);
    }

    #[test]
    fn test_uncaught_error_carries_traceback() {
        let src = "\
load_const @boom
make_function
store_name boom
load_name boom
call_function 0
return_value
.func boom
    load_global missing
    return_value
.end
";
        let Err(Unwind::Raise(error)) = run(src) else {
            panic!("expected a raised error");
        };
        assert_eq!(error.kind(), ErrorKind::Name);
        let scopes: Vec<&str> = error.traceback().iter().map(|t| t.scope.as_str()).collect();
        assert_eq!(scopes, vec!["boom", "<module>"]);
        assert_eq!(error.traceback()[0].line, Some(8));
    }

    #[test]
    fn test_recursion_limit() {
        let src = "\
load_const @f
make_function
store_name f
load_name f
call_function 0
return_value
.func f
    load_global f
    call_function 0
    return_value
.end
";
        let Err(Unwind::Raise(error)) = run(src) else {
            panic!("expected a raised error");
        };
        assert_eq!(error.kind(), ErrorKind::Recursion);
    }

    #[test]
    fn test_optimized_frames_load_name_from_globals() {
        let src = "\
load_const 9
store_name g
load_const @f
make_function
store_name f
load_name f
call_function 0
return_value
.func f
    load_name g
    return_value
.end
";
        assert_eq!(run_int(src), 9);
    }

    #[test]
    fn test_unpack_and_swap() {
        let src = "\
load_const 1
load_const 2
build_list 2
unpack_sequence 2
swap 2
binary_op -
return_value
";
        // unpack leaves 1 on top of 2; swapping gives 1 - 2.
        assert_eq!(run_int(src), -1);
    }
}
