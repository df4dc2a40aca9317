//! Allow/deny predicates consulted by the interpreter.

use crate::bytecode::BinOp;
use crate::error::{ErrorKind, ProgramError};
use crate::instrument::METER_NAME;
use crate::vm::Value;

/// In-place operators a program may use.
pub const INPLACE_ALLOWED: [BinOp; 4] = [BinOp::Add, BinOp::Sub, BinOp::Mul, BinOp::TrueDiv];

fn denied() -> ProgramError {
    ProgramError::runtime("Cannot access attributes that begin with \"_\".")
}

/// Attribute names starting with `_` are off limits, whether or not they exist.
pub fn check_attr(name: &str) -> Result<(), ProgramError> {
    if name.starts_with('_') { Err(denied()) } else { Ok(()) }
}

/// String subscripts follow the attribute rule.
pub fn check_item(key: &Value) -> Result<(), ProgramError> {
    match key {
        Value::Str(s) if s.starts_with('_') => Err(denied()),
        _ => Ok(()),
    }
}

/// Modules and callables are immutable from program code.
pub fn check_store(target: &Value) -> Result<(), ProgramError> {
    match target {
        Value::Module(_) => Err(ProgramError::runtime("Can't write to modules.")),
        Value::Function(_)
        | Value::Native(_)
        | Value::Bound(_)
        | Value::Type(_)
        | Value::ExcClass(_) => Err(ProgramError::runtime("Can't write to functions.")),
        _ => Ok(()),
    }
}

fn invalid_name(name: &str) -> ProgramError {
    ProgramError::runtime(format!(
        "\"{name}\" is an invalid variable name because it starts with \"_\""
    ))
}

/// Names starting with `_` cannot be read, except the metering entry point.
pub fn check_name(name: &str) -> Result<(), ProgramError> {
    if name.starts_with('_') && name != METER_NAME { Err(invalid_name(name)) } else { Ok(()) }
}

/// Names starting with `_` cannot be bound at all.
pub fn check_binding(name: &str) -> Result<(), ProgramError> {
    if name.starts_with('_') { Err(invalid_name(name)) } else { Ok(()) }
}

/// Only the four basic arithmetic in-place operators are supported.
pub fn check_inplace(op: BinOp) -> Result<(), ProgramError> {
    if INPLACE_ALLOWED.contains(&op) {
        Ok(())
    } else {
        Err(ProgramError::new(
            ErrorKind::Syntax,
            format!("Unsupported in place op \"{}=\".", op.symbol()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::{Module, Namespace};
    use std::rc::Rc;

    #[test]
    fn test_underscore_names_denied() {
        assert!(check_attr("x").is_ok());
        let err = check_attr("__class__").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Runtime);
        assert!(check_attr("_private").is_err());
        assert!(check_item(&Value::str("_hidden")).is_err());
        assert!(check_item(&Value::Int(0)).is_ok());
    }

    #[test]
    fn test_store_targets() {
        let module = Value::Module(Rc::new(Module {
            name: "math".to_string(),
            ns: Rc::new(Namespace::new()),
        }));
        assert_eq!(check_store(&module).unwrap_err().message(), "Can't write to modules.");
        assert!(check_store(&Value::list(Vec::new())).is_ok());
    }

    #[test]
    fn test_private_names() {
        assert!(check_binding("__meter__").is_err());
        assert!(check_binding("_x").is_err());
        assert!(check_binding("x_").is_ok());
        assert!(check_name(METER_NAME).is_ok());
        assert_eq!(
            check_name("__name__").unwrap_err().message(),
            "\"__name__\" is an invalid variable name because it starts with \"_\""
        );
        assert!(check_name("_secret").is_err());
        assert!(check_name("turn").is_ok());
    }

    #[test]
    fn test_inplace_ops() {
        assert!(check_inplace(BinOp::Add).is_ok());
        assert!(check_inplace(BinOp::TrueDiv).is_ok());
        let err = check_inplace(BinOp::FloorDiv).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Syntax);
        assert_eq!(err.message(), "Unsupported in place op \"//=\".");
    }
}
