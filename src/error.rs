//! Errors raised inside competitor programs.
//!
//! A [`ProgramError`] is the runtime's equivalent of an exception: it has a
//! kind (used by `except` matching and by the upstream report), a message, and
//! a traceback that grows as the error unwinds through interpreter frames.

use std::fmt;

use crate::game::GameActionKind;

/// Classification of a program-level error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A rejected game action, carrying the remote exception kind.
    GameAction(GameActionKind),
    /// A plain `Exception` raised by the program itself.
    Exception,
    /// Operation applied to a value of the wrong type.
    Type,
    /// Unbound name.
    Name,
    /// Missing attribute.
    Attribute,
    /// Sequence index out of range.
    Index,
    /// Missing dictionary key.
    Key,
    /// Argument with the right type but an unusable value.
    Value,
    /// Division or modulo by zero.
    ZeroDivision,
    /// Integer arithmetic left the 64-bit range.
    Overflow,
    /// Import rejected by the loader.
    Import,
    /// Construct rejected by the sandbox before it could run.
    Syntax,
    /// Sandbox violation or interpreter invariant failure.
    Runtime,
    /// Call depth limit exceeded.
    Recursion,
    /// A sequence would grow past the size limit.
    Memory,
}

impl ErrorKind {
    /// Name shown in tracebacks.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GameAction(_) => "GameActionException",
            Self::Exception => "Exception",
            Self::Type => "TypeError",
            Self::Name => "NameError",
            Self::Attribute => "AttributeError",
            Self::Index => "IndexError",
            Self::Key => "KeyError",
            Self::Value => "ValueError",
            Self::ZeroDivision => "ZeroDivisionError",
            Self::Overflow => "OverflowError",
            Self::Import => "ImportError",
            Self::Syntax => "SyntaxError",
            Self::Runtime => "RuntimeError",
            Self::Recursion => "RecursionError",
            Self::Memory => "MemoryError",
        }
    }

    /// All kinds that can be named from program code, for the builtins table.
    pub const NAMED: [Self; 14] = [
        Self::Exception,
        Self::Type,
        Self::Name,
        Self::Attribute,
        Self::Index,
        Self::Key,
        Self::Value,
        Self::ZeroDivision,
        Self::Overflow,
        Self::Import,
        Self::Syntax,
        Self::Runtime,
        Self::Recursion,
        Self::Memory,
    ];
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One frame of a traceback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEntry {
    /// Source file (bundle module name).
    pub file: String,
    /// Source line, if the line table covers the failing instruction.
    pub line: Option<u32>,
    /// Name of the code unit.
    pub scope: String,
}

/// An error raised inside a running program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramError {
    kind: ErrorKind,
    message: String,
    /// Innermost frame first.
    traceback: Vec<TraceEntry>,
}

impl ProgramError {
    /// Create an error with an empty traceback.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            traceback: Vec::new(),
        }
    }

    /// Shorthand for a `TypeError`.
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    /// Shorthand for a `ValueError`.
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Value, message)
    }

    /// Shorthand for a `RuntimeError`.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    /// Shorthand for an `ImportError`.
    pub fn import(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Import, message)
    }

    /// The error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Traceback entries, innermost first.
    #[must_use]
    pub fn traceback(&self) -> &[TraceEntry] {
        &self.traceback
    }

    /// Record that the error unwound through a frame.
    pub fn push_frame(&mut self, entry: TraceEntry) {
        self.traceback.push(entry);
    }

    /// Render the full report sent upstream and shown to competitors.
    #[must_use]
    pub fn format_traceback(&self) -> String {
        let mut out = String::from("Traceback (most recent call last):\n");
        for entry in self.traceback.iter().rev() {
            match entry.line {
                Some(line) => out.push_str(&format!(
                    "  File \"{}\", line {line}, in {}\n",
                    entry.file, entry.scope
                )),
                None => out.push_str(&format!("  File \"{}\", in {}\n", entry.file, entry.scope)),
            }
        }
        out.push_str(&self.to_string());
        out.push('\n');
        out
    }
}

impl fmt::Display for ProgramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::GameAction(kind) => {
                write!(f, "{}({}): {}", self.kind, kind.name(), self.message)
            }
            _ if self.message.is_empty() => write!(f, "{}", self.kind),
            _ => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ProgramError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_kind() {
        let err = ProgramError::type_error("bad operand");
        assert_eq!(err.to_string(), "TypeError: bad operand");

        let err = ProgramError::new(ErrorKind::GameAction(GameActionKind::CantMoveThere), "wall");
        assert_eq!(err.to_string(), "GameActionException(CANT_MOVE_THERE): wall");
    }

    #[test]
    fn test_traceback_is_outermost_first() {
        let mut err = ProgramError::runtime("boom");
        err.push_frame(TraceEntry {
            file: "helper".to_string(),
            line: Some(9),
            scope: "step".to_string(),
        });
        err.push_frame(TraceEntry {
            file: "bot".to_string(),
            line: Some(3),
            scope: "turn".to_string(),
        });

        let text = err.format_traceback();
        let bot = text.find("File \"bot\"").unwrap();
        let helper = text.find("File \"helper\"").unwrap();
        assert!(bot < helper);
        assert!(text.ends_with("RuntimeError: boom\n"));
    }
}
