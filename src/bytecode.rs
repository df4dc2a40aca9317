//! Bytecode model.
//!
//! Programs are compiled into [`CodeObject`]s holding compact wordcode. This
//! module provides:
//! - The opcode table and operator encodings
//! - Decoding wordcode into a structured [`Instruction`] list with jump
//!   targets resolved by index, and laying such a list back out
//! - The line table codec
//! - A textual assembler that turns `.rasm` sources into compiled units
//!
//! # Architecture
//!
//! ```text
//! .rasm source ──asm──► CodeObject ──decode──► [Instruction] ──encode──► CodeObject
//!                                        (instrumenter rewrites here)
//! ```

mod asm;
mod code;
pub mod linetable;
mod listing;
mod opcode;

pub use asm::{AssembleError, MODULE_UNIT, assemble};
pub use code::{CodeFlags, CodeObject, Const};
pub use listing::{
    Instruction, LayoutError, decode, disassemble, encode, lines_by_word, prefix_for,
};
pub use opcode::{BinOp, CmpOp, HAVE_ARGUMENT, JumpKind, MAKE_FUNCTION_DEFAULTS, Opcode};

use std::fmt;

/// Errors found while decoding wordcode or its line table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Code length is not a whole number of words.
    OddLength,
    /// Unknown opcode byte at a word index.
    UnknownOpcode {
        /// Word index.
        word: usize,
        /// Offending byte.
        byte: u8,
    },
    /// An instruction is missing one of its inline cache words.
    MissingCache {
        /// Word index of the instruction.
        word: usize,
    },
    /// `EXTENDED_ARG` prefixes at the end of the code.
    DanglingPrefix,
    /// A jump lands outside the code or inside another instruction.
    BadJumpTarget {
        /// Word index of the jumping instruction.
        word: usize,
        /// Word index it points at.
        target: i64,
    },
    /// Malformed line table.
    LineTable(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OddLength => write!(f, "code length is not a whole number of words"),
            Self::UnknownOpcode { word, byte } => {
                write!(f, "unknown opcode {byte:#04x} at word {word}")
            }
            Self::MissingCache { word } => {
                write!(f, "instruction at word {word} is missing its cache words")
            }
            Self::DanglingPrefix => write!(f, "extended_arg prefix without an instruction"),
            Self::BadJumpTarget { word, target } => {
                write!(f, "jump at word {word} targets word {target}, which starts no instruction")
            }
            Self::LineTable(reason) => write!(f, "malformed line table: {reason}"),
        }
    }
}

impl std::error::Error for DecodeError {}
