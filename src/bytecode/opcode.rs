//! Opcode table.
//!
//! Every instruction is one or more 16-bit words: an opcode byte followed by an
//! operand byte. Operands wider than a byte are built from `EXTENDED_ARG`
//! prefix words (most significant byte first), and a few opcodes are followed
//! by inline `CACHE` words that the interpreter skips.

/// How a jump operand is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumpKind {
    /// Operand is the target's word index.
    Absolute,
    /// Operand is the distance forward from the end of the jumping instruction.
    Forward,
    /// Operand is the distance backward from the end of the jumping instruction.
    Backward,
}

macro_rules! opcodes {
    ($($variant:ident = $byte:literal => $mnemonic:literal),+ $(,)?) => {
        /// An instruction opcode.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum Opcode {
            $(
                #[doc = concat!("`", $mnemonic, "`")]
                $variant = $byte,
            )+
        }

        impl Opcode {
            /// Decode an opcode byte.
            #[must_use]
            pub const fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Self::$variant),)+
                    _ => None,
                }
            }

            /// Assembler mnemonic.
            #[must_use]
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$variant => $mnemonic,)+
                }
            }

            /// Look up an opcode by mnemonic.
            #[must_use]
            pub fn from_mnemonic(text: &str) -> Option<Self> {
                match text {
                    $($mnemonic => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

opcodes! {
    Cache = 0 => "cache",
    PopTop = 1 => "pop_top",
    Nop = 2 => "nop",
    UnaryNeg = 3 => "unary_neg",
    UnaryNot = 4 => "unary_not",
    GetIter = 5 => "get_iter",
    BinarySubscr = 6 => "binary_subscr",
    StoreSubscr = 7 => "store_subscr",
    ReturnValue = 8 => "return_value",
    ImportStar = 9 => "import_star",
    PopBlock = 10 => "pop_block",
    Raise = 11 => "raise",
    Reraise = 12 => "reraise",
    Resume = 13 => "resume",
    Copy = 30 => "copy",
    Swap = 31 => "swap",
    StoreName = 32 => "store_name",
    StoreAttr = 33 => "store_attr",
    StoreGlobal = 34 => "store_global",
    LoadConst = 35 => "load_const",
    LoadName = 36 => "load_name",
    BuildTuple = 37 => "build_tuple",
    BuildList = 38 => "build_list",
    BuildMap = 39 => "build_map",
    LoadAttr = 40 => "load_attr",
    CompareOp = 41 => "compare_op",
    ImportName = 42 => "import_name",
    ImportFrom = 43 => "import_from",
    JumpForward = 44 => "jump_forward",
    JumpBackward = 45 => "jump_backward",
    ForIter = 46 => "for_iter",
    SetupExcept = 47 => "setup_except",
    PopJumpIfFalse = 48 => "pop_jump_if_false",
    PopJumpIfTrue = 49 => "pop_jump_if_true",
    JumpAbsolute = 50 => "jump_absolute",
    LoadGlobal = 51 => "load_global",
    LoadFast = 52 => "load_fast",
    StoreFast = 53 => "store_fast",
    CallFunction = 54 => "call_function",
    MakeFunction = 55 => "make_function",
    BinaryOp = 56 => "binary_op",
    InplaceOp = 57 => "inplace_op",
    UnpackSequence = 58 => "unpack_sequence",
    KwNames = 59 => "kw_names",
    ExtendedArg = 60 => "extended_arg",
}

/// Opcodes at or above this value use their operand.
pub const HAVE_ARGUMENT: u8 = 30;

/// `make_function` flag: a tuple of default values sits below the code object.
pub const MAKE_FUNCTION_DEFAULTS: u32 = 0x01;

impl Opcode {
    /// The opcode byte.
    #[must_use]
    pub const fn byte(self) -> u8 {
        self as u8
    }

    /// Whether the operand byte is meaningful.
    #[must_use]
    pub const fn has_arg(self) -> bool {
        self as u8 >= HAVE_ARGUMENT
    }

    /// Jump classification, if this opcode transfers control.
    #[must_use]
    pub const fn jump_kind(self) -> Option<JumpKind> {
        match self {
            Self::JumpForward | Self::ForIter | Self::SetupExcept => Some(JumpKind::Forward),
            Self::JumpBackward => Some(JumpKind::Backward),
            Self::PopJumpIfFalse | Self::PopJumpIfTrue | Self::JumpAbsolute => {
                Some(JumpKind::Absolute)
            }
            _ => None,
        }
    }

    /// Number of inline `CACHE` words following the instruction.
    #[must_use]
    pub const fn caches(self) -> usize {
        match self {
            Self::LoadAttr | Self::BinarySubscr | Self::CallFunction => 1,
            _ => 0,
        }
    }

    /// Whether execution never falls through to the next instruction.
    #[must_use]
    pub const fn is_terminator(self) -> bool {
        matches!(
            self,
            Self::ReturnValue
                | Self::Raise
                | Self::Reraise
                | Self::JumpForward
                | Self::JumpBackward
                | Self::JumpAbsolute
        )
    }

    /// Net stack effect. `jump` selects the effect along the taken branch.
    #[must_use]
    pub fn stack_effect(self, arg: u32, jump: bool) -> i64 {
        let n = i64::from(arg);
        match self {
            Self::Cache
            | Self::Nop
            | Self::UnaryNeg
            | Self::UnaryNot
            | Self::GetIter
            | Self::PopBlock
            | Self::Resume
            | Self::Swap
            | Self::LoadAttr
            | Self::JumpForward
            | Self::JumpBackward
            | Self::JumpAbsolute
            | Self::KwNames
            | Self::ExtendedArg => 0,
            Self::PopTop
            | Self::BinarySubscr
            | Self::ReturnValue
            | Self::ImportStar
            | Self::Raise
            | Self::Reraise
            | Self::StoreName
            | Self::StoreGlobal
            | Self::CompareOp
            | Self::PopJumpIfFalse
            | Self::PopJumpIfTrue
            | Self::StoreFast
            | Self::BinaryOp
            | Self::InplaceOp => -1,
            Self::StoreSubscr => -3,
            Self::StoreAttr => -2,
            Self::Copy
            | Self::LoadConst
            | Self::LoadName
            | Self::ImportName
            | Self::ImportFrom
            | Self::LoadGlobal
            | Self::LoadFast => 1,
            Self::BuildTuple | Self::BuildList => 1 - n,
            Self::BuildMap => 1 - 2 * n,
            Self::ForIter => {
                if jump {
                    -1
                } else {
                    1
                }
            }
            Self::SetupExcept => i64::from(jump),
            Self::CallFunction => -n,
            Self::MakeFunction => {
                if arg & MAKE_FUNCTION_DEFAULTS == 0 {
                    0
                } else {
                    -1
                }
            }
            Self::UnpackSequence => n - 1,
        }
    }
}

/// Operators for `binary_op` and `inplace_op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    TrueDiv,
    /// `//`
    FloorDiv,
    /// `%`
    Mod,
    /// `**`
    Pow,
    /// `&`
    And,
    /// `|`
    Or,
    /// `^`
    Xor,
    /// `<<`
    Shl,
    /// `>>`
    Shr,
}

impl BinOp {
    const ALL: [Self; 12] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::TrueDiv,
        Self::FloorDiv,
        Self::Mod,
        Self::Pow,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::Shl,
        Self::Shr,
    ];

    /// Decode an operand.
    #[must_use]
    pub fn from_arg(arg: u32) -> Option<Self> {
        usize::try_from(arg).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Encode as an operand.
    #[must_use]
    pub const fn arg(self) -> u32 {
        self as u32
    }

    /// Operator symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::TrueDiv => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::And => "&",
            Self::Or => "|",
            Self::Xor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
        }
    }

    /// Parse an operator symbol.
    #[must_use]
    pub fn from_symbol(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == text)
    }
}

/// Operators for `compare_op`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `in`
    In,
    /// `not in`
    NotIn,
    /// `is`
    Is,
    /// `is not`
    IsNot,
    /// Exception matches class (used by `except` clauses).
    ExcMatch,
}

impl CmpOp {
    const ALL: [Self; 11] = [
        Self::Lt,
        Self::Le,
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Ge,
        Self::In,
        Self::NotIn,
        Self::Is,
        Self::IsNot,
        Self::ExcMatch,
    ];

    /// Decode an operand.
    #[must_use]
    pub fn from_arg(arg: u32) -> Option<Self> {
        usize::try_from(arg).ok().and_then(|i| Self::ALL.get(i).copied())
    }

    /// Encode as an operand.
    #[must_use]
    pub const fn arg(self) -> u32 {
        self as u32
    }

    /// Assembler spelling.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::In => "in",
            Self::NotIn => "not_in",
            Self::Is => "is",
            Self::IsNot => "is_not",
            Self::ExcMatch => "exc_match",
        }
    }

    /// Parse an assembler spelling.
    #[must_use]
    pub fn from_symbol(text: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.symbol() == text)
    }
}
