//! Compiled units.

use std::sync::Arc;

/// Flags on a compiled unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodeFlags(u8);

impl CodeFlags {
    /// Locals live only in fast slots; name lookups in the frame are illegal.
    pub const OPTIMIZED: Self = Self(0x01);
    /// Calling the unit creates a fresh local scope.
    pub const NEWLOCALS: Self = Self(0x02);
    /// The unit has been through the instrumenter.
    pub const METERED: Self = Self(0x04);

    /// No flags set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set `other`.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Clear `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }
}

/// An entry in a constant pool.
#[derive(Debug, Clone)]
pub enum Const {
    /// `none`
    None,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// String literal.
    Str(String),
    /// Nested compiled unit (a function body).
    Code(Arc<CodeObject>),
    /// Tuple of constants (keyword name lists).
    Tuple(Vec<Const>),
}

impl Const {
    /// Structural identity used to deduplicate pool entries.
    ///
    /// Floats compare by bit pattern and nested units by pointer.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Code(a), Self::Code(b)) => Arc::ptr_eq(a, b),
            (Self::Tuple(a), Self::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same(y))
            }
            _ => false,
        }
    }
}

/// One executable block: a module body or a function body.
///
/// Units are immutable once built. The instrumenter produces a new unit
/// rather than editing one in place.
#[derive(Debug, Clone)]
pub struct CodeObject {
    /// Unit name (`<module>` or the function name).
    pub name: String,
    /// Bundle module the unit was assembled from.
    pub filename: String,
    /// Source line of the unit header.
    pub first_line: u32,
    /// Number of positional parameters (the first entries of `varnames`).
    pub argcount: u32,
    /// Fast-local slot names.
    pub varnames: Vec<String>,
    /// Names used by name, global, attribute and import opcodes.
    pub names: Vec<String>,
    /// Constant pool.
    pub consts: Vec<Const>,
    /// Encoded wordcode.
    pub code: Vec<u8>,
    /// Encoded line table.
    pub linetable: Vec<u8>,
    /// Maximum operand stack depth.
    pub stacksize: u32,
    /// Unit flags.
    pub flags: CodeFlags,
}

impl CodeObject {
    /// Number of 16-bit words in the code.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.code.len() / 2
    }

    /// Nested units in the constant pool.
    pub fn nested(&self) -> impl Iterator<Item = &Arc<CodeObject>> {
        self.consts.iter().filter_map(|c| match c {
            Const::Code(code) => Some(code),
            _ => None,
        })
    }

    /// Look up a nested unit by name.
    #[must_use]
    pub fn find_nested(&self, name: &str) -> Option<&Arc<CodeObject>> {
        self.nested().find(|code| code.name == name)
    }

    /// Source line of the instruction starting at word `index`.
    #[must_use]
    pub fn line_at(&self, index: usize) -> Option<u32> {
        super::linetable::decode(self.first_line, &self.linetable)
            .ok()
            .and_then(|lines| lines.get(index).copied().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_arithmetic() {
        let flags = CodeFlags::OPTIMIZED.with(CodeFlags::NEWLOCALS);
        assert!(flags.contains(CodeFlags::OPTIMIZED));
        let cleared = flags.without(CodeFlags::OPTIMIZED);
        assert!(!cleared.contains(CodeFlags::OPTIMIZED));
        assert!(cleared.contains(CodeFlags::NEWLOCALS));
        assert_eq!(CodeFlags::empty().bits(), 0);
    }

    #[test]
    fn test_const_identity() {
        assert!(Const::Float(0.5).same(&Const::Float(0.5)));
        assert!(!Const::Int(1).same(&Const::Float(1.0)));
        assert!(
            Const::Tuple(vec![Const::Str("a".into())])
                .same(&Const::Tuple(vec![Const::Str("a".into())]))
        );
    }
}
