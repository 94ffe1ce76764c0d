//! Read-only program model handed out by [`super::ProgramQuery`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Root segment of every package path.
pub const CRATE_ROOT: &str = "crate";

// ============================================================================
// TARGET TYPE
// ============================================================================

/// Identity of a named type: the package (module path) declaring it plus its name.
///
/// This is the catalog cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetType {
    pub package: String,
    pub name: String,
}

impl TargetType {
    pub fn new(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            name: name.into(),
        }
    }

    /// Split a qualified path such as `crate::errors::AppError` at its last `::`.
    pub fn parse(path: &str) -> Option<Self> {
        let (package, name) = path.rsplit_once("::")?;
        if package.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(package, name))
    }

    /// `package::Name`
    pub fn qualified(&self) -> String {
        format!("{}::{}", self.package, self.name)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.package, self.name)
    }
}

// ============================================================================
// INTEGER KINDS
// ============================================================================

/// Integer primitive a named type can be built on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntKind {
    I8,
    I16,
    I32,
    I64,
    I128,
    Isize,
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
}

impl IntKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim() {
            "i8" => IntKind::I8,
            "i16" => IntKind::I16,
            "i32" => IntKind::I32,
            "i64" => IntKind::I64,
            "i128" => IntKind::I128,
            "isize" => IntKind::Isize,
            "u8" => IntKind::U8,
            "u16" => IntKind::U16,
            "u32" => IntKind::U32,
            "u64" => IntKind::U64,
            "u128" => IntKind::U128,
            "usize" => IntKind::Usize,
            _ => return None,
        };
        Some(kind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntKind::I8 => "i8",
            IntKind::I16 => "i16",
            IntKind::I32 => "i32",
            IntKind::I64 => "i64",
            IntKind::I128 => "i128",
            IntKind::Isize => "isize",
            IntKind::U8 => "u8",
            IntKind::U16 => "u16",
            IntKind::U32 => "u32",
            IntKind::U64 => "u64",
            IntKind::U128 => "u128",
            IntKind::Usize => "usize",
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            IntKind::I8 | IntKind::I16 | IntKind::I32 | IntKind::I64 | IntKind::I128 | IntKind::Isize
        )
    }

    pub fn bits(&self) -> u32 {
        match self {
            IntKind::I8 | IntKind::U8 => 8,
            IntKind::I16 | IntKind::U16 => 16,
            IntKind::I32 | IntKind::U32 => 32,
            IntKind::I64 | IntKind::U64 | IntKind::Isize | IntKind::Usize => 64,
            IntKind::I128 | IntKind::U128 => 128,
        }
    }

    /// Wrap `value` into this kind's range the way an `as` cast does.
    ///
    /// Returns `None` for `u128` values that cannot be held in an `i128`.
    pub fn wrap(&self, value: i128) -> Option<i128> {
        let bits = self.bits();
        if bits == 128 {
            return if self.is_signed() || value >= 0 {
                Some(value)
            } else {
                None
            };
        }
        let shift = 128 - bits;
        if self.is_signed() {
            Some((value << shift) >> shift)
        } else {
            Some(value & ((1i128 << bits) - 1))
        }
    }
}

impl fmt::Display for IntKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// DECLARATIONS
// ============================================================================

/// A named type together with the textual form of its underlying representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedType {
    pub target: TargetType,
    /// `i32` for `struct E(i32)`, the repr for fieldless enums, `enum`/`struct` shapes otherwise
    pub underlying: String,
    /// 1-based source line, 0 for external types
    pub line: usize,
}

impl NamedType {
    pub fn int_kind(&self) -> Option<IntKind> {
        IntKind::from_name(&self.underlying)
    }
}

/// A constant as the front end resolved it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantDeclaration {
    pub name: String,
    pub package: String,
    /// Named type of the constant; `None` for primitive or unresolvable types
    pub ty: Option<TargetType>,
    /// Decimal literal when the front end evaluated it, expression text otherwise
    pub value: String,
    pub doc: String,
    pub line: usize,
}

/// Any top-level declaration of a package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Declaration {
    Constant(ConstantDeclaration),
    Type(NamedType),
    Function { name: String, line: usize },
}

impl Declaration {
    pub fn as_constant(&self) -> Option<&ConstantDeclaration> {
        match self {
            Declaration::Constant(constant) => Some(constant),
            _ => None,
        }
    }
}

/// A method found in some `impl` block of a named type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    pub owner: TargetType,
    pub name: String,
    /// Package the `impl` block lives in, used for name resolution in the body
    pub package: String,
    /// Trait the method implements (last path segment), `None` for inherent methods
    pub trait_name: Option<String>,
    pub has_receiver: bool,
    /// Parameter count excluding the receiver
    pub arity: usize,
    /// Number of values returned (`()` = 0, tuples = element count)
    pub result_arity: usize,
    /// Body source text, evaluated on demand
    pub body: String,
    pub line: usize,
}

/// One `return` (or tail) expression of a function body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnSite {
    pub values: Vec<ReturnValue>,
}

/// A returned value after static evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnValue {
    /// Evaluated to an integer, rendered as a decimal literal
    Constant(String),
    /// Not statically evaluable; holds the expression text
    Opaque(String),
}

impl ReturnValue {
    pub fn literal(&self) -> Option<&str> {
        match self {
            ReturnValue::Constant(text) => Some(text),
            ReturnValue::Opaque(_) => None,
        }
    }
}
