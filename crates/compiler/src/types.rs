//! Type model for Ember.
//!
//! Numeric types are organized into three families (signed integer, float,
//! unsigned integer). A numeric type either carries a committed width
//! (`I32`, `U8`, `F64`, …) or is the width-polymorphic family type (`Int`,
//! `Float`, `Unsigned`) that resolves to a platform-dependent default. On
//! top of that sits the inference machinery: a type variable carries a
//! family tag and narrows to a concrete numeric type by unification, never
//! across families.

use std::fmt;
use std::sync::OnceLock;

/// Identity of a type variable; allocated monotonically by the checker.
pub type VarId = u32;

/// Coarse class over the numeric types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    Int,
    Float,
    Unsigned,
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::Int => write!(f, "Int"),
            Family::Float => write!(f, "Float"),
            Family::Unsigned => write!(f, "Unsigned"),
        }
    }
}

/// Committed bit width of a numeric type. Floats only use `W32`/`W64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    W8,
    W16,
    W32,
    W64,
}

impl Width {
    pub fn bits(self) -> u32 {
        match self {
            Width::W8 => 8,
            Width::W16 => 16,
            Width::W32 => 32,
            Width::W64 => 64,
        }
    }
}

/// A type attributed to an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Type {
    /// Sentinel for an expression that already produced a diagnostic;
    /// suppresses cascaded errors downstream.
    Error,
    Bool,
    Byte,
    String,
    Nil,
    /// A numeric type. `width: None` is the width-polymorphic family form
    /// (`Int`/`Float`/`Unsigned`) that defaults to the platform width.
    Num {
        family: Family,
        width: Option<Width>,
    },
    /// A family-constrained inference variable.
    Var { id: VarId, family: Family },
    Func {
        params: Vec<Type>,
        ret: Box<Type>,
    },
    List(Box<Type>),
    Tuple(Vec<Type>),
}

impl Type {
    pub fn int() -> Type {
        Type::Num {
            family: Family::Int,
            width: None,
        }
    }

    pub fn float() -> Type {
        Type::Num {
            family: Family::Float,
            width: None,
        }
    }

    pub fn unsigned() -> Type {
        Type::Num {
            family: Family::Unsigned,
            width: None,
        }
    }

    pub fn concrete(family: Family, width: Width) -> Type {
        Type::Num {
            family,
            width: Some(width),
        }
    }

    pub fn func(params: Vec<Type>, ret: Type) -> Type {
        Type::Func {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn list(elem: Type) -> Type {
        Type::List(Box::new(elem))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Type::Error)
    }

    /// The numeric family of this type, if it has one.
    pub fn family(&self) -> Option<Family> {
        match self {
            Type::Num { family, .. } | Type::Var { family, .. } => Some(*family),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Error => write!(f, "<error>"),
            Type::Bool => write!(f, "Bool"),
            Type::Byte => write!(f, "Byte"),
            Type::String => write!(f, "String"),
            Type::Nil => write!(f, "Nil"),
            Type::Num {
                family,
                width: None,
            } => write!(f, "{}", family),
            Type::Num {
                family,
                width: Some(w),
            } => {
                let letter = match family {
                    Family::Int => "I",
                    Family::Float => "F",
                    Family::Unsigned => "U",
                };
                write!(f, "{}{}", letter, w.bits())
            }
            // An unresolved variable reads as its family.
            Type::Var { family, .. } => write!(f, "{}", family),
            Type::Func { params, ret } => {
                let parts: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> {}", parts.join(", "), ret)
            }
            Type::List(elem) => write!(f, "List({})", elem),
            Type::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(|e| e.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}

static PLATFORM_INT_BITS: OnceLock<u32> = OnceLock::new();

/// Width of the platform's default integer, detected once per process.
pub fn platform_int_bits() -> u32 {
    *PLATFORM_INT_BITS.get_or_init(|| {
        if cfg!(target_pointer_width = "32") {
            32
        } else {
            64
        }
    })
}

/// The width an unresolved variable of this family defaults to at the end
/// of a top-level declaration.
pub fn default_width(family: Family) -> Width {
    match family {
        Family::Float => Width::W64,
        Family::Int | Family::Unsigned => {
            if platform_int_bits() == 32 {
                Width::W32
            } else {
                Width::W64
            }
        }
    }
}
