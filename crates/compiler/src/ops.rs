//! Operator signature tables.
//!
//! Each operator kind maps to a list of signatures. A signature matches
//! when both operand types equal its declared types; the width-polymorphic
//! entries (`Int`, `Float`, `Unsigned`) are instantiated with fresh
//! family-constrained variables by the checker and matched by unification,
//! which is how `10 + 1` narrows to `U32` under a `U32` annotation.

use crate::token::TokenKind;
use crate::types::{Family, Type, Width};
use std::collections::HashMap;

/// Signature of a binary operator: `(left, right) -> out`.
#[derive(Debug, Clone, PartialEq)]
pub struct BinOpSig {
    pub left: Type,
    pub right: Type,
    pub out: Type,
}

/// Signature of a unary operator: `(arg) -> out`.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOpSig {
    pub arg: Type,
    pub out: Type,
}

const WIDTHS: [Width; 4] = [Width::W8, Width::W16, Width::W32, Width::W64];

/// Every integer and unsigned operand type: the two family-polymorphic
/// forms plus all eight concrete widths.
fn integer_kinds() -> Vec<Type> {
    let mut kinds = vec![Type::int()];
    kinds.extend(WIDTHS.iter().map(|w| Type::concrete(Family::Int, *w)));
    kinds.push(Type::unsigned());
    kinds.extend(WIDTHS.iter().map(|w| Type::concrete(Family::Unsigned, *w)));
    kinds
}

/// Every float operand type: `Float`, `F32`, `F64`.
fn float_kinds() -> Vec<Type> {
    vec![
        Type::float(),
        Type::concrete(Family::Float, Width::W32),
        Type::concrete(Family::Float, Width::W64),
    ]
}

fn same_type_sigs(kinds: &[Type]) -> Vec<BinOpSig> {
    kinds
        .iter()
        .map(|ty| BinOpSig {
            left: ty.clone(),
            right: ty.clone(),
            out: ty.clone(),
        })
        .collect()
}

fn comparison_sigs(kinds: &[Type]) -> Vec<BinOpSig> {
    kinds
        .iter()
        .map(|ty| BinOpSig {
            left: ty.clone(),
            right: ty.clone(),
            out: Type::Bool,
        })
        .collect()
}

/// The binary operator table (§ operator signatures).
pub fn binary_signatures() -> HashMap<TokenKind, Vec<BinOpSig>> {
    let mut table = HashMap::new();
    let ints = integer_kinds();
    let floats = float_kinds();

    // Integer arithmetic: every matched pair, result = same type.
    for op in [
        TokenKind::Plus,
        TokenKind::Minus,
        TokenKind::Star,
        TokenKind::Slash,
        TokenKind::Percent,
    ] {
        table.insert(op, same_type_sigs(&ints));
    }

    // Float arithmetic.
    for op in [
        TokenKind::PlusDot,
        TokenKind::MinusDot,
        TokenKind::StarDot,
        TokenKind::SlashDot,
    ] {
        table.insert(op, same_type_sigs(&floats));
    }

    // Integer/unsigned comparisons.
    for op in [
        TokenKind::Less,
        TokenKind::Greater,
        TokenKind::LessEqual,
        TokenKind::GreaterEqual,
    ] {
        table.insert(op, comparison_sigs(&ints));
    }

    // Float comparisons.
    for op in [
        TokenKind::LessDot,
        TokenKind::GreaterDot,
        TokenKind::LessEqualDot,
        TokenKind::GreaterEqualDot,
    ] {
        table.insert(op, comparison_sigs(&floats));
    }

    // Equality: every primitive matched with itself.
    let mut eq_kinds = ints.clone();
    eq_kinds.extend(floats.clone());
    eq_kinds.push(Type::Bool);
    eq_kinds.push(Type::Byte);
    eq_kinds.push(Type::String);
    eq_kinds.push(Type::Nil);
    for op in [TokenKind::EqualEqual, TokenKind::NotEqual] {
        table.insert(op, comparison_sigs(&eq_kinds));
    }

    // Logical.
    let bool_sig = vec![BinOpSig {
        left: Type::Bool,
        right: Type::Bool,
        out: Type::Bool,
    }];
    table.insert(TokenKind::AmperAmper, bool_sig.clone());
    table.insert(TokenKind::VbarVbar, bool_sig);

    table
}

/// The unary operator table.
pub fn unary_signatures() -> HashMap<TokenKind, Vec<UnaryOpSig>> {
    let mut table = HashMap::new();

    table.insert(
        TokenKind::Minus,
        integer_kinds()
            .into_iter()
            .map(|ty| UnaryOpSig {
                arg: ty.clone(),
                out: ty,
            })
            .collect::<Vec<_>>(),
    );
    table.insert(
        TokenKind::MinusDot,
        float_kinds()
            .into_iter()
            .map(|ty| UnaryOpSig {
                arg: ty.clone(),
                out: ty,
            })
            .collect::<Vec<_>>(),
    );
    table.insert(
        TokenKind::Bang,
        vec![UnaryOpSig {
            arg: Type::Bool,
            out: Type::Bool,
        }],
    );

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic_covers_all_widths() {
        let table = binary_signatures();
        let plus = &table[&TokenKind::Plus];
        // Int + 4 widths + Unsigned + 4 widths.
        assert_eq!(plus.len(), 10);
        assert!(plus.iter().all(|s| s.left == s.right && s.left == s.out));
        assert!(plus.iter().any(|s| s.left == Type::int()));
        assert!(
            plus.iter()
                .any(|s| s.left == Type::concrete(Family::Unsigned, Width::W8))
        );
    }

    #[test]
    fn test_float_arithmetic() {
        let table = binary_signatures();
        let plus_dot = &table[&TokenKind::PlusDot];
        assert_eq!(plus_dot.len(), 3);
        assert!(plus_dot.iter().all(|s| s.out == s.left));
    }

    #[test]
    fn test_comparisons_produce_bool() {
        let table = binary_signatures();
        for op in [TokenKind::Less, TokenKind::GreaterEqual] {
            assert!(table[&op].iter().all(|s| s.out == Type::Bool));
            assert_eq!(table[&op].len(), 10);
        }
        assert_eq!(table[&TokenKind::LessDot].len(), 3);
    }

    #[test]
    fn test_equality_admits_every_primitive() {
        let table = binary_signatures();
        let eq = &table[&TokenKind::EqualEqual];
        assert!(eq.iter().any(|s| s.left == Type::Bool));
        assert!(eq.iter().any(|s| s.left == Type::String));
        assert!(eq.iter().any(|s| s.left == Type::Byte));
        assert!(eq.iter().any(|s| s.left == Type::float()));
        assert!(eq.iter().all(|s| s.out == Type::Bool && s.left == s.right));
    }

    #[test]
    fn test_logical_is_bool_only() {
        let table = binary_signatures();
        assert_eq!(table[&TokenKind::AmperAmper].len(), 1);
        assert_eq!(table[&TokenKind::AmperAmper][0].left, Type::Bool);
    }

    #[test]
    fn test_unary_tables() {
        let table = unary_signatures();
        assert_eq!(table[&TokenKind::Minus].len(), 10);
        assert_eq!(table[&TokenKind::MinusDot].len(), 3);
        assert_eq!(table[&TokenKind::Bang].len(), 1);
        // No float negation under integer '-'.
        assert!(
            table[&TokenKind::Minus]
                .iter()
                .all(|s| s.arg.family() != Some(Family::Float))
        );
    }
}
