//! Type unification for the Ember checker.
//!
//! A [`Subst`] maps type-variable ids to types. Unification walks both
//! sides, binding variables through the substitution, committing numeric
//! widths within a family, and refusing any cross-family binding. An occurs
//! check prevents infinite types. Shared type nodes are never mutated in
//! place; all narrowing lives in the substitution.

use crate::types::{Type, VarId};
use std::collections::HashMap;

/// A substitution from type-variable ids to types.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Subst {
    map: HashMap<VarId, Type>,
}

impl Subst {
    pub fn new() -> Self {
        Subst::default()
    }

    /// Resolve a variable chain to its current representative.
    pub fn follow(&self, ty: &Type) -> Type {
        let mut current = ty.clone();
        while let Type::Var { id, .. } = current {
            match self.map.get(&id) {
                Some(bound) => current = bound.clone(),
                None => break,
            }
        }
        current
    }

    /// Apply the substitution throughout a type.
    pub fn apply(&self, ty: &Type) -> Type {
        let ty = self.follow(ty);
        match ty {
            Type::Func { params, ret } => Type::Func {
                params: params.iter().map(|p| self.apply(p)).collect(),
                ret: Box::new(self.apply(&ret)),
            },
            Type::List(elem) => Type::List(Box::new(self.apply(&elem))),
            Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| self.apply(e)).collect()),
            other => other,
        }
    }

    /// Whether a still-unbound variable is resolved by this substitution.
    pub fn is_bound(&self, id: VarId) -> bool {
        self.map.contains_key(&id)
    }

    /// Bind a variable directly. Used by family defaulting; `unify` is the
    /// checked path.
    pub fn insert(&mut self, id: VarId, ty: Type) {
        self.map.insert(id, ty);
    }

    fn occurs(&self, id: VarId, ty: &Type) -> bool {
        let ty = self.follow(ty);
        match ty {
            Type::Var { id: other, .. } => other == id,
            Type::Func { params, ret } => {
                params.iter().any(|p| self.occurs(id, p)) || self.occurs(id, &ret)
            }
            Type::List(elem) => self.occurs(id, &elem),
            Type::Tuple(elems) => elems.iter().any(|e| self.occurs(id, e)),
            _ => false,
        }
    }

    fn bind_var(&mut self, id: VarId, family: crate::types::Family, ty: &Type) -> Result<(), String> {
        if let Type::Var { id: other, .. } = ty {
            if *other == id {
                return Ok(());
            }
        }
        if self.occurs(id, ty) {
            return Err(format!(
                "infinite type: {} occurs in {}",
                Type::Var { id, family },
                ty
            ));
        }
        match ty.family() {
            Some(other_family) if other_family == family => {
                self.map.insert(id, ty.clone());
                Ok(())
            }
            Some(other_family) => Err(format!(
                "cannot unify type variables with different family constraints: {} vs {}",
                family, other_family
            )),
            None => Err(format!(
                "type mismatch: expected a {} value, got {}",
                family, ty
            )),
        }
    }

    /// Unify two types, recording any narrowing in the substitution.
    ///
    /// The error sentinel unifies with everything so one diagnosed mistake
    /// does not cascade.
    pub fn unify(&mut self, a: &Type, b: &Type) -> Result<(), String> {
        let a = self.follow(a);
        let b = self.follow(b);
        if a.is_error() || b.is_error() {
            return Ok(());
        }
        if let Type::Var { id, family } = a {
            return self.bind_var(id, family, &b);
        }
        if let Type::Var { id, family } = b {
            return self.bind_var(id, family, &a);
        }
        match (&a, &b) {
            (Type::Bool, Type::Bool)
            | (Type::Byte, Type::Byte)
            | (Type::String, Type::String)
            | (Type::Nil, Type::Nil) => Ok(()),
            (
                Type::Num {
                    family: fa,
                    width: wa,
                },
                Type::Num {
                    family: fb,
                    width: wb,
                },
            ) => {
                if fa != fb {
                    return Err(format!("cannot unify {} with {}", a, b));
                }
                match (wa, wb) {
                    (Some(x), Some(y)) if x != y => {
                        Err(format!("cannot unify concrete types {} and {}", a, b))
                    }
                    // One side width-polymorphic: compatible, the committed
                    // width (if any) stands.
                    _ => Ok(()),
                }
            }
            (
                Type::Func {
                    params: pa,
                    ret: ra,
                },
                Type::Func {
                    params: pb,
                    ret: rb,
                },
            ) => {
                if pa.len() != pb.len() {
                    return Err(format!(
                        "function arity mismatch: {} vs {}",
                        pa.len(),
                        pb.len()
                    ));
                }
                for (x, y) in pa.iter().zip(pb.iter()) {
                    self.unify(x, y)?;
                }
                self.unify(ra, rb)
            }
            (Type::List(ea), Type::List(eb)) => self.unify(ea, eb),
            (Type::Tuple(ea), Type::Tuple(eb)) => {
                if ea.len() != eb.len() {
                    return Err(format!(
                        "tuple length mismatch: {} vs {}",
                        ea.len(),
                        eb.len()
                    ));
                }
                for (x, y) in ea.iter().zip(eb.iter()) {
                    self.unify(x, y)?;
                }
                Ok(())
            }
            _ => Err(format!("cannot unify types {} and {}", a, b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Family, Width};

    fn var(id: VarId, family: Family) -> Type {
        Type::Var { id, family }
    }

    #[test]
    fn test_unify_concrete_primitives() {
        let mut s = Subst::new();
        assert!(s.unify(&Type::Bool, &Type::Bool).is_ok());
        assert!(s.unify(&Type::String, &Type::String).is_ok());
        assert!(s.unify(&Type::Bool, &Type::String).is_err());
    }

    #[test]
    fn test_var_binds_within_family() {
        let mut s = Subst::new();
        let v = var(1, Family::Int);
        let i32_ty = Type::concrete(Family::Int, Width::W32);
        s.unify(&v, &i32_ty).unwrap();
        assert_eq!(s.follow(&v), i32_ty);
    }

    #[test]
    fn test_var_refuses_cross_family() {
        let mut s = Subst::new();
        let v = var(1, Family::Unsigned);
        let err = s.unify(&v, &Type::int()).unwrap_err();
        assert!(err.contains("family"));
    }

    #[test]
    fn test_var_refuses_non_numeric() {
        let mut s = Subst::new();
        let v = var(1, Family::Int);
        assert!(s.unify(&v, &Type::Bool).is_err());
    }

    #[test]
    fn test_two_vars_same_family_link() {
        let mut s = Subst::new();
        let a = var(1, Family::Int);
        let b = var(2, Family::Int);
        s.unify(&a, &b).unwrap();
        // Committing either one commits both.
        s.unify(&b, &Type::concrete(Family::Int, Width::W16)).unwrap();
        assert_eq!(s.follow(&a), Type::concrete(Family::Int, Width::W16));
    }

    #[test]
    fn test_var_with_itself_is_noop() {
        let mut s = Subst::new();
        let v = var(3, Family::Float);
        s.unify(&v, &v).unwrap();
        assert!(!s.is_bound(3));
    }

    #[test]
    fn test_concrete_widths_must_match() {
        let mut s = Subst::new();
        let a = Type::concrete(Family::Int, Width::W8);
        let b = Type::concrete(Family::Int, Width::W64);
        assert!(s.unify(&a, &b).is_err());
        assert!(s.unify(&a, &a.clone()).is_ok());
    }

    #[test]
    fn test_occurs_check() {
        let mut s = Subst::new();
        let v = var(1, Family::Int);
        let inf = Type::list(var(1, Family::Int));
        let err = s.unify(&v, &inf).unwrap_err();
        assert!(err.contains("infinite type"));
    }

    #[test]
    fn test_function_unification() {
        let mut s = Subst::new();
        let f1 = Type::func(vec![var(1, Family::Int)], Type::Bool);
        let f2 = Type::func(vec![Type::concrete(Family::Int, Width::W64)], Type::Bool);
        s.unify(&f1, &f2).unwrap();
        assert_eq!(
            s.follow(&var(1, Family::Int)),
            Type::concrete(Family::Int, Width::W64)
        );

        let f3 = Type::func(vec![], Type::Bool);
        assert!(s.unify(&f1, &f3).is_err());
    }

    #[test]
    fn test_tuple_and_list_unification() {
        let mut s = Subst::new();
        let t1 = Type::Tuple(vec![Type::String, var(1, Family::Float)]);
        let t2 = Type::Tuple(vec![Type::String, Type::concrete(Family::Float, Width::W32)]);
        s.unify(&t1, &t2).unwrap();
        assert_eq!(
            s.follow(&var(1, Family::Float)),
            Type::concrete(Family::Float, Width::W32)
        );

        assert!(s
            .unify(&Type::list(Type::Bool), &Type::list(Type::String))
            .is_err());
        let t3 = Type::Tuple(vec![Type::Bool]);
        assert!(s.unify(&t1, &t3).is_err());
    }

    #[test]
    fn test_error_sentinel_suppresses() {
        let mut s = Subst::new();
        assert!(s.unify(&Type::Error, &Type::Bool).is_ok());
        assert!(s.unify(&Type::list(Type::Nil), &Type::Error).is_ok());
    }

    #[test]
    fn test_apply_walks_structure() {
        let mut s = Subst::new();
        s.unify(&var(1, Family::Int), &Type::concrete(Family::Int, Width::W32))
            .unwrap();
        let fn_ty = Type::func(vec![var(1, Family::Int)], Type::list(var(1, Family::Int)));
        assert_eq!(
            s.apply(&fn_ty),
            Type::func(
                vec![Type::concrete(Family::Int, Width::W32)],
                Type::list(Type::concrete(Family::Int, Width::W32))
            )
        );
    }
}
