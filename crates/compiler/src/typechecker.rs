//! Type checker for Ember.
//!
//! Attributes every expression with a [`Type`], accumulating diagnostics
//! instead of aborting: an ill-typed expression gets the error sentinel,
//! which unifies with everything so one mistake is reported once.
//!
//! Numeric inference works through family-constrained variables: each
//! unannotated numeric literal gets a fresh variable tagged with its family
//! (`Int`/`Float`/`Unsigned`), operator signatures and annotations narrow
//! those variables by unification, and whatever is still unresolved at the
//! end of a top-level declaration defaults to the platform width.

use crate::ast::{Expr, FuncDecl, Program};
use crate::diagnostics::Diagnostic;
use crate::ops::{BinOpSig, UnaryOpSig, binary_signatures, unary_signatures};
use crate::resolver::{ModuleEnv, ModuleResolver};
use crate::token::{Token, TokenKind};
use crate::types::{Family, Type, VarId, default_width};
use crate::unification::Subst;
use std::collections::HashMap;
use tracing::debug;

/// A single lexical binding.
#[derive(Debug, Clone)]
struct VarInfo {
    ty: Type,
    mutable: bool,
}

#[derive(Debug, Default)]
struct Scope {
    vars: HashMap<String, VarInfo>,
}

/// Whether the checker is at the top level or inside a function body.
/// Mutable declarations, `if`, `match`, and pipelines are rejected at the
/// top level even when internally well-typed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    TopLevel,
    FunctionBody,
}

/// Format a module's sorted member list for has-no-member errors, so a
/// misspelled import points at what the module actually exports.
fn member_hint(env: &ModuleEnv) -> String {
    let mut names: Vec<&str> = env.iter().map(|(name, _)| name.as_str()).collect();
    if names.is_empty() {
        return String::new();
    }
    names.sort_unstable();
    format!(" (available members: {})", names.join(", "))
}

pub struct TypeChecker {
    scopes: Vec<Scope>,
    /// Module alias → module environment, installed by `use`.
    modules: HashMap<String, ModuleEnv>,
    subst: Subst,
    diagnostics: Vec<Diagnostic>,
    ctx: Context,
    /// Monotonic allocator for type-variable ids.
    next_var: VarId,
    /// Variables allocated since the last top-level defaulting pass.
    pending: Vec<(VarId, Family)>,
    resolver: Option<Box<dyn ModuleResolver>>,
    bin_ops: HashMap<TokenKind, Vec<BinOpSig>>,
    unary_ops: HashMap<TokenKind, Vec<UnaryOpSig>>,
    /// Checked top-level function signatures, for the backend.
    fn_types: HashMap<String, Type>,
}

impl Default for TypeChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker {
            scopes: vec![Scope::default()],
            modules: HashMap::new(),
            subst: Subst::new(),
            diagnostics: Vec::new(),
            ctx: Context::TopLevel,
            next_var: 0,
            pending: Vec::new(),
            resolver: None,
            bin_ops: binary_signatures(),
            unary_ops: unary_signatures(),
            fn_types: HashMap::new(),
        }
    }

    /// Attach the module resolver consulted by `use` directives.
    pub fn with_resolver(mut self, resolver: Box<dyn ModuleResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Check a whole program, returning every diagnostic produced.
    pub fn check_program(&mut self, program: &Program) -> Vec<Diagnostic> {
        debug!(exprs = program.exprs.len(), "type checking program");
        for expr in &program.exprs {
            self.check(expr);
            self.default_pending();
        }
        debug!(
            diagnostics = self.diagnostics.len(),
            "type checking finished"
        );
        std::mem::take(&mut self.diagnostics)
    }

    /// Check a single expression, for read-eval bridges. Returns the
    /// resolved type or the first error produced.
    pub fn check_expr(&mut self, expr: &Expr) -> Result<Type, Diagnostic> {
        let ty = self.check(expr);
        self.default_pending();
        let mut produced: Vec<Diagnostic> = std::mem::take(&mut self.diagnostics);
        match produced
            .iter()
            .position(|d| d.severity == crate::diagnostics::Severity::Error)
        {
            Some(i) => Err(produced.swap_remove(i)),
            None => Ok(self.resolved(&ty)),
        }
    }

    /// The checked signatures of every top-level function, fully resolved.
    /// Feed these to a backend along with the platform width.
    pub fn take_function_types(&mut self) -> HashMap<String, Type> {
        let fn_types = std::mem::take(&mut self.fn_types);
        fn_types
            .into_iter()
            .map(|(name, ty)| {
                let ty = self.subst.apply(&ty);
                (name, ty)
            })
            .collect()
    }

    /// Fully resolve a type against the current substitution.
    pub fn resolved(&self, ty: &Type) -> Type {
        self.subst.apply(ty)
    }

    fn display(&self, ty: &Type) -> String {
        self.subst.apply(ty).to_string()
    }

    fn fresh_var(&mut self, family: Family) -> Type {
        let id = self.next_var;
        self.next_var += 1;
        self.pending.push((id, family));
        Type::Var { id, family }
    }

    /// Default every still-unresolved family variable allocated since the
    /// previous pass: Int/Unsigned to the platform width, Float to 64-bit.
    fn default_pending(&mut self) {
        for (id, family) in std::mem::take(&mut self.pending) {
            let followed = self.subst.follow(&Type::Var { id, family });
            if let Type::Var {
                id: rep,
                family: rep_family,
            } = followed
            {
                self.subst
                    .insert(rep, Type::concrete(rep_family, default_width(rep_family)));
            }
        }
    }

    fn error(&mut self, token: &Token, message: impl Into<String>) -> Type {
        self.diagnostics.push(Diagnostic::error_at(token, message));
        Type::Error
    }

    fn warn(&mut self, token: &Token, message: impl Into<String>) {
        self.diagnostics
            .push(Diagnostic::warning_at(token, message));
    }

    fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: impl Into<String>, ty: Type, mutable: bool) {
        self.scopes
            .last_mut()
            .expect("scope stack is never empty")
            .vars
            .insert(name.into(), VarInfo { ty, mutable });
    }

    fn lookup(&self, name: &str) -> Option<VarInfo> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.vars.get(name).cloned())
    }

    fn check(&mut self, expr: &Expr) -> Type {
        if self.ctx == Context::TopLevel {
            let rejected = matches!(
                expr,
                Expr::VarDecl { mutable: true, .. }
                    | Expr::If { .. }
                    | Expr::Match { .. }
                    | Expr::Pipeline { .. }
            );
            if rejected {
                let pos = expr.pos().clone();
                return self.error(
                    &pos,
                    format!(
                        "{} is not allowed at top level; must be inside a function or block",
                        expr.kind_name()
                    ),
                );
            }
        }
        match expr {
            Expr::Int { .. } => self.fresh_var(Family::Int),
            Expr::Float { .. } => self.fresh_var(Family::Float),
            Expr::Unsigned { .. } => self.fresh_var(Family::Unsigned),
            Expr::Bool { .. } => Type::Bool,
            Expr::Str { .. } => Type::String,
            Expr::Byte { .. } => Type::Byte,
            Expr::Ident { name, pos } => self.visit_identifier(name, pos),
            Expr::Prefix { op, right } => self.visit_prefix(op, right),
            Expr::Infix { left, op, right } => self.visit_infix(left, op, right),
            Expr::Pipeline { left, right, pos } => self.visit_pipeline(left, right, pos),
            Expr::Call { .. } => {
                let old_ctx = self.ctx;
                self.ctx = Context::FunctionBody;
                let ty = self.visit_call(expr);
                self.ctx = old_ctx;
                ty
            }
            Expr::List { .. } => self.visit_list(expr, None),
            Expr::Tuple { elements, .. } => {
                let elems: Vec<Type> = elements.iter().map(|e| self.check(e)).collect();
                Type::Tuple(elems)
            }
            Expr::Index { target, index, pos } => self.visit_index(target, index, pos),
            Expr::Block { exprs, .. } => self.visit_block(exprs),
            Expr::If {
                cond, then, alt, pos,
            } => self.visit_if(cond, then, alt.as_deref(), pos),
            Expr::Match { value, arms, .. } => self.visit_match(value, arms),
            Expr::VarDecl {
                mutable,
                name,
                ann,
                value,
            } => self.visit_var_decl(*mutable, name, ann.as_deref(), value.as_deref()),
            Expr::FuncDecl(f) => {
                let old_ctx = self.ctx;
                self.ctx = Context::FunctionBody;
                let ty = self.visit_func_decl(f);
                self.ctx = old_ctx;
                ty
            }
            Expr::TypeDecl { .. } => Type::Nil,
            Expr::Use {
                path,
                alias,
                members,
                pos,
            } => self.visit_use(path, alias.as_deref(), members, pos),
            Expr::Qualified { left, member, pos } => self.visit_qualified(left, member, pos),
            Expr::FieldAccess { left, field, pos } => {
                let left_ty = self.check(left);
                if left_ty.is_error() {
                    return Type::Error;
                }
                let shown = self.display(&left_ty);
                self.error(
                    pos,
                    format!("field access requires a record type, got {}", shown),
                )
            }
            Expr::Assign { name, value, pos } => self.visit_assign(name, value, pos),
            // Type syntax outside an annotation position.
            Expr::RecordType { .. } | Expr::TypeRef { .. } | Expr::TupleTypeRef { .. } => {
                Type::Error
            }
        }
    }

    fn visit_identifier(&mut self, name: &str, pos: &Token) -> Type {
        match self.lookup(name) {
            Some(info) => info.ty,
            None => self.error(pos, format!("undefined variable: {}", name)),
        }
    }

    fn visit_var_decl(
        &mut self,
        mutable: bool,
        name: &Token,
        ann: Option<&Expr>,
        value: Option<&Expr>,
    ) -> Type {
        let ann_ty = ann.map(|a| self.resolve_type(a));
        let value_ty = match value {
            Some(v @ Expr::List { .. }) => self.visit_list(v, ann_ty.as_ref()),
            Some(v) => self.check(v),
            // The parser already diagnosed the missing initializer.
            None => Type::Error,
        };
        match ann_ty {
            Some(ann_ty) => {
                if !value_ty.is_error() && self.subst.unify(&ann_ty, &value_ty).is_err() {
                    let kind = if mutable { "mut" } else { "val" };
                    let expected = self.display(&ann_ty);
                    let got = self.display(&value_ty);
                    self.declare(name.lexeme.clone(), ann_ty, mutable);
                    return self.error(
                        name,
                        format!(
                            "type mismatch in {} '{}': expected {}, got {}",
                            kind, name.lexeme, expected, got
                        ),
                    );
                }
                self.declare(name.lexeme.clone(), ann_ty.clone(), mutable);
                ann_ty
            }
            None => {
                self.declare(name.lexeme.clone(), value_ty.clone(), mutable);
                value_ty
            }
        }
    }

    fn visit_func_decl(&mut self, f: &FuncDecl) -> Type {
        let mut param_types = Vec::with_capacity(f.params.len());
        for p in &f.params {
            let Some(ann) = &p.ty else {
                return self.error(
                    &p.name,
                    format!("parameter '{}' missing type annotation", p.name.lexeme),
                );
            };
            let pt = self.resolve_type(ann);
            if pt.is_error() {
                return Type::Error;
            }
            param_types.push(pt);
        }
        let ret_ann = match &f.ret {
            Some(r) => {
                let rt = self.resolve_type(r);
                if rt.is_error() {
                    return Type::Error;
                }
                Some(rt)
            }
            None => None,
        };
        let ret_ty = ret_ann.clone().unwrap_or(Type::Nil);
        let mut fn_type = Type::func(param_types.clone(), ret_ty.clone());
        // Install before checking the body so self-recursion resolves.
        self.declare(f.name.lexeme.clone(), fn_type.clone(), false);
        self.push_scope();
        for (p, ty) in f.params.iter().zip(param_types.iter()) {
            self.declare(p.name.lexeme.clone(), ty.clone(), false);
        }
        if let Some(body) = &f.body {
            let body_ty = self.check(body);
            if ret_ann.is_some() {
                if !body_ty.is_error() && self.subst.unify(&ret_ty, &body_ty).is_err() {
                    let annotated = self.display(&ret_ty);
                    let got = self.display(&body_ty);
                    self.pop_scope();
                    self.declare(f.name.lexeme.clone(), Type::Error, false);
                    return self.error(
                        &f.name,
                        format!(
                            "function {} annotated return {} but body has type {}",
                            f.name.lexeme, annotated, got
                        ),
                    );
                }
            } else {
                fn_type = Type::func(param_types, body_ty);
            }
        }
        self.pop_scope();
        self.declare(f.name.lexeme.clone(), fn_type.clone(), false);
        self.fn_types.insert(f.name.lexeme.clone(), fn_type.clone());
        fn_type
    }

    fn visit_call(&mut self, call: &Expr) -> Type {
        let Expr::Call { callee, args, pos } = call else {
            return Type::Error;
        };
        let callee_ty = self.check(callee);
        if callee_ty.is_error() {
            return Type::Error;
        }
        let callee_ty = self.subst.follow(&callee_ty);
        let (params, ret) = match callee_ty {
            Type::Func { params, ret } => (params, ret),
            other => {
                let shown = self.display(&other);
                return self.error(
                    pos,
                    format!("attempt to call non-function value of type {}", shown),
                );
            }
        };
        if args.len() != params.len() {
            return self.error(
                pos,
                format!(
                    "wrong number of arguments: expected {}, got {}",
                    params.len(),
                    args.len()
                ),
            );
        }
        for (i, (arg, param)) in args.iter().zip(params.iter()).enumerate() {
            let arg_ty = self.check(arg);
            if !arg_ty.is_error() && self.subst.unify(&arg_ty, param).is_err() {
                let expected = self.display(param);
                let got = self.display(&arg_ty);
                return self.error(
                    pos,
                    format!("argument {} expected {}, got {}", i, expected, got),
                );
            }
        }
        *ret
    }

    fn visit_block(&mut self, exprs: &[Expr]) -> Type {
        self.push_scope();
        let mut last = Type::Nil;
        for expr in exprs {
            last = self.check(expr);
        }
        self.pop_scope();
        last
    }

    fn visit_prefix(&mut self, op: &Token, right: &Expr) -> Type {
        let arg_ty = self.check(right);
        if arg_ty.is_error() {
            return Type::Error;
        }
        let Some(sigs) = self.unary_ops.get(&op.kind).cloned() else {
            return self.error(op, format!("unknown unary operator '{}'", op.lexeme));
        };
        for sig in &sigs {
            let snapshot = self.subst.clone();
            let mut inst = HashMap::new();
            let sig_arg = self.instantiate(&sig.arg, &mut inst);
            let sig_out = self.instantiate(&sig.out, &mut inst);
            if self.subst.unify(&arg_ty, &sig_arg).is_ok() {
                return sig_out;
            }
            self.subst = snapshot;
        }
        let shown = self.display(&arg_ty);
        self.error(
            op,
            format!("invalid operand type for '{}': {}", op.lexeme, shown),
        )
    }

    fn visit_infix(&mut self, left: &Expr, op: &Token, right: &Expr) -> Type {
        let left_ty = self.check(left);
        let right_ty = self.check(right);
        if left_ty.is_error() || right_ty.is_error() {
            return Type::Error;
        }
        let Some(sigs) = self.bin_ops.get(&op.kind).cloned() else {
            return self.error(op, format!("unknown operator '{}'", op.lexeme));
        };
        for sig in &sigs {
            if let Some(out) = self.try_binary_sig(sig, &left_ty, &right_ty) {
                return out;
            }
        }
        let left_shown = self.display(&left_ty);
        let right_shown = self.display(&right_ty);
        self.error(
            op,
            format!(
                "invalid operands for '{}': {} and {}",
                op.lexeme, left_shown, right_shown
            ),
        )
    }

    /// Try one signature: instantiate its width-polymorphic slots with
    /// fresh family variables (shared per family within the signature) and
    /// unify both operands against it. On failure the substitution is
    /// rolled back.
    fn try_binary_sig(&mut self, sig: &BinOpSig, left: &Type, right: &Type) -> Option<Type> {
        let snapshot = self.subst.clone();
        let mut inst = HashMap::new();
        let sig_left = self.instantiate(&sig.left, &mut inst);
        let sig_right = self.instantiate(&sig.right, &mut inst);
        let sig_out = self.instantiate(&sig.out, &mut inst);
        if self.subst.unify(left, &sig_left).is_ok() && self.subst.unify(right, &sig_right).is_ok()
        {
            Some(sig_out)
        } else {
            self.subst = snapshot;
            None
        }
    }

    fn instantiate(&mut self, ty: &Type, inst: &mut HashMap<Family, Type>) -> Type {
        match ty {
            Type::Num {
                family,
                width: None,
            } => inst
                .entry(*family)
                .or_insert_with_key(|f| {
                    let id = self.next_var;
                    self.next_var += 1;
                    self.pending.push((id, *f));
                    Type::Var { id, family: *f }
                })
                .clone(),
            other => other.clone(),
        }
    }

    fn visit_if(&mut self, cond: &Expr, then: &Expr, alt: Option<&Expr>, pos: &Token) -> Type {
        let cond_ty = self.check(cond);
        if cond_ty.is_error() {
            return Type::Error;
        }
        if self.subst.unify(&cond_ty, &Type::Bool).is_err() {
            let shown = self.display(&cond_ty);
            return self.error(pos, format!("if condition must be Bool, got {}", shown));
        }
        let then_ty = self.check(then);
        if let Some(alt) = alt {
            let alt_ty = self.check(alt);
            if !then_ty.is_error()
                && !alt_ty.is_error()
                && self.subst.unify(&then_ty, &alt_ty).is_err()
            {
                let then_shown = self.display(&then_ty);
                let alt_shown = self.display(&alt_ty);
                return self.error(
                    pos,
                    format!(
                        "then branch has type {} but else branch has type {}",
                        then_shown, alt_shown
                    ),
                );
            }
        }
        then_ty
    }

    fn visit_match(&mut self, value: &Expr, arms: &[crate::ast::MatchArm]) -> Type {
        let value_ty = self.check(value);
        if value_ty.is_error() {
            return Type::Error;
        }
        let mut arm_type: Option<Type> = None;
        let mut seen_wildcard = false;
        for arm in arms {
            if seen_wildcard {
                self.warn(&arm.pos, "unreachable match arm: follows a wildcard pattern");
            }
            self.push_scope();
            match &arm.pattern {
                Expr::Ident { name, .. } if name == "_" => {}
                // A plain identifier binds the scrutinee in this arm.
                Expr::Ident { name, .. } => {
                    self.declare(name.clone(), value_ty.clone(), false);
                }
                pattern => {
                    let pattern_ty = self.check(pattern);
                    if !pattern_ty.is_error()
                        && self.subst.unify(&pattern_ty, &value_ty).is_err()
                    {
                        let pattern_shown = self.display(&pattern_ty);
                        let value_shown = self.display(&value_ty);
                        self.pop_scope();
                        return self.error(
                            &arm.pos,
                            format!(
                                "pattern type {} does not match value type {}",
                                pattern_shown, value_shown
                            ),
                        );
                    }
                }
            }
            if let Some(guard) = &arm.guard {
                let guard_ty = self.check(guard);
                if !guard_ty.is_error() && self.subst.unify(&guard_ty, &Type::Bool).is_err() {
                    let shown = self.display(&guard_ty);
                    self.pop_scope();
                    return self.error(&arm.pos, format!("guard must be Bool, got {}", shown));
                }
            }
            let body_ty = self.check(&arm.body);
            match &arm_type {
                None => arm_type = Some(body_ty),
                Some(expected) => {
                    if !body_ty.is_error()
                        && self.subst.unify(expected, &body_ty).is_err()
                    {
                        let body_shown = self.display(&body_ty);
                        let expected_shown = self.display(expected);
                        self.pop_scope();
                        return self.error(
                            &arm.pos,
                            format!(
                                "match arm has type {}, expected {}",
                                body_shown, expected_shown
                            ),
                        );
                    }
                }
            }
            self.pop_scope();
            if arm.is_wildcard() {
                seen_wildcard = true;
            }
        }
        arm_type.unwrap_or(Type::Nil)
    }

    fn visit_pipeline(&mut self, left: &Expr, right: &Expr, pos: &Token) -> Type {
        let left_ty = self.check(left);
        if left_ty.is_error() {
            return Type::Error;
        }
        match right {
            Expr::Ident { name, pos: id_pos } => {
                let Some(info) = self.lookup(name) else {
                    return self.error(id_pos, format!("undefined function: {}", name));
                };
                let fn_ty = self.subst.follow(&info.ty);
                let Type::Func { params, ret } = fn_ty else {
                    return self.error(
                        id_pos,
                        format!("cannot pipe to non-function: {}", name),
                    );
                };
                if params.is_empty() {
                    return self.error(
                        id_pos,
                        format!("cannot pipe to function with no parameters: {}", name),
                    );
                }
                if self.subst.unify(&params[0], &left_ty).is_err() {
                    let expected = self.display(&params[0]);
                    let got = self.display(&left_ty);
                    return self.error(
                        id_pos,
                        format!(
                            "type mismatch in pipeline: expected {}, got {}",
                            expected, got
                        ),
                    );
                }
                *ret
            }
            Expr::Call {
                callee,
                args,
                pos: call_pos,
            } => {
                // `L |> f(a, b)` checks as `f(L, a, b)`.
                let mut new_args = Vec::with_capacity(args.len() + 1);
                new_args.push(left.clone());
                new_args.extend(args.iter().cloned());
                let rewritten = Expr::Call {
                    callee: callee.clone(),
                    args: new_args,
                    pos: call_pos.clone(),
                };
                self.check(&rewritten)
            }
            _ => self.error(pos, "right side of pipeline must be a function or call"),
        }
    }

    fn visit_list(&mut self, list: &Expr, annotated: Option<&Type>) -> Type {
        let Expr::List { elements, pos } = list else {
            return Type::Error;
        };
        if elements.is_empty() {
            if let Some(ann) = annotated {
                return ann.clone();
            }
            return Type::list(Type::Nil);
        }
        let expected = match annotated {
            Some(Type::List(elem)) => (**elem).clone(),
            _ => match &elements[0] {
                Expr::Tuple {
                    elements: tuple_elems,
                    ..
                } => {
                    let mut elem_types = Vec::with_capacity(tuple_elems.len());
                    for e in tuple_elems {
                        let sub = self.check(e);
                        if sub.is_error() {
                            return self
                                .error(pos, "cannot infer element type for tuple in list");
                        }
                        elem_types.push(sub);
                    }
                    Type::Tuple(elem_types)
                }
                first => {
                    let first_ty = self.check(first);
                    if first_ty.is_error() {
                        return Type::Error;
                    }
                    first_ty
                }
            },
        };
        if let Type::Tuple(expected_elems) = &expected {
            // Lists of tuples validate element-wise.
            let start = if annotated.is_some() { 0 } else { 1 };
            for (i, elem) in elements.iter().enumerate().skip(start) {
                let Expr::Tuple {
                    elements: tuple_elems,
                    pos: tuple_pos,
                } = elem
                else {
                    let elem_ty = self.check(elem);
                    let got = self.display(&elem_ty);
                    let want = self.display(&expected);
                    return self.error(
                        pos,
                        format!("element {}: expected tuple {}, got {}", i + 1, want, got),
                    );
                };
                if tuple_elems.len() != expected_elems.len() {
                    return self.error(
                        tuple_pos,
                        format!(
                            "element {}: expected tuple of length {}, got {}",
                            i + 1,
                            expected_elems.len(),
                            tuple_elems.len()
                        ),
                    );
                }
                for (k, sub) in tuple_elems.iter().enumerate() {
                    let sub_ty = self.check(sub);
                    if !sub_ty.is_error()
                        && self.subst.unify(&expected_elems[k], &sub_ty).is_err()
                    {
                        let want = self.display(&expected_elems[k]);
                        let got = self.display(&sub_ty);
                        return self.error(
                            pos,
                            format!(
                                "element {}.{}: expected {}, got {}",
                                i + 1,
                                k + 1,
                                want,
                                got
                            ),
                        );
                    }
                }
            }
        } else {
            let start = if annotated.is_some() { 0 } else { 1 };
            for (i, elem) in elements.iter().enumerate().skip(start) {
                let elem_ty = self.check(elem);
                if !elem_ty.is_error() && self.subst.unify(&expected, &elem_ty).is_err() {
                    let got = self.display(&elem_ty);
                    let want = self.display(&expected);
                    return self.error(
                        pos,
                        format!(
                            "element {} type {} does not match expected type {}",
                            i + 1,
                            got,
                            want
                        ),
                    );
                }
            }
        }
        Type::list(expected)
    }

    fn visit_index(&mut self, target: &Expr, index: &Expr, pos: &Token) -> Type {
        let target_ty = self.check(target);
        if target_ty.is_error() {
            return Type::Error;
        }
        let target_ty = self.subst.follow(&target_ty);
        match target_ty {
            Type::List(elem) => {
                self.check_index_value(index, pos);
                *elem
            }
            Type::String => {
                self.check_index_value(index, pos);
                Type::Byte
            }
            Type::Tuple(elems) => match index {
                Expr::Int { value, .. } => {
                    let idx = *value;
                    if idx < 0 || idx as usize >= elems.len() {
                        return self.error(
                            pos,
                            format!(
                                "tuple index {} out of bounds (tuple has {} elements)",
                                idx,
                                elems.len()
                            ),
                        );
                    }
                    elems[idx as usize].clone()
                }
                _ => self.error(pos, "tuple index must be a constant integer literal"),
            },
            other => {
                let shown = self.display(&other);
                self.error(pos, format!("type {} cannot be indexed", shown))
            }
        }
    }

    /// List and string indices must be integers.
    fn check_index_value(&mut self, index: &Expr, pos: &Token) {
        let index_ty = self.check(index);
        if index_ty.is_error() {
            return;
        }
        let expected = self.fresh_var(Family::Int);
        if self.subst.unify(&index_ty, &expected).is_err() {
            let shown = self.display(&index_ty);
            self.error(pos, format!("index must be an integer, got {}", shown));
        }
    }

    fn visit_use(
        &mut self,
        path: &[String],
        alias: Option<&str>,
        members: &[String],
        pos: &Token,
    ) -> Type {
        let resolved = self
            .resolver
            .as_ref()
            .and_then(|r| r.resolve(path));
        let Some(mod_env) = resolved else {
            return self.error(pos, format!("cannot find module {}", path.join("/")));
        };
        if members.is_empty() {
            let name = alias
                .map(|a| a.to_string())
                .or_else(|| path.last().cloned())
                .unwrap_or_default();
            self.modules.insert(name, mod_env);
        } else {
            // Member imports copy bindings into the current scope; they do
            // not alias the module environment at a distance.
            for member in members {
                match mod_env.get(member) {
                    Some(ty) => self.declare(member.clone(), ty.clone(), false),
                    None => {
                        let message = format!(
                            "module {} has no member {}{}",
                            path.join("/"),
                            member,
                            member_hint(&mod_env)
                        );
                        self.error(pos, message);
                    }
                }
            }
        }
        Type::Nil
    }

    fn visit_qualified(&mut self, left: &Expr, member: &Token, pos: &Token) -> Type {
        let Expr::Ident { name, .. } = left else {
            return self.error(pos, "expected module identifier on the left of ':'");
        };
        let Some(mod_env) = self.modules.get(name) else {
            return self.error(pos, format!("unknown module: {}", name));
        };
        match mod_env.get(&member.lexeme) {
            Some(ty) => ty.clone(),
            None => {
                let message = format!(
                    "module {} has no member {}{}",
                    name,
                    member.lexeme,
                    member_hint(mod_env)
                );
                self.error(pos, message)
            }
        }
    }

    fn visit_assign(&mut self, name: &str, value: &Expr, pos: &Token) -> Type {
        let Some(info) = self.lookup(name) else {
            return self.error(pos, format!("undefined variable '{}'", name));
        };
        if !info.mutable {
            return self.error(
                pos,
                format!("cannot assign to immutable variable '{}'", name),
            );
        }
        let value_ty = self.check(value);
        if !value_ty.is_error() && self.subst.unify(&info.ty, &value_ty).is_err() {
            let expected = self.display(&info.ty);
            let got = self.display(&value_ty);
            return self.error(
                pos,
                format!(
                    "type mismatch in assignment to '{}': expected {}, got {}",
                    name, expected, got
                ),
            );
        }
        value_ty
    }

    /// Resolve a type annotation expression to a type. `Int`, `Float`, and
    /// `Unsigned` become fresh family variables so annotations participate
    /// in width inference; the width names are concrete.
    fn resolve_type(&mut self, expr: &Expr) -> Type {
        match expr {
            Expr::TypeRef { name, elem, pos } => match name.as_str() {
                "Int" => self.fresh_var(Family::Int),
                "Float" => self.fresh_var(Family::Float),
                "Unsigned" => self.fresh_var(Family::Unsigned),
                "I8" => Type::concrete(Family::Int, crate::types::Width::W8),
                "I16" => Type::concrete(Family::Int, crate::types::Width::W16),
                "I32" => Type::concrete(Family::Int, crate::types::Width::W32),
                "I64" => Type::concrete(Family::Int, crate::types::Width::W64),
                "U8" => Type::concrete(Family::Unsigned, crate::types::Width::W8),
                "U16" => Type::concrete(Family::Unsigned, crate::types::Width::W16),
                "U32" => Type::concrete(Family::Unsigned, crate::types::Width::W32),
                "U64" => Type::concrete(Family::Unsigned, crate::types::Width::W64),
                "F32" => Type::concrete(Family::Float, crate::types::Width::W32),
                "F64" => Type::concrete(Family::Float, crate::types::Width::W64),
                "Bool" => Type::Bool,
                "Byte" => Type::Byte,
                "String" => Type::String,
                "Nil" => Type::Nil,
                "List" => {
                    let elem_ty = match elem {
                        Some(e) => self.resolve_type(e),
                        None => Type::Nil,
                    };
                    Type::list(elem_ty)
                }
                other => self.error(pos, format!("unknown type name '{}'", other)),
            },
            Expr::TupleTypeRef { types, .. } => {
                let elems: Vec<Type> = types.iter().map(|t| self.resolve_type(t)).collect();
                Type::Tuple(elems)
            }
            other => {
                let pos = other.pos().clone();
                self.error(&pos, "expected a type annotation")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_program;
    use crate::resolver::MapResolver;
    use crate::types::Width;

    fn parse(source: &str) -> Program {
        let tokens = tokenize(source, "test.em").unwrap();
        let (program, diagnostics) = parse_program(tokens);
        assert!(
            diagnostics.is_empty(),
            "parse diagnostics: {:?}",
            diagnostics
        );
        program
    }

    fn check_src(source: &str) -> Vec<Diagnostic> {
        let program = parse(source);
        TypeChecker::new().check_program(&program)
    }

    fn errors_of(source: &str) -> Vec<Diagnostic> {
        check_src(source)
            .into_iter()
            .filter(|d| d.severity == crate::diagnostics::Severity::Error)
            .collect()
    }

    fn type_of(source: &str) -> Type {
        let program = parse(source);
        assert_eq!(program.exprs.len(), 1, "expected a single expression");
        let mut checker = TypeChecker::new();
        checker.check_expr(&program.exprs[0]).unwrap()
    }

    fn type_error_of(source: &str) -> Diagnostic {
        let program = parse(source);
        let mut checker = TypeChecker::new();
        let mut result = None;
        for expr in &program.exprs {
            if let Err(d) = checker.check_expr(expr) {
                result = Some(d);
                break;
            }
        }
        result.expect("expected a type error")
    }

    #[test]
    fn test_literal_types() {
        assert!(matches!(type_of("123"), Type::Num { family: Family::Int, .. }));
        assert_eq!(type_of("\"hello\""), Type::String);
        assert_eq!(type_of("True"), Type::Bool);
        assert_eq!(type_of("'x'"), Type::Byte);
        assert!(matches!(
            type_of("3.25"),
            Type::Num { family: Family::Float, .. }
        ));
        assert!(matches!(
            type_of("7u"),
            Type::Num { family: Family::Unsigned, .. }
        ));
    }

    #[test]
    fn test_integer_addition() {
        let ty = type_of("1 + 2");
        assert_eq!(ty.family(), Some(Family::Int));
    }

    #[test]
    fn test_mixed_addition_is_error() {
        let err = type_error_of("1 + \"hello\"");
        assert!(err.message.contains("invalid operands for '+'"));
    }

    #[test]
    fn test_float_operator_on_ints_is_error() {
        let err = type_error_of("1 +. 2");
        assert!(err.message.contains("invalid operands for '+.'"));
    }

    #[test]
    fn test_function_signature() {
        let ty = type_of("fn add(x: Int, y: Int) Int { x + y }");
        let Type::Func { params, ret } = ty else {
            panic!("expected function type, got {}", ty);
        };
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].family(), Some(Family::Int));
        assert_eq!(params[1].family(), Some(Family::Int));
        assert_eq!(ret.family(), Some(Family::Int));
    }

    #[test]
    fn test_return_type_mismatch() {
        let err = type_error_of("fn bad(x: Int) Bool { x }");
        assert!(err.message.contains("annotated return"));
    }

    #[test]
    fn test_unannotated_parameter_is_error() {
        let err = type_error_of("fn f(x) Int { x }");
        assert!(err.message.contains("missing type annotation"));
    }

    #[test]
    fn test_missing_return_annotation_infers_body_type() {
        let ty = type_of("fn greet(name: String) { \"hi\" }");
        let Type::Func { ret, .. } = ty else {
            panic!("expected function type");
        };
        assert_eq!(*ret, Type::String);
    }

    #[test]
    fn test_mut_reassign_ok_val_reassign_rejected() {
        assert!(errors_of("fn f() Int { mut x = 1\n x = 2\n x }").is_empty());
        let errs = errors_of("fn f() Int { val x = 1\n x = 2\n x }");
        assert!(errs[0].message.contains("cannot assign to immutable"));
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let errs = errors_of("fn f() Int { mut x = 1\n x = \"s\"\n x }");
        assert!(errs[0].message.contains("type mismatch in assignment"));
    }

    #[test]
    fn test_family_narrowing_to_u32() {
        let program = parse("fn f() U32 { val x: U32 = 10 + 1\n x }");
        let mut checker = TypeChecker::new();
        let diagnostics = checker.check_program(&program);
        assert!(diagnostics.is_empty(), "diagnostics: {:?}", diagnostics);
        let fn_types = checker.take_function_types();
        let Type::Func { ret, .. } = &fn_types["f"] else {
            panic!("expected function type");
        };
        assert_eq!(**ret, Type::concrete(Family::Unsigned, Width::W32));
    }

    #[test]
    fn test_unresolved_literals_default_to_platform_width() {
        let program = parse("fn f() Int { 1 + 2 }");
        let mut checker = TypeChecker::new();
        assert!(checker.check_program(&program).is_empty());
        let fn_types = checker.take_function_types();
        let Type::Func { ret, .. } = &fn_types["f"] else {
            panic!("expected function type");
        };
        assert_eq!(
            **ret,
            Type::concrete(Family::Int, default_width(Family::Int))
        );
    }

    #[test]
    fn test_cross_family_annotation_rejected() {
        let errs = errors_of("fn f() Int { val x: U32 = 3.5\n 1 }");
        assert!(errs[0].message.contains("type mismatch in val 'x'"));
    }

    #[test]
    fn test_undefined_identifier() {
        let err = type_error_of("nope");
        assert!(err.message.contains("undefined variable: nope"));
    }

    #[test]
    fn test_top_level_context_gate() {
        for (src, what) in [
            ("mut x = 1", "mut declaration"),
            ("if True then 1 else 2", "if expression"),
            ("match 1 { _ -> 1 }", "match expression"),
        ] {
            let errs = errors_of(src);
            assert!(
                errs[0].message.contains("not allowed at top level"),
                "{} should be rejected: {:?}",
                what,
                errs
            );
        }
        // Immutable declarations are fine at the top level.
        assert!(errors_of("val x = 1").is_empty());
    }

    #[test]
    fn test_call_arity_and_argument_types() {
        let errs = errors_of("fn add(x: Int, y: Int) Int { x + y }\nfn g() Int { add(1) }");
        assert!(errs[0].message.contains("wrong number of arguments"));

        let errs =
            errors_of("fn add(x: Int, y: Int) Int { x + y }\nfn g() Int { add(1, \"two\") }");
        assert!(errs[0].message.contains("argument 1 expected"));
    }

    #[test]
    fn test_call_non_function() {
        let errs = errors_of("val x = 1\nfn g() Int { x(2) }");
        assert!(errs[0].message.contains("non-function"));
    }

    #[test]
    fn test_recursive_function_checks() {
        let src = "fn count(n: Int) Int { if n < 1 then 0 else count(n - 1) }";
        assert!(errors_of(src).is_empty());
    }

    #[test]
    fn test_if_condition_must_be_bool() {
        let errs = errors_of("fn f() Int { if 1 then 2 else 3 }");
        assert!(errs[0].message.contains("if condition must be Bool"));
    }

    #[test]
    fn test_if_branch_types_must_match() {
        let errs = errors_of("fn f() Int { if True then 2 else \"x\" }");
        assert!(errs[0].message.contains("then branch has type"));
    }

    #[test]
    fn test_match_binding_and_guard() {
        let src = "fn f(n: Int) Int { match n { 0 -> 1\n k if k < 10 -> k\n _ -> 0 } }";
        assert!(errors_of(src).is_empty());

        let errs = errors_of("fn f(n: Int) Int { match n { k if k -> 1\n _ -> 0 } }");
        assert!(errs[0].message.contains("guard must be Bool"));
    }

    #[test]
    fn test_match_pattern_must_match_scrutinee() {
        let errs = errors_of("fn f(n: Int) Int { match n { \"s\" -> 1\n _ -> 0 } }");
        assert!(errs[0].message.contains("pattern type"));
    }

    #[test]
    fn test_match_arms_share_a_type() {
        let errs = errors_of("fn f(n: Int) Int { match n { 0 -> 1\n _ -> \"s\" } }");
        assert!(errs[0].message.contains("match arm has type"));
    }

    #[test]
    fn test_dead_arm_after_wildcard_warns() {
        let diags = check_src("fn f(n: Int) Int { match n { _ -> 0\n 1 -> 2 } }");
        assert!(diags.iter().any(|d| {
            d.severity == crate::diagnostics::Severity::Warning
                && d.message.contains("unreachable match arm")
        }));
        // Warnings do not reject the program.
        assert!(!crate::diagnostics::has_errors(&diags));
    }

    #[test]
    fn test_pipeline_into_identifier_and_call() {
        let src = "fn double(x: Int) Int { x + x }\nfn f() Int { 2 |> double }";
        assert!(errors_of(src).is_empty());

        let src = "fn add(x: Int, y: Int) Int { x + y }\nfn f() Int { 2 |> add(3) }";
        assert!(errors_of(src).is_empty());

        let errs = errors_of("fn f() Int { 2 |> 3 }");
        assert!(errs[0].message.contains("right side of pipeline"));
    }

    #[test]
    fn test_pipeline_type_mismatch() {
        let src = "fn shout(s: String) String { s }\nfn f() String { 2 |> shout }";
        let errs = errors_of(src);
        assert!(errs[0].message.contains("type mismatch in pipeline"));
    }

    #[test]
    fn test_list_typing() {
        assert!(matches!(type_of("[1, 2, 3]"), Type::List(_)));
        let err = type_error_of("[1, \"x\"]");
        assert!(err.message.contains("does not match expected type"));
        // Empty list without annotation has a Nil element.
        assert_eq!(type_of("[]"), Type::list(Type::Nil));
    }

    #[test]
    fn test_empty_list_adopts_annotation() {
        assert!(errors_of("val xs: List(Int) = []").is_empty());
    }

    #[test]
    fn test_list_of_tuples() {
        assert!(errors_of("val pairs = [(1, \"a\"), (2, \"b\")]").is_empty());
        let errs = errors_of("val pairs = [(1, \"a\"), (2, 3)]");
        assert!(!errs.is_empty());
    }

    #[test]
    fn test_tuple_typing_and_indexing() {
        let ty = type_of("(\"a\", True)");
        assert_eq!(ty, Type::Tuple(vec![Type::String, Type::Bool]));

        assert!(errors_of("fn f() Bool { val t = (\"a\", True)\n t[1] }").is_empty());
        let errs = errors_of("fn f() Bool { val t = (\"a\", True)\n t[5] }");
        assert!(errs[0].message.contains("out of bounds"));
        let errs = errors_of("fn f(i: Int) Bool { val t = (\"a\", True)\n t[i] }");
        assert!(errs[0].message.contains("constant integer literal"));
    }

    #[test]
    fn test_index_list_and_string() {
        assert!(errors_of("fn f(xs: List(Int)) Int { xs[0] }").is_empty());
        let src = "fn f(s: String) Byte { s[0] }";
        assert!(errors_of(src).is_empty());
        let errs = errors_of("fn f(b: Bool) Bool { b[0] }");
        assert!(errs[0].message.contains("cannot be indexed"));
    }

    #[test]
    fn test_use_and_qualified_lookup() {
        let mut math = ModuleEnv::new();
        math.insert("abs", Type::func(vec![Type::int()], Type::int()));
        let resolver = MapResolver::new().with_module("std/math", math);

        let program = parse("use std/math as m\nfn f(n: Int) Int { m:abs(n) }");
        let mut checker = TypeChecker::new().with_resolver(Box::new(resolver.clone()));
        let diags = checker.check_program(&program);
        assert!(diags.is_empty(), "diagnostics: {:?}", diags);

        // Member import copies the binding into scope.
        let program = parse("use std/math.{abs}\nfn f(n: Int) Int { abs(n) }");
        let mut checker = TypeChecker::new().with_resolver(Box::new(resolver));
        assert!(checker.check_program(&program).is_empty());
    }

    #[test]
    fn test_unknown_module_and_member_are_diagnosed_not_fatal() {
        let mut math = ModuleEnv::new();
        math.insert("abs", Type::func(vec![Type::int()], Type::int()));
        math.insert("signum", Type::func(vec![Type::int()], Type::int()));
        let resolver = MapResolver::new().with_module("std/math", math);

        let program = parse("use std/nope\nval x = 1");
        let mut checker = TypeChecker::new().with_resolver(Box::new(resolver.clone()));
        let diags = checker.check_program(&program);
        assert!(diags.iter().any(|d| d.message.contains("cannot find module")));

        // An unknown member names what the module actually exports.
        let program = parse("use std/math.{missing}\nval x = 1");
        let mut checker = TypeChecker::new().with_resolver(Box::new(resolver.clone()));
        let diags = checker.check_program(&program);
        assert!(diags.iter().any(|d| {
            d.message.contains("has no member missing")
                && d.message.contains("available members: abs, signum")
        }));

        // Same hint through a qualified name.
        let program = parse("use std/math as m\nfn f(n: Int) Int { m:missing(n) }");
        let mut checker = TypeChecker::new().with_resolver(Box::new(resolver));
        let diags = checker.check_program(&program);
        assert!(diags.iter().any(|d| {
            d.message.contains("module m has no member missing")
                && d.message.contains("available members: abs, signum")
        }));
    }

    #[test]
    fn test_error_sentinel_suppresses_cascades() {
        // `nope` is undefined; the addition over it must not add a second
        // diagnostic.
        let errs = errors_of("fn f() Int { nope + 1 }");
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("undefined variable"));
    }

    #[test]
    fn test_block_scoping() {
        // A binding inside a block is not visible outside it.
        let errs = errors_of("fn f() Int { { val hidden = 1\n hidden }\n hidden }");
        assert!(errs[0].message.contains("undefined variable: hidden"));
    }

    #[test]
    fn test_unary_operators() {
        assert_eq!(type_of("-5").family(), Some(Family::Int));
        assert_eq!(type_of("!True"), Type::Bool);
        let err = type_error_of("!1");
        assert!(err.message.contains("invalid operand type for '!'"));
        let err = type_error_of("-.True");
        assert!(err.message.contains("invalid operand type for '-.'"));
    }

    #[test]
    fn test_field_access_is_rejected() {
        let errs = errors_of("fn f(n: Int) Int { n.x }");
        assert!(errs[0].message.contains("field access"));
    }

    #[test]
    fn test_equality_over_primitives() {
        assert_eq!(type_of("1 == 2"), Type::Bool);
        assert_eq!(type_of("\"a\" != \"b\""), Type::Bool);
        assert_eq!(type_of("'a' == 'b'"), Type::Bool);
        let err = type_error_of("1 == \"a\"");
        assert!(err.message.contains("invalid operands for '=='"));
        let err = type_error_of("1 == 2u");
        assert!(err.message.contains("invalid operands"));
    }

    #[test]
    fn test_concrete_width_annotations() {
        assert!(errors_of("fn f(x: I16, y: I16) I16 { x + y }").is_empty());
        let errs = errors_of("fn f(x: I16, y: I32) I16 { x + y }");
        assert!(errs[0].message.contains("invalid operands for '+'"));
    }

    #[test]
    fn test_range_operator_has_no_signature() {
        let err = type_error_of("1 .. 5");
        assert!(err.message.contains("unknown operator '..'"));
    }
}
