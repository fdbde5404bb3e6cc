//! Tree-style AST rendering.
//!
//! [`dump_expr`] and [`dump_program`] draw an expression tree with box
//! characters, one node per line. Editor tooling and the read-eval loop use
//! this to show what the parser actually built:
//!
//! ```text
//! └─ Infix +
//!    ├─ Int 1
//!    └─ Infix *
//!       ├─ Int 2
//!       └─ Int 3
//! ```

use crate::ast::{Expr, Program};

/// Render a whole program, one top-level expression after another.
pub fn dump_program(program: &Program) -> String {
    let mut out = String::new();
    for expr in &program.exprs {
        out.push_str(&dump_expr(expr));
    }
    out
}

/// Render a single expression tree.
pub fn dump_expr(expr: &Expr) -> String {
    let mut out = String::new();
    dump(expr, "", true, &mut out);
    out
}

/// Append one node line and return the indent for its children.
fn node(out: &mut String, indent: &str, last: bool, label: &str) -> String {
    let (branch, next) = if last {
        ("└─ ", "   ")
    } else {
        ("├─ ", "│  ")
    };
    out.push_str(indent);
    out.push_str(branch);
    out.push_str(label);
    out.push('\n');
    format!("{}{}", indent, next)
}

fn dump_all(exprs: &[Expr], indent: &str, out: &mut String) {
    for (i, expr) in exprs.iter().enumerate() {
        dump(expr, indent, i + 1 == exprs.len(), out);
    }
}

fn dump(expr: &Expr, indent: &str, last: bool, out: &mut String) {
    match expr {
        Expr::Ident { name, .. } => {
            node(out, indent, last, &format!("Identifier {}", name));
        }
        Expr::Int { value, .. } => {
            node(out, indent, last, &format!("Int {}", value));
        }
        Expr::Unsigned { value, .. } => {
            node(out, indent, last, &format!("Unsigned {}u", value));
        }
        Expr::Float { value, .. } => {
            node(out, indent, last, &format!("Float {}", value));
        }
        Expr::Str { value, .. } => {
            node(out, indent, last, &format!("String {:?}", value));
        }
        Expr::Byte { raw, .. } => {
            node(out, indent, last, &format!("Byte {}", raw));
        }
        Expr::Bool { value, .. } => {
            node(out, indent, last, &format!("Bool {}", value));
        }
        Expr::Prefix { op, right } => {
            let next = node(out, indent, last, &format!("Prefix {}", op.lexeme));
            dump(right, &next, true, out);
        }
        Expr::Infix { left, op, right } => {
            let next = node(out, indent, last, &format!("Infix {}", op.lexeme));
            dump(left, &next, false, out);
            dump(right, &next, true, out);
        }
        Expr::Pipeline { left, right, .. } => {
            let next = node(out, indent, last, "Pipeline");
            dump(left, &next, false, out);
            dump(right, &next, true, out);
        }
        Expr::Call { callee, args, .. } => {
            let next = node(out, indent, last, "Call");
            let callee_next = node(out, &next, args.is_empty(), "Callee");
            dump(callee, &callee_next, true, out);
            if !args.is_empty() {
                let args_next = node(out, &next, true, "Args");
                dump_all(args, &args_next, out);
            }
        }
        Expr::Qualified { left, member, .. } => {
            let next = node(out, indent, last, "Qualified");
            dump(left, &next, false, out);
            node(out, &next, true, &format!("Identifier {}", member.lexeme));
        }
        Expr::FieldAccess { left, field, .. } => {
            let next = node(out, indent, last, "FieldAccess");
            dump(left, &next, false, out);
            node(out, &next, true, &format!("Identifier {}", field));
        }
        Expr::Tuple { elements, .. } => {
            let next = node(out, indent, last, "Tuple");
            dump_all(elements, &next, out);
        }
        Expr::List { elements, .. } => {
            let next = node(out, indent, last, "List");
            dump_all(elements, &next, out);
        }
        Expr::Index { target, index, .. } => {
            let next = node(out, indent, last, "Index");
            dump(target, &next, false, out);
            dump(index, &next, true, out);
        }
        Expr::Block { exprs, .. } => {
            let next = node(out, indent, last, "Block");
            dump_all(exprs, &next, out);
        }
        Expr::If {
            cond, then, alt, ..
        } => {
            let next = node(out, indent, last, "If");
            let cond_next = node(out, &next, false, "Cond");
            dump(cond, &cond_next, true, out);
            let then_next = node(out, &next, alt.is_none(), "Then");
            dump(then, &then_next, true, out);
            if let Some(alt) = alt {
                let alt_next = node(out, &next, true, "Else");
                dump(alt, &alt_next, true, out);
            }
        }
        Expr::Match { value, arms, .. } => {
            let next = node(out, indent, last, "Match");
            let value_next = node(out, &next, false, "Value");
            dump(value, &value_next, true, out);
            let arms_next = node(out, &next, true, "Arms");
            for (i, arm) in arms.iter().enumerate() {
                let arm_next = node(out, &arms_next, i + 1 == arms.len(), "Arm");
                let pattern_next = node(out, &arm_next, false, "Pattern");
                dump(&arm.pattern, &pattern_next, true, out);
                if let Some(guard) = &arm.guard {
                    let guard_next = node(out, &arm_next, false, "Guard");
                    dump(guard, &guard_next, true, out);
                }
                let body_next = node(out, &arm_next, true, "Body");
                dump(&arm.body, &body_next, true, out);
            }
        }
        Expr::VarDecl {
            mutable,
            name,
            ann,
            value,
        } => {
            let label = if *mutable { "MutDecl" } else { "ValDecl" };
            let next = node(out, indent, last, &format!("{} {}", label, name.lexeme));
            if let Some(ann) = ann {
                dump(ann, &next, value.is_none(), out);
            }
            if let Some(value) = value {
                dump(value, &next, true, out);
            }
        }
        Expr::FuncDecl(f) => {
            let mut label = format!("FuncDecl {}", f.name.lexeme);
            if f.public {
                label.push_str(" pub");
            }
            if f.recursive {
                label.push_str(" recursive");
            }
            let next = node(out, indent, last, &label);
            for decorator in &f.decorators {
                node(out, &next, false, &format!("Decorator @{}", decorator.name));
            }
            let has_tail = f.ret.is_some() || f.body.is_some();
            let params_next = node(out, &next, !has_tail, "Params");
            for (i, p) in f.params.iter().enumerate() {
                let last_param = i + 1 == f.params.len();
                let param_next = node(
                    out,
                    &params_next,
                    last_param,
                    &format!("Param {}", p.name.lexeme),
                );
                if let Some(ty) = &p.ty {
                    dump(ty, &param_next, true, out);
                }
            }
            if let Some(ret) = &f.ret {
                let ret_next = node(out, &next, f.body.is_none(), "Return");
                dump(ret, &ret_next, true, out);
            }
            if let Some(body) = &f.body {
                let body_next = node(out, &next, true, "Body");
                dump(body, &body_next, true, out);
            }
        }
        Expr::TypeDecl {
            public, name, body, ..
        } => {
            let mut label = format!("TypeDecl {}", name.lexeme);
            if *public {
                label.push_str(" pub");
            }
            let next = node(out, indent, last, &label);
            if let Some(body) = body {
                dump(body, &next, true, out);
            }
        }
        Expr::RecordType { fields, .. } => {
            let next = node(out, indent, last, "Record");
            for (i, field) in fields.iter().enumerate() {
                let last_field = i + 1 == fields.len();
                let field_next = node(
                    out,
                    &next,
                    last_field,
                    &format!("Field {}", field.name.lexeme),
                );
                if let Some(ty) = &field.ty {
                    dump(ty, &field_next, true, out);
                }
            }
        }
        Expr::Use {
            path,
            alias,
            members,
            ..
        } => {
            let mut label = format!("Use {}", path.join("/"));
            if !members.is_empty() {
                label.push_str(&format!(".{{{}}}", members.join(", ")));
            }
            if let Some(alias) = alias {
                label.push_str(&format!(" as {}", alias));
            }
            node(out, indent, last, &label);
        }
        Expr::Assign { name, value, .. } => {
            let next = node(out, indent, last, &format!("Assign {}", name));
            dump(value, &next, true, out);
        }
        Expr::TypeRef { name, elem, .. } => {
            let next = node(out, indent, last, &format!("Type {}", name));
            if let Some(elem) = elem {
                dump(elem, &next, true, out);
            }
        }
        Expr::TupleTypeRef { types, .. } => {
            let next = node(out, indent, last, "TupleType");
            dump_all(types, &next, out);
        }
    }
}
