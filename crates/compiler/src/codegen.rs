//! Bytecode generation.
//!
//! Walks a checked program and emits an [`ember_core::Chunk`]: one child
//! function per top-level declaration, then main-flow code for the
//! remaining top-level expressions, ending in `CALL main, HALT` when a
//! `main` function exists (plain `HALT` otherwise).
//!
//! The function table is pre-registered (names and arities) before any body
//! is generated so forward references and self-recursive calls resolve.
//!
//! Identifier references emit no code. The call protocol re-pushes
//! arguments onto the callee's stack, and the callee consumes them
//! positionally; dedicated local slots are what `LOAD`/`STORE` are reserved
//! for. Constructs outside the VM-expressible subset are generator-level
//! fatal errors; the checker should have been run first, and the generator
//! aborts on the first problem.

use crate::ast::{Expr, Program};
use ember_core::{Chunk, Function, Opcode, Value};
use tracing::debug;

/// Compile a checked program to its top-level chunk.
pub fn generate(program: &Program) -> Result<Chunk, String> {
    let mut top = Chunk::new();
    let mut bodies = Vec::new();
    for expr in &program.exprs {
        if let Expr::FuncDecl(f) = expr {
            if top.funcs.len() > u8::MAX as usize {
                return Err("too many functions (the CALL operand is one byte)".to_string());
            }
            top.funcs.push(Function {
                name: f.name.lexeme.clone(),
                chunk: Chunk::new(),
                params: f.params.len(),
            });
            bodies.push(f);
        }
    }
    let names: Vec<String> = top.funcs.iter().map(|f| f.name.clone()).collect();
    debug!(functions = names.len(), "generating bytecode");

    for (i, f) in bodies.into_iter().enumerate() {
        let mut chunk = Chunk::new();
        if let Some(body) = &f.body {
            emit_expr(&mut chunk, &names, body)?;
        }
        chunk.emit(Opcode::Return);
        top.funcs[i].chunk = chunk;
    }

    for expr in &program.exprs {
        if matches!(expr, Expr::FuncDecl(_)) {
            continue;
        }
        emit_expr(&mut top, &names, expr)?;
    }

    if let Some(main_idx) = names.iter().position(|n| n == "main") {
        top.emit(Opcode::Call);
        top.emit_byte(main_idx as u8);
    }
    top.emit(Opcode::Halt);
    Ok(top)
}

fn function_index(names: &[String], callee: &str) -> Result<u8, String> {
    names
        .iter()
        .position(|n| n == callee)
        .map(|i| i as u8)
        .ok_or_else(|| format!("call to undefined function {}", callee))
}

fn emit_expr(chunk: &mut Chunk, names: &[String], expr: &Expr) -> Result<(), String> {
    match expr {
        Expr::Int { value, .. } => chunk.emit_const(Value::Int(*value)),
        // The runtime value model is Int/Float/Bool/String; unsigned and
        // byte constants lower to their signed images.
        Expr::Unsigned { value, .. } => chunk.emit_const(Value::Int(*value as i64)),
        Expr::Byte { value, .. } => chunk.emit_const(Value::Int(*value as i64)),
        Expr::Float { value, .. } => chunk.emit_const(Value::Float(*value)),
        Expr::Bool { value, .. } => chunk.emit_const(Value::Bool(*value)),
        Expr::Str { value, .. } => chunk.emit_const(Value::Str(value.clone())),
        // Arguments are already on the stack in declaration order.
        Expr::Ident { .. } => Ok(()),
        Expr::Prefix { op, right } => emit_prefix(chunk, op, right),
        Expr::Infix { left, op, right } => {
            emit_expr(chunk, names, left)?;
            emit_expr(chunk, names, right)?;
            let opcode = match op.lexeme.as_str() {
                "+" => Opcode::Add,
                "-" => Opcode::Sub,
                "*" => Opcode::Mul,
                "/" => Opcode::Div,
                "%" => Opcode::Mod,
                "+." => Opcode::FAdd,
                "-." => Opcode::FSub,
                "*." => Opcode::FMul,
                "/." => Opcode::FDiv,
                "<" => Opcode::Lt,
                ">" => Opcode::Gt,
                "<=" => Opcode::Le,
                ">=" => Opcode::Ge,
                "<." => Opcode::FLt,
                ">." => Opcode::FGt,
                "<=." => Opcode::FLe,
                ">=." => Opcode::FGe,
                "==" => Opcode::Eq,
                "!=" => Opcode::Neq,
                "&&" => Opcode::AndAnd,
                "||" => Opcode::OrOr,
                other => {
                    return Err(format!(
                        "operator '{}' is not supported by the bytecode backend",
                        other
                    ));
                }
            };
            chunk.emit(opcode);
            Ok(())
        }
        Expr::Block { exprs, .. } => {
            // Intermediate values are popped; the last stays on the stack.
            for (i, sub) in exprs.iter().enumerate() {
                emit_expr(chunk, names, sub)?;
                if i + 1 < exprs.len() {
                    chunk.emit(Opcode::Pop);
                }
            }
            Ok(())
        }
        Expr::If {
            cond, then, alt, ..
        } => {
            let Some(alt) = alt else {
                return Err(
                    "if without else is not supported by the bytecode backend".to_string()
                );
            };
            emit_expr(chunk, names, cond)?;
            let to_else = chunk.emit_jump(Opcode::JumpIfFalse);
            emit_expr(chunk, names, then)?;
            let to_end = chunk.emit_jump(Opcode::Jump);
            chunk.patch_jump(to_else)?;
            emit_expr(chunk, names, alt)?;
            chunk.patch_jump(to_end)?;
            Ok(())
        }
        Expr::Call { callee, args, .. } => {
            let Expr::Ident { name, .. } = callee.as_ref() else {
                return Err(
                    "only direct calls to named functions are supported by the bytecode backend"
                        .to_string(),
                );
            };
            for arg in args {
                emit_expr(chunk, names, arg)?;
            }
            let idx = function_index(names, name)?;
            chunk.emit(Opcode::Call);
            chunk.emit_byte(idx);
            Ok(())
        }
        Expr::Pipeline { left, right, .. } => match right.as_ref() {
            // `L |> f` and `L |> f(args…)` both compile as calls with L
            // first, matching the checker's rewrite.
            Expr::Ident { name, .. } => {
                emit_expr(chunk, names, left)?;
                let idx = function_index(names, name)?;
                chunk.emit(Opcode::Call);
                chunk.emit_byte(idx);
                Ok(())
            }
            Expr::Call { callee, args, .. } => {
                let Expr::Ident { name, .. } = callee.as_ref() else {
                    return Err(
                        "only direct calls to named functions are supported by the bytecode backend"
                            .to_string(),
                    );
                };
                emit_expr(chunk, names, left)?;
                for arg in args {
                    emit_expr(chunk, names, arg)?;
                }
                let idx = function_index(names, name)?;
                chunk.emit(Opcode::Call);
                chunk.emit_byte(idx);
                Ok(())
            }
            _ => Err("right side of pipeline must be a function or call".to_string()),
        },
        other => Err(format!(
            "{} is not supported by the bytecode backend",
            other.kind_name()
        )),
    }
}

/// Prefix operators have no dedicated opcodes; negation constant-folds over
/// literals and everything else is rejected.
fn emit_prefix(chunk: &mut Chunk, op: &crate::token::Token, right: &Expr) -> Result<(), String> {
    match (op.lexeme.as_str(), right) {
        ("-", Expr::Int { value, .. }) => chunk.emit_const(Value::Int(-value)),
        ("-", Expr::Unsigned { value, .. }) => chunk.emit_const(Value::Int(-(*value as i64))),
        ("-", Expr::Float { value, .. }) | ("-.", Expr::Float { value, .. }) => {
            chunk.emit_const(Value::Float(-value))
        }
        ("-", _) | ("-.", _) => {
            Err("unary negation of non-literal expressions is not supported by the bytecode backend"
                .to_string())
        }
        _ => Err(format!(
            "prefix '{}' is not supported by the bytecode backend",
            op.lexeme
        )),
    }
}
