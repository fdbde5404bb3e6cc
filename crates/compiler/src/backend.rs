//! Native-backend interface.
//!
//! The alternative to bytecode execution is lowering the typed AST to a
//! textual SSA-style IR for an external native toolchain. That emitter is a
//! collaborator, not part of this crate: it plugs in through [`Backend`]
//! and consumes only the program expression list, the checked function
//! signatures, and the platform integer width. Whatever it produces is an
//! opaque text artifact; whatever goes wrong inside it comes back as a
//! diagnostic string.

use crate::ast::Program;
use crate::types::{Type, platform_int_bits};
use std::collections::HashMap;

/// The type information a backend consumes: resolved signatures for every
/// checked top-level function, plus the platform integer width used for
/// defaulted numerics.
#[derive(Debug, Clone)]
pub struct ProgramTypes {
    pub functions: HashMap<String, Type>,
    pub int_bits: u32,
}

impl ProgramTypes {
    /// Bundle checker output (see
    /// [`crate::TypeChecker::take_function_types`]) with the detected
    /// platform width.
    pub fn new(functions: HashMap<String, Type>) -> Self {
        ProgramTypes {
            functions,
            int_bits: platform_int_bits(),
        }
    }
}

/// A visitor over the typed AST producing an opaque text artifact.
pub trait Backend {
    fn lower(&mut self, program: &Program, types: &ProgramTypes) -> Result<String, String>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse_program;
    use crate::typechecker::TypeChecker;

    /// A toy backend that lists function signatures, one per line.
    struct SignatureLister;

    impl Backend for SignatureLister {
        fn lower(&mut self, program: &Program, types: &ProgramTypes) -> Result<String, String> {
            let mut out = String::new();
            for expr in &program.exprs {
                if let crate::ast::Expr::FuncDecl(f) = expr {
                    let ty = types
                        .functions
                        .get(&f.name.lexeme)
                        .ok_or_else(|| format!("no type recorded for {}", f.name.lexeme))?;
                    out.push_str(&format!("{}: {}\n", f.name.lexeme, ty));
                }
            }
            Ok(out)
        }
    }

    #[test]
    fn test_backend_consumes_checked_types() {
        let tokens = tokenize("fn add(x: I32, y: I32) I32 { x + y }", "test.em").unwrap();
        let (program, parse_diags) = parse_program(tokens);
        assert!(parse_diags.is_empty());
        let mut checker = TypeChecker::new();
        assert!(checker.check_program(&program).is_empty());

        let types = ProgramTypes::new(checker.take_function_types());
        assert!(types.int_bits == 32 || types.int_bits == 64);
        let ir = SignatureLister.lower(&program, &types).unwrap();
        assert_eq!(ir, "add: (I32, I32) -> I32\n");
    }

    #[test]
    fn test_backend_errors_are_strings() {
        let mut types = ProgramTypes::new(HashMap::new());
        types.functions.clear();
        let program = {
            let tokens = tokenize("fn f() Int { 1 }", "test.em").unwrap();
            parse_program(tokens).0
        };
        let err = SignatureLister.lower(&program, &types).unwrap_err();
        assert!(err.contains("no type recorded"));
    }
}
