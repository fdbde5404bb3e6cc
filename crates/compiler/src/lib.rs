//! Ember compiler front-end.
//!
//! Source text moves through four staged phases: lexical scanning
//! ([`lexer`]), recursive-descent parsing ([`parser`]), type checking with
//! numeric family inference ([`typechecker`]), and either bytecode emission
//! for the stack VM ([`codegen`]) or lowering to a textual IR through a
//! pluggable [`backend::Backend`].
//!
//! # Compiling a source string
//!
//! ```rust,ignore
//! use emberc::compile_source;
//!
//! let chunk = compile_source("fn main() Int { 2 + 3 }", "demo.em")?;
//! // hand `chunk` to ember-vm for execution
//! ```
//!
//! Embedders that need module resolution go through
//! [`compile_source_with`] and [`CompilerConfig`]. The individual phases
//! are public for collaborators (read-eval loops, editor bridges) that want
//! partial results and full diagnostic lists.

pub mod ast;
pub mod backend;
pub mod codegen;
pub mod config;
pub mod diagnostics;
pub mod dump;
pub mod lexer;
pub mod ops;
pub mod parser;
pub mod resolver;
pub mod token;
pub mod typechecker;
pub mod types;
pub mod unification;

pub use ast::{Expr, FuncDecl, MatchArm, Param, Program};
pub use backend::{Backend, ProgramTypes};
pub use codegen::generate;
pub use config::CompilerConfig;
pub use diagnostics::{Diagnostic, Severity, has_errors};
pub use dump::{dump_expr, dump_program};
pub use lexer::tokenize;
pub use parser::parse_program;
pub use resolver::{MapResolver, ModuleEnv, ModuleResolver};
pub use token::{Token, TokenKind};
pub use typechecker::TypeChecker;
pub use types::{Family, Type, Width, platform_int_bits};

use ember_core::Chunk;
use tracing::debug;

/// Why a one-shot compilation failed.
#[derive(Debug)]
pub enum CompileError {
    /// Lexical, parse, or type diagnostics (at least one error severity).
    Diagnostics(Vec<Diagnostic>),
    /// A generator-level fatal error.
    Codegen(String),
}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompileError::Diagnostics(diags) => {
                let rendered: Vec<String> = diags.iter().map(|d| d.to_string()).collect();
                write!(f, "{}", rendered.join("\n"))
            }
            CompileError::Codegen(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CompileError {}

/// Compile a source string to its top-level chunk with default
/// configuration.
pub fn compile_source(source: &str, file: &str) -> Result<Chunk, CompileError> {
    compile_source_with(source, file, CompilerConfig::default())
}

/// Compile a source string to its top-level chunk.
///
/// Runs lex → parse → check → generate. Any error-severity diagnostic
/// rejects the program; warnings alone do not. Collaborators that need the
/// warnings as well should drive the phases individually.
pub fn compile_source_with(
    source: &str,
    file: &str,
    config: CompilerConfig,
) -> Result<Chunk, CompileError> {
    debug!(file, bytes = source.len(), "compiling");
    let tokens =
        tokenize(source, file).map_err(|fatal| CompileError::Diagnostics(vec![fatal]))?;
    let (program, mut diagnostics) = parse_program(tokens);
    let mut checker = TypeChecker::new();
    if let Some(resolver) = config.resolver {
        checker = checker.with_resolver(resolver);
    }
    diagnostics.extend(checker.check_program(&program));
    if has_errors(&diagnostics) {
        return Err(CompileError::Diagnostics(diagnostics));
    }
    codegen::generate(&program).map_err(CompileError::Codegen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_source_happy_path() {
        let chunk = compile_source("fn main() Int { 2 + 3 }", "demo.em").unwrap();
        assert_eq!(chunk.funcs.len(), 1);
        assert!(chunk.validate().is_ok());
    }

    #[test]
    fn test_lexical_error_is_fatal() {
        let err = compile_source("a ? b", "demo.em").unwrap_err();
        let CompileError::Diagnostics(diags) = err else {
            panic!("expected diagnostics");
        };
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("unexpected character"));
    }

    #[test]
    fn test_type_errors_reject_compilation() {
        let err = compile_source("fn main() Int { 1 + \"x\" }", "demo.em").unwrap_err();
        let CompileError::Diagnostics(diags) = err else {
            panic!("expected diagnostics");
        };
        assert!(has_errors(&diags));
    }

    #[test]
    fn test_parse_and_type_diagnostics_accumulate() {
        // One parse error and one type error in the same unit.
        let err = compile_source("val = 1\nfn f() Int { missing }", "demo.em").unwrap_err();
        let CompileError::Diagnostics(diags) = err else {
            panic!("expected diagnostics");
        };
        assert!(diags.len() >= 2);
    }

    #[test]
    fn test_codegen_error_surfaces() {
        // Well-typed but outside the VM-expressible subset.
        let err = compile_source("[1, 2]", "demo.em").unwrap_err();
        let CompileError::Codegen(message) = err else {
            panic!("expected codegen error");
        };
        assert!(message.contains("not supported"));
    }

    #[test]
    fn test_warnings_alone_do_not_reject_checking() {
        // The dead arm is a warning, so checking passes; the failure comes
        // from the generator (match is outside the VM subset), not from
        // diagnostics.
        let source = "fn f(n: Int) Int { match n { _ -> 0\n 1 -> 2 } }";
        let err = compile_source(source, "demo.em").unwrap_err();
        assert!(matches!(err, CompileError::Codegen(_)));
    }
}
