//! Integration tests over the public compiler surface: tokens in, chunks
//! and diagnostics out, the way embedding tools consume the crate.

use emberc::{
    CompileError, CompilerConfig, MapResolver, ModuleEnv, Severity, Type, TypeChecker,
    compile_source, compile_source_with, dump_program, has_errors, parse_program, tokenize,
};

#[test]
fn test_phases_compose() {
    let source = "fn square(x: Int) Int { x * x }\nfn main() Int { square(12) }";
    let tokens = tokenize(source, "square.em").unwrap();
    let (program, parse_diags) = parse_program(tokens);
    assert!(parse_diags.is_empty());

    let mut checker = TypeChecker::new();
    let check_diags = checker.check_program(&program);
    assert!(!has_errors(&check_diags));

    let chunk = emberc::generate(&program).unwrap();
    assert_eq!(chunk.funcs.len(), 2);
    assert!(chunk.validate().is_ok());
}

#[test]
fn test_diagnostic_rendering_includes_caret() {
    let err = compile_source("val y = missing", "caret.em").unwrap_err();
    let CompileError::Diagnostics(diags) = err else {
        panic!("expected diagnostics");
    };
    let rendered = diags[0].to_string();
    assert!(rendered.contains("undefined variable: missing"));
    assert!(rendered.contains("--> caret.em:1:9"));
    assert!(rendered.contains("val y = missing"));
    assert!(rendered.lines().last().unwrap().trim_end().ends_with('^'));
}

#[test]
fn test_multiple_errors_in_one_unit() {
    let source = "val a = missing_one\nval b = missing_two\nfn f(x) Int { x }";
    let tokens = tokenize(source, "many.em").unwrap();
    let (program, parse_diags) = parse_program(tokens);
    assert!(parse_diags.is_empty());
    let errors = TypeChecker::new().check_program(&program);
    assert_eq!(errors.len(), 3, "got: {:?}", errors);
}

#[test]
fn test_module_resolution_through_config() {
    let mut strings = ModuleEnv::new();
    strings.insert("length", Type::func(vec![Type::String], Type::int()));
    let resolver = MapResolver::new().with_module("std/strings", strings);

    let source = "use std/strings as s\nfn main() Int { s:length(\"four\") }";
    let config = CompilerConfig::new().with_resolver(Box::new(resolver));
    let chunk = compile_source_with(source, "mods.em", config);
    // Checking succeeds; generation stops at the module-qualified call,
    // which has no function-table entry.
    assert!(matches!(chunk, Err(CompileError::Codegen(_))));
}

#[test]
fn test_member_import_then_local_shadow() {
    let mut math = ModuleEnv::new();
    math.insert("abs", Type::func(vec![Type::int()], Type::int()));
    let resolver = MapResolver::new().with_module("std/math", math);

    let source = "use std/math.{abs}\nfn f(n: Int) Int { abs(n) }";
    let tokens = tokenize(source, "imports.em").unwrap();
    let (program, _) = parse_program(tokens);
    let mut checker = TypeChecker::new().with_resolver(Box::new(resolver));
    assert!(!has_errors(&checker.check_program(&program)));
}

#[test]
fn test_dump_round_trip_labels() {
    let source = "fn main() Int { 1 + 2 * 3 }";
    let tokens = tokenize(source, "dump.em").unwrap();
    let (program, _) = parse_program(tokens);
    let tree = dump_program(&program);
    assert!(tree.contains("FuncDecl main"));
    assert!(tree.contains("Infix +"));
    assert!(tree.contains("Infix *"));
}

#[test]
fn test_warning_survives_alongside_success() {
    let source = "fn f(n: Int) Int { match n { _ -> 0\n 9 -> 9 } }";
    let tokens = tokenize(source, "warn.em").unwrap();
    let (program, _) = parse_program(tokens);
    let diags = TypeChecker::new().check_program(&program);
    assert!(diags.iter().all(|d| d.severity == Severity::Warning));
    assert!(!diags.is_empty());
}

#[test]
fn test_recursion_flag_round_trip() {
    let source = "fn fact(n: Int) Int { if n < 2 then 1 else n * fact(n - 1) }";
    let tokens = tokenize(source, "fact.em").unwrap();
    let (program, _) = parse_program(tokens);
    assert!(program.find_function("fact").unwrap().recursive);
    assert!(!has_errors(&TypeChecker::new().check_program(&program)));
}

#[test]
fn test_function_types_feed_the_backend() {
    let source = "fn scale(x: F32, factor: F32) F32 { x *. factor }";
    let tokens = tokenize(source, "backend.em").unwrap();
    let (program, _) = parse_program(tokens);
    let mut checker = TypeChecker::new();
    assert!(!has_errors(&checker.check_program(&program)));
    let types = emberc::ProgramTypes::new(checker.take_function_types());
    assert_eq!(types.functions["scale"].to_string(), "(F32, F32) -> F32");
    assert!(types.int_bits == 32 || types.int_bits == 64);
}

#[test]
fn test_lexical_failure_returns_no_partial_stream() {
    let err = tokenize("val ok = 1\nval bad = \"unterminated", "fatal.em").unwrap_err();
    assert!(err.message.contains("unterminated string literal"));
    // The whole unit is rejected: compile sees exactly one fatal diagnostic.
    let err = compile_source("val ok = 1\nval bad = \"unterminated", "fatal.em").unwrap_err();
    let CompileError::Diagnostics(diags) = err else {
        panic!("expected diagnostics");
    };
    assert_eq!(diags.len(), 1);
}
