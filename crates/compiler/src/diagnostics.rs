//! Diagnostic reporting.
//!
//! Every phase reports problems as [`Diagnostic`] values carrying a message
//! and a 1-based source position. The rendered form reproduces the offending
//! source line with a caret under the column:
//!
//! ```text
//! undefined variable: x
//!   --> demo.em:3:9
//!    |
//!  3 | val y = x + 1
//!    |         ^
//! ```
//!
//! Diagnostics serialize with serde so the editor-integration bridge can
//! ship them as JSON; inside the core they are plain values, never control
//! flow.

use crate::token::Token;
use serde::Serialize;
use std::fmt;

/// Whether a diagnostic rejects the program or merely annotates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A single reported problem, anchored at a source position.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub file: String,
    /// 1-based line.
    pub line: u32,
    /// 1-based column.
    pub column: u32,
    /// The full text of the offending line, captured at creation time so the
    /// source buffer can be dropped afterwards.
    line_text: String,
}

impl Diagnostic {
    pub fn error_at(token: &Token, message: impl Into<String>) -> Self {
        Diagnostic::at(Severity::Error, token, message)
    }

    pub fn warning_at(token: &Token, message: impl Into<String>) -> Self {
        Diagnostic::at(Severity::Warning, token, message)
    }

    fn at(severity: Severity, token: &Token, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            file: token.file.to_string(),
            line: token.line,
            column: token.column,
            line_text: line_text(&token.source, token.line),
        }
    }
}

/// Extract the text of a 1-based line from a source buffer.
fn line_text(source: &str, line: u32) -> String {
    if line == 0 {
        return String::new();
    }
    source
        .lines()
        .nth(line as usize - 1)
        .unwrap_or("")
        .to_string()
}

fn caret(column: u32) -> String {
    let spaces = column.saturating_sub(1) as usize;
    format!("{}^", " ".repeat(spaces))
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n  --> {}:{}:{}\n   |\n{:2} | {}\n   | {}",
            self.message,
            self.file,
            self.line,
            self.column,
            self.line,
            self.line_text,
            caret(self.column),
        )
    }
}

/// True when any diagnostic in the list rejects the program.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(|d| d.severity == Severity::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenKind;
    use std::rc::Rc;

    fn token_at(line: u32, column: u32, source: &str) -> Token {
        Token::new(
            TokenKind::Identifier,
            "x",
            line,
            column,
            Rc::from("demo.em"),
            Rc::from(source),
        )
    }

    #[test]
    fn test_display_reproduces_line_and_caret() {
        let tok = token_at(2, 5, "val a = 1\nval b = x\n");
        let diag = Diagnostic::error_at(&tok, "undefined variable: x");
        let text = diag.to_string();
        assert!(text.contains("undefined variable: x"));
        assert!(text.contains("--> demo.em:2:5"));
        assert!(text.contains("val b = x"));
        let caret_line = text.lines().last().unwrap();
        assert_eq!(caret_line, "   |     ^");
    }

    #[test]
    fn test_has_errors_ignores_warnings() {
        let tok = token_at(1, 1, "match x { _ -> 1 }");
        let warn = Diagnostic::warning_at(&tok, "unreachable match arm");
        assert!(!has_errors(&[warn.clone()]));
        let err = Diagnostic::error_at(&tok, "boom");
        assert!(has_errors(&[warn, err]));
    }

    #[test]
    fn test_serializes_for_the_editor_bridge() {
        let tok = token_at(1, 3, "1 + true");
        let diag = Diagnostic::error_at(&tok, "invalid operands for '+'");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "Error");
        assert_eq!(json["file"], "demo.em");
        assert_eq!(json["line"], 1);
        assert_eq!(json["column"], 3);
    }
}
