//! Lexical scanner for Ember source text.
//!
//! [`tokenize`] turns a UTF-8 source buffer into a finite token sequence
//! ending in exactly one end-of-file token. Lexical errors are fatal to the
//! compilation unit: the first character that cannot begin any token (or an
//! unterminated/malformed literal) aborts scanning with a [`Diagnostic`]
//! and no partial stream is returned.

use crate::diagnostics::Diagnostic;
use crate::token::{Token, TokenKind, lookup_identifier, strip_numeric_separators};
use std::rc::Rc;

pub struct Lexer {
    source: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
    file: Rc<str>,
    raw: Rc<str>,
}

/// Scan a whole source buffer.
pub fn tokenize(source: &str, file: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut lexer = Lexer::new(source, file);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.kind == TokenKind::EndOfFile;
        out.push(token);
        if done {
            return Ok(out);
        }
    }
}

fn is_identifier_start(ch: char) -> bool {
    ch == '_' || ch == '$' || ch.is_alphabetic()
}

fn is_identifier_part(ch: char) -> bool {
    is_identifier_start(ch) || ch.is_ascii_digit() || ch == '\''
}

impl Lexer {
    pub fn new(source: &str, file: &str) -> Self {
        Lexer {
            source: source.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            file: Rc::from(file),
            raw: Rc::from(source),
        }
    }

    pub fn next_token(&mut self) -> Result<Token, Diagnostic> {
        self.consume_whitespace();
        let (start_line, start_column) = (self.line, self.column);
        let Some(ch) = self.peek_at(0) else {
            return Ok(self.make_token(TokenKind::EndOfFile, "", start_line, start_column));
        };
        if is_identifier_start(ch) {
            let lexeme = self.scan_identifier();
            let kind = lookup_identifier(&lexeme);
            return Ok(self.make_token(kind, lexeme, start_line, start_column));
        }
        if ch.is_ascii_digit() {
            return self.scan_number_literal(start_line, start_column);
        }
        if ch == '"' {
            let lexeme = self.scan_string_literal()?;
            return Ok(self.make_token(TokenKind::String, lexeme, start_line, start_column));
        }
        if ch == '\'' {
            let lexeme = self.scan_byte_literal()?;
            return Ok(self.make_token(TokenKind::Byte, lexeme, start_line, start_column));
        }
        if ch == '/' && self.peek_at(1) == Some('*') {
            return self.scan_block_comment();
        }
        if ch == '/' && self.peek_at(1) == Some('/') {
            let lexeme = self.scan_line_comment();
            return Ok(self.make_token(TokenKind::Comment, lexeme, start_line, start_column));
        }
        let token = match ch {
            '=' => {
                self.advance();
                if self.peek_at(0) == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::EqualEqual, "==", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Equal, "=", start_line, start_column)
                }
            }
            '!' => {
                self.advance();
                if self.peek_at(0) == Some('=') {
                    self.advance();
                    self.make_token(TokenKind::NotEqual, "!=", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Bang, "!", start_line, start_column)
                }
            }
            '<' => {
                self.advance();
                if self.peek_at(0) == Some('=') {
                    self.advance();
                    if self.peek_at(0) == Some('.') {
                        self.advance();
                        self.make_token(TokenKind::LessEqualDot, "<=.", start_line, start_column)
                    } else {
                        self.make_token(TokenKind::LessEqual, "<=", start_line, start_column)
                    }
                } else if self.peek_at(0) == Some('.') {
                    self.advance();
                    self.make_token(TokenKind::LessDot, "<.", start_line, start_column)
                } else if self.peek_at(0) == Some('>') {
                    self.advance();
                    self.make_token(TokenKind::LtGt, "<>", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Less, "<", start_line, start_column)
                }
            }
            '>' => {
                self.advance();
                if self.peek_at(0) == Some('=') {
                    self.advance();
                    if self.peek_at(0) == Some('.') {
                        self.advance();
                        self.make_token(
                            TokenKind::GreaterEqualDot,
                            ">=.",
                            start_line,
                            start_column,
                        )
                    } else {
                        self.make_token(TokenKind::GreaterEqual, ">=", start_line, start_column)
                    }
                } else if self.peek_at(0) == Some('.') {
                    self.advance();
                    self.make_token(TokenKind::GreaterDot, ">.", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Greater, ">", start_line, start_column)
                }
            }
            '+' => {
                self.advance();
                if self.peek_at(0) == Some('.') {
                    self.advance();
                    self.make_token(TokenKind::PlusDot, "+.", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Plus, "+", start_line, start_column)
                }
            }
            '-' => {
                self.advance();
                if self.peek_at(0) == Some('.') {
                    self.advance();
                    self.make_token(TokenKind::MinusDot, "-.", start_line, start_column)
                } else if self.peek_at(0) == Some('>') {
                    self.advance();
                    self.make_token(TokenKind::RArrow, "->", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Minus, "-", start_line, start_column)
                }
            }
            '*' => {
                self.advance();
                if self.peek_at(0) == Some('.') {
                    self.advance();
                    self.make_token(TokenKind::StarDot, "*.", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Star, "*", start_line, start_column)
                }
            }
            '/' => {
                self.advance();
                if self.peek_at(0) == Some('.') {
                    self.advance();
                    self.make_token(TokenKind::SlashDot, "/.", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Slash, "/", start_line, start_column)
                }
            }
            '%' => {
                self.advance();
                self.make_token(TokenKind::Percent, "%", start_line, start_column)
            }
            ':' => {
                self.advance();
                self.make_token(TokenKind::Colon, ":", start_line, start_column)
            }
            ',' => {
                self.advance();
                self.make_token(TokenKind::Comma, ",", start_line, start_column)
            }
            '{' => {
                self.advance();
                self.make_token(TokenKind::LeftBrace, "{", start_line, start_column)
            }
            '}' => {
                self.advance();
                self.make_token(TokenKind::RightBrace, "}", start_line, start_column)
            }
            '(' => {
                self.advance();
                self.make_token(TokenKind::LeftParen, "(", start_line, start_column)
            }
            ')' => {
                self.advance();
                self.make_token(TokenKind::RightParen, ")", start_line, start_column)
            }
            '[' => {
                self.advance();
                self.make_token(TokenKind::LeftBracket, "[", start_line, start_column)
            }
            ']' => {
                self.advance();
                self.make_token(TokenKind::RightBracket, "]", start_line, start_column)
            }
            '|' => {
                self.advance();
                if self.peek_at(0) == Some('|') {
                    self.advance();
                    self.make_token(TokenKind::VbarVbar, "||", start_line, start_column)
                } else if self.peek_at(0) == Some('>') {
                    self.advance();
                    self.make_token(TokenKind::Pipe, "|>", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Vbar, "|", start_line, start_column)
                }
            }
            '&' => {
                self.advance();
                if self.peek_at(0) == Some('&') {
                    self.advance();
                    self.make_token(TokenKind::AmperAmper, "&&", start_line, start_column)
                } else {
                    // A bare '&' begins no token.
                    return Err(self.error_at(start_line, start_column, "unexpected character '&'"));
                }
            }
            '.' => {
                self.advance();
                if self.peek_at(0) == Some('.') {
                    self.advance();
                    self.make_token(TokenKind::DotDot, "..", start_line, start_column)
                } else {
                    self.make_token(TokenKind::Dot, ".", start_line, start_column)
                }
            }
            '@' => {
                self.advance();
                self.make_token(TokenKind::At, "@", start_line, start_column)
            }
            other => {
                return Err(self.error_at(
                    start_line,
                    start_column,
                    format!("unexpected character {:?}", other),
                ));
            }
        };
        Ok(token)
    }

    fn advance(&mut self) -> Option<char> {
        let ch = *self.source.get(self.position)?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.position + offset).copied()
    }

    fn make_token(
        &self,
        kind: TokenKind,
        lexeme: impl Into<String>,
        line: u32,
        column: u32,
    ) -> Token {
        Token::new(
            kind,
            lexeme,
            line,
            column,
            Rc::clone(&self.file),
            Rc::clone(&self.raw),
        )
    }

    fn error_at(&self, line: u32, column: u32, message: impl Into<String>) -> Diagnostic {
        let anchor = self.make_token(TokenKind::Illegal, "", line, column);
        Diagnostic::error_at(&anchor, message)
    }

    fn scan_identifier(&mut self) -> String {
        let start = self.position;
        while let Some(ch) = self.peek_at(0) {
            if !is_identifier_part(ch) {
                break;
            }
            self.advance();
        }
        self.source[start..self.position].iter().collect()
    }

    fn scan_number_literal(&mut self, line: u32, column: u32) -> Result<Token, Diagnostic> {
        let start = self.position;
        let mut is_float = false;
        while let Some(ch) = self.peek_at(0) {
            if ch == '.' {
                // `1..5` is Int, DotDot, Int: stop before the range operator.
                if self.peek_at(1) == Some('.') {
                    break;
                }
                is_float = true;
                self.advance();
                continue;
            }
            if !ch.is_ascii_digit() && ch != '_' {
                break;
            }
            self.advance();
        }
        if self.peek_at(0) == Some('u') {
            self.advance();
            let lexeme: String = self.source[start..self.position].iter().collect();
            let clean = strip_numeric_separators(&lexeme[..lexeme.len() - 1]);
            if clean.parse::<u64>().is_ok() {
                return Ok(self.make_token(TokenKind::Unsigned, lexeme, line, column));
            }
            return Err(self.error_at(
                line,
                column,
                format!("invalid unsigned literal {:?}", lexeme),
            ));
        }
        let lexeme: String = self.source[start..self.position].iter().collect();
        let clean = strip_numeric_separators(&lexeme);
        if is_float {
            if clean.parse::<f64>().is_ok() {
                return Ok(self.make_token(TokenKind::Float, lexeme, line, column));
            }
        } else if clean.parse::<i64>().is_ok() {
            return Ok(self.make_token(TokenKind::Int, lexeme, line, column));
        } else if clean.parse::<f64>().is_ok() {
            return Ok(self.make_token(TokenKind::Float, lexeme, line, column));
        }
        Err(self.error_at(line, column, format!("invalid numeric literal {:?}", lexeme)))
    }

    fn scan_string_literal(&mut self) -> Result<String, Diagnostic> {
        let start = self.position;
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let mut ch = match self.advance() {
            Some(c) => c,
            None => return Err(self.error_at(line, column, "unterminated string literal")),
        };
        if ch == '"' {
            return Err(self.error_at(line, column, "empty string literal"));
        }
        loop {
            if ch == '\\' {
                let esc = match self.advance() {
                    Some(c) => c,
                    None => {
                        return Err(self.error_at(
                            line,
                            column,
                            "unterminated escape sequence in string literal",
                        ));
                    }
                };
                match esc {
                    'n' | 't' | 'r' | '\\' | '\'' | '"' | '0' => {}
                    other => {
                        return Err(self.error_at(
                            line,
                            column,
                            format!("invalid escape character: \\{}", other),
                        ));
                    }
                }
            }
            ch = match self.advance() {
                Some(c) => c,
                None => return Err(self.error_at(line, column, "unterminated string literal")),
            };
            if ch == '"' {
                break;
            }
        }
        Ok(self.source[start..self.position].iter().collect())
    }

    fn scan_byte_literal(&mut self) -> Result<String, Diagnostic> {
        let start = self.position;
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let ch = match self.advance() {
            Some(c) => c,
            None => return Err(self.error_at(line, column, "unterminated character literal")),
        };
        if ch == '\'' {
            return Err(self.error_at(line, column, "empty character literal"));
        }
        if ch == '\\' {
            let esc = match self.advance() {
                Some(c) => c,
                None => {
                    return Err(self.error_at(
                        line,
                        column,
                        "unterminated escape sequence in character literal",
                    ));
                }
            };
            match esc {
                'n' | 't' | 'r' | '\\' | '\'' | '"' | '0' => {}
                other => {
                    return Err(self.error_at(
                        line,
                        column,
                        format!("invalid escape character: \\{}", other),
                    ));
                }
            }
        }
        match self.advance() {
            Some('\'') => {}
            Some(_) => {
                return Err(self.error_at(
                    line,
                    column,
                    "extra characters in character literal (expected closing ')",
                ));
            }
            None => return Err(self.error_at(line, column, "unterminated character literal")),
        }
        Ok(self.source[start..self.position].iter().collect())
    }

    fn scan_line_comment(&mut self) -> String {
        let start = self.position;
        self.advance();
        self.advance();
        while let Some(ch) = self.peek_at(0) {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
        self.source[start..self.position].iter().collect()
    }

    fn scan_block_comment(&mut self) -> Result<Token, Diagnostic> {
        let (line, column) = (self.line, self.column);
        let start = self.position;
        self.advance();
        self.advance();
        let mut is_doc = false;
        if self.peek_at(0) == Some('*') {
            is_doc = true;
            self.advance();
        }
        // Block comments do not nest: the first `*/` terminates.
        loop {
            let ch = match self.advance() {
                Some(c) => c,
                None => return Err(self.error_at(line, column, "unterminated block comment")),
            };
            if ch == '*' && self.peek_at(0) == Some('/') {
                self.advance();
                break;
            }
        }
        let lexeme: String = self.source[start..self.position].iter().collect();
        let kind = if is_doc {
            TokenKind::DocComment
        } else {
            TokenKind::Comment
        };
        Ok(self.make_token(kind, lexeme, line, column))
    }

    fn consume_whitespace(&mut self) {
        while let Some(ch) = self.peek_at(0) {
            if ch == ' ' || ch == '\t' || ch == '\r' || ch == '\n' {
                self.advance();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, "test.em")
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn single(source: &str) -> Token {
        let tokens = tokenize(source, "test.em").unwrap();
        assert_eq!(tokens.len(), 2, "expected one token + EOF for {:?}", source);
        assert_eq!(tokens[1].kind, TokenKind::EndOfFile);
        tokens.into_iter().next().unwrap()
    }

    #[test]
    fn test_fixed_lexeme_tokens() {
        let cases: &[(&str, TokenKind)] = &[
            ("(", TokenKind::LeftParen),
            (")", TokenKind::RightParen),
            ("{", TokenKind::LeftBrace),
            ("}", TokenKind::RightBrace),
            ("[", TokenKind::LeftBracket),
            ("]", TokenKind::RightBracket),
            ("+", TokenKind::Plus),
            ("-", TokenKind::Minus),
            ("*", TokenKind::Star),
            ("/", TokenKind::Slash),
            ("%", TokenKind::Percent),
            ("+.", TokenKind::PlusDot),
            ("-.", TokenKind::MinusDot),
            ("*.", TokenKind::StarDot),
            ("/.", TokenKind::SlashDot),
            ("<", TokenKind::Less),
            ("<=", TokenKind::LessEqual),
            ("<.", TokenKind::LessDot),
            ("<=.", TokenKind::LessEqualDot),
            (">", TokenKind::Greater),
            (">=", TokenKind::GreaterEqual),
            (">.", TokenKind::GreaterDot),
            (">=.", TokenKind::GreaterEqualDot),
            ("<>", TokenKind::LtGt),
            ("==", TokenKind::EqualEqual),
            ("!=", TokenKind::NotEqual),
            ("=", TokenKind::Equal),
            ("!", TokenKind::Bang),
            ("|", TokenKind::Vbar),
            ("||", TokenKind::VbarVbar),
            ("&&", TokenKind::AmperAmper),
            ("|>", TokenKind::Pipe),
            (":", TokenKind::Colon),
            (",", TokenKind::Comma),
            (".", TokenKind::Dot),
            ("..", TokenKind::DotDot),
            ("->", TokenKind::RArrow),
            ("@", TokenKind::At),
            ("fn", TokenKind::KwFn),
            ("val", TokenKind::KwVal),
            ("mut", TokenKind::KwMut),
            ("if", TokenKind::KwIf),
            ("then", TokenKind::KwThen),
            ("else", TokenKind::KwElse),
            ("match", TokenKind::KwMatch),
            ("use", TokenKind::KwUse),
            ("pub", TokenKind::KwPub),
            ("type", TokenKind::KwType),
            ("Int", TokenKind::KwInt),
            ("U32", TokenKind::KwU32),
            ("_", TokenKind::Underscore),
        ];
        for (lexeme, kind) in cases {
            let tok = single(lexeme);
            assert_eq!(tok.kind, *kind, "for {:?}", lexeme);
            assert_eq!(tok.lexeme, *lexeme, "for {:?}", lexeme);
        }
    }

    #[test]
    fn test_string_lexeme_keeps_escapes() {
        let tok = single(r#""hello\nworld""#);
        assert_eq!(tok.kind, TokenKind::String);
        assert_eq!(tok.lexeme, r#""hello\nworld""#);
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(single("123").kind, TokenKind::Int);
        let sep = single("4_567");
        assert_eq!(sep.kind, TokenKind::Int);
        assert_eq!(sep.lexeme, "4_567");
        assert_eq!(single("3.14").kind, TokenKind::Float);
        assert_eq!(single("10u").kind, TokenKind::Unsigned);
    }

    #[test]
    fn test_range_splits_into_dotdot() {
        let tokens = tokenize("1..5", "test.em").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Int,
                TokenKind::DotDot,
                TokenKind::Int,
                TokenKind::EndOfFile
            ]
        );
        assert_eq!(tokens[0].lexeme, "1");
        assert_eq!(tokens[2].lexeme, "5");
    }

    #[test]
    fn test_line_comments() {
        assert_eq!(
            kinds("//x\n//y\nz"),
            vec![
                TokenKind::Comment,
                TokenKind::Comment,
                TokenKind::Identifier,
                TokenKind::EndOfFile
            ]
        );
    }

    #[test]
    fn test_block_and_doc_comments() {
        assert_eq!(
            kinds("/* block */ /** doc */ x"),
            vec![
                TokenKind::Comment,
                TokenKind::DocComment,
                TokenKind::Identifier,
                TokenKind::EndOfFile
            ]
        );
    }

    #[test]
    fn test_nested_block_comment_is_unterminated() {
        // The opener inside is swallowed; the comment closes at the first
        // `*/`, leaving the trailing `*/` as stray tokens, or errors at EOF.
        let err = tokenize("/* outer /* inner */", "test.em");
        assert!(err.is_ok());
        let err = tokenize("/* never closed", "test.em").unwrap_err();
        assert!(err.message.contains("unterminated block comment"));
    }

    #[test]
    fn test_positions() {
        let tokens = tokenize("val x\n  y", "test.em").unwrap();
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].column), (1, 5));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
    }

    #[test]
    fn test_bare_ampersand_is_fatal() {
        let err = tokenize("a & b", "test.em").unwrap_err();
        assert!(err.message.contains('&'));
    }

    #[test]
    fn test_unterminated_string_is_fatal() {
        let err = tokenize("\"abc", "test.em").unwrap_err();
        assert!(err.message.contains("unterminated string literal"));
    }

    #[test]
    fn test_bad_escape_is_fatal() {
        let err = tokenize(r#""a\qb""#, "test.em").unwrap_err();
        assert!(err.message.contains("invalid escape character"));
    }

    #[test]
    fn test_byte_literals() {
        assert_eq!(single("'a'").kind, TokenKind::Byte);
        assert_eq!(single(r"'\n'").kind, TokenKind::Byte);
        let err = tokenize("'ab'", "test.em").unwrap_err();
        assert!(err.message.contains("extra characters"));
        let err = tokenize("''", "test.em").unwrap_err();
        assert!(err.message.contains("empty character literal"));
    }

    #[test]
    fn test_identifier_alphabet() {
        assert_eq!(single("$env").kind, TokenKind::Identifier);
        assert_eq!(single("x'").kind, TokenKind::Identifier);
        assert_eq!(single("_hidden").kind, TokenKind::Identifier);
    }

    #[test]
    fn test_booleans() {
        let t = single("True");
        assert_eq!(t.kind, TokenKind::Bool);
        assert_eq!(t.lexeme, "True");
        assert_eq!(single("False").kind, TokenKind::Bool);
    }
}
