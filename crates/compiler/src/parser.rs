//! Recursive-descent parser for Ember.
//!
//! Expressions are parsed with Pratt-style precedence climbing: a primary
//! first, then infix operators while their precedence meets the current
//! threshold (left-associative, so the right operand is parsed one level
//! tighter). `:` and `.` chains are consumed eagerly inside the primary so
//! qualified names and field accesses bind before any call argument list.
//!
//! The parser recovers from local errors: it records a diagnostic anchored
//! at the offending token, skips to the next token that could begin a
//! declaration (or past a closing brace), and resumes. A single file can
//! therefore report several problems in one pass.

use crate::ast::{Decorator, Expr, FuncDecl, MatchArm, Param, Program};
use crate::diagnostics::Diagnostic;
use crate::token::{Token, TokenKind, strip_numeric_separators};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    /// Doc comments waiting to attach to the next function declaration.
    pending_docs: Vec<String>,
}

/// Parse a token stream into a program plus every diagnostic encountered.
pub fn parse_program(tokens: Vec<Token>) -> (Program, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let mut program = Program::new();
    while parser.cur().kind != TokenKind::EndOfFile {
        if parser.skip_comments() {
            continue;
        }
        let decorators = parser.parse_decorators();
        let Some(mut expr) = parser.parse_expression(0) else {
            parser.synchronize();
            continue;
        };
        if let Expr::FuncDecl(f) = &mut expr {
            f.decorators = decorators;
            f.docs = std::mem::take(&mut parser.pending_docs);
        } else {
            parser.pending_docs.clear();
        }
        program.exprs.push(expr);
    }
    detect_recursion(&mut program);
    (program, parser.diagnostics)
}

/// Mark every top-level function whose body calls the function's own name.
///
/// Purely syntactic: shadowing is not considered and mutual recursion is
/// not flagged.
fn detect_recursion(program: &mut Program) {
    for expr in &mut program.exprs {
        if let Expr::FuncDecl(f) = expr {
            let name = f.name.lexeme.clone();
            if let Some(body) = &f.body {
                if contains_self_call(body, &name) {
                    f.recursive = true;
                }
            }
        }
    }
}

fn contains_self_call(expr: &Expr, fn_name: &str) -> bool {
    match expr {
        Expr::Call { callee, args, .. } => {
            if let Expr::Ident { name, .. } = callee.as_ref() {
                if name == fn_name {
                    return true;
                }
            }
            args.iter().any(|a| contains_self_call(a, fn_name))
        }
        Expr::Block { exprs, .. } => exprs.iter().any(|e| contains_self_call(e, fn_name)),
        Expr::If {
            cond, then, alt, ..
        } => {
            contains_self_call(cond, fn_name)
                || contains_self_call(then, fn_name)
                || alt
                    .as_ref()
                    .is_some_and(|e| contains_self_call(e, fn_name))
        }
        Expr::Match { value, arms, .. } => {
            contains_self_call(value, fn_name)
                || arms.iter().any(|arm| {
                    contains_self_call(&arm.pattern, fn_name)
                        || arm
                            .guard
                            .as_ref()
                            .is_some_and(|g| contains_self_call(g, fn_name))
                        || contains_self_call(&arm.body, fn_name)
                })
        }
        Expr::Infix { left, right, .. } => {
            contains_self_call(left, fn_name) || contains_self_call(right, fn_name)
        }
        Expr::Prefix { right, .. } => contains_self_call(right, fn_name),
        Expr::Pipeline { left, right, .. } => {
            contains_self_call(left, fn_name) || contains_self_call(right, fn_name)
        }
        Expr::Tuple { elements, .. } | Expr::List { elements, .. } => {
            elements.iter().any(|e| contains_self_call(e, fn_name))
        }
        Expr::Index { target, index, .. } => {
            contains_self_call(target, fn_name) || contains_self_call(index, fn_name)
        }
        Expr::FieldAccess { left, .. } => contains_self_call(left, fn_name),
        Expr::Qualified { left, .. } => contains_self_call(left, fn_name),
        Expr::VarDecl { value, .. } => value
            .as_ref()
            .is_some_and(|v| contains_self_call(v, fn_name)),
        Expr::Assign { value, .. } => contains_self_call(value, fn_name),
        _ => false,
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            pending_docs: Vec::new(),
        }
    }

    fn cur(&self) -> Token {
        self.tokens.get(self.pos).cloned().unwrap_or_else(Token::eof)
    }

    fn peek(&self, n: usize) -> Token {
        self.tokens
            .get(self.pos + n)
            .cloned()
            .unwrap_or_else(Token::eof)
    }

    fn eat(&mut self) -> Token {
        let token = self.cur();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, kind: TokenKind) -> Option<Token> {
        if self.cur().kind == kind {
            return Some(self.eat());
        }
        let token = self.cur();
        self.error_at(
            &token,
            format!("expected token {:?}, got {:?}", kind, token.kind),
        );
        self.synchronize();
        None
    }

    fn error_at(&mut self, token: &Token, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::error_at(token, message));
    }

    /// Skip to the next token that could begin a declaration, or just past
    /// a closing brace. Returns without consuming the declaration starter
    /// so the top-level loop can retry from it.
    fn synchronize(&mut self) {
        while self.cur().kind != TokenKind::EndOfFile {
            match self.cur().kind {
                TokenKind::KwFn
                | TokenKind::KwVal
                | TokenKind::KwMut
                | TokenKind::KwIf
                | TokenKind::KwType
                | TokenKind::KwMatch
                | TokenKind::KwUse => return,
                TokenKind::RightBrace => {
                    self.eat();
                    return;
                }
                _ => {
                    self.eat();
                }
            }
        }
    }

    /// Consume a single leading comment token, collecting doc comments for
    /// the next function declaration. Returns true when one was consumed.
    fn skip_comments(&mut self) -> bool {
        match self.cur().kind {
            TokenKind::Comment => {
                self.eat();
                true
            }
            TokenKind::DocComment => {
                let token = self.eat();
                self.pending_docs.push(token.lexeme);
                true
            }
            _ => false,
        }
    }

    fn parse_expression(&mut self, min_prec: u8) -> Option<Expr> {
        if self.cur().kind == TokenKind::KwVal {
            return self.parse_var_decl(false);
        }
        if self.cur().kind == TokenKind::KwMut {
            return self.parse_var_decl(true);
        }
        let mut left = self.parse_primary()?;
        if let Expr::Ident { name, .. } = &left {
            if self.cur().kind == TokenKind::Equal {
                let name = name.clone();
                let assign_tok = self.eat();
                let Some(right) = self.parse_expression(0) else {
                    self.error_at(
                        &assign_tok,
                        format!("missing right-hand side for assignment to {}", name),
                    );
                    return None;
                };
                return Some(Expr::Assign {
                    name,
                    value: Box::new(right),
                    pos: assign_tok,
                });
            }
        }
        loop {
            let op_tok = self.cur();
            match op_tok.kind {
                TokenKind::Colon => {
                    self.eat();
                    let member = self.expect(TokenKind::Identifier)?;
                    left = Expr::Qualified {
                        left: Box::new(left),
                        member,
                        pos: op_tok,
                    };
                    continue;
                }
                TokenKind::Dot => {
                    self.eat();
                    let field = self.expect(TokenKind::Identifier)?;
                    left = Expr::FieldAccess {
                        left: Box::new(left),
                        field: field.lexeme,
                        pos: op_tok,
                    };
                    continue;
                }
                TokenKind::EndOfFile => break,
                _ => {}
            }
            let prec = op_tok.kind.precedence();
            if prec == 0 || prec < min_prec {
                break;
            }
            self.eat();
            let Some(right) = self.parse_expression(prec + 1) else {
                self.error_at(
                    &op_tok,
                    format!("missing right-hand side after operator '{}'", op_tok.lexeme),
                );
                return None;
            };
            left = if op_tok.kind == TokenKind::Pipe {
                Expr::Pipeline {
                    left: Box::new(left),
                    right: Box::new(right),
                    pos: op_tok,
                }
            } else {
                Expr::Infix {
                    left: Box::new(left),
                    op: op_tok,
                    right: Box::new(right),
                }
            };
        }
        Some(left)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let tok = self.cur();
        let expr = match tok.kind {
            TokenKind::Identifier => {
                self.eat();
                let mut expr = Expr::Ident {
                    name: tok.lexeme.clone(),
                    pos: tok,
                };
                loop {
                    match self.cur().kind {
                        TokenKind::Colon => {
                            let op_tok = self.eat();
                            let member = self.expect(TokenKind::Identifier)?;
                            expr = Expr::Qualified {
                                left: Box::new(expr),
                                member,
                                pos: op_tok,
                            };
                        }
                        TokenKind::Dot => {
                            let op_tok = self.eat();
                            let field = self.expect(TokenKind::Identifier)?;
                            expr = Expr::FieldAccess {
                                left: Box::new(expr),
                                field: field.lexeme,
                                pos: op_tok,
                            };
                        }
                        _ => break,
                    }
                }
                if self.cur().kind == TokenKind::LeftParen {
                    expr = self.parse_call(expr)?;
                }
                expr
            }
            TokenKind::Int => {
                self.eat();
                let clean = strip_numeric_separators(&tok.lexeme);
                let value = match clean.parse::<i64>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.error_at(&tok, format!("invalid int literal {:?}", tok.lexeme));
                        0
                    }
                };
                Expr::Int {
                    value,
                    raw: tok.lexeme.clone(),
                    pos: tok,
                }
            }
            TokenKind::Unsigned => {
                self.eat();
                let digits = &tok.lexeme[..tok.lexeme.len() - 1];
                let clean = strip_numeric_separators(digits);
                let value = match clean.parse::<u64>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.error_at(&tok, format!("invalid unsigned literal {:?}", tok.lexeme));
                        0
                    }
                };
                Expr::Unsigned {
                    value,
                    raw: tok.lexeme.clone(),
                    pos: tok,
                }
            }
            TokenKind::Float => {
                self.eat();
                let clean = strip_numeric_separators(&tok.lexeme);
                let value = match clean.parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.error_at(&tok, format!("invalid float literal {:?}", tok.lexeme));
                        0.0
                    }
                };
                Expr::Float {
                    value,
                    raw: tok.lexeme.clone(),
                    pos: tok,
                }
            }
            TokenKind::String => {
                self.eat();
                let value = unescape_string(&tok.lexeme);
                Expr::Str { value, pos: tok }
            }
            TokenKind::Byte => {
                self.eat();
                let value = match decode_byte_literal(&tok.lexeme) {
                    Some(v) => v,
                    None => {
                        self.error_at(&tok, format!("invalid byte literal {}", tok.lexeme));
                        0
                    }
                };
                Expr::Byte {
                    value,
                    raw: tok.lexeme.clone(),
                    pos: tok,
                }
            }
            TokenKind::Bool => {
                self.eat();
                Expr::Bool {
                    value: tok.lexeme == "True",
                    pos: tok,
                }
            }
            TokenKind::LeftParen => {
                self.eat();
                if self.cur().kind == TokenKind::RightParen {
                    self.eat();
                    return Some(Expr::Tuple {
                        elements: Vec::new(),
                        pos: tok,
                    });
                }
                let mut elements = Vec::new();
                loop {
                    let elem = self.parse_expression(0)?;
                    elements.push(elem);
                    if self.cur().kind == TokenKind::Comma {
                        self.eat();
                        continue;
                    }
                    break;
                }
                self.expect(TokenKind::RightParen)?;
                // A single parenthesized expression unwraps; anything else
                // is a tuple.
                if elements.len() == 1 {
                    elements.pop().unwrap()
                } else {
                    Expr::Tuple { elements, pos: tok }
                }
            }
            TokenKind::Bang | TokenKind::Minus | TokenKind::MinusDot => {
                self.eat();
                let Some(right) = self.parse_expression(7) else {
                    self.error_at(
                        &tok,
                        format!("missing expression after prefix '{}'", tok.lexeme),
                    );
                    return None;
                };
                return Some(Expr::Prefix {
                    op: tok,
                    right: Box::new(right),
                });
            }
            TokenKind::KwPub => {
                self.eat();
                match self.cur().kind {
                    TokenKind::KwFn => return self.parse_func(true),
                    TokenKind::KwType => return self.parse_type_decl(true),
                    _ => {
                        let cur = self.cur();
                        self.error_at(&cur, "expected `fn` or `type` after `pub`");
                        return None;
                    }
                }
            }
            TokenKind::KwFn => return self.parse_func(false),
            TokenKind::LeftBrace => return self.parse_block(),
            TokenKind::KwUse => return self.parse_use(),
            TokenKind::KwIf => return self.parse_if(),
            TokenKind::KwMatch => return self.parse_match(),
            TokenKind::LeftBracket => self.parse_list()?,
            TokenKind::KwType => return self.parse_type_decl(false),
            _ => {
                self.error_at(&tok, format!("unexpected token {:?}", tok.lexeme));
                return None;
            }
        };
        self.parse_index_suffixes(expr)
    }

    /// `target[index]` suffixes on a value-producing primary.
    fn parse_index_suffixes(&mut self, mut expr: Expr) -> Option<Expr> {
        while self.cur().kind == TokenKind::LeftBracket {
            let bracket = self.eat();
            let Some(index) = self.parse_expression(0) else {
                self.error_at(&bracket, "invalid index expression");
                return None;
            };
            self.expect(TokenKind::RightBracket)?;
            expr = Expr::Index {
                target: Box::new(expr),
                index: Box::new(index),
                pos: bracket,
            };
        }
        Some(expr)
    }

    fn parse_call(&mut self, callee: Expr) -> Option<Expr> {
        let lparen = self.eat();
        let mut args = Vec::new();
        if self.cur().kind != TokenKind::RightParen {
            loop {
                let Some(arg) = self.parse_expression(0) else {
                    let cur = self.cur();
                    self.error_at(&cur, "invalid argument expression in call");
                    return None;
                };
                args.push(arg);
                if self.cur().kind == TokenKind::Comma {
                    self.eat();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        Some(Expr::Call {
            callee: Box::new(callee),
            args,
            pos: lparen,
        })
    }

    fn parse_var_decl(&mut self, mutable: bool) -> Option<Expr> {
        self.eat(); // `val` or `mut`
        let name = self.expect(TokenKind::Identifier)?;
        let mut ann = None;
        if self.cur().kind == TokenKind::Colon {
            self.eat();
            ann = self.parse_type().map(Box::new);
        }
        self.expect(TokenKind::Equal)?;
        let value = match self.parse_expression(0) {
            Some(v) => v,
            None => {
                let kind = if mutable { "mut" } else { "val" };
                self.error_at(
                    &name,
                    format!("missing initializer for {} {}", kind, name.lexeme),
                );
                return Some(Expr::VarDecl {
                    mutable,
                    name,
                    ann,
                    value: None,
                });
            }
        };
        // Literal coercion: a numeric annotation re-tags integer literals in
        // the initializer to the annotated family before type checking.
        let value = match &ann {
            Some(ty) => coerce_expr_to_type(value, ty),
            None => value,
        };
        Some(Expr::VarDecl {
            mutable,
            name,
            ann,
            value: Some(Box::new(value)),
        })
    }

    fn parse_func(&mut self, public: bool) -> Option<Expr> {
        self.expect(TokenKind::KwFn)?;
        let name = self.expect(TokenKind::Identifier)?;
        self.expect(TokenKind::LeftParen)?;
        let mut params = Vec::new();
        if self.cur().kind != TokenKind::RightParen {
            loop {
                let param_name = self.expect(TokenKind::Identifier)?;
                let mut ty = None;
                if self.cur().kind == TokenKind::Colon {
                    self.eat();
                    ty = self.parse_type();
                }
                params.push(Param {
                    name: param_name,
                    ty,
                });
                if self.cur().kind == TokenKind::Comma {
                    self.eat();
                    continue;
                }
                break;
            }
        }
        self.expect(TokenKind::RightParen)?;
        // Anything other than the body's `{` introduces a return type.
        let mut ret = None;
        if self.cur().kind != TokenKind::LeftBrace && self.cur().kind != TokenKind::EndOfFile {
            ret = self.parse_type().map(Box::new);
        }
        let mut body = None;
        if self.cur().kind == TokenKind::LeftBrace {
            body = self.parse_block().map(Box::new);
        }
        Some(Expr::FuncDecl(FuncDecl {
            public,
            recursive: false,
            name,
            params,
            ret,
            body,
            decorators: Vec::new(),
            docs: Vec::new(),
        }))
    }

    fn parse_block(&mut self) -> Option<Expr> {
        let brace = self.expect(TokenKind::LeftBrace)?;
        let mut exprs = Vec::new();
        while self.cur().kind != TokenKind::RightBrace && self.cur().kind != TokenKind::EndOfFile {
            if self.skip_comments() {
                continue;
            }
            match self.parse_expression(0) {
                Some(e) => exprs.push(e),
                None => {
                    self.eat();
                }
            }
        }
        self.expect(TokenKind::RightBrace)?;
        Some(Expr::Block { exprs, pos: brace })
    }

    fn parse_use(&mut self) -> Option<Expr> {
        let start = self.eat();
        let mut path = Vec::new();
        loop {
            let Some(segment) = self.expect(TokenKind::Identifier) else {
                let cur = self.cur();
                self.error_at(&cur, "expected identifier in use path");
                return None;
            };
            path.push(segment.lexeme);
            if self.cur().kind == TokenKind::Slash {
                self.eat();
                continue;
            }
            break;
        }
        let mut members = Vec::new();
        let mut alias = None;
        if self.cur().kind == TokenKind::Dot && self.peek(1).kind == TokenKind::LeftBrace {
            self.eat();
            self.eat();
            loop {
                let Some(member) = self.expect(TokenKind::Identifier) else {
                    let cur = self.cur();
                    self.error_at(&cur, "expected member in use {...}");
                    return None;
                };
                members.push(member.lexeme);
                if self.cur().kind == TokenKind::Comma {
                    self.eat();
                    continue;
                }
                break;
            }
            self.expect(TokenKind::RightBrace)?;
        }
        if self.cur().kind == TokenKind::KwAs {
            self.eat();
            let Some(alias_tok) = self.expect(TokenKind::Identifier) else {
                let cur = self.cur();
                self.error_at(&cur, "expected identifier after 'as'");
                return None;
            };
            alias = Some(alias_tok.lexeme);
        }
        Some(Expr::Use {
            path,
            alias,
            members,
            pos: start,
        })
    }

    fn parse_if(&mut self) -> Option<Expr> {
        let start = self.eat();
        let Some(cond) = self.parse_expression(0) else {
            let cur = self.cur();
            self.error_at(&cur, "expected condition after 'if'");
            return None;
        };
        let then;
        let mut alt = None;
        match self.cur().kind {
            TokenKind::KwThen => {
                self.eat();
                let Some(then_expr) = self.parse_expression(0) else {
                    let cur = self.cur();
                    self.error_at(&cur, "expected expression after 'then'");
                    return None;
                };
                then = then_expr;
                if self.cur().kind != TokenKind::KwElse {
                    let cur = self.cur();
                    self.error_at(&cur, "expected 'else' after then-expression");
                    return None;
                }
                self.eat();
                if self.cur().kind == TokenKind::LeftBrace {
                    let cur = self.cur();
                    self.error_at(&cur, "cannot use block-style else with expression-style then");
                }
                let Some(alt_expr) = self.parse_expression(0) else {
                    let cur = self.cur();
                    self.error_at(&cur, "expected expression after 'else'");
                    return None;
                };
                alt = Some(Box::new(alt_expr));
            }
            TokenKind::LeftBrace => {
                then = self.parse_block()?;
                if self.cur().kind == TokenKind::KwElse {
                    self.eat();
                    if self.cur().kind != TokenKind::LeftBrace {
                        let cur = self.cur();
                        self.error_at(&cur, "block-style if requires block after else");
                    }
                    alt = self.parse_block().map(Box::new);
                }
            }
            _ => {
                let cur = self.cur();
                self.error_at(&cur, "expected 'then' or '{'");
                return None;
            }
        }
        Some(Expr::If {
            cond: Box::new(cond),
            then: Box::new(then),
            alt,
            pos: start,
        })
    }

    fn parse_match(&mut self) -> Option<Expr> {
        let start = self.eat();
        let Some(value) = self.parse_expression(0) else {
            let cur = self.cur();
            self.error_at(&cur, "expected expression after 'match'");
            return None;
        };
        self.expect(TokenKind::LeftBrace)?;
        let mut arms = Vec::new();
        while self.cur().kind != TokenKind::RightBrace && self.cur().kind != TokenKind::EndOfFile {
            if self.cur().kind == TokenKind::Vbar {
                self.eat();
            }
            let arm_pos = self.cur();
            let pattern = if self.cur().kind == TokenKind::Underscore {
                let tok = self.eat();
                Expr::Ident {
                    name: "_".to_string(),
                    pos: tok,
                }
            } else {
                match self.parse_expression(0) {
                    Some(p) => p,
                    None => {
                        self.error_at(&arm_pos, "expected pattern in match arm");
                        return None;
                    }
                }
            };
            let mut guard = None;
            if self.cur().kind == TokenKind::KwIf {
                self.eat();
                match self.parse_expression(0) {
                    Some(g) => guard = Some(g),
                    None => {
                        let cur = self.cur();
                        self.error_at(&cur, "expected guard expression after 'if'");
                        return None;
                    }
                }
            }
            self.expect(TokenKind::RArrow)?;
            let Some(body) = self.parse_expression(0) else {
                let cur = self.cur();
                self.error_at(&cur, "expected body expression in match arm");
                return None;
            };
            arms.push(MatchArm {
                pattern,
                guard,
                body,
                pos: arm_pos,
            });
        }
        self.expect(TokenKind::RightBrace)?;
        Some(Expr::Match {
            value: Box::new(value),
            arms,
            pos: start,
        })
    }

    fn parse_list(&mut self) -> Option<Expr> {
        let start = self.eat();
        let mut elements = Vec::new();
        while self.cur().kind != TokenKind::RightBracket && self.cur().kind != TokenKind::EndOfFile
        {
            let Some(elem) = self.parse_expression(0) else {
                let cur = self.cur();
                self.error_at(&cur, "invalid list element");
                return None;
            };
            elements.push(elem);
            if self.cur().kind == TokenKind::Comma {
                self.eat();
                continue;
            }
            break;
        }
        self.expect(TokenKind::RightBracket)?;
        Some(Expr::List {
            elements,
            pos: start,
        })
    }

    fn parse_type(&mut self) -> Option<Expr> {
        let tok = self.cur();
        match tok.kind {
            TokenKind::KwInt
            | TokenKind::KwI8
            | TokenKind::KwI16
            | TokenKind::KwI32
            | TokenKind::KwI64
            | TokenKind::KwFloat
            | TokenKind::KwF32
            | TokenKind::KwF64
            | TokenKind::KwUnsigned
            | TokenKind::KwU8
            | TokenKind::KwU16
            | TokenKind::KwU32
            | TokenKind::KwU64
            | TokenKind::KwBool
            | TokenKind::KwByte
            | TokenKind::KwString
            | TokenKind::KwNil
            | TokenKind::Identifier => {
                self.eat();
                Some(Expr::TypeRef {
                    name: tok.lexeme.clone(),
                    elem: None,
                    pos: tok,
                })
            }
            TokenKind::KwList => {
                self.eat();
                let mut elem = None;
                if self.cur().kind == TokenKind::LeftParen {
                    self.eat();
                    elem = self.parse_type().map(Box::new);
                    self.expect(TokenKind::RightParen)?;
                }
                Some(Expr::TypeRef {
                    name: "List".to_string(),
                    elem,
                    pos: tok,
                })
            }
            TokenKind::LeftParen => {
                self.eat();
                let mut types = Vec::new();
                loop {
                    let ty = self.parse_type()?;
                    types.push(ty);
                    if self.cur().kind == TokenKind::Comma {
                        self.eat();
                        continue;
                    }
                    break;
                }
                self.expect(TokenKind::RightParen)?;
                Some(Expr::TupleTypeRef { types, pos: tok })
            }
            _ => {
                self.error_at(
                    &tok,
                    format!("expected type, got {:?} ({:?})", tok.lexeme, tok.kind),
                );
                None
            }
        }
    }

    fn parse_type_decl(&mut self, public: bool) -> Option<Expr> {
        self.expect(TokenKind::KwType)?;
        let name = self.expect(TokenKind::Identifier)?;
        let mut body = None;
        if self.cur().kind == TokenKind::LeftBrace {
            self.eat();
            let mut fields = Vec::new();
            while self.cur().kind != TokenKind::RightBrace
                && self.cur().kind != TokenKind::EndOfFile
            {
                if self.skip_comments() {
                    continue;
                }
                let field = self.expect(TokenKind::Identifier)?;
                if self.cur().kind != TokenKind::Colon {
                    self.error_at(
                        &field,
                        format!("expected ':' after field name {}", field.lexeme),
                    );
                }
                self.eat();
                let field_type = self.parse_type()?;
                fields.push(Param {
                    name: field,
                    ty: Some(field_type),
                });
                if self.cur().kind == TokenKind::Comma {
                    self.eat();
                }
            }
            self.expect(TokenKind::RightBrace)?;
            body = Some(Box::new(Expr::RecordType {
                name: name.clone(),
                fields,
                pos: name.clone(),
            }));
        }
        Some(Expr::TypeDecl {
            public,
            name: name.clone(),
            body,
            pos: name,
        })
    }

    fn parse_decorators(&mut self) -> Vec<Decorator> {
        let mut decorators = Vec::new();
        while self.cur().kind == TokenKind::At {
            self.eat();
            let Some(name) = self.expect(TokenKind::Identifier) else {
                let cur = self.cur();
                self.error_at(&cur, "expected decorator name after '@'");
                break;
            };
            let mut args = Vec::new();
            if self.cur().kind == TokenKind::LeftParen {
                self.eat();
                while self.cur().kind != TokenKind::RightParen
                    && self.cur().kind != TokenKind::EndOfFile
                {
                    match self.parse_expression(0) {
                        Some(arg) => args.push(arg),
                        None => {
                            let cur = self.cur();
                            self.error_at(&cur, "invalid decorator argument");
                        }
                    }
                    if self.cur().kind == TokenKind::Comma {
                        self.eat();
                    }
                }
                self.expect(TokenKind::RightParen);
            }
            decorators.push(Decorator {
                name: name.lexeme.clone(),
                args,
                pos: name,
            });
        }
        decorators
    }
}

/// Expand the escape alphabet in a quoted string lexeme. The lexer has
/// already validated the escapes.
fn unescape_string(lexeme: &str) -> String {
    let inner = lexeme
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(lexeme);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

/// Decode a single-quoted byte literal lexeme to its code unit.
fn decode_byte_literal(lexeme: &str) -> Option<u8> {
    let inner = lexeme.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let first = chars.next()?;
    let value = if first == '\\' {
        match chars.next()? {
            'n' => b'\n',
            't' => b'\t',
            'r' => b'\r',
            '\\' => b'\\',
            '\'' => b'\'',
            '"' => b'"',
            '0' => b'\0',
            _ => return None,
        }
    } else {
        if !first.is_ascii() {
            return None;
        }
        first as u8
    };
    if chars.next().is_some() {
        return None;
    }
    Some(value)
}

/// Re-tag integer literals in an initializer toward a numeric annotation.
///
/// `val x: U32 = 10 + 1` re-tags both literals as unsigned so their family
/// variables narrow against the annotation instead of clashing with it.
fn coerce_expr_to_type(expr: Expr, ty: &Expr) -> Expr {
    let family_name = match ty {
        Expr::TypeRef { name, .. } => name.as_str(),
        _ => return expr,
    };
    let to_unsigned = matches!(family_name, "Unsigned" | "U8" | "U16" | "U32" | "U64");
    let to_int = matches!(family_name, "Int" | "I8" | "I16" | "I32" | "I64");
    match expr {
        Expr::Int { value, raw, pos } if to_unsigned => Expr::Unsigned {
            value: value as u64,
            raw,
            pos,
        },
        Expr::Unsigned { value, raw, pos } if to_int => Expr::Int {
            value: value as i64,
            raw,
            pos,
        },
        Expr::Infix { left, op, right } => Expr::Infix {
            left: Box::new(coerce_expr_to_type(*left, ty)),
            op,
            right: Box::new(coerce_expr_to_type(*right, ty)),
        },
        Expr::Prefix { op, right } => Expr::Prefix {
            op,
            right: Box::new(coerce_expr_to_type(*right, ty)),
        },
        Expr::Call { callee, args, pos } => Expr::Call {
            callee,
            args: args
                .into_iter()
                .map(|a| coerce_expr_to_type(a, ty))
                .collect(),
            pos,
        },
        Expr::Block { exprs, pos } => Expr::Block {
            exprs: exprs
                .into_iter()
                .map(|e| coerce_expr_to_type(e, ty))
                .collect(),
            pos,
        },
        Expr::Tuple { elements, pos } => Expr::Tuple {
            elements: elements
                .into_iter()
                .map(|e| coerce_expr_to_type(e, ty))
                .collect(),
            pos,
        },
        Expr::List { elements, pos } => Expr::List {
            elements: elements
                .into_iter()
                .map(|e| coerce_expr_to_type(e, ty))
                .collect(),
            pos,
        },
        other => other,
    }
}
