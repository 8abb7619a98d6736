//! Recursive-descent recognizer for LPD.
//!
//! Validates the grammar and flattens the token sequence into the shape the
//! AST builder consumes: punctuation that carries no meaning is dropped,
//! statement separators are synthesized after every simple statement, the
//! program body is introduced by a `MainBegin` marker, and a leading sign of
//! a simple expression becomes `UnaryPlus`/`UnaryMinus`.

use crate::ast::Span;
use crate::lexer::{Token, TokenKind};

#[derive(Debug, thiserror::Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub code: &'static str,
    pub line: u32,
    pub column: u32,
    pub span: Span,
    pub message: String,
}

type Result<T> = std::result::Result<T, ParseError>;

pub struct Recognizer {
    tokens: Vec<Token>,
    pos: usize,
    out: Vec<Token>,
}

/// Recognizes a whole program and returns the flat token stream.
pub fn recognize(tokens: Vec<Token>) -> Result<Vec<Token>> {
    let mut r = Recognizer::new(tokens);
    r.program()?;
    Ok(r.out)
}

impl Recognizer {
    pub fn new(tokens: Vec<Token>) -> Self {
        Recognizer { tokens, pos: 0, out: Vec::new() }
    }

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn error(&self, code: &'static str, message: String) -> ParseError {
        match self.current().or_else(|| self.tokens.last()) {
            Some(t) => ParseError { code, line: t.line, column: t.column, span: t.span, message },
            None => ParseError { code, line: 1, column: 1, span: Span::UNKNOWN, message },
        }
    }

    /// Consumes a token of `kind`, returning it.
    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        match self.current() {
            Some(t) if t.kind == kind => {
                let t = t.clone();
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(self.error(
                "LPD-P001",
                format!("expected '{}', found '{}'", kind, t.text),
            )),
            None => Err(self.error("LPD-P002", format!("expected '{kind}', found end of input"))),
        }
    }

    /// Consumes a token of `kind` and copies it to the output.
    fn keep(&mut self, kind: TokenKind) -> Result<()> {
        let t = self.expect(kind)?;
        self.out.push(t);
        Ok(())
    }

    fn drop_token(&mut self, kind: TokenKind) -> Result<()> {
        self.expect(kind).map(|_| ())
    }

    fn synthesize(&mut self, kind: TokenKind) {
        let at = self
            .out
            .last()
            .or_else(|| self.tokens.get(self.pos.saturating_sub(1)))
            .cloned();
        if let Some(at) = at {
            self.out.push(Token::synthetic(kind, &at));
        }
    }

    // ---- program structure ----

    fn program(&mut self) -> Result<()> {
        self.keep(TokenKind::Program)?;
        self.keep(TokenKind::Identifier)?;
        self.drop_token(TokenKind::Semicolon)?;
        self.block(true)?;
        self.drop_token(TokenKind::Dot)?;
        if let Some(t) = self.current() {
            return Err(self.error("LPD-P003", format!("unexpected '{}' after end of program", t.text)));
        }
        Ok(())
    }

    fn block(&mut self, main: bool) -> Result<()> {
        if self.check(TokenKind::Var) {
            self.var_declarations()?;
        }
        self.subroutines()?;
        if main {
            match self.current() {
                Some(t) => {
                    let marker = Token::synthetic(TokenKind::MainBegin, t);
                    self.out.push(marker);
                }
                None => return Err(self.error("LPD-P002", "expected 'inicio', found end of input".into())),
            }
        }
        self.compound()
    }

    fn var_declarations(&mut self) -> Result<()> {
        self.keep(TokenKind::Var)?;
        loop {
            self.keep(TokenKind::Identifier)?;
            while self.check(TokenKind::Comma) {
                self.drop_token(TokenKind::Comma)?;
                self.keep(TokenKind::Identifier)?;
            }
            self.drop_token(TokenKind::Colon)?;
            self.type_name()?;
            self.drop_token(TokenKind::Semicolon)?;
            if !self.check(TokenKind::Identifier) {
                return Ok(());
            }
        }
    }

    fn type_name(&mut self) -> Result<()> {
        match self.peek() {
            Some(k) if k.is_type() => self.keep(k),
            _ => Err(self.error("LPD-P004", "expected a type ('inteiro' or 'booleano')".into())),
        }
    }

    fn subroutines(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(TokenKind::Procedure) => {
                    self.keep(TokenKind::Procedure)?;
                    self.keep(TokenKind::Identifier)?;
                    self.drop_token(TokenKind::Semicolon)?;
                    self.block(false)?;
                }
                Some(TokenKind::Function) => {
                    self.keep(TokenKind::Function)?;
                    self.keep(TokenKind::Identifier)?;
                    self.drop_token(TokenKind::Colon)?;
                    self.type_name()?;
                    self.drop_token(TokenKind::Semicolon)?;
                    self.block(false)?;
                }
                _ => return Ok(()),
            }
            self.drop_token(TokenKind::Semicolon)?;
        }
    }

    // ---- statements ----

    fn compound(&mut self) -> Result<()> {
        self.keep(TokenKind::Begin)?;
        if self.check(TokenKind::End) {
            return self.keep(TokenKind::End);
        }
        self.statement()?;
        while self.check(TokenKind::Semicolon) {
            self.keep(TokenKind::Semicolon)?;
            if self.check(TokenKind::End) {
                break;
            }
            self.statement()?;
        }
        self.keep(TokenKind::End)
    }

    fn statement(&mut self) -> Result<()> {
        match self.peek() {
            Some(TokenKind::Identifier) => {
                self.keep(TokenKind::Identifier)?;
                if self.check(TokenKind::Attrib) {
                    self.keep(TokenKind::Attrib)?;
                    self.expression()?;
                }
            }
            Some(TokenKind::If) => {
                self.keep(TokenKind::If)?;
                self.expression()?;
                self.keep(TokenKind::Then)?;
                self.statement()?;
                if self.check(TokenKind::Else) {
                    self.keep(TokenKind::Else)?;
                    self.statement()?;
                }
            }
            Some(TokenKind::While) => {
                self.keep(TokenKind::While)?;
                self.expression()?;
                self.keep(TokenKind::Do)?;
                self.statement()?;
            }
            Some(TokenKind::For) => {
                self.keep(TokenKind::For)?;
                self.keep(TokenKind::Identifier)?;
                self.drop_token(TokenKind::Attrib)?;
                self.expression()?;
                self.keep(TokenKind::While)?;
                self.expression()?;
                self.synthesize(TokenKind::Semicolon);
                if self.check(TokenKind::Step) {
                    self.keep(TokenKind::Step)?;
                    self.expression()?;
                    self.synthesize(TokenKind::Semicolon);
                }
                self.drop_token(TokenKind::Do)?;
                self.statement()?;
            }
            Some(k @ (TokenKind::Read | TokenKind::Write)) => {
                self.keep(k)?;
                self.drop_token(TokenKind::LParen)?;
                self.keep(TokenKind::Identifier)?;
                self.drop_token(TokenKind::RParen)?;
            }
            Some(TokenKind::Begin) => return self.compound(),
            Some(_) => {
                let text = self.current().map(|t| t.text.clone()).unwrap_or_default();
                return Err(self.error("LPD-P005", format!("expected a statement, found '{text}'")));
            }
            None => return Err(self.error("LPD-P002", "expected a statement, found end of input".into())),
        }
        self.synthesize(TokenKind::Semicolon);
        Ok(())
    }

    // ---- expressions ----

    fn expression(&mut self) -> Result<()> {
        self.simple_expression()?;
        if let Some(k) = self.peek().filter(|k| k.is_relational()) {
            self.keep(k)?;
            self.simple_expression()?;
        }
        Ok(())
    }

    fn simple_expression(&mut self) -> Result<()> {
        if let Some(sign) = self.peek().filter(|k| matches!(k, TokenKind::Plus | TokenKind::Minus)) {
            let mut t = self.expect(sign)?;
            t.kind = if sign == TokenKind::Plus { TokenKind::UnaryPlus } else { TokenKind::UnaryMinus };
            self.out.push(t);
        }
        self.term()?;
        while let Some(k) = self
            .peek()
            .filter(|k| matches!(k, TokenKind::Plus | TokenKind::Minus | TokenKind::Or))
        {
            self.keep(k)?;
            self.term()?;
        }
        Ok(())
    }

    fn term(&mut self) -> Result<()> {
        self.factor()?;
        while let Some(k) = self
            .peek()
            .filter(|k| matches!(k, TokenKind::Times | TokenKind::Div | TokenKind::And))
        {
            self.keep(k)?;
            self.factor()?;
        }
        Ok(())
    }

    fn factor(&mut self) -> Result<()> {
        match self.peek() {
            Some(k @ (TokenKind::Identifier | TokenKind::Number | TokenKind::True | TokenKind::False)) => {
                self.keep(k)
            }
            Some(TokenKind::Not) => {
                self.keep(TokenKind::Not)?;
                self.factor()
            }
            Some(TokenKind::LParen) => {
                self.keep(TokenKind::LParen)?;
                self.expression()?;
                self.keep(TokenKind::RParen)
            }
            Some(_) => {
                let text = self.current().map(|t| t.text.clone()).unwrap_or_default();
                Err(self.error("LPD-P006", format!("expected an operand, found '{text}'")))
            }
            None => Err(self.error("LPD-P002", "expected an operand, found end of input".into())),
        }
    }
}
