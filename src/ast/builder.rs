//! Builds the typed syntax tree from the flat token stream.
//!
//! Symbols are installed and resolved as declarations and uses are met, and
//! every expression is type-checked while its tree is connected. The first
//! semantic error aborts the build.

use super::{AstNode, Span};
use crate::lexer::{Token, TokenKind};
use crate::symbols::{ALL_SCOPES, CURRENT_SCOPE, SubType, SymbolKind, SymbolTable};

/// A fatal semantic error. The `Display` form
/// `line L, column C, near 'TEXT': MESSAGE` is relied on by editors that jump
/// to the reported location, so it must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {column}, near '{near}': {message}")]
pub struct CompileError {
    pub code: &'static str,
    pub line: u32,
    pub column: u32,
    pub near: String,
    pub span: Span,
    pub message: String,
}

type Result<T> = std::result::Result<T, CompileError>;

/// Builds the tree for a full token stream.
pub fn build(tokens: &[Token]) -> Result<AstNode> {
    AstBuilder::new(tokens).build()
}

fn precedence(kind: TokenKind) -> u8 {
    match kind {
        TokenKind::Not | TokenKind::UnaryPlus | TokenKind::UnaryMinus => 5,
        TokenKind::Times | TokenKind::Div => 4,
        TokenKind::Plus | TokenKind::Minus => 3,
        k if k.is_relational() => 2,
        TokenKind::And | TokenKind::Or => 1,
        _ => 0,
    }
}

/// Result type of a binary operator applied to two operand types, if legal.
pub fn binary_result(op: TokenKind, left: SubType, right: SubType) -> Option<SubType> {
    match (left, right) {
        (SubType::Integer, SubType::Integer) => match op {
            k if k.is_relational() => Some(SubType::Boolean),
            TokenKind::Plus | TokenKind::Minus | TokenKind::Times | TokenKind::Div => Some(SubType::Integer),
            _ => None,
        },
        (SubType::Boolean, SubType::Boolean) => match op {
            TokenKind::Equal | TokenKind::Different | TokenKind::And | TokenKind::Or => Some(SubType::Boolean),
            _ => None,
        },
        _ => None,
    }
}

/// Result type of a unary operator applied to an operand type, if legal.
pub fn unary_result(op: TokenKind, operand: SubType) -> Option<SubType> {
    match (op, operand) {
        (TokenKind::UnaryPlus | TokenKind::UnaryMinus, SubType::Integer) => Some(SubType::Integer),
        (TokenKind::Not, SubType::Boolean) => Some(SubType::Boolean),
        _ => None,
    }
}

pub struct AstBuilder<'a> {
    tokens: &'a [Token],
    pos: usize,
    table: SymbolTable,
    /// Names of the procedures and functions currently being built, innermost last.
    routines: Vec<String>,
}

impl<'a> AstBuilder<'a> {
    pub fn new(tokens: &'a [Token]) -> Self {
        Self::with_table(tokens, SymbolTable::new())
    }

    /// Reuses `table`, clearing whatever an earlier pass left in it.
    pub fn with_table(tokens: &'a [Token], mut table: SymbolTable) -> Self {
        table.clear();
        AstBuilder { tokens, pos: 0, table, routines: Vec::new() }
    }

    pub fn into_table(self) -> SymbolTable {
        self.table
    }

    // ---- cursor ----

    fn peek(&self) -> Option<TokenKind> {
        self.tokens.get(self.pos).map(|t| t.kind)
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn current(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let tok = self.tokens.get(self.pos);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn error_at(&self, token: Option<&Token>, code: &'static str, message: impl Into<String>) -> CompileError {
        let token = token.or_else(|| self.tokens.last());
        match token {
            Some(t) => CompileError {
                code,
                line: t.line,
                column: t.column,
                near: t.text.clone(),
                span: t.span,
                message: message.into(),
            },
            None => CompileError {
                code,
                line: 1,
                column: 1,
                near: String::new(),
                span: Span::UNKNOWN,
                message: message.into(),
            },
        }
    }

    /// Opens the scope owned by the routine or program declared at `name`.
    fn enter_scope(&mut self, name: &Token) -> Result<()> {
        if self.table.enter_scope(&name.text) {
            Ok(())
        } else {
            Err(self.error_at(Some(name), "LPD-S002", format!("undefined symbol '{}'", name.text)))
        }
    }

    fn error(&self, code: &'static str, message: impl Into<String>) -> CompileError {
        self.error_at(self.current(), code, message)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<&'a Token> {
        match self.current() {
            Some(t) if t.kind == kind => {
                self.pos += 1;
                Ok(t)
            }
            Some(t) => Err(self.error("LPD-S009", format!("expected '{}', found '{}'", kind, t.text))),
            None => Err(self.error("LPD-S009", format!("expected '{kind}', found end of input"))),
        }
    }

    fn subtype_of(kind: TokenKind) -> SubType {
        match kind {
            TokenKind::Integer => SubType::Integer,
            TokenKind::Boolean => SubType::Boolean,
            _ => SubType::None,
        }
    }

    // ---- program and declarations ----

    pub fn build(&mut self) -> Result<AstNode> {
        self.expect(TokenKind::Program)?;
        let name = self.expect(TokenKind::Identifier)?;
        self.table
            .install(&name.text, SymbolKind::Program, SubType::None, ALL_SCOPES)
            .map_err(|e| self.error_at(Some(name), "LPD-S001", e.to_string()))?;
        self.enter_scope(name)?;

        let mut root = AstNode::named(TokenKind::Program, name.text.clone());
        self.declarations(&mut root)?;

        self.expect(TokenKind::MainBegin)?;
        root.push(AstNode::new(TokenKind::MainBegin));
        self.expect(TokenKind::Begin)?;
        self.statements_until_end(&mut root)?;

        if let Some(t) = self.current() {
            return Err(self.error_at(Some(t), "LPD-S009", format!("unexpected '{}' after program body", t.text)));
        }
        Ok(root)
    }

    fn at_top_level(&self) -> bool {
        self.routines.is_empty()
    }

    fn declarations(&mut self, parent: &mut AstNode) -> Result<()> {
        if self.check(TokenKind::Var) {
            self.var_section(parent)?;
        }
        while let Some(kind @ (TokenKind::Procedure | TokenKind::Function)) = self.peek() {
            self.routine(parent, kind)?;
        }
        Ok(())
    }

    fn var_section(&mut self, parent: &mut AstNode) -> Result<()> {
        self.expect(TokenKind::Var)?;
        let depth = if self.at_top_level() { ALL_SCOPES } else { CURRENT_SCOPE };
        let mut var = AstNode::new(TokenKind::Var);

        while self.check(TokenKind::Identifier) {
            let mut names = Vec::new();
            while self.check(TokenKind::Identifier) {
                names.extend(self.advance());
            }
            let ty = match self.advance() {
                Some(t) if t.kind.is_type() => t.kind,
                other => return Err(self.error_at(other, "LPD-S009", "expected a type after variable names")),
            };
            let mut group = AstNode::new(ty);
            for name in names {
                self.table
                    .install(&name.text, SymbolKind::Variable, Self::subtype_of(ty), depth)
                    .map_err(|e| self.error_at(Some(name), "LPD-S001", e.to_string()))?;
                group.push(AstNode::named(TokenKind::Identifier, name.text.clone()));
            }
            var.push(group);
        }

        parent.push(var);
        Ok(())
    }

    fn routine(&mut self, parent: &mut AstNode, kind: TokenKind) -> Result<()> {
        self.expect(kind)?;
        let name = self.expect(TokenKind::Identifier)?;
        let (symbol_kind, return_type) = if kind == TokenKind::Function {
            let ty = match self.advance() {
                Some(t) if t.kind.is_type() => t.kind,
                other => return Err(self.error_at(other, "LPD-S009", "expected a return type")),
            };
            (SymbolKind::Function, Some(ty))
        } else {
            (SymbolKind::Procedure, None)
        };
        let subtype = return_type.map_or(SubType::None, Self::subtype_of);

        if self.routines.last() == Some(&name.text) {
            return Err(self.error_at(
                Some(name),
                "LPD-S001",
                format!("duplicate symbol '{}' (same name as the enclosing routine)", name.text),
            ));
        }
        let depth = if self.at_top_level() { ALL_SCOPES } else { CURRENT_SCOPE };
        self.table
            .install(&name.text, symbol_kind, subtype, depth)
            .map_err(|e| self.error_at(Some(name), "LPD-S001", e.to_string()))?;

        let body = self.find_body_begin(self.pos)?;

        self.enter_scope(name)?;
        self.routines.push(name.text.clone());

        let mut node = AstNode::named(kind, name.text.clone());
        node.children.extend(return_type.map(AstNode::new));
        if self.pos < body {
            self.declarations(&mut node)?;
        }
        if self.pos != body {
            return Err(self.error("LPD-S009", format!("unexpected '{}' before the body of '{}'", self.current().map(|t| t.text.as_str()).unwrap_or(""), name.text)));
        }
        self.expect(TokenKind::Begin)?;
        self.statements_until_end(&mut node)?;

        self.routines.pop();
        self.table.leave_scope();
        parent.push(node);
        Ok(())
    }

    /// Index of the `inicio` that opens the body of the routine whose
    /// declarations start at `from`. Nested routines found on the way are
    /// skipped whole, including their own bodies.
    fn find_body_begin(&self, from: usize) -> Result<usize> {
        let mut i = from;
        while let Some(t) = self.tokens.get(i) {
            match t.kind {
                TokenKind::Begin => return Ok(i),
                TokenKind::Procedure | TokenKind::Function => {
                    let nested = self.find_body_begin(i + 1)?;
                    i = self.find_block_end(nested)?;
                }
                _ => i += 1,
            }
        }
        Err(self.error_at(self.tokens.last(), "LPD-S009", "routine has no body"))
    }

    /// Index just past the `fim` that balances the `inicio` at `begin`.
    fn find_block_end(&self, begin: usize) -> Result<usize> {
        let mut depth = 0usize;
        for (i, t) in self.tokens.iter().enumerate().skip(begin) {
            match t.kind {
                TokenKind::Begin => depth += 1,
                TokenKind::End => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(i + 1);
                    }
                }
                _ => {}
            }
        }
        Err(self.error_at(self.tokens.get(begin), "LPD-S009", "unterminated 'inicio' block"))
    }

    // ---- statements ----

    /// Consumes statements up to and including the closing `fim`.
    fn statements_until_end(&mut self, parent: &mut AstNode) -> Result<()> {
        loop {
            match self.peek() {
                Some(TokenKind::Semicolon) => {
                    self.pos += 1;
                }
                Some(TokenKind::End) => {
                    self.pos += 1;
                    return Ok(());
                }
                Some(_) => self.statement(parent)?,
                None => return Err(self.error("LPD-S009", "expected 'fim', found end of input")),
            }
        }
    }

    fn statement(&mut self, parent: &mut AstNode) -> Result<()> {
        let Some(tok) = self.current() else {
            return Err(self.error("LPD-S009", "expected a statement"));
        };
        match tok.kind {
            TokenKind::Identifier => self.identifier_statement(parent),
            TokenKind::If => self.if_statement(parent),
            TokenKind::While => self.while_statement(parent),
            TokenKind::For => self.for_statement(parent),
            TokenKind::Read | TokenKind::Write => self.io_statement(parent),
            TokenKind::Begin => {
                self.pos += 1;
                self.statements_until_end(parent)
            }
            _ => Err(self.error_at(Some(tok), "LPD-S009", format!("unexpected '{}' at start of statement", tok.text))),
        }
    }

    fn identifier_statement(&mut self, parent: &mut AstNode) -> Result<()> {
        let Some(tok) = self.advance() else {
            return Err(self.error("LPD-S009", "expected an identifier"));
        };
        let assigns = self.check(TokenKind::Attrib);
        let Some(sym) = self.table.lookup(&tok.text) else {
            return Err(self.error_at(Some(tok), "LPD-S002", format!("undefined symbol '{}'", tok.text)));
        };
        let (kind, target_type) = (sym.kind, sym.subtype);

        let node_kind = match kind {
            SymbolKind::Procedure if assigns => {
                return Err(self.error_at(Some(tok), "LPD-S005", format!("cannot assign to procedure '{}'", tok.text)));
            }
            SymbolKind::Procedure => {
                parent.push(AstNode::named(TokenKind::ProcedureCall, tok.text.clone()));
                self.expect(TokenKind::Semicolon)?;
                return Ok(());
            }
            SymbolKind::Function if !assigns => {
                return Err(self.error_at(
                    Some(tok),
                    "LPD-S010",
                    format!("function '{}' can only be called inside an expression", tok.text),
                ));
            }
            SymbolKind::Function => {
                if self.routines.last() != Some(&tok.text) {
                    return Err(self.error_at(
                        Some(tok),
                        "LPD-S006",
                        format!("cannot return from function '{}' outside its own body", tok.text),
                    ));
                }
                TokenKind::FunctionReturn
            }
            SymbolKind::Variable if assigns => TokenKind::Attrib,
            SymbolKind::Variable => {
                return Err(self.error_at(Some(tok), "LPD-S003", format!("'{}' is a variable, not a procedure", tok.text)));
            }
            SymbolKind::Program => {
                return Err(self.error_at(Some(tok), "LPD-S003", format!("'{}' is the program name", tok.text)));
            }
        };

        let op = self.expect(TokenKind::Attrib)?;
        let (expr, ty) = self.expression(TokenKind::Semicolon)?;
        if ty != target_type {
            return Err(self.error_at(
                Some(op),
                "LPD-S004",
                format!("type mismatch: cannot assign {ty} to '{}' of type {target_type}", tok.text),
            ));
        }
        self.expect(TokenKind::Semicolon)?;
        parent.push(AstNode::named(node_kind, tok.text.clone()).with_children(vec![expr]));
        Ok(())
    }

    fn condition(&mut self, until: TokenKind, what: &str) -> Result<AstNode> {
        let start = self.current();
        let (cond, ty) = self.expression(until)?;
        if ty != SubType::Boolean {
            return Err(self.error_at(start, "LPD-S004", format!("type mismatch: {what} must be booleano, found {ty}")));
        }
        Ok(cond)
    }

    fn integer_expression(&mut self, until: TokenKind, what: &str) -> Result<AstNode> {
        let start = self.current();
        let (expr, ty) = self.expression(until)?;
        if ty != SubType::Integer {
            return Err(self.error_at(start, "LPD-S004", format!("type mismatch: {what} must be inteiro, found {ty}")));
        }
        Ok(expr)
    }

    fn if_statement(&mut self, parent: &mut AstNode) -> Result<()> {
        self.expect(TokenKind::If)?;
        let cond = self.condition(TokenKind::Then, "'se' condition")?;
        self.expect(TokenKind::Then)?;

        let mut node = AstNode::new(TokenKind::If).with_children(vec![cond]);
        self.statement(&mut node)?;
        if self.check(TokenKind::Else) {
            self.pos += 1;
            let mut otherwise = AstNode::new(TokenKind::Else);
            self.statement(&mut otherwise)?;
            node.push(otherwise);
        }
        self.expect(TokenKind::Semicolon)?;
        parent.push(node);
        Ok(())
    }

    fn while_statement(&mut self, parent: &mut AstNode) -> Result<()> {
        self.expect(TokenKind::While)?;
        let cond = self.condition(TokenKind::Do, "'enquanto' condition")?;
        self.expect(TokenKind::Do)?;

        let mut node = AstNode::new(TokenKind::While).with_children(vec![cond]);
        self.statement(&mut node)?;
        self.expect(TokenKind::Semicolon)?;
        parent.push(node);
        Ok(())
    }

    fn for_statement(&mut self, parent: &mut AstNode) -> Result<()> {
        self.expect(TokenKind::For)?;
        let var = self.expect(TokenKind::Identifier)?;
        match self.table.lookup(&var.text) {
            Some(s) if s.kind == SymbolKind::Variable && s.subtype == SubType::Integer => {}
            Some(_) => {
                return Err(self.error_at(
                    Some(var),
                    "LPD-S003",
                    format!("'{}' must be an inteiro variable to control a 'para' loop", var.text),
                ));
            }
            None => {
                return Err(self.error_at(Some(var), "LPD-S002", format!("undefined symbol '{}'", var.text)));
            }
        }

        let start = self.integer_expression(TokenKind::While, "'para' start value")?;
        self.expect(TokenKind::While)?;
        let cond = self.condition(TokenKind::Semicolon, "'para' condition")?;
        self.expect(TokenKind::Semicolon)?;
        let step = if self.check(TokenKind::Step) {
            self.pos += 1;
            let step = self.integer_expression(TokenKind::Semicolon, "'passo' value")?;
            self.expect(TokenKind::Semicolon)?;
            step
        } else {
            AstNode::named(TokenKind::Number, "1")
        };

        let init = AstNode::named(TokenKind::Attrib, var.text.clone()).with_children(vec![start]);
        let mut node = AstNode::new(TokenKind::For).with_children(vec![init, cond, step]);
        self.statement(&mut node)?;
        self.expect(TokenKind::Semicolon)?;
        parent.push(node);
        Ok(())
    }

    fn io_statement(&mut self, parent: &mut AstNode) -> Result<()> {
        let Some(op) = self.advance() else {
            return Err(self.error("LPD-S009", "expected 'leia' or 'escreva'"));
        };
        let target = self.expect(TokenKind::Identifier)?;
        let problem = match self.table.lookup(&target.text) {
            None => Some(("LPD-S002", format!("undefined symbol '{}'", target.text))),
            Some(s) => match s.kind {
                SymbolKind::Variable if s.subtype == SubType::Integer => None,
                SymbolKind::Variable => Some(("LPD-S007", format!("'{}' must be an inteiro variable for '{}'", target.text, op.text))),
                SymbolKind::Function => Some(("LPD-S007", format!("expected a variable, '{}' is a function", target.text))),
                SymbolKind::Procedure => Some(("LPD-S007", format!("expected a variable, '{}' is a procedure", target.text))),
                SymbolKind::Program => Some(("LPD-S007", format!("expected a variable, '{}' is the program name", target.text))),
            },
        };
        if let Some((code, message)) = problem {
            return Err(self.error_at(Some(target), code, message));
        }
        self.expect(TokenKind::Semicolon)?;
        parent.push(AstNode::named(op.kind, target.text.clone()));
        Ok(())
    }

    // ---- expressions ----

    /// Builds an expression from the tokens before the next `until` token,
    /// which is left unconsumed. Returns the tree and its type.
    fn expression(&mut self, until: TokenKind) -> Result<(AstNode, SubType)> {
        let first = self.current();
        let mut operators: Vec<&'a Token> = Vec::new();
        let mut operands: Vec<(AstNode, SubType)> = Vec::new();

        loop {
            let Some(tok) = self.current() else {
                return Err(self.error("LPD-S008", format!("expected '{until}', found end of input")));
            };
            if tok.kind == until {
                break;
            }
            match tok.kind {
                TokenKind::Number => {
                    operands.push((AstNode::named(TokenKind::Number, tok.text.clone()), SubType::Integer));
                }
                TokenKind::True | TokenKind::False => {
                    operands.push((AstNode::new(tok.kind), SubType::Boolean));
                }
                TokenKind::Identifier => operands.push(self.operand(tok)?),
                TokenKind::LParen => operators.push(tok),
                TokenKind::RParen => loop {
                    match operators.pop() {
                        Some(op) if op.kind == TokenKind::LParen => break,
                        Some(op) => self.connect(op, &mut operands)?,
                        None => return Err(self.error_at(Some(tok), "LPD-S008", "unbalanced ')'")),
                    }
                },
                k if k.is_unary() => operators.push(tok),
                k if k.is_binary() => {
                    while let Some(&top) = operators.last() {
                        if top.kind == TokenKind::LParen || precedence(top.kind) < precedence(k) {
                            break;
                        }
                        operators.pop();
                        self.connect(top, &mut operands)?;
                    }
                    operators.push(tok);
                }
                _ => {
                    return Err(self.error_at(Some(tok), "LPD-S008", format!("unexpected '{}' in expression", tok.text)));
                }
            }
            self.pos += 1;
        }

        while let Some(op) = operators.pop() {
            if op.kind == TokenKind::LParen {
                return Err(self.error_at(Some(op), "LPD-S008", "unbalanced '('"));
            }
            self.connect(op, &mut operands)?;
        }

        match (operands.pop(), operands.is_empty()) {
            (Some(result), true) => Ok(result),
            _ => Err(self.error_at(first, "LPD-S008", "invalid expression")),
        }
    }

    fn operand(&self, tok: &Token) -> Result<(AstNode, SubType)> {
        match self.table.lookup(&tok.text) {
            Some(s) if s.kind == SymbolKind::Variable => {
                Ok((AstNode::named(TokenKind::Identifier, tok.text.clone()), s.subtype))
            }
            Some(s) if s.kind == SymbolKind::Function => {
                Ok((AstNode::named(TokenKind::FunctionCall, tok.text.clone()), s.subtype))
            }
            Some(s) => Err(self.error_at(
                Some(tok),
                "LPD-S003",
                format!("'{}' is a {}, not a variable or function", tok.text, s.kind),
            )),
            None => Err(self.error_at(Some(tok), "LPD-S002", format!("undefined symbol '{}'", tok.text))),
        }
    }

    /// Pops the operands of `op`, type-checks them and pushes the connected node.
    fn connect(&self, op: &Token, operands: &mut Vec<(AstNode, SubType)>) -> Result<()> {
        let missing = || self.error_at(Some(op), "LPD-S008", format!("missing operand for '{}'", op.text));
        if op.kind.is_unary() {
            let (child, ty) = operands.pop().ok_or_else(missing)?;
            let result = unary_result(op.kind, ty).ok_or_else(|| {
                self.error_at(Some(op), "LPD-S004", format!("type mismatch: '{}' cannot be applied to {ty}", op.text))
            })?;
            operands.push((AstNode::new(op.kind).with_children(vec![child]), result));
        } else {
            let (right, rt) = operands.pop().ok_or_else(missing)?;
            let (left, lt) = operands.pop().ok_or_else(missing)?;
            let result = binary_result(op.kind, lt, rt).ok_or_else(|| {
                self.error_at(
                    Some(op),
                    "LPD-S004",
                    format!("type mismatch: '{}' cannot be applied to {lt} and {rt}", op.text),
                )
            })?;
            operands.push((AstNode::new(op.kind).with_children(vec![left, right]), result));
        }
        Ok(())
    }
}
