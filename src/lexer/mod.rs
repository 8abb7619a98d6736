use logos::Logos;
use serde::Serialize;

use crate::ast::{SourceMap, Span};

/// Every kind of token the pipeline knows about.
///
/// The first block is produced by the lexer. The second block only ever
/// appears in the flat stream built by the grammar recognizer (`MainBegin`,
/// `UnaryPlus`, `UnaryMinus`) or as an AST node kind assigned by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TokenKind {
    // Keywords
    Program,
    Var,
    Integer,
    Boolean,
    Procedure,
    Function,
    Begin,
    End,
    If,
    Then,
    Else,
    While,
    Do,
    For,
    Step,
    Read,
    Write,
    True,
    False,
    Not,
    And,
    Or,
    Div,

    // Operators and punctuation
    Attrib,
    Plus,
    Minus,
    Times,
    Equal,
    Different,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    LParen,
    RParen,
    Comma,
    Colon,
    Semicolon,
    Dot,

    Identifier,
    Number,

    // Synthetic
    MainBegin,
    UnaryPlus,
    UnaryMinus,
    FunctionCall,
    ProcedureCall,
    FunctionReturn,
}

impl TokenKind {
    pub fn is_type(self) -> bool {
        matches!(self, TokenKind::Integer | TokenKind::Boolean)
    }

    pub fn is_relational(self) -> bool {
        matches!(
            self,
            TokenKind::Equal
                | TokenKind::Different
                | TokenKind::Less
                | TokenKind::LessEqual
                | TokenKind::Greater
                | TokenKind::GreaterEqual
        )
    }

    pub fn is_unary(self) -> bool {
        matches!(self, TokenKind::Not | TokenKind::UnaryPlus | TokenKind::UnaryMinus)
    }

    pub fn is_binary(self) -> bool {
        self.is_relational()
            || matches!(
                self,
                TokenKind::Plus
                    | TokenKind::Minus
                    | TokenKind::Times
                    | TokenKind::Div
                    | TokenKind::And
                    | TokenKind::Or
            )
    }

    /// Source spelling, or a descriptive name for tokens without one.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Program => "programa",
            TokenKind::Var => "var",
            TokenKind::Integer => "inteiro",
            TokenKind::Boolean => "booleano",
            TokenKind::Procedure => "procedimento",
            TokenKind::Function => "funcao",
            TokenKind::Begin => "inicio",
            TokenKind::End => "fim",
            TokenKind::If => "se",
            TokenKind::Then => "entao",
            TokenKind::Else => "senao",
            TokenKind::While => "enquanto",
            TokenKind::Do => "faca",
            TokenKind::For => "para",
            TokenKind::Step => "passo",
            TokenKind::Read => "leia",
            TokenKind::Write => "escreva",
            TokenKind::True => "verdadeiro",
            TokenKind::False => "falso",
            TokenKind::Not => "nao",
            TokenKind::And => "e",
            TokenKind::Or => "ou",
            TokenKind::Div => "div",
            TokenKind::Attrib => ":=",
            TokenKind::Plus | TokenKind::UnaryPlus => "+",
            TokenKind::Minus | TokenKind::UnaryMinus => "-",
            TokenKind::Times => "*",
            TokenKind::Equal => "=",
            TokenKind::Different => "<>",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Dot => ".",
            TokenKind::Identifier => "identifier",
            TokenKind::Number => "number",
            TokenKind::MainBegin => "main body",
            TokenKind::FunctionCall => "function call",
            TokenKind::ProcedureCall => "procedure call",
            TokenKind::FunctionReturn => "function return",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

#[derive(Logos, Debug, PartialEq, Clone, Copy)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip(r"//[^\n]*", allow_greedy = true))]
#[logos(skip r"\{[^}]*\}")]
enum Lexeme {
    #[token("programa")]
    Program,
    #[token("var")]
    Var,
    #[token("inteiro")]
    Integer,
    #[token("booleano")]
    Boolean,
    #[token("procedimento")]
    Procedure,
    #[token("funcao")]
    Function,
    #[token("inicio")]
    Begin,
    #[token("fim")]
    End,
    #[token("se")]
    If,
    #[token("entao")]
    Then,
    #[token("senao")]
    Else,
    #[token("enquanto")]
    While,
    #[token("faca")]
    Do,
    #[token("para")]
    For,
    #[token("passo")]
    Step,
    #[token("leia")]
    Read,
    #[token("escreva")]
    Write,
    #[token("verdadeiro")]
    True,
    #[token("falso")]
    False,
    #[token("nao")]
    Not,
    #[token("e", priority = 3)]
    And,
    #[token("ou")]
    Or,
    #[token("div")]
    Div,

    #[token(":=")]
    Attrib,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Times,
    #[token("=")]
    Equal,
    #[token("<>")]
    Different,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*")]
    Identifier,
    #[regex(r"[0-9]+")]
    Number,
}

impl From<Lexeme> for TokenKind {
    fn from(l: Lexeme) -> Self {
        match l {
            Lexeme::Program => TokenKind::Program,
            Lexeme::Var => TokenKind::Var,
            Lexeme::Integer => TokenKind::Integer,
            Lexeme::Boolean => TokenKind::Boolean,
            Lexeme::Procedure => TokenKind::Procedure,
            Lexeme::Function => TokenKind::Function,
            Lexeme::Begin => TokenKind::Begin,
            Lexeme::End => TokenKind::End,
            Lexeme::If => TokenKind::If,
            Lexeme::Then => TokenKind::Then,
            Lexeme::Else => TokenKind::Else,
            Lexeme::While => TokenKind::While,
            Lexeme::Do => TokenKind::Do,
            Lexeme::For => TokenKind::For,
            Lexeme::Step => TokenKind::Step,
            Lexeme::Read => TokenKind::Read,
            Lexeme::Write => TokenKind::Write,
            Lexeme::True => TokenKind::True,
            Lexeme::False => TokenKind::False,
            Lexeme::Not => TokenKind::Not,
            Lexeme::And => TokenKind::And,
            Lexeme::Or => TokenKind::Or,
            Lexeme::Div => TokenKind::Div,
            Lexeme::Attrib => TokenKind::Attrib,
            Lexeme::Plus => TokenKind::Plus,
            Lexeme::Minus => TokenKind::Minus,
            Lexeme::Times => TokenKind::Times,
            Lexeme::Equal => TokenKind::Equal,
            Lexeme::Different => TokenKind::Different,
            Lexeme::Less => TokenKind::Less,
            Lexeme::LessEqual => TokenKind::LessEqual,
            Lexeme::Greater => TokenKind::Greater,
            Lexeme::GreaterEqual => TokenKind::GreaterEqual,
            Lexeme::LParen => TokenKind::LParen,
            Lexeme::RParen => TokenKind::RParen,
            Lexeme::Comma => TokenKind::Comma,
            Lexeme::Colon => TokenKind::Colon,
            Lexeme::Semicolon => TokenKind::Semicolon,
            Lexeme::Dot => TokenKind::Dot,
            Lexeme::Identifier => TokenKind::Identifier,
            Lexeme::Number => TokenKind::Number,
        }
    }
}

/// A token with its text and 1-based source position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
    pub span: Span,
}

impl Token {
    /// Builds a token that has no source text of its own, positioned at `at`.
    pub fn synthetic(kind: TokenKind, at: &Token) -> Self {
        Token {
            kind,
            text: kind.describe().to_string(),
            line: at.line,
            column: at.column,
            span: at.span,
        }
    }
}

/// Lex LPD source into positioned tokens.
pub fn lex(source: &str) -> Result<Vec<Token>, LexError> {
    let map = SourceMap::new(source);
    let mut lexer = Lexeme::lexer(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let (line, column) = map.lookup(range.start);
        let snippet = source[range.clone()].to_string();
        let kind = match result {
            Ok(lexeme) => TokenKind::from(lexeme),
            Err(()) => {
                return Err(LexError {
                    code: "LPD-L001",
                    line: line as u32,
                    column: column as u32,
                    position: range.start,
                    message: format!("unexpected character(s) '{snippet}'"),
                    snippet,
                });
            }
        };
        if kind == TokenKind::Number && snippet.parse::<i32>().is_err() {
            return Err(LexError {
                code: "LPD-L002",
                line: line as u32,
                column: column as u32,
                position: range.start,
                message: format!("integer literal '{snippet}' does not fit in 32 bits"),
                snippet,
            });
        }
        tokens.push(Token {
            kind,
            text: snippet,
            line: line as u32,
            column: column as u32,
            span: Span { start: range.start, end: range.end },
        });
    }

    Ok(tokens)
}

#[derive(Debug, thiserror::Error)]
#[error("line {line}, column {column}: {message}")]
pub struct LexError {
    pub code: &'static str,
    pub line: u32,
    pub column: u32,
    pub position: usize,
    pub snippet: String,
    pub message: String,
}
