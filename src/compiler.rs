//! The full source-to-object pipeline.

use std::time::{Duration, Instant};

use crate::ast::{AstBuilder, AstNode, CompileError};
use crate::codegen::{CodeGenerator, CodegenError};
use crate::diagnostic::Diagnostic;
use crate::grammar::{self, ParseError};
use crate::lexer::{self, LexError, Token};
use crate::optimize;
use crate::symbols::{Scope, SymbolTable};
use crate::vm::Program;

#[derive(Debug, Clone, Copy, Default)]
pub struct Options {
    /// 0 disables optimization, 1 folds constant expressions.
    pub opt_level: u8,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Lex(#[from] LexError),
    #[error("{0}")]
    Parse(#[from] ParseError),
    #[error("{0}")]
    Semantic(#[from] CompileError),
    #[error("{0}")]
    Codegen(#[from] CodegenError),
}

impl From<&Error> for Diagnostic {
    fn from(e: &Error) -> Self {
        match e {
            Error::Lex(e) => Diagnostic::from(e),
            Error::Parse(e) => Diagnostic::from(e),
            Error::Semantic(e) => Diagnostic::from(e),
            Error::Codegen(e) => Diagnostic::from(e),
        }
    }
}

/// Everything the pipeline produced for one source file.
#[derive(Debug)]
pub struct Compilation {
    /// The recognised token stream handed to the tree builder.
    pub tokens: Vec<Token>,
    pub ast: AstNode,
    /// Unlinked program; labels are still names.
    pub program: Program,
    pub scopes: Vec<Scope>,
    pub timings: Vec<(&'static str, Duration)>,
}

fn timed<T>(timings: &mut Vec<(&'static str, Duration)>, stage: &'static str, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    timings.push((stage, start.elapsed()));
    out
}

/// Renders stage timings as a table: elapsed seconds and share of the
/// total per stage, then a total row.
pub fn timing_report(timings: &[(&'static str, Duration)]) -> String {
    let total: Duration = timings.iter().map(|(_, d)| *d).sum();
    let share = |d: Duration| {
        if total.is_zero() { 0.0 } else { d.as_secs_f64() / total.as_secs_f64() * 100.0 }
    };

    let mut out = String::from("----- Step ------- Time ------- Percentage -----\n");
    for (stage, elapsed) in timings {
        out.push_str(&format!("{stage:>10}    {:.6}s    {:>7.2}%\n", elapsed.as_secs_f64(), share(*elapsed)));
    }
    out.push_str(&format!("{:>10}    {:.6}s    {:>7.2}%\n", "total", total.as_secs_f64(), share(total)));
    out.push_str("------------------------------------------------\n");
    out
}

pub fn compile(source: &str, options: &Options) -> Result<Compilation, Error> {
    let mut timings = Vec::new();

    let raw = timed(&mut timings, "lex", || lexer::lex(source))?;
    let tokens = timed(&mut timings, "grammar", || grammar::recognize(raw))?;

    // one table serves both passes; each clears it on entry
    let (ast, table) = timed(&mut timings, "semantic", || {
        let mut builder = AstBuilder::with_table(&tokens, SymbolTable::new());
        builder.build().map(|ast| (ast, builder.into_table()))
    })?;

    let ast = timed(&mut timings, "optimize", || optimize::fold_constants(ast, options.opt_level));

    let mut generator = CodeGenerator::with_table(table);
    let program = timed(&mut timings, "codegen", || generator.generate(&ast))?;

    Ok(Compilation {
        tokens,
        ast,
        program,
        scopes: generator.scopes().to_vec(),
        timings,
    })
}
