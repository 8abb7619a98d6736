use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use lpd::ast::dot;
use lpd::compiler::{self, Options};
use lpd::diagnostic::{Diagnostic, ansi::AnsiRenderer, json, registry};
use lpd::vm::{self, Program, StackMachine, StdConsole};

#[derive(Parser)]
#[command(name = "lpd")]
#[command(about = "Compiler and stack virtual machine for the LPD language", version)]
struct Cli {
    /// LPD source file (object text with --object)
    #[arg(required_unless_present = "explain")]
    input: Option<PathBuf>,

    /// Write the object program to FILE
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Print the recognised token stream
    #[arg(short = 'P', long)]
    pretty_print: bool,

    /// Print the syntax tree as Graphviz DOT
    #[arg(short = 'A', long)]
    show_ast: bool,

    /// Print the syntax tree as JSON
    #[arg(long)]
    ast_json: bool,

    /// Print every scope with addresses and labels
    #[arg(short = 'S', long)]
    show_symbols: bool,

    /// Optimization level: 0 or 1 (constant folding)
    #[arg(short = 'O', long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    opt_level: u8,

    /// Print per-stage timings to stderr
    #[arg(short = 't', long)]
    show_time: bool,

    /// Execute the program after compiling it
    #[arg(short, long)]
    run: bool,

    /// Treat INPUT as object text and execute it
    #[arg(long)]
    object: bool,

    /// Trace every executed instruction to stderr
    #[arg(long)]
    trace: bool,

    /// Report diagnostics as JSON
    #[arg(long)]
    json: bool,

    /// Explain a diagnostic code and exit
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,
}

/// Prints diagnostics to stderr in the format the command line asked for.
struct Reporter {
    json: bool,
    color: bool,
    source: Option<String>,
}

impl Reporter {
    fn report(&self, d: Diagnostic) {
        let d = match &self.source {
            Some(src) if !d.labels.is_empty() => d.with_source(src.clone()),
            _ => d,
        };
        if self.json {
            eprintln!("{}", json::render(&d));
        } else {
            eprint!("{}", AnsiRenderer { use_color: self.color }.render(&d));
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut reporter = Reporter {
        json: cli.json,
        color: std::io::stderr().is_terminal(),
        source: None,
    };

    if let Some(code) = &cli.explain {
        return match registry::lookup(code) {
            Some(entry) => {
                print!("{}", entry.long);
                ExitCode::SUCCESS
            }
            None => {
                reporter.report(Diagnostic::error(format!("unknown diagnostic code '{code}'")));
                ExitCode::FAILURE
            }
        };
    }

    let Some(path) = &cli.input else {
        return ExitCode::FAILURE;
    };
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            reporter.report(Diagnostic::error(format!("cannot read {}: {e}", path.display())));
            return ExitCode::FAILURE;
        }
    };

    let program = if cli.object {
        match vm::object_load(&text) {
            Ok((program, warnings)) => {
                for w in &warnings {
                    reporter.report(Diagnostic::from(w));
                }
                program
            }
            Err(e) => {
                reporter.report(Diagnostic::from(&e));
                return ExitCode::FAILURE;
            }
        }
    } else {
        reporter.source = Some(text.clone());
        match compile(&cli, &text, &reporter) {
            Some(program) => program,
            None => return ExitCode::FAILURE,
        }
    };

    if cli.run || cli.object {
        return execute(program, cli.trace, &reporter);
    }
    ExitCode::SUCCESS
}

/// Compiles `source`, printing whatever the flags ask for. Returns the
/// program when compilation succeeded and its object text was written.
fn compile(cli: &Cli, source: &str, reporter: &Reporter) -> Option<Program> {
    let options = Options { opt_level: cli.opt_level };
    let compilation = match compiler::compile(source, &options) {
        Ok(c) => c,
        Err(e) => {
            reporter.report(Diagnostic::from(&e));
            return None;
        }
    };

    if cli.show_time {
        eprint!("{}", compiler::timing_report(&compilation.timings));
    }
    if cli.pretty_print {
        for t in &compilation.tokens {
            println!("{:>4}:{:<3} {:<14} {}", t.line, t.column, format!("{:?}", t.kind), t.text);
        }
    }
    if cli.show_ast {
        print!("{}", dot::render(&compilation.ast));
    }
    if cli.ast_json {
        match serde_json::to_string_pretty(&compilation.ast) {
            Ok(j) => println!("{j}"),
            Err(e) => {
                reporter.report(Diagnostic::error(format!("cannot serialize the syntax tree: {e}")));
                return None;
            }
        }
    }
    if cli.show_symbols {
        for scope in &compilation.scopes {
            print!("{scope}");
        }
    }

    let object = compilation.program.to_object_text();
    match &cli.output {
        Some(out) => {
            if let Err(e) = std::fs::write(out, &object) {
                reporter.report(Diagnostic::error(format!("cannot write {}: {e}", out.display())));
                return None;
            }
        }
        None if !cli.run => print!("{object}"),
        None => {}
    }
    Some(compilation.program)
}

fn execute(program: Program, trace: bool, reporter: &Reporter) -> ExitCode {
    let mut machine = StackMachine::new(StdConsole);
    if let Err(e) = machine.load(program) {
        reporter.report(Diagnostic::from(&e));
        return ExitCode::FAILURE;
    }

    let result = if trace {
        let mut result = Ok(());
        while machine.is_running() && result.is_ok() {
            eprintln!("{}", machine.trace_line());
            result = machine.step();
        }
        result
    } else {
        machine.run()
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let mut d = Diagnostic::from(&e);
            if let Some(pos) = machine.fault_position() {
                let inst = machine.program().instructions().get(pos).map(|i| i.to_string());
                d = d.with_note(format!("at instruction {pos}: {}", inst.unwrap_or_default().trim()));
            }
            reporter.report(d);
            ExitCode::FAILURE
        }
    }
}
