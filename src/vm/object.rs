//! Object text loader.
//!
//! One instruction per line. A line starting in column 0 is a label line
//! (`L1  NULL`); an indented line is `MNEMONIC [a[,b]]`. Blank lines and
//! lines starting with `;` are ignored.

use super::{Instruction, Program, Target, VmError};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("line {line}: '{mnemonic}' takes {expected} operand(s), found {found}")]
    Arity { line: usize, mnemonic: String, expected: usize, found: usize },
    #[error("line {line}: invalid operand '{text}' for '{mnemonic}'")]
    Operand { line: usize, mnemonic: String, text: String },
    #[error("line {line}: malformed label line")]
    Label { line: usize },
    #[error(transparent)]
    Link(#[from] VmError),
}

/// A skipped line that did not stop the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadWarning {
    pub line: usize,
    pub message: String,
}

/// Parses object text into a linked program.
pub fn object_load(text: &str) -> Result<(Program, Vec<LoadWarning>), LoadError> {
    let mut program = Program::new();
    let mut warnings = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line = idx + 1;
        if raw.trim().is_empty() || raw.trim_start().starts_with(';') {
            continue;
        }

        let starts_in_label_lane = !raw.starts_with(|c: char| c.is_whitespace());
        if starts_in_label_lane {
            let mut parts = raw.split_whitespace();
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), None | Some("NULL"), None) => program.push(Instruction::Label(name.to_string())),
                _ => return Err(LoadError::Label { line }),
            }
            continue;
        }

        let mut parts = raw.split(|c: char| c.is_whitespace() || c == ',').filter(|s| !s.is_empty());
        let Some(mnemonic) = parts.next() else { continue };
        let operands: Vec<&str> = parts.collect();
        match decode(line, mnemonic, &operands)? {
            Some(inst) => program.push(inst),
            None => warnings.push(LoadWarning {
                line,
                message: format!("unknown instruction '{mnemonic}' skipped"),
            }),
        }
    }

    program.link()?;
    Ok((program, warnings))
}

fn arity(mnemonic: &str) -> Option<usize> {
    Some(match mnemonic {
        "LDC" | "LDV" | "JMP" | "JMPF" | "CALL" | "RETURNF" | "STR" => 1,
        "ALLOC" | "DALLOC" => 2,
        "ADD" | "SUB" | "MULT" | "DIVI" | "INV" | "AND" | "OR" | "NEG" | "CME" | "CMA" | "CEQ" | "CDIF"
        | "CMEQ" | "CMAQ" | "START" | "HLT" | "RETURN" | "RD" | "PRN" | "WRITE" => 0,
        _ => return None,
    })
}

/// Decodes one instruction line; `Ok(None)` for an unknown mnemonic.
fn decode(line: usize, mnemonic: &str, ops: &[&str]) -> Result<Option<Instruction>, LoadError> {
    let Some(expected) = arity(mnemonic) else {
        return Ok(None);
    };
    if ops.len() != expected {
        return Err(LoadError::Arity { line, mnemonic: mnemonic.to_string(), expected, found: ops.len() });
    }

    let bad = |text: &str| LoadError::Operand { line, mnemonic: mnemonic.to_string(), text: text.to_string() };
    let int = |i: usize| ops[i].parse::<i32>().map_err(|_| bad(ops[i]));
    let addr = |i: usize| ops[i].parse::<u32>().map_err(|_| bad(ops[i]));
    let target = |i: usize| match ops[i].parse::<usize>() {
        Ok(p) => Target::Position(p),
        Err(_) => Target::Label(ops[i].to_string()),
    };

    let inst = match mnemonic {
        "LDC" => Instruction::Ldc(int(0)?),
        "LDV" => Instruction::Ldv(addr(0)?),
        "STR" => Instruction::Str(addr(0)?),
        "RETURNF" => Instruction::Returnf(addr(0)?),
        "JMP" => Instruction::Jmp(target(0)),
        "JMPF" => Instruction::Jmpf(target(0)),
        "CALL" => Instruction::Call(target(0)),
        "ALLOC" => Instruction::Alloc { base: addr(0)?, count: addr(1)? },
        "DALLOC" => Instruction::Dalloc { base: addr(0)?, count: addr(1)? },
        "ADD" => Instruction::Add,
        "SUB" => Instruction::Sub,
        "MULT" => Instruction::Mult,
        "DIVI" => Instruction::Divi,
        "INV" => Instruction::Inv,
        "AND" => Instruction::And,
        "OR" => Instruction::Or,
        "NEG" => Instruction::Neg,
        "CME" => Instruction::Cme,
        "CMA" => Instruction::Cma,
        "CEQ" => Instruction::Ceq,
        "CDIF" => Instruction::Cdif,
        "CMEQ" => Instruction::Cmeq,
        "CMAQ" => Instruction::Cmaq,
        "START" => Instruction::Start,
        "HLT" => Instruction::Hlt,
        "RETURN" => Instruction::Return,
        "RD" => Instruction::Rd,
        "PRN" | "WRITE" => Instruction::Prn,
        _ => return Ok(None),
    };
    Ok(Some(inst))
}
