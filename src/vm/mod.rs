//! Stack virtual machine.
//!
//! Variables and the operand/return-address stack share one flat memory
//! array. Variables live at low, statically assigned addresses and the
//! stack grows upward from `stack_top`.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;
use std::io::BufRead;

pub mod object;

pub use object::{LoadError, LoadWarning, object_load};

/// Number of addressable memory cells.
pub const MEMORY_SIZE: usize = 65536;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VmError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("address {address} is out of range")]
    AddressOutOfRange { address: i64 },
    #[error("unresolved label '{label}'")]
    UnresolvedLabel { label: String },
    #[error("label '{label}' defined twice")]
    DuplicateLabel { label: String },
    #[error("invalid return address {value}")]
    BadReturnAddress { value: i32 },
    #[error("input exhausted")]
    InputExhausted,
}

type VmResult<T> = Result<T, VmError>;

/// Jump or call destination. Code generation produces label names; linking
/// replaces them with instruction positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Label(String),
    Position(usize),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(l) => f.write_str(l),
            Target::Position(p) => write!(f, "{p}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Label(String),
    Ldc(i32),
    Ldv(u32),
    Add,
    Sub,
    Mult,
    Divi,
    Inv,
    And,
    Or,
    Neg,
    Cme,
    Cma,
    Ceq,
    Cdif,
    Cmeq,
    Cmaq,
    Jmp(Target),
    Jmpf(Target),
    Alloc { base: u32, count: u32 },
    Dalloc { base: u32, count: u32 },
    Start,
    Hlt,
    Call(Target),
    Return,
    Returnf(u32),
    Rd,
    Prn,
    Str(u32),
}

impl Instruction {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Label(_) => "NULL",
            Instruction::Ldc(_) => "LDC",
            Instruction::Ldv(_) => "LDV",
            Instruction::Add => "ADD",
            Instruction::Sub => "SUB",
            Instruction::Mult => "MULT",
            Instruction::Divi => "DIVI",
            Instruction::Inv => "INV",
            Instruction::And => "AND",
            Instruction::Or => "OR",
            Instruction::Neg => "NEG",
            Instruction::Cme => "CME",
            Instruction::Cma => "CMA",
            Instruction::Ceq => "CEQ",
            Instruction::Cdif => "CDIF",
            Instruction::Cmeq => "CMEQ",
            Instruction::Cmaq => "CMAQ",
            Instruction::Jmp(_) => "JMP",
            Instruction::Jmpf(_) => "JMPF",
            Instruction::Alloc { .. } => "ALLOC",
            Instruction::Dalloc { .. } => "DALLOC",
            Instruction::Start => "START",
            Instruction::Hlt => "HLT",
            Instruction::Call(_) => "CALL",
            Instruction::Return => "RETURN",
            Instruction::Returnf(_) => "RETURNF",
            Instruction::Rd => "RD",
            Instruction::Prn => "PRN",
            Instruction::Str(_) => "STR",
        }
    }

    fn target_mut(&mut self) -> Option<&mut Target> {
        match self {
            Instruction::Jmp(t) | Instruction::Jmpf(t) | Instruction::Call(t) => Some(t),
            _ => None,
        }
    }
}

/// One line of object text.
impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.mnemonic();
        match self {
            Instruction::Label(name) => write!(f, "{name:<3} {m}"),
            Instruction::Ldc(v) => write!(f, "    {m:<8}{v}"),
            Instruction::Ldv(a) | Instruction::Str(a) | Instruction::Returnf(a) => write!(f, "    {m:<8}{a}"),
            Instruction::Jmp(t) | Instruction::Jmpf(t) | Instruction::Call(t) => write!(f, "    {m:<8}{t}"),
            Instruction::Alloc { base, count } | Instruction::Dalloc { base, count } => {
                write!(f, "    {m:<8}{base},{count}")
            }
            _ => write!(f, "    {m}"),
        }
    }
}

/// An ordered instruction sequence plus the label table built by [`Program::link`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Program {
    code: Vec<Instruction>,
    labels: HashMap<String, usize>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, inst: Instruction) {
        self.code.push(inst);
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.code
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn label_position(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Builds the label table and resolves every jump and call target to
    /// the position of its label. Already resolved targets are kept.
    pub fn link(&mut self) -> VmResult<()> {
        self.labels.clear();
        for (i, inst) in self.code.iter().enumerate() {
            if let Instruction::Label(name) = inst {
                if self.labels.insert(name.clone(), i).is_some() {
                    return Err(VmError::DuplicateLabel { label: name.clone() });
                }
            }
        }
        for inst in &mut self.code {
            if let Some(target) = inst.target_mut() {
                if let Target::Label(name) = target {
                    let pos = self
                        .labels
                        .get(name.as_str())
                        .copied()
                        .ok_or_else(|| VmError::UnresolvedLabel { label: name.clone() })?;
                    *target = Target::Position(pos);
                }
            }
        }
        Ok(())
    }

    /// Object text, one instruction per line.
    pub fn to_object_text(&self) -> String {
        let mut out = String::new();
        for inst in &self.code {
            out.push_str(&inst.to_string());
            out.push('\n');
        }
        out
    }
}

impl From<Vec<Instruction>> for Program {
    fn from(code: Vec<Instruction>) -> Self {
        Program { code, labels: HashMap::new() }
    }
}

// ---- Host I/O ----

/// Host side of `RD` and `PRN`.
pub trait Console {
    /// Next input line, or `None` when input is exhausted.
    fn read_line(&mut self) -> Option<String>;
    fn write_value(&mut self, value: i32);
}

/// Reads from stdin and writes one value per line to stdout.
#[derive(Debug, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }

    fn write_value(&mut self, value: i32) {
        println!("{value}");
    }
}

/// In-memory console used by tests and embedders.
#[derive(Debug, Default, Clone)]
pub struct BufferConsole {
    pub input: VecDeque<String>,
    pub output: Vec<i32>,
}

impl BufferConsole {
    pub fn with_input<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        BufferConsole { input: lines.into_iter().map(Into::into).collect(), output: Vec::new() }
    }
}

impl Console for BufferConsole {
    fn read_line(&mut self) -> Option<String> {
        self.input.pop_front()
    }

    fn write_value(&mut self, value: i32) {
        self.output.push(value);
    }
}

/// `atoi`-style parse: optional whitespace, optional sign, leading digits.
/// Anything unparsable reads as 0.
pub fn parse_input(line: &str) -> i32 {
    let s = line.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let value = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i32, |acc, d| acc.wrapping_mul(10).wrapping_add(i32::from(d - b'0')));
    if negative { value.wrapping_neg() } else { value }
}

// ---- Machine ----

/// Execution counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExecStats {
    pub steps: u64,
    pub calls: u64,
    pub returns: u64,
}

pub struct StackMachine<C: Console = StdConsole> {
    memory: Vec<i32>,
    stack_top: i32,
    ip: usize,
    running: bool,
    program: Program,
    console: C,
    fault: Option<(usize, VmError)>,
    stats: ExecStats,
}

impl<C: Console> StackMachine<C> {
    pub fn new(console: C) -> Self {
        StackMachine {
            memory: vec![0; MEMORY_SIZE],
            stack_top: -1,
            ip: 0,
            running: false,
            program: Program::new(),
            console,
            fault: None,
            stats: ExecStats::default(),
        }
    }

    /// Links `program`, installs it and resets the machine.
    pub fn load(&mut self, mut program: Program) -> VmResult<()> {
        program.link()?;
        self.program = program;
        self.reset();
        Ok(())
    }

    /// Zeroes memory, empties the stack and rewinds to the first instruction.
    pub fn reset(&mut self) {
        self.memory.fill(0);
        self.stack_top = -1;
        self.ip = 0;
        self.running = !self.program.is_empty();
        self.fault = None;
        self.stats = ExecStats::default();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Position of the next instruction; `None` once halted by a fault or
    /// when execution has run off the end of the program.
    pub fn instruction_pointer(&self) -> Option<usize> {
        if self.fault.is_some() || self.ip >= self.program.len() { None } else { Some(self.ip) }
    }

    pub fn fault(&self) -> Option<&VmError> {
        self.fault.as_ref().map(|(_, e)| e)
    }

    /// Position of the instruction that faulted.
    pub fn fault_position(&self) -> Option<usize> {
        self.fault.as_ref().map(|(p, _)| *p)
    }

    pub fn stack_top(&self) -> i32 {
        self.stack_top
    }

    pub fn memory(&self, address: usize) -> Option<i32> {
        self.memory.get(address).copied()
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn console(&self) -> &C {
        &self.console
    }

    pub fn stats(&self) -> ExecStats {
        self.stats
    }

    pub fn current_instruction(&self) -> Option<&Instruction> {
        if self.running { self.program.instructions().get(self.ip) } else { None }
    }

    /// One trace line describing the instruction about to execute.
    pub fn trace_line(&self) -> String {
        let top = if self.stack_top >= 0 { self.memory[self.stack_top as usize].to_string() } else { "-".into() };
        match self.current_instruction() {
            Some(inst) => format!("{:>5} {:<20} sp={} top={}", self.ip, inst.to_string().trim(), self.stack_top, top),
            None => format!("{:>5} <halted> sp={} top={}", self.ip, self.stack_top, top),
        }
    }

    /// Runs until `HLT`, a fault, or the end of the program.
    pub fn run(&mut self) -> VmResult<()> {
        while self.running {
            self.step()?;
        }
        Ok(())
    }

    /// Executes one instruction. Does nothing once the machine has stopped.
    pub fn step(&mut self) -> VmResult<()> {
        if !self.running {
            return Ok(());
        }
        let at = self.ip;
        let Some(inst) = self.program.instructions().get(at).cloned() else {
            self.running = false;
            return Ok(());
        };
        self.ip += 1;
        self.stats.steps += 1;
        match self.execute(&inst) {
            Ok(()) => {
                if self.ip >= self.program.len() {
                    self.running = false;
                }
                Ok(())
            }
            Err(e) => {
                self.running = false;
                self.ip = at;
                self.fault = Some((at, e.clone()));
                Err(e)
            }
        }
    }

    // ---- memory access ----

    fn cell(&self, address: i64) -> VmResult<usize> {
        usize::try_from(address)
            .ok()
            .filter(|&a| a < MEMORY_SIZE)
            .ok_or(VmError::AddressOutOfRange { address })
    }

    fn read(&self, address: i64) -> VmResult<i32> {
        Ok(self.memory[self.cell(address)?])
    }

    fn write(&mut self, address: i64, value: i32) -> VmResult<()> {
        let a = self.cell(address)?;
        self.memory[a] = value;
        Ok(())
    }

    fn push(&mut self, value: i32) -> VmResult<()> {
        if self.stack_top + 1 >= MEMORY_SIZE as i32 {
            return Err(VmError::StackOverflow);
        }
        self.stack_top += 1;
        self.memory[self.stack_top as usize] = value;
        Ok(())
    }

    fn pop(&mut self) -> VmResult<i32> {
        if self.stack_top < 0 {
            return Err(VmError::StackUnderflow);
        }
        let v = self.memory[self.stack_top as usize];
        self.stack_top -= 1;
        Ok(v)
    }

    fn peek(&self) -> VmResult<i32> {
        if self.stack_top < 0 {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.memory[self.stack_top as usize])
    }

    fn binary(&mut self, f: impl Fn(i32, i32) -> i32) -> VmResult<()> {
        let b = self.pop()?;
        let a = self.pop()?;
        self.push(f(a, b))
    }

    fn unary(&mut self, f: impl Fn(i32) -> i32) -> VmResult<()> {
        let a = self.pop()?;
        self.push(f(a))
    }

    fn jump(&mut self, target: &Target) -> VmResult<()> {
        match target {
            Target::Position(p) => {
                self.ip = *p;
                Ok(())
            }
            Target::Label(l) => Err(VmError::UnresolvedLabel { label: l.clone() }),
        }
    }

    fn dalloc(&mut self, base: u32, count: u32) -> VmResult<()> {
        for k in (0..count).rev() {
            let v = self.pop()?;
            self.write(i64::from(base) + i64::from(k), v)?;
        }
        Ok(())
    }

    fn ret(&mut self) -> VmResult<()> {
        let value = self.pop()?;
        match usize::try_from(value) {
            Ok(p) if p <= self.program.len() => {
                self.ip = p;
                self.stats.returns += 1;
                Ok(())
            }
            _ => Err(VmError::BadReturnAddress { value }),
        }
    }

    fn execute(&mut self, inst: &Instruction) -> VmResult<()> {
        let flag = |b: bool| i32::from(b);
        match inst {
            Instruction::Label(_) => Ok(()),
            Instruction::Ldc(k) => self.push(*k),
            Instruction::Ldv(a) => {
                let v = self.read(i64::from(*a))?;
                self.push(v)
            }
            Instruction::Add => self.binary(i32::wrapping_add),
            Instruction::Sub => self.binary(i32::wrapping_sub),
            Instruction::Mult => self.binary(i32::wrapping_mul),
            Instruction::Divi => {
                if self.peek()? == 0 {
                    return Err(VmError::DivisionByZero);
                }
                self.binary(i32::wrapping_div)
            }
            Instruction::Inv => self.unary(i32::wrapping_neg),
            Instruction::Neg => self.unary(|a| 1i32.wrapping_sub(a)),
            Instruction::And => self.binary(|a, b| flag(a == 1 && b == 1)),
            Instruction::Or => self.binary(|a, b| flag(a == 1 || b == 1)),
            Instruction::Cme => self.binary(|a, b| flag(a < b)),
            Instruction::Cma => self.binary(|a, b| flag(a > b)),
            Instruction::Ceq => self.binary(|a, b| flag(a == b)),
            Instruction::Cdif => self.binary(|a, b| flag(a != b)),
            Instruction::Cmeq => self.binary(|a, b| flag(a <= b)),
            Instruction::Cmaq => self.binary(|a, b| flag(a >= b)),
            Instruction::Jmp(t) => self.jump(t),
            Instruction::Jmpf(t) => {
                if self.pop()? == 0 {
                    self.jump(t)?;
                }
                Ok(())
            }
            Instruction::Alloc { base, count } => {
                for k in 0..*count {
                    let v = self.read(i64::from(*base) + i64::from(k))?;
                    self.push(v)?;
                }
                Ok(())
            }
            Instruction::Dalloc { base, count } => self.dalloc(*base, *count),
            Instruction::Start => {
                self.stack_top = -1;
                Ok(())
            }
            Instruction::Hlt => {
                self.running = false;
                Ok(())
            }
            Instruction::Call(t) => {
                self.push(self.ip as i32)?;
                self.stats.calls += 1;
                self.jump(t)
            }
            Instruction::Return => self.ret(),
            Instruction::Returnf(a) => {
                let value = self.read(i64::from(*a))?;
                self.dalloc(*a, 1)?;
                self.ret()?;
                self.push(value)
            }
            Instruction::Rd => {
                let line = self.console.read_line().ok_or(VmError::InputExhausted)?;
                self.push(parse_input(&line))
            }
            Instruction::Prn => {
                let v = self.pop()?;
                self.console.write_value(v);
                Ok(())
            }
            Instruction::Str(a) => {
                let v = self.pop()?;
                self.write(i64::from(*a), v)
            }
        }
    }
}
