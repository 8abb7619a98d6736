//! Stack-machine code generation.
//!
//! Walks the typed tree and emits a linear [`Program`]. Every variable gets a
//! static address: the generator keeps `available_address` as the top of
//! statically allocated memory, raising it on `var` blocks and lowering it
//! again when a routine's scope closes.

use crate::ast::AstNode;
use crate::lexer::TokenKind;
use crate::symbols::{
    ALL_SCOPES, Attribute, CURRENT_SCOPE, DuplicateSymbol, Scope, SubType, SymbolKind, SymbolTable,
};
use crate::vm::{Instruction, Program, Target};

/// Label of the main program body.
pub const MAIN_LABEL: &str = "PRG";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodegenError {
    #[error("undefined symbol '{name}'")]
    UndefinedSymbol { name: String },
    #[error("'{name}' is not a {expected}")]
    WrongKind { name: String, expected: &'static str },
    #[error("invalid literal '{text}'")]
    BadLiteral { text: String },
    #[error("unexpected {kind:?} node")]
    UnexpectedNode { kind: TokenKind },
    #[error("return outside of a function")]
    ReturnOutsideFunction,
    #[error(transparent)]
    Duplicate(#[from] DuplicateSymbol),
}

type Result<T> = std::result::Result<T, CodegenError>;

/// Generates code for a whole program tree.
pub fn generate(ast: &AstNode) -> Result<Program> {
    CodeGenerator::new().generate(ast)
}

pub fn label_name(n: u32) -> String {
    format!("L{n:X}")
}

/// Storage owned by the routine currently being generated.
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Return-value slot of a function.
    ret_slot: Option<u32>,
    locals_base: u32,
    locals: u32,
}

pub struct CodeGenerator {
    table: SymbolTable,
    program: Program,
    next_label: u32,
    available_address: u32,
    frames: Vec<Frame>,
    has_subroutine: bool,
    /// Values currently pushed by the expression being generated.
    temps: u32,
    max_temps: u32,
    closed: Vec<Scope>,
}

impl Default for CodeGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeGenerator {
    pub fn new() -> Self {
        Self::with_table(SymbolTable::new())
    }

    /// Reuses `table` after clearing the previous pass's symbols.
    pub fn with_table(mut table: SymbolTable) -> Self {
        table.clear();
        CodeGenerator {
            table,
            program: Program::new(),
            next_label: 1,
            available_address: 0,
            frames: Vec::new(),
            has_subroutine: false,
            temps: 0,
            max_temps: 0,
            closed: Vec::new(),
        }
    }

    /// Every scope in the order it was closed, with final addresses and labels.
    pub fn scopes(&self) -> &[Scope] {
        &self.closed
    }

    /// Deepest operand stack any single expression needed.
    pub fn max_temps(&self) -> u32 {
        self.max_temps
    }

    pub fn available_address(&self) -> u32 {
        self.available_address
    }

    pub fn generate(&mut self, ast: &AstNode) -> Result<Program> {
        if ast.kind != TokenKind::Program {
            return Err(CodegenError::UnexpectedNode { kind: ast.kind });
        }
        self.table.clear();
        self.closed.clear();
        self.program = Program::new();
        self.next_label = 1;
        self.available_address = 0;
        self.has_subroutine = false;
        self.max_temps = 0;

        self.emit(Instruction::Start);
        self.table.install(ast.name(), SymbolKind::Program, SubType::None, ALL_SCOPES)?;
        self.enter_scope(ast.name(), 0)?;
        self.frames = vec![Frame { ret_slot: None, locals_base: 0, locals: 0 }];

        for child in &ast.children {
            self.statement(child)?;
        }

        if self.available_address > 0 {
            self.emit(Instruction::Dalloc { base: 0, count: self.available_address });
        }
        self.emit(Instruction::Hlt);

        self.closed.extend(self.table.leave_scope());
        self.closed.push(self.table.current().clone());
        Ok(std::mem::take(&mut self.program))
    }

    // ---- helpers ----

    fn emit(&mut self, inst: Instruction) {
        self.program.push(inst);
    }

    fn new_label(&mut self) -> u32 {
        let l = self.next_label;
        self.next_label += 1;
        l
    }

    fn emit_label(&mut self, l: u32) {
        self.emit(Instruction::Label(label_name(l)));
    }

    fn jump_target(l: u32) -> Target {
        Target::Label(label_name(l))
    }

    fn push_temp(&mut self) {
        self.temps += 1;
        self.max_temps = self.max_temps.max(self.temps);
    }

    fn pop_temps(&mut self, n: u32) {
        self.temps = self.temps.saturating_sub(n);
    }

    fn frame(&self) -> Frame {
        self.frames.last().copied().unwrap_or(Frame { ret_slot: None, locals_base: 0, locals: 0 })
    }

    fn install_depth(&self) -> usize {
        if self.frames.len() <= 1 { ALL_SCOPES } else { CURRENT_SCOPE }
    }

    fn enter_scope(&mut self, name: &str, base: u32) -> Result<()> {
        if self.table.enter_scope_at(name, base) {
            Ok(())
        } else {
            Err(CodegenError::UndefinedSymbol { name: name.to_string() })
        }
    }

    fn set_attribute(&mut self, name: &str, attr: Attribute) -> Result<()> {
        if self.table.set_attribute(name, attr) {
            Ok(())
        } else {
            Err(CodegenError::UndefinedSymbol { name: name.to_string() })
        }
    }

    /// Absolute address of a variable: its offset inside the owning scope
    /// plus the base of that scope.
    fn address_of(&self, name: &str) -> Result<u32> {
        let (scope, sym) = self
            .table
            .lookup_scoped(name)
            .ok_or_else(|| CodegenError::UndefinedSymbol { name: name.to_string() })?;
        if sym.kind != SymbolKind::Variable {
            return Err(CodegenError::WrongKind { name: name.to_string(), expected: "variable" });
        }
        Ok(self.table.scope_base(scope).unwrap_or(0) + sym.memory_address)
    }

    fn routine_label(&self, name: &str, kind: SymbolKind) -> Result<Target> {
        let sym = self
            .table
            .lookup(name)
            .ok_or_else(|| CodegenError::UndefinedSymbol { name: name.to_string() })?;
        if sym.kind != kind {
            let expected = if kind == SymbolKind::Function { "function" } else { "procedure" };
            return Err(CodegenError::WrongKind { name: name.to_string(), expected });
        }
        Ok(Self::jump_target(sym.label))
    }

    // ---- statements ----

    fn statement(&mut self, node: &AstNode) -> Result<()> {
        let result = self.statement_inner(node);
        if result.is_ok() {
            debug_assert_eq!(self.temps, 0, "operand stack not empty after {:?}", node.kind);
        }
        result
    }

    fn statement_inner(&mut self, node: &AstNode) -> Result<()> {
        match node.kind {
            TokenKind::Var => self.var_block(node),
            TokenKind::Procedure | TokenKind::Function => self.routine(node),
            TokenKind::MainBegin => {
                if self.has_subroutine {
                    self.emit(Instruction::Label(MAIN_LABEL.to_string()));
                }
                Ok(())
            }
            TokenKind::Attrib => self.assign(node),
            TokenKind::FunctionReturn => self.function_return(node),
            TokenKind::ProcedureCall => {
                let target = self.routine_label(node.name(), SymbolKind::Procedure)?;
                self.emit(Instruction::Call(target));
                Ok(())
            }
            TokenKind::If => self.if_statement(node),
            TokenKind::While => self.while_statement(node),
            TokenKind::For => self.for_statement(node),
            TokenKind::Read => {
                let addr = self.address_of(node.name())?;
                self.emit(Instruction::Rd);
                self.emit(Instruction::Str(addr));
                Ok(())
            }
            TokenKind::Write => {
                let addr = self.address_of(node.name())?;
                self.emit(Instruction::Ldv(addr));
                self.emit(Instruction::Prn);
                Ok(())
            }
            kind => Err(CodegenError::UnexpectedNode { kind }),
        }
    }

    fn statements(&mut self, nodes: &[AstNode]) -> Result<()> {
        nodes.iter().try_for_each(|n| self.statement(n))
    }

    fn var_block(&mut self, node: &AstNode) -> Result<()> {
        let base = self.available_address;
        let scope_base = self.table.current().base;
        let depth = self.install_depth();
        let mut count = 0;

        for group in &node.children {
            let subtype = match group.kind {
                TokenKind::Integer => SubType::Integer,
                TokenKind::Boolean => SubType::Boolean,
                kind => return Err(CodegenError::UnexpectedNode { kind }),
            };
            for var in &group.children {
                let size = subtype.size();
                self.table.install(var.name(), SymbolKind::Variable, subtype, depth)?;
                self.set_attribute(var.name(), Attribute::MemoryAddress(self.available_address - scope_base))?;
                self.set_attribute(var.name(), Attribute::Size(size))?;
                self.available_address += size;
                count += size;
            }
        }

        if let Some(frame) = self.frames.last_mut() {
            frame.locals += count;
        }
        if count > 0 {
            self.emit(Instruction::Alloc { base, count });
        }
        Ok(())
    }

    fn routine(&mut self, node: &AstNode) -> Result<()> {
        let name = node.name();
        let is_function = node.kind == TokenKind::Function;
        let (kind, subtype) = match node.children.first().map(|c| c.kind) {
            Some(TokenKind::Integer) if is_function => (SymbolKind::Function, SubType::Integer),
            Some(TokenKind::Boolean) if is_function => (SymbolKind::Function, SubType::Boolean),
            _ if is_function => (SymbolKind::Function, SubType::None),
            _ => (SymbolKind::Procedure, SubType::None),
        };
        self.table.install(name, kind, subtype, self.install_depth())?;

        if !self.has_subroutine {
            self.has_subroutine = true;
            self.emit(Instruction::Jmp(Target::Label(MAIN_LABEL.to_string())));
        }
        let skip = if self.frames.len() > 1 {
            let l = self.new_label();
            self.emit(Instruction::Jmp(Self::jump_target(l)));
            Some(l)
        } else {
            None
        };

        let entry = self.new_label();
        self.set_attribute(name, Attribute::Label(entry))?;
        self.emit_label(entry);
        self.enter_scope(name, self.available_address)?;

        let ret_slot = if is_function {
            let slot = self.available_address;
            self.emit(Instruction::Alloc { base: slot, count: 1 });
            self.available_address += 1;
            Some(slot)
        } else {
            None
        };
        self.frames.push(Frame { ret_slot, locals_base: self.available_address, locals: 0 });

        let body = node.children.iter().filter(|c| !c.kind.is_type());
        for child in body {
            self.statement(child)?;
        }

        let frame = self.frame();
        self.frames.pop();
        if frame.locals > 0 {
            self.emit(Instruction::Dalloc { base: frame.locals_base, count: frame.locals });
        }
        match frame.ret_slot {
            Some(slot) => self.emit(Instruction::Returnf(slot)),
            None => self.emit(Instruction::Return),
        }
        self.available_address -= frame.locals + u32::from(frame.ret_slot.is_some());

        self.closed.extend(self.table.leave_scope());
        if let Some(l) = skip {
            self.emit_label(l);
        }
        Ok(())
    }

    fn assign(&mut self, node: &AstNode) -> Result<()> {
        let value = node.children.first().ok_or(CodegenError::UnexpectedNode { kind: node.kind })?;
        self.expression(value)?;
        let addr = self.address_of(node.name())?;
        self.emit(Instruction::Str(addr));
        self.pop_temps(1);
        Ok(())
    }

    fn function_return(&mut self, node: &AstNode) -> Result<()> {
        let frame = self.frame();
        let slot = frame.ret_slot.ok_or(CodegenError::ReturnOutsideFunction)?;
        let value = node.children.first().ok_or(CodegenError::UnexpectedNode { kind: node.kind })?;
        self.expression(value)?;
        self.emit(Instruction::Str(slot));
        self.pop_temps(1);
        if frame.locals > 0 {
            self.emit(Instruction::Dalloc { base: frame.locals_base, count: frame.locals });
        }
        self.emit(Instruction::Returnf(slot));
        Ok(())
    }

    fn condition(&mut self, node: &AstNode, on_false: u32) -> Result<()> {
        self.expression(node)?;
        self.emit(Instruction::Jmpf(Self::jump_target(on_false)));
        self.pop_temps(1);
        Ok(())
    }

    fn if_statement(&mut self, node: &AstNode) -> Result<()> {
        let Some((cond, rest)) = node.children.split_first() else {
            return Err(CodegenError::UnexpectedNode { kind: node.kind });
        };
        let otherwise = rest.iter().find(|c| c.kind == TokenKind::Else);
        let then: Vec<&AstNode> = rest.iter().filter(|c| c.kind != TokenKind::Else).collect();

        let false_label = self.new_label();
        self.condition(cond, false_label)?;
        for stmt in then {
            self.statement(stmt)?;
        }
        match otherwise {
            Some(else_node) => {
                let end = self.new_label();
                self.emit(Instruction::Jmp(Self::jump_target(end)));
                self.emit_label(false_label);
                self.statements(&else_node.children)?;
                self.emit_label(end);
            }
            None => self.emit_label(false_label),
        }
        Ok(())
    }

    fn while_statement(&mut self, node: &AstNode) -> Result<()> {
        let Some((cond, body)) = node.children.split_first() else {
            return Err(CodegenError::UnexpectedNode { kind: node.kind });
        };
        let top = self.new_label();
        let exit = self.new_label();
        self.emit_label(top);
        self.condition(cond, exit)?;
        self.statements(body)?;
        self.emit(Instruction::Jmp(Self::jump_target(top)));
        self.emit_label(exit);
        Ok(())
    }

    fn for_statement(&mut self, node: &AstNode) -> Result<()> {
        let [init, cond, step, body @ ..] = node.children.as_slice() else {
            return Err(CodegenError::UnexpectedNode { kind: node.kind });
        };
        self.assign(init)?;
        let var = self.address_of(init.name())?;

        let top = self.new_label();
        let exit = self.new_label();
        self.emit_label(top);
        self.condition(cond, exit)?;
        self.statements(body)?;

        self.expression(step)?;
        self.emit(Instruction::Ldv(var));
        self.push_temp();
        self.emit(Instruction::Add);
        self.emit(Instruction::Str(var));
        self.pop_temps(2);

        self.emit(Instruction::Jmp(Self::jump_target(top)));
        self.emit_label(exit);
        Ok(())
    }

    // ---- expressions ----

    /// Emits code leaving exactly one value on the stack.
    fn expression(&mut self, node: &AstNode) -> Result<()> {
        match node.kind {
            TokenKind::Number => {
                let text = node.name();
                let value = text
                    .parse::<i32>()
                    .map_err(|_| CodegenError::BadLiteral { text: text.to_string() })?;
                self.emit(Instruction::Ldc(value));
                self.push_temp();
            }
            TokenKind::True | TokenKind::False => {
                self.emit(Instruction::Ldc(i32::from(node.kind == TokenKind::True)));
                self.push_temp();
            }
            TokenKind::Identifier => {
                let addr = self.address_of(node.name())?;
                self.emit(Instruction::Ldv(addr));
                self.push_temp();
            }
            TokenKind::FunctionCall => {
                // operands already pushed stay below the callee's saved region
                let target = self.routine_label(node.name(), SymbolKind::Function)?;
                self.emit(Instruction::Call(target));
                self.push_temp();
            }
            TokenKind::UnaryPlus | TokenKind::UnaryMinus | TokenKind::Not => {
                let operand = node.children.first().ok_or(CodegenError::UnexpectedNode { kind: node.kind })?;
                self.expression(operand)?;
                match node.kind {
                    TokenKind::UnaryMinus => self.emit(Instruction::Inv),
                    TokenKind::Not => self.emit(Instruction::Neg),
                    _ => {}
                }
            }
            kind if kind.is_binary() => {
                let [left, right] = node.children.as_slice() else {
                    return Err(CodegenError::UnexpectedNode { kind });
                };
                self.expression(left)?;
                self.expression(right)?;
                self.emit(binary_instruction(kind));
                self.pop_temps(1);
            }
            kind => return Err(CodegenError::UnexpectedNode { kind }),
        }
        Ok(())
    }
}

fn binary_instruction(kind: TokenKind) -> Instruction {
    match kind {
        TokenKind::Plus => Instruction::Add,
        TokenKind::Minus => Instruction::Sub,
        TokenKind::Times => Instruction::Mult,
        TokenKind::Div => Instruction::Divi,
        TokenKind::And => Instruction::And,
        TokenKind::Or => Instruction::Or,
        TokenKind::Equal => Instruction::Ceq,
        TokenKind::Different => Instruction::Cdif,
        TokenKind::Less => Instruction::Cme,
        TokenKind::LessEqual => Instruction::Cmeq,
        TokenKind::Greater => Instruction::Cma,
        _ => Instruction::Cmaq,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::build;
    use crate::grammar::recognize;
    use crate::lexer::lex;
    use crate::vm::Instruction::*;
    use crate::vm::{BufferConsole, StackMachine};

    fn tree(src: &str) -> AstNode {
        let tokens = recognize(lex(src).unwrap()).unwrap();
        build(&tokens).unwrap()
    }

    fn code(src: &str) -> Vec<Instruction> {
        generate(&tree(src)).unwrap().instructions().to_vec()
    }

    fn run(src: &str, input: &[&str]) -> Vec<i32> {
        let program = generate(&tree(src)).unwrap();
        let mut vm = StackMachine::new(BufferConsole::with_input(input.iter().copied()));
        vm.load(program).unwrap();
        vm.run().unwrap();
        vm.console().output.clone()
    }

    fn l(name: &str) -> Target {
        Target::Label(name.to_string())
    }

    #[test]
    fn program_frame_and_allocation() {
        let c = code("programa t; var a: inteiro; b: booleano; c: inteiro; inicio leia(c); escreva(c) fim.");
        assert_eq!(
            c,
            vec![
                Start,
                Alloc { base: 0, count: 9 },
                Rd, Str(5),
                Ldv(5), Prn,
                Dalloc { base: 0, count: 9 },
                Hlt,
            ]
        );
    }

    #[test]
    fn no_variables_means_no_alloc() {
        assert_eq!(code("programa t; inicio fim."), vec![Start, Hlt]);
    }

    #[test]
    fn expression_is_post_order() {
        let c = code("programa t; var a, b: inteiro; inicio a := -(a + 2) * b fim.");
        assert_eq!(
            &c[2..9],
            &[Ldv(0), Ldc(2), Add, Inv, Ldv(4), Mult, Str(0)]
        );
    }

    #[test]
    fn booleans_and_not() {
        let c = code("programa t; var p: booleano; inicio p := nao verdadeiro ou falso fim.");
        assert_eq!(&c[2..7], &[Ldc(1), Neg, Ldc(0), Or, Str(0)]);
    }

    #[test]
    fn if_else_layout() {
        let c = code("programa t; var a: inteiro; inicio se a = 0 entao a := 1 senao a := 2 fim.");
        assert_eq!(
            &c[2..14],
            &[
                Ldv(0), Ldc(0), Ceq, Jmpf(l("L1")),
                Ldc(1), Str(0), Jmp(l("L2")),
                Label("L1".into()),
                Ldc(2), Str(0),
                Label("L2".into()),
                Dalloc { base: 0, count: 4 },
            ]
        );
    }

    #[test]
    fn while_layout() {
        let c = code("programa t; var a: inteiro; inicio enquanto a < 3 faca a := a + 1 fim.");
        assert_eq!(
            &c[2..13],
            &[
                Label("L1".into()),
                Ldv(0), Ldc(3), Cme, Jmpf(l("L2")),
                Ldv(0), Ldc(1), Add, Str(0),
                Jmp(l("L1")),
                Label("L2".into()),
            ]
        );
    }

    #[test]
    fn for_layout() {
        let c = code("programa t; var i: inteiro; inicio para i := 1 enquanto i <= 2 faca escreva(i) fim.");
        assert_eq!(
            &c[2..18],
            &[
                Ldc(1), Str(0),
                Label("L1".into()),
                Ldv(0), Ldc(2), Cmeq, Jmpf(l("L2")),
                Ldv(0), Prn,
                Ldc(1), Ldv(0), Add, Str(0),
                Jmp(l("L1")),
                Label("L2".into()),
                Dalloc { base: 0, count: 4 },
            ]
        );
    }

    #[test]
    fn subroutines_are_jumped_over() {
        let c = code("programa t; procedimento p; inicio fim; inicio p fim.");
        assert_eq!(
            c,
            vec![
                Start,
                Jmp(l("PRG")),
                Label("L1".into()),
                Return,
                Label("PRG".into()),
                Call(l("L1")),
                Hlt,
            ]
        );
    }

    #[test]
    fn function_reserves_return_slot() {
        let c = code(
            "programa t; var r: inteiro; \
             funcao f: inteiro; var x: inteiro; inicio x := 2; f := x fim; \
             inicio r := f fim.",
        );
        assert_eq!(
            c,
            vec![
                Start,
                Alloc { base: 0, count: 4 },
                Jmp(l("PRG")),
                Label("L1".into()),
                Alloc { base: 4, count: 1 },
                Alloc { base: 5, count: 4 },
                Ldc(2), Str(5),
                Ldv(5), Str(4), Dalloc { base: 5, count: 4 }, Returnf(4),
                Dalloc { base: 5, count: 4 }, Returnf(4),
                Label("PRG".into()),
                Call(l("L1")), Str(0),
                Dalloc { base: 0, count: 4 },
                Hlt,
            ]
        );
    }

    #[test]
    fn nested_routine_gets_skip_jump_and_outer_addresses() {
        let src = "programa t; var g: inteiro; \
                   procedimento outer; var a: inteiro; \
                     procedimento inner; var b: booleano; inicio b := verdadeiro; a := g fim; \
                   inicio inner fim; \
                   inicio outer fim.";
        let mut cg = CodeGenerator::new();
        let program = cg.generate(&tree(src)).unwrap();
        let c = program.instructions();
        // outer locals start after the global, inner's after outer's
        assert!(c.contains(&Alloc { base: 4, count: 4 }));
        assert!(c.contains(&Alloc { base: 8, count: 1 }));
        // a := g inside inner reads the global and writes outer's local
        let pos = c.iter().position(|i| *i == Ldv(0)).unwrap();
        assert_eq!(c[pos + 1], Str(4));
        // skip jump around inner
        assert_eq!(c[5], Jmp(l("L2")));
        assert_eq!(c[6], Label("L3".into()));
        assert!(c.contains(&Label("L2".into())));

        let inner = cg.scopes().iter().find(|s| s.owner == "inner").unwrap();
        assert_eq!(inner.base, 8);
        assert_eq!(inner.get("b").map(|s| s.memory_address), Some(0));
        assert_eq!(cg.available_address(), 4);
    }

    #[test]
    fn sibling_routines_reuse_addresses() {
        let src = "programa t; \
                   procedimento p; var x: inteiro; inicio x := 1 fim; \
                   procedimento q; var y: inteiro; inicio y := 2 fim; \
                   inicio p; q fim.";
        let c = code(src);
        let allocs: Vec<_> = c.iter().filter(|i| matches!(i, Alloc { .. })).collect();
        assert_eq!(allocs, vec![&Alloc { base: 0, count: 4 }, &Alloc { base: 0, count: 4 }]);
    }

    #[test]
    fn symbols_record_labels_and_addresses() {
        let mut cg = CodeGenerator::new();
        cg.generate(&tree("programa t; var a: inteiro; procedimento p; inicio fim; inicio p fim.")).unwrap();
        let program_scope = cg.scopes().iter().find(|s| s.owner == "t").unwrap();
        assert_eq!(program_scope.get("a").map(|s| (s.memory_address, s.size)), Some((0, 4)));
        assert_eq!(program_scope.get("p").map(|s| s.label), Some(1));
        let root = cg.scopes().last().unwrap();
        assert_eq!(root.symbols.len(), 1);
        assert_eq!(root.symbols[0].kind, SymbolKind::Program);
    }

    #[test]
    fn scope_and_attribute_updates_need_a_declared_symbol() {
        let mut cg = CodeGenerator::new();
        assert_eq!(cg.enter_scope("ghost", 0), Err(CodegenError::UndefinedSymbol { name: "ghost".into() }));
        assert_eq!(
            cg.set_attribute("ghost", Attribute::Label(3)),
            Err(CodegenError::UndefinedSymbol { name: "ghost".into() })
        );
        cg.table.install("p", SymbolKind::Procedure, SubType::None, ALL_SCOPES).unwrap();
        assert_eq!(cg.set_attribute("p", Attribute::Label(3)), Ok(()));
        assert_eq!(cg.enter_scope("p", 8), Ok(()));
        assert_eq!(cg.table.current().base, 8);
    }

    #[test]
    fn temps_follow_stack_discipline() {
        let mut cg = CodeGenerator::new();
        cg.generate(&tree("programa t; var a: inteiro; inicio a := 1 + 2 * (3 - a) fim.")).unwrap();
        assert_eq!(cg.max_temps(), 4);
        assert_eq!(cg.temps, 0);
    }

    #[test]
    fn runs_sum_of_inputs() {
        let src = "programa soma; var a, b: inteiro; inicio leia(a); leia(b); a := a + b; escreva(a) fim.";
        assert_eq!(run(src, &["3", "4"]), vec![7]);
    }

    #[test]
    fn unassigned_variable_reads_zero() {
        assert_eq!(run("programa t; var x: inteiro; inicio escreva(x) fim.", &[]), vec![0]);
    }

    #[test]
    fn function_call_inside_expression_keeps_temporaries() {
        let src = "programa t; var a, r: inteiro; \
                   funcao dobro: inteiro; var k: inteiro; inicio k := a * 2; dobro := k fim; \
                   inicio a := 5; r := 100 + dobro - 1; escreva(r) fim.";
        assert_eq!(run(src, &[]), vec![109]);
    }

    #[test]
    fn nested_procedures_share_enclosing_locals() {
        let src = "programa t; var g: inteiro; \
                   procedimento outer; var a: inteiro; \
                     procedimento inner; inicio a := a + g fim; \
                   inicio a := 1; inner; inner; escreva(a) fim; \
                   inicio g := 10; outer fim.";
        assert_eq!(run(src, &[]), vec![21]);
    }

    #[test]
    fn calls_balance_returns() {
        let src = "programa t; var n: inteiro; \
                   procedimento p; inicio n := n + 1 fim; \
                   funcao f: inteiro; inicio p; f := n fim; \
                   inicio p; n := f + f; escreva(n) fim.";
        let program = generate(&tree(src)).unwrap();
        let mut vm = StackMachine::new(BufferConsole::default());
        vm.load(program).unwrap();
        vm.run().unwrap();
        assert_eq!(vm.console().output, vec![5]);
        assert_eq!(vm.stats().calls, vm.stats().returns);
        assert_eq!(vm.stats().calls, 5);
        assert_eq!(vm.stack_top(), -1);
    }
}
