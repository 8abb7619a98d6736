//! Scoped symbol table shared by the AST builder and the code generator.
//!
//! Scopes form a stack, innermost last. Lookup walks outward and stops at
//! the first match. Scopes are discarded wholesale by [`SymbolTable::leave_scope`].

use serde::Serialize;

/// Checks every scope in the chain when testing for duplicates.
pub const ALL_SCOPES: usize = usize::MAX;
/// Checks only the innermost scope when testing for duplicates.
pub const CURRENT_SCOPE: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SymbolKind {
    Variable,
    Function,
    Procedure,
    Program,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubType {
    None,
    Integer,
    Boolean,
}

impl SubType {
    /// Storage cells a variable of this type occupies.
    pub fn size(self) -> u32 {
        match self {
            SubType::Boolean => 1,
            _ => 4,
        }
    }
}

impl std::fmt::Display for SubType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SubType::None => "none",
            SubType::Integer => "inteiro",
            SubType::Boolean => "booleano",
        })
    }
}

impl std::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            SymbolKind::Variable => "variable",
            SymbolKind::Function => "function",
            SymbolKind::Procedure => "procedure",
            SymbolKind::Program => "program",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub subtype: SubType,
    pub memory_address: u32,
    pub label: u32,
    pub size: u32,
}

impl Symbol {
    pub fn new(name: impl Into<String>, kind: SymbolKind, subtype: SubType) -> Self {
        Symbol { name: name.into(), kind, subtype, memory_address: 0, label: 0, size: 0 }
    }
}

/// A mutable symbol attribute together with its new value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    Subtype(SubType),
    MemoryAddress(u32),
    Label(u32),
    Size(u32),
}

/// Selects which attribute [`SymbolTable::get_attribute`] reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Subtype,
    MemoryAddress,
    Label,
    Size,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Scope {
    /// Name of the symbol this scope is nested under (empty for the root).
    pub owner: String,
    /// First memory address allocated by this scope.
    pub base: u32,
    pub symbols: Vec<Symbol>,
}

impl Scope {
    fn new(owner: impl Into<String>, base: u32) -> Self {
        Scope { owner: owner.into(), base, symbols: Vec::new() }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.symbols.iter_mut().find(|s| s.name == name)
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let owner = if self.owner.is_empty() { "<root>" } else { self.owner.as_str() };
        writeln!(f, "scope {owner} (base {})", self.base)?;
        for s in &self.symbols {
            write!(f, "  {:<12} {:<9} {:<8}", s.name, s.kind, s.subtype)?;
            match s.kind {
                SymbolKind::Variable => writeln!(f, " addr={} size={}", s.memory_address, s.size)?,
                SymbolKind::Function | SymbolKind::Procedure => writeln!(f, " label=L{:X}", s.label)?,
                SymbolKind::Program => writeln!(f)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("duplicate symbol '{name}' (already declared as {existing})")]
pub struct DuplicateSymbol {
    pub name: String,
    pub existing: SymbolKind,
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable { scopes: vec![Scope::new("", 0)] }
    }

    /// Drops every scope and symbol, leaving a fresh root scope.
    pub fn clear(&mut self) {
        self.scopes.clear();
        self.scopes.push(Scope::new("", 0));
    }

    /// Number of open scopes, the root included.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn current(&self) -> &Scope {
        &self.scopes[self.scopes.len() - 1]
    }

    /// Whether `name` is declared in the innermost `depth` scopes.
    pub fn is_defined(&self, name: &str, depth: usize) -> Option<&Symbol> {
        self.scopes.iter().rev().take(depth).find_map(|s| s.get(name))
    }

    /// Installs a symbol in the innermost scope. Fails when `name` already
    /// exists in any of the innermost `depth` scopes.
    pub fn install(
        &mut self,
        name: &str,
        kind: SymbolKind,
        subtype: SubType,
        depth: usize,
    ) -> Result<(), DuplicateSymbol> {
        if let Some(existing) = self.is_defined(name, depth.max(1)) {
            return Err(DuplicateSymbol { name: name.to_string(), existing: existing.kind });
        }
        let last = self.scopes.len() - 1;
        self.scopes[last].symbols.push(Symbol::new(name, kind, subtype));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&Symbol> {
        self.lookup_scoped(name).map(|(_, s)| s)
    }

    /// Like [`lookup`](Self::lookup) but also returns the index of the owning
    /// scope (0 is the root).
    pub fn lookup_scoped(&self, name: &str) -> Option<(usize, &Symbol)> {
        self.scopes
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, s)| s.get(name).map(|sym| (i, sym)))
    }

    fn lookup_mut(&mut self, name: &str) -> Option<&mut Symbol> {
        self.scopes.iter_mut().rev().find_map(|s| s.get_mut(name))
    }

    /// Opens a scope nested under `name`, which must be visible from the
    /// current scope. Returns false (and opens nothing) otherwise.
    pub fn enter_scope(&mut self, name: &str) -> bool {
        self.enter_scope_at(name, 0)
    }

    /// Opens a scope nested under `name` whose allocations start at `base`.
    pub fn enter_scope_at(&mut self, name: &str, base: u32) -> bool {
        if self.lookup(name).is_none() {
            return false;
        }
        self.scopes.push(Scope::new(name, base));
        true
    }

    /// Pops the innermost scope. The root scope is never popped.
    pub fn leave_scope(&mut self) -> Option<Scope> {
        if self.scopes.len() > 1 { self.scopes.pop() } else { None }
    }

    pub fn scope_base(&self, index: usize) -> Option<u32> {
        self.scopes.get(index).map(|s| s.base)
    }

    /// Sets an attribute on the nearest visible symbol named `name`.
    pub fn set_attribute(&mut self, name: &str, attr: Attribute) -> bool {
        let Some(sym) = self.lookup_mut(name) else {
            return false;
        };
        match attr {
            Attribute::Subtype(t) => sym.subtype = t,
            Attribute::MemoryAddress(a) => sym.memory_address = a,
            Attribute::Label(l) => sym.label = l,
            Attribute::Size(s) => sym.size = s,
        }
        true
    }

    pub fn get_attribute(&self, name: &str, field: Field) -> Option<Attribute> {
        let sym = self.lookup(name)?;
        Some(match field {
            Field::Subtype => Attribute::Subtype(sym.subtype),
            Field::MemoryAddress => Attribute::MemoryAddress(sym.memory_address),
            Field::Label => Attribute::Label(sym.label),
            Field::Size => Attribute::Size(sym.size),
        })
    }
}
