use serde::Serialize;

pub mod builder;
pub mod dot;
pub mod source_map;

pub use builder::{AstBuilder, CompileError, build};
pub use source_map::SourceMap;

use crate::lexer::TokenKind;

// ---- Span infrastructure ----

/// Byte range within source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub const UNKNOWN: Span = Span { start: 0, end: 0 };
}

// ---- Tree ----

/// A node of the typed syntax tree.
///
/// `payload` holds a name (identifiers, declarations, calls) or the literal
/// text of a number. Structural nodes such as `If`, `While` and `Var` carry
/// no payload; their meaning comes from the order of their children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AstNode {
    pub kind: TokenKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: TokenKind) -> Self {
        AstNode { kind, payload: None, children: Vec::new() }
    }

    pub fn named(kind: TokenKind, payload: impl Into<String>) -> Self {
        AstNode { kind, payload: Some(payload.into()), children: Vec::new() }
    }

    pub fn with_children(mut self, children: Vec<AstNode>) -> Self {
        self.children = children;
        self
    }

    pub fn push(&mut self, child: AstNode) {
        self.children.push(child);
    }

    pub fn name(&self) -> &str {
        self.payload.as_deref().unwrap_or("")
    }

    /// Replaces the child at `index`, returning the old one.
    pub fn replace_child(&mut self, index: usize, node: AstNode) -> Option<AstNode> {
        let slot = self.children.get_mut(index)?;
        Some(std::mem::replace(slot, node))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(AstNode::size).sum::<usize>()
    }
}
