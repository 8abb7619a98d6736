//! Tree-level optimizations.
//!
//! Level 1 folds constant binary expressions on the right-hand side of
//! assignments and function returns. Arithmetic wraps exactly like the
//! stack machine does, so folding never changes what a program prints.

use crate::ast::AstNode;
use crate::lexer::TokenKind;

/// Returns `ast` with every foldable expression replaced by its value.
/// Level 0 returns the tree unchanged.
pub fn fold_constants(mut ast: AstNode, level: u8) -> AstNode {
    if level == 0 {
        return ast;
    }
    fold_statements(&mut ast);
    ast
}

fn fold_statements(node: &mut AstNode) {
    if matches!(node.kind, TokenKind::Attrib | TokenKind::FunctionReturn) {
        if let Some(expr) = node.children.first().cloned() {
            node.replace_child(0, fold_expression(expr));
        }
        return;
    }
    for child in &mut node.children {
        fold_statements(child);
    }
}

fn fold_expression(mut node: AstNode) -> AstNode {
    node.children = node.children.into_iter().map(fold_expression).collect();
    if !node.kind.is_binary() {
        return node;
    }
    let operands = match node.children.as_slice() {
        [left, right] => literal(left).zip(literal(right)),
        _ => None,
    };
    match operands.and_then(|(a, b)| evaluate(node.kind, a, b)) {
        Some(folded) => folded,
        None => node,
    }
}

fn literal(node: &AstNode) -> Option<i32> {
    match node.kind {
        TokenKind::Number => node.name().parse().ok(),
        TokenKind::True => Some(1),
        TokenKind::False => Some(0),
        _ => None,
    }
}

fn number(v: i32) -> AstNode {
    AstNode::named(TokenKind::Number, v.to_string())
}

fn flag(b: bool) -> AstNode {
    AstNode::new(if b { TokenKind::True } else { TokenKind::False })
}

fn evaluate(op: TokenKind, a: i32, b: i32) -> Option<AstNode> {
    Some(match op {
        TokenKind::Plus => number(a.wrapping_add(b)),
        TokenKind::Minus => number(a.wrapping_sub(b)),
        TokenKind::Times => number(a.wrapping_mul(b)),
        // left alone so the division still faults at run time
        TokenKind::Div if b == 0 => return None,
        TokenKind::Div => number(a.wrapping_div(b)),
        TokenKind::Equal => flag(a == b),
        TokenKind::Different => flag(a != b),
        TokenKind::Less => flag(a < b),
        TokenKind::LessEqual => flag(a <= b),
        TokenKind::Greater => flag(a > b),
        TokenKind::GreaterEqual => flag(a >= b),
        TokenKind::And => flag(a == 1 && b == 1),
        TokenKind::Or => flag(a == 1 || b == 1),
        _ => return None,
    })
}
