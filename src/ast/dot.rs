use super::AstNode;

/// Renders the tree as a Graphviz `digraph`, one node per AST node.
pub fn render(root: &AstNode) -> String {
    let mut out = String::from("digraph ast {\n  node [shape=box, fontname=monospace];\n");
    let mut next_id = 0usize;
    emit(root, &mut next_id, &mut out);
    out.push_str("}\n");
    out
}

fn label(node: &AstNode) -> String {
    let kind = format!("{:?}", node.kind);
    match &node.payload {
        Some(p) => format!("{kind}\\n{}", p.replace('"', "\\\"")),
        None => kind,
    }
}

fn emit(node: &AstNode, next_id: &mut usize, out: &mut String) -> usize {
    let id = *next_id;
    *next_id += 1;
    out.push_str(&format!("  n{id} [label=\"{}\"];\n", label(node)));
    for child in &node.children {
        let child_id = emit(child, next_id, out);
        out.push_str(&format!("  n{id} -> n{child_id};\n"));
    }
    id
}
