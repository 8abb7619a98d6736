use crate::ast::SourceMap;
use super::{Diagnostic, Severity};

/// One diagnostic as a single-line JSON object. When the source text is
/// attached, every label also gets 1-based `line`/`col`, and the primary
/// label's position is repeated at the top level.
pub fn render(d: &Diagnostic) -> String {
    use serde_json::{Value, json};

    let severity = match d.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    let map = d.source.as_deref().map(SourceMap::new);
    let position = |offset: usize| map.as_ref().map(|m| m.lookup(offset));

    let labels: Vec<Value> = d
        .labels
        .iter()
        .map(|l| {
            let mut obj = json!({
                "start": l.span.start,
                "end": l.span.end,
                "message": l.message,
                "primary": l.is_primary,
            });
            if let Some((line, col)) = position(l.span.start) {
                obj["line"] = Value::from(line);
                obj["col"] = Value::from(col);
            }
            obj
        })
        .collect();

    let mut obj = json!({
        "severity": severity,
        "message": d.message,
        "labels": labels,
        "notes": d.notes,
    });
    if let Some(code) = d.code {
        obj["code"] = Value::from(code);
    }
    if let Some((line, col)) = d.labels.iter().find(|l| l.is_primary).and_then(|l| position(l.span.start)) {
        obj["line"] = Value::from(line);
        obj["col"] = Value::from(col);
    }
    if let Some(s) = &d.suggestion {
        obj["suggestion"] = Value::from(s.as_str());
    }

    serde_json::to_string(&obj)
        .unwrap_or_else(|_| r#"{"severity":"error","message":"internal error serializing diagnostic"}"#.to_string())
}
