pub mod ansi;
pub mod json;
pub mod registry;

use crate::ast::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct Label {
    pub span: Span,
    pub message: String,
    pub is_primary: bool,
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    pub labels: Vec<Label>,
    pub notes: Vec<String>,
    pub suggestion: Option<String>,
    pub source: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Error,
            code: None,
            message: message.into(),
            labels: Vec::new(),
            notes: Vec::new(),
            suggestion: None,
            source: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic { severity: Severity::Warning, ..Diagnostic::error(message) }
    }

    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into(), is_primary: true });
        self
    }

    pub fn with_secondary_span(mut self, span: Span, label: impl Into<String>) -> Self {
        self.labels.push(Label { span, message: label.into(), is_primary: false });
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Adds the registry's one-line summary as a note, when the code has one.
    fn with_registry_hint(self) -> Self {
        match self.code.and_then(registry::lookup) {
            Some(entry) => {
                let code = entry.code;
                self.with_note(format!("{}; see `lpd --explain {code}`", entry.short))
            }
            None => self,
        }
    }
}

// ---- From impls for the pipeline's error types ----

impl From<&crate::lexer::LexError> for Diagnostic {
    fn from(e: &crate::lexer::LexError) -> Self {
        let span = Span {
            start: e.position,
            end: e.position + e.snippet.len().max(1),
        };
        Diagnostic::error(&e.message).with_code(e.code).with_span(span, "here")
    }
}

impl From<&crate::grammar::ParseError> for Diagnostic {
    fn from(e: &crate::grammar::ParseError) -> Self {
        Diagnostic::error(&e.message).with_code(e.code).with_span(e.span, "here")
    }
}

impl From<&crate::ast::CompileError> for Diagnostic {
    fn from(e: &crate::ast::CompileError) -> Self {
        Diagnostic::error(&e.message)
            .with_code(e.code)
            .with_span(e.span, format!("near '{}'", e.near))
            .with_registry_hint()
    }
}

impl From<&crate::codegen::CodegenError> for Diagnostic {
    fn from(e: &crate::codegen::CodegenError) -> Self {
        Diagnostic::error(e.to_string())
            .with_code("LPD-S011")
            .with_note("the tree passed semantic checks; this is a compiler bug")
    }
}

impl From<&crate::vm::LoadError> for Diagnostic {
    fn from(e: &crate::vm::LoadError) -> Self {
        use crate::vm::{LoadError, VmError};
        let code = match e {
            LoadError::Arity { .. } => "LPD-O001",
            LoadError::Operand { .. } => "LPD-O002",
            LoadError::Label { .. } => "LPD-O003",
            LoadError::Link(VmError::DuplicateLabel { .. }) => "LPD-O005",
            LoadError::Link(_) => "LPD-O004",
        };
        Diagnostic::error(e.to_string()).with_code(code)
    }
}

impl From<&crate::vm::LoadWarning> for Diagnostic {
    fn from(w: &crate::vm::LoadWarning) -> Self {
        Diagnostic::warning(format!("line {}: {}", w.line, w.message)).with_code("LPD-O006")
    }
}

impl From<&crate::vm::VmError> for Diagnostic {
    fn from(e: &crate::vm::VmError) -> Self {
        use crate::vm::VmError;
        let code = match e {
            VmError::DivisionByZero => "LPD-R001",
            VmError::StackUnderflow => "LPD-R002",
            VmError::StackOverflow => "LPD-R003",
            VmError::AddressOutOfRange { .. } => "LPD-R004",
            VmError::UnresolvedLabel { .. } => "LPD-R005",
            VmError::DuplicateLabel { .. } => "LPD-O005",
            VmError::BadReturnAddress { .. } => "LPD-R006",
            VmError::InputExhausted => "LPD-R007",
        };
        Diagnostic::error(e.to_string()).with_code(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    #[test]
    fn diagnostic_error_builder() {
        let d = Diagnostic::error("something went wrong");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(d.message, "something went wrong");
        assert!(d.code.is_none());
        assert!(d.labels.is_empty());
        assert!(d.notes.is_empty());
        assert!(d.suggestion.is_none());
    }

    #[test]
    fn diagnostic_with_span() {
        let d = Diagnostic::error("bad token")
            .with_span(Span { start: 5, end: 8 }, "here");
        assert_eq!(d.labels.len(), 1);
        assert_eq!(d.labels[0].span, Span { start: 5, end: 8 });
        assert!(d.labels[0].is_primary);
    }

    #[test]
    fn warning_keeps_builder_fields() {
        let d = Diagnostic::warning("skipped").with_code("LPD-O006").with_note("n");
        assert_eq!(d.severity, Severity::Warning);
        assert_eq!(d.code, Some("LPD-O006"));
        assert_eq!(d.notes, vec!["n"]);
    }

    #[test]
    fn from_lex_error() {
        let err = crate::lexer::lex("programa t; var a$ : inteiro;").unwrap_err();
        let d = Diagnostic::from(&err);
        assert_eq!(d.code, Some("LPD-L001"));
        assert_eq!(d.labels[0].span.start, 17);
        assert_eq!(d.labels[0].span.end, 18);
    }

    #[test]
    fn from_parse_error() {
        let tokens = crate::lexer::lex("programa t inicio fim.").unwrap();
        let err = crate::grammar::recognize(tokens).unwrap_err();
        let d = Diagnostic::from(&err);
        assert_eq!(d.code, Some("LPD-P001"));
        assert_eq!(d.labels[0].span, err.span);
    }

    #[test]
    fn from_compile_error_carries_near_and_hint() {
        let tokens = crate::grammar::recognize(
            crate::lexer::lex("programa t; inicio x := 1 fim.").unwrap(),
        )
        .unwrap();
        let err = crate::ast::build(&tokens).unwrap_err();
        let d = Diagnostic::from(&err);
        assert_eq!(d.code, Some("LPD-S002"));
        assert_eq!(d.labels[0].message, "near 'x'");
        assert!(d.notes.iter().any(|n| n.contains("--explain LPD-S002")));
    }

    #[test]
    fn from_load_errors_and_warnings() {
        let err = crate::vm::object_load("    LDC\n").unwrap_err();
        assert_eq!(Diagnostic::from(&err).code, Some("LPD-O001"));
        let err = crate::vm::object_load("    JMP     L9\n").unwrap_err();
        assert_eq!(Diagnostic::from(&err).code, Some("LPD-O004"));
        let err = crate::vm::object_load("L1  NULL\nL1  NULL\n").unwrap_err();
        assert_eq!(Diagnostic::from(&err).code, Some("LPD-O005"));

        let (_, warnings) = crate::vm::object_load("    NOP\n").unwrap();
        let d = Diagnostic::from(&warnings[0]);
        assert_eq!(d.severity, Severity::Warning);
        assert!(d.message.starts_with("line 1:"));
    }

    #[test]
    fn from_vm_error() {
        let d = Diagnostic::from(&crate::vm::VmError::DivisionByZero);
        assert_eq!(d.code, Some("LPD-R001"));
        assert!(d.message.contains("division by zero"));
        assert!(d.labels.is_empty());
    }

    #[test]
    fn every_produced_code_is_registered() {
        use crate::vm::VmError;
        let errors = [
            VmError::DivisionByZero,
            VmError::StackUnderflow,
            VmError::StackOverflow,
            VmError::AddressOutOfRange { address: -1 },
            VmError::UnresolvedLabel { label: "L1".into() },
            VmError::DuplicateLabel { label: "L1".into() },
            VmError::BadReturnAddress { value: -1 },
            VmError::InputExhausted,
        ];
        for e in &errors {
            let code = Diagnostic::from(e).code.unwrap();
            assert!(registry::lookup(code).is_some(), "{code} not in registry");
        }
    }
}
