//! Typed context fragments produced by extraction.

use serde::Serialize;

use crate::languages::DeclarationKind;

/// Identifier of the trailing whole-file fragment.
pub const FULL_FILE: &str = "full_file";

/// Kind of an extracted fragment, stored as the record's `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FragmentKind {
    Declaration(DeclarationKind),
    FunctionCalls,
    ControlFlow,
    ErrorHandling,
    Hierarchy,
    Imports,
    Exports,
    /// Declaration plus surrounding source lines.
    Context(DeclarationKind),
    File,
}

impl FragmentKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Declaration(kind) => kind.as_str(),
            Self::FunctionCalls => "function_calls",
            Self::ControlFlow => "control_flow",
            Self::ErrorHandling => "error_handling",
            Self::Hierarchy => "hierarchy",
            Self::Imports => "imports",
            Self::Exports => "exports",
            Self::Context(DeclarationKind::Function) => "function_context",
            Self::Context(DeclarationKind::Class) => "class_context",
            Self::Context(DeclarationKind::Method) => "method_context",
            Self::Context(DeclarationKind::Variable) => "variable_context",
            Self::Context(DeclarationKind::Interface) => "interface_context",
            Self::Context(DeclarationKind::TypeAlias) => "type_alias_context",
            Self::File => "file",
        }
    }
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FragmentKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A unit of extracted text plus metadata, destined for embedding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextFragment {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: FragmentKind,
    /// 0-based, inclusive.
    pub start_line: usize,
    /// 0-based, inclusive.
    pub end_line: usize,
    pub identifier: String,
}

impl ContextFragment {
    #[must_use]
    pub fn new(
        kind: FragmentKind,
        text: impl Into<String>,
        identifier: impl Into<String>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            text: text.into(),
            kind,
            start_line,
            end_line,
            identifier: identifier.into(),
        }
    }

    /// Whole-file fragment spanning every line of `source`.
    #[must_use]
    pub fn whole_file(source: &str) -> Self {
        let last_line = source.split('\n').count().saturating_sub(1);
        Self::new(FragmentKind::File, source, FULL_FILE, 0, last_line)
    }

    /// Stable record id: `<path>::<identifier>::<ordinal>`, or `<path>::full_file`.
    #[must_use]
    pub fn record_id(&self, path: &str, ordinal: usize) -> String {
        if self.kind == FragmentKind::File {
            format!("{path}::{FULL_FILE}")
        } else {
            format!("{path}::{}::{ordinal}", self.identifier)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_strings() {
        assert_eq!(
            FragmentKind::Declaration(DeclarationKind::Function).as_str(),
            "function"
        );
        assert_eq!(FragmentKind::FunctionCalls.as_str(), "function_calls");
        assert_eq!(
            FragmentKind::Context(DeclarationKind::Class).to_string(),
            "class_context"
        );
        assert_eq!(FragmentKind::File.as_str(), "file");
    }

    #[test]
    fn whole_file_span() {
        assert_eq!(ContextFragment::whole_file("").end_line, 0);
        assert_eq!(ContextFragment::whole_file("one line").end_line, 0);
        assert_eq!(ContextFragment::whole_file("a\nb\nc").end_line, 2);
        assert_eq!(ContextFragment::whole_file("a\n").end_line, 1);
    }

    #[test]
    fn record_ids_are_deterministic() {
        let decl = ContextFragment::new(
            FragmentKind::Declaration(DeclarationKind::Function),
            "function foo() {}",
            "foo",
            0,
            0,
        );
        assert_eq!(decl.record_id("src/a.js", 3), "src/a.js::foo::3");
        assert_eq!(
            ContextFragment::whole_file("x").record_id("src/a.js", 9),
            "src/a.js::full_file"
        );
    }

    #[test]
    fn serializes_kind_as_type() {
        let frag = ContextFragment::new(FragmentKind::Imports, "Module imports: fs", "imports", 0, 0);
        let json = serde_json::to_value(&frag).unwrap();
        assert_eq!(json["type"], "imports");
        assert_eq!(json["identifier"], "imports");
    }
}
