use tree_sitter::Node;

use super::javascript::{ecmascript_declaration_kind, ecmascript_name};
use super::{Grammar, LanguageAdapter};
use crate::error::Result;
use crate::languages::{DeclarationKind, LanguageKind};

const QUERY: &str = include_str!("../../queries/typescript.scm");

/// TypeScript reuses the JavaScript naming rules and adds type-level declarations.
pub struct TypeScriptAdapter {
    grammar: Grammar,
}

impl TypeScriptAdapter {
    /// # Errors
    ///
    /// Returns an error if the bundled query does not compile against the grammar.
    pub fn new() -> Result<Self> {
        Ok(Self {
            grammar: Grammar::new(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(), QUERY)?,
        })
    }
}

impl LanguageAdapter for TypeScriptAdapter {
    fn kind(&self) -> LanguageKind {
        LanguageKind::TypeScript
    }

    fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    fn name_of(&self, node: Node<'_>, source: &str) -> String {
        ecmascript_name(node, source)
    }

    fn is_exportable(&self, node_kind: &str) -> bool {
        matches!(
            node_kind,
            "function_declaration"
                | "generator_function_declaration"
                | "function_expression"
                | "class_declaration"
                | "class"
                | "abstract_class_declaration"
                | "lexical_declaration"
                | "variable_declaration"
                | "interface_declaration"
                | "type_alias_declaration"
                | "enum_declaration"
        )
    }

    fn declaration_kind(&self, node_kind: &str) -> Option<DeclarationKind> {
        match node_kind {
            "abstract_class_declaration" => Some(DeclarationKind::Class),
            "interface_declaration" => Some(DeclarationKind::Interface),
            "type_alias_declaration" => Some(DeclarationKind::TypeAlias),
            other => ecmascript_declaration_kind(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::CaptureTag;

    #[test]
    fn interface_and_alias_are_declarations() {
        let adapter = TypeScriptAdapter::new().unwrap();
        let src = "interface Shape { area(): number }\ntype Id = string;\n";
        let tree = adapter.parse(src).unwrap();
        let names: Vec<String> = adapter
            .capture(tree.root_node(), src)
            .iter()
            .filter(|m| m.has(CaptureTag::Declaration))
            .filter_map(|m| m.get(CaptureTag::Name))
            .map(|n| src[n.byte_range()].to_owned())
            .collect();
        assert_eq!(names, ["Shape", "Id"]);
        assert_eq!(
            adapter.declaration_kind("type_alias_declaration"),
            Some(DeclarationKind::TypeAlias)
        );
    }

    #[test]
    fn exportability_covers_types() {
        let adapter = TypeScriptAdapter::new().unwrap();
        assert!(adapter.is_exportable("interface_declaration"));
        assert!(adapter.is_exportable("abstract_class_declaration"));
        assert!(!adapter.is_exportable("method_definition"));
    }
}
