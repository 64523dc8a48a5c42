use tree_sitter::Node;

use super::{ANONYMOUS, Grammar, LanguageAdapter, field_name};
use crate::error::Result;
use crate::languages::{DeclarationKind, LanguageKind};

const QUERY: &str = include_str!("../../queries/javascript.scm");

const DEFAULT_EXPORT: &str = "default";

pub struct JavaScriptAdapter {
    grammar: Grammar,
}

impl JavaScriptAdapter {
    /// # Errors
    ///
    /// Returns an error if the bundled query does not compile against the grammar.
    pub fn new() -> Result<Self> {
        Ok(Self {
            grammar: Grammar::new(tree_sitter_javascript::LANGUAGE.into(), QUERY)?,
        })
    }
}

/// Naming shared by the JavaScript-family grammars.
///
/// Variable statements are named after their first declarator, export wrappers after
/// what they export, and unnamed function expressions after the variable they are
/// assigned to. An unnamed default export is called `default`.
pub(super) fn ecmascript_name(node: Node<'_>, source: &str) -> String {
    match node.kind() {
        "export_statement" => node
            .child_by_field_name("declaration")
            .or_else(|| node.child_by_field_name("value"))
            .map_or_else(|| ANONYMOUS.to_owned(), |decl| ecmascript_name(decl, source)),
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            node.named_children(&mut cursor)
                .find(|c| c.kind() == "variable_declarator")
                .map_or_else(|| ANONYMOUS.to_owned(), |d| field_name(d, source))
        }
        "arrow_function" | "function_expression" | "function" | "class"
            if node.child_by_field_name("name").is_none() =>
        {
            match node.parent() {
                Some(p) if p.kind() == "variable_declarator" => field_name(p, source),
                Some(p) if p.kind() == "export_statement" => DEFAULT_EXPORT.to_owned(),
                _ => ANONYMOUS.to_owned(),
            }
        }
        _ => field_name(node, source),
    }
}

pub(super) fn ecmascript_declaration_kind(node_kind: &str) -> Option<DeclarationKind> {
    Some(match node_kind {
        "function_declaration"
        | "generator_function_declaration"
        | "function_expression"
        | "function"
        | "arrow_function" => DeclarationKind::Function,
        "class_declaration" | "class" => DeclarationKind::Class,
        "method_definition" => DeclarationKind::Method,
        "variable_declarator" | "lexical_declaration" | "variable_declaration" => {
            DeclarationKind::Variable
        }
        _ => return None,
    })
}

impl LanguageAdapter for JavaScriptAdapter {
    fn kind(&self) -> LanguageKind {
        LanguageKind::JavaScript
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
                | "lexical_declaration"
                | "variable_declaration"
        )
    }

    fn declaration_kind(&self, node_kind: &str) -> Option<DeclarationKind> {
        ecmascript_declaration_kind(node_kind)
    }
}
