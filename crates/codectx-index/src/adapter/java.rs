use tree_sitter::Node;

use super::{ANONYMOUS, Grammar, LanguageAdapter, field_name};
use crate::error::Result;
use crate::languages::{DeclarationKind, LanguageKind};

const QUERY: &str = include_str!("../../queries/java.scm");

pub struct JavaAdapter {
    grammar: Grammar,
}

impl JavaAdapter {
    /// # Errors
    ///
    /// Returns an error if the bundled query does not compile against the grammar.
    pub fn new() -> Result<Self> {
        Ok(Self {
            grammar: Grammar::new(tree_sitter_java::LANGUAGE.into(), QUERY)?,
        })
    }
}

impl LanguageAdapter for JavaAdapter {
    fn kind(&self) -> LanguageKind {
        LanguageKind::Java
    }

    fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    fn name_of(&self, node: Node<'_>, source: &str) -> String {
        match node.kind() {
            "field_declaration" | "local_variable_declaration" => node
                .child_by_field_name("declarator")
                .map_or_else(|| ANONYMOUS.to_owned(), |d| field_name(d, source)),
            _ => field_name(node, source),
        }
    }

    fn is_exportable(&self, node_kind: &str) -> bool {
        matches!(
            node_kind,
            "class_declaration" | "interface_declaration" | "enum_declaration" | "record_declaration"
        )
    }

    fn declaration_kind(&self, node_kind: &str) -> Option<DeclarationKind> {
        Some(match node_kind {
            "class_declaration" | "enum_declaration" | "record_declaration" => {
                DeclarationKind::Class
            }
            "interface_declaration" => DeclarationKind::Interface,
            "method_declaration" | "constructor_declaration" => DeclarationKind::Method,
            "variable_declarator" => DeclarationKind::Variable,
            "lambda_expression" => DeclarationKind::Function,
            _ => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::CaptureTag;

    const SRC: &str = "\
import java.util.List;

public class Service {
    private int count = 0;

    public Service() { init(); }

    void run() {
        try {
            helper.process(count);
        } catch (IllegalStateException ex) {
            log(ex);
        }
    }
}
";

    #[test]
    fn captures_methods_and_constructor() {
        let adapter = JavaAdapter::new().unwrap();
        let tree = adapter.parse(SRC).unwrap();
        let mut names: Vec<&str> = adapter
            .capture(tree.root_node(), SRC)
            .iter()
            .filter(|m| m.has(CaptureTag::Declaration))
            .filter_map(|m| m.get(CaptureTag::Name))
            .map(|n| &SRC[n.byte_range()])
            .collect();
        names.sort_unstable();
        assert_eq!(names, ["Service", "Service", "count", "run"]);
    }

    #[test]
    fn captures_calls_and_catch_parameter() {
        let adapter = JavaAdapter::new().unwrap();
        let tree = adapter.parse(SRC).unwrap();
        let matches = adapter.capture(tree.root_node(), SRC);
        let text = |tag| -> Vec<&str> {
            let mut found: Vec<&str> = matches
                .iter()
                .filter_map(|m| m.get(tag))
                .map(|n| &SRC[n.byte_range()])
                .collect();
            found.sort_unstable();
            found
        };
        assert_eq!(text(CaptureTag::CalledFunction), ["init", "log"]);
        assert_eq!(text(CaptureTag::Object), ["helper"]);
        assert_eq!(text(CaptureTag::ErrorParam), ["ex"]);
        assert_eq!(text(CaptureTag::ImportSource), ["java.util.List"]);
        assert_eq!(text(CaptureTag::Exported).len(), 1);
    }

    #[test]
    fn declaration_categories() {
        let adapter = JavaAdapter::new().unwrap();
        assert_eq!(
            adapter.declaration_kind("constructor_declaration"),
            Some(DeclarationKind::Method)
        );
        assert_eq!(
            adapter.declaration_kind("interface_declaration"),
            Some(DeclarationKind::Interface)
        );
        assert!(adapter.is_exportable("class_declaration"));
        assert!(!adapter.is_exportable("method_declaration"));
    }
}
