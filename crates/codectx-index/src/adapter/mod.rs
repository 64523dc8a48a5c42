//! Per-language grammar + query bundles behind one trait.

#[cfg(feature = "lang-java")]
mod java;
#[cfg(feature = "lang-js")]
mod javascript;
#[cfg(feature = "lang-js")]
mod typescript;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor, Tree};

use crate::error::{IndexError, Result};
use crate::languages::{DeclarationKind, LanguageKind};

#[cfg(feature = "lang-java")]
pub use java::JavaAdapter;
#[cfg(feature = "lang-js")]
pub use javascript::JavaScriptAdapter;
#[cfg(feature = "lang-js")]
pub use typescript::TypeScriptAdapter;

/// Role of a captured node, decoded from the query's capture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureTag {
    Declaration,
    Name,
    Body,
    Value,
    Comment,
    CalledFunction,
    Object,
    Property,
    IfCondition,
    ErrorParam,
    ImportSource,
    ImportName,
    DefaultImport,
    /// The export wrapper statement.
    Export,
    /// The declaration inside an export wrapper, or a top-level exported type.
    Exported,
}

impl CaptureTag {
    #[must_use]
    pub fn from_capture_name(name: &str) -> Option<Self> {
        Some(match name {
            "declaration" => Self::Declaration,
            "name" => Self::Name,
            "body" => Self::Body,
            "value" => Self::Value,
            "comment" => Self::Comment,
            "called_function" => Self::CalledFunction,
            "object" => Self::Object,
            "property" => Self::Property,
            "if_condition" => Self::IfCondition,
            "error_param" => Self::ErrorParam,
            "import_source" => Self::ImportSource,
            "import_name" => Self::ImportName,
            "default_import" => Self::DefaultImport,
            "export" => Self::Export,
            "exported" => Self::Exported,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Capture<'tree> {
    pub tag: CaptureTag,
    pub node: Node<'tree>,
}

/// All captures of one query match, in capture order.
#[derive(Debug, Clone)]
pub struct CaptureMatch<'tree> {
    pub pattern_index: usize,
    pub captures: Vec<Capture<'tree>>,
}

impl<'tree> CaptureMatch<'tree> {
    #[must_use]
    pub fn get(&self, tag: CaptureTag) -> Option<Node<'tree>> {
        self.captures.iter().find(|c| c.tag == tag).map(|c| c.node)
    }

    #[must_use]
    pub fn has(&self, tag: CaptureTag) -> bool {
        self.captures.iter().any(|c| c.tag == tag)
    }
}

/// A compiled grammar and its capture query.
pub struct Grammar {
    language: Language,
    query: Query,
    tags: Vec<Option<CaptureTag>>,
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("patterns", &self.query.pattern_count())
            .finish_non_exhaustive()
    }
}

impl Grammar {
    /// Compile `query_source` against `language`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query does not compile for this grammar.
    pub fn new(language: Language, query_source: &str) -> Result<Self> {
        let query = Query::new(&language, query_source)?;
        let tags = query
            .capture_names()
            .iter()
            .map(|name| CaptureTag::from_capture_name(name))
            .collect();
        Ok(Self {
            language,
            query,
            tags,
        })
    }

    /// Parse with a fresh parser; parsers are cheap and not shareable across threads.
    #[must_use]
    pub fn parse(&self, source: &str) -> Option<Tree> {
        let mut parser = Parser::new();
        parser.set_language(&self.language).ok()?;
        parser.parse(source, None)
    }

    /// Run the query under `node` and collect tagged matches in engine order.
    #[must_use]
    pub fn matches<'tree>(&self, node: Node<'tree>, source: &str) -> Vec<CaptureMatch<'tree>> {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&self.query, node, source.as_bytes());
        let mut out = Vec::new();
        while let Some(m) = matches.next() {
            let captures = m
                .captures
                .iter()
                .filter_map(|c| {
                    let tag = self.tags.get(c.index as usize).copied().flatten()?;
                    Some(Capture { tag, node: c.node })
                })
                .collect();
            out.push(CaptureMatch {
                pattern_index: m.pattern_index,
                captures,
            });
        }
        out
    }
}

/// Wraps one language's grammar query set.
///
/// Adapters are stateless apart from the compiled query and may be shared across
/// concurrent extractions of different files.
pub trait LanguageAdapter: Send + Sync {
    fn kind(&self) -> LanguageKind;

    fn grammar(&self) -> &Grammar;

    /// Identifier of a declaration node, or `"anonymous"`.
    fn name_of(&self, node: Node<'_>, source: &str) -> String;

    /// Whether a node of this type counts as a module export.
    fn is_exportable(&self, node_kind: &str) -> bool;

    /// Declaration category of a grammar node type, if it is a declaration.
    fn declaration_kind(&self, node_kind: &str) -> Option<DeclarationKind>;

    /// `None` when the parser gives up entirely (e.g. cancelled or wrong grammar ABI).
    fn parse(&self, source: &str) -> Option<Tree> {
        self.grammar().parse(source)
    }

    fn capture<'tree>(&self, node: Node<'tree>, source: &str) -> Vec<CaptureMatch<'tree>> {
        self.grammar().matches(node, source)
    }
}

pub(crate) const ANONYMOUS: &str = "anonymous";

/// Text of a node's `name` field, or `"anonymous"`.
pub(crate) fn field_name(node: Node<'_>, source: &str) -> String {
    node.child_by_field_name("name")
        .and_then(|n| source.get(n.byte_range()))
        .map_or_else(|| ANONYMOUS.to_owned(), str::to_owned)
}

/// Lazily built, process-wide adapters keyed by [`LanguageKind`].
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: Mutex<HashMap<LanguageKind, Arc<dyn LanguageAdapter>>>,
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry").finish_non_exhaustive()
    }
}

impl AdapterRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapter for `kind`, built on first use and cached afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the language is not compiled in or its query fails to compile.
    pub fn get(&self, kind: LanguageKind) -> Result<Arc<dyn LanguageAdapter>> {
        let mut adapters = self
            .adapters
            .lock()
            .map_err(|e| IndexError::Other(format!("adapter registry poisoned: {e}")))?;
        if let Some(adapter) = adapters.get(&kind) {
            return Ok(Arc::clone(adapter));
        }
        let adapter = build_adapter(kind)?;
        tracing::debug!(language = %kind, "language adapter created");
        adapters.insert(kind, Arc::clone(&adapter));
        Ok(adapter)
    }

    /// Adapter chosen by the path's extension, with the default fallback.
    ///
    /// # Errors
    ///
    /// See [`AdapterRegistry::get`].
    pub fn for_path(&self, path: &std::path::Path) -> Result<Arc<dyn LanguageAdapter>> {
        self.get(LanguageKind::for_path(path))
    }
}

fn build_adapter(kind: LanguageKind) -> Result<Arc<dyn LanguageAdapter>> {
    match kind {
        #[cfg(feature = "lang-js")]
        LanguageKind::JavaScript => Ok(Arc::new(JavaScriptAdapter::new()?)),
        #[cfg(feature = "lang-js")]
        LanguageKind::TypeScript => Ok(Arc::new(TypeScriptAdapter::new()?)),
        #[cfg(feature = "lang-java")]
        LanguageKind::Java => Ok(Arc::new(JavaAdapter::new()?)),
        #[allow(unreachable_patterns)]
        other => Err(IndexError::UnsupportedLanguage(other.id())),
    }
}
