//! Language detection and declaration categories.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Source languages with a dedicated adapter.
///
/// Unrecognized extensions fall back to [`LanguageKind::default`], which is JavaScript.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    #[default]
    JavaScript,
    TypeScript,
    Java,
}

impl LanguageKind {
    pub const ALL: [LanguageKind; 3] = [Self::JavaScript, Self::TypeScript, Self::Java];

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Java => "java",
        }
    }

    /// Extensions (without the dot) mapped to this language.
    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::JavaScript => &["js", "jsx", "mjs", "cjs"],
            Self::TypeScript => &["ts", "tsx", "mts", "cts"],
            Self::Java => &["java"],
        }
    }

    /// Language for a file extension, without the default fallback.
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|lang| lang.extensions().iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }

    /// Adapter selection for a path. Never fails: unknown extensions get the default.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for LanguageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|lang| lang.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown language: {s}"))
    }
}

/// Category of a declaration node, independent of grammar node names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclarationKind {
    Function,
    Class,
    Method,
    Variable,
    Interface,
    TypeAlias,
}

impl DeclarationKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Class => "class",
            Self::Method => "method",
            Self::Variable => "variable",
            Self::Interface => "interface",
            Self::TypeAlias => "type_alias",
        }
    }

    /// Kinds whose bodies get call/control-flow/error-handling summaries and
    /// which can contain other declarations.
    #[must_use]
    pub fn is_callable_scope(self) -> bool {
        matches!(self, Self::Function | Self::Class | Self::Method)
    }

    /// Kinds that get an expanded-window fragment when large.
    #[must_use]
    pub fn wants_context_window(self) -> bool {
        matches!(self, Self::Function | Self::Class)
    }
}

impl std::fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
