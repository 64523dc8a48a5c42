//! Syntax-aware context extraction and incremental indexing.
//!
//! Source files are parsed with tree-sitter, turned into typed context fragments
//! (declarations, call/control-flow/error-handling summaries, containment and
//! module facts, a whole-file fallback), embedded, and stored so that the index
//! for a path always mirrors the latest content of that path.

pub mod adapter;
pub mod context;
pub mod error;
pub mod extractor;
pub mod fragment;
pub mod indexer;
pub mod languages;
pub mod locks;
pub mod query;
pub mod watcher;

pub use adapter::{AdapterRegistry, LanguageAdapter};
pub use context::AppContext;
pub use error::{IndexError, Result};
pub use extractor::ContextExtractor;
pub use fragment::{ContextFragment, FragmentKind};
pub use indexer::{FileOutcome, IncrementalIndexer, IndexerConfig, IngestPlan, IngestReport};
pub use languages::{DeclarationKind, LanguageKind};
pub use locks::PathLocks;
pub use query::{QueryHit, QueryService};
pub use watcher::IndexWatcher;
