//! Error types for codectx-index.

/// Errors that can occur while extracting, embedding or storing context.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding backend failed.
    #[error("embedding failed: {0}")]
    Embed(#[from] codectx_embed::EmbedError),

    /// Vector index read or write failed.
    #[error("storage failed: {0}")]
    Store(#[from] codectx_store::StoreError),

    /// Grammar query did not compile.
    #[error("invalid grammar query: {0}")]
    Query(#[from] tree_sitter::QueryError),

    /// Grammar incompatible with the linked tree-sitter runtime.
    #[error("grammar load failed: {0}")]
    Language(#[from] tree_sitter::LanguageError),

    /// Language support not compiled in.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(&'static str),

    /// File watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// Ingestion stopped by a cancellation request.
    #[error("ingestion cancelled")]
    Cancelled,

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
