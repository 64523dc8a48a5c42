//! Application context shared by the HTTP layer, the CLI and the watcher.

use std::sync::Arc;

use codectx_embed::{AnyEmbedder, Embedder};
use codectx_store::VectorIndex;

use crate::adapter::AdapterRegistry;
use crate::indexer::{IncrementalIndexer, IndexerConfig};
use crate::query::QueryService;

/// Everything built once at startup and handed to consumers by reference.
pub struct AppContext<E: Embedder = AnyEmbedder> {
    pub embedder: Arc<E>,
    pub index: Arc<dyn VectorIndex>,
    pub adapters: Arc<AdapterRegistry>,
    pub indexer: Arc<IncrementalIndexer<E>>,
    pub query: QueryService<E>,
}

impl<E: Embedder> AppContext<E> {
    #[must_use]
    pub fn new(
        embedder: Arc<E>,
        index: Arc<dyn VectorIndex>,
        indexer_config: IndexerConfig,
        top_n: usize,
    ) -> Self {
        let adapters = Arc::new(AdapterRegistry::new());
        let indexer = Arc::new(IncrementalIndexer::new(
            Arc::clone(&embedder),
            Arc::clone(&index),
            Arc::clone(&adapters),
            indexer_config,
        ));
        let query = QueryService::new(Arc::clone(&embedder), Arc::clone(&index), top_n);
        Self {
            embedder,
            index,
            adapters,
            indexer,
            query,
        }
    }
}

impl<E: Embedder> std::fmt::Debug for AppContext<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("embedder", &self.embedder.name())
            .field("index", &self.index.backend())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use codectx_embed::mock::MockEmbedder;
    use codectx_store::InMemoryIndex;

    use super::*;
    use crate::query::DEFAULT_TOP_N;

    #[tokio::test]
    async fn ingested_source_is_queryable() {
        let ctx = AppContext::new(
            Arc::new(MockEmbedder::with_dimensions(32)),
            Arc::new(InMemoryIndex::new(32)),
            IndexerConfig::default(),
            DEFAULT_TOP_N,
        );
        ctx.indexer
            .ingest_source("/p/a.js", "function greet() { return hello(); }")
            .await
            .unwrap();
        let hits = ctx.query.search("greet hello", Some("/p/a.js")).await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.path == "/p/a.js"));
    }

    #[test]
    fn debug_names_backends() {
        let ctx = AppContext::new(
            Arc::new(MockEmbedder::with_dimensions(4)),
            Arc::new(InMemoryIndex::new(4)),
            IndexerConfig::default(),
            DEFAULT_TOP_N,
        );
        let dbg = format!("{ctx:?}");
        assert!(dbg.contains("mock"));
        assert!(dbg.contains("memory"));
    }
}
